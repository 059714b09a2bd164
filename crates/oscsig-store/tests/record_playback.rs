//! End-to-end tests: route events → record frames → read back → replay.

use std::sync::Arc;
use std::time::{Duration, Instant};

use oscsig_core::{EventRouter, Frame, RECORD_WIDTH, TreeConfig, TreeView};
use oscsig_store::{FrameReader, FrameRecorder, PlaybackRouter, count_frames};
use tempfile::TempDir;

fn recording_router() -> Arc<EventRouter> {
    Arc::new(EventRouter::new(TreeConfig::without_decay(
        RECORD_WIDTH,
        Duration::ZERO,
    )))
}

/// Record one frame per value written to `/a/b`.
fn record_ab(values: &[f64]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let router = recording_router();
    let mut recorder = FrameRecorder::create(tmp.path(), 1.0, Arc::clone(&router)).unwrap();
    for v in values {
        router.route("/a/b", &[*v]);
        recorder.capture().unwrap();
    }
    tmp
}

fn ab(frame: &Frame) -> Frame {
    frame.lookup("/").cloned().unwrap_or_default()
}

/// Three frames, buffer 2, no loop: 1, 2, 3 then nothing new.
#[test]
fn three_frames_play_once() {
    let tmp = record_ab(&[1.0, 2.0, 3.0]);
    let mut reader = FrameReader::open(tmp.path(), 2, false).unwrap();

    let expected = |v: f64| Frame::from_json(&format!(r#"{{"a": {{"b": [{v}]}}}}"#)).unwrap();

    assert_eq!(ab(reader.current().unwrap()), expected(1.0));
    assert_eq!(ab(reader.next().unwrap()), expected(2.0));
    assert_eq!(ab(reader.next().unwrap()), expected(3.0));
    assert!(reader.next().is_none());
    assert_eq!(ab(reader.current().unwrap()), expected(3.0));
}

/// With looping, 2T advances see every frame exactly twice, in order.
#[test]
fn looping_reader_repeats_every_frame_twice() {
    let values: Vec<f64> = (0..5).map(|v| v as f64).collect();
    let tmp = record_ab(&values);
    let total = count_frames(tmp.path()).unwrap();
    assert_eq!(total, 5);

    let mut reader = FrameReader::open(tmp.path(), 3, true).unwrap();
    let mut seen = Vec::new();
    for _ in 0..2 * total {
        seen.push(reader.get("/a/b"));
        reader.next();
    }
    let expected: Vec<Frame> = values
        .iter()
        .chain(values.iter())
        .map(|v| Frame::Values(vec![*v]))
        .collect();
    assert_eq!(seen, expected);
}

/// A live tree recorded and replayed reproduces every leaf.
#[test]
fn recorded_tree_replays_identically() {
    let tmp = TempDir::new().unwrap();
    let router = recording_router();
    let mut recorder = FrameRecorder::create(tmp.path(), 24.0, Arc::clone(&router)).unwrap();
    for finger in 1..=5 {
        let v = finger as f64;
        router.route(&format!("/hand/1/finger/{finger}/pos"), &[v, v * 2.0, v * 3.0]);
    }
    router.route("/tempo", &[128.0]);
    recorder.capture().unwrap();

    let playback = PlaybackRouter::open(tmp.path(), 24.0, None, true).unwrap();
    let t0 = Instant::now();
    assert!(playback.tick_at(t0));
    let settled = t0 + playback.period();

    for finger in 1..=5 {
        let v = finger as f64;
        let node = playback
            .child("hand")
            .child("1")
            .child("finger")
            .child(&finger.to_string())
            .child("pos");
        assert_eq!(node.values_at(settled), vec![v, v * 2.0, v * 3.0]);
    }
    assert_eq!(
        playback.find("/tempo").unwrap().values_at(settled),
        vec![128.0]
    );
    assert_eq!(playback.tree().snapshot_at(settled), router.snapshot());
}

/// Missing addresses read as zero, never as an error.
#[test]
fn get_tolerates_sparse_frames() {
    let tmp = TempDir::new().unwrap();
    let router = recording_router();
    let mut recorder = FrameRecorder::create(tmp.path(), 1.0, Arc::clone(&router)).unwrap();
    router.route("/left/x", &[1.0]);
    recorder.capture().unwrap();
    router.route("/right/x", &[2.0]);
    recorder.capture().unwrap();

    let mut reader = FrameReader::open(tmp.path(), 2, false).unwrap();
    assert_eq!(reader.get("/right/x"), Frame::MISSING);
    assert_eq!(reader.get("/left/x"), Frame::Values(vec![1.0]));
    reader.next();
    assert_eq!(reader.get("/right/x"), Frame::Values(vec![2.0]));
    assert_eq!(reader.get("/left/y"), Frame::MISSING);
}

/// Playback of a recording that is still being written.
#[test]
fn reader_follows_in_progress_recording() {
    let tmp = TempDir::new().unwrap();
    let router = recording_router();
    let mut recorder = FrameRecorder::create(tmp.path(), 1.0, Arc::clone(&router)).unwrap();
    router.route("/v", &[0.0]);
    recorder.capture().unwrap();

    let mut reader = FrameReader::open(tmp.path(), 2, false).unwrap();
    assert_eq!(reader.get("/v"), Frame::Values(vec![0.0]));

    // Frame 1 was requested during open, before it existed, and is skipped.
    router.route("/v", &[1.0]);
    recorder.capture().unwrap();
    router.route("/v", &[2.0]);
    recorder.capture().unwrap();
    assert!(reader.next().is_none());
    assert_eq!(reader.next().map(|f| f.get("/v")), Some(Frame::Values(vec![2.0])));
}

/// A NaN from the wire never reaches a frame file, so healthy addresses
/// in the same frame still read back.
#[test]
fn non_finite_values_do_not_spoil_frames() {
    let tmp = TempDir::new().unwrap();
    let router = recording_router();
    let mut recorder = FrameRecorder::create(tmp.path(), 1.0, Arc::clone(&router)).unwrap();
    assert!(router.route("/ok", &[1.0]));
    assert!(!router.route("/bad", &[f64::NAN]));
    recorder.capture().unwrap();
    assert!(!router.route("/bad", &[f64::NEG_INFINITY, 2.0]));
    recorder.capture().unwrap();

    let mut reader = FrameReader::open(tmp.path(), 2, false).unwrap();
    assert_eq!(reader.get("/ok"), Frame::Values(vec![1.0]));
    assert_eq!(reader.get("/bad"), Frame::Values(vec![0.0, 0.0, 0.0]));
    assert!(reader.next().is_some());
    assert_eq!(reader.get("/ok"), Frame::Values(vec![1.0]));
}
