use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use oscsig_core::{AddressTree, RECORD_WIDTH, TreeConfig, TreeView};
use parking_lot::{Mutex, MutexGuard};

use crate::error::Result;
use crate::periodic::{PeriodicHandle, frame_period, spawn_periodic};
use crate::reader::FrameReader;

/// Read-ahead used when none is given: one second of frames.
pub fn default_buffer(frame_rate: f64) -> usize {
    (frame_rate.ceil() as usize).max(1)
}

/// Replays a recorded frame directory into a tree readable like a live one.
///
/// Each tick assigns the current frame to the tree with a ramp of one frame
/// period, so values glide from frame to frame, then advances the reader.
pub struct PlaybackRouter {
    tree: AddressTree,
    reader: Mutex<FrameReader>,
    period: Duration,
}

impl PlaybackRouter {
    pub fn open(
        dir: impl AsRef<Path>,
        frame_rate: f64,
        buffer: Option<usize>,
        looping: bool,
    ) -> Result<Self> {
        let period = frame_period(frame_rate)?;
        let capacity = buffer.unwrap_or_else(|| default_buffer(frame_rate));
        let reader = FrameReader::open(dir, capacity, looping)?;
        tracing::info!(
            "playing {} ({} frames) at {frame_rate} fps",
            reader.dir().display(),
            reader.total_frames()
        );
        Ok(Self {
            tree: AddressTree::new(TreeConfig::without_decay(RECORD_WIDTH, period)),
            reader: Mutex::new(reader),
            period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Exclusive access to the underlying reader.
    pub fn reader(&self) -> MutexGuard<'_, FrameReader> {
        self.reader.lock()
    }

    pub fn tick(&self) -> bool {
        self.tick_at(Instant::now())
    }

    /// Apply the current frame to the tree and advance the reader.
    ///
    /// Returns `false` when there was no frame to apply.
    pub fn tick_at(&self, now: Instant) -> bool {
        let mut reader = self.reader.lock();
        let applied = match reader.current() {
            Some(frame) => {
                let leaves = self.tree.load_at(frame, now);
                tracing::trace!("applied frame with {leaves} leaves");
                true
            }
            None => false,
        };
        reader.next();
        applied
    }

    /// Tick once per frame period until the handle is stopped.
    pub fn start(self: &Arc<Self>) -> Result<PeriodicHandle> {
        let this = Arc::clone(self);
        spawn_periodic("frame playback", self.period, move || {
            this.tick();
        })
    }
}

impl TreeView for PlaybackRouter {
    fn tree(&self) -> &AddressTree {
        &self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::frame_path;
    use approx::assert_abs_diff_eq;
    use std::fs;

    fn write_frames(dir: &Path, values: &[f64]) {
        for (i, v) in values.iter().enumerate() {
            let json = format!(r#"{{"/": {{"hand": {{"1": {{"pos": [{v}, {v}, {v}]}}}}}}}}"#);
            fs::write(frame_path(dir, i), json).unwrap();
        }
    }

    #[test]
    fn test_default_buffer() {
        assert_eq!(default_buffer(24.0), 24);
        assert_eq!(default_buffer(29.97), 30);
        assert_eq!(default_buffer(0.5), 1);
    }

    #[test]
    fn test_tick_replays_frames_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        write_frames(tmp.path(), &[1.0, 2.0, 3.0]);
        let playback = PlaybackRouter::open(tmp.path(), 10.0, Some(2), false).unwrap();
        let t0 = Instant::now();
        let settle = playback.period();

        for (i, expected) in [1.0, 2.0, 3.0].iter().enumerate() {
            let now = t0 + settle * 2 * i as u32;
            assert!(playback.tick_at(now));
            let pos = playback.find("/hand/1/pos").unwrap();
            assert_eq!(pos.values_at(now + settle), vec![*expected; 3]);
        }
    }

    #[test]
    fn test_values_glide_over_one_period() {
        let tmp = tempfile::tempdir().unwrap();
        write_frames(tmp.path(), &[0.0, 10.0]);
        let playback = PlaybackRouter::open(tmp.path(), 10.0, Some(2), false).unwrap();
        let t0 = Instant::now();
        playback.tick_at(t0);
        let t1 = t0 + playback.period();
        playback.tick_at(t1);
        let mid = playback.find("/hand/1/pos").unwrap().values_at(t1 + playback.period() / 2);
        assert_abs_diff_eq!(mid[0], 5.0, epsilon = 1e-6);
    }

    #[test]
    fn test_read_interface_matches_live_shape() {
        let tmp = tempfile::tempdir().unwrap();
        write_frames(tmp.path(), &[4.0]);
        let playback = PlaybackRouter::open(tmp.path(), 10.0, None, true).unwrap();
        playback.tick_at(Instant::now());
        let pos = playback.child("hand").child("1").child("pos");
        assert_eq!(pos.target(), vec![4.0; 3]);
        assert!(playback.tree().get("/").is_none());
    }

    #[test]
    fn test_drained_reader_keeps_last_values() {
        let tmp = tempfile::tempdir().unwrap();
        write_frames(tmp.path(), &[1.0, 2.0]);
        let playback = PlaybackRouter::open(tmp.path(), 10.0, Some(2), false).unwrap();
        let t0 = Instant::now();
        assert!(playback.tick_at(t0));
        assert!(playback.tick_at(t0));
        // The reader keeps its last frame current, so the tree holds still.
        for _ in 0..3 {
            playback.tick_at(t0);
        }
        assert_eq!(playback.reader().buffered(), 0);
        assert_eq!(playback.values("/hand/1/pos").map(|v| v.len()), Some(3));
        assert_eq!(playback.find("/hand/1/pos").unwrap().target(), vec![2.0; 3]);
    }

    #[test]
    fn test_open_propagates_reader_errors() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(PlaybackRouter::open(tmp.path().join("missing"), 24.0, None, true).is_err());
        assert!(PlaybackRouter::open(tmp.path(), 0.0, None, true).is_err());
    }

    #[tokio::test]
    async fn test_start_plays_in_background() {
        let tmp = tempfile::tempdir().unwrap();
        write_frames(tmp.path(), &[7.0]);
        let playback = Arc::new(PlaybackRouter::open(tmp.path(), 50.0, None, true).unwrap());
        let handle = playback.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.join().await.unwrap();
        assert_eq!(playback.find("/hand/1/pos").unwrap().target(), vec![7.0; 3]);
    }
}
