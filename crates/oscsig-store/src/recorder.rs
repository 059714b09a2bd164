use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use oscsig_core::{EventRouter, Frame};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, StoreError};
use crate::layout::{frame_path, recreate_dir};
use crate::periodic::{PeriodicHandle, frame_period, spawn_periodic};

/// Snapshots waiting for the writer before the clock starts dropping them.
pub const WRITE_QUEUE_FRAMES: usize = 256;

/// Writes snapshots of an [`EventRouter`]'s tree as numbered frame files.
pub struct FrameRecorder {
    dir: PathBuf,
    period: Duration,
    router: Arc<EventRouter>,
    next_index: usize,
}

/// What a finished recording produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordSummary {
    pub dir: PathBuf,
    pub frames: usize,
    pub failures: usize,
}

impl FrameRecorder {
    /// Prepare a recording into `dir`.
    ///
    /// The directory is recreated empty: anything already in it is deleted.
    pub fn create(dir: impl AsRef<Path>, frame_rate: f64, router: Arc<EventRouter>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let period = frame_period(frame_rate)?;
        recreate_dir(&dir)?;
        tracing::info!("recording to {} at {frame_rate} fps", dir.display());
        Ok(Self {
            dir,
            period,
            router,
            next_index: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    /// Frames written so far; also the index of the next one.
    pub fn frames_written(&self) -> usize {
        self.next_index
    }

    /// Snapshot the tree and write it as the next frame. Returns its index.
    pub fn capture(&mut self) -> Result<usize> {
        let frame = self.router.snapshot();
        self.write_frame(&frame)
    }

    /// Write `frame` as the next frame file.
    ///
    /// The counter only advances on success, so a failed write is retried
    /// under the same index by the next frame and numbering stays gapless.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<usize> {
        let index = self.next_index;
        let path = frame_path(&self.dir, index);
        let json = frame.to_json().map_err(|e| StoreError::json(&path, e))?;
        fs::write(&path, json).map_err(|e| StoreError::io(&path, e))?;
        self.next_index += 1;
        Ok(index)
    }

    /// Capture one frame per period until the returned handle is stopped.
    ///
    /// The clock task only snapshots the tree; serialization and file
    /// writes happen on a blocking writer fed through a bounded queue, in
    /// capture order. When the writer falls [`WRITE_QUEUE_FRAMES`] behind,
    /// new snapshots are dropped and counted as failures.
    pub fn start(self) -> Result<RecordingHandle> {
        let (tx, mut rx) = mpsc::channel::<Frame>(WRITE_QUEUE_FRAMES);
        let dropped = Arc::new(AtomicUsize::new(0));
        let router = Arc::clone(&self.router);
        let ticker_dropped = Arc::clone(&dropped);
        let ticker = spawn_periodic("frame capture", self.period, move || {
            enqueue(&tx, router.snapshot(), &ticker_dropped);
        })?;

        let mut recorder = self;
        let writer = tokio::task::spawn_blocking(move || {
            let mut failures = 0;
            while let Some(frame) = rx.blocking_recv() {
                if let Err(e) = recorder.write_frame(&frame) {
                    failures += 1;
                    tracing::warn!("failed to write frame {}: {e}", recorder.next_index);
                }
            }
            (recorder, failures)
        });

        Ok(RecordingHandle {
            ticker,
            writer,
            dropped,
        })
    }
}

/// Queue `frame` for the writer without blocking the clock.
fn enqueue(tx: &mpsc::Sender<Frame>, frame: Frame, dropped: &AtomicUsize) {
    match tx.try_send(frame) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!("frame writer is behind; dropped snapshot ({total} so far)");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            tracing::debug!("frame writer closed; dropping snapshot");
        }
    }
}

/// A recording in progress.
pub struct RecordingHandle {
    ticker: PeriodicHandle,
    writer: JoinHandle<(FrameRecorder, usize)>,
    dropped: Arc<AtomicUsize>,
}

impl RecordingHandle {
    /// Stop capturing, flush queued frames and hand the recorder back.
    pub async fn stop(self) -> Result<(FrameRecorder, RecordSummary)> {
        self.ticker.join().await?;
        let (recorder, failures) = self.writer.await?;
        let summary = RecordSummary {
            dir: recorder.dir.clone(),
            frames: recorder.next_index,
            failures: failures + self.dropped.load(Ordering::Relaxed),
        };
        tracing::info!(
            "recorded {} frames to {} ({} failed or dropped)",
            summary.frames,
            summary.dir.display(),
            summary.failures
        );
        Ok((recorder, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::count_frames;
    use oscsig_core::TreeConfig;

    fn router() -> Arc<EventRouter> {
        Arc::new(EventRouter::new(TreeConfig::without_decay(3, Duration::ZERO)))
    }

    #[test]
    fn test_create_recreates_existing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("rec");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("frame0.json"), "stale").unwrap();
        fs::write(dir.join("other.txt"), "stale").unwrap();

        let recorder = FrameRecorder::create(&dir, 24.0, router()).unwrap();
        assert_eq!(recorder.frames_written(), 0);
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_create_rejects_bad_rate() {
        let tmp = tempfile::tempdir().unwrap();
        let result = FrameRecorder::create(tmp.path().join("rec"), 0.0, router());
        assert!(matches!(result, Err(StoreError::InvalidConfig(_))));
        assert!(!tmp.path().join("rec").exists());
    }

    #[test]
    fn test_capture_numbers_frames_from_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let router = router();
        let mut recorder = FrameRecorder::create(tmp.path(), 1.0, Arc::clone(&router)).unwrap();

        for v in 1..=3 {
            router.route("/a/b", &[v as f64]);
            assert_eq!(recorder.capture().unwrap(), v - 1);
        }
        assert_eq!(count_frames(tmp.path()).unwrap(), 3);
        let last = fs::read_to_string(frame_path(tmp.path(), 2)).unwrap();
        assert_eq!(last, r#"{"/":{"a":{"b":[3.0]}}}"#);
    }

    #[test]
    fn test_write_failure_is_reported_and_index_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("rec");
        let mut recorder = FrameRecorder::create(&dir, 1.0, router()).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        let err = recorder.capture().unwrap_err();
        assert!(err.is_not_found(), "unexpected error: {err}");
        assert_eq!(recorder.frames_written(), 0);

        fs::create_dir(&dir).unwrap();
        assert_eq!(recorder.capture().unwrap(), 0);
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel::<Frame>(2);
        let dropped = AtomicUsize::new(0);
        for v in 0..5 {
            enqueue(&tx, Frame::Scalar(v as f64), &dropped);
        }
        assert_eq!(dropped.load(Ordering::Relaxed), 3);
        assert_eq!(rx.try_recv().unwrap(), Frame::Scalar(0.0));
        assert_eq!(rx.try_recv().unwrap(), Frame::Scalar(1.0));
        assert!(rx.try_recv().is_err());

        drop(rx);
        enqueue(&tx, Frame::Scalar(9.0), &dropped);
        assert_eq!(dropped.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_start_and_stop_writes_ordered_frames() {
        let tmp = tempfile::tempdir().unwrap();
        let router = router();
        router.route("/x", &[1.0, 2.0, 3.0]);
        let recorder = FrameRecorder::create(tmp.path(), 100.0, Arc::clone(&router)).unwrap();

        let handle = recorder.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let (recorder, summary) = handle.stop().await.unwrap();

        assert!(summary.frames >= 2, "expected frames, got {}", summary.frames);
        assert_eq!(summary.failures, 0);
        assert_eq!(recorder.frames_written(), summary.frames);
        assert_eq!(count_frames(tmp.path()).unwrap(), summary.frames);
        for i in 0..summary.frames {
            let json = fs::read_to_string(frame_path(tmp.path(), i)).unwrap();
            let frame = Frame::from_json(&json).unwrap();
            assert_eq!(frame.get("/x"), Frame::Values(vec![1.0, 2.0, 3.0]));
        }
    }
}
