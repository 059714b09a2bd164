use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use oscsig_core::Frame;

use crate::error::{Result, StoreError};
use crate::layout::{count_frames, frame_path};

/// Read and parse one frame file.
pub fn load_frame(path: &Path) -> Result<Frame> {
    let json = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    Frame::from_json(&json).map_err(|e| StoreError::json(path, e))
}

/// Sequential reader over a frame directory with a read-ahead buffer.
///
/// Every load attempt advances the cursor whether or not the file could be
/// read, so a recording that is still being written plays back with gaps
/// instead of errors. With looping on, the cursor wraps at the frame count
/// taken when the reader was opened (or last rescanned).
#[derive(Debug)]
pub struct FrameReader {
    dir: PathBuf,
    capacity: usize,
    looping: bool,
    total: usize,
    cursor: usize,
    buffer: VecDeque<Frame>,
    current: Option<Frame>,
}

impl FrameReader {
    /// Open `dir`, fill the buffer and make the first frame current.
    pub fn open(dir: impl AsRef<Path>, capacity: usize, looping: bool) -> Result<Self> {
        if capacity == 0 {
            return Err(StoreError::InvalidConfig(
                "read-ahead capacity must be at least 1".to_string(),
            ));
        }
        let dir = dir.as_ref().to_path_buf();
        let total = count_frames(&dir)?;
        let mut reader = Self {
            dir,
            capacity,
            looping,
            total,
            cursor: 0,
            buffer: VecDeque::new(),
            current: None,
        };
        // Without looping nothing past the last counted frame can load yet.
        let ahead = if looping {
            capacity - 1
        } else {
            (capacity - 1).min(total)
        };
        for _ in 0..ahead {
            reader.preload();
        }
        reader.next();
        tracing::debug!(
            "opened {} ({} frames, buffer {}, loop {})",
            reader.dir.display(),
            reader.total,
            reader.capacity,
            reader.looping
        );
        Ok(reader)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Frame count found in the directory.
    pub fn total_frames(&self) -> usize {
        self.total
    }

    /// Frames loaded ahead of the current one.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Index of the next frame file to load.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    /// Advance to the oldest buffered frame and load one more behind it.
    ///
    /// Returns the new current frame, or `None` when nothing was buffered;
    /// the previous frame then stays current.
    pub fn next(&mut self) -> Option<&Frame> {
        let advanced = match self.buffer.pop_front() {
            Some(frame) => {
                self.current = Some(frame);
                true
            }
            None => false,
        };
        self.preload();
        if advanced { self.current.as_ref() } else { None }
    }

    /// Value at `address` in the current frame, or [`Frame::MISSING`].
    pub fn get(&self, address: &str) -> Frame {
        self.current
            .as_ref()
            .map_or(Frame::MISSING, |frame| frame.get(address))
    }

    /// Re-count the frames, e.g. while the directory is still being recorded.
    pub fn rescan(&mut self) -> Result<usize> {
        self.total = count_frames(&self.dir)?;
        if self.looping && self.total > 0 {
            self.cursor %= self.total;
        }
        Ok(self.total)
    }

    fn preload(&mut self) {
        let path = frame_path(&self.dir, self.cursor);
        match load_frame(&path) {
            Ok(frame) => self.buffer.push_back(frame),
            Err(e) if e.is_not_found() => {
                tracing::debug!("frame {} not present, skipping", self.cursor);
            }
            Err(e) => tracing::warn!("skipping frame {}: {e}", self.cursor),
        }
        self.cursor += 1;
        if self.looping && self.total > 0 {
            self.cursor %= self.total;
        }
    }
}
