//! Frame recording and playback for `oscsig-core` trees.
//!
//! A recording is a flat directory of `frame<N>.json` snapshots written at a
//! fixed frame rate. Playback reads them back with a bounded read-ahead
//! buffer and replays them into a tree that reads exactly like a live one.

pub mod config;
pub mod error;
pub mod layout;
pub mod periodic;
pub mod playback;
pub mod reader;
pub mod recorder;

pub use config::{Config, ListenConfig, PlaybackConfig, RecordConfig};
pub use error::{Result, StoreError};
pub use layout::{count_frames, frame_file_name, frame_path, parse_frame_index};
pub use periodic::{PeriodicHandle, frame_period, spawn_periodic, start_idle_decay};
pub use playback::{PlaybackRouter, default_buffer};
pub use reader::{FrameReader, load_frame};
pub use recorder::{FrameRecorder, RecordSummary, RecordingHandle};
