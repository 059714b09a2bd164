use std::time::Duration;

/// Address of the tree root, and the top-level key of every frame.
pub const ROOT_ADDRESS: &str = "/";

/// Separator between path segments in an event address.
pub const SEPARATOR: char = '/';

/// Value every component is forced to when a node decays ("no signal").
pub const IDLE_SENTINEL: f64 = -400.0;

/// Components per node until the first write re-shapes it.
pub const DEFAULT_WIDTH: usize = 1;

/// Components per node for recording trees (x, y, z positions).
pub const RECORD_WIDTH: usize = 3;

/// Transition time of an ordinary write.
pub const DEFAULT_RAMP: Duration = Duration::from_millis(10);

/// Period of the idle check on live trees.
pub const DEFAULT_IDLE_PERIOD: Duration = Duration::from_millis(100);

/// Transition time used when a node decays to the sentinel.
pub const DEFAULT_IDLE_RAMP: Duration = Duration::from_secs(1);

/// Frames per second for recording and playback.
pub const DEFAULT_FRAME_RATE: f64 = 24.0;

/// UDP port the OSC receiver binds by default.
pub const DEFAULT_PORT: u16 = 13001;
