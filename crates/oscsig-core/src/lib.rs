//! Self-extending tree of smoothed signals fed by sparse, addressed events.
//!
//! Events tagged with slash-delimited addresses (`/hand/1/finger/3/pos`)
//! grow the tree on first use and retarget the signal at their node. Each
//! node glides toward its latest target, and on live trees a node that
//! stops receiving events decays to a sentinel after two idle checks.
//! Snapshots turn the tree into nested [`Frame`]s and
//! [`AddressTree::load`] turns them back.
//!
//! Zero I/O: transport, files and clocks live in other crates.

pub mod constants;
pub mod frame;
pub mod node;
pub mod router;
pub mod signal;
pub mod tree;

pub use constants::{
    DEFAULT_FRAME_RATE, DEFAULT_IDLE_PERIOD, DEFAULT_IDLE_RAMP, DEFAULT_PORT, DEFAULT_RAMP,
    DEFAULT_WIDTH, IDLE_SENTINEL, RECORD_WIDTH, ROOT_ADDRESS, SEPARATOR,
};
pub use frame::Frame;
pub use node::{IdleCheck, Node};
pub use router::{Event, EventRouter, TreeView};
pub use signal::Ramp;
pub use tree::{AddressTree, DecayReport, TreeConfig, split_address};
