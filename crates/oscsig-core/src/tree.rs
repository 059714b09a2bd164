use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::constants::{
    DEFAULT_IDLE_PERIOD, DEFAULT_IDLE_RAMP, DEFAULT_RAMP, DEFAULT_WIDTH, ROOT_ADDRESS, SEPARATOR,
};
use crate::frame::Frame;
use crate::node::{IdleCheck, Node};

/// Settings shared by every node of a tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeConfig {
    /// Components of a node before its first write.
    pub width: usize,
    /// Transition time of ordinary writes.
    pub ramp: Duration,
    /// How often idle nodes are checked; `None` disables decay.
    pub idle_period: Option<Duration>,
    /// Transition time toward the sentinel on decay.
    pub idle_ramp: Duration,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            ramp: DEFAULT_RAMP,
            idle_period: Some(DEFAULT_IDLE_PERIOD),
            idle_ramp: DEFAULT_IDLE_RAMP,
        }
    }
}

impl TreeConfig {
    /// Configuration without idle decay, as used by recorders and playback.
    pub fn without_decay(width: usize, ramp: Duration) -> Self {
        Self {
            width,
            ramp,
            idle_period: None,
            idle_ramp: DEFAULT_IDLE_RAMP,
        }
    }
}

/// Counts from one sweep of idle checks over a tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecayReport {
    pub armed: usize,
    pub decayed: usize,
}

/// Split an event address into path segments.
///
/// One leading separator is dropped and empty segments are skipped, so
/// `"/hand/1/pos"`, `"hand/1/pos"` and `"/hand//1/pos/"` all name the same
/// node. `"/"` and `""` name the root.
pub fn split_address(address: &str) -> impl Iterator<Item = &str> {
    address.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Self-extending tree of smoothed signals rooted at [`ROOT_ADDRESS`].
pub struct AddressTree {
    root: Arc<Node>,
    config: TreeConfig,
}

impl AddressTree {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            root: Arc::new(Node::new(ROOT_ADDRESS, config)),
            config,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn root(&self) -> &Arc<Node> {
        &self.root
    }

    /// Child of the root for `segment`, created if absent.
    pub fn child(&self, segment: &str) -> Arc<Node> {
        self.root.child(segment)
    }

    /// Existing child of the root, if any.
    pub fn get(&self, segment: &str) -> Option<Arc<Node>> {
        self.root.get(segment)
    }

    /// Node at `address`, creating every missing segment on the way.
    pub fn node(&self, address: &str) -> Arc<Node> {
        self.root.descend_or_create(split_address(address))
    }

    /// Node at `address` if the whole path already exists.
    pub fn find(&self, address: &str) -> Option<Arc<Node>> {
        self.root.descend(split_address(address))
    }

    /// Total number of nodes, root included.
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.root.for_each(&mut |_: &Arc<Node>| count += 1);
        count
    }

    /// A tree always holds at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn snapshot(&self) -> Frame {
        self.snapshot_at(Instant::now())
    }

    /// The whole tree as `{"/": <root snapshot>}`.
    pub fn snapshot_at(&self, now: Instant) -> Frame {
        Frame::Branch([(ROOT_ADDRESS.to_string(), self.root.snapshot_at(now))].into())
    }

    pub fn load(&self, frame: &Frame) -> usize {
        self.load_at(frame, Instant::now())
    }

    /// Assign every leaf of `frame` to the matching node, creating nodes as
    /// needed. The inverse of [`snapshot`](Self::snapshot): the top-level
    /// `"/"` key is the root itself. Returns how many leaves were assigned.
    pub fn load_at(&self, frame: &Frame, now: Instant) -> usize {
        match frame {
            Frame::Branch(entries) => entries
                .iter()
                .map(|(key, sub)| {
                    let node = if key == ROOT_ADDRESS {
                        Arc::clone(&self.root)
                    } else {
                        self.root.child(key)
                    };
                    assign(&node, sub, now)
                })
                .sum(),
            leaf => assign(&self.root, leaf, now),
        }
    }

    pub fn decay_tick(&self) -> DecayReport {
        self.decay_tick_at(Instant::now())
    }

    /// Run one idle check on every node.
    pub fn decay_tick_at(&self, now: Instant) -> DecayReport {
        let mut report = DecayReport::default();
        if self.config.idle_period.is_none() {
            return report;
        }
        self.root.for_each(&mut |node: &Arc<Node>| match node.idle_tick_at(now) {
            IdleCheck::Armed => report.armed += 1,
            IdleCheck::Decayed => report.decayed += 1,
            IdleCheck::Disabled => {}
        });
        report
    }
}

impl Default for AddressTree {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

fn assign(node: &Arc<Node>, frame: &Frame, now: Instant) -> usize {
    match frame {
        Frame::Branch(entries) => entries
            .iter()
            .map(|(key, sub)| assign(&node.child(key), sub, now))
            .sum(),
        Frame::Values(values) => {
            node.set_value_at(values, true, None, now);
            1
        }
        Frame::Scalar(value) => {
            node.set_value_at(&[*value], true, None, now);
            1
        }
    }
}
