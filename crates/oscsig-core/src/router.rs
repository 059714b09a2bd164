use std::sync::Arc;
use std::time::Instant;

use crate::frame::Frame;
use crate::node::Node;
use crate::tree::{AddressTree, TreeConfig};

/// A tagged message from the transport: an address and its numeric arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub address: String,
    pub values: Vec<f64>,
}

impl Event {
    pub fn new(address: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            address: address.into(),
            values,
        }
    }
}

/// Read access shared by live and replayed trees.
///
/// Downstream consumers index by segment and read the smoothed values
/// without caring whether events or a recording feed the tree.
pub trait TreeView {
    fn tree(&self) -> &AddressTree;

    /// Child of the root, created if absent so consumers can hold a handle
    /// before any data has arrived.
    fn child(&self, segment: &str) -> Arc<Node> {
        self.tree().child(segment)
    }

    fn find(&self, address: &str) -> Option<Arc<Node>> {
        self.tree().find(address)
    }

    /// Current values at `address`; `None` until the address exists.
    fn values(&self, address: &str) -> Option<Vec<f64>> {
        self.find(address).map(|node| node.values())
    }

    fn snapshot(&self) -> Frame {
        self.tree().snapshot()
    }
}

/// Routes incoming events into an [`AddressTree`].
pub struct EventRouter {
    tree: AddressTree,
}

impl EventRouter {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            tree: AddressTree::new(config),
        }
    }

    pub fn route(&self, address: &str, values: &[f64]) -> bool {
        self.route_at(address, values, Instant::now())
    }

    /// Walk (and grow) the tree along `address` and write `values` at its end.
    ///
    /// Returns `false` when the values were rejected for holding NaN or an
    /// infinity; the node still exists and counts as active.
    pub fn route_at(&self, address: &str, values: &[f64], now: Instant) -> bool {
        self.tree
            .node(address)
            .set_value_at(values, true, None, now)
    }

    pub fn route_event(&self, event: &Event) -> bool {
        self.route(&event.address, &event.values)
    }

    pub fn snapshot(&self) -> Frame {
        self.tree.snapshot()
    }

    pub fn snapshot_at(&self, now: Instant) -> Frame {
        self.tree.snapshot_at(now)
    }

    /// Existing child of the root, if any.
    pub fn get(&self, segment: &str) -> Option<Arc<Node>> {
        self.tree.get(segment)
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

impl TreeView for EventRouter {
    fn tree(&self) -> &AddressTree {
        &self.tree
    }
}
