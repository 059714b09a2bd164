use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::constants::IDLE_SENTINEL;
use crate::frame::Frame;
use crate::signal::Ramp;
use crate::tree::TreeConfig;

/// Outcome of one idle check on a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleCheck {
    /// The tree has no idle period.
    Disabled,
    /// The node was written since the previous check; it will decay on the
    /// next one unless written again.
    Armed,
    /// The node went a full period without a write and is held at the sentinel.
    Decayed,
}

struct NodeState {
    signal: Ramp,
    idle: bool,
    written: bool,
}

/// One path segment of an [`AddressTree`](crate::AddressTree).
///
/// Every node carries a smoothed value, including nodes that also have
/// children. Children sit behind the node's own `RwLock` and the value
/// behind its own `Mutex`, so writers on unrelated paths never contend.
pub struct Node {
    address: String,
    config: TreeConfig,
    children: RwLock<HashMap<String, Arc<Node>>>,
    state: Mutex<NodeState>,
}

impl Node {
    pub(crate) fn new(address: &str, config: TreeConfig) -> Self {
        Self {
            address: address.to_string(),
            config,
            children: RwLock::new(HashMap::new()),
            state: Mutex::new(NodeState {
                signal: Ramp::new(config.width),
                idle: true,
                written: false,
            }),
        }
    }

    /// The path segment naming this node among its siblings.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Return the child for `segment`, creating it if absent.
    ///
    /// New children inherit this node's width, ramp and idle settings.
    pub fn child(&self, segment: &str) -> Arc<Node> {
        if let Some(existing) = self.children.read().get(segment) {
            return Arc::clone(existing);
        }
        let mut children = self.children.write();
        Arc::clone(
            children
                .entry(segment.to_string())
                .or_insert_with(|| Arc::new(Node::new(segment, self.config))),
        )
    }

    /// Look up an existing child without creating it.
    pub fn get(&self, segment: &str) -> Option<Arc<Node>> {
        self.children.read().get(segment).cloned()
    }

    /// Children sorted by address.
    pub fn children(&self) -> Vec<Arc<Node>> {
        let mut children: Vec<Arc<Node>> = self.children.read().values().cloned().collect();
        children.sort_by(|a, b| a.address.cmp(&b.address));
        children
    }

    pub fn child_count(&self) -> usize {
        self.children.read().len()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.read().is_empty()
    }

    /// Walk existing descendants by segment; `None` as soon as one is missing.
    pub fn descend<'a>(
        self: &Arc<Self>,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Option<Arc<Node>> {
        let mut node = Arc::clone(self);
        for segment in segments {
            node = node.get(segment)?;
        }
        Some(node)
    }

    /// Walk descendants by segment, creating missing ones.
    pub fn descend_or_create<'a>(
        self: &Arc<Self>,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Arc<Node> {
        let mut node = Arc::clone(self);
        for segment in segments {
            node = node.child(segment);
        }
        node
    }

    pub fn set_value(&self, values: &[f64], reset_idle: bool, ramp: Option<Duration>) -> bool {
        self.set_value_at(values, reset_idle, ramp, Instant::now())
    }

    /// Assign new targets to the node's signal.
    ///
    /// `ramp` overrides the tree's transition time for this write only. An
    /// empty `values` slice leaves the signal untouched but still counts as
    /// activity when `reset_idle` is set.
    ///
    /// Values containing NaN or an infinity are rejected whole: they cannot
    /// be written to a frame file. The write still counts as activity.
    /// Returns `false` when the values were rejected.
    pub fn set_value_at(
        &self,
        values: &[f64],
        reset_idle: bool,
        ramp: Option<Duration>,
        now: Instant,
    ) -> bool {
        let accepted = values.iter().all(|v| v.is_finite());
        let mut state = self.state.lock();
        if accepted && !values.is_empty() {
            let ramp = ramp.unwrap_or(self.config.ramp);
            state.signal.set_target_at(values, ramp, now);
            state.written = true;
        }
        if reset_idle {
            state.idle = false;
        }
        accepted
    }

    pub fn values(&self) -> Vec<f64> {
        self.values_at(Instant::now())
    }

    pub fn values_at(&self, now: Instant) -> Vec<f64> {
        self.state.lock().signal.values_at(now)
    }

    /// Values the signal is heading to.
    pub fn target(&self) -> Vec<f64> {
        self.state.lock().signal.target().to_vec()
    }

    /// Transition time of the most recent assignment.
    pub fn ramp(&self) -> Duration {
        self.state.lock().signal.ramp()
    }

    pub fn is_idle(&self) -> bool {
        self.state.lock().idle
    }

    /// Whether any write ever landed on this node.
    pub fn was_written(&self) -> bool {
        self.state.lock().written
    }

    pub fn idle_tick(&self) -> IdleCheck {
        self.idle_tick_at(Instant::now())
    }

    /// One firing of the idle timer.
    ///
    /// An idle node is forced to the sentinel over the idle ramp; a busy
    /// node is marked idle so that the next firing decays it unless a
    /// write arrives first.
    pub fn idle_tick_at(&self, now: Instant) -> IdleCheck {
        if self.config.idle_period.is_none() {
            return IdleCheck::Disabled;
        }
        let mut state = self.state.lock();
        if !state.idle {
            state.idle = true;
            return IdleCheck::Armed;
        }
        let sentinel = vec![IDLE_SENTINEL; state.signal.width()];
        // Re-targeting an in-flight decay would restart it and never land.
        if state.signal.target() != sentinel.as_slice() {
            state
                .signal
                .set_target_at(&sentinel, self.config.idle_ramp, now);
        }
        IdleCheck::Decayed
    }

    pub fn snapshot(&self) -> Frame {
        self.snapshot_at(Instant::now())
    }

    /// Nested view of this node's subtree.
    ///
    /// Leaves contribute their current values. A node with children
    /// contributes only its children: its own value is not part of the
    /// frame, so addresses should be used consistently as either leaves or
    /// branches.
    pub fn snapshot_at(&self, now: Instant) -> Frame {
        let children = self.children();
        if children.is_empty() {
            return Frame::Values(self.values_at(now));
        }
        Frame::Branch(
            children
                .iter()
                .map(|c| (c.address.clone(), c.snapshot_at(now)))
                .collect(),
        )
    }

    /// Visit this node and every descendant, depth first.
    pub fn for_each(self: &Arc<Self>, f: &mut impl FnMut(&Arc<Node>)) {
        f(self);
        for child in self.children() {
            child.for_each(f);
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.address)
            .field("children", &self.child_count())
            .field("target", &self.target())
            .field("idle", &self.is_idle())
            .finish()
    }
}
