//! Serialized snapshot of an address tree.
//!
//! The JSON shape is the one recordings have always used: objects for
//! branches, arrays (or bare numbers) for leaf values, and a single
//! top-level `"/"` key for the root, e.g. `{"/": {"hand": {"1": [0.1, 0.2]}}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{ROOT_ADDRESS, SEPARATOR};
use crate::tree::split_address;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Scalar(f64),
    Values(Vec<f64>),
    Branch(BTreeMap<String, Frame>),
}

impl Frame {
    /// Value returned for addresses a frame does not contain.
    pub const MISSING: Frame = Frame::Scalar(0.0);

    /// A branch with no entries.
    pub fn empty() -> Self {
        Frame::Branch(BTreeMap::new())
    }

    pub fn is_leaf(&self) -> bool {
        !matches!(self, Frame::Branch(_))
    }

    /// Leaf components; `None` for branches.
    pub fn values(&self) -> Option<Vec<f64>> {
        match self {
            Frame::Scalar(v) => Some(vec![*v]),
            Frame::Values(v) => Some(v.clone()),
            Frame::Branch(_) => None,
        }
    }

    /// Sub-frame at `address`, starting below the root key.
    ///
    /// Frames without a `"/"` key are walked from their top level.
    pub fn lookup(&self, address: &str) -> Option<&Frame> {
        let mut current = match self {
            Frame::Branch(entries) => entries.get(ROOT_ADDRESS).unwrap_or(self),
            leaf => leaf,
        };
        for segment in split_address(address) {
            match current {
                Frame::Branch(entries) => current = entries.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    /// Like [`lookup`](Self::lookup), but an absent address yields
    /// [`Frame::MISSING`] so every query has an answer.
    pub fn get(&self, address: &str) -> Frame {
        self.lookup(address).cloned().unwrap_or(Frame::MISSING)
    }

    /// Every leaf as `(address, values)`, in address order.
    pub fn leaves(&self) -> Vec<(String, Vec<f64>)> {
        let mut out = Vec::new();
        let start = match self {
            Frame::Branch(entries) => entries.get(ROOT_ADDRESS).unwrap_or(self),
            leaf => leaf,
        };
        collect_leaves(start, String::new(), &mut out);
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Default for Frame {
    fn default() -> Self {
        Frame::empty()
    }
}

fn collect_leaves(frame: &Frame, prefix: String, out: &mut Vec<(String, Vec<f64>)>) {
    match frame {
        Frame::Branch(entries) => {
            for (key, sub) in entries {
                collect_leaves(sub, format!("{prefix}{SEPARATOR}{key}"), out);
            }
        }
        leaf => {
            let address = if prefix.is_empty() {
                ROOT_ADDRESS.to_string()
            } else {
                prefix
            };
            out.push((address, leaf.values().unwrap_or_default()));
        }
    }
}
