//! Graph map types
//!
//! Type aliases for the lookup structures the graph maintains incrementally.
//! Consumer lists are per-input-slot: a node consuming a value through two
//! slots appears twice, which keeps slot-level rewiring exact.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::ir::{Node, Tensor, ValueInfo};

/// Maps output value name → producer node name
pub type ProducerMap = FxHashMap<String, String>;

/// Maps value name → consumer node names, one entry per consuming input slot.
/// SmallVec optimized for the common case of 1-4 consumers.
pub type ConsumerMap = FxHashMap<String, SmallVec<[String; 4]>>;

/// Maps node name → node, insertion order preserved
pub type NodeMap = IndexMap<String, Node>;

/// Maps initializer name → tensor
pub type InitializerMap = FxHashMap<String, Tensor>;

/// Maps value name → metadata
pub type ValueInfoMap = FxHashMap<String, ValueInfo>;

/// Consumers of a value, with a completeness marker
///
/// `comprehensive` is false when the list may be incomplete — the value is
/// observable outside the graph (a declared graph output). Such values must
/// be preserved by name across rewrites.
#[derive(Debug, Clone)]
pub struct ValueConsumers {
    /// Names of consuming nodes, deduplicated
    pub nodes: Vec<String>,
    /// Whether `nodes` enumerates every use of the value
    pub comprehensive: bool,
}
