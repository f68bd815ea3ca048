//! # Layout Optimizer
//!
//! Transpose-pushing optimizer for computation graphs expressed in the ONNX
//! operator vocabulary.
//!
//! The optimizer removes or consolidates explicit `Transpose` nodes by moving
//! them through surrounding operators until they cancel with an inverse
//! partner or migrate somewhere they are free (typically into constant
//! initializers). A second entry point rewrites a chosen set of operators
//! between channels-last and channels-first form by wrapping them in
//! transpose pairs and letting the same optimizer absorb the wrappers.
//!
//! ## Example
//!
//! ```ignore
//! use layout_optimizer::prelude::*;
//!
//! let mut graph = build_graph()?;
//! let changed = optimize(&mut graph, /*allow_extended_ops*/ false);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod graph;
pub mod ir;
pub mod layout;
pub mod optimizer;
pub mod perm;

/// Prelude module - import commonly used types with `use layout_optimizer::prelude::*`
pub mod prelude {
    pub use crate::error::{OptResult, TransformError};
    pub use crate::graph::{Graph, ValueConsumers};
    pub use crate::ir::{AttrValue, Attribute, DataType, Dim, Node, Tensor, TensorData, ValueInfo};
    pub use crate::layout::{
        channel_first_to_last, channel_last_to_first, LayoutPolicy, LayoutPolicyMap,
        LayoutPolicyResult,
    };
    pub use crate::optimizer::optimize;
}

pub use error::{OptResult, TransformError};
pub use graph::Graph;
pub use layout::{channel_first_to_last, channel_last_to_first};
pub use optimizer::optimize;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported opset of the default operator domain
pub const SUPPORTED_OPSET_MIN: i64 = 9;
/// Maximum supported opset of the default operator domain
pub const SUPPORTED_OPSET_MAX: i64 = 17;
