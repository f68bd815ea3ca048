//! In-crate graph IR
//!
//! The optimizer operates on a small IR mirroring the ONNX object model:
//! nodes with opaque `op_type`/`domain` labels, named values, constant
//! initializers, and per-value dtype/shape metadata. Serialization is out of
//! scope; the types here exist so rewrites can be expressed and tested
//! without a model format in the loop.

pub mod node;
pub mod tensor;
pub mod value;

pub use node::{AttrValue, Attribute, Node};
pub use tensor::{DataType, Tensor, TensorData};
pub use value::{Dim, ValueInfo};
