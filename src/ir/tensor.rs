//! Constant tensors
//!
//! Initializers and `Constant` node payloads. The optimizer only ever reads
//! integer data (axes, pads, repeats) and permutes or reshapes whole tensors
//! in place, so the storage is a plain typed enum rather than raw bytes.

use ndarray::{ArrayD, IxDyn};

use crate::error::{OptResult, TransformError};

/// Scalar element type of a value or tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// 64-bit signed integer
    Int64,
    /// 32-bit signed integer
    Int32,
    /// 16-bit signed integer
    Int16,
    /// 8-bit signed integer
    Int8,
    /// 8-bit unsigned integer
    Uint8,
    /// 16-bit unsigned integer
    Uint16,
    /// Boolean
    Bool,
}

impl DataType {
    /// Whether this is one of the 8-bit integer types
    pub fn is_8bit(&self) -> bool {
        matches!(self, DataType::Int8 | DataType::Uint8)
    }
}

/// Typed tensor storage
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    /// 32-bit floats
    F32(Vec<f32>),
    /// 64-bit floats
    F64(Vec<f64>),
    /// 64-bit signed integers
    I64(Vec<i64>),
    /// 32-bit signed integers
    I32(Vec<i32>),
    /// 16-bit signed integers
    I16(Vec<i16>),
    /// 8-bit signed integers
    I8(Vec<i8>),
    /// 8-bit unsigned integers
    U8(Vec<u8>),
    /// 16-bit unsigned integers
    U16(Vec<u16>),
    /// Booleans
    Bool(Vec<bool>),
}

impl TensorData {
    /// Element type of the storage
    pub fn dtype(&self) -> DataType {
        match self {
            TensorData::F32(_) => DataType::Float,
            TensorData::F64(_) => DataType::Double,
            TensorData::I64(_) => DataType::Int64,
            TensorData::I32(_) => DataType::Int32,
            TensorData::I16(_) => DataType::Int16,
            TensorData::I8(_) => DataType::Int8,
            TensorData::U8(_) => DataType::Uint8,
            TensorData::U16(_) => DataType::Uint16,
            TensorData::Bool(_) => DataType::Bool,
        }
    }

    /// Number of stored elements
    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I16(v) => v.len(),
            TensorData::I8(v) => v.len(),
            TensorData::U8(v) => v.len(),
            TensorData::U16(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }

    /// Whether the storage is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named constant tensor
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    /// Tensor name
    pub name: String,
    /// Shape; empty for a scalar
    pub dims: Vec<i64>,
    /// Typed element storage
    pub data: TensorData,
}

impl Tensor {
    /// Create a 1-D int64 tensor
    pub fn from_i64s(name: &str, data: Vec<i64>) -> Self {
        Self {
            name: name.to_string(),
            dims: vec![data.len() as i64],
            data: TensorData::I64(data),
        }
    }

    /// Create a 1-D int32 tensor
    pub fn from_i32s(name: &str, data: Vec<i32>) -> Self {
        Self {
            name: name.to_string(),
            dims: vec![data.len() as i64],
            data: TensorData::I32(data),
        }
    }

    /// Create an f32 tensor with the given shape
    pub fn from_f32s(name: &str, dims: Vec<i64>, data: Vec<f32>) -> Self {
        Self {
            name: name.to_string(),
            dims,
            data: TensorData::F32(data),
        }
    }

    /// Element type
    pub fn dtype(&self) -> DataType {
        self.data.dtype()
    }

    /// Total number of elements implied by the shape
    pub fn numel(&self) -> usize {
        self.dims.iter().map(|&d| d as usize).product()
    }

    /// Integer data widened to i64; `None` unless the tensor is int64 or int32
    pub fn int_data(&self) -> Option<Vec<i64>> {
        match &self.data {
            TensorData::I64(v) => Some(v.clone()),
            TensorData::I32(v) => Some(v.iter().map(|&x| x as i64).collect()),
            _ => None,
        }
    }

    /// Replace the shape without moving data. The element count must match.
    pub fn reshape(&mut self, dims: Vec<i64>) -> OptResult<()> {
        let new_numel: usize = dims.iter().map(|&d| d as usize).product();
        if new_numel != self.data.len() {
            return Err(TransformError::ShapeMismatch(format!(
                "cannot reshape {} elements into {:?}",
                self.data.len(),
                dims
            )));
        }
        self.dims = dims;
        Ok(())
    }

    /// Permute the tensor's axes in place; `perm` must be a valid permutation
    /// of `dims.len()`.
    pub fn transpose(&mut self, perm: &[i64]) -> OptResult<()> {
        if !crate::perm::is_valid_perm(perm) || perm.len() != self.dims.len() {
            return Err(TransformError::InvalidPermutation {
                perm: perm.to_vec(),
                rank: self.dims.len(),
            });
        }
        let axes: Vec<usize> = perm.iter().map(|&p| p as usize).collect();
        let (dims, data) = match &self.data {
            TensorData::F32(v) => permute_flat(&self.dims, v, &axes).map(|(d, v)| (d, TensorData::F32(v)))?,
            TensorData::F64(v) => permute_flat(&self.dims, v, &axes).map(|(d, v)| (d, TensorData::F64(v)))?,
            TensorData::I64(v) => permute_flat(&self.dims, v, &axes).map(|(d, v)| (d, TensorData::I64(v)))?,
            TensorData::I32(v) => permute_flat(&self.dims, v, &axes).map(|(d, v)| (d, TensorData::I32(v)))?,
            TensorData::I16(v) => permute_flat(&self.dims, v, &axes).map(|(d, v)| (d, TensorData::I16(v)))?,
            TensorData::I8(v) => permute_flat(&self.dims, v, &axes).map(|(d, v)| (d, TensorData::I8(v)))?,
            TensorData::U8(v) => permute_flat(&self.dims, v, &axes).map(|(d, v)| (d, TensorData::U8(v)))?,
            TensorData::U16(v) => permute_flat(&self.dims, v, &axes).map(|(d, v)| (d, TensorData::U16(v)))?,
            TensorData::Bool(v) => permute_flat(&self.dims, v, &axes).map(|(d, v)| (d, TensorData::Bool(v)))?,
        };
        self.dims = dims;
        self.data = data;
        Ok(())
    }
}

/// Permute a row-major buffer: output axis `i` is input axis `axes[i]`.
fn permute_flat<T: Clone>(dims: &[i64], data: &[T], axes: &[usize]) -> OptResult<(Vec<i64>, Vec<T>)> {
    let shape: Vec<usize> = dims.iter().map(|&d| d as usize).collect();
    let arr = ArrayD::from_shape_vec(IxDyn(&shape), data.to_vec())
        .map_err(|e| TransformError::ShapeMismatch(e.to_string()))?;
    let permuted = arr.permuted_axes(IxDyn(axes));
    let new_dims = permuted.shape().iter().map(|&d| d as i64).collect();
    let flat = permuted.iter().cloned().collect();
    Ok((new_dims, flat))
}
