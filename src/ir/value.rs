//! Per-value metadata
//!
//! Every named value can carry `{dtype, shape?}`. A shape is a list of
//! dimensions, each either fixed or a symbolic placeholder; rank may be
//! entirely unknown. The metadata must be kept consistent with every rewrite,
//! so the mutators here mirror the shape transforms the optimizer performs.

use super::tensor::DataType;

/// One dimension of a value's shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    /// Fixed non-negative extent
    Fixed(i64),
    /// Symbolic placeholder; treated as non-1 by the cost model
    Param(String),
}

impl Dim {
    /// Whether this dimension is statically 1
    pub fn is_one(&self) -> bool {
        matches!(self, Dim::Fixed(1))
    }

    /// Fixed extent, if known
    pub fn as_fixed(&self) -> Option<i64> {
        match self {
            Dim::Fixed(v) => Some(*v),
            Dim::Param(_) => None,
        }
    }
}

impl From<i64> for Dim {
    fn from(v: i64) -> Self {
        Dim::Fixed(v)
    }
}

/// Build a shape of fixed dimensions
pub fn fixed_dims(dims: &[i64]) -> Vec<Dim> {
    dims.iter().map(|&d| Dim::Fixed(d)).collect()
}

/// Dtype and optional shape attached to a named value
#[derive(Debug, Clone, PartialEq)]
pub struct ValueInfo {
    /// Value name
    pub name: String,
    /// Element type
    pub dtype: DataType,
    /// Shape, or `None` when the rank is unknown
    pub shape: Option<Vec<Dim>>,
}

impl ValueInfo {
    /// Metadata with a fully fixed shape
    pub fn new(name: &str, dtype: DataType, dims: &[i64]) -> Self {
        Self {
            name: name.to_string(),
            dtype,
            shape: Some(fixed_dims(dims)),
        }
    }

    /// Metadata with unknown rank
    pub fn unranked(name: &str, dtype: DataType) -> Self {
        Self {
            name: name.to_string(),
            dtype,
            shape: None,
        }
    }

    /// Rank, if the shape is known
    pub fn rank(&self) -> Option<usize> {
        self.shape.as_ref().map(|s| s.len())
    }

    /// Replace the shape with fixed dimensions
    pub fn set_shape(&mut self, dims: &[i64]) {
        self.shape = Some(fixed_dims(dims));
    }

    /// Permute the shape: `new[i] = old[perm[i]]`. No-op when the shape is
    /// unknown; `perm` must match the rank otherwise.
    pub fn permute(&mut self, perm: &[i64]) {
        if let Some(shape) = &self.shape {
            if shape.len() == perm.len() {
                self.shape = Some(perm.iter().map(|&p| shape[p as usize].clone()).collect());
            }
        }
    }

    /// Insert 1-sized dimensions at the given output positions. No-op when
    /// the shape is unknown. Axes must be non-negative, unique, and within
    /// the unsqueezed rank.
    pub fn unsqueeze(&mut self, axes: &[i64]) {
        if let Some(shape) = &self.shape {
            let new_rank = shape.len() + axes.len();
            let mut inserted = vec![false; new_rank];
            for &a in axes {
                inserted[a as usize] = true;
            }
            let mut new_shape = Vec::with_capacity(new_rank);
            let mut old = shape.iter();
            for flag in inserted {
                if flag {
                    new_shape.push(Dim::Fixed(1));
                } else if let Some(d) = old.next() {
                    new_shape.push(d.clone());
                }
            }
            self.shape = Some(new_shape);
        }
    }
}
