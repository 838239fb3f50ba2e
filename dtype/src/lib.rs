//! Tensor element types and shapes.
//!
//! Element types follow the ONNX `TensorProto.DataType` numbering so that a
//! saved graph can be mapped back onto an ONNX model without a lookup table.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;


/// Marker for a dimension whose extent is not known at compile time.
pub const DYNAMIC_DIM: i64 = -1;

/// Dimension list. Most tensors in vision/NLP graphs have rank <= 4.
pub type Dims = SmallVec<[i64; 4]>;

/// Tensor element types.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr, strum::Display, strum::EnumString)]
#[derive(enumset::EnumSetType)]
#[derive(Serialize, Deserialize)]
#[cfg_attr(any(test, feature = "proptest"), derive(proptest_derive::Arbitrary))]
#[strum(serialize_all = "lowercase")]
#[enumset(repr = "u32")]
pub enum ElemType {
    Undefined = 0,
    Float32 = 1,
    UInt8 = 2,
    Int8 = 3,
    UInt16 = 4,
    Int16 = 5,
    Int32 = 6,
    Int64 = 7,
    String = 8,
    Bool = 9,
    Float16 = 10,
    Float64 = 11,
    UInt32 = 12,
    UInt64 = 13,
    BFloat16 = 16,
}

impl ElemType {
    /// Size of one element in bytes. Strings and undefined report 0.
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Undefined | Self::String => 0,
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 | Self::Float16 | Self::BFloat16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float32 => 4,
            Self::Int64 | Self::UInt64 | Self::Float64 => 8,
        }
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    /// ONNX `TensorProto.DataType` value.
    pub const fn onnx_code(&self) -> i32 {
        *self as i32
    }

    pub fn from_onnx_code(code: i32) -> Option<Self> {
        usize::try_from(code).ok().and_then(Self::from_repr)
    }
}

/// Element type plus a shape that may be unknown.
///
/// `shape == None` means the rank itself is unknown; a known rank with an
/// unknown extent uses [`DYNAMIC_DIM`] for that dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TensorType {
    pub elem: ElemType,
    pub shape: Option<Dims>,
}

impl TensorType {
    pub fn new(elem: ElemType, shape: impl IntoIterator<Item = i64>) -> Self {
        Self { elem, shape: Some(shape.into_iter().collect()) }
    }

    /// Tensor type with unknown shape.
    pub fn unknown(elem: ElemType) -> Self {
        Self { elem, shape: None }
    }

    pub fn scalar(elem: ElemType) -> Self {
        Self { elem, shape: Some(Dims::new()) }
    }

    pub fn with_shape(mut self, shape: Option<Dims>) -> Self {
        self.shape = shape;
        self
    }

    pub fn rank(&self) -> Option<usize> {
        self.shape.as_ref().map(|s| s.len())
    }

    /// True when the rank and every extent are known.
    pub fn is_static(&self) -> bool {
        self.shape.as_ref().is_some_and(|s| s.iter().all(|&d| d >= 0))
    }

    /// Number of elements, `None` unless the shape is static.
    pub fn num_elements(&self) -> Option<u64> {
        if !self.is_static() {
            return None;
        }
        self.shape.as_ref().map(|s| s.iter().map(|&d| d as u64).product())
    }

    /// Byte size of a dense tensor of this type, `None` unless the shape is static.
    pub fn byte_size(&self) -> Option<u64> {
        self.num_elements().map(|n| n * self.elem.bytes() as u64)
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.shape {
            None => write!(f, "{}[?]", self.elem),
            Some(dims) => {
                write!(f, "{}[", self.elem)?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if *d < 0 { write!(f, "?")? } else { write!(f, "{d}")? }
                }
                write!(f, "]")
            }
        }
    }
}

// =========================================================================
// Permutations
// =========================================================================

/// Check that `order` is a permutation of `0..order.len()`.
pub fn is_permutation(order: &[i64]) -> bool {
    let mut seen = vec![false; order.len()];
    for &axis in order {
        let Ok(axis) = usize::try_from(axis) else { return false };
        if axis >= seen.len() || seen[axis] {
            return false;
        }
        seen[axis] = true;
    }
    true
}

pub fn is_identity_permutation(order: &[i64]) -> bool {
    order.iter().enumerate().all(|(i, &axis)| axis == i as i64)
}

/// Apply a transpose permutation to a shape: `out[i] = shape[order[i]]`.
pub fn permute_shape(shape: &[i64], order: &[i64]) -> Option<Dims> {
    if shape.len() != order.len() || !is_permutation(order) {
        return None;
    }
    Some(order.iter().map(|&axis| shape[axis as usize]).collect())
}

/// Permutation equivalent to transposing by `first` and then by `second`.
pub fn compose_permutations(first: &[i64], second: &[i64]) -> Option<Dims> {
    if first.len() != second.len() || !is_permutation(first) || !is_permutation(second) {
        return None;
    }
    Some(second.iter().map(|&axis| first[axis as usize]).collect())
}

/// Inverse permutation: `compose_permutations(order, &inverse(order))` is the identity.
pub fn inverse_permutation(order: &[i64]) -> Option<Dims> {
    if !is_permutation(order) {
        return None;
    }
    let mut inverse: Dims = smallvec::smallvec![0; order.len()];
    for (i, &axis) in order.iter().enumerate() {
        inverse[axis as usize] = i as i64;
    }
    Some(inverse)
}
