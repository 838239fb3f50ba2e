//! Compile-time constant tensors.

use std::hash::{Hash, Hasher};

use graft_dtype::{Dims, ElemType, TensorType};
use serde::{Deserialize, Serialize};
use snafu::ensure;

use crate::error::{ConstDataLengthSnafu, ConstDataTypeSnafu, Result};

/// Typed payload of a constant tensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum TensorData {
    Float32(Vec<f32>),
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
}

impl TensorData {
    pub fn elem(&self) -> ElemType {
        match self {
            Self::Float32(_) => ElemType::Float32,
            Self::Int8(_) => ElemType::Int8,
            Self::UInt8(_) => ElemType::UInt8,
            Self::Int32(_) => ElemType::Int32,
            Self::Int64(_) => ElemType::Int64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::Int8(v) => v.len(),
            Self::UInt8(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Little-endian raw bytes, the layout used for external data files.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::Float32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::Int8(v) => v.iter().map(|&x| x as u8).collect(),
            Self::UInt8(v) => v.clone(),
            Self::Int32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::Int64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }

    /// Inverse of [`TensorData::to_le_bytes`]. Returns `None` for element types
    /// without a payload variant or a byte count that is not a multiple of the width.
    pub fn from_le_bytes(elem: ElemType, bytes: &[u8]) -> Option<Self> {
        let width = elem.bytes();
        if width == 0 || bytes.len() % width != 0 {
            return None;
        }
        let chunks = bytes.chunks_exact(width);
        Some(match elem {
            ElemType::Float32 => Self::Float32(chunks.map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()),
            ElemType::Int8 => Self::Int8(bytes.iter().map(|&b| b as i8).collect()),
            ElemType::UInt8 => Self::UInt8(bytes.to_vec()),
            ElemType::Int32 => Self::Int32(chunks.map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()),
            ElemType::Int64 => Self::Int64(
                chunks.map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])).collect(),
            ),
            _ => return None,
        })
    }
}

// Floats compare bitwise so constants can serve as hash keys.
impl PartialEq for TensorData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float32(a), Self::Float32(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Self::Int8(a), Self::Int8(b)) => a == b,
            (Self::UInt8(a), Self::UInt8(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TensorData {}

impl Hash for TensorData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Float32(v) => v.iter().for_each(|x| x.to_bits().hash(state)),
            Self::Int8(v) => v.hash(state),
            Self::UInt8(v) => v.hash(state),
            Self::Int32(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
        }
    }
}

/// Dense constant tensor (initializer or `Constant` node value).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstTensor {
    pub dims: Dims,
    pub data: TensorData,
}

impl ConstTensor {
    pub fn new(dims: impl IntoIterator<Item = i64>, data: TensorData) -> Self {
        Self { dims: dims.into_iter().collect(), data }
    }

    pub fn f32(dims: impl IntoIterator<Item = i64>, values: Vec<f32>) -> Self {
        Self::new(dims, TensorData::Float32(values))
    }

    pub fn i8(dims: impl IntoIterator<Item = i64>, values: Vec<i8>) -> Self {
        Self::new(dims, TensorData::Int8(values))
    }

    pub fn u8(dims: impl IntoIterator<Item = i64>, values: Vec<u8>) -> Self {
        Self::new(dims, TensorData::UInt8(values))
    }

    pub fn i64(dims: impl IntoIterator<Item = i64>, values: Vec<i64>) -> Self {
        Self::new(dims, TensorData::Int64(values))
    }

    pub fn scalar_f32(value: f32) -> Self {
        Self::f32([0i64; 0], vec![value])
    }

    pub fn elem(&self) -> ElemType {
        self.data.elem()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn tensor_type(&self) -> TensorType {
        TensorType { elem: self.elem(), shape: Some(self.dims.clone()) }
    }

    pub fn byte_size(&self) -> usize {
        self.len() * self.elem().bytes()
    }

    /// Check that the payload length agrees with the dims.
    pub fn validate(&self, name: &str) -> Result<()> {
        let expected = self.dims.iter().map(|&d| d.max(0) as usize).product::<usize>();
        ensure!(self.len() == expected, ConstDataLengthSnafu { name, expected, actual: self.len() });
        Ok(())
    }

    /// Payload as `f32`, failing with a data-type error for any other payload.
    pub fn as_f32(&self, name: &str) -> Result<&[f32]> {
        match &self.data {
            TensorData::Float32(v) => Ok(v),
            other => ConstDataTypeSnafu { name, expected: ElemType::Float32, actual: other.elem() }.fail(),
        }
    }

    pub fn as_i64(&self, name: &str) -> Result<&[i64]> {
        match &self.data {
            TensorData::Int64(v) => Ok(v),
            other => ConstDataTypeSnafu { name, expected: ElemType::Int64, actual: other.elem() }.fail(),
        }
    }

    /// The single element of a one-element float tensor.
    pub fn single_f32(&self) -> Option<f32> {
        match &self.data {
            TensorData::Float32(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// The single element of a one-element integer tensor, widened to `i64`.
    pub fn single_int(&self) -> Option<i64> {
        match &self.data {
            TensorData::Int8(v) if v.len() == 1 => Some(v[0] as i64),
            TensorData::UInt8(v) if v.len() == 1 => Some(v[0] as i64),
            TensorData::Int32(v) if v.len() == 1 => Some(v[0] as i64),
            TensorData::Int64(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    pub fn is_all_zero(&self) -> bool {
        match &self.data {
            TensorData::Float32(v) => v.iter().all(|&x| x == 0.0),
            TensorData::Int8(v) => v.iter().all(|&x| x == 0),
            TensorData::UInt8(v) => v.iter().all(|&x| x == 0),
            TensorData::Int32(v) => v.iter().all(|&x| x == 0),
            TensorData::Int64(v) => v.iter().all(|&x| x == 0),
        }
    }
}
