//! Metadata for values (tensor edges) in a graph.

use std::fmt;
use std::fmt::Display;

use crate::shape::{num_elements, Shape};

/// Enum specifying the data type of a tensor.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum DataType {
    Int32,
    Float,
    Int8,
    UInt8,
}

impl DataType {
    /// Return the size of elements of this type in bytes.
    pub fn size(self) -> u8 {
        match self {
            DataType::Int32 | DataType::Float => 4,
            DataType::Int8 | DataType::UInt8 => 1,
        }
    }
}

impl Display for DataType {
    /// Format this enum value in the style of the corresponding Rust type (eg.
    /// "i32" for `DataType::Int32`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataType::Float => "f32",
            DataType::Int32 => "i32",
            DataType::Int8 => "i8",
            DataType::UInt8 => "u8",
        })
    }
}

/// Shape and element type of a graph value.
///
/// All dimensions are fixed by the time a graph is lowered.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueInfo {
    pub(crate) name: Option<String>,
    pub(crate) shape: Shape,
    pub(crate) dtype: DataType,
}

impl ValueInfo {
    pub fn new(name: Option<&str>, shape: &[usize], dtype: DataType) -> ValueInfo {
        ValueInfo {
            name: name.map(|s| s.to_owned()),
            shape: shape.into(),
            dtype,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Return the number of elements in the tensor.
    pub fn len(&self) -> usize {
        num_elements(&self.shape)
    }

    /// Return true if the tensor has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the size of the tensor in bytes.
    pub fn byte_len(&self) -> usize {
        self.len() * self.dtype.size() as usize
    }
}

impl Display for ValueInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Produces strings such as "f32 [1, 16, 256]"
        write!(f, "{} {:?}", self.dtype, self.shape.as_slice())
    }
}
