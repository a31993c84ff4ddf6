//! The [`LowerOp`] trait for defining lowering rules.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::allocation::AllocationOracle;
use crate::graph::{Graph, ValueId};
use crate::instruction::{Instruction, MemoryRange};
use crate::ops::{OpKind, OpVariant};
use crate::shape::ShapeError;
use crate::value::{DataType, ValueInfo};

/// Reasons why lowering an operator may fail.
#[derive(Clone, Debug, PartialEq)]
pub enum LowerOpError {
    /// An attribute, or a shape derived from it, is invalid.
    InvalidAttribute {
        /// Name of the attribute.
        attr: &'static str,
        /// Description of the error.
        error: String,
    },

    /// Operand shapes are not compatible with each other or with the
    /// operator's attributes.
    IncompatibleShapes(String),

    /// The allocation oracle has no memory range for a value.
    UnresolvedAllocation(ValueId),

    /// A value ID does not exist in the graph.
    UnknownValue(ValueId),

    /// A value has an element type the operator does not support.
    UnsupportedType { value: ValueId, dtype: DataType },

    /// A rule was invoked with an operator of a different kind.
    KindMismatch { expected: OpKind, actual: OpKind },
}

impl LowerOpError {
    pub(crate) fn attr_error(attr: &'static str, error: impl Display) -> Self {
        Self::InvalidAttribute {
            attr,
            error: error.to_string(),
        }
    }

    /// Return a closure which converts a [`ShapeError`] into an error for
    /// attribute `attr`.
    pub(crate) fn for_attr(attr: &'static str) -> impl Fn(ShapeError) -> Self {
        move |err| Self::attr_error(attr, err)
    }

    pub(crate) fn incompatible_shapes(details: impl Display) -> Self {
        Self::IncompatibleShapes(details.to_string())
    }
}

impl Display for LowerOpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAttribute { attr, error } => {
                write!(f, "error in attribute \"{}\": {}", attr, error)
            }
            Self::IncompatibleShapes(details) => {
                write!(f, "incompatible shapes: {}", details)
            }
            Self::UnresolvedAllocation(id) => {
                write!(f, "no memory range allocated for value {}", id)
            }
            Self::UnknownValue(id) => write!(f, "value {} not found in graph", id),
            Self::UnsupportedType { value, dtype } => {
                write!(f, "value {} has unsupported type {}", value, dtype)
            }
            Self::KindMismatch { expected, actual } => {
                write!(f, "rule for {} invoked with {} operator", expected, actual)
            }
        }
    }
}

impl Error for LowerOpError {}

impl From<ShapeError> for LowerOpError {
    fn from(err: ShapeError) -> Self {
        Self::IncompatibleShapes(err.to_string())
    }
}

/// Context passed to [`LowerOp::lower`].
///
/// This gives rules read-only access to graph value metadata and to the
/// memory ranges assigned by the allocation pass.
#[derive(Copy, Clone)]
pub struct LowerContext<'a> {
    graph: &'a Graph,
    oracle: &'a dyn AllocationOracle,
}

impl<'a> LowerContext<'a> {
    pub fn new(graph: &'a Graph, oracle: &'a dyn AllocationOracle) -> Self {
        LowerContext { graph, oracle }
    }

    /// Return the memory range assigned to a value.
    pub fn allocation(&self, id: ValueId) -> Result<MemoryRange, LowerOpError> {
        self.oracle
            .resolve(id)
            .ok_or(LowerOpError::UnresolvedAllocation(id))
    }

    /// Return the metadata of a value.
    pub fn value(&self, id: ValueId) -> Result<&'a ValueInfo, LowerOpError> {
        self.graph.value(id).ok_or(LowerOpError::UnknownValue(id))
    }

    /// Return the shape of a value.
    pub fn shape(&self, id: ValueId) -> Result<&'a [usize], LowerOpError> {
        self.value(id).map(|v| v.shape())
    }

    /// Return the metadata of a value after checking its element type.
    pub fn value_of_type(
        &self,
        id: ValueId,
        dtype: DataType,
    ) -> Result<&'a ValueInfo, LowerOpError> {
        let value = self.value(id)?;
        if value.dtype() != dtype {
            return Err(LowerOpError::UnsupportedType {
                value: id,
                dtype: value.dtype(),
            });
        }
        Ok(value)
    }
}

/// A rule which lowers one kind of operator to an instruction record.
///
/// Rules are pure functions of the operator's attributes, graph value
/// metadata and allocations. They must not allocate memory or inspect tensor
/// contents, and lowering the same operator twice must produce equal records.
pub trait LowerOp: OpVariant {
    /// Lower this operator to an instruction.
    fn lower(&self, ctx: &LowerContext) -> Result<Instruction, LowerOpError>;
}
