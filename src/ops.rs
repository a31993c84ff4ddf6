//! Operator definitions and the rules that lower them to instructions.
//!
//! Each operator is a struct holding its attributes and the IDs of its input
//! and output values. Operators which produce instructions implement
//! [`LowerOp`](crate::LowerOp), next to their definition.

use std::fmt;
use std::sync::Arc;

use smallvec::{smallvec, SmallVec};

use crate::graph::ValueId;
use crate::operator::LowerOpError;
use crate::shape::Shape;

mod binary_elementwise;
mod concat;
mod conv;
mod io;
mod layout;
mod matmul;
mod pooling;
mod quantize;
mod reduce;
mod softmax;

pub use binary_elementwise::Binary;
pub use concat::Concat;
pub use conv::Conv2d;
pub use io::{Constant, Input, Output};
pub use layout::Transpose;
pub use matmul::MatMul;
pub use pooling::ReduceWindow2d;
pub use quantize::{Dequantize, Quantize};
pub use reduce::Reduce;
pub use softmax::Softmax;

/// List of value IDs returned by [`Op::inputs`] and [`Op::outputs`].
pub type ValueList = SmallVec<[ValueId; 4]>;

/// Elementwise binary operation.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

/// Operation used to combine elements in reductions and pooling.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum ReduceOp {
    Mean,
    Min,
    Max,
    Sum,
}

impl ReduceOp {
    /// Return the usual initial accumulator value for this reduction.
    pub fn default_init_value(self) -> f32 {
        match self {
            ReduceOp::Mean | ReduceOp::Sum => 0.,
            ReduceOp::Min => f32::MAX,
            ReduceOp::Max => f32::MIN,
        }
    }
}

/// Activation applied by the interpreter to the output of an operator,
/// without a separate instruction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Activation {
    Linear,
    Relu,
    Relu6,
    Clamp { min: f32, max: f32 },
}

impl Activation {
    /// Return the `(min, max)` range outputs are clamped to.
    pub fn value_range(self) -> (f32, f32) {
        match self {
            Activation::Linear => (f32::NEG_INFINITY, f32::INFINITY),
            Activation::Relu => (0., f32::INFINITY),
            Activation::Relu6 => (0., 6.),
            Activation::Clamp { min, max } => (min, max),
        }
    }
}

/// Padding applied before and after one spatial axis.
///
/// Negative values crop the input.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Padding {
    pub before: i32,
    pub after: i32,
}

impl Padding {
    pub fn new(before: i32, after: i32) -> Padding {
        Padding { before, after }
    }

    /// Return the same amount of padding on each side.
    pub fn symmetric(pad: i32) -> Padding {
        Padding::new(pad, pad)
    }

    /// Return the total change in size of the padded axis.
    pub fn sum(self) -> i64 {
        self.before as i64 + self.after as i64
    }
}

/// Affine quantization parameters for a tensor.
///
/// `real = (quantized - zero_point) * scale`
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QuantParam {
    pub zero_point: i32,
    pub scale: f32,
}

/// Constant tensor data attached to an operator, such as convolution weights.
///
/// The data is reference counted, so copying it into an instruction record
/// does not copy the elements.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantData {
    shape: Shape,
    data: Arc<[f32]>,
}

impl ConstantData {
    /// Create a constant from a shape and data.
    ///
    /// Returns `None` if the length of `data` does not match `shape`.
    pub fn new(shape: &[usize], data: impl Into<Arc<[f32]>>) -> Option<ConstantData> {
        let data = data.into();
        (shape.iter().product::<usize>() == data.len()).then(|| ConstantData {
            shape: shape.into(),
            data,
        })
    }

    /// Create a 1D constant.
    pub fn from_vec(data: Vec<f32>) -> ConstantData {
        ConstantData {
            shape: smallvec![data.len()],
            data: data.into(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Trait implemented by each operator struct to convert from an [`Op`]
/// reference to the concrete operator type.
pub trait OpVariant: Sized {
    /// Kind of operator this struct represents.
    const KIND: OpKind;

    /// Return the concrete operator if `op` is of this kind.
    fn from_op(op: &Op) -> Option<&Self>;
}

macro_rules! define_ops {
    ($($op:ident),* $(,)?) => {
        /// Discriminant identifying which computation an operator performs.
        #[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub enum OpKind {
            $($op),*
        }

        impl OpKind {
            /// Return the name of this operator kind.
            pub fn name(self) -> &'static str {
                match self {
                    $(OpKind::$op => stringify!($op)),*
                }
            }
        }

        /// An operator in a graph, with its attributes.
        #[derive(Clone, Debug, PartialEq)]
        pub enum Op {
            $($op($op)),*
        }

        impl Op {
            /// Return the kind of this operator.
            pub fn kind(&self) -> OpKind {
                match self {
                    $(Op::$op(_) => OpKind::$op),*
                }
            }

            /// Return the IDs of values this operator reads.
            pub fn inputs(&self) -> ValueList {
                match self {
                    $(Op::$op(op) => op.inputs()),*
                }
            }

            /// Return the IDs of values this operator produces.
            pub fn outputs(&self) -> ValueList {
                match self {
                    $(Op::$op(op) => op.outputs()),*
                }
            }
        }

        $(
            impl OpVariant for $op {
                const KIND: OpKind = OpKind::$op;

                fn from_op(op: &Op) -> Option<&Self> {
                    match op {
                        Op::$op(op) => Some(op),
                        _ => None,
                    }
                }
            }

            impl From<$op> for Op {
                fn from(op: $op) -> Op {
                    Op::$op(op)
                }
            }
        )*
    };
}

define_ops!(
    Binary,
    Concat,
    Constant,
    Conv2d,
    Dequantize,
    Input,
    MatMul,
    Output,
    Quantize,
    Reduce,
    ReduceWindow2d,
    Softmax,
    Transpose,
);

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Convert a non-negative attribute to a `u32` record field.
pub(crate) fn attr_u32(attr: &'static str, value: usize) -> Result<u32, LowerOpError> {
    u32::try_from(value).map_err(|_| LowerOpError::attr_error(attr, "value too large"))
}

/// Check that a window parameter such as a stride is at least 1, and convert
/// it to a `u32` record field.
pub(crate) fn positive_attr(attr: &'static str, value: usize) -> Result<u32, LowerOpError> {
    if value == 0 {
        return Err(LowerOpError::attr_error(attr, "must be at least 1"));
    }
    attr_u32(attr, value)
}

/// Check that a fused activation clamps to a non-empty range.
pub(crate) fn check_activation(activation: Activation) -> Result<Activation, LowerOpError> {
    let (min, max) = activation.value_range();
    if min.is_nan() || max.is_nan() || min > max {
        return Err(LowerOpError::attr_error(
            "fused_activation",
            format_args!("invalid clamp range [{}, {}]", min, max),
        ));
    }
    Ok(activation)
}

/// Return the number of positions of a sliding window along one spatial
/// axis of size `size`.
///
/// `filter`, `stride` and `dilation` must be at least 1. Errors are reported
/// against `attr`, the axis' padding attribute.
pub(crate) fn window_count(
    attr: &'static str,
    size: usize,
    padding: Padding,
    filter: u32,
    stride: u32,
    dilation: u32,
) -> Result<usize, LowerOpError> {
    let padded = size as i64 + padding.sum();
    let extent = dilation as i64 * (filter as i64 - 1) + 1;
    if padded < extent {
        return Err(LowerOpError::attr_error(
            attr,
            format_args!(
                "padded input size {} is smaller than window size {}",
                padded, extent
            ),
        ));
    }
    Ok(((padded - extent) / stride as i64 + 1) as usize)
}
