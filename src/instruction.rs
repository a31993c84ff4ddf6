//! Instruction records emitted by lowering.
//!
//! Each record holds a fixed set of parameters that the runtime interpreter
//! needs to execute one operator: the memory ranges of operands and results,
//! numeric attributes and fixed-rank shape arrays. Records are immutable once
//! created and are executed strictly in emission order.

use std::fmt;

use crate::ops::{Activation, BinaryOp, ConstantData, Padding, QuantParam, ReduceOp};
use crate::shape::RuntimeShape;

/// Identifies the buffer which a [`MemoryRange`] refers to.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum MemoryLocation {
    /// Buffer holding the program's external inputs.
    Input,
    /// Buffer holding the program's external outputs.
    Output,
    /// Read-only buffer holding constant data.
    Rdata,
    /// Scratch buffer for intermediate values.
    Data,
}

/// A contiguous region of a buffer assigned to a graph value.
///
/// Lowering treats memory ranges as opaque values and copies them into
/// records unchanged.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct MemoryRange {
    pub location: MemoryLocation,
    /// Byte offset from the start of the buffer.
    pub start: u32,
    /// Length in bytes.
    pub size: u32,
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}[{}..{}]",
            self.location,
            self.start,
            self.start as u64 + self.size as u64
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BinaryOptions {
    pub input_a: MemoryRange,
    pub input_b: MemoryRange,
    pub output: MemoryRange,
    pub binary_op: BinaryOp,
    pub in_a_shape: RuntimeShape,
    pub in_b_shape: RuntimeShape,
    pub out_shape: RuntimeShape,
    pub fused_activation: Activation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConcatOptions {
    pub output: MemoryRange,
    /// Bytes per unit of the concatenation axis.
    pub inner_size: u64,
    /// Product of the dimensions before the concatenation axis.
    pub outer_size: u64,
    pub inputs: Vec<MemoryRange>,
    /// Size of each input along the concatenation axis.
    pub dims: Vec<u32>,
}

impl ConcatOptions {
    /// Number of bytes input `index` contributes per outer iteration.
    pub fn input_chunk_size(&self, index: usize) -> Option<u64> {
        self.dims.get(index).map(|&dim| self.inner_size * dim as u64)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Conv2dOptions {
    pub input: MemoryRange,
    pub output: MemoryRange,
    pub in_shape: RuntimeShape,
    pub groups: u32,
    pub out_channels: u32,
    pub padding_h: Padding,
    pub padding_w: Padding,
    pub filter_h: u32,
    pub filter_w: u32,
    pub stride_h: u32,
    pub stride_w: u32,
    pub dilation_h: u32,
    pub dilation_w: u32,
    pub fused_activation: Activation,
    pub weights: ConstantData,
    pub bias: ConstantData,
}

/// Parameters shared by quantize and dequantize records.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantizeOptions {
    pub input: MemoryRange,
    pub output: MemoryRange,
    pub quant_param: QuantParam,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatMulOptions {
    pub input_a: MemoryRange,
    pub input_b: MemoryRange,
    pub output: MemoryRange,
    pub a_rows: u32,
    pub a_cols: u32,
    pub b_cols: u32,
    pub fused_activation: Activation,
    pub bias: ConstantData,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReduceOptions {
    pub input: MemoryRange,
    pub output: MemoryRange,
    pub reduce_op: ReduceOp,
    pub in_shape: RuntimeShape,
    pub out_shape: RuntimeShape,
    pub init_value: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReduceWindow2dOptions {
    pub input: MemoryRange,
    pub output: MemoryRange,
    pub reduce_op: ReduceOp,
    pub in_shape: RuntimeShape,
    pub padding_h: Padding,
    pub padding_w: Padding,
    pub filter_h: u32,
    pub filter_w: u32,
    pub stride_h: u32,
    pub stride_w: u32,
    pub dilation_h: u32,
    pub dilation_w: u32,
    pub init_value: f32,
    pub fused_activation: Activation,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SoftmaxOptions {
    pub input: MemoryRange,
    pub output: MemoryRange,
    pub inner_size: u32,
    pub outer_size: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TransposeOptions {
    pub input: MemoryRange,
    pub output: MemoryRange,
    pub in_shape: RuntimeShape,
    pub perm: RuntimeShape,
}

macro_rules! define_instructions {
    ($($variant:ident($options:ty)),* $(,)?) => {
        /// Discriminant of an [`Instruction`].
        #[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
        pub enum Opcode {
            $($variant),*
        }

        /// An instruction record for the runtime interpreter.
        #[derive(Clone, Debug, PartialEq)]
        pub enum Instruction {
            $($variant($options)),*
        }

        impl Instruction {
            /// Return the kind of this instruction.
            pub fn opcode(&self) -> Opcode {
                match self {
                    $(Instruction::$variant(_) => Opcode::$variant),*
                }
            }
        }
    };
}

define_instructions!(
    Binary(BinaryOptions),
    Concat(ConcatOptions),
    Conv2d(Conv2dOptions),
    Dequantize(QuantizeOptions),
    MatMul(MatMulOptions),
    Quantize(QuantizeOptions),
    Reduce(ReduceOptions),
    ReduceWindow2d(ReduceWindow2dOptions),
    Softmax(SoftmaxOptions),
    Transpose(TransposeOptions),
);

impl Instruction {
    /// Return the memory range written by this instruction.
    pub fn output(&self) -> MemoryRange {
        match self {
            Instruction::Binary(opts) => opts.output,
            Instruction::Concat(opts) => opts.output,
            Instruction::Conv2d(opts) => opts.output,
            Instruction::Dequantize(opts) | Instruction::Quantize(opts) => opts.output,
            Instruction::MatMul(opts) => opts.output,
            Instruction::Reduce(opts) => opts.output,
            Instruction::ReduceWindow2d(opts) => opts.output,
            Instruction::Softmax(opts) => opts.output,
            Instruction::Transpose(opts) => opts.output,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} -> {}", self.opcode(), self.output())
    }
}
