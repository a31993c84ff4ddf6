use smallvec::smallvec;

use crate::graph::ValueId;
use crate::instruction::{Instruction, MatMulOptions};
use crate::operator::{LowerContext, LowerOp, LowerOpError};
use crate::ops::{attr_u32, check_activation, Activation, ConstantData, ValueList};

/// Matrix multiplication of two rank-2 operands, with a bias added to each
/// output row.
#[derive(Clone, Debug, PartialEq)]
pub struct MatMul {
    pub a: ValueId,
    pub b: ValueId,
    pub output: ValueId,
    pub bias: ConstantData,
    pub fused_activation: Activation,
}

impl MatMul {
    pub fn inputs(&self) -> ValueList {
        smallvec![self.a, self.b]
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}

fn matrix_dims(ctx: &LowerContext, id: ValueId) -> Result<[usize; 2], LowerOpError> {
    let shape = ctx.shape(id)?;
    match *shape {
        [rows, cols] => Ok([rows, cols]),
        _ => Err(LowerOpError::incompatible_shapes(format_args!(
            "matmul operand {} must have 2 dims but has shape {:?}",
            id, shape
        ))),
    }
}

impl LowerOp for MatMul {
    fn lower(&self, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
        let [a_rows, a_cols] = matrix_dims(ctx, self.a)?;
        let [b_rows, b_cols] = matrix_dims(ctx, self.b)?;

        if a_cols != b_rows {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "columns of A ({}) do not match rows of B ({})",
                a_cols, b_rows
            )));
        }
        if self.bias.len() != b_cols {
            return Err(LowerOpError::attr_error(
                "bias",
                format_args!("expected {} values, found {}", b_cols, self.bias.len()),
            ));
        }
        let out_shape = ctx.shape(self.output)?;
        if out_shape != [a_rows, b_cols] {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "output shape {:?} does not match [{}, {}]",
                out_shape, a_rows, b_cols
            )));
        }

        Ok(Instruction::MatMul(MatMulOptions {
            input_a: ctx.allocation(self.a)?,
            input_b: ctx.allocation(self.b)?,
            output: ctx.allocation(self.output)?,
            a_rows: attr_u32("a", a_rows)?,
            a_cols: attr_u32("a", a_cols)?,
            b_cols: attr_u32("b", b_cols)?,
            fused_activation: check_activation(self.fused_activation)?,
            bias: self.bias.clone(),
        }))
    }
}
