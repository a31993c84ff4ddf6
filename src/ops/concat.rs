use smallvec::smallvec;

use crate::graph::ValueId;
use crate::instruction::{ConcatOptions, Instruction};
use crate::operator::{LowerContext, LowerOp, LowerOpError};
use crate::ops::{attr_u32, ValueList};
use crate::shape::{concat_partition, resolve_axis};

/// Concatenate inputs along an axis.
#[derive(Clone, Debug, PartialEq)]
pub struct Concat {
    pub inputs: Vec<ValueId>,
    pub output: ValueId,
    pub axis: isize,
}

impl Concat {
    pub fn inputs(&self) -> ValueList {
        self.inputs.iter().copied().collect()
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}

impl LowerOp for Concat {
    fn lower(&self, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
        if self.inputs.is_empty() {
            return Err(LowerOpError::attr_error("inputs", "at least one input is required"));
        }

        let output = ctx.value(self.output)?;
        let out_shape = output.shape();
        let axis =
            resolve_axis(out_shape.len(), self.axis).map_err(LowerOpError::for_attr("axis"))?;

        let mut dims = Vec::with_capacity(self.inputs.len());
        for &input in &self.inputs {
            let in_shape = ctx.shape(input)?;
            let matches_output = in_shape.len() == out_shape.len()
                && in_shape
                    .iter()
                    .zip(out_shape)
                    .enumerate()
                    .all(|(dim, (in_size, out_size))| dim == axis || in_size == out_size);
            if !matches_output {
                return Err(LowerOpError::incompatible_shapes(format_args!(
                    "input shape {:?} does not match output shape {:?} outside axis {}",
                    in_shape, out_shape, axis
                )));
            }
            dims.push(in_shape[axis]);
        }

        if dims.iter().sum::<usize>() != out_shape[axis] {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "input sizes {:?} along axis {} do not sum to output size {}",
                dims, axis, out_shape[axis]
            )));
        }

        let (inner_size, outer_size) =
            concat_partition(out_shape, output.dtype().size() as usize, axis)?;

        Ok(Instruction::Concat(ConcatOptions {
            output: ctx.allocation(self.output)?,
            inner_size,
            outer_size,
            inputs: self
                .inputs
                .iter()
                .map(|&input| ctx.allocation(input))
                .collect::<Result<_, _>>()?,
            dims: dims
                .into_iter()
                .map(|dim| attr_u32("inputs", dim))
                .collect::<Result<_, _>>()?,
        }))
    }
}
