use smallvec::{smallvec, SmallVec};

use crate::graph::ValueId;
use crate::instruction::{Instruction, ReduceOptions};
use crate::operator::{LowerContext, LowerOp, LowerOpError};
use crate::ops::{ReduceOp, ValueList};
use crate::shape::{num_elements, reduced_shape, resolve_axes, to_runtime_shape};

/// Reduce a tensor over a set of axes.
///
/// The instruction always uses the reduced shape with `keep_dims` semantics
/// (reduced axes have size 1). `keep_dims` only affects the shape of the
/// graph value, which has the same elements either way.
#[derive(Clone, Debug, PartialEq)]
pub struct Reduce {
    pub input: ValueId,
    pub output: ValueId,
    pub op: ReduceOp,
    pub axes: SmallVec<[isize; 4]>,
    pub keep_dims: bool,
    pub init_value: f32,
}

impl Reduce {
    pub fn inputs(&self) -> ValueList {
        smallvec![self.input]
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}

impl LowerOp for Reduce {
    fn lower(&self, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
        let in_shape = ctx.shape(self.input)?;
        let out_shape = ctx.shape(self.output)?;

        let axes =
            resolve_axes(in_shape.len(), &self.axes).map_err(LowerOpError::for_attr("axes"))?;
        let reduced = reduced_shape(in_shape, &axes, true)?;

        let expected = reduced_shape(in_shape, &axes, self.keep_dims)?;
        if num_elements(out_shape) != num_elements(&expected) {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "output shape {:?} does not match reduced shape {:?}",
                out_shape,
                expected.as_slice()
            )));
        }

        Ok(Instruction::Reduce(ReduceOptions {
            input: ctx.allocation(self.input)?,
            output: ctx.allocation(self.output)?,
            reduce_op: self.op,
            in_shape: to_runtime_shape(in_shape)?,
            out_shape: to_runtime_shape(&reduced)?,
            init_value: self.init_value,
        }))
    }
}
