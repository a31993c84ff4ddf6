use smallvec::smallvec;

use crate::graph::ValueId;
use crate::instruction::{Instruction, SoftmaxOptions};
use crate::operator::{LowerContext, LowerOp, LowerOpError};
use crate::ops::{attr_u32, ValueList};
use crate::shape::softmax_partition;

/// Softmax over all dimensions after the first.
///
/// Each slice along the leading axis is normalized independently. Softmax
/// over another axis must be expressed by transposing that axis to the front
/// first.
#[derive(Clone, Debug, PartialEq)]
pub struct Softmax {
    pub input: ValueId,
    pub output: ValueId,
}

impl Softmax {
    pub fn inputs(&self) -> ValueList {
        smallvec![self.input]
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}

impl LowerOp for Softmax {
    fn lower(&self, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
        let in_shape = ctx.shape(self.input)?;
        let out_shape = ctx.shape(self.output)?;
        if out_shape != in_shape {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "output shape {:?} does not match input shape {:?}",
                out_shape, in_shape
            )));
        }
        let (outer_size, inner_size) = softmax_partition(in_shape)?;

        Ok(Instruction::Softmax(SoftmaxOptions {
            input: ctx.allocation(self.input)?,
            output: ctx.allocation(self.output)?,
            inner_size: attr_u32("input", inner_size)?,
            outer_size: attr_u32("input", outer_size)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::Softmax;
    use crate::graph::Graph;
    use crate::instruction::Instruction;
    use crate::operator::{LowerContext, LowerOp, LowerOpError};
    use crate::test_util::allocate_all;
    use crate::value::DataType;

    fn lower_softmax(shape: &[usize]) -> Result<Instruction, LowerOpError> {
        lower_softmax_to(shape, shape)
    }

    fn lower_softmax_to(
        in_shape: &[usize],
        out_shape: &[usize],
    ) -> Result<Instruction, LowerOpError> {
        let mut g = Graph::new();
        let input = g.add_input("x", in_shape, DataType::Float);
        let output = g.add_value(None, out_shape, DataType::Float);
        let allocs = allocate_all(&g);
        let ctx = LowerContext::new(&g, &allocs);
        Softmax { input, output }.lower(&ctx)
    }

    #[test]
    fn test_lower_softmax() {
        let Instruction::Softmax(opts) = lower_softmax(&[8, 10]).unwrap() else {
            panic!("expected softmax instruction");
        };
        assert_eq!(opts.outer_size, 8);
        assert_eq!(opts.inner_size, 10);

        let Instruction::Softmax(opts) = lower_softmax(&[2, 3, 4]).unwrap() else {
            panic!("expected softmax instruction");
        };
        assert_eq!(opts.outer_size, 2);
        assert_eq!(opts.inner_size, 12);
    }

    #[test]
    fn test_lower_softmax_invalid() {
        assert!(matches!(
            lower_softmax(&[0, 10]),
            Err(LowerOpError::IncompatibleShapes(_))
        ));
        assert!(matches!(
            lower_softmax(&[]),
            Err(LowerOpError::IncompatibleShapes(_))
        ));
        assert!(matches!(
            lower_softmax_to(&[8, 10], &[10, 8]),
            Err(LowerOpError::IncompatibleShapes(_))
        ));
    }

    #[test]
    fn test_lower_softmax_empty_inner_axis() {
        let err = lower_softmax(&[2, 0]).err().unwrap();
        assert_eq!(
            err,
            LowerOpError::IncompatibleShapes("axis 1 has size zero".into())
        );
    }
}
