use smallvec::smallvec;

use crate::graph::ValueId;
use crate::instruction::{BinaryOptions, Instruction};
use crate::operator::{LowerContext, LowerOp, LowerOpError};
use crate::ops::{check_activation, Activation, BinaryOp, ValueList};
use crate::shape::{broadcast_shapes, to_runtime_shape};

/// Elementwise binary operation with NumPy-style broadcasting.
///
/// The interpreter replays broadcasting at execution time from the operand
/// shapes stored in the record.
#[derive(Clone, Debug, PartialEq)]
pub struct Binary {
    pub a: ValueId,
    pub b: ValueId,
    pub output: ValueId,
    pub op: BinaryOp,
    pub fused_activation: Activation,
}

impl Binary {
    pub fn inputs(&self) -> ValueList {
        smallvec![self.a, self.b]
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}

impl LowerOp for Binary {
    fn lower(&self, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
        let a_shape = ctx.shape(self.a)?;
        let b_shape = ctx.shape(self.b)?;
        let out_shape = ctx.shape(self.output)?;

        let broadcast = broadcast_shapes(a_shape, b_shape).ok_or_else(|| {
            LowerOpError::incompatible_shapes(format_args!(
                "cannot broadcast {:?} with {:?}",
                a_shape, b_shape
            ))
        })?;
        if broadcast.as_slice() != out_shape {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "output shape {:?} does not match broadcast shape {:?}",
                out_shape,
                broadcast.as_slice()
            )));
        }

        Ok(Instruction::Binary(BinaryOptions {
            input_a: ctx.allocation(self.a)?,
            input_b: ctx.allocation(self.b)?,
            output: ctx.allocation(self.output)?,
            binary_op: self.op,
            in_a_shape: to_runtime_shape(a_shape)?,
            in_b_shape: to_runtime_shape(b_shape)?,
            out_shape: to_runtime_shape(out_shape)?,
            fused_activation: check_activation(self.fused_activation)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use neutral_testing::TestCases;

    use super::Binary;
    use crate::graph::Graph;
    use crate::instruction::Instruction;
    use crate::operator::{LowerContext, LowerOp, LowerOpError};
    use crate::ops::{Activation, BinaryOp};
    use crate::test_util::allocate_all;
    use crate::value::DataType;

    #[test]
    fn test_lower_binary() {
        #[derive(Debug)]
        struct Case {
            a: Vec<usize>,
            b: Vec<usize>,
            out: Vec<usize>,
            expected: Result<[[u32; 4]; 3], ()>,
        }

        let cases = [
            Case {
                a: [2, 3].into(),
                b: [2, 3].into(),
                out: [2, 3].into(),
                expected: Ok([[1, 1, 2, 3], [1, 1, 2, 3], [1, 1, 2, 3]]),
            },
            Case {
                a: [4, 1, 3].into(),
                b: [5, 1].into(),
                out: [4, 5, 3].into(),
                expected: Ok([[1, 4, 1, 3], [1, 1, 5, 1], [1, 4, 5, 3]]),
            },
            Case {
                a: [2, 3].into(),
                b: [4].into(),
                out: [2, 3].into(),
                expected: Err(()),
            },
            // Broadcast shape is valid but does not match the output.
            Case {
                a: [2, 1].into(),
                b: [1, 3].into(),
                out: [2, 1].into(),
                expected: Err(()),
            },
            Case {
                a: [1, 1, 1, 1, 2].into(),
                b: [2].into(),
                out: [1, 1, 1, 1, 2].into(),
                expected: Err(()),
            },
        ];

        cases.test_each(|case| {
            let mut g = Graph::new();
            let a = g.add_input("a", &case.a, DataType::Float);
            let b = g.add_input("b", &case.b, DataType::Float);
            let output = g.add_value(None, &case.out, DataType::Float);
            let allocs = allocate_all(&g);
            let ctx = LowerContext::new(&g, &allocs);

            let op = Binary {
                a,
                b,
                output,
                op: BinaryOp::Mul,
                fused_activation: Activation::Relu,
            };

            match (op.lower(&ctx), &case.expected) {
                (Ok(Instruction::Binary(opts)), Ok([a_shape, b_shape, out_shape])) => {
                    assert_eq!(&opts.in_a_shape, a_shape);
                    assert_eq!(&opts.in_b_shape, b_shape);
                    assert_eq!(&opts.out_shape, out_shape);
                    assert_eq!(opts.binary_op, BinaryOp::Mul);
                    assert_eq!(opts.fused_activation, Activation::Relu);
                    assert_eq!(opts.output, ctx.allocation(output).unwrap());
                }
                (Err(LowerOpError::IncompatibleShapes(_)), Err(())) => {}
                (result, expected) => {
                    panic!("unexpected result {:?}, expected {:?}", result, expected)
                }
            }
        });
    }
}
