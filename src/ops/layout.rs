use smallvec::{smallvec, SmallVec};

use crate::graph::ValueId;
use crate::instruction::{Instruction, TransposeOptions};
use crate::operator::{LowerContext, LowerOp, LowerOpError};
use crate::ops::ValueList;
use crate::shape::{extend_rank, to_runtime_shape, Shape, ShapeError, CANONICAL_RANK};

/// Permute the axes of a tensor.
///
/// Output axis `i` is input axis `perm[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Transpose {
    pub input: ValueId,
    pub output: ValueId,
    pub perm: SmallVec<[usize; 4]>,
}

impl Transpose {
    pub fn inputs(&self) -> ValueList {
        smallvec![self.input]
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}

impl LowerOp for Transpose {
    fn lower(&self, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
        let in_shape = ctx.shape(self.input)?;
        let (ext_shape, ext_perm) =
            extend_rank(in_shape, &self.perm, CANONICAL_RANK).map_err(|err| match err {
                ShapeError::InvalidPermutation => LowerOpError::attr_error("perm", err),
                other => other.into(),
            })?;

        let expected: Shape = self.perm.iter().map(|&axis| in_shape[axis]).collect();
        let out_shape = ctx.shape(self.output)?;
        if out_shape != expected.as_slice() {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "output shape {:?} does not match permuted input shape {:?}",
                out_shape,
                expected.as_slice()
            )));
        }

        // `extend_rank` returns exactly `CANONICAL_RANK` axes, which are
        // indices and so always fit in a u32.
        let mut perm = [0; CANONICAL_RANK];
        for (dst, &src) in perm.iter_mut().zip(&ext_perm) {
            *dst = src as u32;
        }

        Ok(Instruction::Transpose(TransposeOptions {
            input: ctx.allocation(self.input)?,
            output: ctx.allocation(self.output)?,
            in_shape: to_runtime_shape(&ext_shape)?,
            perm,
        }))
    }
}

#[cfg(test)]
mod tests {
    use neutral_testing::TestCases;

    use super::Transpose;
    use crate::graph::Graph;
    use crate::instruction::Instruction;
    use crate::operator::{LowerContext, LowerOp, LowerOpError};
    use crate::test_util::allocate_all;
    use crate::value::DataType;

    fn lower_transpose(shape: &[usize], perm: &[usize]) -> Result<Instruction, LowerOpError> {
        let out_shape: Vec<usize> = perm
            .iter()
            .map(|&p| shape.get(p).copied().unwrap_or(1))
            .collect();
        lower_transpose_to(shape, perm, &out_shape)
    }

    fn lower_transpose_to(
        shape: &[usize],
        perm: &[usize],
        out_shape: &[usize],
    ) -> Result<Instruction, LowerOpError> {
        let mut g = Graph::new();
        let input = g.add_input("x", shape, DataType::Float);
        let output = g.add_value(None, out_shape, DataType::Float);
        let allocs = allocate_all(&g);
        let ctx = LowerContext::new(&g, &allocs);
        Transpose {
            input,
            output,
            perm: perm.into(),
        }
        .lower(&ctx)
    }

    #[test]
    fn test_lower_transpose() {
        #[derive(Debug)]
        struct Case {
            shape: Vec<usize>,
            perm: Vec<usize>,
            expected_shape: [u32; 4],
            expected_perm: [u32; 4],
        }

        let cases = [
            Case {
                shape: [3, 5].into(),
                perm: [1, 0].into(),
                expected_shape: [1, 1, 3, 5],
                expected_perm: [0, 1, 3, 2],
            },
            Case {
                shape: [3, 5].into(),
                perm: [0, 1].into(),
                expected_shape: [1, 1, 3, 5],
                expected_perm: [0, 1, 2, 3],
            },
            Case {
                shape: [2, 3, 4].into(),
                perm: [2, 0, 1].into(),
                expected_shape: [1, 2, 3, 4],
                expected_perm: [0, 3, 1, 2],
            },
            Case {
                shape: [2, 3, 4, 5].into(),
                perm: [0, 2, 3, 1].into(),
                expected_shape: [2, 3, 4, 5],
                expected_perm: [0, 2, 3, 1],
            },
        ];

        cases.test_each(|case| {
            let Instruction::Transpose(opts) = lower_transpose(&case.shape, &case.perm).unwrap()
            else {
                panic!("expected transpose instruction");
            };
            assert_eq!(opts.in_shape, case.expected_shape);
            assert_eq!(opts.perm, case.expected_perm);
        });
    }

    #[test]
    fn test_lower_transpose_invalid() {
        assert!(matches!(
            lower_transpose(&[2, 3], &[1, 1]),
            Err(LowerOpError::InvalidAttribute { attr: "perm", .. })
        ));
        assert!(matches!(
            lower_transpose(&[1, 2, 3, 4, 5], &[0, 1, 2, 3, 4]),
            Err(LowerOpError::IncompatibleShapes(_))
        ));

        // Output is the input shape, not the permuted one.
        assert!(matches!(
            lower_transpose_to(&[2, 3, 4], &[2, 0, 1], &[2, 3, 4]),
            Err(LowerOpError::IncompatibleShapes(_))
        ));
        assert!(lower_transpose_to(&[2, 3, 4], &[2, 0, 1], &[4, 2, 3]).is_ok());
    }
}
