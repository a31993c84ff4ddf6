use smallvec::smallvec;

use crate::graph::ValueId;
use crate::instruction::{Instruction, ReduceWindow2dOptions};
use crate::operator::{LowerContext, LowerOp, LowerOpError};
use crate::ops::{
    check_activation, positive_attr, window_count, Activation, Padding, ReduceOp, ValueList,
};
use crate::shape::to_runtime_shape;

/// Reduce sliding 2D windows of an NCHW input, as used for max and average
/// pooling.
#[derive(Clone, Debug, PartialEq)]
pub struct ReduceWindow2d {
    pub input: ValueId,
    pub output: ValueId,
    pub op: ReduceOp,
    pub init_value: f32,
    pub filter_h: usize,
    pub filter_w: usize,
    pub padding_h: Padding,
    pub padding_w: Padding,
    pub stride_h: usize,
    pub stride_w: usize,
    pub dilation_h: usize,
    pub dilation_w: usize,
    pub fused_activation: Activation,
}

impl ReduceWindow2d {
    pub fn inputs(&self) -> ValueList {
        smallvec![self.input]
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}

impl LowerOp for ReduceWindow2d {
    fn lower(&self, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
        let in_shape = ctx.shape(self.input)?;
        let &[batch, channels, in_h, in_w] = in_shape else {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "input must have 4 dims but has shape {:?}",
                in_shape
            )));
        };

        let filter_h = positive_attr("filter_h", self.filter_h)?;
        let filter_w = positive_attr("filter_w", self.filter_w)?;
        let stride_h = positive_attr("stride_h", self.stride_h)?;
        let stride_w = positive_attr("stride_w", self.stride_w)?;
        let dilation_h = positive_attr("dilation_h", self.dilation_h)?;
        let dilation_w = positive_attr("dilation_w", self.dilation_w)?;

        let out_h = window_count(
            "padding_h",
            in_h,
            self.padding_h,
            filter_h,
            stride_h,
            dilation_h,
        )?;
        let out_w = window_count(
            "padding_w",
            in_w,
            self.padding_w,
            filter_w,
            stride_w,
            dilation_w,
        )?;
        let out_shape = ctx.shape(self.output)?;
        if out_shape != [batch, channels, out_h, out_w] {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "output shape {:?} does not match [{}, {}, {}, {}]",
                out_shape, batch, channels, out_h, out_w
            )));
        }

        Ok(Instruction::ReduceWindow2d(ReduceWindow2dOptions {
            input: ctx.allocation(self.input)?,
            output: ctx.allocation(self.output)?,
            reduce_op: self.op,
            in_shape: to_runtime_shape(in_shape)?,
            padding_h: self.padding_h,
            padding_w: self.padding_w,
            filter_h,
            filter_w,
            stride_h,
            stride_w,
            dilation_h,
            dilation_w,
            init_value: self.init_value,
            fused_activation: check_activation(self.fused_activation)?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::ReduceWindow2d;
    use crate::graph::Graph;
    use crate::instruction::Instruction;
    use crate::operator::{LowerContext, LowerOp, LowerOpError};
    use crate::ops::{Activation, Padding, ReduceOp};
    use crate::test_util::allocate_all;
    use crate::value::DataType;

    fn max_pool(g: &mut Graph, in_shape: &[usize]) -> ReduceWindow2d {
        let input = g.add_input("x", in_shape, DataType::Float);
        let output = g.add_value(None, &[1, 3, 4, 4], DataType::Float);
        ReduceWindow2d {
            input,
            output,
            op: ReduceOp::Max,
            init_value: f32::MIN,
            filter_h: 2,
            filter_w: 2,
            padding_h: Padding::default(),
            padding_w: Padding::default(),
            stride_h: 2,
            stride_w: 2,
            dilation_h: 1,
            dilation_w: 1,
            fused_activation: Activation::Linear,
        }
    }

    #[test]
    fn test_lower_reduce_window2d() {
        let mut g = Graph::new();
        let op = max_pool(&mut g, &[1, 3, 8, 8]);
        let allocs = allocate_all(&g);
        let ctx = LowerContext::new(&g, &allocs);

        let Instruction::ReduceWindow2d(opts) = op.lower(&ctx).unwrap() else {
            panic!("expected reduce_window2d instruction");
        };
        assert_eq!(opts.in_shape, [1, 3, 8, 8]);
        assert_eq!(opts.reduce_op, ReduceOp::Max);
        assert_eq!(opts.init_value, f32::MIN);
        assert_eq!((opts.filter_h, opts.filter_w), (2, 2));
        assert_eq!((opts.stride_h, opts.stride_w), (2, 2));
        assert_eq!((opts.dilation_h, opts.dilation_w), (1, 1));
        assert_eq!(opts.padding_h, Padding::default());
    }

    #[test]
    fn test_lower_reduce_window2d_invalid() {
        let mut g = Graph::new();
        let op = max_pool(&mut g, &[3, 8, 8]);
        let allocs = allocate_all(&g);
        let ctx = LowerContext::new(&g, &allocs);
        assert!(matches!(
            op.lower(&ctx),
            Err(LowerOpError::IncompatibleShapes(_))
        ));

        let mut g = Graph::new();
        let mut op = max_pool(&mut g, &[1, 3, 8, 8]);
        op.dilation_h = 0;
        let allocs = allocate_all(&g);
        let ctx = LowerContext::new(&g, &allocs);
        assert!(matches!(
            op.lower(&ctx),
            Err(LowerOpError::InvalidAttribute {
                attr: "dilation_h",
                ..
            })
        ));
    }

    #[test]
    fn test_lower_reduce_window2d_output_mismatch() {
        let mut g = Graph::new();
        let mut op = max_pool(&mut g, &[1, 3, 8, 8]);
        op.stride_w = 1;
        let allocs = allocate_all(&g);
        let ctx = LowerContext::new(&g, &allocs);
        assert!(matches!(
            op.lower(&ctx),
            Err(LowerOpError::IncompatibleShapes(_))
        ));

        // Window larger than the input.
        let mut g = Graph::new();
        let mut op = max_pool(&mut g, &[1, 3, 8, 8]);
        op.filter_w = 9;
        let allocs = allocate_all(&g);
        let ctx = LowerContext::new(&g, &allocs);
        assert!(matches!(
            op.lower(&ctx),
            Err(LowerOpError::InvalidAttribute {
                attr: "padding_w",
                ..
            })
        ));
    }
}
