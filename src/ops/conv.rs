use smallvec::smallvec;

use crate::graph::ValueId;
use crate::instruction::{Conv2dOptions, Instruction};
use crate::operator::{LowerContext, LowerOp, LowerOpError};
use crate::ops::{
    attr_u32, check_activation, positive_attr, window_count, Activation, ConstantData, Padding,
    ValueList,
};
use crate::shape::to_runtime_shape;

/// 2D convolution over an NCHW input.
///
/// `weights` has shape `[out_channels, in_channels / groups, filter_h,
/// filter_w]` and `bias` has one entry per output channel. Both are passed
/// through to the instruction unchanged.
#[derive(Clone, Debug, PartialEq)]
pub struct Conv2d {
    pub input: ValueId,
    pub output: ValueId,
    pub weights: ConstantData,
    pub bias: ConstantData,
    pub groups: usize,
    pub padding_h: Padding,
    pub padding_w: Padding,
    pub stride_h: usize,
    pub stride_w: usize,
    pub dilation_h: usize,
    pub dilation_w: usize,
    pub fused_activation: Activation,
}

impl Conv2d {
    pub fn inputs(&self) -> ValueList {
        smallvec![self.input]
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}

impl LowerOp for Conv2d {
    fn lower(&self, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
        let in_shape = ctx.shape(self.input)?;
        let &[batch, in_channels, in_h, in_w] = in_shape else {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "input must have 4 dims but has shape {:?}",
                in_shape
            )));
        };
        let &[out_channels, group_channels, filter_h, filter_w] = self.weights.shape() else {
            return Err(LowerOpError::attr_error("weights", "must have 4 dims"));
        };

        let groups = positive_attr("groups", self.groups)?;
        if in_channels % self.groups != 0 || out_channels % self.groups != 0 {
            return Err(LowerOpError::attr_error(
                "groups",
                "must divide input and output channel counts",
            ));
        }
        if group_channels * self.groups != in_channels {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "weights expect {} input channels per group but input has {} channels in {} groups",
                group_channels, in_channels, self.groups
            )));
        }
        if self.bias.len() != out_channels {
            return Err(LowerOpError::attr_error(
                "bias",
                format_args!("expected {} values, found {}", out_channels, self.bias.len()),
            ));
        }

        let filter_h = positive_attr("weights", filter_h)?;
        let filter_w = positive_attr("weights", filter_w)?;
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
        if out_shape != [batch, out_channels, out_h, out_w] {
            return Err(LowerOpError::incompatible_shapes(format_args!(
                "output shape {:?} does not match [{}, {}, {}, {}]",
                out_shape, batch, out_channels, out_h, out_w
            )));
        }

        Ok(Instruction::Conv2d(Conv2dOptions {
            input: ctx.allocation(self.input)?,
            output: ctx.allocation(self.output)?,
            in_shape: to_runtime_shape(in_shape)?,
            groups,
            out_channels: attr_u32("weights", out_channels)?,
            padding_h: self.padding_h,
            padding_w: self.padding_w,
            filter_h,
            filter_w,
            stride_h,
            stride_w,
            dilation_h,
            dilation_w,
            fused_activation: check_activation(self.fused_activation)?,
            weights: self.weights.clone(),
            bias: self.bias.clone(),
        }))
    }
}
