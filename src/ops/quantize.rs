use smallvec::smallvec;

use crate::graph::ValueId;
use crate::instruction::{Instruction, QuantizeOptions};
use crate::operator::{LowerContext, LowerOp, LowerOpError};
use crate::ops::{QuantParam, ValueList};
use crate::value::DataType;

/// Convert a float tensor to u8 using affine quantization.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantize {
    pub input: ValueId,
    pub output: ValueId,
    pub quant_param: QuantParam,
}

impl Quantize {
    pub fn inputs(&self) -> ValueList {
        smallvec![self.input]
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}

impl LowerOp for Quantize {
    fn lower(&self, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
        ctx.value_of_type(self.input, DataType::Float)?;
        ctx.value_of_type(self.output, DataType::UInt8)?;

        Ok(Instruction::Quantize(QuantizeOptions {
            input: ctx.allocation(self.input)?,
            output: ctx.allocation(self.output)?,
            quant_param: self.quant_param,
        }))
    }
}

/// Convert a u8 tensor to float using affine quantization.
#[derive(Clone, Debug, PartialEq)]
pub struct Dequantize {
    pub input: ValueId,
    pub output: ValueId,
    pub quant_param: QuantParam,
}

impl Dequantize {
    pub fn inputs(&self) -> ValueList {
        smallvec![self.input]
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}

impl LowerOp for Dequantize {
    fn lower(&self, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
        ctx.value_of_type(self.input, DataType::UInt8)?;
        ctx.value_of_type(self.output, DataType::Float)?;

        Ok(Instruction::Dequantize(QuantizeOptions {
            input: ctx.allocation(self.input)?,
            output: ctx.allocation(self.output)?,
            quant_param: self.quant_param,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{Dequantize, Quantize};
    use crate::graph::Graph;
    use crate::instruction::Instruction;
    use crate::operator::{LowerContext, LowerOp, LowerOpError};
    use crate::ops::QuantParam;
    use crate::test_util::allocate_all;
    use crate::value::DataType;

    #[test]
    fn test_lower_quantize_dequantize() {
        let quant_param = QuantParam {
            zero_point: 128,
            scale: 0.05,
        };

        let mut g = Graph::new();
        let x = g.add_input("x", &[2, 8], DataType::Float);
        let q = g.add_value(Some("q"), &[2, 8], DataType::UInt8);
        let y = g.add_value(Some("y"), &[2, 8], DataType::Float);
        let allocs = allocate_all(&g);
        let ctx = LowerContext::new(&g, &allocs);

        let quantize = Quantize {
            input: x,
            output: q,
            quant_param,
        };
        let Instruction::Quantize(opts) = quantize.lower(&ctx).unwrap() else {
            panic!("expected quantize instruction");
        };
        assert_eq!(opts.quant_param, quant_param);
        assert_eq!(opts.input, ctx.allocation(x).unwrap());
        assert_eq!(opts.output, ctx.allocation(q).unwrap());

        let dequantize = Dequantize {
            input: q,
            output: y,
            quant_param,
        };
        let Instruction::Dequantize(opts) = dequantize.lower(&ctx).unwrap() else {
            panic!("expected dequantize instruction");
        };
        assert_eq!(opts.quant_param, quant_param);
        assert_eq!(opts.output, ctx.allocation(y).unwrap());

        // Operand types are swapped.
        let invalid = Quantize {
            input: q,
            output: y,
            quant_param,
        };
        assert_eq!(
            invalid.lower(&ctx),
            Err(LowerOpError::UnsupportedType {
                value: q,
                dtype: DataType::UInt8
            })
        );
    }
}
