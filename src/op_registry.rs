use std::sync::OnceLock;

use rustc_hash::FxHashMap;

use crate::instruction::Instruction;
use crate::operator::{LowerContext, LowerOp, LowerOpError};
use crate::ops;
use crate::ops::{Op, OpKind};

/// Signature of functions which lower an operator to an instruction.
pub type LowerFn = dyn Fn(&Op, &LowerContext) -> Result<Instruction, LowerOpError> + Send + Sync;

/// Lower `op` using the rule for operator type `Op`.
fn lower_as<Op: LowerOp>(op: &ops::Op, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
    let concrete = Op::from_op(op).ok_or(LowerOpError::KindMismatch {
        expected: Op::KIND,
        actual: op.kind(),
    })?;
    concrete.lower(ctx)
}

/// Entry in an [`EmitterRegistry`].
pub enum Emitter {
    /// Lower the operator using a rule.
    Rule(Box<LowerFn>),

    /// Emit nothing for the operator. Its values are materialized by the
    /// allocator, eg. external inputs and constants.
    Elided,
}

/// Result of looking up an operator kind in an [`EmitterRegistry`].
pub enum Lookup<'a> {
    /// The kind is lowered using this rule.
    Rule(&'a LowerFn),

    /// The kind is registered, but intentionally emits no instruction.
    Elided,

    /// The kind is not supported.
    Unregistered,
}

/// Registry mapping operator kinds to the rules that lower them.
///
/// New registries have no operators registered. To create a registry with all
/// built-in rules, use [`EmitterRegistry::with_neutral_ops`] or the shared
/// instance returned by [`neutral_registry`]. Registries are populated before
/// lowering begins and are read-only afterwards, so one registry can be used
/// from many threads.
#[derive(Default)]
pub struct EmitterRegistry {
    emitters: FxHashMap<OpKind, Emitter>,
}

impl EmitterRegistry {
    /// Create a new empty registry.
    pub fn new() -> EmitterRegistry {
        EmitterRegistry::default()
    }

    /// Register the built-in rule for an operator.
    ///
    /// ```
    /// use neutral_codegen::ops::{Concat, Softmax};
    /// use neutral_codegen::{EmitterRegistry, Lookup, OpKind};
    ///
    /// // Register only the operators needed for a model.
    /// let mut reg = EmitterRegistry::new();
    /// reg.register_op::<Concat>();
    /// reg.register_op::<Softmax>();
    ///
    /// assert!(matches!(reg.lookup(OpKind::Softmax), Lookup::Rule(_)));
    /// assert!(matches!(reg.lookup(OpKind::Conv2d), Lookup::Unregistered));
    /// ```
    pub fn register_op<Op: LowerOp + 'static>(&mut self) {
        self.register(Op::KIND, Box::new(lower_as::<Op>));
    }

    /// Install a rule for an operator kind, replacing any previous entry.
    pub fn register(&mut self, kind: OpKind, rule: Box<LowerFn>) {
        self.emitters.insert(kind, Emitter::Rule(rule));
    }

    /// Mark an operator kind as emitting no instruction, replacing any
    /// previous entry.
    pub fn disable(&mut self, kind: OpKind) {
        self.emitters.insert(kind, Emitter::Elided);
    }

    /// Look up how an operator kind is lowered.
    pub fn lookup(&self, kind: OpKind) -> Lookup<'_> {
        match self.emitters.get(&kind) {
            Some(Emitter::Rule(rule)) => Lookup::Rule(rule.as_ref()),
            Some(Emitter::Elided) => Lookup::Elided,
            None => Lookup::Unregistered,
        }
    }

    /// Return the registered operator kinds in sorted order.
    pub fn kinds(&self) -> Vec<OpKind> {
        let mut kinds: Vec<_> = self.emitters.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Create a new registry with all built-in rules registered.
    pub fn with_neutral_ops() -> EmitterRegistry {
        let mut reg = EmitterRegistry::new();

        macro_rules! register_op {
            ($op:ident) => {
                reg.register_op::<ops::$op>()
            };
        }

        register_op!(Binary);
        register_op!(Concat);
        register_op!(Conv2d);
        register_op!(Dequantize);
        register_op!(MatMul);
        register_op!(Quantize);
        register_op!(Reduce);
        register_op!(ReduceWindow2d);
        register_op!(Softmax);
        register_op!(Transpose);

        reg.disable(OpKind::Input);
        reg.disable(OpKind::Output);
        reg.disable(OpKind::Constant);

        reg
    }
}

/// Return the process-wide registry with all built-in rules.
///
/// The registry is created on first use.
pub fn neutral_registry() -> &'static EmitterRegistry {
    static REGISTRY: OnceLock<EmitterRegistry> = OnceLock::new();
    REGISTRY.get_or_init(EmitterRegistry::with_neutral_ops)
}

#[cfg(test)]
mod tests {
    use super::{neutral_registry, EmitterRegistry, Lookup};
    use crate::graph::Graph;
    use crate::instruction::{Instruction, SoftmaxOptions};
    use crate::operator::{LowerContext, LowerOpError};
    use crate::ops::{Op, OpKind, Softmax, Transpose};
    use crate::test_util::allocate_all;
    use crate::value::DataType;

    #[test]
    fn test_neutral_registry() {
        let reg = neutral_registry();
        assert_eq!(reg.kinds().len(), 13);

        for kind in [OpKind::Input, OpKind::Output, OpKind::Constant] {
            assert!(matches!(reg.lookup(kind), Lookup::Elided));
        }
        for kind in [OpKind::Concat, OpKind::Softmax, OpKind::Transpose] {
            assert!(matches!(reg.lookup(kind), Lookup::Rule(_)));
        }

        // Repeated calls return the same instance.
        assert!(std::ptr::eq(reg, neutral_registry()));
    }

    #[test]
    fn test_register_and_disable() {
        let mut reg = EmitterRegistry::new();
        assert!(matches!(reg.lookup(OpKind::Softmax), Lookup::Unregistered));

        reg.register_op::<Softmax>();
        assert!(matches!(reg.lookup(OpKind::Softmax), Lookup::Rule(_)));

        reg.disable(OpKind::Softmax);
        assert!(matches!(reg.lookup(OpKind::Softmax), Lookup::Elided));
        assert_eq!(reg.kinds(), [OpKind::Softmax]);
    }

    /// Softmax rule which treats the input as one row.
    fn single_row_softmax(op: &Op, ctx: &LowerContext) -> Result<Instruction, LowerOpError> {
        let Op::Softmax(softmax) = op else {
            unreachable!();
        };
        Ok(Instruction::Softmax(SoftmaxOptions {
            input: ctx.allocation(softmax.input)?,
            output: ctx.allocation(softmax.output)?,
            inner_size: 4,
            outer_size: 1,
        }))
    }

    #[test]
    fn test_register_overwrites_rule() {
        let mut g = Graph::new();
        let input = g.add_input("x", &[2, 2], DataType::Float);
        let output = g.add_value(None, &[2, 2], DataType::Float);
        let allocs = allocate_all(&g);
        let ctx = LowerContext::new(&g, &allocs);
        let op: Op = Softmax { input, output }.into();

        let mut reg = EmitterRegistry::new();
        reg.register_op::<Softmax>();
        reg.register(OpKind::Softmax, Box::new(single_row_softmax));

        let Lookup::Rule(rule) = reg.lookup(OpKind::Softmax) else {
            panic!("expected rule");
        };
        let Instruction::Softmax(opts) = rule(&op, &ctx).unwrap() else {
            panic!("expected softmax instruction");
        };
        assert_eq!((opts.outer_size, opts.inner_size), (1, 4));
    }

    #[test]
    fn test_rule_kind_mismatch() {
        let mut g = Graph::new();
        let input = g.add_input("x", &[2, 2], DataType::Float);
        let output = g.add_value(None, &[2, 2], DataType::Float);
        let allocs = allocate_all(&g);
        let ctx = LowerContext::new(&g, &allocs);

        let mut reg = EmitterRegistry::new();
        reg.register_op::<Transpose>();
        let Lookup::Rule(rule) = reg.lookup(OpKind::Transpose) else {
            panic!("expected rule");
        };

        let op: Op = Softmax { input, output }.into();
        assert_eq!(
            rule(&op, &ctx),
            Err(LowerOpError::KindMismatch {
                expected: OpKind::Transpose,
                actual: OpKind::Softmax
            })
        );
    }
}
