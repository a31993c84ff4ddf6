//! The lowering driver, which turns a [`Graph`] into a [`Program`].

use std::time::Instant;

use rayon::prelude::*;

use crate::allocation::AllocationOracle;
use crate::env::env_flag;
use crate::graph::{Graph, NodeId};
use crate::instruction::Instruction;
use crate::op_registry::{EmitterRegistry, Lookup};
use crate::operator::LowerContext;
use crate::threading::thread_pool;

mod lower_error;

pub use lower_error::{LowerError, LowerErrorKind};

/// Options that control lowering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CodegenOptions {
    /// Whether to log a summary of each lowering run.
    pub verbose: bool,

    /// Whether to lower nodes concurrently on the
    /// [thread pool](crate::threading::thread_pool). The emitted program is
    /// the same as for serial lowering.
    pub parallel: bool,
}

impl CodegenOptions {
    /// Read options from the `NEUTRAL_CODEGEN_VERBOSE` and
    /// `NEUTRAL_CODEGEN_PARALLEL` environment flags.
    ///
    /// Unset flags are disabled.
    pub fn from_env() -> CodegenOptions {
        CodegenOptions {
            verbose: env_flag("NEUTRAL_CODEGEN_VERBOSE", false),
            parallel: env_flag("NEUTRAL_CODEGEN_PARALLEL", false),
        }
    }
}

/// A lowered program: an ordered sequence of instructions for the runtime
/// interpreter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,

    /// `nodes[i]` is the node which produced `instructions[i]`.
    nodes: Vec<NodeId>,
}

impl Program {
    /// Return the instructions in execution order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Return the ID of the node that produced each instruction.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Iterate over `(node_id, instruction)` pairs in execution order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Instruction)> {
        self.nodes.iter().copied().zip(self.instructions.iter())
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Consume the program and return its instructions.
    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }
}

/// Lowers graphs using the rules in an [`EmitterRegistry`] and the memory
/// ranges from an [`AllocationOracle`].
///
/// ```
/// use neutral_codegen::ops::Softmax;
/// use neutral_codegen::{
///     neutral_registry, AllocationMap, Codegen, DataType, Graph, MemoryLocation, MemoryRange,
///     Opcode,
/// };
///
/// let mut graph = Graph::new();
/// let x = graph.add_input("x", &[8, 10], DataType::Float);
/// let y = graph.add_value(Some("y"), &[8, 10], DataType::Float);
/// graph.add_op(Some("softmax"), Softmax { input: x, output: y });
/// graph.add_output("y", y);
///
/// let mut allocs = AllocationMap::new();
/// allocs.insert(x, MemoryRange { location: MemoryLocation::Input, start: 0, size: 320 });
/// allocs.insert(y, MemoryRange { location: MemoryLocation::Output, start: 0, size: 320 });
///
/// let program = Codegen::new(neutral_registry(), &allocs).lower(&graph).unwrap();
/// assert_eq!(program.len(), 1);
/// assert_eq!(program.instructions()[0].opcode(), Opcode::Softmax);
/// ```
pub struct Codegen<'a> {
    registry: &'a EmitterRegistry,
    oracle: &'a dyn AllocationOracle,
    options: CodegenOptions,
}

impl<'a> Codegen<'a> {
    pub fn new(registry: &'a EmitterRegistry, oracle: &'a dyn AllocationOracle) -> Self {
        Codegen {
            registry,
            oracle,
            options: CodegenOptions::default(),
        }
    }

    /// Replace the options used for lowering.
    pub fn with_options(mut self, options: CodegenOptions) -> Self {
        self.options = options;
        self
    }

    /// Lower all nodes of `graph` in the order they were added.
    pub fn lower(&self, graph: &Graph) -> Result<Program, LowerError> {
        let schedule: Vec<NodeId> = graph.node_ids().collect();
        self.lower_schedule(graph, &schedule)
    }

    /// Lower the nodes in `schedule`, in that order.
    ///
    /// `schedule` must be a topological order of the nodes to lower. It is
    /// preserved verbatim in the output. Nodes whose kind is elided in the
    /// registry emit no instruction, but the values they use must still have
    /// allocations.
    ///
    /// If any node fails to lower, the error for the first failing node in
    /// `schedule` is returned and no program is produced.
    pub fn lower_schedule(
        &self,
        graph: &Graph,
        schedule: &[NodeId],
    ) -> Result<Program, LowerError> {
        let start = Instant::now();
        let ctx = LowerContext::new(graph, self.oracle);
        let lower = |&id: &NodeId| self.lower_node(graph, &ctx, id);

        let lowered: Vec<Option<Instruction>> = if self.options.parallel {
            // Collect every result so that the reported error does not
            // depend on which thread finished first.
            let results: Vec<_> = thread_pool().run(|| schedule.par_iter().map(lower).collect());
            results.into_iter().collect::<Result<_, _>>()?
        } else {
            schedule.iter().map(lower).collect::<Result<_, _>>()?
        };

        let mut program = Program::default();
        for (&id, instr) in schedule.iter().zip(lowered) {
            if let Some(instr) = instr {
                program.nodes.push(id);
                program.instructions.push(instr);
            }
        }

        if self.options.verbose {
            log::info!(
                "Lowered {} nodes to {} instructions in {:.2}ms{}",
                schedule.len(),
                program.len(),
                start.elapsed().as_secs_f64() * 1000.,
                if self.options.parallel {
                    " (parallel)"
                } else {
                    ""
                }
            );
        }

        Ok(program)
    }

    /// Lower a single node, returning `None` if its kind is elided.
    fn lower_node(
        &self,
        graph: &Graph,
        ctx: &LowerContext,
        id: NodeId,
    ) -> Result<Option<Instruction>, LowerError> {
        let node = graph
            .node(id)
            .ok_or_else(|| LowerError::invalid_node_id(id))?;
        let op = node.op();

        match self.registry.lookup(node.kind()) {
            Lookup::Unregistered => Err(LowerError::unsupported_operator(id, node)),
            Lookup::Elided => {
                for value in op.inputs().into_iter().chain(op.outputs()) {
                    ctx.allocation(value)
                        .map_err(|err| LowerError::op_error_at(id, node, err))?;
                }
                log::trace!("Elided node {} {}", id, node);
                Ok(None)
            }
            Lookup::Rule(rule) => {
                let instr = rule(op, ctx).map_err(|err| LowerError::op_error_at(id, node, err))?;
                log::debug!("Lowered node {} {} to {}", id, node, instr);
                Ok(Some(instr))
            }
        }
    }
}
