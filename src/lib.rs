//! neutral-codegen lowers dataflow graphs of tensor operators into flat
//! sequences of instruction records for a minimal runtime interpreter.
//!
//! # Lowering a graph
//!
//! The basic workflow is:
//!
//! 1. Build a [`Graph`] whose value shapes are fully resolved and whose nodes
//!    are in topological order.
//! 2. Run an allocation pass which assigns each value a [`MemoryRange`], and
//!    expose the result through an [`AllocationOracle`] such as
//!    [`AllocationMap`].
//! 3. Lower the graph using [`Codegen`] and an [`EmitterRegistry`]. The
//!    registry returned by [`neutral_registry`] contains rules for all
//!    built-in operators.
//!
//! The result is a [`Program`] with one [`Instruction`] per lowered node, in
//! schedule order. Input, output and constant nodes emit no instruction.
//!
//! # Canonical rank
//!
//! The interpreter iterates over a fixed number of axes,
//! [`CANONICAL_RANK`](shape::CANONICAL_RANK). Every fixed-size shape field in
//! an instruction record has this many entries, with lower-rank shapes padded
//! with leading unit dimensions.
//!
//! # Threading
//!
//! Lowering is serial by default. When [`CodegenOptions::parallel`] is set,
//! nodes are lowered concurrently on a Rayon thread pool (see
//! [`threading::thread_pool`]) and the results are put back into schedule
//! order, so the output does not depend on the option.
//!
//! # Logging
//!
//! Lowering logs through the [log](https://docs.rs/log) facade. Each emitted
//! instruction is logged at debug level. Install a logger in the application
//! to see these messages.

mod allocation;
mod codegen;
mod env;
mod graph;
mod instruction;
mod op_registry;
mod operator;
mod value;

pub mod ops;
pub mod shape;
pub mod threading;

#[cfg(test)]
mod test_util;

pub use allocation::{AllocationMap, AllocationOracle};
pub use codegen::{Codegen, CodegenOptions, LowerError, LowerErrorKind, Program};
pub use graph::{Graph, Node, NodeId, ValueId};
pub use instruction::{
    BinaryOptions, ConcatOptions, Conv2dOptions, Instruction, MatMulOptions, MemoryLocation,
    MemoryRange, Opcode, QuantizeOptions, ReduceOptions, ReduceWindow2dOptions, SoftmaxOptions,
    TransposeOptions,
};
pub use op_registry::{neutral_registry, Emitter, EmitterRegistry, Lookup, LowerFn};
pub use operator::{LowerContext, LowerOp, LowerOpError};
pub use ops::{Op, OpKind};
pub use value::{DataType, ValueInfo};
