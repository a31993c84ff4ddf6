//! Dataflow graphs of tensor operators.

use std::fmt;

use crate::ops::{Constant, ConstantData, Input, Op, OpKind, Output};
use crate::value::{DataType, ValueInfo};

mod node_id;

pub use node_id::{NodeId, ValueId};

/// An operator node in a [`Graph`].
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    name: Option<String>,
    op: Op,
}

impl Node {
    /// Return the debug name of this node.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn kind(&self) -> OpKind {
        self.op.kind()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} \"{}\"", self.kind(), name),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// A graph defines how to compute output values from input values and
/// constants, via a series of operators.
///
/// Nodes are stored in the order they were added, which callers are expected
/// to make a topological order (producers before consumers). This is the
/// default order in which the graph is lowered. All value shapes must be
/// fully resolved.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    values: Vec<ValueInfo>,
    nodes: Vec<Node>,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Graph {
        Graph::default()
    }

    /// Add a value (tensor edge) to the graph.
    ///
    /// The value should be used as the output of exactly one operator.
    pub fn add_value(&mut self, name: Option<&str>, shape: &[usize], dtype: DataType) -> ValueId {
        let id = ValueId::from_u32(self.values.len() as u32);
        self.values.push(ValueInfo::new(name, shape, dtype));
        id
    }

    /// Add an operator node to the graph and return its ID.
    pub fn add_op(&mut self, name: Option<&str>, op: impl Into<Op>) -> NodeId {
        let id = NodeId::from_u32(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: name.map(|s| s.to_owned()),
            op: op.into(),
        });
        id
    }

    /// Add an external input and return the ID of the value it produces.
    pub fn add_input(&mut self, name: &str, shape: &[usize], dtype: DataType) -> ValueId {
        let output = self.add_value(Some(name), shape, dtype);
        self.add_op(Some(name), Input { output });
        output
    }

    /// Add a constant float tensor and return the ID of its value.
    pub fn add_constant(&mut self, name: &str, data: ConstantData) -> ValueId {
        let output = self.add_value(Some(name), data.shape(), DataType::Float);
        self.add_op(Some(name), Constant { output, data });
        output
    }

    /// Mark a value as an external output of the graph.
    pub fn add_output(&mut self, name: &str, input: ValueId) -> NodeId {
        self.add_op(Some(name), Output { input })
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_usize())
    }

    pub fn value(&self, id: ValueId) -> Option<&ValueInfo> {
        self.values.get(id.as_usize())
    }

    /// Return the IDs of all operator nodes, in insertion order.
    pub fn node_ids(&self) -> impl ExactSizeIterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId::from_u32)
    }

    /// Return the IDs of all values, in insertion order.
    pub fn value_ids(&self) -> impl ExactSizeIterator<Item = ValueId> {
        (0..self.values.len() as u32).map(ValueId::from_u32)
    }

    /// Iterate over `(id, node)` pairs in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.node_ids().zip(self.nodes.iter())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }
}
