use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::graph::{Node, NodeId};
use crate::operator::LowerOpError;
use crate::ops::OpKind;

/// Errors that occur when lowering a graph.
#[derive(Debug)]
pub struct LowerError(LowerErrorImpl);

impl LowerError {
    /// Return the general category of error.
    pub fn kind(&self) -> LowerErrorKind {
        self.0.kind()
    }

    /// ID of the node that failed to lower.
    pub fn node(&self) -> NodeId {
        match &self.0 {
            LowerErrorImpl::InvalidNodeId(node)
            | LowerErrorImpl::UnsupportedOperator { node, .. }
            | LowerErrorImpl::OperatorError { node, .. } => *node,
        }
    }

    /// Debug name of the node that failed to lower, if it has one.
    pub fn node_name(&self) -> Option<&str> {
        match &self.0 {
            LowerErrorImpl::InvalidNodeId(_) => None,
            LowerErrorImpl::UnsupportedOperator { name, .. }
            | LowerErrorImpl::OperatorError { name, .. } => name.as_deref(),
        }
    }

    /// Kind of the operator that failed to lower, if the node exists.
    pub fn op_kind(&self) -> Option<OpKind> {
        match &self.0 {
            LowerErrorImpl::InvalidNodeId(_) => None,
            LowerErrorImpl::UnsupportedOperator { kind, .. }
            | LowerErrorImpl::OperatorError { kind, .. } => Some(*kind),
        }
    }

    /// Return the error reported by the lowering rule, if any.
    pub fn op_error(&self) -> Option<&LowerOpError> {
        match &self.0 {
            LowerErrorImpl::OperatorError { error, .. } => Some(error),
            _ => None,
        }
    }

    pub(crate) fn invalid_node_id(node: NodeId) -> Self {
        LowerErrorImpl::InvalidNodeId(node).into()
    }

    pub(crate) fn unsupported_operator(id: NodeId, node: &Node) -> Self {
        LowerErrorImpl::UnsupportedOperator {
            node: id,
            name: node.name().map(|s| s.to_string()),
            kind: node.kind(),
        }
        .into()
    }

    pub(crate) fn op_error_at(id: NodeId, node: &Node, error: LowerOpError) -> Self {
        LowerErrorImpl::OperatorError {
            node: id,
            name: node.name().map(|s| s.to_string()),
            kind: node.kind(),
            error,
        }
        .into()
    }
}

impl Display for LowerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Error for LowerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.op_error().map(|err| err as &(dyn Error + 'static))
    }
}

impl From<LowerErrorImpl> for LowerError {
    fn from(inner: LowerErrorImpl) -> Self {
        Self(inner)
    }
}

/// The category of lowering error. See [`LowerError::kind`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum LowerErrorKind {
    /// No rule is registered for the node's operator kind.
    UnsupportedOperator,

    /// The node's attributes or operand shapes violate a rule precondition.
    MalformedAttributes,

    /// The allocation oracle has no memory range for a value used by the
    /// node. This means the allocation pass did not cover the graph.
    UnresolvedAllocation,

    /// The graph is inconsistent, eg. a node refers to a value or node that
    /// does not exist.
    InvalidGraph,
}

/// Internal implementation of [`LowerError`].
#[derive(Debug)]
pub(crate) enum LowerErrorImpl {
    /// A scheduled node ID does not exist in the graph.
    InvalidNodeId(NodeId),

    /// No rule is registered for the operator kind.
    UnsupportedOperator {
        node: NodeId,
        name: Option<String>,
        kind: OpKind,
    },

    /// The lowering rule for the node failed.
    OperatorError {
        node: NodeId,
        name: Option<String>,
        kind: OpKind,
        error: LowerOpError,
    },
}

impl LowerErrorImpl {
    fn kind(&self) -> LowerErrorKind {
        type Kind = LowerErrorKind;

        match self {
            Self::InvalidNodeId(_) => Kind::InvalidGraph,
            Self::UnsupportedOperator { .. } => Kind::UnsupportedOperator,
            Self::OperatorError { error, .. } => match error {
                LowerOpError::UnresolvedAllocation(_) => Kind::UnresolvedAllocation,
                LowerOpError::UnknownValue(_) => Kind::InvalidGraph,
                // The registry maps this kind to a rule for another kind.
                LowerOpError::KindMismatch { .. } => Kind::UnsupportedOperator,
                LowerOpError::InvalidAttribute { .. }
                | LowerOpError::IncompatibleShapes(_)
                | LowerOpError::UnsupportedType { .. } => Kind::MalformedAttributes,
            },
        }
    }
}

/// Write a node's ID, kind and name, eg. `node 3 (Concat "concat_1")`.
fn write_node(
    f: &mut Formatter<'_>,
    node: NodeId,
    kind: OpKind,
    name: Option<&str>,
) -> std::fmt::Result {
    write!(f, "node {} ({}", node, kind)?;
    if let Some(name) = name {
        write!(f, " \"{}\"", name)?;
    }
    write!(f, ")")
}

impl Display for LowerErrorImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNodeId(node) => write!(f, "node ID {} is invalid", node),
            Self::UnsupportedOperator { node, name, kind } => {
                write!(f, "unsupported operator: ")?;
                write_node(f, *node, *kind, name.as_deref())?;
                write!(f, " has no lowering rule")
            }
            Self::OperatorError {
                node,
                name,
                kind,
                error,
            } => {
                write_node(f, *node, *kind, name.as_deref())?;
                write!(f, " failed to lower: {}", error)
            }
        }
    }
}
