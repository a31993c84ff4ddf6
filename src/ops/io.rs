//! Graph bookkeeping operators.
//!
//! These never produce instructions. Their values are materialized by the
//! allocator (external input and output buffers, read-only constant data).

use smallvec::smallvec;

use crate::graph::ValueId;
use crate::ops::{ConstantData, ValueList};

/// An external input to the graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Input {
    pub output: ValueId,
}

impl Input {
    pub fn inputs(&self) -> ValueList {
        ValueList::new()
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}

/// An external output of the graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Output {
    pub input: ValueId,
}

impl Output {
    pub fn inputs(&self) -> ValueList {
        smallvec![self.input]
    }

    pub fn outputs(&self) -> ValueList {
        ValueList::new()
    }
}

/// A compile-time constant.
#[derive(Clone, Debug, PartialEq)]
pub struct Constant {
    pub output: ValueId,
    pub data: ConstantData,
}

impl Constant {
    pub fn inputs(&self) -> ValueList {
        ValueList::new()
    }

    pub fn outputs(&self) -> ValueList {
        smallvec![self.output]
    }
}
