//! Control-flow edges.
//!
//! A [`Link`] leaves its source block through one of the block's exits and enters
//! its target block, binding the target's parameters to its arguments. Arguments
//! are positional: argument `i` becomes parameter `i` of the target.

use std::fmt;

use crate::analysis::ssa::{ConstValue, Operand};

/// Identifier of a link within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(pub usize);

impl LinkId {
    /// Creates a new link identifier.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the index into the function's link table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// A directed edge between two blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Identifier of this link.
    pub id: LinkId,
    /// Block whose exit this link is.
    pub source: usize,
    /// Block this link enters.
    pub target: usize,
    /// One value per parameter of the target block.
    pub args: Vec<Operand>,
    /// The switch value selecting this exit, `None` for the default exit.
    pub exit_case: Option<ConstValue>,
}

impl Link {
    /// Creates a new link.
    #[must_use]
    pub fn new(id: LinkId, source: usize, target: usize, args: Vec<Operand>) -> Self {
        Self {
            id,
            source,
            target,
            args,
            exit_case: None,
        }
    }

    /// Returns `true` if the link leaves and enters the same block.
    #[must_use]
    pub const fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(case) = &self.exit_case {
            write!(f, "[{case}] ")?;
        }
        write!(f, "-> B{}(", self.target)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}
