//! SSA blocks: parameters, operations and exits.
//!
//! A block's parameters are its phi nodes: each incoming link binds them
//! positionally. Operations execute in order; afterwards control leaves through
//! one of the exits. With a single exit the choice is unconditional. With several
//! exits the block's exit switch selects the link whose `exit_case` matches, the
//! link without a case serving as default.
//!
//! A *raising* block is one whose last operation may raise; its exits are then
//! the normal continuation and the exception handlers of that operation, and the
//! operation itself must stay in place.
//!
//! # Thread Safety
//!
//! All types in this module are `Send` and `Sync`.

use std::fmt;

use crate::analysis::ssa::{LinkId, Operand, SsaOperation, SsaVarId};

/// A block of a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaBlock {
    /// Block index within the function.
    id: usize,

    /// Parameters bound by incoming links.
    params: Vec<SsaVarId>,

    /// Operations in execution order.
    operations: Vec<SsaOperation>,

    /// Outgoing links, in exit order.
    exits: Vec<LinkId>,

    /// Value selecting among several exits.
    exit_switch: Option<Operand>,

    /// Whether the last operation may raise into the exits.
    raising: bool,
}

impl SsaBlock {
    /// Creates a new empty block.
    ///
    /// # Arguments
    ///
    /// * `id` - The block index
    #[must_use]
    pub fn new(id: usize) -> Self {
        Self {
            id,
            params: Vec::new(),
            operations: Vec::new(),
            exits: Vec::new(),
            exit_switch: None,
            raising: false,
        }
    }

    /// Returns the block index.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Returns the parameters.
    #[must_use]
    pub fn params(&self) -> &[SsaVarId] {
        &self.params
    }

    /// Appends a parameter.
    pub fn add_param(&mut self, var: SsaVarId) {
        self.params.push(var);
    }

    /// Returns a mutable reference to the parameters.
    ///
    /// Every incoming link must be kept in step with any change made here.
    pub fn params_mut(&mut self) -> &mut Vec<SsaVarId> {
        &mut self.params
    }

    /// Returns the operations in execution order.
    #[must_use]
    pub fn operations(&self) -> &[SsaOperation] {
        &self.operations
    }

    /// Returns a mutable reference to the operations.
    pub fn operations_mut(&mut self) -> &mut Vec<SsaOperation> {
        &mut self.operations
    }

    /// Appends an operation.
    pub fn add_operation(&mut self, op: SsaOperation) {
        self.operations.push(op);
    }

    /// Returns the outgoing links.
    #[must_use]
    pub fn exits(&self) -> &[LinkId] {
        &self.exits
    }

    /// Appends an outgoing link.
    pub fn add_exit(&mut self, link: LinkId) {
        self.exits.push(link);
    }

    /// Returns the exit switch, if any.
    #[must_use]
    pub const fn exit_switch(&self) -> Option<&Operand> {
        self.exit_switch.as_ref()
    }

    /// Sets the exit switch.
    pub fn set_exit_switch(&mut self, switch: Option<Operand>) {
        self.exit_switch = switch;
    }

    /// Returns a mutable reference to the exit switch.
    pub fn exit_switch_mut(&mut self) -> Option<&mut Operand> {
        self.exit_switch.as_mut()
    }

    /// Returns `true` if the last operation may raise into the exits.
    #[must_use]
    pub const fn is_raising(&self) -> bool {
        self.raising
    }

    /// Marks whether the last operation may raise into the exits.
    pub fn set_raising(&mut self, raising: bool) {
        self.raising = raising;
    }

    /// Returns `true` if the block has no exits.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.exits.is_empty()
    }

    /// Returns the number of operations a rewrite may touch.
    ///
    /// This is every operation except the raising one at the end of a raising
    /// block.
    #[must_use]
    pub fn rewritable_len(&self) -> usize {
        if self.raising {
            self.operations.len().saturating_sub(1)
        } else {
            self.operations.len()
        }
    }

    /// Returns the variables this block defines: parameters and results.
    pub fn defined_vars(&self) -> impl Iterator<Item = SsaVarId> + '_ {
        self.params
            .iter()
            .copied()
            .chain(self.operations.iter().filter_map(SsaOperation::result))
    }
}

impl fmt::Display for SsaBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}(", self.id)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{param}")?;
        }
        writeln!(f, "):")?;
        for op in &self.operations {
            writeln!(f, "  {op}")?;
        }
        if let Some(switch) = &self.exit_switch {
            writeln!(f, "  switch {switch}")?;
        }
        if self.raising {
            writeln!(f, "  raising")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ssa::Opcode;

    #[test]
    fn test_new_block_is_final() {
        let block = SsaBlock::new(3);
        assert_eq!(block.id(), 3);
        assert!(block.is_final());
        assert!(block.params().is_empty());
    }

    #[test]
    fn test_raising_block_protects_last_operation() {
        let mut block = SsaBlock::new(0);
        block.add_operation(SsaOperation::new(Opcode::Malloc, vec![], Some(SsaVarId::new(0))));
        block.add_operation(SsaOperation::new(
            Opcode::IndirectCall,
            vec![SsaVarId::new(1).into()],
            None,
        ));
        assert_eq!(block.rewritable_len(), 2);
        block.set_raising(true);
        assert_eq!(block.rewritable_len(), 1);
    }

    #[test]
    fn test_defined_vars() {
        let mut block = SsaBlock::new(0);
        block.add_param(SsaVarId::new(0));
        block.add_operation(SsaOperation::new(
            Opcode::IntNeg,
            vec![SsaVarId::new(0).into()],
            Some(SsaVarId::new(1)),
        ));
        let defined: Vec<_> = block.defined_vars().collect();
        assert_eq!(defined, vec![SsaVarId::new(0), SsaVarId::new(1)]);
    }
}
