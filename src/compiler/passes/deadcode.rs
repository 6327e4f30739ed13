//! Dead code elimination pass.
//!
//! Removes operations whose results are never used and that have no effect
//! beyond computing that result, as well as the void placeholders left by
//! redundant store elimination.
//!
//! An operation is kept if any of these holds:
//!
//! - its result is used by an operation, an exit switch or a link argument
//! - it may write memory or observable state
//! - it may raise, or calls another function
//! - it is the raising operation at the end of a raising block
//!
//! Removal runs to a fixed point, since removing one operation can make the
//! operations feeding it dead.

use std::collections::BTreeSet;

use crate::{
    analysis::{MethodRef, OpFlags, SsaFunction, SsaOperation, SsaVarId},
    compiler::{pass::SsaPass, CompilerContext, EventKind, EventLog},
    Result,
};

/// Maximum iterations for the fixed-point algorithm to prevent infinite loops.
const MAX_ITERATIONS: usize = 100;

/// Dead code elimination pass.
pub struct DeadCodeEliminationPass;

impl Default for DeadCodeEliminationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadCodeEliminationPass {
    /// Creates a new dead code elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn used_vars(ssa: &SsaFunction) -> BTreeSet<SsaVarId> {
        let mut used = BTreeSet::new();
        for block in ssa.blocks() {
            for op in block.operations() {
                used.extend(op.used_vars());
            }
            if let Some(var) = block.exit_switch().and_then(|s| s.as_var()) {
                used.insert(var);
            }
        }
        for link in ssa.links() {
            used.extend(link.args.iter().filter_map(|a| a.as_var()));
        }
        used
    }

    fn is_dead(op: &SsaOperation, used: &BTreeSet<SsaVarId>) -> bool {
        if op.is_nop() {
            return true;
        }
        let Some(result) = op.result() else {
            return false;
        };
        !used.contains(&result)
            && !op
                .flags()
                .intersects(OpFlags::SIDE_EFFECTS | OpFlags::CAN_RAISE | OpFlags::CALL)
    }

    fn run_iteration(ssa: &mut SsaFunction, method: Option<MethodRef>, changes: &EventLog) -> usize {
        let used = Self::used_vars(ssa);
        let mut total = 0;

        for index in 0..ssa.block_count() {
            let Some(block) = ssa.block_mut(index) else {
                continue;
            };
            let protected = block.is_raising().then(|| block.operations().len().saturating_sub(1));
            let before = block.operations().len();

            let mut position = 0;
            block.operations_mut().retain(|op| {
                let keep = Some(position) == protected || !Self::is_dead(op, &used);
                position += 1;
                keep
            });

            let removed = before - block.operations().len();
            if removed > 0 {
                changes
                    .record(EventKind::InstructionRemoved)
                    .method(method)
                    .location(index)
                    .pass("dead-code-elimination")
                    .message(format!("{removed} dead operations"));
                total += removed;
            }
        }
        total
    }

    /// Removes dead operations from `ssa` to a fixed point.
    ///
    /// # Arguments
    ///
    /// * `ssa` - The function to modify.
    /// * `method` - The function's handle for event attribution, if any.
    /// * `changes` - The log that receives an `InstructionRemoved` event per
    ///   block and iteration.
    ///
    /// # Returns
    ///
    /// The number of removed operations.
    pub fn eliminate(ssa: &mut SsaFunction, method: Option<MethodRef>, changes: &EventLog) -> usize {
        let mut total = 0;
        for _ in 0..MAX_ITERATIONS {
            let removed = Self::run_iteration(ssa, method, changes);
            if removed == 0 {
                break;
            }
            total += removed;
        }
        total
    }
}

impl SsaPass for DeadCodeEliminationPass {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn description(&self) -> &'static str {
        "Removes operations whose results are never used"
    }

    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method: MethodRef,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        let changes = EventLog::new();
        let changed = Self::eliminate(ssa, Some(method), &changes) > 0;
        if changed {
            ctx.events.merge(&changes);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ConstValue, FieldRef, MethodRef, Opcode, SsaFunctionBuilder, SsaType, TypeRef};

    #[test]
    fn test_unused_chain_removed() {
        let mut ssa = SsaFunctionBuilder::new("chain").build_with(|f| {
            f.block(0, |b| {
                let x = b.param(SsaType::I64);
                let a = b.int_add(x, x);
                let c = b.int_mul(a, a);
                b.same_as(c, SsaType::I64);
            });
        });

        let log = EventLog::new();
        assert_eq!(DeadCodeEliminationPass::eliminate(&mut ssa, None, &log), 3);
        assert_eq!(ssa.operation_count(), 0);
        assert!(log.has(EventKind::InstructionRemoved));
    }

    #[test]
    fn test_effects_and_uses_kept() {
        let mut ssa = SsaFunctionBuilder::new("kept").build_with(|f| {
            f.block(0, |b| {
                let obj = b.param(SsaType::Object(TypeRef::new(1)));
                let x = b.param(SsaType::I64);
                b.setfield(obj, FieldRef::new(0), x);
                b.int_add_ovf(x, x);
                b.direct_call(MethodRef::new(3), true, vec![x.into()], SsaType::I64);
                let used = b.int_sub(x, x);
                b.jump(1, vec![used.into()]);
            });
            f.block(1, |b| {
                b.param(SsaType::I64);
            });
        });

        let before = ssa.clone();
        assert_eq!(DeadCodeEliminationPass::eliminate(&mut ssa, None, &EventLog::new()), 0);
        assert_eq!(ssa, before);
    }

    #[test]
    fn test_nops_removed_but_raising_op_protected() {
        let mut ssa = SsaFunctionBuilder::new("raising").build_with(|f| {
            f.block(0, |b| {
                let x = b.param(SsaType::I64);
                b.op_void(Opcode::SameAs, vec![ConstValue::Void.into()]);
                b.int_add(x, x);
                b.raising();
                b.exit(1, vec![], ConstValue::Void);
            });
        });

        assert_eq!(DeadCodeEliminationPass::eliminate(&mut ssa, None, &EventLog::new()), 1);
        let ops = ssa.block(0).unwrap().operations();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].opcode(), Opcode::IntAdd);
    }
}
