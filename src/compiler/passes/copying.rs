//! Copy propagation pass.
//!
//! This pass eliminates redundant aliases by replacing uses of alias results
//! with their sources. Together with dead code elimination it removes the
//! `same_as` operations left behind by common-subexpression elimination.
//!
//! # Example
//!
//! Before:
//! ```text
//! v1 = same_as v0
//! v2 = int_add v1, 5
//! -> B1(v1)
//! ```
//!
//! After (with v1 replaced by v0):
//! ```text
//! v1 = same_as v0        // Can now be eliminated by DCE
//! v2 = int_add v0, 5
//! -> B1(v0)
//! ```
//!
//! # Algorithm
//!
//! 1. Collect every `same_as` whose source has the same type as its result
//! 2. Resolve alias chains to their ultimate sources (v2 → v1 → v0 becomes v2 → v0)
//! 3. Replace all uses of alias results in operations, exit switches and link
//!    arguments
//! 4. Repeat until no more changes (fixed point)
//!
//! `cast_pointer` is never propagated: its result has a different type than
//! its source.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::{MethodRef, Opcode, Operand, SsaFunction, SsaVarId},
    compiler::{pass::SsaPass, CompilerContext, EventKind, EventLog},
    Result,
};

/// Maximum iterations for the fixed-point algorithm to prevent infinite loops.
const MAX_ITERATIONS: usize = 100;

/// Copy propagation pass.
///
/// Tracks `same_as` aliases and propagates the source to all uses of the
/// alias.
///
/// # Handled Cases
///
/// - Variable aliases: `v1 = same_as v0`
/// - Constant aliases: `v1 = same_as 42`, as left by constant folding
/// - Alias chains: `v2 = same_as v1; v1 = same_as v0` → both map to `v0`
pub struct CopyPropagationPass;

impl Default for CopyPropagationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl CopyPropagationPass {
    /// Creates a new copy propagation pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Collects `result → source` for every type-preserving alias.
    fn collect_copies(ssa: &SsaFunction) -> BTreeMap<SsaVarId, Operand> {
        let mut copies = BTreeMap::new();
        for block in ssa.blocks() {
            for op in block.operations() {
                if op.opcode() != Opcode::SameAs {
                    continue;
                }
                let (Some(dest), Some(src)) = (op.result(), op.arg(0)) else {
                    continue;
                };
                if ssa.var_type(dest).cloned() != ssa.operand_type(src) {
                    continue;
                }
                copies.insert(dest, src.clone());
            }
        }
        copies
    }

    /// Follows `src` through `copies` to its ultimate source.
    ///
    /// A cycle resolves to the operand at which it was detected.
    fn resolve_chain(copies: &BTreeMap<SsaVarId, Operand>, src: &Operand) -> Operand {
        let mut current = src.clone();
        let mut seen = BTreeSet::new();
        while let Operand::Var(var) = current {
            if !seen.insert(var) {
                break;
            }
            match copies.get(&var) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// Runs a single iteration of copy propagation.
    ///
    /// # Returns
    ///
    /// The number of uses that were replaced.
    fn run_iteration(ssa: &mut SsaFunction, method: Option<MethodRef>, changes: &EventLog) -> usize {
        let copies = Self::collect_copies(ssa);
        if copies.is_empty() {
            return 0;
        }

        let resolved: Vec<(SsaVarId, Operand)> = copies
            .iter()
            .map(|(&dest, src)| (dest, Self::resolve_chain(&copies, src)))
            .collect();

        let mut total_replaced = 0;
        for (dest, src) in resolved {
            // Identity mappings come from cycles
            if src.uses(dest) {
                continue;
            }

            let replaced = ssa.replace_uses(dest, &src);
            if replaced > 0 {
                changes
                    .record(EventKind::CopyPropagated)
                    .method(method)
                    .pass("copy-propagation")
                    .message(format!("{dest} → {src} ({replaced} uses)"));
                total_replaced += replaced;
            }
        }

        total_replaced
    }

    /// Propagates aliases in `ssa` to a fixed point.
    ///
    /// # Arguments
    ///
    /// * `ssa` - The function to modify.
    /// * `method` - The function's handle for event attribution, if any.
    /// * `changes` - The log that receives a `CopyPropagated` event per alias.
    ///
    /// # Returns
    ///
    /// The total number of replaced uses.
    pub fn propagate(ssa: &mut SsaFunction, method: Option<MethodRef>, changes: &EventLog) -> usize {
        let mut total = 0;
        for _ in 0..MAX_ITERATIONS {
            let replaced = Self::run_iteration(ssa, method, changes);
            if replaced == 0 {
                break;
            }
            total += replaced;
        }
        total
    }
}

impl SsaPass for CopyPropagationPass {
    fn name(&self) -> &'static str {
        "copy-propagation"
    }

    fn description(&self) -> &'static str {
        "Propagates aliases, replacing uses with original sources"
    }

    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method: MethodRef,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        let changes = EventLog::new();
        let changed = Self::propagate(ssa, Some(method), &changes) > 0;
        if changed {
            ctx.events.merge(&changes);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analysis::{ConstValue, MethodRef, Operand, SsaFunctionBuilder, SsaType, TypeRef},
        compiler::{CompilerContext, CopyPropagationPass, EventKind, EventLog, SsaPass},
    };

    #[test]
    fn test_chain_resolves_to_root() {
        let mut ssa = SsaFunctionBuilder::new("chain").build_with(|f| {
            f.block(0, |b| {
                let v0 = b.param(SsaType::I64);
                let v1 = b.same_as(v0, SsaType::I64);
                let v2 = b.same_as(v1, SsaType::I64);
                let v3 = b.int_add(v2, v1);
                b.jump(1, vec![v2.into(), v3.into()]);
            });
            f.block(1, |b| {
                b.param(SsaType::I64);
                b.param(SsaType::I64);
            });
        });

        let log = EventLog::new();
        assert!(CopyPropagationPass::propagate(&mut ssa, None, &log) > 0);

        let v0 = Operand::Var(ssa.block(0).unwrap().params()[0]);
        let ops = ssa.block(0).unwrap().operations();
        assert_eq!(ops[2].args(), &[v0.clone(), v0.clone()]);
        assert_eq!(ssa.links()[0].args[0], v0);
        assert!(log.has(EventKind::CopyPropagated));
    }

    #[test]
    fn test_constant_alias_propagates_into_switch() {
        let mut ssa = SsaFunctionBuilder::new("switch").build_with(|f| {
            f.block(0, |b| {
                let cond = b.same_as(ConstValue::Bool(true), SsaType::Bool);
                b.switch(cond);
                b.exit(1, vec![], ConstValue::Bool(true));
                b.exit(1, vec![], ConstValue::Bool(false));
            });
        });

        CopyPropagationPass::propagate(&mut ssa, None, &EventLog::new());
        assert_eq!(
            ssa.block(0).unwrap().exit_switch(),
            Some(&Operand::Const(ConstValue::Bool(true)))
        );
    }

    #[test]
    fn test_cast_pointer_is_kept() {
        let mut ssa = SsaFunctionBuilder::new("cast").build_with(|f| {
            f.block(0, |b| {
                let p = b.param(SsaType::Object(TypeRef::new(1)));
                let q = b.cast_pointer(p, SsaType::Object(TypeRef::new(2)));
                b.debug_print(vec![q.into()]);
            });
        });

        let before = ssa.clone();
        assert_eq!(CopyPropagationPass::propagate(&mut ssa, None, &EventLog::new()), 0);
        assert_eq!(ssa, before);
    }

    #[test]
    fn test_pass_reports_no_change() {
        let ctx = CompilerContext::default();
        let mut ssa = SsaFunctionBuilder::new("plain").build_with(|f| {
            f.block(0, |b| {
                let x = b.param(SsaType::I64);
                b.int_add(x, x);
            });
        });

        let pass = CopyPropagationPass::new();
        assert!(!pass.run_on_method(&mut ssa, MethodRef::new(0), &ctx).unwrap());
        assert!(ctx.events.is_empty());
    }
}
