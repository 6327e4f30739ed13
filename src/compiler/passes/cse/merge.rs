//! Cache merging at join blocks.
//!
//! The merged cache keeps an entry only when every forward predecessor knows
//! it. Two strategies run over the entries of the first predecessor:
//!
//! - **straight**: the same key is present in every predecessor cache;
//! - **parametric**: the key's first argument (or heap base) is the value a
//!   predecessor passes for one of the block's parameters, and every other
//!   predecessor has the same key built on its own argument for that
//!   parameter. The merged entry is keyed on the parameter.
//!
//! When the predecessors know the value under different names, a new block
//! parameter is synthesized and every incoming link, back-edges included,
//! passes its own name for it. Links from blocks the entry cannot reach pass
//! the new parameter itself, which keeps their arity in line.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::{entry_map, LinkId, Operand, SsaFunction, SsaVarId},
    compiler::passes::cse::{cache::Cache, resolver::Representatives},
    Error, Result,
};

/// A parameter created by a merge: the block and the new variable.
pub(super) type SynthesizedParam = (usize, SsaVarId);

/// Merges the caches of `incoming` into the cache valid at the start of
/// `block`.
///
/// `incoming` holds one entry per forward link into `block`, in arrival order;
/// `backedges` lists the back-edges entering `block` and `dead` the links from
/// unreachable blocks. Synthesized parameters are appended to `synthesized`.
pub(super) fn merge(
    func: &mut SsaFunction,
    reps: &mut Representatives,
    block: usize,
    incoming: &[(LinkId, Cache)],
    backedges: &[LinkId],
    dead: &[LinkId],
    synthesized: &mut Vec<SynthesizedParam>,
) -> Result<Cache> {
    match incoming {
        [] => Ok(Cache::new()),
        [(_, cache)] => Ok(cache.clone()),
        _ => Merger {
            func,
            reps,
            block,
            incoming,
            backedges,
            dead,
            synthesized,
        }
        .run(),
    }
}

struct Merger<'a> {
    func: &'a mut SsaFunction,
    reps: &'a mut Representatives,
    block: usize,
    incoming: &'a [(LinkId, Cache)],
    backedges: &'a [LinkId],
    dead: &'a [LinkId],
    synthesized: &'a mut Vec<SynthesizedParam>,
}

impl Merger<'_> {
    fn run(mut self) -> Result<Cache> {
        let incoming = self.incoming;
        let Some(((first_link, first), others)) = incoming.split_first() else {
            return Ok(Cache::new());
        };
        let mut merged = Cache::new();

        let declared = self.param_count()?;
        for index in 0..declared {
            self.merge_parametric(index, *first_link, first, others, &mut merged)?;
        }
        self.merge_straight(first, others, &mut merged)?;

        // Parameters synthesized above get a parametric pass of their own, so
        // entries built on a merged value survive the join as well.
        let mut index = declared;
        while index < self.param_count()? {
            self.merge_parametric(index, *first_link, first, others, &mut merged)?;
            index += 1;
        }

        Ok(merged)
    }

    fn param_count(&self) -> Result<usize> {
        Ok(self
            .func
            .block(self.block)
            .ok_or(Error::InvalidBlock(self.block))?
            .params()
            .len())
    }

    fn merge_parametric(
        &mut self,
        index: usize,
        first_link: LinkId,
        first: &Cache,
        others: &[(LinkId, Cache)],
        merged: &mut Cache,
    ) -> Result<()> {
        let param = self
            .func
            .block(self.block)
            .and_then(|b| b.params().get(index).copied())
            .ok_or(Error::InvalidBlock(self.block))?;
        let param = Operand::Var(param);
        if !self.invariant_along_backedges(index, &param)? {
            return Ok(());
        }

        let first_arg = self.link_arg(first_link, index)?;
        let first_rep = self.reps.of(&first_arg);
        let param_rep = self.reps.of(&param);
        let mut other_reps = Vec::with_capacity(others.len());
        for (link, _) in others {
            let arg = self.link_arg(*link, index)?;
            other_reps.push(self.reps.of(&arg));
        }

        for (key, value) in first.pure_entries() {
            let Some(arg) = key.first() else {
                continue;
            };
            if self.reps.of(arg) != first_rep {
                continue;
            }
            let mut results = vec![value.clone()];
            let everywhere = others.iter().zip(&other_reps).all(|((_, cache), rep)| {
                cache
                    .pure(&key.with_first(rep.clone()))
                    .map(|found| results.push(found.clone()))
                    .is_some()
            });
            if everywhere {
                let value = self.merge_results(results)?;
                merged.insert_pure(key.with_first(param_rep.clone()), value);
            }
        }

        for (key, value) in first.heap_entries() {
            if self.reps.of(&key.base) != first_rep {
                continue;
            }
            let mut results = vec![value.clone()];
            let everywhere = others.iter().zip(&other_reps).all(|((_, cache), rep)| {
                cache
                    .heap(&key.with_base(rep.clone()))
                    .map(|found| results.push(found.clone()))
                    .is_some()
            });
            if everywhere {
                let value = self.merge_results(results)?;
                merged.insert_heap(key.with_base(param_rep.clone()), value);
            }
        }
        Ok(())
    }

    fn merge_straight(
        &mut self,
        first: &Cache,
        others: &[(LinkId, Cache)],
        merged: &mut Cache,
    ) -> Result<()> {
        for (key, value) in first.pure_entries() {
            let mut results = vec![value.clone()];
            let everywhere = others.iter().all(|(_, cache)| {
                cache
                    .pure(key)
                    .map(|found| results.push(found.clone()))
                    .is_some()
            });
            if everywhere {
                let value = self.merge_results(results)?;
                merged.insert_pure(key.clone(), value);
            }
        }

        for (key, value) in first.heap_entries() {
            let mut results = vec![value.clone()];
            let everywhere = others.iter().all(|(_, cache)| {
                cache
                    .heap(key)
                    .map(|found| results.push(found.clone()))
                    .is_some()
            });
            if everywhere {
                let value = self.merge_results(results)?;
                merged.insert_heap(key.clone(), value);
            }
        }
        Ok(())
    }

    /// A parameter may only carry a parametric entry across a loop header if
    /// every back-edge passes it through unchanged. Otherwise the value threaded
    /// along the back-edge would belong to the previous iteration.
    fn invariant_along_backedges(&mut self, index: usize, param: &Operand) -> Result<bool> {
        for &backedge in self.backedges {
            let arg = self.link_arg(backedge, index)?;
            if !self.reps.same(&arg, param) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn link_arg(&self, link: LinkId, index: usize) -> Result<Operand> {
        let found = self.func.link(link).ok_or(Error::InvalidLink(link))?;
        found.args.get(index).cloned().ok_or_else(|| {
            malformed_error!("{} has no argument for parameter {}", link, index)
        })
    }

    /// Returns the value standing for `results` (one per incoming link) in the
    /// join block, adding a parameter when they differ.
    fn merge_results(&mut self, results: Vec<Operand>) -> Result<Operand> {
        let Some(first) = results.first().cloned() else {
            return Err(malformed_error!("merge without incoming values"));
        };
        if results.iter().all(|result| *result == first) {
            return Ok(first);
        }

        let var_type = self
            .func
            .operand_type(&first)
            .ok_or_else(|| malformed_error!("{} has no type", first))?;
        for result in &results[1..] {
            let found = self
                .func
                .operand_type(result)
                .ok_or_else(|| malformed_error!("{} has no type", result))?;
            if found != var_type {
                return Err(malformed_error!(
                    "values merged into block {} disagree: {} is {}, {} is {}",
                    self.block,
                    first,
                    var_type,
                    result,
                    found
                ));
            }
        }

        let name = results
            .iter()
            .filter_map(Operand::as_var)
            .find_map(|var| self.func.variable(var).and_then(|v| v.name()))
            .map(str::to_string);
        let var = match name {
            Some(name) => self.func.new_named_variable(var_type, name),
            None => self.func.new_variable(var_type),
        };

        for ((link, _), value) in self.incoming.iter().zip(results) {
            self.func
                .link_mut(*link)
                .ok_or(Error::InvalidLink(*link))?
                .args
                .push(value);
        }
        for &link in self.backedges.iter().chain(self.dead) {
            self.func
                .link_mut(link)
                .ok_or(Error::InvalidLink(link))?
                .args
                .push(Operand::Var(var));
        }
        self.func
            .block_mut(self.block)
            .ok_or(Error::InvalidBlock(self.block))?
            .add_param(var);

        self.synthesized.push((self.block, var));
        Ok(Operand::Var(var))
    }
}

/// Removes synthesized parameters that ended up unused, together with the
/// arguments every incoming link passes for them.
///
/// A synthesized parameter is live when an operation or exit switch reads it,
/// when it is passed to an ordinary parameter, or when it is passed to a live
/// synthesized parameter. Returns the surviving parameters.
pub(super) fn prune_unused(
    func: &mut SsaFunction,
    synthesized: &[SynthesizedParam],
) -> Vec<SynthesizedParam> {
    if synthesized.is_empty() {
        return Vec::new();
    }

    let candidates: BTreeSet<SsaVarId> = synthesized.iter().map(|&(_, var)| var).collect();
    let mut live = BTreeSet::new();
    let mut worklist = Vec::new();

    let mark = |var: SsaVarId, live: &mut BTreeSet<SsaVarId>, worklist: &mut Vec<SsaVarId>| {
        if candidates.contains(&var) && live.insert(var) {
            worklist.push(var);
        }
    };

    for block in func.blocks() {
        for op in block.operations() {
            for var in op.used_vars() {
                mark(var, &mut live, &mut worklist);
            }
        }
        if let Some(Operand::Var(var)) = block.exit_switch() {
            mark(*var, &mut live, &mut worklist);
        }
    }
    for link in func.links() {
        let Some(target) = func.block(link.target) else {
            continue;
        };
        for (param, arg) in target.params().iter().zip(&link.args) {
            if candidates.contains(param) {
                continue;
            }
            if let Operand::Var(var) = arg {
                mark(*var, &mut live, &mut worklist);
            }
        }
    }

    let positions: BTreeMap<SsaVarId, (usize, usize)> = synthesized
        .iter()
        .filter_map(|&(block, var)| {
            let index = func.block(block)?.params().iter().position(|p| *p == var)?;
            Some((var, (block, index)))
        })
        .collect();
    let entries = entry_map(func);

    while let Some(var) = worklist.pop() {
        let Some(&(block, index)) = positions.get(&var) else {
            continue;
        };
        for link in entries.get(&block).into_iter().flatten() {
            if let Some(Operand::Var(arg)) = func.link(*link).and_then(|l| l.args.get(index)) {
                mark(*arg, &mut live, &mut worklist);
            }
        }
    }

    let blocks: BTreeSet<usize> = synthesized.iter().map(|&(block, _)| block).collect();
    for block in blocks {
        let Some(params) = func.block(block).map(|b| b.params().to_vec()) else {
            continue;
        };
        let keep: Vec<bool> = params
            .iter()
            .map(|p| !candidates.contains(p) || live.contains(p))
            .collect();
        if keep.iter().all(|k| *k) {
            continue;
        }

        if let Some(target) = func.block_mut(block) {
            let mut index = 0;
            target.params_mut().retain(|_| {
                let kept = keep.get(index).copied().unwrap_or(true);
                index += 1;
                kept
            });
        }
        for link in entries.get(&block).into_iter().flatten() {
            if let Some(link) = func.link_mut(*link) {
                let mut index = 0;
                link.args.retain(|_| {
                    let kept = keep.get(index).copied().unwrap_or(true);
                    index += 1;
                    kept
                });
            }
        }
    }

    synthesized
        .iter()
        .copied()
        .filter(|(_, var)| live.contains(var))
        .collect()
}
