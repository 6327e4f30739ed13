//! Global common-subexpression elimination.
//!
//! This pass removes computations and heap accesses whose result is already
//! known at the point they execute, across block boundaries.
//!
//! # Example
//!
//! Before:
//! ```text
//! B0(v0, v1):
//!   v2 = get_field v0, f1
//!   v3 = int_add v2, v1
//!   switch v1 -> B1 | B2
//! B1:  v4 = get_field v0, f1      -> B3
//! B2:  v5 = int_add v2, v1        -> B3
//! B3:  v6 = int_add v2, v1        -> B4
//! B4:
//! ```
//!
//! After:
//! ```text
//! B1:  v4 = same_as v2            // the field is still known
//! B2:  v5 = same_as v3
//! B3:  v6 = same_as v3            // known on both incoming paths
//! ```
//!
//! A final block such as `B4` always starts from an empty cache.
//!
//! # Algorithm
//!
//! 1. Find back-edges and compute phi families; seed one union-find with them
//! 2. Visit blocks from the entry, each one once all of its forward
//!    predecessors are done; predecessors the entry cannot reach are ignored
//! 3. Merge the predecessor caches, synthesizing block parameters where the
//!    predecessors know a value under different names
//! 4. At loop headers, drop heap entries the loop body may overwrite
//! 5. Walk the block: reuse cached results, record new ones, invalidate heap
//!    entries on writes and calls
//! 6. Drop synthesized parameters nothing ended up using
//!
//! Each block is visited exactly once. Instead of iterating loops to a
//! fixpoint, a loop header conservatively forgets everything its body may
//! write.
//!
//! # Cleanup
//!
//! Eliminated operations become `same_as` aliases (or void placeholders for
//! redundant stores). [`CsePass::optimize`] and the pass pipeline follow up with
//! copy propagation, constant folding and dead code elimination.

mod cache;
mod eliminate;
mod invalidate;
mod merge;
mod resolver;

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    sync::atomic::{AtomicUsize, Ordering},
};

pub use cache::{Cache, HeapDescriptor, HeapKey, PureKey};
pub use resolver::Representatives;

use crate::{
    analysis::{
        entry_map, find_backedges, reachable_blocks, EffectAnalyzer, LinkId, MethodRef,
        PhiFamilies, SsaFunction,
    },
    compiler::{
        events::{EventBuilder, EventKind, EventLog},
        pass::SsaPass,
        passes::{ConstantFoldingPass, CopyPropagationPass, DeadCodeEliminationPass},
        scheduler::PassScheduler,
        CompilerContext,
    },
    Error, Result,
};

use eliminate::BlockEliminator;
use invalidate::LoopInvalidator;

const NAME: &str = "common-subexpression-elimination";

/// Attributes events of one invocation to a function.
struct Reporter<'a> {
    log: &'a EventLog,
    method: Option<MethodRef>,
}

impl<'a> Reporter<'a> {
    fn record(&self, kind: EventKind, block: usize) -> EventBuilder<'a> {
        self.log
            .record(kind)
            .method(self.method)
            .location(block)
            .pass(NAME)
    }
}

/// Global common-subexpression elimination pass.
///
/// Usable directly on a single function through [`transform`](Self::transform)
/// or as an [`SsaPass`] in a [`PassScheduler`]. As a pass it keeps a running
/// count of eliminated operations, reset by `initialize` and logged by
/// `finalize`.
///
/// # Examples
///
/// ```rust
/// use cseflow::prelude::*;
///
/// let mut func = SsaFunctionBuilder::new("loads").build_with(|f| {
///     f.block(0, |b| {
///         let obj = b.param(SsaType::Object(TypeRef::new(1)));
///         let first = b.getfield(obj, FieldRef::new(0), SsaType::I64);
///         let second = b.getfield(obj, FieldRef::new(0), SsaType::I64);
///         b.debug_print(vec![first.into(), second.into()]);
///     });
/// });
///
/// assert_eq!(CsePass::optimize(&mut func, &WriteAnalyzer::new())?, 1);
/// assert_eq!(func.block(0).unwrap().operations().len(), 2);
/// # Ok::<(), cseflow::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct CsePass {
    removed: AtomicUsize,
}

impl CsePass {
    /// Creates a new CSE pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of operations eliminated since the last `initialize`.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::Relaxed)
    }

    /// Runs the traversal on `func`, computing back-edges and phi families
    /// itself.
    ///
    /// Eliminated operations are left in place as aliases; see
    /// [`optimize`](Self::optimize) for the variant that cleans them up.
    ///
    /// # Arguments
    ///
    /// * `func` - The function to transform.
    /// * `analyzer` - Classifies the heap writes of operations.
    ///
    /// # Returns
    ///
    /// The number of eliminated operations.
    ///
    /// # Errors
    ///
    /// Returns an error if `func` is malformed or a cached value's type
    /// disagrees with the operation it would replace. `func` is unchanged in
    /// that case.
    pub fn transform(func: &mut SsaFunction, analyzer: &dyn EffectAnalyzer) -> Result<usize> {
        func.validate()?;
        let backedges = find_backedges(func);
        let families = PhiFamilies::build(func);
        let log = EventLog::new();
        let reporter = Reporter { log: &log, method: None };
        Self::run(func, &backedges, families, analyzer, &reporter, false)
    }

    /// Runs the traversal with externally computed back-edges and phi
    /// families.
    ///
    /// # Errors
    ///
    /// Returns an error if `func` is malformed, a back-edge does not exist or a
    /// type check fails. `func` is unchanged in that case.
    pub fn transform_with(
        func: &mut SsaFunction,
        backedges: &BTreeSet<LinkId>,
        families: PhiFamilies,
        analyzer: &dyn EffectAnalyzer,
    ) -> Result<usize> {
        func.validate()?;
        let log = EventLog::new();
        let reporter = Reporter { log: &log, method: None };
        Self::run(func, backedges, families, analyzer, &reporter, false)
    }

    /// Runs the traversal followed by copy propagation, constant folding and
    /// dead code elimination.
    ///
    /// # Errors
    ///
    /// See [`transform`](Self::transform).
    pub fn optimize(func: &mut SsaFunction, analyzer: &dyn EffectAnalyzer) -> Result<usize> {
        func.validate()?;
        let backedges = find_backedges(func);
        let families = PhiFamilies::build(func);
        let log = EventLog::new();
        let reporter = Reporter { log: &log, method: None };
        Self::run(func, &backedges, families, analyzer, &reporter, true)
    }

    /// Transforms a copy of `func` and commits it if anything was eliminated.
    fn run(
        func: &mut SsaFunction,
        backedges: &BTreeSet<LinkId>,
        families: PhiFamilies,
        analyzer: &dyn EffectAnalyzer,
        reporter: &Reporter<'_>,
        cleanup: bool,
    ) -> Result<usize> {
        if let Some(missing) = backedges.iter().find(|link| func.link(**link).is_none()) {
            return Err(Error::InvalidLink(*missing));
        }

        let mut work = func.clone();
        let removed = Self::traverse(&mut work, backedges, families, analyzer, reporter)?;
        if removed > 0 {
            if cleanup {
                CopyPropagationPass::propagate(&mut work, reporter.method, reporter.log);
                ConstantFoldingPass::fold(&mut work, reporter.method, reporter.log);
                DeadCodeEliminationPass::eliminate(&mut work, reporter.method, reporter.log);
            }
            *func = work;
        }
        Ok(removed)
    }

    fn traverse(
        func: &mut SsaFunction,
        backedges: &BTreeSet<LinkId>,
        families: PhiFamilies,
        analyzer: &dyn EffectAnalyzer,
        reporter: &Reporter<'_>,
    ) -> Result<usize> {
        let live = reachable_blocks(func, func.entry(), &BTreeSet::new());
        let (entries, dead) = Self::split_entries(func, &live);
        let invalidator = LoopInvalidator::new(func, backedges, analyzer);
        let mut reps = Representatives::new(families);
        let mut synthesized = Vec::new();

        let block_count = func.block_count();
        let mut pending: BTreeMap<usize, Vec<(LinkId, Cache)>> = BTreeMap::new();
        let mut done = vec![false; block_count];
        let mut queued = vec![false; block_count];
        let mut todo = VecDeque::from([func.entry()]);
        if let Some(slot) = queued.get_mut(func.entry()) {
            *slot = true;
        }

        let mut removed = 0;
        while let Some(block) = todo.pop_front() {
            let is_final = func
                .block(block)
                .ok_or(Error::InvalidBlock(block))?
                .is_final();

            let mut cache = if is_final {
                Cache::new()
            } else {
                let incoming = pending.remove(&block).unwrap_or_default();
                let entering: Vec<LinkId> = entries
                    .get(&block)
                    .into_iter()
                    .flatten()
                    .copied()
                    .filter(|link| backedges.contains(link))
                    .collect();
                let mut cache = merge::merge(
                    func,
                    &mut reps,
                    block,
                    &incoming,
                    &entering,
                    dead.get(&block).map(Vec::as_slice).unwrap_or_default(),
                    &mut synthesized,
                )?;
                let dropped = invalidator.invalidate(block, &mut cache, analyzer);
                if dropped > 0 {
                    reporter
                        .record(EventKind::HeapInvalidated, block)
                        .message(format!("loop body may overwrite {dropped} heap entries"));
                }
                cache
            };

            removed += BlockEliminator {
                func: &mut *func,
                reps: &mut reps,
                analyzer,
                reporter,
            }
            .run(block, &mut cache)?;
            if let Some(slot) = done.get_mut(block) {
                *slot = true;
            }

            let exits: Vec<(LinkId, usize)> =
                func.exits_of(block).map(|link| (link.id, link.target)).collect();
            for (link, target) in exits {
                if done.get(target).copied().unwrap_or(true) {
                    continue;
                }
                let ready = entries.get(&target).into_iter().flatten().all(|incoming| {
                    backedges.contains(incoming)
                        || func
                            .link(*incoming)
                            .is_some_and(|l| done.get(l.source).copied().unwrap_or(false))
                });
                if ready && !queued[target] {
                    queued[target] = true;
                    todo.push_back(target);
                }
                pending.entry(target).or_default().push((link, cache.clone()));
            }
        }

        for (block, var) in merge::prune_unused(func, &synthesized) {
            reporter
                .record(EventKind::PhiSynthesized, block)
                .message(format!("{var} carries a value known on every incoming path"));
        }

        Ok(removed)
    }

    /// Splits the links entering each block into those from blocks `live`
    /// contains and those from blocks the entry cannot reach.
    ///
    /// Links of the second kind never deliver a cache, so they must not hold
    /// back their target.
    fn split_entries(
        func: &SsaFunction,
        live: &BTreeSet<usize>,
    ) -> (BTreeMap<usize, Vec<LinkId>>, BTreeMap<usize, Vec<LinkId>>) {
        let mut dead: BTreeMap<usize, Vec<LinkId>> = BTreeMap::new();
        let mut entries = entry_map(func);
        for (&block, links) in &mut entries {
            links.retain(|id| {
                let reachable = func.link(*id).is_some_and(|l| live.contains(&l.source));
                if !reachable {
                    dead.entry(block).or_default().push(*id);
                }
                reachable
            });
        }
        (entries, dead)
    }
}

impl SsaPass for CsePass {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Reuses computations and heap reads already known along every path"
    }

    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method: MethodRef,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        if ctx.config.verify_input {
            ssa.validate()?;
        }

        let changes = EventLog::new();
        let reporter = Reporter {
            log: &changes,
            method: Some(method),
        };
        let backedges = find_backedges(ssa);
        let families = PhiFamilies::build(ssa);
        let removed = Self::run(
            ssa,
            &backedges,
            families,
            ctx.analyzer(),
            &reporter,
            ctx.config.cleanup,
        )?;

        if removed == 0 {
            return Ok(false);
        }
        self.removed.fetch_add(removed, Ordering::Relaxed);
        if ctx.config.verbose {
            changes
                .record(EventKind::Info)
                .method(method)
                .pass(NAME)
                .message(format!("cse removed {removed} ops in {}", ssa.name()));
        }
        ctx.events.merge(&changes);
        Ok(true)
    }

    fn initialize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        *self.removed.get_mut() = 0;
        Ok(())
    }

    fn finalize(&mut self, ctx: &CompilerContext) -> Result<()> {
        ctx.events
            .record(EventKind::Info)
            .pass(NAME)
            .message(format!("cse removed {} ops", self.removed()));
        Ok(())
    }
}

/// Runs CSE over every function of `ctx`.
///
/// # Returns
///
/// The total number of eliminated operations. A summary line
/// `cse removed N ops` is added to `ctx.events`.
///
/// # Errors
///
/// Returns the first error any function produced. Functions that failed are
/// left unchanged; the others keep their optimized bodies.
///
/// # Examples
///
/// ```rust
/// use cseflow::{
///     analysis::{MethodRef, SsaFunctionBuilder, SsaType},
///     compiler::{common_subexpression_elimination, CompilerContext},
/// };
///
/// let ctx = CompilerContext::default();
/// for id in 0..3 {
///     ctx.set_ssa(
///         MethodRef::new(id),
///         SsaFunctionBuilder::new(format!("f{id}")).build_with(|f| {
///             f.block(0, |b| {
///                 let x = b.param(SsaType::I64);
///                 let a = b.int_mul(x, x);
///                 let c = b.int_mul(x, x);
///                 b.debug_print(vec![a.into(), c.into()]);
///             });
///         }),
///     );
/// }
///
/// assert_eq!(common_subexpression_elimination(&ctx)?, 3);
/// assert!(ctx.events.iter().any(|e| e.message == "cse removed 3 ops"));
/// # Ok::<(), cseflow::Error>(())
/// ```
pub fn common_subexpression_elimination(ctx: &CompilerContext) -> Result<usize> {
    let mut pass = CsePass::new();
    pass.initialize(ctx)?;
    PassScheduler::run_pass(ctx, &pass, &ctx.all_methods())?;
    let removed = pass.removed();
    pass.finalize(ctx)?;
    Ok(removed)
}
