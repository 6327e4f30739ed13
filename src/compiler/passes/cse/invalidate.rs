//! Heap invalidation at loop headers.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    analysis::{loop_blocks, EffectAnalyzer, LinkId, SsaFunction, WriteEffects},
    compiler::passes::cse::cache::Cache,
};

/// The joined write effects of every loop body, by header.
///
/// Effects are collected from the function as it was before the traversal
/// rewrote anything, so an operation eliminated later in the body still
/// counts.
#[derive(Debug, Clone, Default)]
pub(super) struct LoopInvalidator {
    effects: BTreeMap<usize, WriteEffects>,
}

impl LoopInvalidator {
    pub(super) fn new(
        func: &SsaFunction,
        backedges: &BTreeSet<LinkId>,
        analyzer: &dyn EffectAnalyzer,
    ) -> Self {
        let effects = loop_blocks(func, backedges)
            .into_iter()
            .map(|(header, body)| {
                let joined = body
                    .iter()
                    .filter_map(|&block| func.block(block))
                    .flat_map(|block| block.operations())
                    .fold(analyzer.bottom(), |acc, op| {
                        analyzer.join(acc, analyzer.effects_of(func, op))
                    });
                (header, joined)
            })
            .collect();
        Self { effects }
    }

    /// Returns `true` if `block` heads a loop.
    pub(super) fn is_header(&self, block: usize) -> bool {
        self.effects.contains_key(&block)
    }

    /// Drops every heap entry the loop headed by `header` may overwrite.
    /// Returns the number of entries removed.
    pub(super) fn invalidate(
        &self,
        header: usize,
        cache: &mut Cache,
        analyzer: &dyn EffectAnalyzer,
    ) -> usize {
        match self.effects.get(&header) {
            Some(effects) if analyzer.is_unknown(effects) => cache.purge(&WriteEffects::Top),
            Some(effects) => cache.purge(effects),
            None => 0,
        }
    }
}
