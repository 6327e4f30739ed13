//! Compiler context shared by all passes of a pipeline run.
//!
//! The [`CompilerContext`] owns the function bodies being optimized together
//! with the state every pass needs: the effect analyzer, the configuration and
//! the event log.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::{DashMap, DashSet};

use crate::{
    analysis::{EffectAnalyzer, MethodRef, SsaFunction, WriteAnalyzer},
    compiler::{config::CompilerConfig, events::EventLog},
};

/// Compiler context for the SSA pipeline.
///
/// All collection fields use thread-safe types (`DashMap`, `DashSet`) so
/// functions can be processed in parallel. The scheduler takes a function out
/// of [`functions`](Self::functions) while a pass runs on it and puts it back
/// afterwards; no lock is held during the pass.
///
/// # Examples
///
/// ```rust
/// use cseflow::{analysis::{MethodRef, SsaFunction}, compiler::CompilerContext};
///
/// let ctx = CompilerContext::default();
/// ctx.set_ssa(MethodRef::new(1), SsaFunction::new("f"));
/// assert!(ctx.has_ssa(MethodRef::new(1)));
/// assert_eq!(ctx.all_methods(), vec![MethodRef::new(1)]);
/// ```
pub struct CompilerContext {
    /// SSA form for each function (mutated by passes).
    pub functions: DashMap<MethodRef, SsaFunction>,

    /// Accumulated events from all passes.
    pub events: EventLog,

    /// Functions changed by at least one pass.
    pub processed_methods: DashSet<MethodRef>,

    /// Pipeline configuration.
    pub config: CompilerConfig,

    /// Write-effect classification shared by all workers.
    analyzer: Arc<dyn EffectAnalyzer>,

    /// When the context was created.
    start_time: Instant,
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new(Arc::new(WriteAnalyzer::new()), CompilerConfig::default())
    }
}

impl CompilerContext {
    /// Creates a new compiler context.
    ///
    /// # Arguments
    ///
    /// * `analyzer` - The effect analyzer used by heap-aware passes.
    /// * `config` - The pipeline configuration.
    #[must_use]
    pub fn new(analyzer: Arc<dyn EffectAnalyzer>, config: CompilerConfig) -> Self {
        Self {
            functions: DashMap::new(),
            events: EventLog::new(),
            processed_methods: DashSet::new(),
            config,
            analyzer,
            start_time: Instant::now(),
        }
    }

    /// Returns the elapsed time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the effect analyzer.
    #[must_use]
    pub fn analyzer(&self) -> &dyn EffectAnalyzer {
        self.analyzer.as_ref()
    }

    /// Executes a closure with a reference to the SSA function.
    pub fn with_ssa<R, F>(&self, method: MethodRef, f: F) -> Option<R>
    where
        F: FnOnce(&SsaFunction) -> R,
    {
        self.functions.get(&method).map(|r| f(&r))
    }

    /// Executes a closure with a mutable reference to the SSA function.
    pub fn with_ssa_mut<R, F>(&self, method: MethodRef, f: F) -> Option<R>
    where
        F: FnOnce(&mut SsaFunction) -> R,
    {
        self.functions.get_mut(&method).map(|mut r| f(&mut r))
    }

    /// Checks if an SSA function exists for a method.
    #[must_use]
    pub fn has_ssa(&self, method: MethodRef) -> bool {
        self.functions.contains_key(&method)
    }

    /// Stores an SSA function for a method.
    pub fn set_ssa(&self, method: MethodRef, ssa: SsaFunction) {
        self.functions.insert(method, ssa);
    }

    /// Removes and returns the SSA function for a method.
    pub fn take_ssa(&self, method: MethodRef) -> Option<SsaFunction> {
        self.functions.remove(&method).map(|(_, v)| v)
    }

    /// Returns all methods with an SSA function, in ascending order.
    #[must_use]
    pub fn all_methods(&self) -> Vec<MethodRef> {
        let mut methods: Vec<_> = self.functions.iter().map(|r| *r.key()).collect();
        methods.sort_unstable();
        methods
    }

    /// Returns the total number of operations over all functions.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.functions.iter().map(|r| r.operation_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_and_reinsert() {
        let ctx = CompilerContext::default();
        let method = MethodRef::new(3);
        ctx.set_ssa(method, SsaFunction::new("f"));

        let ssa = ctx.take_ssa(method).unwrap();
        assert!(!ctx.has_ssa(method));
        ctx.set_ssa(method, ssa);
        assert_eq!(ctx.with_ssa(method, |f| f.name().to_string()), Some("f".into()));
    }

    #[test]
    fn test_all_methods_sorted() {
        let ctx = CompilerContext::default();
        for id in [5, 1, 3] {
            ctx.set_ssa(MethodRef::new(id), SsaFunction::new(format!("f{id}")));
        }
        assert_eq!(
            ctx.all_methods(),
            vec![MethodRef::new(1), MethodRef::new(3), MethodRef::new(5)]
        );
    }
}
