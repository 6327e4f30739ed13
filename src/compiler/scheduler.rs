//! Pass scheduler for orchestrating SSA pass execution.
//!
//! The `PassScheduler` runs a list of main passes over every function, then
//! normalizes the result with a second list of passes until nothing changes.
//! The whole pipeline repeats until it is stable or the iteration limit is hit.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::{
    analysis::MethodRef,
    compiler::{context::CompilerContext, events::EventKind, pass::SsaPass},
    Error, Result,
};

/// Orchestrates SSA pass execution.
///
/// Iteration limits come from the context's [`CompilerConfig`] at the time
/// [`run_pipeline`](Self::run_pipeline) is called.
///
/// # Examples
///
/// ```rust
/// use cseflow::{
///     analysis::{MethodRef, SsaFunctionBuilder, SsaType},
///     compiler::{CompilerContext, CsePass, DeadCodeEliminationPass, PassScheduler},
/// };
///
/// let ctx = CompilerContext::default();
/// ctx.set_ssa(
///     MethodRef::new(1),
///     SsaFunctionBuilder::new("f").build_with(|f| {
///         f.block(0, |b| {
///             let x = b.param(SsaType::I64);
///             b.int_add(x, x);
///         });
///     }),
/// );
///
/// let mut scheduler = PassScheduler::new();
/// scheduler.main.push(Box::new(CsePass::new()));
/// scheduler.normalize.push(Box::new(DeadCodeEliminationPass::new()));
/// let iterations = scheduler.run_pipeline(&ctx)?;
/// assert!(iterations >= 1);
/// assert_eq!(ctx.operation_count(), 0);
/// # Ok::<(), cseflow::Error>(())
/// ```
///
/// [`CompilerConfig`]: crate::compiler::CompilerConfig
#[derive(Default)]
pub struct PassScheduler {
    /// Main passes, run once per pipeline iteration.
    pub main: Vec<Box<dyn SsaPass>>,
    /// Normalization passes (copy propagation, folding, DCE).
    /// Run to fixpoint after the main passes changed something.
    pub normalize: Vec<Box<dyn SsaPass>>,
}

impl PassScheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs normalization passes until no more changes occur.
    ///
    /// # Returns
    ///
    /// `true` if any changes were made, `false` otherwise.
    fn normalize_to_fixpoint(
        ctx: &CompilerContext,
        passes: &mut [Box<dyn SsaPass>],
        max_iterations: usize,
    ) -> Result<bool> {
        let mut any_changed = false;

        for _ in 0..max_iterations {
            let changed = Self::run_passes_once(ctx, passes)?;

            if !changed {
                break;
            }

            any_changed = true;
        }

        Ok(any_changed)
    }

    /// Runs one pass over one function, taking it out of the context while the
    /// pass runs.
    fn run_on(ctx: &CompilerContext, pass: &dyn SsaPass, method: MethodRef) -> Result<bool> {
        if !pass.should_run(method, ctx) {
            return Ok(false);
        }

        // Remove SSA (brief lock, then released)
        let Some((_, mut ssa)) = ctx.functions.remove(&method) else {
            return Ok(false);
        };

        let result = pass.run_on_method(&mut ssa, method, ctx);

        // Reinsert SSA (brief lock, then released)
        ctx.functions.insert(method, ssa);

        if let Ok(true) = result {
            ctx.processed_methods.insert(method);
        }
        result
    }

    /// Runs one pass over `methods`.
    ///
    /// Functions are processed in parallel unless the configuration turns that
    /// off. Every function is handled even if one fails; the first error is
    /// returned afterwards.
    ///
    /// # Returns
    ///
    /// `true` if the pass changed any function.
    pub(crate) fn run_pass(
        ctx: &CompilerContext,
        pass: &dyn SsaPass,
        methods: &[MethodRef],
    ) -> Result<bool> {
        let any_changed = AtomicBool::new(false);

        ctx.events
            .record(EventKind::PassStarted)
            .pass(pass.name())
            .message(format!("{} on {} functions", pass.name(), methods.len()));

        let outcome = |method: &MethodRef| -> Result<()> {
            if Self::run_on(ctx, pass, *method)? {
                any_changed.store(true, Ordering::Relaxed);
            }
            Ok(())
        };

        let failures: Vec<Error> = if ctx.config.parallel {
            methods
                .par_iter()
                .filter_map(|method| outcome(method).err())
                .collect()
        } else {
            methods
                .iter()
                .filter_map(|method| outcome(method).err())
                .collect()
        };

        if let Some(error) = failures.into_iter().next() {
            ctx.events
                .record(EventKind::Error)
                .pass(pass.name())
                .message(error.to_string());
            return Err(error);
        }

        ctx.events
            .record(EventKind::PassCompleted)
            .pass(pass.name())
            .message(pass.name());

        Ok(any_changed.load(Ordering::Relaxed))
    }

    /// Runs all passes once over all methods.
    ///
    /// Returns `true` if any pass made changes, `false` otherwise.
    fn run_passes_once(ctx: &CompilerContext, passes: &mut [Box<dyn SsaPass>]) -> Result<bool> {
        let mut any_changed = false;

        for pass in passes.iter_mut() {
            pass.initialize(ctx)?;
        }

        let methods = ctx.all_methods();
        for pass in passes.iter() {
            if Self::run_pass(ctx, pass.as_ref(), &methods)? {
                any_changed = true;
            }
        }

        for pass in passes.iter_mut() {
            pass.finalize(ctx)?;
        }

        Ok(any_changed)
    }

    /// Runs the pipeline until it is stable.
    ///
    /// Each iteration runs the main passes once and, if they changed anything,
    /// normalizes to fixpoint. The first iteration always normalizes so cleanup
    /// passes run even when the main passes find nothing.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The compiler context.
    ///
    /// # Returns
    ///
    /// The number of iterations completed. Events are accumulated in `ctx.events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or any pass fails.
    pub fn run_pipeline(&mut self, ctx: &CompilerContext) -> Result<usize> {
        ctx.config.validate()?;

        let max_iterations = ctx.config.max_iterations;
        let stable_iterations = ctx.config.stable_iterations;
        let max_normalize = ctx.config.max_normalize_iterations;

        let mut stable_count = 0;
        let mut iterations = 0;

        for iteration in 0..max_iterations {
            iterations = iteration + 1;

            let mut iteration_changed = Self::run_passes_once(ctx, &mut self.main)?;

            if (iteration_changed || iteration == 0) && !self.normalize.is_empty() {
                let normalized = Self::normalize_to_fixpoint(ctx, &mut self.normalize, max_normalize)?;
                iteration_changed |= normalized;
            }

            if iteration_changed {
                stable_count = 0;
            } else {
                stable_count += 1;
                if stable_count >= stable_iterations {
                    break;
                }
            }
        }

        Ok(iterations)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::{
        analysis::{MethodRef, SsaFunction},
        compiler::{CompilerConfig, CompilerContext, EventKind, PassScheduler, SsaPass},
        Error, Result,
    };

    struct TestPass {
        name: &'static str,
        changes_left: AtomicUsize,
    }

    impl TestPass {
        fn new(name: &'static str, changes: usize) -> Self {
            Self {
                name,
                changes_left: AtomicUsize::new(changes),
            }
        }
    }

    impl SsaPass for TestPass {
        fn name(&self) -> &'static str {
            self.name
        }

        fn run_on_method(
            &self,
            _ssa: &mut SsaFunction,
            method: MethodRef,
            ctx: &CompilerContext,
        ) -> Result<bool> {
            let changed = self
                .changes_left
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
                .is_ok();
            if changed {
                ctx.events
                    .record(EventKind::ConstantFolded)
                    .at(method, 0)
                    .message("test");
            }
            Ok(changed)
        }
    }

    struct FailingPass;

    impl SsaPass for FailingPass {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn run_on_method(
            &self,
            _ssa: &mut SsaFunction,
            _method: MethodRef,
            _ctx: &CompilerContext,
        ) -> Result<bool> {
            Err(Error::Error("boom".into()))
        }
    }

    fn context(config: CompilerConfig) -> CompilerContext {
        let ctx = CompilerContext::new(std::sync::Arc::new(crate::analysis::WriteAnalyzer::new()), config);
        ctx.set_ssa(MethodRef::new(1), SsaFunction::new("a"));
        ctx.set_ssa(MethodRef::new(2), SsaFunction::new("b"));
        ctx
    }

    #[test]
    fn test_pipeline_stops_when_stable() {
        let ctx = context(CompilerConfig {
            parallel: false,
            ..CompilerConfig::default()
        });
        let mut scheduler = PassScheduler::new();
        scheduler.main.push(Box::new(TestPass::new("once", 1)));

        // One changing iteration, then two stable ones.
        assert_eq!(scheduler.run_pipeline(&ctx).unwrap(), 3);
        assert_eq!(ctx.events.count_kind(EventKind::ConstantFolded), 1);
        assert_eq!(ctx.processed_methods.len(), 1);
    }

    #[test]
    fn test_pipeline_respects_max_iterations() {
        let ctx = context(CompilerConfig {
            max_iterations: 2,
            ..CompilerConfig::default()
        });
        let mut scheduler = PassScheduler::new();
        scheduler.main.push(Box::new(TestPass::new("busy", 100)));
        assert_eq!(scheduler.run_pipeline(&ctx).unwrap(), 2);
    }

    #[test]
    fn test_failure_propagates_and_keeps_functions() {
        let ctx = context(CompilerConfig::default());
        let mut scheduler = PassScheduler::new();
        scheduler.main.push(Box::new(FailingPass));

        assert!(matches!(scheduler.run_pipeline(&ctx), Err(Error::Error(_))));
        assert_eq!(ctx.all_methods().len(), 2);
        assert!(ctx.events.has(EventKind::Error));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let ctx = context(CompilerConfig {
            max_iterations: 0,
            ..CompilerConfig::default()
        });
        assert!(PassScheduler::new().run_pipeline(&ctx).is_err());
    }
}
