//! The interface shared by all passes.

use crate::{
    analysis::{MethodRef, SsaFunction},
    compiler::CompilerContext,
    Result,
};

/// A transformation over one function body at a time.
///
/// Passes are shared across worker threads by the [`PassScheduler`], so
/// `run_on_method` takes `&self`; per-run state lives on the stack of that
/// call. Events go to `ctx.events`.
///
/// [`PassScheduler`]: crate::compiler::PassScheduler
pub trait SsaPass: Send + Sync {
    /// Returns the pass name used in events and logs.
    fn name(&self) -> &'static str;

    /// Returns a one-line description of the pass.
    fn description(&self) -> &'static str {
        ""
    }

    /// Returns `false` to skip `method` in the current run.
    fn should_run(&self, _method: MethodRef, _ctx: &CompilerContext) -> bool {
        true
    }

    /// Transforms one function.
    ///
    /// # Returns
    ///
    /// `true` if the function was changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the function is malformed or the pass cannot
    /// complete. A pass that fails must leave `ssa` unchanged.
    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method: MethodRef,
        ctx: &CompilerContext,
    ) -> Result<bool>;

    /// Called once before a scheduler run.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot be set up.
    fn initialize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Called once after a scheduler run.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot be torn down.
    fn finalize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }
}
