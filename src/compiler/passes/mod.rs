//! Built-in SSA optimization passes.
//!
//! Each pass operates on one function at a time and records its changes in an
//! [`EventLog`](crate::compiler::EventLog).
//!
//! # Main Pass
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`CsePass`] | Reuses computations and heap reads already known along every path |
//!
//! # Normalization
//!
//! Cleans up after the main pass. The
//! [`PassScheduler`](crate::compiler::PassScheduler) runs these to a fixpoint
//! whenever the main pass changed something.
//!
//! | Pass | Description |
//! |------|-------------|
//! | [`CopyPropagationPass`] | Replaces uses of aliases with their sources |
//! | [`ConstantFoldingPass`] | Evaluates operations whose arguments are all constants |
//! | [`DeadCodeEliminationPass`] | Removes unused results and placeholder operations |
//!
//! Each normalization pass also exposes an associated function that runs it on
//! a bare [`SsaFunction`](crate::analysis::SsaFunction), which
//! [`CsePass::optimize`] uses for its cleanup.

mod constants;
mod copying;
mod cse;
mod deadcode;

pub use constants::ConstantFoldingPass;
pub use copying::CopyPropagationPass;
pub use cse::{
    common_subexpression_elimination, Cache, CsePass, HeapDescriptor, HeapKey, PureKey,
    Representatives,
};
pub use deadcode::DeadCodeEliminationPass;
