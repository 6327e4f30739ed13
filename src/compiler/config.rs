//! Configuration for the optimization pipeline.
//!
//! This module provides the configuration controlling how passes are scheduled
//! and what the CSE pass does after its traversal.

use crate::{Error, Result};

/// Configuration for the pass pipeline.
///
/// # Examples
///
/// ```rust
/// use cseflow::compiler::CompilerConfig;
///
/// let config = CompilerConfig::default();
/// assert!(config.cleanup);
/// assert!(config.validate().is_ok());
///
/// let broken = CompilerConfig { max_iterations: 0, ..CompilerConfig::default() };
/// assert!(broken.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Maximum iterations of the whole pipeline (default: 5).
    pub max_iterations: usize,

    /// Number of iterations without change before stopping (default: 2).
    pub stable_iterations: usize,

    /// Maximum iterations of the normalization passes after each change
    /// (default: 10).
    pub max_normalize_iterations: usize,

    /// Run copy propagation, constant folding and dead code elimination after
    /// a CSE traversal that eliminated anything (default: true).
    pub cleanup: bool,

    /// Log one line per optimized function instead of only totals
    /// (default: false).
    pub verbose: bool,

    /// Process functions in parallel (default: true).
    pub parallel: bool,

    /// Validate every function before transforming it (default: true).
    ///
    /// Turning this off is only safe for graphs known to be well formed.
    pub verify_input: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            stable_iterations: 2,
            max_normalize_iterations: 10,
            cleanup: true,
            verbose: false,
            parallel: true,
            verify_input: true,
        }
    }
}

impl CompilerConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration that runs the bare CSE traversal once, sequentially and
    /// without cleanup. Useful for inspecting exactly what the traversal does.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            max_iterations: 1,
            stable_iterations: 1,
            max_normalize_iterations: 1,
            cleanup: false,
            parallel: false,
            ..Self::default()
        }
    }

    /// A configuration with generous iteration limits and per-function logging.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            max_iterations: 20,
            stable_iterations: 3,
            max_normalize_iterations: 20,
            verbose: true,
            ..Self::default()
        }
    }

    /// Checks that the iteration limits are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Error`] if any iteration limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::Error("max_iterations must be at least 1".into()));
        }
        if self.stable_iterations == 0 {
            return Err(Error::Error("stable_iterations must be at least 1".into()));
        }
        if self.max_normalize_iterations == 0 {
            return Err(Error::Error(
                "max_normalize_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
