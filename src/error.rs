use thiserror::Error;

use crate::analysis::{LinkId, SsaType, SsaVarId};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// None of these errors are recoverable from the pass's point of view: each one signals either
/// a malformed input graph or a collaborator (effect analyzer, phi family builder) breaking its
/// contract. A pass that returns an error has not modified the function it was given.
///
/// # Error Categories
///
/// ## Graph Structure Errors
/// - [`Error::Malformed`] - Structurally invalid graph (dangling references, double definitions)
/// - [`Error::InvalidBlock`] - A block index that does not exist
/// - [`Error::InvalidLink`] - A link identifier that does not exist
/// - [`Error::ArityMismatch`] - A link passes the wrong number of arguments
///
/// ## Contract Violations
/// - [`Error::TypeMismatch`] - A cached value disagrees with the type of the result it replaces
/// - [`Error::PassFailed`] - A pass aborted for a pass-specific reason
///
/// # Examples
///
/// ```rust
/// use cseflow::{prelude::*, Error};
///
/// let mut func = SsaFunctionBuilder::new("f").build_with(|f| {
///     f.block(0, |b| b.jump(7, vec![]));
/// });
///
/// match CsePass::transform(&mut func, &WriteAnalyzer::new()) {
///     Err(Error::InvalidBlock(7)) => {}
///     Err(e) => panic!("other error: {e}"),
///     Ok(_) => panic!("malformed graph accepted"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The graph is damaged and could not be processed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A block index referenced by a link or by the caller does not exist.
    #[error("Block {0} does not exist")]
    InvalidBlock(usize),

    /// A link identifier referenced by a block does not exist.
    #[error("Link {0} does not exist")]
    InvalidLink(LinkId),

    /// A link passes a different number of arguments than its target declares parameters.
    #[error("Link {link} passes {found} arguments, target block {target} expects {expected}")]
    ArityMismatch {
        /// The offending link
        link: LinkId,
        /// The block the link enters
        target: usize,
        /// Number of parameters declared by the target
        expected: usize,
        /// Number of arguments carried by the link
        found: usize,
    },

    /// A cached value would replace a result of a different type.
    ///
    /// Raised when an operation is about to be rewritten into an alias of a cached value whose
    /// type disagrees with the operation's own result type. This indicates that the effect
    /// analyzer under-approximated a write or that the input graph is ill-typed.
    #[error("Type mismatch for {var}: expected {expected}, cached value has {found}")]
    TypeMismatch {
        /// The result that was about to be replaced
        var: SsaVarId,
        /// Its declared type
        expected: SsaType,
        /// The type of the cached replacement
        found: SsaType,
    },

    /// A pass aborted.
    #[error("Pass {pass} failed: {message}")]
    PassFailed {
        /// Name of the pass
        pass: &'static str,
        /// Reason for the failure
        message: String,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
