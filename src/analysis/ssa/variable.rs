//! SSA variable representation and identifiers.
//!
//! Each SSA variable is defined exactly once, either by an operation or as a
//! block parameter. Variables are identified by a simple index ([`SsaVarId`])
//! into the variable table of their [`SsaFunction`](crate::analysis::SsaFunction);
//! all metadata lives in [`SsaVariable`].
//!
//! # Thread Safety
//!
//! All types in this module are `Send` and `Sync`.

use std::fmt;

use crate::analysis::ssa::SsaType;

/// Unique identifier for an SSA variable.
///
/// This is a lightweight handle into the variable table, providing O(1) access
/// to variable metadata. The identifier is unique within a single function but
/// not across functions.
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::SsaVarId;
///
/// let id = SsaVarId::new(42);
/// assert_eq!(id.index(), 42);
/// assert_eq!(id.to_string(), "v42");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SsaVarId(usize);

impl SsaVarId {
    /// Creates a new SSA variable identifier.
    ///
    /// # Arguments
    ///
    /// * `index` - The index into the variable table
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for SsaVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for SsaVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Metadata of an SSA variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaVariable {
    /// Identifier of this variable.
    id: SsaVarId,

    /// Static type of the value.
    var_type: SsaType,

    /// Optional name hint carried over from the front-end or from the value a
    /// synthesized parameter stands in for.
    name: Option<String>,
}

impl SsaVariable {
    /// Creates a new variable.
    #[must_use]
    pub fn new(id: SsaVarId, var_type: SsaType) -> Self {
        Self {
            id,
            var_type,
            name: None,
        }
    }

    /// Creates a new variable with a name hint.
    #[must_use]
    pub fn named(id: SsaVarId, var_type: SsaType, name: impl Into<String>) -> Self {
        Self {
            id,
            var_type,
            name: Some(name.into()),
        }
    }

    /// Returns the identifier of this variable.
    #[must_use]
    pub const fn id(&self) -> SsaVarId {
        self.id
    }

    /// Returns the static type of this variable.
    #[must_use]
    pub const fn var_type(&self) -> &SsaType {
        &self.var_type
    }

    /// Returns the name hint, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Replaces the name hint.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }
}

impl fmt::Display for SsaVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {} ({name})", self.id, self.var_type),
            None => write!(f, "{}: {}", self.id, self.var_type),
        }
    }
}
