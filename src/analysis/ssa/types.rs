//! SSA type system.
//!
//! This module provides the static type attached to every SSA variable and
//! constant. Types take part in cache keys: two computations only collide when
//! they produce the same result type, and heap locations are distinguished by
//! the type of the aggregate they live in.
//!
//! # Type Categories
//!
//! - **Primitives**: `Void`, `Bool`, `Char`, `I32`, `I64`, `F64`
//! - **References**: `Object` (a GC struct identified by [`TypeRef`]) and
//!   `Array` (a GC array of some element type)
//! - **Special**: `Unknown` for values the front-end could not type

use std::fmt;

/// Reference to an aggregate type declared by the front-end.
///
/// This is a lightweight handle; the pass never needs the type's layout, only its
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeRef(pub u32);

impl TypeRef {
    /// Creates a new type reference.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying identifier.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Reference to a function known to the front-end.
///
/// Used as the callee of direct calls and as the key of callee effect summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodRef(pub u32);

impl MethodRef {
    /// Creates a new method reference.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying identifier.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn{}", self.0)
    }
}

/// Reference to a field of an aggregate type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldRef(pub u32);

impl FieldRef {
    /// Creates a new field reference.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying identifier.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// Static type of an SSA value.
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::{SsaType, TypeRef};
///
/// let node = SsaType::Object(TypeRef::new(1));
/// let items = SsaType::Array(Box::new(SsaType::I64));
///
/// assert!(node.is_reference());
/// assert!(items.is_reference());
/// assert_eq!(items.element_type(), Some(&SsaType::I64));
/// assert!(!SsaType::I32.is_reference());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SsaType {
    /// No value (the result type of pure side-effect operations).
    Void,
    /// Boolean.
    Bool,
    /// Character.
    Char,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer (the machine word).
    I64,
    /// 64-bit floating point.
    F64,
    /// Pointer to a GC-managed struct.
    Object(TypeRef),
    /// Pointer to a GC-managed array.
    Array(Box<SsaType>),
    /// Type not known to the front-end.
    Unknown,
}

impl SsaType {
    /// Returns `true` for pointer types that can be the base of a heap access.
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Array(_))
    }

    /// Returns `true` for integer-like primitives.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::Char)
    }

    /// Returns `true` if the type is [`SsaType::Unknown`].
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns the element type of an array type.
    #[must_use]
    pub fn element_type(&self) -> Option<&SsaType> {
        match self {
            Self::Array(elem) => Some(elem),
            _ => None,
        }
    }
}

impl fmt::Display for SsaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Bool => write!(f, "bool"),
            Self::Char => write!(f, "char"),
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::F64 => write!(f, "f64"),
            Self::Object(ty) => write!(f, "*{ty}"),
            Self::Array(elem) => write!(f, "[{elem}]"),
            Self::Unknown => write!(f, "?"),
        }
    }
}
