//! Constants and operands.
//!
//! Every argument of an operation or link is an [`Operand`]: either an SSA
//! variable or a compile-time [`ConstValue`]. Constants are hashable and totally
//! ordered so they can appear inside cache keys alongside variables; floating
//! point constants are stored as their bit pattern for that reason.

use std::fmt;

use crate::analysis::ssa::{FieldRef, MethodRef, SsaType, SsaVarId};

/// Constant values that can appear in SSA form.
///
/// Besides plain scalars this includes the descriptors some operations take as
/// immediate arguments: field handles for heap accesses and function handles
/// for direct calls.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstValue {
    /// The unit value of type `void`.
    Void,

    /// Boolean constant.
    Bool(bool),

    /// Character constant.
    Char(char),

    /// 32-bit signed integer.
    I32(i32),

    /// 64-bit signed integer.
    I64(i64),

    /// 64-bit float, stored as its IEEE-754 bit pattern.
    F64(u64),

    /// Null pointer of the given reference type.
    Null(SsaType),

    /// A prebuilt, statically allocated object.
    Global {
        /// Identity of the object
        id: u32,
        /// Its pointer type
        ty: SsaType,
    },

    /// Field handle, the immediate argument of field accesses.
    Field(FieldRef),

    /// Function handle, the immediate callee of direct calls.
    Function {
        /// The callee
        method: MethodRef,
        /// Whether the callee is declared free of external effects, so that
        /// calls with equal arguments may share one result.
        elidable: bool,
    },
}

impl ConstValue {
    /// Creates a floating point constant.
    #[must_use]
    pub fn f64(value: f64) -> Self {
        Self::F64(value.to_bits())
    }

    /// Creates a boolean constant from a bool value.
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        Self::Bool(value)
    }

    /// Returns the static type of this constant.
    ///
    /// Descriptor constants (fields and functions) have type `void`.
    #[must_use]
    pub fn const_type(&self) -> SsaType {
        match self {
            Self::Void | Self::Field(_) | Self::Function { .. } => SsaType::Void,
            Self::Bool(_) => SsaType::Bool,
            Self::Char(_) => SsaType::Char,
            Self::I32(_) => SsaType::I32,
            Self::I64(_) => SsaType::I64,
            Self::F64(_) => SsaType::F64,
            Self::Null(ty) | Self::Global { ty, .. } => ty.clone(),
        }
    }

    /// Returns the constant as an i64 if it is integer-like.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            Self::I32(v) => Some(*v as i64),
            Self::Char(c) => Some(*c as i64),
            Self::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Returns the constant as a bool if it is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the constant as an f64 if it is a float.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// Returns the field handle of a field descriptor constant.
    #[must_use]
    pub const fn as_field(&self) -> Option<FieldRef> {
        match self {
            Self::Field(field) => Some(*field),
            _ => None,
        }
    }

    /// Returns the callee and its elidable flag for a function constant.
    #[must_use]
    pub const fn as_function(&self) -> Option<(MethodRef, bool)> {
        match self {
            Self::Function { method, elidable } => Some((*method, *elidable)),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Char(c) => write!(f, "{c:?}"),
            Self::I32(v) => write!(f, "{v}i32"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F64(bits) => write!(f, "{}f64", f64::from_bits(*bits)),
            Self::Null(ty) => write!(f, "null<{ty}>"),
            Self::Global { id, ty } => write!(f, "@g{id}<{ty}>"),
            Self::Field(field) => write!(f, "{field}"),
            Self::Function { method, elidable } => {
                if *elidable {
                    write!(f, "{method}!elidable")
                } else {
                    write!(f, "{method}")
                }
            }
        }
    }
}

/// An argument of an operation or link: a variable or a constant.
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::{ConstValue, Operand, SsaVarId};
///
/// let var: Operand = SsaVarId::new(3).into();
/// let lit: Operand = ConstValue::I64(7).into();
///
/// assert_eq!(var.as_var(), Some(SsaVarId::new(3)));
/// assert_eq!(lit.as_const(), Some(&ConstValue::I64(7)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operand {
    /// An SSA variable.
    Var(SsaVarId),
    /// A compile-time constant.
    Const(ConstValue),
}

impl Operand {
    /// Returns the variable if this operand is one.
    #[must_use]
    pub const fn as_var(&self) -> Option<SsaVarId> {
        match self {
            Self::Var(var) => Some(*var),
            Self::Const(_) => None,
        }
    }

    /// Returns the constant if this operand is one.
    #[must_use]
    pub const fn as_const(&self) -> Option<&ConstValue> {
        match self {
            Self::Const(value) => Some(value),
            Self::Var(_) => None,
        }
    }

    /// Returns `true` if this operand is a variable.
    #[must_use]
    pub const fn is_var(&self) -> bool {
        matches!(self, Self::Var(_))
    }

    /// Returns `true` if this operand uses the given variable.
    #[must_use]
    pub fn uses(&self, var: SsaVarId) -> bool {
        matches!(self, Self::Var(v) if *v == var)
    }
}

impl From<SsaVarId> for Operand {
    fn from(var: SsaVarId) -> Self {
        Self::Var(var)
    }
}

impl From<ConstValue> for Operand {
    fn from(value: ConstValue) -> Self {
        Self::Const(value)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(var) => write!(f, "{var}"),
            Self::Const(value) => write!(f, "{value}"),
        }
    }
}
