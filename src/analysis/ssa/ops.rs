//! The closed opcode vocabulary and its static classification.
//!
//! Every operation in a function body carries one [`Opcode`]. What an optimization
//! may do with an operation is decided purely from the opcode's [`OpFlags`], which
//! are fixed per variant:
//!
//! | Flag           | Meaning                                                  |
//! |----------------|----------------------------------------------------------|
//! | `CANFOLD`      | Result depends only on the argument values               |
//! | `SIDE_EFFECTS` | May write memory or observable state; never eliminated   |
//! | `HEAP_READ`    | Reads a heap location (field or array item)              |
//! | `HEAP_WRITE`   | Writes a heap location                                   |
//! | `IDENTITY`     | Result is the first argument under another name          |
//! | `CAN_RAISE`    | May raise a runtime fault                                |
//! | `CALL`         | Transfers control to another function                    |
//!
//! # Argument Layout
//!
//! Field descriptors and callees are passed as constant operands:
//!
//! ```text
//! v2 = getfield v1, f3            // base, field
//! setfield v1, f3, v7             // base, field, value
//! v4 = getarrayitem v1, v5        // array, index
//! setarrayitem v1, v5, v7         // array, index, value
//! v6 = direct_call fn2, v1, v4    // callee, arguments...
//! write_barrier_field v1, f3      // base, field
//! ```

use bitflags::bitflags;
use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Static classification of an opcode
    pub struct OpFlags: u16 {
        /// Result depends only on the argument values
        const CANFOLD = 0x0001;
        /// May write memory or observable state
        const SIDE_EFFECTS = 0x0002;
        /// Reads a heap location
        const HEAP_READ = 0x0004;
        /// Writes a heap location
        const HEAP_WRITE = 0x0008;
        /// Result aliases the first argument
        const IDENTITY = 0x0010;
        /// May raise a runtime fault
        const CAN_RAISE = 0x0020;
        /// Calls another function
        const CALL = 0x0040;
    }
}

/// Operation kinds.
///
/// The display name of each opcode is its snake-case variant name, which is also
/// the name used when printing function bodies.
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::{OpFlags, Opcode};
///
/// assert!(Opcode::IntAdd.is_foldable());
/// assert!(Opcode::SetField.flags().contains(OpFlags::HEAP_WRITE));
/// assert!(Opcode::CastPointer.is_identity());
/// assert_eq!(Opcode::GetField.to_string(), "get_field");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Opcode {
    // Integer arithmetic
    /// `a + b`
    IntAdd,
    /// `a - b`
    IntSub,
    /// `a * b`
    IntMul,
    /// `a / b`, rounding towards negative infinity
    IntFloorDiv,
    /// `a % b`, sign of the divisor
    IntMod,
    /// `a & b`
    IntAnd,
    /// `a | b`
    IntOr,
    /// `a ^ b`
    IntXor,
    /// `a << b`
    IntLshift,
    /// `a >> b`, arithmetic
    IntRshift,
    /// `-a`
    IntNeg,
    /// `a != 0`
    IntIsTrue,

    // Integer comparisons
    /// `a < b`
    IntLt,
    /// `a <= b`
    IntLe,
    /// `a == b`
    IntEq,
    /// `a != b`
    IntNe,
    /// `a > b`
    IntGt,
    /// `a >= b`
    IntGe,

    // Overflow-checked integer arithmetic
    /// `a + b`, raising on overflow
    IntAddOvf,
    /// `a - b`, raising on overflow
    IntSubOvf,
    /// `a * b`, raising on overflow
    IntMulOvf,

    // Floating point
    /// `a + b`
    FloatAdd,
    /// `a - b`
    FloatSub,
    /// `a * b`
    FloatMul,
    /// `a / b`
    FloatTrueDiv,
    /// `-a`
    FloatNeg,
    /// `a < b`
    FloatLt,
    /// `a == b`
    FloatEq,

    // Booleans
    /// `!a`
    BoolNot,

    // Scalar casts
    /// Integer to float
    CastIntToFloat,
    /// Float to integer, truncating
    CastFloatToInt,
    /// Character to its code point
    CastCharToInt,
    /// Boolean to 0 or 1
    CastBoolToInt,

    // Pointer comparisons
    /// Pointer identity
    PtrEq,
    /// Pointer non-identity
    PtrNe,
    /// `p == null`
    PtrIsZero,
    /// `p != null`
    PtrNonZero,

    /// Length of an array. Arrays never change length, so this folds.
    GetArraySize,

    // Identity-preserving
    /// Plain alias of the argument
    SameAs,
    /// Reinterpret a pointer as another pointer type
    CastPointer,

    // Heap access
    /// Read a field
    GetField,
    /// Write a field
    SetField,
    /// Read an array item
    GetArrayItem,
    /// Write an array item
    SetArrayItem,

    // Allocation
    /// Allocate a fixed-size object
    Malloc,
    /// Allocate an array of the given length
    MallocVarsize,

    // Calls
    /// Call of a statically known function
    DirectCall,
    /// Call through a function pointer
    IndirectCall,

    /// Record that a field of an object becomes reachable from a long-lived root
    WriteBarrierField,

    /// Print arguments for debugging
    DebugPrint,
}

impl Opcode {
    /// Returns the static classification of this opcode.
    #[must_use]
    pub const fn flags(self) -> OpFlags {
        match self {
            Self::IntAdd
            | Self::IntSub
            | Self::IntMul
            | Self::IntFloorDiv
            | Self::IntMod
            | Self::IntAnd
            | Self::IntOr
            | Self::IntXor
            | Self::IntLshift
            | Self::IntRshift
            | Self::IntNeg
            | Self::IntIsTrue
            | Self::IntLt
            | Self::IntLe
            | Self::IntEq
            | Self::IntNe
            | Self::IntGt
            | Self::IntGe
            | Self::FloatAdd
            | Self::FloatSub
            | Self::FloatMul
            | Self::FloatTrueDiv
            | Self::FloatNeg
            | Self::FloatLt
            | Self::FloatEq
            | Self::BoolNot
            | Self::CastIntToFloat
            | Self::CastFloatToInt
            | Self::CastCharToInt
            | Self::CastBoolToInt
            | Self::PtrEq
            | Self::PtrNe
            | Self::PtrIsZero
            | Self::PtrNonZero
            | Self::GetArraySize => OpFlags::CANFOLD,

            Self::IntAddOvf | Self::IntSubOvf | Self::IntMulOvf => OpFlags::CAN_RAISE,

            Self::SameAs | Self::CastPointer => OpFlags::IDENTITY,

            Self::GetField | Self::GetArrayItem => OpFlags::HEAP_READ,

            Self::SetField | Self::SetArrayItem => {
                OpFlags::HEAP_WRITE.union(OpFlags::SIDE_EFFECTS)
            }

            Self::Malloc | Self::MallocVarsize => {
                OpFlags::SIDE_EFFECTS.union(OpFlags::CAN_RAISE)
            }

            Self::DirectCall | Self::IndirectCall => OpFlags::CALL
                .union(OpFlags::SIDE_EFFECTS)
                .union(OpFlags::CAN_RAISE),

            Self::WriteBarrierField | Self::DebugPrint => OpFlags::SIDE_EFFECTS,
        }
    }

    /// Returns `true` if results of this opcode may be reused across occurrences.
    #[must_use]
    pub const fn is_foldable(self) -> bool {
        self.flags().contains(OpFlags::CANFOLD)
    }

    /// Returns `true` if the result is the first argument under another name.
    #[must_use]
    pub const fn is_identity(self) -> bool {
        self.flags().contains(OpFlags::IDENTITY)
    }

    /// Returns `true` for opcodes that transfer control to another function.
    #[must_use]
    pub const fn is_call(self) -> bool {
        self.flags().contains(OpFlags::CALL)
    }

    /// Returns the number of arguments this opcode takes, or `None` if variadic.
    #[must_use]
    pub const fn arity(self) -> Option<usize> {
        match self {
            Self::Malloc => Some(0),
            Self::IntNeg
            | Self::IntIsTrue
            | Self::FloatNeg
            | Self::BoolNot
            | Self::CastIntToFloat
            | Self::CastFloatToInt
            | Self::CastCharToInt
            | Self::CastBoolToInt
            | Self::PtrIsZero
            | Self::PtrNonZero
            | Self::GetArraySize
            | Self::SameAs
            | Self::CastPointer
            | Self::MallocVarsize => Some(1),
            Self::SetField | Self::SetArrayItem => Some(3),
            Self::DirectCall | Self::IndirectCall | Self::DebugPrint => None,
            _ => Some(2),
        }
    }

    /// Returns `true` if operations of this opcode define a result.
    ///
    /// Calls may or may not define one; this returns `true` for them.
    #[must_use]
    pub const fn has_result(self) -> bool {
        !matches!(
            self,
            Self::SetField | Self::SetArrayItem | Self::WriteBarrierField | Self::DebugPrint
        )
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_foldable_never_has_side_effects() {
        for opcode in Opcode::iter() {
            let flags = opcode.flags();
            if flags.contains(OpFlags::CANFOLD) {
                assert!(!flags.contains(OpFlags::SIDE_EFFECTS), "{opcode}");
                assert!(!flags.contains(OpFlags::CAN_RAISE), "{opcode}");
                assert!(!flags.contains(OpFlags::HEAP_READ), "{opcode}");
            }
        }
    }

    #[test]
    fn test_heap_writes_have_side_effects() {
        for opcode in Opcode::iter() {
            if opcode.flags().contains(OpFlags::HEAP_WRITE) {
                assert!(opcode.flags().contains(OpFlags::SIDE_EFFECTS));
                assert!(!opcode.has_result());
            }
        }
    }

    #[test]
    fn test_identity_opcodes_take_one_argument() {
        for opcode in Opcode::iter().filter(|op| op.is_identity()) {
            assert_eq!(opcode.arity(), Some(1));
        }
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Opcode::IntAdd.to_string(), "int_add");
        assert_eq!(Opcode::MallocVarsize.to_string(), "malloc_varsize");
        let name: &'static str = Opcode::WriteBarrierField.into();
        assert_eq!(name, "write_barrier_field");
    }

    #[test]
    fn test_overflow_arithmetic_is_not_foldable() {
        assert!(!Opcode::IntAddOvf.is_foldable());
        assert!(Opcode::IntAddOvf.flags().contains(OpFlags::CAN_RAISE));
    }
}
