//! Constant folding pass.
//!
//! Evaluates foldable operations whose arguments are all constants and
//! replaces them with an alias of the computed constant. The constant is then
//! substituted into every use, so chains of constant computations collapse
//! in one run.
//!
//! # Example
//!
//! Before:
//! ```text
//! v1 = int_add 2, 3
//! v2 = int_mul v1, 4
//! ```
//!
//! After:
//! ```text
//! v1 = same_as 5
//! v2 = same_as 20
//! ```
//!
//! # Semantics
//!
//! Integer arithmetic wraps at the width of the result type. Floor division
//! rounds towards negative infinity and the remainder takes the sign of the
//! divisor. Division by zero, out-of-range shifts and float-to-int casts of
//! non-finite or out-of-range values are left unfolded.

use crate::{
    analysis::{ConstValue, MethodRef, Opcode, Operand, SsaFunction, SsaType},
    compiler::{pass::SsaPass, CompilerContext, EventKind, EventLog},
    Result,
};

/// Maximum iterations for the fixed-point algorithm to prevent infinite loops.
const MAX_ITERATIONS: usize = 100;

/// Constant folding pass.
pub struct ConstantFoldingPass;

impl Default for ConstantFoldingPass {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantFoldingPass {
    /// Creates a new constant folding pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Folds constant operations in `ssa` to a fixed point.
    ///
    /// # Arguments
    ///
    /// * `ssa` - The function to modify.
    /// * `method` - The function's handle for event attribution, if any.
    /// * `changes` - The log that receives a `ConstantFolded` event per fold.
    ///
    /// # Returns
    ///
    /// The number of folded operations.
    pub fn fold(ssa: &mut SsaFunction, method: Option<MethodRef>, changes: &EventLog) -> usize {
        let mut total = 0;
        for _ in 0..MAX_ITERATIONS {
            let folded = Self::run_iteration(ssa, method, changes);
            if folded == 0 {
                break;
            }
            total += folded;
        }
        total
    }

    fn run_iteration(ssa: &mut SsaFunction, method: Option<MethodRef>, changes: &EventLog) -> usize {
        let mut folded = Vec::new();
        for block in ssa.blocks() {
            for (index, op) in block.operations().iter().enumerate() {
                if !op.opcode().is_foldable() {
                    continue;
                }
                let Some(result) = op.result() else {
                    continue;
                };
                let Some(args) = op
                    .args()
                    .iter()
                    .map(Operand::as_const)
                    .collect::<Option<Vec<_>>>()
                else {
                    continue;
                };
                let Some(result_type) = ssa.var_type(result) else {
                    continue;
                };
                let Some(value) = evaluate(op.opcode(), &args, result_type) else {
                    continue;
                };
                if value.const_type() != *result_type {
                    continue;
                }
                folded.push((block.id(), index, result, value, op.to_string()));
            }
        }

        for (block, index, result, value, text) in &folded {
            if let Some(op) = ssa
                .block_mut(*block)
                .and_then(|b| b.operations_mut().get_mut(*index))
            {
                op.make_alias(Operand::Const(value.clone()));
            }
            ssa.replace_uses(*result, &Operand::Const(value.clone()));
            changes
                .record(EventKind::ConstantFolded)
                .method(method)
                .location(*block)
                .pass("constant-folding")
                .message(format!("`{text}` is {value}"));
        }
        folded.len()
    }
}

/// Computes the value of `opcode` applied to constant `args`.
///
/// Returns `None` when the operation cannot be evaluated at compile time.
fn evaluate(opcode: Opcode, args: &[&ConstValue], result_type: &SsaType) -> Option<ConstValue> {
    match (opcode, args) {
        (Opcode::IntNeg, [a]) => int(a.as_i64()?.wrapping_neg(), result_type),
        (Opcode::IntIsTrue, [a]) => Some(ConstValue::Bool(a.as_i64()? != 0)),
        (Opcode::BoolNot, [a]) => Some(ConstValue::Bool(!a.as_bool()?)),
        (Opcode::FloatNeg, [a]) => Some(ConstValue::f64(-a.as_f64()?)),
        (Opcode::CastIntToFloat, [a]) => Some(ConstValue::f64(a.as_i64()? as f64)),
        (Opcode::CastFloatToInt, [a]) => {
            let value = a.as_f64()?.trunc();
            if !value.is_finite() || value < i64::MIN as f64 || value >= i64::MAX as f64 {
                return None;
            }
            int(value as i64, result_type)
        }
        (Opcode::CastCharToInt, [ConstValue::Char(c)]) => int(i64::from(u32::from(*c)), result_type),
        (Opcode::CastBoolToInt, [ConstValue::Bool(b)]) => int(i64::from(*b), result_type),
        (Opcode::PtrIsZero, [a]) => Some(ConstValue::Bool(is_null(a)?)),
        (Opcode::PtrNonZero, [a]) => Some(ConstValue::Bool(!is_null(a)?)),
        (Opcode::PtrEq, [a, b]) => Some(ConstValue::Bool(same_pointer(a, b)?)),
        (Opcode::PtrNe, [a, b]) => Some(ConstValue::Bool(!same_pointer(a, b)?)),
        (Opcode::FloatAdd, [a, b]) => Some(ConstValue::f64(a.as_f64()? + b.as_f64()?)),
        (Opcode::FloatSub, [a, b]) => Some(ConstValue::f64(a.as_f64()? - b.as_f64()?)),
        (Opcode::FloatMul, [a, b]) => Some(ConstValue::f64(a.as_f64()? * b.as_f64()?)),
        (Opcode::FloatTrueDiv, [a, b]) => {
            let divisor = b.as_f64()?;
            if divisor == 0.0 {
                return None;
            }
            Some(ConstValue::f64(a.as_f64()? / divisor))
        }
        #[allow(clippy::float_cmp)]
        (Opcode::FloatEq, [a, b]) => Some(ConstValue::Bool(a.as_f64()? == b.as_f64()?)),
        (Opcode::FloatLt, [a, b]) => Some(ConstValue::Bool(a.as_f64()? < b.as_f64()?)),
        (opcode, [a, b]) => binary_int(opcode, a.as_i64()?, b.as_i64()?, result_type),
        _ => None,
    }
}

fn binary_int(opcode: Opcode, a: i64, b: i64, result_type: &SsaType) -> Option<ConstValue> {
    let value = match opcode {
        Opcode::IntAdd => a.wrapping_add(b),
        Opcode::IntSub => a.wrapping_sub(b),
        Opcode::IntMul => a.wrapping_mul(b),
        Opcode::IntFloorDiv => {
            let quotient = a.checked_div(b)?;
            if a % b != 0 && (a < 0) != (b < 0) {
                quotient - 1
            } else {
                quotient
            }
        }
        Opcode::IntMod => {
            let remainder = a.checked_rem(b)?;
            if remainder != 0 && (remainder < 0) != (b < 0) {
                remainder + b
            } else {
                remainder
            }
        }
        Opcode::IntAnd => a & b,
        Opcode::IntOr => a | b,
        Opcode::IntXor => a ^ b,
        Opcode::IntLshift => a.checked_shl(u32::try_from(b).ok()?)?,
        Opcode::IntRshift => a.checked_shr(u32::try_from(b).ok()?)?,
        Opcode::IntLt => return Some(ConstValue::Bool(a < b)),
        Opcode::IntLe => return Some(ConstValue::Bool(a <= b)),
        Opcode::IntEq => return Some(ConstValue::Bool(a == b)),
        Opcode::IntNe => return Some(ConstValue::Bool(a != b)),
        Opcode::IntGt => return Some(ConstValue::Bool(a > b)),
        Opcode::IntGe => return Some(ConstValue::Bool(a >= b)),
        _ => return None,
    };
    int(value, result_type)
}

/// Builds an integer constant of `result_type`, wrapping to its width.
#[allow(clippy::cast_possible_truncation)]
fn int(value: i64, result_type: &SsaType) -> Option<ConstValue> {
    match result_type {
        SsaType::I64 => Some(ConstValue::I64(value)),
        SsaType::I32 => Some(ConstValue::I32(value as i32)),
        _ => None,
    }
}

fn is_null(value: &ConstValue) -> Option<bool> {
    match value {
        ConstValue::Null(_) => Some(true),
        ConstValue::Global { .. } => Some(false),
        _ => None,
    }
}

fn same_pointer(a: &ConstValue, b: &ConstValue) -> Option<bool> {
    match (a, b) {
        (ConstValue::Null(_), ConstValue::Null(_)) => Some(true),
        (ConstValue::Global { id: x, .. }, ConstValue::Global { id: y, .. }) => Some(x == y),
        (ConstValue::Null(_), ConstValue::Global { .. })
        | (ConstValue::Global { .. }, ConstValue::Null(_)) => Some(false),
        _ => None,
    }
}

impl SsaPass for ConstantFoldingPass {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn description(&self) -> &'static str {
        "Evaluates operations whose arguments are all constants"
    }

    fn run_on_method(
        &self,
        ssa: &mut SsaFunction,
        method: MethodRef,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        let changes = EventLog::new();
        let changed = Self::fold(ssa, Some(method), &changes) > 0;
        if changed {
            ctx.events.merge(&changes);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SsaFunctionBuilder;

    fn fold_binary(opcode: Opcode, a: i64, b: i64) -> Option<ConstValue> {
        binary_int(opcode, a, b, &SsaType::I64)
    }

    #[test]
    fn test_floor_division_and_modulo() {
        assert_eq!(fold_binary(Opcode::IntFloorDiv, 7, 2), Some(ConstValue::I64(3)));
        assert_eq!(fold_binary(Opcode::IntFloorDiv, -7, 2), Some(ConstValue::I64(-4)));
        assert_eq!(fold_binary(Opcode::IntMod, -7, 2), Some(ConstValue::I64(1)));
        assert_eq!(fold_binary(Opcode::IntMod, 7, -2), Some(ConstValue::I64(-1)));
        assert_eq!(fold_binary(Opcode::IntFloorDiv, 1, 0), None);
        assert_eq!(fold_binary(Opcode::IntMod, i64::MIN, -1), None);
    }

    #[test]
    fn test_shifts_and_wrapping() {
        assert_eq!(fold_binary(Opcode::IntLshift, 1, 4), Some(ConstValue::I64(16)));
        assert_eq!(fold_binary(Opcode::IntRshift, -16, 2), Some(ConstValue::I64(-4)));
        assert_eq!(fold_binary(Opcode::IntLshift, 1, 64), None);
        assert_eq!(fold_binary(Opcode::IntLshift, 1, -1), None);
        assert_eq!(
            fold_binary(Opcode::IntAdd, i64::MAX, 1),
            Some(ConstValue::I64(i64::MIN))
        );
        assert_eq!(
            binary_int(Opcode::IntAdd, i64::from(i32::MAX), 1, &SsaType::I32),
            Some(ConstValue::I32(i32::MIN))
        );
    }

    #[test]
    fn test_chain_collapses() {
        let mut ssa = SsaFunctionBuilder::new("chain").build_with(|f| {
            f.block(0, |b| {
                let v1 = b.int_add(ConstValue::I64(2), ConstValue::I64(3));
                let v2 = b.int_mul(v1, ConstValue::I64(4));
                let v3 = b.int_lt(v2, ConstValue::I64(21));
                b.debug_print(vec![v3.into()]);
            });
        });

        let log = EventLog::new();
        assert_eq!(ConstantFoldingPass::fold(&mut ssa, None, &log), 3);
        let ops = ssa.block(0).unwrap().operations();
        assert_eq!(ops[1].args(), &[Operand::Const(ConstValue::I64(20))]);
        assert_eq!(ops[3].args(), &[Operand::Const(ConstValue::Bool(true))]);
        assert_eq!(log.count_kind(EventKind::ConstantFolded), 3);
    }

    #[test]
    fn test_non_constant_and_heap_ops_untouched() {
        let mut ssa = SsaFunctionBuilder::new("mixed").build_with(|f| {
            f.block(0, |b| {
                let x = b.param(SsaType::I64);
                let arr = b.malloc_varsize(SsaType::Array(Box::new(SsaType::I64)), ConstValue::I64(3));
                let len = b.getarraysize(arr);
                b.int_add(x, len);
                b.op(
                    Opcode::IntFloorDiv,
                    vec![ConstValue::I64(1).into(), ConstValue::I64(0).into()],
                    SsaType::I64,
                );
            });
        });

        let before = ssa.clone();
        assert_eq!(ConstantFoldingPass::fold(&mut ssa, None, &EventLog::new()), 0);
        assert_eq!(ssa, before);
    }
}
