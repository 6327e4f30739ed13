//! Operations with explicit operands and results.

use std::fmt;

use crate::analysis::ssa::{ConstValue, MethodRef, OpFlags, Opcode, Operand, SsaVarId};

/// One operation inside a block.
///
/// An operation applies an [`Opcode`] to an ordered list of [`Operand`]s and
/// optionally defines a result variable. The result's type lives in the
/// function's variable table.
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::{ConstValue, Opcode, Operand, SsaOperation, SsaVarId};
///
/// let (a, r) = (SsaVarId::new(0), SsaVarId::new(1));
/// let mut op = SsaOperation::new(
///     Opcode::IntAdd,
///     vec![a.into(), ConstValue::I64(1).into()],
///     Some(r),
/// );
/// assert!(op.is_pure());
///
/// op.make_alias(a.into());
/// assert_eq!(op.opcode(), Opcode::SameAs);
/// assert_eq!(op.result(), Some(r));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsaOperation {
    opcode: Opcode,
    args: Vec<Operand>,
    result: Option<SsaVarId>,
}

impl SsaOperation {
    /// Creates a new operation.
    ///
    /// # Arguments
    ///
    /// * `opcode` - What the operation computes
    /// * `args` - The ordered operands
    /// * `result` - The variable defined by the operation, if any
    #[must_use]
    pub fn new(opcode: Opcode, args: Vec<Operand>, result: Option<SsaVarId>) -> Self {
        Self {
            opcode,
            args,
            result,
        }
    }

    /// Returns the opcode.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Returns the operands.
    #[must_use]
    pub fn args(&self) -> &[Operand] {
        &self.args
    }

    /// Returns the operand at `index`, if present.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Operand> {
        self.args.get(index)
    }

    /// Returns the defined variable, if any.
    #[must_use]
    pub const fn result(&self) -> Option<SsaVarId> {
        self.result
    }

    /// Returns the static classification of the opcode.
    #[must_use]
    pub const fn flags(&self) -> OpFlags {
        self.opcode.flags()
    }

    /// Returns the callee of a direct call together with its elidable flag.
    #[must_use]
    pub fn callee(&self) -> Option<(MethodRef, bool)> {
        if self.opcode != Opcode::DirectCall {
            return None;
        }
        self.args.first()?.as_const()?.as_function()
    }

    /// Returns `true` for a direct call whose callee is declared free of
    /// external effects.
    #[must_use]
    pub fn is_elidable_call(&self) -> bool {
        matches!(self.callee(), Some((_, true)))
    }

    /// Returns `true` if occurrences with equal operands may share one result.
    #[must_use]
    pub fn is_pure(&self) -> bool {
        self.opcode.is_foldable() || self.is_elidable_call()
    }

    /// Returns `true` if the operation may write memory or observable state.
    ///
    /// Elidable calls are treated as free of side effects.
    #[must_use]
    pub fn has_side_effects(&self) -> bool {
        self.flags().contains(OpFlags::SIDE_EFFECTS) && !self.is_elidable_call()
    }

    /// Returns `true` if the operation may raise a runtime fault.
    #[must_use]
    pub fn can_raise(&self) -> bool {
        self.flags().contains(OpFlags::CAN_RAISE)
    }

    /// Returns `true` if the operation uses `var` as an operand.
    #[must_use]
    pub fn uses(&self, var: SsaVarId) -> bool {
        self.args.iter().any(|arg| arg.uses(var))
    }

    /// Returns the variables used as operands.
    pub fn used_vars(&self) -> impl Iterator<Item = SsaVarId> + '_ {
        self.args.iter().filter_map(Operand::as_var)
    }

    /// Replaces every use of `old` with `new`, returning the number of replacements.
    pub fn replace_uses(&mut self, old: SsaVarId, new: &Operand) -> usize {
        let mut count = 0;
        for arg in &mut self.args {
            if arg.uses(old) {
                *arg = new.clone();
                count += 1;
            }
        }
        count
    }

    /// Rewrites this operation into a trivial alias `result = same_as source`.
    pub fn make_alias(&mut self, source: Operand) {
        self.opcode = Opcode::SameAs;
        self.args = vec![source];
    }

    /// Rewrites this operation into a no-op `same_as void` without a result.
    pub fn make_nop(&mut self) {
        self.opcode = Opcode::SameAs;
        self.args = vec![Operand::Const(ConstValue::Void)];
        self.result = None;
    }

    /// Returns `true` for a `same_as` without a result, as left behind by
    /// [`make_nop`](Self::make_nop).
    #[must_use]
    pub fn is_nop(&self) -> bool {
        self.opcode == Opcode::SameAs && self.result.is_none()
    }
}

impl fmt::Display for SsaOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "{result} = ")?;
        }
        write!(f, "{}", self.opcode)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i == 0 {
                write!(f, " {arg}")?;
            } else {
                write!(f, ", {arg}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(elidable: bool) -> SsaOperation {
        SsaOperation::new(
            Opcode::DirectCall,
            vec![
                ConstValue::Function {
                    method: MethodRef::new(4),
                    elidable,
                }
                .into(),
                SsaVarId::new(0).into(),
            ],
            Some(SsaVarId::new(1)),
        )
    }

    #[test]
    fn test_elidable_call_is_pure() {
        let op = call(true);
        assert!(op.is_elidable_call());
        assert!(op.is_pure());
        assert!(!op.has_side_effects());
        assert_eq!(op.callee(), Some((MethodRef::new(4), true)));
    }

    #[test]
    fn test_plain_call_has_side_effects() {
        let op = call(false);
        assert!(!op.is_pure());
        assert!(op.has_side_effects());
    }

    #[test]
    fn test_make_nop_drops_result() {
        let mut op = SsaOperation::new(
            Opcode::SetField,
            vec![
                SsaVarId::new(0).into(),
                ConstValue::Field(crate::analysis::FieldRef::new(1)).into(),
                SsaVarId::new(2).into(),
            ],
            None,
        );
        op.make_nop();
        assert!(op.is_nop());
        assert_eq!(op.to_string(), "same_as void");
    }

    #[test]
    fn test_replace_uses() {
        let v0 = SsaVarId::new(0);
        let mut op = SsaOperation::new(
            Opcode::IntMul,
            vec![v0.into(), v0.into()],
            Some(SsaVarId::new(1)),
        );
        assert_eq!(op.replace_uses(v0, &ConstValue::I64(3).into()), 2);
        assert!(!op.uses(v0));
        assert_eq!(op.to_string(), "v1 = int_mul 3, 3");
    }
}
