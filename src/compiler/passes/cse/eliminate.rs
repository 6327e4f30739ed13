//! The block-local eliminator.

use crate::{
    analysis::{
        EffectAnalyzer, Opcode, Operand, SsaFunction, SsaOperation, SsaType, SsaVarId,
        WriteEffects,
    },
    compiler::{
        events::EventKind,
        passes::cse::{
            cache::{Cache, HeapKey, PureKey},
            resolver::Representatives,
            Reporter,
        },
    },
    Error, Result,
};

/// Walks the operations of one block against its incoming cache.
pub(super) struct BlockEliminator<'a> {
    pub(super) func: &'a mut SsaFunction,
    pub(super) reps: &'a mut Representatives,
    pub(super) analyzer: &'a dyn EffectAnalyzer,
    pub(super) reporter: &'a Reporter<'a>,
}

impl BlockEliminator<'_> {
    /// Processes `block` in order, updating `cache` to the state at its end.
    ///
    /// The last operation of a raising block is left alone. Returns the number
    /// of operations rewritten.
    pub(super) fn run(&mut self, block: usize, cache: &mut Cache) -> Result<usize> {
        let len = self
            .func
            .block(block)
            .ok_or(Error::InvalidBlock(block))?
            .rewritable_len();

        let mut removed = 0;
        for index in 0..len {
            let op = self
                .func
                .block(block)
                .and_then(|b| b.operations().get(index))
                .cloned()
                .ok_or(Error::InvalidBlock(block))?;
            if self.operation(block, index, &op, cache)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn operation(
        &mut self,
        block: usize,
        index: usize,
        op: &SsaOperation,
        cache: &mut Cache,
    ) -> Result<bool> {
        match op.opcode() {
            Opcode::GetField | Opcode::GetArrayItem => return self.read(block, index, op, cache),
            Opcode::SetField | Opcode::SetArrayItem => return self.write(block, index, op, cache),
            Opcode::WriteBarrierField => {
                let key = self.heap_key(op)?;
                let cleared = cache.clear_location(&key.owner, &key.descriptor);
                if cleared > 0 {
                    self.reporter
                        .record(EventKind::HeapInvalidated, block)
                        .message(format!("write barrier on {} drops {cleared} entries", key.location()));
                }
            }
            Opcode::MallocVarsize => {
                if let (Some(result), Some(length)) = (op.result(), op.arg(0)) {
                    let length_type = self.type_of(length)?;
                    let array = self.reps.of(&Operand::Var(result));
                    cache.insert_pure(
                        PureKey::new(Opcode::GetArraySize, length_type, vec![array]),
                        length.clone(),
                    );
                }
            }
            _ => {}
        }

        let key = match op.result() {
            Some(result) if op.is_pure() => {
                let result_type = self.type_of(&Operand::Var(result))?;
                Some(PureKey::new(op.opcode(), result_type, self.reps.of_all(op.args())))
            }
            _ => None,
        };

        if op.has_side_effects() && cache.heap_len() > 0 {
            let effects = self.analyzer.effects_of(self.func, op);
            let cleared = if self.analyzer.is_unknown(&effects) {
                cache.purge(&WriteEffects::Top)
            } else {
                cache.purge(&effects)
            };
            if cleared > 0 {
                self.reporter
                    .record(EventKind::HeapInvalidated, block)
                    .message(format!("`{op}` drops {cleared} entries"));
            }
        }

        if op.opcode().is_identity() {
            if let (Some(result), Some(source)) = (op.result(), op.arg(0)) {
                self.reps.union(&Operand::Var(result), source);
            }
            return Ok(false);
        }

        let (Some(key), Some(result)) = (key, op.result()) else {
            return Ok(false);
        };
        match cache.pure(&key).cloned() {
            Some(value) => {
                self.replace_with(block, index, result, value.clone())?;
                self.reporter
                    .record(EventKind::ExpressionEliminated, block)
                    .message(format!("`{op}` reuses {value}"));
                Ok(true)
            }
            None => {
                cache.insert_pure(key, Operand::Var(result));
                Ok(false)
            }
        }
    }

    fn read(
        &mut self,
        block: usize,
        index: usize,
        op: &SsaOperation,
        cache: &mut Cache,
    ) -> Result<bool> {
        let Some(result) = op.result() else {
            return Ok(false);
        };
        let key = self.heap_key(op)?;
        match cache.heap(&key).cloned() {
            Some(value) => {
                self.replace_with(block, index, result, value.clone())?;
                self.reporter
                    .record(EventKind::LoadEliminated, block)
                    .message(format!("`{op}` reuses {value}"));
                Ok(true)
            }
            None => {
                cache.insert_heap(key, Operand::Var(result));
                Ok(false)
            }
        }
    }

    fn write(
        &mut self,
        block: usize,
        index: usize,
        op: &SsaOperation,
        cache: &mut Cache,
    ) -> Result<bool> {
        let key = self.heap_key(op)?;
        let value = op
            .arg(2)
            .cloned()
            .ok_or_else(|| malformed_error!("`{}` has no stored value", op))?;

        if let Some(known) = cache.heap(&key).cloned() {
            if self.reps.same(&known, &value) {
                self.operation_mut(block, index)?.make_nop();
                self.reporter
                    .record(EventKind::StoreEliminated, block)
                    .message(format!("`{op}` stores the value already there"));
                return Ok(true);
            }
        }

        cache.clear_location(&key.owner, &key.descriptor);
        cache.insert_heap(key, value);
        Ok(false)
    }

    fn heap_key(&mut self, op: &SsaOperation) -> Result<HeapKey> {
        let base = op
            .arg(0)
            .ok_or_else(|| malformed_error!("`{}` has no base", op))?;
        let owner = self.func.operand_type(base).unwrap_or(SsaType::Unknown);
        let base_rep = self.reps.of(base);

        match op.opcode() {
            Opcode::GetArrayItem | Opcode::SetArrayItem => {
                let index = op
                    .arg(1)
                    .ok_or_else(|| malformed_error!("`{}` has no index", op))?;
                Ok(HeapKey::item(base_rep, owner, self.reps.of(index)))
            }
            _ => {
                let field = op
                    .arg(1)
                    .and_then(Operand::as_const)
                    .and_then(|value| value.as_field())
                    .ok_or_else(|| malformed_error!("`{}` does not name a field", op))?;
                Ok(HeapKey::field(base_rep, owner, field))
            }
        }
    }

    fn type_of(&self, operand: &Operand) -> Result<SsaType> {
        self.func
            .operand_type(operand)
            .ok_or_else(|| malformed_error!("{} is not in the variable table", operand))
    }

    fn operation_mut(&mut self, block: usize, index: usize) -> Result<&mut SsaOperation> {
        self.func
            .block_mut(block)
            .and_then(|b| b.operations_mut().get_mut(index))
            .ok_or(Error::InvalidBlock(block))
    }

    /// Turns the operation defining `result` into an alias of `value`.
    fn replace_with(
        &mut self,
        block: usize,
        index: usize,
        result: SsaVarId,
        value: Operand,
    ) -> Result<()> {
        let expected = self.type_of(&Operand::Var(result))?;
        let found = self.type_of(&value)?;
        if expected != found {
            return Err(Error::TypeMismatch {
                var: result,
                expected,
                found,
            });
        }

        self.operation_mut(block, index)?.make_alias(value.clone());
        self.reps.union(&Operand::Var(result), &value);
        Ok(())
    }
}
