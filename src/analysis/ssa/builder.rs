//! Builder pattern for programmatic SSA construction.
//!
//! This module provides a fluent API for building SSA functions without the
//! boilerplate of manual block, link and variable ID management. It's useful for:
//!
//! - Writing unit tests for optimization passes
//! - Front-ends that emit SSA form directly
//! - Creating fixtures for benchmarks
//!
//! # Design
//!
//! The builder uses a closure-based API where all blocks are defined within
//! a single expression, making the CFG structure visually clear. Each block
//! closure may return a value, typically the variables it defines, so later
//! blocks can refer to them:
//!
//! ```rust
//! use cseflow::analysis::{ConstValue, SsaFunctionBuilder, SsaType};
//!
//! let func = SsaFunctionBuilder::new("select").build_with(|f| {
//!     let cond = f.block(0, |b| {
//!         let cond = b.param(SsaType::Bool);
//!         b.switch(cond);
//!         b.exit(1, vec![], ConstValue::Bool(true));
//!         b.exit(2, vec![], ConstValue::Bool(false));
//!         cond
//!     });
//!     f.block(1, |b| b.jump(3, vec![ConstValue::I64(1).into()]));
//!     f.block(2, |b| b.jump(3, vec![ConstValue::I64(2).into()]));
//!     f.block(3, |b| b.param(SsaType::I64));
//!     let _ = cond;
//! });
//!
//! assert_eq!(func.block_count(), 4);
//! assert_eq!(func.links().len(), 4);
//! assert!(func.validate().is_ok());
//! ```
//!
//! # Variable Management
//!
//! Variables are allocated when parameters are declared or operations are
//! emitted. Operations that produce values return the allocated `SsaVarId`.
//! Blocks may be defined in any order; missing block indices are filled with
//! empty final blocks.

use std::collections::BTreeMap;

use crate::analysis::ssa::{
    ConstValue, FieldRef, Link, LinkId, MethodRef, Opcode, Operand, SsaBlock, SsaFunction,
    SsaOperation, SsaType, SsaVarId, SsaVariable,
};

/// Builder for constructing SSA functions programmatically.
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::{SsaFunctionBuilder, SsaType};
///
/// let func = SsaFunctionBuilder::new("double").build_with(|f| {
///     f.block(0, |b| {
///         let x = b.param(SsaType::I64);
///         let y = b.int_add(x, x);
///         b.jump(1, vec![y.into()]);
///     });
///     f.block(1, |b| {
///         b.param(SsaType::I64);
///     });
/// });
///
/// assert_eq!(func.operation_count(), 1);
/// ```
#[derive(Debug)]
pub struct SsaFunctionBuilder {
    name: String,
    /// Variables created during building
    variables: Vec<SsaVariable>,
    /// Blocks indexed by ID (may have gaps)
    blocks: BTreeMap<usize, SsaBlock>,
    /// Links in creation order
    links: Vec<Link>,
}

impl SsaFunctionBuilder {
    /// Creates a new builder for a function with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            blocks: BTreeMap::new(),
            links: Vec::new(),
        }
    }

    fn alloc_var(&mut self, var_type: SsaType) -> SsaVarId {
        let id = SsaVarId::new(self.variables.len());
        self.variables.push(SsaVariable::new(id, var_type));
        id
    }

    /// Builds the SSA function using a closure that defines all blocks.
    ///
    /// # Arguments
    ///
    /// * `f` - A closure that receives an [`SsaFunctionContext`] for defining blocks
    ///
    /// # Returns
    ///
    /// The constructed [`SsaFunction`]. The result is not validated; call
    /// [`SsaFunction::validate`] to check it.
    pub fn build_with<F>(mut self, f: F) -> SsaFunction
    where
        F: FnOnce(&mut SsaFunctionContext<'_>),
    {
        let mut ctx = SsaFunctionContext { builder: &mut self };
        f(&mut ctx);
        self.build()
    }

    fn build(mut self) -> SsaFunction {
        let max_block_id = self.blocks.keys().next_back().copied().unwrap_or(0);
        let mut blocks = Vec::with_capacity(max_block_id + 1);
        for id in 0..=max_block_id {
            blocks.push(self.blocks.remove(&id).unwrap_or_else(|| SsaBlock::new(id)));
        }
        SsaFunction::from_parts(self.name, blocks, self.links, self.variables)
    }
}

/// Context passed to the build closure for defining blocks.
pub struct SsaFunctionContext<'a> {
    builder: &'a mut SsaFunctionBuilder,
}

impl SsaFunctionContext<'_> {
    /// Allocates a fresh variable not yet bound to any definition.
    ///
    /// Bind it later with [`SsaBlockBuilder::bind_param`].
    #[must_use]
    pub fn var(&mut self, var_type: SsaType) -> SsaVarId {
        self.builder.alloc_var(var_type)
    }

    /// Defines a block with the given ID using a closure.
    ///
    /// # Arguments
    ///
    /// * `id` - The block ID
    /// * `f` - A closure that defines the block's contents
    ///
    /// # Returns
    ///
    /// Whatever the closure returns.
    pub fn block<F, R>(&mut self, id: usize, f: F) -> R
    where
        F: FnOnce(&mut SsaBlockBuilder<'_>) -> R,
    {
        let mut block = SsaBlock::new(id);
        let result = {
            let mut block_builder = SsaBlockBuilder {
                builder: self.builder,
                block: &mut block,
            };
            f(&mut block_builder)
        };
        self.builder.blocks.insert(id, block);
        result
    }
}

/// Builder for constructing individual SSA blocks.
///
/// Provides shorthand methods for adding operations and exits to a block.
/// Operations that produce values return the allocated `SsaVarId`.
pub struct SsaBlockBuilder<'a> {
    builder: &'a mut SsaFunctionBuilder,
    block: &'a mut SsaBlock,
}

impl SsaBlockBuilder<'_> {
    /// Returns the index of the block being built.
    #[must_use]
    pub fn id(&self) -> usize {
        self.block.id()
    }

    /// Declares a new parameter of the given type.
    pub fn param(&mut self, var_type: SsaType) -> SsaVarId {
        let var = self.builder.alloc_var(var_type);
        self.block.add_param(var);
        var
    }

    /// Declares a new parameter with a name hint.
    pub fn named_param(&mut self, var_type: SsaType, name: &str) -> SsaVarId {
        let var = self.param(var_type);
        if let Some(v) = self.builder.variables.get_mut(var.index()) {
            v.set_name(name);
        }
        var
    }

    /// Binds a variable allocated with [`SsaFunctionContext::var`] as the next
    /// parameter.
    pub fn bind_param(&mut self, var: SsaVarId) {
        self.block.add_param(var);
    }

    /// Adds: result = opcode args..., returning the result.
    pub fn op(&mut self, opcode: Opcode, args: Vec<Operand>, result_type: SsaType) -> SsaVarId {
        let result = self.builder.alloc_var(result_type);
        self.block
            .add_operation(SsaOperation::new(opcode, args, Some(result)));
        result
    }

    /// Adds: opcode args..., without a result.
    pub fn op_void(&mut self, opcode: Opcode, args: Vec<Operand>) {
        self.block
            .add_operation(SsaOperation::new(opcode, args, None));
    }

    /// Adds: result = left + right (i64)
    pub fn int_add(&mut self, left: impl Into<Operand>, right: impl Into<Operand>) -> SsaVarId {
        self.op(Opcode::IntAdd, vec![left.into(), right.into()], SsaType::I64)
    }

    /// Adds: result = left - right (i64)
    pub fn int_sub(&mut self, left: impl Into<Operand>, right: impl Into<Operand>) -> SsaVarId {
        self.op(Opcode::IntSub, vec![left.into(), right.into()], SsaType::I64)
    }

    /// Adds: result = left * right (i64)
    pub fn int_mul(&mut self, left: impl Into<Operand>, right: impl Into<Operand>) -> SsaVarId {
        self.op(Opcode::IntMul, vec![left.into(), right.into()], SsaType::I64)
    }

    /// Adds: result = left < right
    pub fn int_lt(&mut self, left: impl Into<Operand>, right: impl Into<Operand>) -> SsaVarId {
        self.op(Opcode::IntLt, vec![left.into(), right.into()], SsaType::Bool)
    }

    /// Adds: result = left + right, raising on overflow (i64)
    pub fn int_add_ovf(
        &mut self,
        left: impl Into<Operand>,
        right: impl Into<Operand>,
    ) -> SsaVarId {
        self.op(
            Opcode::IntAddOvf,
            vec![left.into(), right.into()],
            SsaType::I64,
        )
    }

    /// Adds: result = same_as value
    pub fn same_as(&mut self, value: impl Into<Operand>, var_type: SsaType) -> SsaVarId {
        self.op(Opcode::SameAs, vec![value.into()], var_type)
    }

    /// Adds: result = cast_pointer value, reinterpreting it as `var_type`
    pub fn cast_pointer(&mut self, value: impl Into<Operand>, var_type: SsaType) -> SsaVarId {
        self.op(Opcode::CastPointer, vec![value.into()], var_type)
    }

    /// Adds: result = base.field
    pub fn getfield(
        &mut self,
        base: impl Into<Operand>,
        field: FieldRef,
        var_type: SsaType,
    ) -> SsaVarId {
        self.op(
            Opcode::GetField,
            vec![base.into(), ConstValue::Field(field).into()],
            var_type,
        )
    }

    /// Adds: base.field = value
    pub fn setfield(&mut self, base: impl Into<Operand>, field: FieldRef, value: impl Into<Operand>) {
        self.op_void(
            Opcode::SetField,
            vec![base.into(), ConstValue::Field(field).into(), value.into()],
        );
    }

    /// Adds: result = array[index]
    pub fn getarrayitem(
        &mut self,
        array: impl Into<Operand>,
        index: impl Into<Operand>,
        var_type: SsaType,
    ) -> SsaVarId {
        self.op(Opcode::GetArrayItem, vec![array.into(), index.into()], var_type)
    }

    /// Adds: array[index] = value
    pub fn setarrayitem(
        &mut self,
        array: impl Into<Operand>,
        index: impl Into<Operand>,
        value: impl Into<Operand>,
    ) {
        self.op_void(
            Opcode::SetArrayItem,
            vec![array.into(), index.into(), value.into()],
        );
    }

    /// Adds: result = len(array) (i64)
    pub fn getarraysize(&mut self, array: impl Into<Operand>) -> SsaVarId {
        self.op(Opcode::GetArraySize, vec![array.into()], SsaType::I64)
    }

    /// Adds: result = malloc, allocating an object of type `var_type`
    pub fn malloc(&mut self, var_type: SsaType) -> SsaVarId {
        self.op(Opcode::Malloc, vec![], var_type)
    }

    /// Adds: result = malloc_varsize length, allocating an array of type `var_type`
    pub fn malloc_varsize(&mut self, var_type: SsaType, length: impl Into<Operand>) -> SsaVarId {
        self.op(Opcode::MallocVarsize, vec![length.into()], var_type)
    }

    /// Adds: result = direct_call method, args...
    pub fn direct_call(
        &mut self,
        method: MethodRef,
        elidable: bool,
        args: Vec<Operand>,
        var_type: SsaType,
    ) -> SsaVarId {
        let mut operands = Vec::with_capacity(args.len() + 1);
        operands.push(ConstValue::Function { method, elidable }.into());
        operands.extend(args);
        self.op(Opcode::DirectCall, operands, var_type)
    }

    /// Adds: result = indirect_call target, args...
    pub fn indirect_call(
        &mut self,
        target: impl Into<Operand>,
        args: Vec<Operand>,
        var_type: SsaType,
    ) -> SsaVarId {
        let mut operands = Vec::with_capacity(args.len() + 1);
        operands.push(target.into());
        operands.extend(args);
        self.op(Opcode::IndirectCall, operands, var_type)
    }

    /// Adds: write_barrier_field base, field
    pub fn write_barrier_field(&mut self, base: impl Into<Operand>, field: FieldRef) {
        self.op_void(
            Opcode::WriteBarrierField,
            vec![base.into(), ConstValue::Field(field).into()],
        );
    }

    /// Adds: debug_print args...
    pub fn debug_print(&mut self, args: Vec<Operand>) {
        self.op_void(Opcode::DebugPrint, args);
    }

    /// Sets the value that selects among several exits.
    pub fn switch(&mut self, cond: impl Into<Operand>) {
        self.block.set_exit_switch(Some(cond.into()));
    }

    /// Marks the last operation of this block as raising into its exits.
    pub fn raising(&mut self) {
        self.block.set_raising(true);
    }

    /// Adds the default exit to `target`, passing `args` to its parameters.
    pub fn jump(&mut self, target: usize, args: Vec<Operand>) -> LinkId {
        self.add_exit(target, args, None)
    }

    /// Adds an exit to `target` taken when the exit switch equals `case`.
    pub fn exit(&mut self, target: usize, args: Vec<Operand>, case: ConstValue) -> LinkId {
        self.add_exit(target, args, Some(case))
    }

    fn add_exit(&mut self, target: usize, args: Vec<Operand>, case: Option<ConstValue>) -> LinkId {
        let id = LinkId::new(self.builder.links.len());
        let mut link = Link::new(id, self.block.id(), target, args);
        link.exit_case = case;
        self.builder.links.push(link);
        self.block.add_exit(id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaps_are_filled() {
        let func = SsaFunctionBuilder::new("gaps").build_with(|f| {
            f.block(2, |b| {
                b.param(SsaType::I64);
            });
            f.block(0, |b| b.jump(2, vec![ConstValue::I64(0).into()]));
        });
        assert_eq!(func.block_count(), 3);
        assert!(func.block(1).unwrap().is_final());
        assert!(func.validate().is_ok());
    }

    #[test]
    fn test_block_returns_closure_value() {
        let mut seen = None;
        let func = SsaFunctionBuilder::new("ret").build_with(|f| {
            let x = f.block(0, |b| b.param(SsaType::I32));
            seen = Some(x);
        });
        assert_eq!(func.block(0).unwrap().params(), &[seen.unwrap()]);
        assert_eq!(func.var_type(seen.unwrap()), Some(&SsaType::I32));
    }

    #[test]
    fn test_direct_call_layout() {
        let func = SsaFunctionBuilder::new("call").build_with(|f| {
            f.block(0, |b| {
                let x = b.param(SsaType::I64);
                b.direct_call(MethodRef::new(3), true, vec![x.into()], SsaType::I64);
            });
        });
        let op = &func.block(0).unwrap().operations()[0];
        assert_eq!(op.opcode(), Opcode::DirectCall);
        assert_eq!(op.callee(), Some((MethodRef::new(3), true)));
        assert_eq!(op.args().len(), 2);
    }

    #[test]
    fn test_named_param() {
        let func = SsaFunctionBuilder::new("named").build_with(|f| {
            f.block(0, |b| {
                b.named_param(SsaType::I64, "n");
            });
        });
        assert_eq!(func.variables()[0].name(), Some("n"));
    }
}
