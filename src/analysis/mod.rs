//! Program analysis infrastructure for SSA function bodies.
//!
//! This module provides the intermediate representation the optimization passes
//! operate on, together with the analyses the CSE pass treats as collaborators.
//!
//! # Architecture
//!
//! The analysis module is organized into focused sub-modules:
//!
//! - [`ssa`] - SSA form: variables, operands, operations, blocks, links, functions
//! - [`cfg`] - Back-edge detection, reachability and loop bodies over SSA links
//! - [`families`] - Union-find and the phi-equivalence ("family") builder
//! - [`effects`] - Write-effect classification of operations
//!
//! # Usage
//!
//! ```rust
//! use cseflow::analysis::{find_backedges, loop_blocks, PhiFamilies, SsaFunctionBuilder, SsaType};
//!
//! let func = SsaFunctionBuilder::new("loop").build_with(|f| {
//!     f.block(0, |b| {
//!         let n = b.param(SsaType::I64);
//!         b.jump(1, vec![n.into()]);
//!     });
//!     f.block(1, |b| {
//!         let i = b.param(SsaType::I64);
//!         b.jump(1, vec![i.into()]);
//!     });
//! });
//!
//! let backedges = find_backedges(&func);
//! assert_eq!(backedges.len(), 1);
//!
//! let loops = loop_blocks(&func, &backedges);
//! assert!(loops.contains_key(&1));
//!
//! // `i` only ever receives `n`, so both belong to the same family.
//! let mut families = PhiFamilies::build(&func).into_union_find();
//! let n = func.block(0).unwrap().params()[0];
//! let i = func.block(1).unwrap().params()[0];
//! assert!(families.same_set(&n.into(), &i.into()));
//! ```

pub mod cfg;
pub mod effects;
pub mod families;
pub mod ssa;

// Re-export primary types at module level
pub use cfg::{entry_map, find_backedges, loop_blocks, reachable_blocks, LoopBodies};
pub use effects::{CalleeSummary, EffectAnalyzer, EffectLocation, WriteAnalyzer, WriteEffects};
pub use families::{PhiFamilies, UnionFind};
pub use ssa::{
    ConstValue, FieldRef, Link, LinkId, MethodRef, OpFlags, Opcode, Operand, SsaBlock,
    SsaBlockBuilder, SsaFunction, SsaFunctionBuilder, SsaFunctionContext, SsaOperation, SsaType,
    SsaVarId, SsaVariable, TypeRef,
};
