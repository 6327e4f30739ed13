//! Static Single Assignment (SSA) form for function bodies.
//!
//! A function body is a directed multigraph of blocks connected by links. Blocks
//! declare parameters (the phi targets of SSA form), hold an ordered list of
//! operations and own their outgoing links. Links carry one argument per
//! parameter of their target block, so a block parameter plays the role of a
//! phi node whose operands sit on the incoming links.
//!
//! # Architecture
//!
//! The SSA module is organized into focused sub-modules:
//!
//! - [`variable`] - SSA variable identifiers and metadata
//! - [`types`] - The static type system and metadata handles
//! - [`value`] - Constants and operands
//! - [`ops`] - The closed opcode vocabulary and its static classification
//! - [`operation`] - Operations with explicit operands and results
//! - [`block`] - Blocks: parameters, operations, exits
//! - [`link`] - Control-flow edges carrying phi arguments
//! - [`function`] - A complete function body
//! - [`builder`] - Closure-based programmatic construction
//!
//! # Block Structure
//!
//! ```text
//! B1(v3, v4):                 // parameters, bound by incoming links
//!   v5 = int_add v3, v4
//!   v6 = getfield v5, f2
//!   exits:
//!     -> B2(v6)               // link carrying one argument per B2 parameter
//! ```
//!
//! # References
//!
//! - Cytron et al., "Efficiently Computing Static Single Assignment Form and the
//!   Control Dependence Graph", ACM TOPLAS 1991
//! - Cooper & Torczon, "Engineering a Compiler", Chapter 9

mod block;
mod builder;
mod function;
mod link;
mod operation;
mod ops;
mod types;
mod value;
mod variable;

// Re-export primary types at module level
pub use block::SsaBlock;
pub use builder::{SsaBlockBuilder, SsaFunctionBuilder, SsaFunctionContext};
pub use function::SsaFunction;
pub use link::{Link, LinkId};
pub use operation::SsaOperation;
pub use ops::{OpFlags, Opcode};
pub use types::{FieldRef, MethodRef, SsaType, TypeRef};
pub use value::{ConstValue, Operand};
pub use variable::{SsaVarId, SsaVariable};
