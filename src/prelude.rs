//! # cseflow Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the cseflow library. Import this module to get quick access to the essential
//! types for building SSA functions and running the CSE pass over them.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cseflow operations
pub use crate::Error;

/// The result type used throughout cseflow
pub use crate::Result;

// ================================================================================================
// SSA Representation
// ================================================================================================

/// Function bodies and their building blocks
pub use crate::analysis::{
    ConstValue, Link, LinkId, OpFlags, Opcode, Operand, SsaBlock, SsaFunction, SsaOperation,
    SsaVarId, SsaVariable,
};

/// Type system and symbolic handles
pub use crate::analysis::{FieldRef, MethodRef, SsaType, TypeRef};

/// Programmatic construction
pub use crate::analysis::SsaFunctionBuilder;

// ================================================================================================
// Analyses
// ================================================================================================

/// Control-flow queries
pub use crate::analysis::{entry_map, find_backedges, loop_blocks};

/// Value equivalence
pub use crate::analysis::{PhiFamilies, UnionFind};

/// Write-effect classification
pub use crate::analysis::{
    CalleeSummary, EffectAnalyzer, EffectLocation, WriteAnalyzer, WriteEffects,
};

// ================================================================================================
// Optimization
// ================================================================================================

/// The common-subexpression elimination pass
pub use crate::compiler::{common_subexpression_elimination, CsePass};

/// Cleanup passes
pub use crate::compiler::{ConstantFoldingPass, CopyPropagationPass, DeadCodeEliminationPass};

/// Pipeline infrastructure
pub use crate::compiler::{CompilerConfig, CompilerContext, PassScheduler, SsaPass};

/// Change tracking
pub use crate::compiler::{EventKind, EventLog};
