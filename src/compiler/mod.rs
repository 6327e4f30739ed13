//! Compiler infrastructure for SSA-based optimization.
//!
//! This module sits on top of [`crate::analysis`], which provides the SSA
//! representation, CFG queries, phi families and write-effect analysis.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Compiler Pipeline                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext              Shared state                       │
//! │    ├─ SSA functions           (per-function bodies)              │
//! │    ├─ EffectAnalyzer          (shared, read-only)                │
//! │    ├─ CompilerConfig                                             │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  PassScheduler               Fixpoint execution                  │
//! │    ├─ Main passes             (CSE)                              │
//! │    └─ Normalize passes        (copy prop, folding, DCE)          │
//! │    Each iteration: run → normalize → repeat until stable         │
//! │                                                                  │
//! │  SsaPass trait               Interface for all passes            │
//! │    ├─ run_on_method()         Per-function transformation        │
//! │    ├─ initialize()            One-time setup before a run        │
//! │    └─ finalize()              Cleanup after a run completes      │
//! │                                                                  │
//! │  CsePass                     Global common-subexpression elim.   │
//! │    ├─ Cache                   Pure and heap knowledge per block  │
//! │    ├─ Merge                   Join caches, synthesize params     │
//! │    ├─ LoopInvalidator         Forget loop-written heap entries   │
//! │    └─ BlockEliminator         Rewrite redundant operations       │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Functions are independent of each other, so the scheduler processes them
//! in parallel unless [`CompilerConfig::parallel`] is off.

mod config;
mod context;
mod events;
mod pass;
mod passes;
mod scheduler;

pub use config::CompilerConfig;
pub use context::CompilerContext;
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::SsaPass;
pub use passes::{
    common_subexpression_elimination, Cache, ConstantFoldingPass, CopyPropagationPass, CsePass,
    DeadCodeEliminationPass, HeapDescriptor, HeapKey, PureKey, Representatives,
};
pub use scheduler::PassScheduler;
