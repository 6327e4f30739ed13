// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![deny(unsafe_code)]

//! # cseflow
//!
//! Global common-subexpression elimination (CSE) over a function body in
//! static-single-assignment form.
//!
//! The pass walks the control-flow graph in an order where every block is
//! visited after all of its forward predecessors, threads a *value cache*
//! along the edges and rewrites operations whose result is already known into
//! trivial aliases. Two caches travel together:
//!
//! - the **pure cache** remembers foldable computations keyed by opcode,
//!   result type and the representatives of their arguments;
//! - the **heap cache** remembers the current content of heap locations
//!   (object fields and array items) keyed by the representative base value.
//!
//! At join points the caches of all predecessors are merged, synthesizing new
//! block parameters where each predecessor knows the value under a different
//! name. Loop headers drop every heap entry the loop body may overwrite.
//!
//! ## Quick Start
//!
//! ```rust
//! use cseflow::prelude::*;
//!
//! let mut func = SsaFunctionBuilder::new("sum").build_with(|f| {
//!     f.block(0, |b| {
//!         let a = b.param(SsaType::I64);
//!         let c = b.param(SsaType::I64);
//!         let first = b.int_add(a, c);
//!         let second = b.int_add(a, c);
//!         let total = b.int_mul(first, second);
//!         b.jump(1, vec![total.into()]);
//!     });
//!     f.block(1, |b| {
//!         b.param(SsaType::I64);
//!     });
//! });
//!
//! let analyzer = WriteAnalyzer::new();
//! let removed = CsePass::transform(&mut func, &analyzer)?;
//! assert_eq!(removed, 1);
//! # Ok::<(), cseflow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`analysis`] - the SSA IR, control-flow helpers, phi families and effects
//! - [`compiler`] - the pass infrastructure, the CSE pass and its cleanup passes
//! - [`Error`] and [`Result`] - error handling
//!
//! ## Error Handling
//!
//! The pass has no recoverable failure modes. Malformed input graphs and
//! broken collaborator contracts surface as [`Error`] values and leave the
//! input function untouched:
//!
//! ```rust
//! use cseflow::{prelude::*, Error};
//!
//! let mut func = SsaFunctionBuilder::new("broken").build_with(|f| {
//!     f.block(0, |b| b.jump(1, vec![]));
//!     f.block(1, |b| {
//!         b.param(SsaType::I64);
//!     });
//! });
//!
//! match CsePass::transform(&mut func, &WriteAnalyzer::new()) {
//!     Err(Error::ArityMismatch { .. }) => {}
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust
/// use cseflow::prelude::*;
///
/// let analyzer = WriteAnalyzer::new();
/// assert!(analyzer.is_empty());
/// ```
pub mod prelude;

/// SSA intermediate representation and the analyses the CSE pass consumes.
///
/// # Key Types
///
/// - [`analysis::SsaFunction`] - a function body: blocks, links and variables
/// - [`analysis::SsaOperation`] - one operation with explicit operands
/// - [`analysis::UnionFind`] / [`analysis::PhiFamilies`] - value equivalence
/// - [`analysis::EffectAnalyzer`] - write-effect classification
pub mod analysis;

/// Pass infrastructure and the optimization passes.
///
/// # Key Types
///
/// - [`compiler::CsePass`] - the global common-subexpression elimination pass
/// - [`compiler::SsaPass`] - interface shared by all passes
/// - [`compiler::PassScheduler`] - runs passes over every function to a fixpoint
/// - [`compiler::EventLog`] - change tracking and diagnostics
pub mod compiler;

pub use error::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
