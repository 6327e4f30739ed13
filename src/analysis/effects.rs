//! Write-effect classification.
//!
//! An effect analyzer answers one question for the CSE pass: which abstract heap
//! locations may this operation write? The answer is a [`WriteEffects`] value,
//! either a finite set of [`EffectLocation`]s or the distinguished *top* effect
//! meaning "anything".
//!
//! # Soundness
//!
//! Analyzers must over-approximate. Reporting too few locations lets the pass
//! reuse a heap value after it was overwritten, which miscompiles the program.
//! Reporting too many only costs optimization opportunities.
//!
//! # Locations
//!
//! Locations are type based. A field location names the struct type owning the
//! field and the field itself; every object of that type shares it. An array
//! location names the array type; every item of every array of that type
//! shares it, since any two indices may be equal.
//!
//! # Thread Safety
//!
//! [`EffectAnalyzer`] requires `Send + Sync` so a single analyzer can serve
//! functions optimized in parallel. [`WriteAnalyzer`] keeps its callee
//! summaries in a [`DashMap`] and may be extended while in use.

use std::{collections::BTreeSet, fmt};

use dashmap::DashMap;

use crate::analysis::ssa::{FieldRef, MethodRef, Opcode, SsaFunction, SsaOperation, SsaType};

/// An abstract heap location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectLocation {
    /// A field of every object of the owner type.
    Field(SsaType, FieldRef),
    /// Every item of every array of the given array type.
    ArrayItems(SsaType),
}

impl fmt::Display for EffectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(owner, field) => write!(f, "{owner}.{field}"),
            Self::ArrayItems(array) => write!(f, "{array}[*]"),
        }
    }
}

/// The locations an operation may write.
///
/// Forms a lattice with the empty set as bottom, set union as join and
/// [`WriteEffects::Top`] as the absorbing top element.
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::{EffectLocation, FieldRef, SsaType, TypeRef, WriteEffects};
///
/// let node = SsaType::Object(TypeRef::new(1));
/// let next = EffectLocation::Field(node.clone(), FieldRef::new(0));
/// let items = EffectLocation::ArrayItems(SsaType::Array(Box::new(SsaType::I64)));
///
/// let joined = WriteEffects::single(next.clone()).join(WriteEffects::single(items.clone()));
/// assert!(joined.contains(&next) && joined.contains(&items));
///
/// assert!(WriteEffects::Top.join(WriteEffects::bottom()).is_top());
/// assert!(WriteEffects::Top.contains(&next));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteEffects {
    /// May write any location.
    Top,
    /// May write exactly these locations.
    Locations(BTreeSet<EffectLocation>),
}

impl WriteEffects {
    /// The empty effect.
    #[must_use]
    pub fn bottom() -> Self {
        Self::Locations(BTreeSet::new())
    }

    /// An effect writing a single location.
    #[must_use]
    pub fn single(location: EffectLocation) -> Self {
        Self::Locations(BTreeSet::from([location]))
    }

    /// Returns `true` for the top effect.
    #[must_use]
    pub const fn is_top(&self) -> bool {
        matches!(self, Self::Top)
    }

    /// Returns `true` for the empty effect.
    #[must_use]
    pub fn is_bottom(&self) -> bool {
        matches!(self, Self::Locations(set) if set.is_empty())
    }

    /// Returns `true` if the effect may write `location`.
    #[must_use]
    pub fn contains(&self, location: &EffectLocation) -> bool {
        match self {
            Self::Top => true,
            Self::Locations(set) => set.contains(location),
        }
    }

    /// Returns the least upper bound of both effects.
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        match (self, other) {
            (Self::Top, _) | (_, Self::Top) => Self::Top,
            (Self::Locations(mut a), Self::Locations(b)) => {
                a.extend(b);
                Self::Locations(a)
            }
        }
    }
}

impl Default for WriteEffects {
    fn default() -> Self {
        Self::bottom()
    }
}

/// Classifies the heap writes of operations.
///
/// Implementations must be conservative; see the module documentation.
pub trait EffectAnalyzer: Send + Sync {
    /// Returns the locations `op` may write.
    ///
    /// `func` is the function containing `op`; it provides the types of the
    /// operands.
    fn effects_of(&self, func: &SsaFunction, op: &SsaOperation) -> WriteEffects;

    /// Returns the empty effect.
    fn bottom(&self) -> WriteEffects {
        WriteEffects::bottom()
    }

    /// Joins two effects.
    fn join(&self, a: WriteEffects, b: WriteEffects) -> WriteEffects {
        a.join(b)
    }

    /// Returns `true` if `effects` means "may write anything".
    fn is_unknown(&self, effects: &WriteEffects) -> bool {
        effects.is_top()
    }
}

/// The write effects of a callee, summarized over its whole body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CalleeSummary {
    effects: WriteEffects,
}

impl CalleeSummary {
    /// Creates a summary from the callee's write effects.
    #[must_use]
    pub fn new(effects: WriteEffects) -> Self {
        Self { effects }
    }

    /// A summary for a callee that writes nothing.
    #[must_use]
    pub fn pure() -> Self {
        Self::default()
    }

    /// Returns the callee's write effects.
    #[must_use]
    pub fn effects(&self) -> &WriteEffects {
        &self.effects
    }
}

/// The default effect analyzer.
///
/// | Operation        | Effect                                         |
/// |------------------|------------------------------------------------|
/// | `set_field`      | the field of the base's type                   |
/// | `set_array_item` | the items of the array's type                  |
/// | `direct_call`    | the callee's registered summary, else top      |
/// | `indirect_call`  | top                                            |
/// | anything else    | nothing                                        |
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::{CalleeSummary, MethodRef, WriteAnalyzer};
///
/// let analyzer = WriteAnalyzer::new();
/// analyzer.register(MethodRef::new(1), CalleeSummary::pure());
/// assert_eq!(analyzer.len(), 1);
/// assert!(analyzer.summary(MethodRef::new(2)).is_none());
/// ```
#[derive(Debug, Default)]
pub struct WriteAnalyzer {
    summaries: DashMap<MethodRef, CalleeSummary>,
}

impl WriteAnalyzer {
    /// Creates an analyzer without callee summaries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the summary of `method`.
    pub fn register(&self, method: MethodRef, summary: CalleeSummary) {
        self.summaries.insert(method, summary);
    }

    /// Returns the summary of `method`, if registered.
    #[must_use]
    pub fn summary(&self, method: MethodRef) -> Option<CalleeSummary> {
        self.summaries.get(&method).map(|entry| entry.value().clone())
    }

    /// Returns the number of registered summaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    /// Returns `true` if no summary is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }

    fn base_type(func: &SsaFunction, op: &SsaOperation) -> SsaType {
        op.arg(0)
            .and_then(|base| func.operand_type(base))
            .unwrap_or(SsaType::Unknown)
    }
}

impl EffectAnalyzer for WriteAnalyzer {
    fn effects_of(&self, func: &SsaFunction, op: &SsaOperation) -> WriteEffects {
        match op.opcode() {
            Opcode::SetField | Opcode::WriteBarrierField => {
                match op.arg(1).and_then(|f| f.as_const()).and_then(|c| c.as_field()) {
                    Some(field) => {
                        WriteEffects::single(EffectLocation::Field(Self::base_type(func, op), field))
                    }
                    None => WriteEffects::Top,
                }
            }
            Opcode::SetArrayItem => {
                WriteEffects::single(EffectLocation::ArrayItems(Self::base_type(func, op)))
            }
            Opcode::DirectCall => match op.callee() {
                Some((method, _)) => self
                    .summary(method)
                    .map_or(WriteEffects::Top, |summary| summary.effects().clone()),
                None => WriteEffects::Top,
            },
            Opcode::IndirectCall => WriteEffects::Top,
            _ => WriteEffects::bottom(),
        }
    }
}
