//! Representative resolution for cache keys.

use crate::analysis::{Operand, PhiFamilies, UnionFind};

/// The single equivalence structure of one CSE invocation.
///
/// Seeded with the phi families of the function and extended with every alias
/// the pass discovers: casts and the rewritten operations. Unions are never
/// undone.
///
/// Representatives are only ever used to build cache keys. Values placed into
/// the graph are always the original operands.
#[derive(Debug, Clone, Default)]
pub struct Representatives {
    unions: UnionFind<Operand>,
}

impl Representatives {
    /// Creates a resolver seeded with `families`.
    #[must_use]
    pub fn new(families: PhiFamilies) -> Self {
        Self {
            unions: families.into_union_find(),
        }
    }

    /// Returns the representative of `operand`.
    pub fn of(&mut self, operand: &Operand) -> Operand {
        self.unions.find(operand)
    }

    /// Returns the representatives of `operands`, in order.
    pub fn of_all(&mut self, operands: &[Operand]) -> Vec<Operand> {
        operands.iter().map(|operand| self.of(operand)).collect()
    }

    /// Returns `true` if both operands share a representative.
    pub fn same(&mut self, a: &Operand, b: &Operand) -> bool {
        self.unions.same_set(a, b)
    }

    /// Records that `a` and `b` hold the same value.
    ///
    /// Pass the existing value as `b`: on equal rank its representative is
    /// kept, so keys already in a cache stay valid.
    pub fn union(&mut self, a: &Operand, b: &Operand) {
        self.unions.union(a, b);
    }
}
