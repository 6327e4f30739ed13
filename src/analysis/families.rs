//! Value equivalence: union-find and phi families.
//!
//! Two SSA values belong to the same *family* when they provably hold the same
//! value wherever both are visible. The CSE pass looks values up through their
//! family representative so that a computation on a block parameter collides
//! with the same computation on the value the parameter was bound to.
//!
//! Families come from two sources:
//!
//! - [`PhiFamilies`] computes them before the pass: a parameter that receives
//!   the same family on every incoming link (ignoring links that pass the
//!   parameter back to itself) joins that family.
//! - The pass itself extends them with aliases it discovers, such as a pointer
//!   cast and its argument.
//!
//! Both live in one [`UnionFind`] that the pass owns for its whole run.
//!
//! # References
//!
//! - Tarjan, R. E. "Efficiency of a Good But Not Linear Set Union Algorithm" (1975)

use std::{collections::HashMap, hash::Hash};

use crate::analysis::{
    cfg::entry_map,
    ssa::{Operand, SsaFunction},
};

/// Union-find over arbitrary hashable values with path compression and union
/// by rank.
///
/// Elements are registered lazily: querying an unknown element returns the
/// element itself without storing it.
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::UnionFind;
///
/// let mut uf = UnionFind::new();
/// uf.union(&"a", &"b");
/// uf.union(&"b", &"c");
///
/// assert!(uf.same_set(&"a", &"c"));
/// assert!(!uf.same_set(&"a", &"d"));
/// assert_eq!(uf.find(&"d"), "d");
/// ```
#[derive(Debug, Clone)]
pub struct UnionFind<T> {
    /// Element to slot
    index: HashMap<T, usize>,
    /// Slot to element
    elements: Vec<T>,
    /// Parent pointers (self-loop = root)
    parent: Vec<usize>,
    /// Rank (tree height upper bound) for union by rank
    rank: Vec<u8>,
    /// Number of disjoint sets among registered elements
    set_count: usize,
}

impl<T> Default for UnionFind<T>
where
    T: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> UnionFind<T>
where
    T: Clone + Eq + Hash,
{
    /// Creates an empty union-find.
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            elements: Vec::new(),
            parent: Vec::new(),
            rank: Vec::new(),
            set_count: 0,
        }
    }

    fn slot(&mut self, x: &T) -> usize {
        if let Some(&slot) = self.index.get(x) {
            return slot;
        }
        let slot = self.elements.len();
        self.index.insert(x.clone(), slot);
        self.elements.push(x.clone());
        self.parent.push(slot);
        self.rank.push(0);
        self.set_count += 1;
        slot
    }

    fn find_slot(&mut self, slot: usize) -> usize {
        let mut root = slot;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut current = slot;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Returns the representative of `x`'s set.
    ///
    /// Idempotent: the representative of a representative is itself.
    pub fn find(&mut self, x: &T) -> T {
        match self.index.get(x) {
            Some(&slot) => {
                let root = self.find_slot(slot);
                self.elements[root].clone()
            }
            None => x.clone(),
        }
    }

    /// Merges the sets of `a` and `b` and returns the new representative.
    ///
    /// On equal rank the representative of `b` becomes the representative of
    /// the merged set.
    pub fn union(&mut self, a: &T, b: &T) -> T {
        let slot_a = self.slot(a);
        let slot_b = self.slot(b);
        let root_a = self.find_slot(slot_a);
        let root_b = self.find_slot(slot_b);
        if root_a == root_b {
            return self.elements[root_a].clone();
        }

        let new_root = if self.rank[root_a] > self.rank[root_b] {
            self.parent[root_b] = root_a;
            root_a
        } else {
            self.parent[root_a] = root_b;
            if self.rank[root_a] == self.rank[root_b] {
                self.rank[root_b] += 1;
            }
            root_b
        };

        self.set_count -= 1;
        self.elements[new_root].clone()
    }

    /// Returns `true` if `a` and `b` are in the same set.
    pub fn same_set(&mut self, a: &T, b: &T) -> bool {
        a == b || self.find(a) == self.find(b)
    }

    /// Returns the number of registered elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns `true` if no element has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the number of disjoint sets among registered elements.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.set_count
    }
}

/// Phi-equivalence classes of a function.
///
/// Built by iterating to a fixpoint: whenever every incoming link of a block
/// passes the same family to a parameter (links passing the parameter's own
/// family are ignored), the parameter joins that family. Constants take part,
/// so a parameter that always receives `0` joins the family of the constant.
#[derive(Debug, Clone, Default)]
pub struct PhiFamilies {
    union_find: UnionFind<Operand>,
}

impl PhiFamilies {
    /// Computes the phi families of `func`.
    ///
    /// Links with the wrong number of arguments are skipped; validate the
    /// function first to reject them.
    #[must_use]
    pub fn build(func: &SsaFunction) -> Self {
        let entries = entry_map(func);
        let mut uf = UnionFind::new();

        let mut changed = true;
        while changed {
            changed = false;
            for block in func.blocks() {
                let Some(incoming) = entries.get(&block.id()) else {
                    continue;
                };
                if incoming.is_empty() {
                    continue;
                }

                for (index, &param) in block.params().iter().enumerate() {
                    let param = Operand::Var(param);
                    let param_rep = uf.find(&param);
                    let mut family: Option<Operand> = None;
                    let mut agree = true;

                    for link in incoming.iter().filter_map(|id| func.link(*id)) {
                        let Some(arg) = link.args.get(index) else {
                            agree = false;
                            break;
                        };
                        let rep = uf.find(arg);
                        if rep == param_rep {
                            continue;
                        }
                        match &family {
                            None => family = Some(rep),
                            Some(existing) if *existing == rep => {}
                            Some(_) => {
                                agree = false;
                                break;
                            }
                        }
                    }

                    if let (true, Some(value)) = (agree, family) {
                        uf.union(&param, &value);
                        changed = true;
                    }
                }
            }
        }

        Self { union_find: uf }
    }

    /// Consumes the families, returning the underlying union-find so a pass can
    /// extend it.
    #[must_use]
    pub fn into_union_find(self) -> UnionFind<Operand> {
        self.union_find
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ssa::{ConstValue, SsaFunctionBuilder, SsaType};

    #[test]
    fn test_union_find_idempotent_and_transitive() {
        let mut uf = UnionFind::new();
        uf.union(&1, &2);
        uf.union(&3, &4);
        assert_eq!(uf.set_count(), 2);
        uf.union(&2, &3);
        assert_eq!(uf.set_count(), 1);

        let rep = uf.find(&1);
        assert_eq!(uf.find(&rep), rep);
        for x in 1..=4 {
            assert_eq!(uf.find(&x), rep);
        }
        assert_eq!(uf.len(), 4);
    }

    #[test]
    fn test_union_returns_representative() {
        let mut uf = UnionFind::new();
        let rep = uf.union(&"x", &"y");
        assert_eq!(rep, "y");
        assert_eq!(uf.find(&"x"), "y");
    }

    #[test]
    fn test_unknown_element_is_its_own_representative() {
        let mut uf: UnionFind<u32> = UnionFind::new();
        assert_eq!(uf.find(&7), 7);
        assert!(uf.is_empty());
    }

    #[test]
    fn test_families_join_differing_inputs_stay_apart() {
        let (mut x, mut y, mut p) = (None, None, None);
        let func = SsaFunctionBuilder::new("join").build_with(|f| {
            f.block(0, |b| {
                let v = b.param(SsaType::I64);
                let w = b.param(SsaType::I64);
                x = Some(v);
                y = Some(w);
                b.jump(1, vec![v.into()]);
                b.jump(2, vec![w.into()]);
            });
            f.block(1, |b| {
                let a = b.param(SsaType::I64);
                b.jump(3, vec![a.into()]);
            });
            f.block(2, |b| {
                let a = b.param(SsaType::I64);
                b.jump(3, vec![a.into()]);
            });
            p = Some(f.block(3, |b| b.param(SsaType::I64)));
        });

        let mut families = PhiFamilies::build(&func).into_union_find();
        let (x, y, p) = (x.unwrap(), y.unwrap(), p.unwrap());
        let b1 = func.block(1).unwrap().params()[0];
        assert!(families.same_set(&b1.into(), &x.into()));
        assert!(!families.same_set(&p.into(), &x.into()));
        assert!(!families.same_set(&p.into(), &y.into()));
    }

    #[test]
    fn test_families_include_constants() {
        let func = SsaFunctionBuilder::new("consts").build_with(|f| {
            f.block(0, |b| {
                b.jump(1, vec![ConstValue::I64(0).into()]);
                b.jump(2, vec![ConstValue::I64(0).into()]);
            });
            f.block(1, |b| b.jump(3, vec![ConstValue::I64(0).into()]));
            f.block(2, |b| b.jump(3, vec![ConstValue::I64(0).into()]));
            f.block(3, |b| {
                b.param(SsaType::I64);
            });
        });

        let mut families = PhiFamilies::build(&func).into_union_find();
        let p = func.block(3).unwrap().params()[0];
        assert!(families.same_set(&p.into(), &ConstValue::I64(0).into()));
    }
}
