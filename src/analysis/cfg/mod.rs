//! Control-flow helpers over SSA links.
//!
//! The SSA function stores its control-flow graph implicitly: every block lists
//! its outgoing links and every link names its target. This module derives the
//! views the optimization passes need from that representation.
//!
//! # Key Components
//!
//! - [`entry_map`] - incoming links per block
//! - [`find_backedges`] - links closing a cycle in depth-first order
//! - [`reachable_blocks`] - reachability, optionally ignoring some links
//! - [`loop_blocks`] - the body of every loop, keyed by its header
//!
//! # Back-Edges
//!
//! A link is a back-edge if its target is still on the depth-first search
//! stack when the link is examined. Removing all back-edges leaves an acyclic
//! graph, which is what lets the CSE pass visit every block exactly once.
//!
//! # Thread Safety
//!
//! All functions are pure and operate on shared references.

mod backedges;
mod loops;

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::ssa::{LinkId, SsaFunction};

pub use backedges::find_backedges;
pub use loops::{loop_blocks, LoopBodies};

/// Returns the incoming links of every block, in link order.
///
/// Every block of the function has an entry, the entry block usually with an
/// empty list. Links whose target does not exist are ignored.
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::{entry_map, SsaFunctionBuilder};
///
/// let func = SsaFunctionBuilder::new("diamond").build_with(|f| {
///     f.block(0, |b| {
///         b.jump(1, vec![]);
///         b.jump(2, vec![]);
///     });
///     f.block(1, |b| b.jump(3, vec![]));
///     f.block(2, |b| b.jump(3, vec![]));
///     f.block(3, |_| {});
/// });
///
/// let entries = entry_map(&func);
/// assert!(entries[&0].is_empty());
/// assert_eq!(entries[&3].len(), 2);
/// ```
#[must_use]
pub fn entry_map(func: &SsaFunction) -> BTreeMap<usize, Vec<LinkId>> {
    let mut map: BTreeMap<usize, Vec<LinkId>> =
        (0..func.block_count()).map(|id| (id, Vec::new())).collect();
    for link in func.links() {
        if let Some(entries) = map.get_mut(&link.target) {
            entries.push(link.id);
        }
    }
    map
}

/// Returns the blocks reachable from `start`, including `start` itself,
/// without following any link in `avoid`.
#[must_use]
pub fn reachable_blocks(
    func: &SsaFunction,
    start: usize,
    avoid: &BTreeSet<LinkId>,
) -> BTreeSet<usize> {
    let mut reached = BTreeSet::new();
    if func.block(start).is_none() {
        return reached;
    }

    let mut stack = vec![start];
    reached.insert(start);
    while let Some(current) = stack.pop() {
        for link in func.exits_of(current) {
            if avoid.contains(&link.id) || func.block(link.target).is_none() {
                continue;
            }
            if reached.insert(link.target) {
                stack.push(link.target);
            }
        }
    }
    reached
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ssa::SsaFunctionBuilder;

    #[test]
    fn test_reachable_respects_avoid() {
        let mut back = None;
        let func = SsaFunctionBuilder::new("loop").build_with(|f| {
            f.block(0, |b| b.jump(1, vec![]));
            f.block(1, |b| {
                b.jump(2, vec![]);
                b.jump(3, vec![]);
            });
            back = Some(f.block(2, |b| b.jump(1, vec![])));
            f.block(3, |_| {});
        });

        let all = reachable_blocks(&func, 2, &BTreeSet::new());
        assert_eq!(all.into_iter().collect::<Vec<_>>(), vec![1, 2, 3]);

        let avoid: BTreeSet<_> = back.into_iter().collect();
        let forward = reachable_blocks(&func, 2, &avoid);
        assert_eq!(forward.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_reachable_from_missing_block() {
        let func = SsaFunctionBuilder::new("empty").build_with(|f| {
            f.block(0, |_| {});
        });
        assert!(reachable_blocks(&func, 4, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_entry_map_skips_dangling_targets() {
        let func = SsaFunctionBuilder::new("dangling").build_with(|f| {
            f.block(0, |b| b.jump(9, vec![]));
        });
        let entries = entry_map(&func);
        assert_eq!(entries.len(), 1);
        assert!(entries[&0].is_empty());
    }
}
