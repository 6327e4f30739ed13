//! Loop body computation.
//!
//! A loop is identified by its header: a block entered by at least one
//! back-edge. Its body is every block that can be reached from the header
//! without taking a back-edge and from which the source of one of the header's
//! back-edges can be reached again.
//!
//! ```text
//!     [B0]
//!       |
//!       v
//!     [B1] <------+    header
//!      |  \       |
//!      v   v      |
//!    [B2] [B4]    |    B4 leaves the loop
//!      |          |
//!      v          |
//!    [B3] --------+    latch (back-edge source)
//! ```
//!
//! Here the body of `B1` is `{B1, B2, B3}`.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{
    cfg::{entry_map, reachable_blocks},
    ssa::{LinkId, SsaFunction},
};

/// Loop bodies keyed by header block.
pub type LoopBodies = BTreeMap<usize, BTreeSet<usize>>;

/// Computes the body of every loop in the function.
///
/// # Arguments
///
/// * `func` - The function to analyze
/// * `backedges` - The back-edges of the function, see
///   [`find_backedges`](crate::analysis::find_backedges)
///
/// # Returns
///
/// A map from every block entered by a back-edge to the blocks of its loop,
/// the header included.
#[must_use]
pub fn loop_blocks(func: &SsaFunction, backedges: &BTreeSet<LinkId>) -> LoopBodies {
    let entries = entry_map(func);
    let no_avoid = BTreeSet::new();
    let mut full_reach: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    let mut bodies = LoopBodies::new();

    for (&header, incoming) in &entries {
        let latches: BTreeSet<usize> = incoming
            .iter()
            .filter(|id| backedges.contains(*id))
            .filter_map(|id| func.link(*id))
            .map(|link| link.source)
            .collect();
        if latches.is_empty() {
            continue;
        }

        let mut body = BTreeSet::from([header]);
        for block in reachable_blocks(func, header, backedges) {
            let reach = full_reach
                .entry(block)
                .or_insert_with(|| reachable_blocks(func, block, &no_avoid));
            if latches.iter().any(|latch| reach.contains(latch)) {
                body.insert(block);
            }
        }
        bodies.insert(header, body);
    }

    bodies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{cfg::find_backedges, ssa::SsaFunctionBuilder};

    #[test]
    fn test_loop_with_exit() {
        let func = SsaFunctionBuilder::new("loop").build_with(|f| {
            f.block(0, |b| b.jump(1, vec![]));
            f.block(1, |b| {
                b.jump(2, vec![]);
                b.jump(4, vec![]);
            });
            f.block(2, |b| b.jump(3, vec![]));
            f.block(3, |b| b.jump(1, vec![]));
            f.block(4, |_| {});
        });

        let bodies = loop_blocks(&func, &find_backedges(&func));
        assert_eq!(bodies.len(), 1);
        assert_eq!(
            bodies[&1].iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_nested_loops_have_separate_bodies() {
        let func = SsaFunctionBuilder::new("nested").build_with(|f| {
            f.block(0, |b| b.jump(1, vec![]));
            f.block(1, |b| {
                b.jump(2, vec![]);
                b.jump(4, vec![]);
            });
            f.block(2, |b| {
                b.jump(2, vec![]);
                b.jump(3, vec![]);
            });
            f.block(3, |b| b.jump(1, vec![]));
            f.block(4, |_| {});
        });

        let bodies = loop_blocks(&func, &find_backedges(&func));
        assert_eq!(bodies[&1].iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        // B3 reaches B2 again through the outer loop
        assert_eq!(bodies[&2].iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_no_loops() {
        let func = SsaFunctionBuilder::new("line").build_with(|f| {
            f.block(0, |b| b.jump(1, vec![]));
            f.block(1, |_| {});
        });
        assert!(loop_blocks(&func, &find_backedges(&func)).is_empty());
    }
}
