//! Back-edge detection.

use std::collections::BTreeSet;

use crate::analysis::ssa::{LinkId, SsaFunction};

/// Returns the links that close a cycle in a depth-first traversal from the
/// entry block.
///
/// The traversal is iterative and visits exits in order, so the result is
/// deterministic for a given function. Links into blocks that do not exist are
/// ignored, as are links leaving unreachable blocks.
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::{find_backedges, SsaFunctionBuilder};
///
/// let func = SsaFunctionBuilder::new("loop").build_with(|f| {
///     f.block(0, |b| b.jump(1, vec![]));
///     f.block(1, |b| {
///         b.jump(1, vec![]);
///         b.jump(2, vec![]);
///     });
///     f.block(2, |_| {});
/// });
///
/// let backedges = find_backedges(&func);
/// assert_eq!(backedges.len(), 1);
/// let back = func.link(*backedges.iter().next().unwrap()).unwrap();
/// assert!(back.is_self_loop());
/// ```
#[must_use]
pub fn find_backedges(func: &SsaFunction) -> BTreeSet<LinkId> {
    let count = func.block_count();
    let mut backedges = BTreeSet::new();
    if count == 0 {
        return backedges;
    }

    let mut visited = vec![false; count];
    let mut on_stack = vec![false; count];
    // (block, index of the next exit to examine)
    let mut stack: Vec<(usize, usize)> = vec![(func.entry(), 0)];
    visited[func.entry()] = true;
    on_stack[func.entry()] = true;

    while let Some(frame) = stack.last_mut() {
        let (block, next) = *frame;
        let exits = func.block(block).map_or(&[][..], |b| b.exits());
        let Some(&link_id) = exits.get(next) else {
            on_stack[block] = false;
            stack.pop();
            continue;
        };
        frame.1 += 1;

        let Some(link) = func.link(link_id) else {
            continue;
        };
        let target = link.target;
        if target >= count {
            continue;
        }
        if on_stack[target] {
            backedges.insert(link_id);
        } else if !visited[target] {
            visited[target] = true;
            on_stack[target] = true;
            stack.push((target, 0));
        }
    }

    backedges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ssa::SsaFunctionBuilder;

    #[test]
    fn test_acyclic_has_no_backedges() {
        let func = SsaFunctionBuilder::new("diamond").build_with(|f| {
            f.block(0, |b| {
                b.jump(1, vec![]);
                b.jump(2, vec![]);
            });
            f.block(1, |b| b.jump(3, vec![]));
            f.block(2, |b| b.jump(3, vec![]));
            f.block(3, |_| {});
        });
        assert!(find_backedges(&func).is_empty());
    }

    #[test]
    fn test_nested_loops() {
        let (mut inner, mut outer) = (None, None);
        let func = SsaFunctionBuilder::new("nested").build_with(|f| {
            f.block(0, |b| b.jump(1, vec![]));
            f.block(1, |b| {
                b.jump(2, vec![]);
                b.jump(4, vec![]);
            });
            f.block(2, |b| {
                inner = Some(b.jump(2, vec![]));
                b.jump(3, vec![]);
            });
            f.block(3, |b| outer = Some(b.jump(1, vec![])));
            f.block(4, |_| {});
        });

        let backedges = find_backedges(&func);
        assert_eq!(backedges.len(), 2);
        assert!(backedges.contains(&inner.unwrap()));
        assert!(backedges.contains(&outer.unwrap()));
    }

    #[test]
    fn test_cross_edge_is_not_backedge() {
        // 0 -> 1 -> 3 and 0 -> 2 -> 3: the second edge into 3 finds it visited
        // but no longer on the stack.
        let func = SsaFunctionBuilder::new("cross").build_with(|f| {
            f.block(0, |b| {
                b.jump(1, vec![]);
                b.jump(2, vec![]);
            });
            f.block(1, |b| b.jump(3, vec![]));
            f.block(2, |b| b.jump(3, vec![]));
            f.block(3, |_| {});
        });
        assert!(find_backedges(&func).is_empty());
    }
}
