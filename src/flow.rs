//! Flow analysis: predecessor/successor recomputation and dominance
//! (`spec.md` §4.2).
//!
//! `compute_dominance` implements the "simple" (non-path-compressed-bucket)
//! form of Lengauer-Tarjan: DFS numbering, semidominators via a
//! path-compressing `eval`, then immediate dominators resolved in forward
//! DFS order, then dominance frontiers from the resulting tree.

use crate::common::bug::bug;
use crate::common::fx_hash::{FxHashMap, FxHashSet};
use crate::ir::{BlockId, Function, FlowInsn, FlowKind, Instruction};

/// Clears every block's predecessor/successor set and reinstates mutual
/// edges from the current terminators. O(instructions).
pub fn recalc_flow(f: &mut Function) {
    let blocks: Vec<BlockId> = f.block_ids().collect();
    for &b in &blocks {
        let block = f.block_mut(b);
        block.preds.clear();
        block.succs.clear();
    }
    for &b in &blocks {
        let Some(term) = f.block(b).terminator else {
            continue;
        };
        let targets = match f.insn(term) {
            Instruction::Flow(FlowInsn { kind }) => match kind {
                FlowKind::Jump { target } => vec![*target],
                FlowKind::Branch {
                    if_true, if_false, ..
                } => vec![*if_true, *if_false],
                _ => vec![],
            },
            _ => vec![],
        };
        for target in targets {
            f.block_mut(b).succs.insert(target);
            f.block_mut(target).preds.insert(b);
        }
    }
}

/// Dominance information for a function: each block's immediate dominator
/// (`None` for the entry block) and dominance frontier set.
#[derive(Debug, Clone, Default)]
pub struct Dominance {
    idom: FxHashMap<BlockId, Option<BlockId>>,
    frontier: FxHashMap<BlockId, Vec<BlockId>>,
}

impl Dominance {
    pub fn immediate_dominator(&self, b: BlockId) -> Option<BlockId> {
        *self
            .idom
            .get(&b)
            .unwrap_or_else(|| bug!("block {} is unreachable from entry", b))
    }

    pub fn frontier(&self, b: BlockId) -> &[BlockId] {
        self.frontier
            .get(&b)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// True if `a` dominates `b` (reflexively: every block dominates
    /// itself).
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if a == b {
            return true;
        }
        let mut cur = self.immediate_dominator(b);
        while let Some(idom) = cur {
            if idom == a {
                return true;
            }
            cur = self.immediate_dominator(idom);
        }
        false
    }
}

struct DfsState {
    order: Vec<BlockId>,
    number: FxHashMap<BlockId, usize>,
    parent: Vec<Option<usize>>,
}

fn dfs(f: &Function, entry: BlockId) -> DfsState {
    let mut order = Vec::new();
    let mut number = FxHashMap::default();
    let mut parent: Vec<Option<usize>> = Vec::new();
    let mut stack = vec![(entry, None)];
    let mut visited = FxHashSet::default();

    while let Some((block, parent_num)) = stack.pop() {
        if visited.contains(&block) {
            continue;
        }
        visited.insert(block);
        let num = order.len();
        number.insert(block, num);
        order.push(block);
        parent.push(parent_num);

        // Push successors in reverse insertion order so the earliest
        // successor is visited first (stack is LIFO).
        for succ in f.block(block).succs.iter().rev().copied().collect::<Vec<_>>() {
            if !visited.contains(&succ) {
                stack.push((succ, Some(num)));
            }
        }
    }

    DfsState {
        order,
        number,
        parent,
    }
}

/// Computes dominator tree and dominance frontiers via Lengauer-Tarjan
/// (simple form), per `spec.md` §4.2.
pub fn compute_dominance(f: &Function) -> Dominance {
    let dfs_state = dfs(f, f.entry);
    let n = dfs_state.order.len();
    if n == 0 {
        return Dominance::default();
    }

    let mut semi: Vec<usize> = (0..n).collect();
    let mut ancestor: Vec<Option<usize>> = vec![None; n];
    let mut label: Vec<usize> = (0..n).collect();
    let mut idom_num: Vec<Option<usize>> = vec![None; n];
    let mut bucket: Vec<Vec<usize>> = vec![Vec::new(); n];

    fn compress(
        v: usize,
        ancestor: &mut [Option<usize>],
        label: &mut [usize],
        semi: &[usize],
    ) {
        let a = match ancestor[v] {
            Some(a) => a,
            None => return,
        };
        if ancestor[a].is_some() {
            compress(a, ancestor, label, semi);
            if semi[label[a]] < semi[label[v]] {
                label[v] = label[a];
            }
            ancestor[v] = ancestor[a];
        }
    }

    fn eval(v: usize, ancestor: &mut [Option<usize>], label: &mut [usize], semi: &[usize]) -> usize {
        if ancestor[v].is_none() {
            return v;
        }
        compress(v, ancestor, label, semi);
        label[v]
    }

    // preds of each block, mapped to DFS numbers, in insertion order.
    let pred_nums = |block: BlockId| -> Vec<usize> {
        f.block(block)
            .preds
            .iter()
            .filter_map(|p| dfs_state.number.get(p).copied())
            .collect()
    };

    for w in (1..n).rev() {
        let w_block = dfs_state.order[w];
        for v in pred_nums(w_block) {
            let u = eval(v, &mut ancestor, &mut label, &semi);
            if semi[u] < semi[w] {
                semi[w] = semi[u];
            }
        }
        bucket[semi[w]].push(w);
        let parent_w = dfs_state.parent[w].expect("non-entry node has a DFS parent");
        ancestor[w] = Some(parent_w);

        let old_bucket = std::mem::take(&mut bucket[parent_w]);
        for v in old_bucket {
            let u = eval(v, &mut ancestor, &mut label, &semi);
            idom_num[v] = Some(if semi[u] < semi[v] { u } else { parent_w });
        }
    }

    for w in 1..n {
        if let Some(idom) = idom_num[w] {
            if idom != semi[w] {
                idom_num[w] = idom_num[idom];
            }
        }
    }

    let mut idom = FxHashMap::default();
    idom.insert(dfs_state.order[0], None);
    for w in 1..n {
        let idom_block = idom_num[w].map(|i| dfs_state.order[i]);
        idom.insert(dfs_state.order[w], idom_block);
    }

    let mut frontier: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
    for &block in &dfs_state.order {
        frontier.insert(block, Vec::new());
    }
    for &b in &dfs_state.order {
        let preds: Vec<BlockId> = f.block(b).preds.iter().copied().collect();
        if preds.len() < 2 {
            continue;
        }
        let idom_b = idom.get(&b).copied().flatten();
        for pred in preds {
            let mut runner = pred;
            loop {
                if Some(runner) == idom_b {
                    break;
                }
                let set = frontier.entry(runner).or_default();
                if !set.contains(&b) {
                    set.push(b);
                }
                match idom.get(&runner).copied().flatten() {
                    Some(next) => runner = next,
                    None => break,
                }
            }
        }
    }

    Dominance { idom, frontier }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::mutator::*;
    use crate::ir::{Operand, PrimitiveType};

    #[test]
    fn recalc_flow_rebuilds_jump_edge() {
        let mut f = Function::new("f");
        let entry = f.entry;
        let exit = create_block(&mut f, "exit");
        insn_append_jump(&mut f, entry, exit);
        f.block_mut(entry).succs.clear();
        f.block_mut(exit).preds.clear();
        recalc_flow(&mut f);
        assert!(f.block(entry).succs.contains(exit));
        assert!(f.block(exit).preds.contains(entry));
    }

    fn diamond() -> (Function, BlockId, BlockId, BlockId, BlockId) {
        let mut f = Function::new("f");
        let entry = f.entry;
        let l = create_block(&mut f, "L");
        let r = create_block(&mut f, "R");
        let m = create_block(&mut f, "M");
        let cond = create_variable(&mut f, "cond", PrimitiveType::Bool);
        insn_append_branch(&mut f, entry, Operand::Var(cond), l, r);
        insn_append_jump(&mut f, l, m);
        insn_append_jump(&mut f, r, m);
        (f, entry, l, r, m)
    }

    #[test]
    fn diamond_dominance() {
        let (f, entry, l, r, m) = diamond();
        let dom = compute_dominance(&f);
        assert_eq!(dom.immediate_dominator(l), Some(entry));
        assert_eq!(dom.immediate_dominator(r), Some(entry));
        assert_eq!(dom.immediate_dominator(m), Some(entry));
        assert!(dom.dominates(entry, m));
        assert!(!dom.dominates(l, m));
    }

    #[test]
    fn diamond_merge_block_is_in_both_branch_frontiers() {
        let (f, _entry, l, r, m) = diamond();
        let dom = compute_dominance(&f);
        assert!(dom.frontier(l).contains(&m));
        assert!(dom.frontier(r).contains(&m));
    }

    #[test]
    fn entry_has_no_immediate_dominator() {
        let (f, entry, ..) = diamond();
        let dom = compute_dominance(&f);
        assert_eq!(dom.immediate_dominator(entry), None);
    }

    #[test]
    fn straight_line_has_no_frontiers() {
        let mut f = Function::new("f");
        let entry = f.entry;
        let next = create_block(&mut f, "next");
        insn_append_jump(&mut f, entry, next);
        let dom = compute_dominance(&f);
        assert!(dom.frontier(entry).is_empty());
        assert!(dom.frontier(next).is_empty());
    }
}
