//! Branch simplification / straight-line block merging (`spec.md` §4.4).
//!
//! DFS the CFG, and whenever a block's only successor has no other
//! predecessor, the two blocks are really one straight-line region and
//! get fused.

use crate::common::fx_hash::FxHashSet;
use crate::ir::function::Function;
use crate::ir::ids::{BlockId, InsnId};
use crate::ir::mutator::insn_delete;

/// DFS from entry; merges each block into its sole successor whenever that
/// successor has no other predecessor, until no more merges apply.
pub fn run(f: &mut Function) -> bool {
    let mut changed_overall = false;
    loop {
        let Some((first, second)) = find_mergeable_pair(f) else {
            break;
        };
        merge_blocks(f, first, second);
        changed_overall = true;
    }
    changed_overall
}

fn find_mergeable_pair(f: &Function) -> Option<(BlockId, BlockId)> {
    let mut visited = FxHashSet::default();
    let mut stack = vec![f.entry];
    while let Some(b) = stack.pop() {
        if !visited.insert(b) {
            continue;
        }
        let succs: Vec<BlockId> = f.block(b).succs.iter().copied().collect();
        if succs.len() == 1 {
            let only = succs[0];
            if only != b && f.block(only).preds.len() == 1 {
                return Some((b, only));
            }
        }
        for s in succs {
            stack.push(s);
        }
    }
    None
}

/// Merges `second` into `first`: drops `first`'s terminator, appends
/// `second`'s body (reparented to `first`), adopts `second`'s successor
/// edges, and retires `second`.
///
/// `second` has exactly one predecessor (`first`), so it cannot carry a φ
/// (a φ requires one entry per predecessor, and a single-predecessor block
/// would only ever need a trivial one-entry φ, which `to_ssa`'s pruning
/// never introduces) — there is nothing to rewrite on the way in.
fn merge_blocks(f: &mut Function, first: BlockId, second: BlockId) {
    let old_terminator = f.block(first).terminator.take();
    if let Some(term) = old_terminator {
        insn_delete(f, term);
    }

    let second_insns: Vec<InsnId> = f.block(second).insns.clone();
    let second_terminator = f.block(second).terminator;

    for insn_id in &second_insns {
        reparent(f, *insn_id, first);
        f.block_mut(first).insns.push(*insn_id);
    }
    if let Some(term) = second_terminator {
        reparent(f, term, first);
        f.block_mut(first).terminator = Some(term);
    }

    let second_succs: Vec<BlockId> = f.block(second).succs.iter().copied().collect();
    for succ in second_succs {
        f.block_mut(succ).preds.remove(second);
        f.block_mut(succ).preds.insert(first);
        f.block_mut(first).succs.insert(succ);
    }
    f.block_mut(first).succs.remove(second);

    f.retire_block(second);
}

fn reparent(f: &mut Function, insn_id: InsnId, new_owner: BlockId) {
    f.set_insn_owner(insn_id, new_owner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::mutator::*;
    use crate::ir::{Operand, PrimitiveType};

    #[test]
    fn merges_three_straight_line_blocks() {
        let mut f = Function::new("f");
        let a = f.entry;
        let b = create_block(&mut f, "B");
        let c = create_block(&mut f, "C");
        let va = create_variable(&mut f, "va", PrimitiveType::S32);
        let vb = create_variable(&mut f, "vb", PrimitiveType::S32);
        insn_append_undefined(&mut f, a, va);
        insn_append_jump(&mut f, a, b);
        insn_append_undefined(&mut f, b, vb);
        insn_append_jump(&mut f, b, c);
        insn_append_return(&mut f, c, Some(Operand::Var(va)));

        let changed = run(&mut f);
        assert!(changed);
        assert_eq!(f.block_ids().count(), 1);
        let merged = f.block(a);
        assert_eq!(merged.insns.len(), 2);
        assert!(merged.terminator.is_some());
    }

    #[test]
    fn does_not_merge_when_successor_has_other_predecessors() {
        let mut f = Function::new("f");
        let entry = f.entry;
        let l = create_block(&mut f, "L");
        let r = create_block(&mut f, "R");
        let m = create_block(&mut f, "M");
        let cond = create_variable(&mut f, "cond", PrimitiveType::Bool);
        insn_append_branch(&mut f, entry, Operand::Var(cond), l, r);
        insn_append_jump(&mut f, l, m);
        insn_append_jump(&mut f, r, m);
        insn_append_return(&mut f, m, None);

        let changed = run(&mut f);
        assert!(!changed);
        assert_eq!(f.block_ids().count(), 4);
    }
}
