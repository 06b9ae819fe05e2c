//! Dead-code elimination: unreachable-instruction pruning within blocks and
//! unreachable-block deletion (`spec.md` §4.4).

use crate::common::fx_hash::FxHashSet;
use crate::flow::recalc_flow;
use crate::ir::mutator::{block_delete, insn_append_jump, insn_delete};
use crate::ir::{BlockId, Function, FlowKind, Instruction};

/// DFS from entry; within each reachable block, deletes everything past a
/// terminator that definitionally ends flow, and deletes a branch whose
/// condition is a constant `false` (leaving the block to fall through).
/// Unreached blocks are then deleted wholesale. Runs to an inner fixed
/// point since deleting a block can make others unreachable.
pub fn run(f: &mut Function) -> bool {
    let mut changed_overall = false;
    loop {
        let mut changed_this_round = false;

        let reachable = reachable_blocks(f);
        for &b in &reachable {
            if prune_block(f, b) {
                changed_this_round = true;
            }
        }

        let unreached: Vec<BlockId> = f.block_ids().filter(|b| !reachable.contains(b)).collect();
        for b in unreached {
            if f.block_exists(b) {
                block_delete(f, b);
                changed_this_round = true;
            }
        }

        if changed_this_round {
            recalc_flow(f);
            changed_overall = true;
        } else {
            break;
        }
    }
    changed_overall
}

fn reachable_blocks(f: &Function) -> FxHashSet<BlockId> {
    let mut visited = FxHashSet::default();
    let mut stack = vec![f.entry];
    while let Some(b) = stack.pop() {
        if !visited.insert(b) {
            continue;
        }
        for succ in f.block(b).succs.iter().copied() {
            if !visited.contains(&succ) {
                stack.push(succ);
            }
        }
    }
    visited
}

/// Returns true if anything in `b` was deleted.
///
/// A constant-false branch is replaced by an unconditional jump to its
/// false target: this IR tracks both branch targets explicitly (unlike a
/// textual "fall through to the next block" scheme), so the deleted
/// branch's edge has to be made explicit rather than implied by block
/// order. Everything after a terminator that definitionally ends flow
/// (jump, return, or a constant-true branch) would be dead, but the block
/// invariant already guarantees nothing ever follows a terminator, so
/// there is nothing left to prune there.
fn prune_block(f: &mut Function, b: BlockId) -> bool {
    let Some(term) = f.block(b).terminator else {
        return false;
    };
    let Instruction::Flow(flow_insn) = f.insn(term) else {
        return false;
    };
    let FlowKind::Branch {
        cond, if_false, ..
    } = &flow_insn.kind
    else {
        return false;
    };
    let Some(c) = cond.as_const() else {
        return false;
    };
    if c.as_bool() {
        return false;
    }
    let if_false = *if_false;
    insn_delete(f, term);
    insn_append_jump(f, b, if_false);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::mutator::*;
    use crate::ir::{Const, FlowInsn, Operand, PrimitiveType};

    #[test]
    fn deletes_unreachable_block() {
        let mut f = Function::new("f");
        let entry = f.entry;
        let reachable = create_block(&mut f, "reachable");
        let dead = create_block(&mut f, "dead");
        insn_append_jump(&mut f, entry, reachable);
        insn_append_return(&mut f, reachable, None);
        insn_append_return(&mut f, dead, None);

        let changed = run(&mut f);
        assert!(changed);
        assert!(!f.block_exists(dead));
        assert!(f.block_exists(reachable));
    }

    #[test]
    fn removes_constant_false_branch() {
        let mut f = Function::new("f");
        let entry = f.entry;
        let tgt = create_block(&mut f, "tgt");
        let end = create_block(&mut f, "end");
        insn_append_branch(
            &mut f,
            entry,
            Operand::Const(Const::bool(false)),
            tgt,
            end,
        );
        insn_append_return(&mut f, tgt, None);
        insn_append_return(&mut f, end, None);

        run(&mut f);
        // the branch is replaced by an explicit jump to its false target
        let term = f.block(entry).terminator.unwrap();
        match f.insn(term) {
            Instruction::Flow(FlowInsn {
                kind: FlowKind::Jump { target },
            }) => assert_eq!(*target, end),
            _ => panic!("expected jump"),
        }
        assert!(!f.block_exists(tgt));
        assert!(f.block_exists(end));
    }

    #[test]
    fn is_idempotent_on_already_minimal_program() {
        let mut f = Function::new("f");
        let entry = f.entry;
        insn_append_return(&mut f, entry, None);
        run(&mut f);
        let before = f.block_ids().count();
        run(&mut f);
        assert_eq!(before, f.block_ids().count());
        assert_eq!(before, 1);
    }
}
