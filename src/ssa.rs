//! SSA construction: dominance-frontier-directed φ-insertion with
//! use-pruning, followed by DFS renaming (`spec.md` §4.3).

use crate::common::fx_hash::{FxHashMap, FxHashSet};
use crate::flow::{compute_dominance, Dominance};
use crate::ir::mutator::{self};
use crate::ir::{BlockId, Const, Function, InsnId, Operand, VarId};

/// Converts `function` to SSA form in place. A no-op if the SSA flag is
/// already set.
pub fn to_ssa(function: &mut Function) {
    if function.ssa_flag {
        return;
    }

    let dominance = compute_dominance(function);
    let variables: Vec<VarId> = function.variable_ids().collect();

    for v in variables {
        to_ssa_one_variable(function, &dominance, v);
    }

    function.ssa_flag = true;
}

fn blocks_using(function: &Function, v: VarId) -> FxHashSet<BlockId> {
    let mut using = FxHashSet::default();
    for insn_id in function.variable(v).uses.iter().copied() {
        using.insert(function.insn_owner(insn_id));
    }
    using
}

/// A block "uses `v`" for φ-insertion purposes if it, or any block reachable
/// from it through the CFG, reads `v` (`spec.md` §4.3: "propagated through
/// successors"). Computed as the set of blocks that can reach a direct user
/// of `v` by walking predecessor edges from each direct user.
fn propagate_uses_through_predecessors(function: &Function, direct_users: &FxHashSet<BlockId>) -> FxHashSet<BlockId> {
    let mut uses_transitively: FxHashSet<BlockId> = direct_users.clone();
    let mut stack: Vec<BlockId> = direct_users.iter().copied().collect();
    while let Some(b) = stack.pop() {
        for pred in function.block(b).preds.iter().copied() {
            if uses_transitively.insert(pred) {
                stack.push(pred);
            }
        }
    }
    uses_transitively
}

fn blocks_assigning(function: &Function, v: VarId) -> FxHashSet<BlockId> {
    function
        .variable(v)
        .defs
        .iter()
        .map(|&insn_id| function.insn_owner(insn_id))
        .collect()
}

fn to_ssa_one_variable(function: &mut Function, dominance: &Dominance, v: VarId) {
    let direct_users = blocks_using(function, v);
    if direct_users.is_empty() {
        return;
    }
    let reading = propagate_uses_through_predecessors(function, &direct_users);

    let assigning = blocks_assigning(function, v);
    if assigning.is_empty() {
        return;
    }

    let mut has_phi: FxHashSet<BlockId> = FxHashSet::default();
    let mut worklist: Vec<BlockId> = Vec::new();
    for &b in &assigning {
        for &df in dominance.frontier(b) {
            worklist.push(df);
        }
    }

    let mut seen_in_worklist: FxHashSet<BlockId> = worklist.iter().copied().collect();
    while let Some(b) = worklist.pop() {
        seen_in_worklist.remove(&b);
        if !reading.contains(&b) || has_phi.contains(&b) {
            continue;
        }
        insert_phi(function, b, v);
        has_phi.insert(b);
        for &df in dominance.frontier(b) {
            if seen_in_worklist.insert(df) {
                worklist.push(df);
            }
        }
    }

    rename(function, dominance, v, has_phi);
}

fn insert_phi(function: &mut Function, block: BlockId, v: VarId) {
    let ty = function.variable(v).ty;
    let preds: Vec<BlockId> = function.block(block).preds.iter().copied().collect();
    let zero = Const::u128(ty, 0);
    let entries: Vec<(BlockId, Operand)> = preds
        .into_iter()
        .map(|p| (p, Operand::Const(zero)))
        .collect();
    mutator::insn_append_phi(function, block, v, entries);
}

/// Per-variable renaming state threaded through the DFS.
struct Renamer {
    /// Current reaching definition of `v` at the point of the walk.
    current: Operand,
    /// Destinations of fresh variables minted during this variable's
    /// renaming pass (`spec.md` §4.3: "φ-descendant set").
    descendants: FxHashSet<VarId>,
    /// Blocks whose φ-for-`v` still needs its entry swung to the walker's
    /// current definition, along with the φ's instruction id.
    phi_of: FxHashMap<BlockId, InsnId>,
}

fn rename(function: &mut Function, dominance: &Dominance, v: VarId, phi_blocks: FxHashSet<BlockId>) {
    let mut phi_of = FxHashMap::default();
    for &b in &phi_blocks {
        for &insn_id in &function.block(b).insns.clone() {
            if matches!(
                function.insn(insn_id),
                crate::ir::Instruction::Expr(crate::ir::ExprInsn {
                    kind: crate::ir::ExprKind::Phi(_),
                    dest,
                }) if *dest == v
            ) {
                phi_of.insert(b, insn_id);
            }
        }
    }

    let mut state = Renamer {
        current: Operand::Var(v),
        descendants: FxHashSet::default(),
        phi_of,
    };
    state.descendants.insert(v);

    let entry = function.entry;
    rename_block(function, dominance, v, entry, &mut state);
}

fn rename_block(
    function: &mut Function,
    dominance: &Dominance,
    v: VarId,
    block: BlockId,
    state: &mut Renamer,
) {
    let saved_current = state.current;

    if let Some(&phi_insn) = state.phi_of.get(&block) {
        // The φ itself defines a fresh name for v in this block; its body
        // was seeded with a placeholder entry at insertion time, so treat
        // it as the reaching definition from here down without rewriting
        // its own operands.
        let dest = match function.insn(phi_insn) {
            crate::ir::Instruction::Expr(e) => e.dest,
            _ => unreachable!(),
        };
        state.current = Operand::Var(dest);
        state.descendants.insert(dest);
    }

    let insns: Vec<InsnId> = function.block(block).insns.clone();
    for insn_id in insns {
        if Some(insn_id) == state.phi_of.get(&block).copied() {
            continue;
        }
        rewrite_uses(function, insn_id, v, state.current);

        if let Some(dest) = function.insn(insn_id).dest() {
            if dest == v {
                let fresh = mutator::create_anonymous_variable(function, function.variable(v).ty);
                swing_def(function, insn_id, v, fresh);
                state.current = Operand::Var(fresh);
                state.descendants.insert(fresh);
            }
        }
    }
    if let Some(term) = function.block(block).terminator {
        rewrite_uses(function, term, v, state.current);
    }

    for succ in function.block(block).succs.iter().copied().collect::<Vec<_>>() {
        if let Some(&phi_insn) = state.phi_of.get(&succ) {
            swing_phi_entry(function, phi_insn, block, state.current, &state.descendants);
        }
    }

    let dominated_children: Vec<BlockId> = function
        .block_ids()
        .filter(|&b| dominance.immediate_dominator(b) == Some(block))
        .collect();
    for child in dominated_children {
        rename_block(function, dominance, v, child, state);
    }

    state.current = saved_current;
}

fn rewrite_uses(function: &mut Function, insn_id: InsnId, v: VarId, replacement: Operand) {
    let mut touched = false;
    for slot in function.insn_mut(insn_id).operands_mut() {
        if slot.as_var() == Some(v) {
            *slot = replacement;
            touched = true;
        }
    }
    if touched {
        function.variable_mut(v).uses.remove(&insn_id);
        if let Operand::Var(new_v) = replacement {
            function.variable_mut(new_v).uses.insert(insn_id);
        }
    }
}

fn swing_def(function: &mut Function, insn_id: InsnId, old_dest: VarId, fresh: VarId) {
    match function.insn_mut(insn_id) {
        crate::ir::Instruction::Expr(e) => e.dest = fresh,
        crate::ir::Instruction::Flow(_) => {
            unreachable!("only Expr instructions define a variable")
        }
    }
    function.variable_mut(old_dest).defs.retain(|&d| d != insn_id);
    function.variable_mut(fresh).defs.push(insn_id);
}

fn swing_phi_entry(
    function: &mut Function,
    phi_insn: InsnId,
    from_block: BlockId,
    replacement: Operand,
    descendants: &FxHashSet<VarId>,
) {
    let should_swing = match function.insn(phi_insn) {
        crate::ir::Instruction::Expr(e) => descendants.contains(&e.dest),
        _ => false,
    };
    if !should_swing {
        return;
    }
    match function.insn_mut(phi_insn) {
        crate::ir::Instruction::Expr(crate::ir::ExprInsn {
            kind: crate::ir::ExprKind::Phi(entries),
            ..
        }) => {
            if let Some((_, slot)) = entries.iter_mut().find(|(p, _)| *p == from_block) {
                *slot = replacement;
            }
        }
        _ => unreachable!(),
    }
    if let Operand::Var(v) = replacement {
        function.variable_mut(v).uses.insert(phi_insn);
    }
}
