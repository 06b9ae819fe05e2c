//! The Mutator API: the only sanctioned way to add, replace, or delete
//! instructions, variables, and blocks. Every edit here maintains the
//! bidirectional use/def and predecessor/successor indexes as a side
//! effect of the edit itself — nothing outside this module is permitted to
//! push into a `Variable::uses`/`defs` set or a `Block::preds`/`succs` set
//! directly (`spec.md` §9: "bidirectional use/def indexes must be
//! considered part of the IR, not a convenience").
//!
//! Plain functions over `&mut Function`, with a fatal `bug!` on invariant
//! violation rather than a `Result` return (`spec.md` §7).

use super::block::Block;
use super::function::Function;
use super::ids::{BlockId, InsnId, VarId};
use super::instruction::{ExprInsn, ExprKind, FlowInsn, FlowKind, Instruction};
use super::operand::Operand;
use super::ops::{BinaryOp, UnaryOp};
use super::types::PrimitiveType;
use super::variable::Variable;
use crate::common::bug::bug;

// --- factory operations ---

pub fn create_variable(f: &mut Function, name: impl Into<String>, ty: PrimitiveType) -> VarId {
    f.alloc_variable(Variable::new(name, ty))
}

/// Creates an unnamed variable whose display name is its own ordinal, per
/// `spec.md` §3 ("a display name ... or the variable's ordinal at
/// creation").
pub fn create_anonymous_variable(f: &mut Function, ty: PrimitiveType) -> VarId {
    let id = create_variable(f, "", ty);
    f.variable_mut(id).name = id.0.to_string();
    id
}

pub fn create_block(f: &mut Function, name: impl Into<String>) -> BlockId {
    let id = f.alloc_block(Block::new(name));
    f.block_order.push(id);
    id
}

// --- shared helpers ---

fn operand_type(f: &Function, operand: &Operand) -> PrimitiveType {
    match operand {
        Operand::Const(c) => c.ty,
        Operand::Var(v) => f.variable(*v).ty,
    }
}

fn require_no_terminator(f: &Function, block: BlockId) {
    if f.block(block).terminator.is_some() {
        bug!("block {} already has a terminator", block);
    }
}

/// Records that `insn` assigns `dest`, enforcing the SSA single-assignment
/// invariant when the function's SSA flag is set (`spec.md` §3 invariant
/// ii).
fn register_def(f: &mut Function, dest: VarId, insn: InsnId) {
    if f.ssa_flag && !f.variable(dest).defs.is_empty() {
        bug!(
            "SSA violation: variable {} already has a definition",
            dest
        );
    }
    f.variable_mut(dest).defs.push(insn);
}

fn register_use(f: &mut Function, operand: &Operand, insn: InsnId) {
    if let Operand::Var(v) = operand {
        f.variable_mut(*v).uses.insert(insn);
    }
}

fn register_uses(f: &mut Function, operands: &[Operand], insn: InsnId) {
    for op in operands {
        register_use(f, op, insn);
    }
}

fn connect_edge(f: &mut Function, from: BlockId, to: BlockId) {
    f.block_mut(from).succs.insert(to);
    f.block_mut(to).preds.insert(from);
}

// --- insn_append: Expr kinds ---

pub fn insn_append_phi(
    f: &mut Function,
    block: BlockId,
    dest: VarId,
    entries: Vec<(BlockId, Operand)>,
) -> InsnId {
    require_no_terminator(f, block);
    let dest_ty = f.variable(dest).ty;
    for (_, op) in &entries {
        let op_ty = operand_type(f, op);
        if op_ty != dest_ty {
            bug!(
                "phi operand type {} does not match destination type {}",
                op_ty,
                dest_ty
            );
        }
    }
    for existing in &f.block(block).insns {
        if !matches!(
            f.insn(*existing),
            Instruction::Expr(ExprInsn {
                kind: ExprKind::Phi(_),
                ..
            })
        ) {
            bug!("phi inserted after a non-phi instruction in block {}", block);
        }
    }

    let insn = Instruction::Expr(ExprInsn::new(dest, ExprKind::Phi(entries.clone())));
    let id = f.alloc_insn(insn, block);
    f.block_mut(block).insns.insert(0, id);
    register_def(f, dest, id);
    for (_, op) in &entries {
        register_use(f, op, id);
    }
    id
}

pub fn insn_append_unary(
    f: &mut Function,
    block: BlockId,
    dest: VarId,
    op: UnaryOp,
    src: Operand,
) -> InsnId {
    require_no_terminator(f, block);
    let dest_ty = f.variable(dest).ty;
    let src_ty = operand_type(f, &src);
    match op {
        UnaryOp::Mov => {}
        UnaryOp::Seqz | UnaryOp::Snez => {
            if dest_ty != PrimitiveType::Bool {
                bug!("{:?} requires a bool destination, got {}", op, dest_ty);
            }
        }
        UnaryOp::Neg | UnaryOp::Bneg | UnaryOp::Lnot => {
            if src_ty != dest_ty {
                bug!(
                    "{:?} requires operand type {} to equal destination type {}",
                    op,
                    src_ty,
                    dest_ty
                );
            }
        }
    }

    let insn = Instruction::Expr(ExprInsn::new(dest, ExprKind::Unary { op, src }));
    let id = f.alloc_insn(insn, block);
    push_body_insn(f, block, id);
    register_def(f, dest, id);
    register_use(f, &src, id);
    id
}

pub fn insn_append_binary(
    f: &mut Function,
    block: BlockId,
    dest: VarId,
    op: BinaryOp,
    lhs: Operand,
    rhs: Operand,
) -> InsnId {
    require_no_terminator(f, block);
    let lhs_ty = operand_type(f, &lhs);
    let rhs_ty = operand_type(f, &rhs);
    if lhs_ty != rhs_ty {
        bug!(
            "{:?} operand types disagree: {} vs {}",
            op,
            lhs_ty,
            rhs_ty
        );
    }
    if !op.is_comparison() {
        let dest_ty = f.variable(dest).ty;
        if lhs_ty != dest_ty {
            bug!(
                "{:?} requires operand type {} to equal destination type {}",
                op,
                lhs_ty,
                dest_ty
            );
        }
    }

    let insn = Instruction::Expr(ExprInsn::new(dest, ExprKind::Binary { op, lhs, rhs }));
    let id = f.alloc_insn(insn, block);
    push_body_insn(f, block, id);
    register_def(f, dest, id);
    register_use(f, &lhs, id);
    register_use(f, &rhs, id);
    id
}

pub fn insn_append_undefined(f: &mut Function, block: BlockId, dest: VarId) -> InsnId {
    require_no_terminator(f, block);
    let insn = Instruction::Expr(ExprInsn::new(dest, ExprKind::Undefined));
    let id = f.alloc_insn(insn, block);
    push_body_insn(f, block, id);
    register_def(f, dest, id);
    id
}

fn push_body_insn(f: &mut Function, block: BlockId, id: InsnId) {
    f.block_mut(block).insns.push(id);
}

// --- insn_append: Flow kinds ---

pub fn insn_append_jump(f: &mut Function, block: BlockId, target: BlockId) -> InsnId {
    require_no_terminator(f, block);
    let insn = Instruction::Flow(FlowInsn {
        kind: FlowKind::Jump { target },
    });
    let id = f.alloc_insn(insn, block);
    f.block_mut(block).terminator = Some(id);
    connect_edge(f, block, target);
    id
}

pub fn insn_append_branch(
    f: &mut Function,
    block: BlockId,
    cond: Operand,
    if_true: BlockId,
    if_false: BlockId,
) -> InsnId {
    require_no_terminator(f, block);
    if operand_type(f, &cond) != PrimitiveType::Bool {
        bug!("branch condition must be bool");
    }
    let insn = Instruction::Flow(FlowInsn {
        kind: FlowKind::Branch {
            cond: cond.clone(),
            if_true,
            if_false,
        },
    });
    let id = f.alloc_insn(insn, block);
    f.block_mut(block).terminator = Some(id);
    register_use(f, &cond, id);
    connect_edge(f, block, if_true);
    connect_edge(f, block, if_false);
    id
}

pub fn insn_append_call_direct(
    f: &mut Function,
    block: BlockId,
    callee: impl Into<String>,
    args: Vec<Operand>,
) -> InsnId {
    require_no_terminator(f, block);
    let insn = Instruction::Flow(FlowInsn {
        kind: FlowKind::CallDirect {
            callee: callee.into(),
            args: args.clone(),
        },
    });
    let id = f.alloc_insn(insn, block);
    push_body_insn(f, block, id);
    register_uses(f, &args, id);
    id
}

pub fn insn_append_call_ptr(
    f: &mut Function,
    block: BlockId,
    callee: Operand,
    args: Vec<Operand>,
) -> InsnId {
    require_no_terminator(f, block);
    let insn = Instruction::Flow(FlowInsn {
        kind: FlowKind::CallPtr {
            callee: callee.clone(),
            args: args.clone(),
        },
    });
    let id = f.alloc_insn(insn, block);
    push_body_insn(f, block, id);
    register_use(f, &callee, id);
    register_uses(f, &args, id);
    id
}

pub fn insn_append_return(f: &mut Function, block: BlockId, value: Option<Operand>) -> InsnId {
    require_no_terminator(f, block);
    let insn = Instruction::Flow(FlowInsn {
        kind: FlowKind::Return {
            value: value.clone(),
        },
    });
    let id = f.alloc_insn(insn, block);
    f.block_mut(block).terminator = Some(id);
    if let Some(v) = &value {
        register_use(f, v, id);
    }
    id
}

// --- graph-editing primitives ---

/// Removes `i` from its block's instruction list (or the terminator slot),
/// unlinks it from every operand variable's use-set and, if it assigns a
/// destination, from that variable's def-list. No cascade (`spec.md` §4.1).
pub fn insn_delete(f: &mut Function, i: InsnId) {
    let owner = f.insn_owner(i);
    let insn = f.insn(i).clone();

    for op in insn.operands() {
        if let Operand::Var(v) = op {
            f.variable_mut(*v).uses.remove(&i);
        }
    }
    if let Some(dest) = insn.dest() {
        f.variable_mut(dest).defs.retain(|&d| d != i);
    }

    let block = f.block_mut(owner);
    if block.terminator == Some(i) {
        block.terminator = None;
    } else {
        block.insns.retain(|&x| x != i);
    }

    if let Instruction::Flow(FlowInsn { kind }) = &insn {
        match kind {
            FlowKind::Jump { target } => disconnect_edge(f, owner, *target),
            FlowKind::Branch {
                if_true, if_false, ..
            } => {
                disconnect_edge(f, owner, *if_true);
                disconnect_edge(f, owner, *if_false);
            }
            _ => {}
        }
    }

    f.retire_insn(i);
}

fn disconnect_edge(f: &mut Function, from: BlockId, to: BlockId) {
    if !f.block_exists(from) || !f.block_exists(to) {
        return;
    }
    f.block_mut(from).succs.remove(to);
    f.block_mut(to).preds.remove(from);
}

/// Substitutes `operand` for every use of `v`, then empties `v`'s use-set.
/// Aborts fatally if `operand` itself references `v` (`spec.md` §9: this
/// guard is load-bearing for termination).
pub fn variable_replace(f: &mut Function, v: VarId, operand: Operand) {
    if operand.as_var() == Some(v) {
        bug!("variable_replace({}, ...) would create a self-reference", v);
    }
    let uses: Vec<InsnId> = f.variable(v).uses.iter().copied().collect();
    for insn_id in uses {
        for slot in f.insn_mut(insn_id).operands_mut() {
            if slot.as_var() == Some(v) {
                *slot = operand;
            }
        }
        register_use(f, &operand, insn_id);
    }
    f.variable_mut(v).uses.clear();
}

/// Deletes every instruction in `v`'s use-set ∪ def-list, then removes `v`
/// from its function (`spec.md` §4.1).
pub fn variable_delete(f: &mut Function, v: VarId) {
    let mut affected: Vec<InsnId> = f.variable(v).uses.iter().copied().collect();
    affected.extend(f.variable(v).defs.iter().copied());
    affected.sort();
    affected.dedup();
    for insn_id in affected {
        if f.insn_exists(insn_id) {
            insn_delete(f, insn_id);
        }
    }
    f.retire_variable(v);
}

/// Deletes block `b`: predecessors lose the terminator that targeted it,
/// successors lose their φ-entry sourced from it (collapsing a φ reduced to
/// one entry via `variable_replace`), then `b` itself is removed
/// (`spec.md` §4.1).
pub fn block_delete(f: &mut Function, b: BlockId) {
    let preds: Vec<BlockId> = f.block(b).preds.iter().copied().collect();
    for pred in preds {
        if let Some(term) = f.block(pred).terminator {
            if targets(f.insn(term), b) {
                insn_delete(f, term);
            }
        }
    }

    let succs: Vec<BlockId> = f.block(b).succs.iter().copied().collect();
    for succ in succs {
        prune_phi_entries_from(f, succ, b);
    }

    f.retire_block(b);
}

fn targets(insn: &Instruction, block: BlockId) -> bool {
    match insn {
        Instruction::Flow(FlowInsn {
            kind: FlowKind::Jump { target },
        }) => *target == block,
        Instruction::Flow(FlowInsn {
            kind: FlowKind::Branch {
                if_true, if_false, ..
            },
        }) => *if_true == block || *if_false == block,
        _ => false,
    }
}

fn prune_phi_entries_from(f: &mut Function, succ: BlockId, removed_pred: BlockId) {
    let phi_ids: Vec<InsnId> = f
        .block(succ)
        .insns
        .iter()
        .copied()
        .filter(|id| {
            matches!(
                f.insn(*id),
                Instruction::Expr(ExprInsn {
                    kind: ExprKind::Phi(_),
                    ..
                })
            )
        })
        .collect();

    for phi_id in phi_ids {
        let (dest, remaining) = match f.insn(phi_id) {
            Instruction::Expr(ExprInsn {
                dest,
                kind: ExprKind::Phi(entries),
            }) => {
                let remaining: Vec<(BlockId, Operand)> = entries
                    .iter()
                    .filter(|(p, _)| *p != removed_pred)
                    .cloned()
                    .collect();
                (*dest, remaining)
            }
            _ => unreachable!(),
        };

        if let Operand::Var(stale) = operand_for_pred(f, phi_id, removed_pred) {
            f.variable_mut(stale).uses.remove(&phi_id);
        }

        if remaining.len() == 1 {
            let sole = remaining[0].1;
            variable_replace(f, dest, sole);
            insn_delete(f, phi_id);
        } else {
            set_phi_entries(f, phi_id, remaining);
        }
    }
}

fn operand_for_pred(f: &Function, phi_id: InsnId, pred: BlockId) -> Operand {
    match f.insn(phi_id) {
        Instruction::Expr(ExprInsn {
            kind: ExprKind::Phi(entries),
            ..
        }) => entries
            .iter()
            .find(|(p, _)| *p == pred)
            .map(|(_, op)| *op)
            .unwrap_or_else(|| bug!("phi {} has no entry for predecessor {}", phi_id, pred)),
        _ => bug!("instruction {} is not a phi", phi_id),
    }
}

fn set_phi_entries(f: &mut Function, phi_id: InsnId, entries: Vec<(BlockId, Operand)>) {
    match f.insn_mut(phi_id) {
        Instruction::Expr(ExprInsn {
            kind: ExprKind::Phi(slot),
            ..
        }) => *slot = entries,
        _ => bug!("instruction {} is not a phi", phi_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::Const;

    fn new_function() -> Function {
        Function::new("f")
    }

    #[test]
    fn append_binary_wires_use_def() {
        let mut f = new_function();
        let entry = f.entry;
        let a = create_variable(&mut f, "a", PrimitiveType::S32);
        let b = create_variable(&mut f, "b", PrimitiveType::S32);
        let c = create_variable(&mut f, "c", PrimitiveType::S32);
        let insn = insn_append_binary(
            &mut f,
            entry,
            c,
            BinaryOp::Add,
            Operand::Var(a),
            Operand::Var(b),
        );
        assert!(f.variable(a).uses.contains(&insn));
        assert!(f.variable(b).uses.contains(&insn));
        assert_eq!(f.variable(c).defs, vec![insn]);
    }

    #[test]
    #[should_panic(expected = "[BUG]")]
    fn append_after_terminator_panics() {
        let mut f = new_function();
        let entry = f.entry;
        let exit = create_block(&mut f, "exit");
        insn_append_jump(&mut f, entry, exit);
        insn_append_jump(&mut f, entry, exit);
    }

    #[test]
    fn jump_connects_pred_succ() {
        let mut f = new_function();
        let entry = f.entry;
        let exit = create_block(&mut f, "exit");
        insn_append_jump(&mut f, entry, exit);
        assert!(f.block(entry).succs.contains(exit));
        assert!(f.block(exit).preds.contains(entry));
    }

    #[test]
    fn insn_delete_removes_from_use_set() {
        let mut f = new_function();
        let entry = f.entry;
        let a = create_variable(&mut f, "a", PrimitiveType::S32);
        let dest = create_variable(&mut f, "dest", PrimitiveType::S32);
        let insn = insn_append_unary(&mut f, entry, dest, UnaryOp::Mov, Operand::Var(a));
        insn_delete(&mut f, insn);
        assert!(!f.variable(a).uses.contains(&insn));
        assert!(f.variable(dest).defs.is_empty());
        assert!(!f.block(entry).insns.contains(&insn));
    }

    #[test]
    fn variable_replace_substitutes_every_use() {
        let mut f = new_function();
        let entry = f.entry;
        let a = create_variable(&mut f, "a", PrimitiveType::S32);
        let dest1 = create_variable(&mut f, "d1", PrimitiveType::S32);
        let dest2 = create_variable(&mut f, "d2", PrimitiveType::S32);
        let i1 = insn_append_unary(&mut f, entry, dest1, UnaryOp::Mov, Operand::Var(a));
        let i2 = insn_append_unary(&mut f, entry, dest2, UnaryOp::Mov, Operand::Var(a));
        let replacement = Operand::Const(Const::i64(PrimitiveType::S32, 7));
        variable_replace(&mut f, a, replacement);
        assert!(f.variable(a).uses.is_empty());
        match f.insn(i1) {
            Instruction::Expr(ExprInsn {
                kind: ExprKind::Unary { src, .. },
                ..
            }) => assert_eq!(*src, replacement),
            _ => panic!("expected unary"),
        }
        match f.insn(i2) {
            Instruction::Expr(ExprInsn {
                kind: ExprKind::Unary { src, .. },
                ..
            }) => assert_eq!(*src, replacement),
            _ => panic!("expected unary"),
        }
    }

    #[test]
    #[should_panic(expected = "[BUG]")]
    fn variable_replace_self_reference_panics() {
        let mut f = new_function();
        let entry = f.entry;
        let a = create_variable(&mut f, "a", PrimitiveType::S32);
        let dest = create_variable(&mut f, "d", PrimitiveType::S32);
        insn_append_unary(&mut f, entry, dest, UnaryOp::Mov, Operand::Var(a));
        variable_replace(&mut f, a, Operand::Var(a));
    }

    #[test]
    fn variable_delete_cascades_to_its_instructions() {
        let mut f = new_function();
        let entry = f.entry;
        let a = create_variable(&mut f, "a", PrimitiveType::S32);
        let dest = create_variable(&mut f, "d", PrimitiveType::S32);
        let insn = insn_append_unary(&mut f, entry, dest, UnaryOp::Mov, Operand::Var(a));
        variable_delete(&mut f, a);
        assert!(!f.insn_exists(insn));
        assert!(!f.variable_exists(a));
    }

    #[test]
    fn block_delete_removes_predecessor_terminator_and_updates_phi() {
        let mut f = new_function();
        let entry = f.entry;
        let l = create_block(&mut f, "L");
        let r = create_block(&mut f, "R");
        let m = create_block(&mut f, "M");
        let cond = create_variable(&mut f, "cond", PrimitiveType::Bool);
        insn_append_branch(&mut f, entry, Operand::Var(cond), l, r);
        insn_append_jump(&mut f, l, m);
        insn_append_jump(&mut f, r, m);

        let x = create_variable(&mut f, "x", PrimitiveType::S32);
        let xl = create_variable(&mut f, "xl", PrimitiveType::S32);
        let xr = create_variable(&mut f, "xr", PrimitiveType::S32);
        insn_append_phi(
            &mut f,
            m,
            x,
            vec![(l, Operand::Var(xl)), (r, Operand::Var(xr))],
        );

        block_delete(&mut f, l);

        // entry's branch targeted the deleted block, so the whole
        // terminator instruction is gone (spec.md §4.1: "delete terminator
        // instructions that targeted b").
        assert!(!f.block(entry).succs.contains(l));
        assert!(f.block(entry).terminator.is_none());
        // phi collapsed to a single entry and then replaced away entirely
        assert!(f.block(m).insns.is_empty());
    }
}
