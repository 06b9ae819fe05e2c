//! Constant folding and propagation (`spec.md` §4.4).

use crate::ir::mutator::{variable_delete, variable_replace};
use crate::ir::{ExprKind, Function, Instruction, Operand};

/// For each variable with exactly one assignment whose expression is fully
/// constant (a unary over a constant, or a binary over two constants),
/// evaluates it and propagates the result to every use site, then deletes
/// the now-dead destination variable. Runs to an inner fixed point.
pub fn run(f: &mut Function) -> bool {
    let mut changed_overall = false;
    loop {
        let mut changed_this_round = false;
        let candidates: Vec<_> = f.variable_ids().collect();
        for v in candidates {
            if !f.variable_exists(v) {
                continue;
            }
            let defs = &f.variable(v).defs;
            if defs.len() != 1 {
                continue;
            }
            let insn_id = defs[0];
            let dest_ty = f.variable(v).ty;

            let folded = match f.insn(insn_id) {
                Instruction::Expr(e) => match &e.kind {
                    ExprKind::Unary { op, src } => src.as_const().map(|c| op.eval(c, dest_ty)),
                    ExprKind::Binary { op, lhs, rhs } => {
                        match (lhs.as_const(), rhs.as_const()) {
                            (Some(l), Some(r)) => Some(op.eval(l, r, dest_ty)),
                            _ => None,
                        }
                    }
                    _ => None,
                },
                Instruction::Flow(_) => None,
            };

            if let Some(result) = folded {
                variable_replace(f, v, Operand::Const(result));
                variable_delete(f, v);
                changed_this_round = true;
            }
        }
        if !changed_this_round {
            break;
        }
        changed_overall = true;
    }
    changed_overall
}
