//! Instructions: the two top-level kinds an IR position can hold
//! (`spec.md` §3-§4): `Expr`, which produces a value into a destination
//! variable, and `Flow`, which transfers control.

use super::ids::{BlockId, InsnId, VarId};
use super::ops::{BinaryOp, UnaryOp};
use super::operand::Operand;

#[derive(Debug, Clone)]
pub enum Instruction {
    Expr(ExprInsn),
    Flow(FlowInsn),
}

#[derive(Debug, Clone)]
pub struct ExprInsn {
    pub dest: VarId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A φ-node: one incoming operand per predecessor block, in predecessor
    /// order. Only ever introduced by `ssa::to_ssa`.
    Phi(Vec<(BlockId, Operand)>),
    Unary {
        op: UnaryOp,
        src: Operand,
    },
    Binary {
        op: BinaryOp,
        lhs: Operand,
        rhs: Operand,
    },
    /// A variable with no defining instruction yet (e.g. a fresh SSA name
    /// about to be φ-renamed). Carries no operands.
    Undefined,
}

#[derive(Debug, Clone)]
pub struct FlowInsn {
    pub kind: FlowKind,
}

#[derive(Debug, Clone)]
pub enum FlowKind {
    Jump {
        target: BlockId,
    },
    Branch {
        cond: Operand,
        if_true: BlockId,
        if_false: BlockId,
    },
    CallDirect {
        callee: String,
        args: Vec<Operand>,
    },
    CallPtr {
        callee: Operand,
        args: Vec<Operand>,
    },
    Return {
        value: Option<Operand>,
    },
}

impl Instruction {
    /// The variable this instruction defines, if any. Calls have no
    /// destination (`spec.md` §3: a call's result, if any, is consumed by
    /// the next expression per the ambient calling convention, out of
    /// scope here) — only `Expr` instructions ever define a variable.
    pub fn dest(&self) -> Option<VarId> {
        match self {
            Instruction::Expr(e) => Some(e.dest),
            Instruction::Flow(_) => None,
        }
    }

    /// True for the three flow kinds that end a block (`spec.md`
    /// GLOSSARY: "Terminator"). Calls are `Flow` but not terminators — they
    /// fall through to the next instruction in the block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Flow(FlowInsn {
                kind: FlowKind::Jump { .. } | FlowKind::Branch { .. } | FlowKind::Return { .. },
                ..
            })
        )
    }

    pub fn is_call(&self) -> bool {
        matches!(
            self,
            Instruction::Flow(FlowInsn {
                kind: FlowKind::CallDirect { .. } | FlowKind::CallPtr { .. },
                ..
            })
        )
    }

    /// Every variable this instruction reads, in a stable left-to-right
    /// order. Does not include `dest`.
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Instruction::Expr(e) => match &e.kind {
                ExprKind::Phi(incoming) => incoming.iter().map(|(_, op)| op).collect(),
                ExprKind::Unary { src, .. } => vec![src],
                ExprKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
                ExprKind::Undefined => vec![],
            },
            Instruction::Flow(f) => match &f.kind {
                FlowKind::Jump { .. } => vec![],
                FlowKind::Branch { cond, .. } => vec![cond],
                FlowKind::CallDirect { args, .. } => args.iter().collect(),
                FlowKind::CallPtr { callee, args, .. } => {
                    let mut ops = vec![callee];
                    ops.extend(args.iter());
                    ops
                }
                FlowKind::Return { value } => value.iter().collect(),
            },
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Instruction::Expr(e) => match &mut e.kind {
                ExprKind::Phi(incoming) => incoming.iter_mut().map(|(_, op)| op).collect(),
                ExprKind::Unary { src, .. } => vec![src],
                ExprKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
                ExprKind::Undefined => vec![],
            },
            Instruction::Flow(f) => match &mut f.kind {
                FlowKind::Jump { .. } => vec![],
                FlowKind::Branch { cond, .. } => vec![cond],
                FlowKind::CallDirect { args, .. } => args.iter_mut().collect(),
                FlowKind::CallPtr { callee, args, .. } => {
                    let mut ops = vec![callee];
                    ops.extend(args.iter_mut());
                    ops
                }
                FlowKind::Return { value } => value.iter_mut().collect(),
            },
        }
    }

    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Instruction::Flow(f) => match &f.kind {
                FlowKind::Jump { target } => vec![*target],
                FlowKind::Branch {
                    if_true, if_false, ..
                } => vec![*if_true, *if_false],
                _ => vec![],
            },
            Instruction::Expr(_) => vec![],
        }
    }
}

impl ExprInsn {
    pub fn new(dest: VarId, kind: ExprKind) -> Self {
        ExprInsn { dest, kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::Const;

    #[test]
    fn dest_of_expr() {
        let insn = Instruction::Expr(ExprInsn::new(
            VarId(0),
            ExprKind::Binary {
                op: BinaryOp::Add,
                lhs: Operand::Const(Const::i64(PrimitiveType::S32, 1)),
                rhs: Operand::Const(Const::i64(PrimitiveType::S32, 2)),
            },
        ));
        assert_eq!(insn.dest(), Some(VarId(0)));
        assert!(!insn.is_terminator());
    }

    #[test]
    fn call_direct_is_flow_not_terminator_and_has_no_dest() {
        let insn = Instruction::Flow(FlowInsn {
            kind: FlowKind::CallDirect {
                callee: "foo".to_string(),
                args: vec![],
            },
        });
        assert_eq!(insn.dest(), None);
        assert!(!insn.is_terminator());
        assert!(insn.is_call());
    }

    #[test]
    fn branch_is_terminator_with_two_successors() {
        let insn = Instruction::Flow(FlowInsn {
            kind: FlowKind::Branch {
                cond: Operand::Var(VarId(0)),
                if_true: BlockId(1),
                if_false: BlockId(2),
            },
        });
        assert!(insn.is_terminator());
        assert_eq!(insn.successors(), vec![BlockId(1), BlockId(2)]);
    }

    #[test]
    fn phi_operands_in_predecessor_order() {
        let insn = Instruction::Expr(ExprInsn::new(
            VarId(5),
            ExprKind::Phi(vec![
                (BlockId(1), Operand::Var(VarId(1))),
                (BlockId(2), Operand::Var(VarId(2))),
            ]),
        ));
        let ops: Vec<VarId> = insn.operands().iter().filter_map(|o| o.as_var()).collect();
        assert_eq!(ops, vec![VarId(1), VarId(2)]);
    }
}
