//! A typed, control-flow-graph-based compiler intermediate representation:
//! construction via the Mutator API, conversion to static single assignment
//! form, and a fixed-point optimisation pipeline.

pub mod common;
pub mod flow;
pub mod ir;
pub mod passes;
pub mod serialize;
pub mod ssa;

pub use flow::{compute_dominance, recalc_flow, Dominance};
pub use ir::{
    BinaryOp, Block, BlockId, Const, ExprInsn, ExprKind, Function, FlowInsn, FlowKind, InsnId,
    Instruction, Operand, PrimitiveType, UnaryOp, VarId, Variable,
};
pub use passes::optimize;
pub use serialize::serialize;
pub use ssa::to_ssa;
