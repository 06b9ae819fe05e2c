//! Operator vocabulary and constant-folding semantics (`spec.md` §6).
//!
//! Operators are typed at each site and must be *evaluable* — the constant
//! folder (`passes::const_prop`) calls straight into `UnaryOp::eval`/
//! `BinaryOp::eval`. The grouped-enum shape (arithmetic / comparison /
//! bitwise / logical tiers) keeps each evaluation function small.

use super::types::{Const, PrimitiveType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Implicit cast: any source type to any destination type.
    Mov,
    /// Set-if-zero: destination must be BOOL.
    Seqz,
    /// Set-if-not-zero: destination must be BOOL.
    Snez,
    Neg,
    Bneg,
    Lnot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Comparisons
    Sgt,
    Sle,
    Slt,
    Sge,
    Seq,
    Sne,
    Scs,
    Scc,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Bitwise
    Shl,
    Shr,
    Band,
    Bor,
    Bxor,
    // Logical (BOOL only)
    Land,
    Lor,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Sgt
                | BinaryOp::Sle
                | BinaryOp::Slt
                | BinaryOp::Sge
                | BinaryOp::Seq
                | BinaryOp::Sne
                | BinaryOp::Scs
                | BinaryOp::Scc
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::Land | BinaryOp::Lor)
    }
}

impl UnaryOp {
    /// Evaluates this operator on a constant operand, producing a constant of
    /// `dest_ty`. Respects `spec.md` §6's casting rule for `Mov`.
    pub fn eval(&self, src: Const, dest_ty: PrimitiveType) -> Const {
        match self {
            UnaryOp::Mov => src.wrapped_to(dest_ty),
            UnaryOp::Seqz => Const::bool(src.as_u128() == 0),
            UnaryOp::Snez => Const::bool(src.as_u128() != 0),
            UnaryOp::Neg => {
                if src.ty.is_float() {
                    float_unary(src, dest_ty, |f| -f)
                } else {
                    Const::u128(dest_ty, src.as_u128().wrapping_neg()).wrapped_to(dest_ty)
                }
            }
            UnaryOp::Bneg => Const::u128(dest_ty, !src.as_u128()).wrapped_to(dest_ty),
            UnaryOp::Lnot => Const::bool(!src.as_bool()),
        }
    }
}

impl BinaryOp {
    /// Evaluates this operator on two constant operands of the same
    /// primitive type, producing a constant of `dest_ty`.
    ///
    /// Division and modulo by zero are defined to produce zero, per
    /// `spec.md` §6, to keep the folder total.
    pub fn eval(&self, lhs: Const, rhs: Const, dest_ty: PrimitiveType) -> Const {
        if self.is_logical() {
            return self.eval_logical(lhs, rhs);
        }
        if lhs.ty.is_float() {
            return self.eval_float(lhs, rhs, dest_ty);
        }
        if self.is_comparison() {
            return self.eval_int_compare(lhs, rhs);
        }
        self.eval_int_arith(lhs, rhs, dest_ty)
    }

    fn eval_logical(&self, lhs: Const, rhs: Const) -> Const {
        let (a, b) = (lhs.as_bool(), rhs.as_bool());
        match self {
            BinaryOp::Land => Const::bool(a && b),
            BinaryOp::Lor => Const::bool(a || b),
            _ => unreachable!("non-logical op routed to eval_logical"),
        }
    }

    /// SCS/SCC test the carry out of an unsigned add of the two operands,
    /// independent of the operands' own signedness; the rest compare the
    /// operands as signed or unsigned per `lhs.ty`.
    fn eval_int_compare(&self, lhs: Const, rhs: Const) -> Const {
        if matches!(self, BinaryOp::Scs | BinaryOp::Scc) {
            let carry = carry_of_add(lhs, rhs);
            return Const::bool(if matches!(self, BinaryOp::Scs) {
                carry
            } else {
                !carry
            });
        }
        let result = if lhs.ty.is_signed() {
            let (a, b) = (lhs.as_i128(), rhs.as_i128());
            match self {
                BinaryOp::Sgt => a > b,
                BinaryOp::Sle => a <= b,
                BinaryOp::Slt => a < b,
                BinaryOp::Sge => a >= b,
                BinaryOp::Seq => a == b,
                BinaryOp::Sne => a != b,
                _ => unreachable!(),
            }
        } else {
            let (a, b) = (lhs.as_u128(), rhs.as_u128());
            match self {
                BinaryOp::Sgt => a > b,
                BinaryOp::Sle => a <= b,
                BinaryOp::Slt => a < b,
                BinaryOp::Sge => a >= b,
                BinaryOp::Seq => a == b,
                BinaryOp::Sne => a != b,
                _ => unreachable!(),
            }
        };
        Const::bool(result)
    }

    fn eval_int_arith(&self, lhs: Const, rhs: Const, dest_ty: PrimitiveType) -> Const {
        let bits = dest_ty.size() * 8;
        let mask: u128 = if bits >= 128 {
            u128::MAX
        } else {
            (1u128 << bits) - 1
        };
        let a = lhs.as_u128() & mask;
        let b = rhs.as_u128() & mask;
        let raw = match self {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div => {
                if dest_ty.is_signed() {
                    let (sa, sb) = (lhs.as_i128(), rhs.as_i128());
                    if sb == 0 {
                        0
                    } else {
                        (sa.wrapping_div(sb)) as u128
                    }
                } else if b == 0 {
                    0
                } else {
                    a / b
                }
            }
            BinaryOp::Mod => {
                if dest_ty.is_signed() {
                    let (sa, sb) = (lhs.as_i128(), rhs.as_i128());
                    if sb == 0 {
                        0
                    } else {
                        (sa.wrapping_rem(sb)) as u128
                    }
                } else if b == 0 {
                    0
                } else {
                    a % b
                }
            }
            BinaryOp::Shl => a.wrapping_shl((b & 127) as u32),
            BinaryOp::Shr => {
                if dest_ty.is_signed() {
                    ((lhs.as_i128()) >> (b & 127)) as u128
                } else {
                    a >> (b & 127)
                }
            }
            BinaryOp::Band => a & b,
            BinaryOp::Bor => a | b,
            BinaryOp::Bxor => a ^ b,
            _ => unreachable!("non-arithmetic op routed to eval_int_arith"),
        };
        Const::u128(dest_ty, raw).wrapped_to(dest_ty)
    }

    fn eval_float(&self, lhs: Const, rhs: Const, dest_ty: PrimitiveType) -> Const {
        let (a, b) = (as_f64(lhs), as_f64(rhs));
        if self.is_comparison() {
            let result = match self {
                BinaryOp::Sgt => a > b,
                BinaryOp::Sle => a <= b,
                BinaryOp::Slt => a < b,
                BinaryOp::Sge => a >= b,
                BinaryOp::Seq => a == b,
                BinaryOp::Sne => a != b,
                BinaryOp::Scs | BinaryOp::Scc => false,
                _ => unreachable!(),
            };
            return Const::bool(result);
        }
        let raw = match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => {
                if b == 0.0 {
                    0.0
                } else {
                    a / b
                }
            }
            BinaryOp::Mod => {
                if b == 0.0 {
                    0.0
                } else {
                    a % b
                }
            }
            _ => unreachable!("non-float-arith op routed to eval_float"),
        };
        match dest_ty {
            PrimitiveType::F32 => Const::f32(raw as f32),
            _ => Const::f64(raw),
        }
    }
}

fn as_f64(c: Const) -> f64 {
    match c.ty {
        PrimitiveType::F32 => c.as_f32() as f64,
        _ => c.as_f64(),
    }
}

fn float_unary(src: Const, dest_ty: PrimitiveType, f: impl Fn(f64) -> f64) -> Const {
    let result = f(as_f64(src));
    match dest_ty {
        PrimitiveType::F32 => Const::f32(result as f32),
        _ => Const::f64(result),
    }
}

fn carry_of_add(lhs: Const, rhs: Const) -> bool {
    let bits = lhs.ty.size() * 8;
    let mask: u128 = if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    };
    let sum = (lhs.as_u128() & mask) + (rhs.as_u128() & mask);
    sum > mask
}
