//! Textual serialisation of a function for debugging and golden-file
//! testing (`spec.md` §4.5, §6). One-way: there is no parser back.

use std::fmt::Write as _;

use crate::ir::{
    BlockId, Const, ExprKind, FlowKind, Function, Instruction, Operand, PrimitiveType, VarId,
};

/// Renders `f` as human-readable text, in the exact grammar of `spec.md`
/// §6: an optional `ssa ` prefix, variable declarations, argument
/// declarations, then one `code <<name>>` section per block with indented
/// instructions.
pub fn serialize(f: &Function) -> String {
    let mut out = String::new();

    if f.ssa_flag {
        out.push_str("ssa ");
    }
    let _ = writeln!(out, "function %{}", f.name);

    for v in f.variable_ids() {
        if f.args.contains(&v) {
            continue;
        }
        let var = f.variable(v);
        let _ = writeln!(out, "    var {} %{}", var.ty, var.name);
    }
    for &arg in &f.args {
        let _ = writeln!(out, "    arg %{}", f.variable(arg).name);
    }

    for b in f.block_ids() {
        let block = f.block(b);
        let _ = writeln!(out, "code <<{}>>", block.name);
        for &insn_id in &block.insns {
            let _ = writeln!(out, "    {}", render_insn(f, insn_id));
        }
        if let Some(term) = block.terminator {
            let _ = writeln!(out, "    {}", render_insn(f, term));
        }
    }

    out
}

fn render_insn(f: &Function, insn_id: crate::ir::InsnId) -> String {
    match f.insn(insn_id) {
        Instruction::Expr(e) => {
            let dest = var_name(f, e.dest);
            match &e.kind {
                ExprKind::Phi(entries) => {
                    let parts: Vec<String> = entries
                        .iter()
                        .map(|(pred, op)| format!("{}, {}", block_ref(f, *pred), render_operand(f, op)))
                        .collect();
                    format!("phi %{}, {}", dest, parts.join(", "))
                }
                ExprKind::Unary { op, src } => {
                    format!("{} %{}, {}", unary_mnemonic(*op), dest, render_operand(f, src))
                }
                ExprKind::Binary { op, lhs, rhs } => format!(
                    "{} %{}, {}, {}",
                    binary_mnemonic(*op),
                    dest,
                    render_operand(f, lhs),
                    render_operand(f, rhs)
                ),
                ExprKind::Undefined => format!("undef %{}", dest),
            }
        }
        Instruction::Flow(flow_insn) => match &flow_insn.kind {
            FlowKind::Jump { target } => format!("jump {}", block_ref(f, *target)),
            FlowKind::Branch { cond, if_true, .. } => {
                format!("branch {}, {}", render_operand(f, cond), block_ref(f, *if_true))
            }
            FlowKind::CallDirect { callee, args, .. } => {
                let mut s = format!("call_direct {}", block_label(callee));
                for a in args {
                    let _ = write!(s, ", {}", render_operand(f, a));
                }
                s
            }
            FlowKind::CallPtr { callee, args, .. } => {
                let mut s = format!("call_ptr {}", render_operand(f, callee));
                for a in args {
                    let _ = write!(s, ", {}", render_operand(f, a));
                }
                s
            }
            FlowKind::Return { value } => match value {
                Some(op) => format!("return {}", render_operand(f, op)),
                None => "return".to_string(),
            },
        },
    }
}

fn block_label(callee: &str) -> String {
    format!("<<{}>>", callee)
}

fn var_name(f: &Function, v: VarId) -> String {
    f.variable(v).name.clone()
}

fn block_ref(f: &Function, b: BlockId) -> String {
    format!("<<{}>>", f.block(b).name)
}

fn render_operand(f: &Function, op: &Operand) -> String {
    match op {
        Operand::Var(v) => format!("%{}", var_name(f, *v)),
        Operand::Const(c) => render_const(c),
    }
}

fn render_const(c: &Const) -> String {
    if c.ty == PrimitiveType::Bool {
        return format!("bool'{}", if c.as_bool() { "true" } else { "false" });
    }
    let width_hex_digits = (c.ty.size() as usize) * 2;
    let bits = c.ty.size() * 8;
    let masked = if bits >= 128 {
        c.as_u128()
    } else {
        c.as_u128() & ((1u128 << bits) - 1)
    };
    let hex = format!("{:0width$x}", masked, width = width_hex_digits);
    let base = format!("{}'0x{}", c.ty, hex);
    match c.ty {
        PrimitiveType::F32 => format!("{} /* {} */", base, c.as_f32()),
        PrimitiveType::F64 => format!("{} /* {} */", base, c.as_f64()),
        _ => base,
    }
}

fn unary_mnemonic(op: crate::ir::UnaryOp) -> &'static str {
    use crate::ir::UnaryOp::*;
    match op {
        Mov => "mov",
        Seqz => "seqz",
        Snez => "snez",
        Neg => "neg",
        Bneg => "bneg",
        Lnot => "lnot",
    }
}

fn binary_mnemonic(op: crate::ir::BinaryOp) -> &'static str {
    use crate::ir::BinaryOp::*;
    match op {
        Sgt => "sgt",
        Sle => "sle",
        Slt => "slt",
        Sge => "sge",
        Seq => "seq",
        Sne => "sne",
        Scs => "scs",
        Scc => "scc",
        Add => "add",
        Sub => "sub",
        Mul => "mul",
        Div => "div",
        Mod => "mod",
        Shl => "shl",
        Shr => "shr",
        Band => "band",
        Bor => "bor",
        Bxor => "bxor",
        Land => "land",
        Lor => "lor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::mutator::*;
    use crate::ir::{BinaryOp, Operand};

    #[test]
    fn serializes_constant_add_and_return() {
        let mut f = Function::new("f");
        let entry = f.entry;
        let a = create_variable(&mut f, "a", PrimitiveType::S32);
        insn_append_binary(
            &mut f,
            entry,
            a,
            BinaryOp::Add,
            Operand::Const(Const::i64(PrimitiveType::S32, 2)),
            Operand::Const(Const::i64(PrimitiveType::S32, 3)),
        );
        insn_append_return(&mut f, entry, Some(Operand::Var(a)));

        let text = serialize(&f);
        assert!(text.starts_with("function %f\n"));
        assert!(text.contains("var s32 %a"));
        assert!(text.contains("code <<entry>>"));
        assert!(text.contains("add %a, s32'0x00000002, s32'0x00000003"));
        assert!(text.contains("return %a"));
    }

    #[test]
    fn ssa_flag_emits_prefix() {
        let mut f = Function::new("f");
        f.ssa_flag = true;
        let text = serialize(&f);
        assert!(text.starts_with("ssa function %f\n"));
    }

    #[test]
    fn bool_constant_renders_as_true_false() {
        let c = Const::bool(true);
        assert_eq!(render_const(&c), "bool'true");
    }

    #[test]
    fn float_constant_carries_decimal_comment() {
        let c = Const::f64(3.5);
        let rendered = render_const(&c);
        assert!(rendered.starts_with("f64'0x"));
        assert!(rendered.contains("/* 3.5 */"));
    }

    #[test]
    fn negative_constant_renders_to_the_types_own_width() {
        let c = Const::i64(PrimitiveType::S32, -5);
        let rendered = render_const(&c);
        assert_eq!(rendered, "s32'0xfffffffb");
    }

    #[test]
    fn recalc_flow_is_a_serialisation_no_op() {
        let mut f = Function::new("f");
        let entry = f.entry;
        insn_append_return(&mut f, entry, None);
        let before = serialize(&f);
        crate::flow::recalc_flow(&mut f);
        let after = serialize(&f);
        assert_eq!(before, after);
    }
}
