//! `Function`: the arena that owns every variable, block, and instruction,
//! addressed by the stable handles in `ids.rs` (`spec.md` §9 DESIGN NOTES —
//! arenas with integer handles in place of the source's intrusive,
//! pointer-linked lists).
//!
//! Deletion never shrinks an arena or reuses a slot: `variables[i]`/
//! `blocks[i]`/`insns[i]` go to `None` and the id stays retired, so a stale
//! handle held by a pass that hasn't noticed a delete yet fails loudly
//! (`bug!`) instead of silently aliasing a new entity.

use super::block::Block;
use super::ids::{BlockId, InsnId, VarId};
use super::instruction::Instruction;
use super::types::PrimitiveType;
use super::variable::Variable;
use crate::common::bug::bug;

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub args: Vec<VarId>,
    pub entry: BlockId,

    variables: Vec<Option<Variable>>,
    blocks: Vec<Option<Block>>,
    insns: Vec<Option<Instruction>>,
    /// Owning block of each live instruction, parallel to `insns`. Lets
    /// `mutator::insn_delete` find the block to unlink from without a
    /// linear scan.
    insn_owner: Vec<Option<BlockId>>,

    /// Block iteration order as the function was built or last
    /// canonicalized; not necessarily dominance or reverse-postorder — those
    /// are computed on demand by `flow::compute_dominance`.
    pub block_order: Vec<BlockId>,

    /// Set once `ssa::to_ssa` completes; cleared by any Mutator call that
    /// could reintroduce a non-SSA variable (`spec.md` §4.3).
    pub ssa_flag: bool,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        let mut f = Function {
            name: name.into(),
            args: Vec::new(),
            entry: BlockId(0),
            variables: Vec::new(),
            blocks: Vec::new(),
            insns: Vec::new(),
            insn_owner: Vec::new(),
            block_order: Vec::new(),
            ssa_flag: false,
        };
        let entry = f.alloc_block(Block::new("entry"));
        f.entry = entry;
        f.block_order.push(entry);
        f
    }

    // --- variable arena ---

    pub fn alloc_variable(&mut self, variable: Variable) -> VarId {
        let id = VarId(self.variables.len() as u32);
        self.variables.push(Some(variable));
        id
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        self.variables[id.0 as usize]
            .as_ref()
            .unwrap_or_else(|| bug!("variable {} was deleted", id))
    }

    pub fn variable_mut(&mut self, id: VarId) -> &mut Variable {
        let idx = id.0 as usize;
        if self.variables[idx].is_none() {
            bug!("variable {} was deleted", id);
        }
        self.variables[idx].as_mut().unwrap()
    }

    pub fn variable_exists(&self, id: VarId) -> bool {
        self.variables
            .get(id.0 as usize)
            .map(|v| v.is_some())
            .unwrap_or(false)
    }

    pub(super) fn retire_variable(&mut self, id: VarId) {
        self.variables[id.0 as usize] = None;
    }

    pub fn variable_ids(&self) -> impl Iterator<Item = VarId> + '_ {
        self.variables
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .map(|(i, _)| VarId(i as u32))
    }

    // --- block arena ---

    pub fn alloc_block(&mut self, block: Block) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Some(block));
        id
    }

    pub fn block(&self, id: BlockId) -> &Block {
        self.blocks[id.0 as usize]
            .as_ref()
            .unwrap_or_else(|| bug!("block {} was deleted", id))
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        let idx = id.0 as usize;
        if self.blocks[idx].is_none() {
            bug!("block {} was deleted", id);
        }
        self.blocks[idx].as_mut().unwrap()
    }

    pub fn block_exists(&self, id: BlockId) -> bool {
        self.blocks
            .get(id.0 as usize)
            .map(|b| b.is_some())
            .unwrap_or(false)
    }

    pub(super) fn retire_block(&mut self, id: BlockId) {
        self.blocks[id.0 as usize] = None;
        self.block_order.retain(|&b| b != id);
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_some())
            .map(|(i, _)| BlockId(i as u32))
    }

    // --- instruction arena ---

    pub fn alloc_insn(&mut self, insn: Instruction, owner: BlockId) -> InsnId {
        let id = InsnId(self.insns.len() as u32);
        self.insns.push(Some(insn));
        self.insn_owner.push(Some(owner));
        id
    }

    pub fn insn_owner(&self, id: InsnId) -> BlockId {
        self.insn_owner[id.0 as usize]
            .unwrap_or_else(|| bug!("instruction {} was deleted", id))
    }

    /// Reassigns the owning block recorded for `id`, used by the `branches`
    /// pass when it reparents instructions into a merged block.
    pub fn set_insn_owner(&mut self, id: InsnId, owner: BlockId) {
        self.insn_owner[id.0 as usize] = Some(owner);
    }

    pub fn insn(&self, id: InsnId) -> &Instruction {
        self.insns[id.0 as usize]
            .as_ref()
            .unwrap_or_else(|| bug!("instruction {} was deleted", id))
    }

    pub fn insn_mut(&mut self, id: InsnId) -> &mut Instruction {
        let idx = id.0 as usize;
        if self.insns[idx].is_none() {
            bug!("instruction {} was deleted", id);
        }
        self.insns[idx].as_mut().unwrap()
    }

    pub fn insn_exists(&self, id: InsnId) -> bool {
        self.insns
            .get(id.0 as usize)
            .map(|i| i.is_some())
            .unwrap_or(false)
    }

    pub(super) fn retire_insn(&mut self, id: InsnId) {
        self.insns[id.0 as usize] = None;
        self.insn_owner[id.0 as usize] = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_function_has_single_entry_block() {
        let f = Function::new("main");
        assert_eq!(f.block_ids().count(), 1);
        assert_eq!(f.block(f.entry).name, "entry");
    }

    #[test]
    fn alloc_variable_assigns_monotonic_ids() {
        let mut f = Function::new("main");
        let a = f.alloc_variable(Variable::new("a", PrimitiveType::S32));
        let b = f.alloc_variable(Variable::new("b", PrimitiveType::S32));
        assert_eq!(a, VarId(0));
        assert_eq!(b, VarId(1));
    }

    #[test]
    #[should_panic(expected = "[BUG]")]
    fn accessing_deleted_variable_panics() {
        let mut f = Function::new("main");
        let a = f.alloc_variable(Variable::new("a", PrimitiveType::S32));
        f.retire_variable(a);
        f.variable(a);
    }

    #[test]
    fn retiring_block_removes_it_from_block_order() {
        let mut f = Function::new("main");
        let b = f.alloc_block(Block::new("extra"));
        f.block_order.push(b);
        f.retire_block(b);
        assert!(!f.block_order.contains(&b));
        assert!(!f.block_exists(b));
    }
}
