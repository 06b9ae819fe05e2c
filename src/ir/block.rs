//! Basic blocks: an ordered instruction list plus an optional terminator,
//! and the predecessor/successor edges `flow::recalc_flow` maintains.
//!
//! A label, instructions, and terminator, generalized to this IR's
//! separate `Flow`-as-call case: a call is appended to `insns` like any
//! other instruction, and only jumps, branches, and returns ever occupy
//! `terminator`.

use crate::common::ordered_set::OrderedSet;

use super::ids::{BlockId, InsnId};

#[derive(Debug, Clone)]
pub struct Block {
    pub name: String,
    pub insns: Vec<InsnId>,
    pub terminator: Option<InsnId>,
    pub preds: OrderedSet<BlockId>,
    pub succs: OrderedSet<BlockId>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Block {
            name: name.into(),
            insns: Vec::new(),
            terminator: None,
            preds: OrderedSet::new(),
            succs: OrderedSet::new(),
        }
    }

    /// All instructions in the block in execution order, including the
    /// terminator if present.
    pub fn all_insns(&self) -> Vec<InsnId> {
        let mut all = self.insns.clone();
        if let Some(term) = self.terminator {
            all.push(term);
        }
        all
    }

    pub fn is_empty_of_body(&self) -> bool {
        self.insns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_block_has_no_terminator() {
        let b = Block::new("entry");
        assert!(b.terminator.is_none());
        assert!(b.is_empty_of_body());
    }

    #[test]
    fn all_insns_appends_terminator_last() {
        let mut b = Block::new("entry");
        b.insns.push(InsnId(0));
        b.insns.push(InsnId(1));
        b.terminator = Some(InsnId(2));
        assert_eq!(b.all_insns(), vec![InsnId(0), InsnId(1), InsnId(2)]);
    }
}
