//! Variables: named, typed storage locations tracked with use-def chains
//! (`spec.md` §3) so the Mutator and optimizer passes never need to rescan
//! a function to answer "who uses this?" or "who defines this?".

use std::collections::BTreeSet;

use super::ids::InsnId;
use super::types::PrimitiveType;

#[derive(Debug, Clone)]
pub struct Variable {
    pub ty: PrimitiveType,
    pub name: String,
    /// Instructions that read this variable, in insertion order... except
    /// order doesn't matter for uses (unlike block predecessor order), so a
    /// `BTreeSet` keeps it deduplicated and cheap to diff.
    pub uses: BTreeSet<InsnId>,
    /// Instructions that write this variable. Before `ssa::to_ssa` runs this
    /// may hold more than one entry; after SSA conversion every live
    /// variable has exactly one.
    pub defs: Vec<InsnId>,
}

impl Variable {
    pub fn new(name: impl Into<String>, ty: PrimitiveType) -> Self {
        Variable {
            ty,
            name: name.into(),
            uses: BTreeSet::new(),
            defs: Vec::new(),
        }
    }

    pub fn is_ssa(&self) -> bool {
        self.defs.len() <= 1
    }

    pub fn is_unused(&self) -> bool {
        self.uses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_variable_has_no_uses_or_defs() {
        let v = Variable::new("x", PrimitiveType::S32);
        assert!(v.is_unused());
        assert!(v.is_ssa());
    }

    #[test]
    fn multiple_defs_is_not_ssa() {
        let mut v = Variable::new("x", PrimitiveType::S32);
        v.defs.push(InsnId(0));
        v.defs.push(InsnId(1));
        assert!(!v.is_ssa());
    }
}
