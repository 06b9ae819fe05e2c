//! The optimiser: a fixed-point pipeline of four passes (`spec.md` §4.4).

pub mod branches;
pub mod const_prop;
pub mod dead_code;
pub mod unused_vars;

use crate::ir::Function;

/// Runs `unused_vars -> const_prop -> dead_code -> branches` to a fixed
/// point, rerunning the whole sequence whenever any pass reports a change.
/// Returns whether anything changed across the whole run.
pub fn optimize(f: &mut Function) -> bool {
    let mut changed_overall = false;
    loop {
        let a = unused_vars::run(f);
        let b = const_prop::run(f);
        let c = dead_code::run(f);
        let d = branches::run(f);
        if !(a || b || c || d) {
            break;
        }
        changed_overall = true;
    }
    changed_overall
}
