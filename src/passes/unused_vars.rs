//! Unused-variable elimination (`spec.md` §4.4).

use crate::ir::mutator::variable_delete;
use crate::ir::Function;

/// Deletes every variable with an empty use-set, repeating until one full
/// pass deletes nothing (deleting a variable can empty out another's
/// use-set in turn, e.g. `u = ADD(v, w)` unused → deleting `u` may leave
/// `v`/`w` unused too).
pub fn run(f: &mut Function) -> bool {
    let mut changed_overall = false;
    loop {
        let dead: Vec<_> = f
            .variable_ids()
            .filter(|&v| f.variable(v).is_unused())
            .collect();
        if dead.is_empty() {
            break;
        }
        for v in dead {
            if f.variable_exists(v) {
                variable_delete(f, v);
            }
        }
        changed_overall = true;
    }
    changed_overall
}
