//! Loading a formula into the solver.
use partial_ref::{partial, PartialRef};

use fascicle_formula::Lit;

use crate::context::{
    ClauseDbP, Context, ScheduleP, SolverStateP, TmpDataP, TrailP, VarsP, WatchlistsP,
};
use crate::state::SatState;
use crate::trail::enqueue_forced;

/// Add a clause of the input formula.
///
/// Removes duplicated literals, skips tautological clauses (e.g. x v -x v y)
/// and dispatches between empty, unit and long clauses. Unit literals go
/// directly on the trail; an empty clause or a unit contradicting an earlier
/// one makes the formula unsatisfiable right away.
pub fn load_clause(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VarsP,
        mut WatchlistsP,
    ),
    lits: &[Lit],
) {
    if ctx.part(SolverStateP).sat_state == SatState::Unsat {
        return;
    }

    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);

    tmp.lits.clear();
    tmp.lits.extend_from_slice(lits);
    tmp.lits.sort_unstable();
    tmp.lits.dedup();

    // Detect tautological clauses; complements are adjacent after sorting.
    let mut last = None;
    for &lit in tmp.lits.iter() {
        if last == Some(!lit) {
            return;
        }
        last = Some(lit);
    }

    match tmp.lits[..] {
        [] => ctx.part_mut(SolverStateP).sat_state = SatState::Unsat,
        [lit] => {
            if ctx.part(VarsP).lit_is_false(lit) {
                ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            } else {
                enqueue_forced(ctx.borrow(), lit, None);
            }
        }
        _ => {
            let watched = [tmp.lits[0], tmp.lits[1]];
            let idx = ctx.part_mut(ClauseDbP).add_clause(tmp.lits.clone());
            ctx.part_mut(WatchlistsP).watch_clause(idx, watched);
        }
    }
}
