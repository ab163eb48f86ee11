//! Unit propagation with two watched literals.
//!
//! Each clause watches the literals in its positions 0 and 1. Assigning a
//! literal can only falsify clauses that watch its complement, so only those
//! watch lists are scanned. For each such clause the watch is either moved to
//! a non-false literal, or the clause has become unit and forces its other
//! watched literal, or it has become empty and reports a conflict.
//!
//! Watches are not updated on backjumping: unassigning literals cannot
//! falsify anything, so the invariant repairs itself.
use partial_ref::{partial, PartialRef};

use fascicle_formula::Lit;

use crate::clause::ClauseIdx;
use crate::context::{
    ClauseDbP, Context, ScheduleP, TmpDataP, TrailP, VarsP, WatchlistsP,
};
use crate::trail::enqueue_forced;

enum Watched {
    /// The clause is satisfied through its other watched literal.
    Satisfied,
    /// The watch moved to a non-false literal.
    Moved,
    /// The clause became unit and forces this literal.
    Forcing(Lit),
    /// Every literal of the clause is false.
    Conflict,
}

/// Propagate one literal taken from the trail.
///
/// Scans every clause watching the complement of `lit` and restores the
/// watch invariant for each. Forced literals extend the trail; the caller
/// keeps propagating until the queue is empty.
///
/// Returns the conflicting clause on conflict. During a full run conflicts
/// above level 0 are only recorded for the purge and propagation carries on.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut ScheduleP,
        mut TmpDataP,
        mut TrailP,
        mut VarsP,
        mut WatchlistsP,
    ),
    lit: Lit,
) -> Result<(), ClauseIdx> {
    let false_lit = !lit;

    // The watch list shrinks and grows while its clauses are processed, so
    // iterate over a snapshot.
    let (tmp, mut ctx) = ctx.split_part_mut(TmpDataP);
    tmp.watch_scratch.clear();
    tmp.watch_scratch
        .extend_from_slice(ctx.part(WatchlistsP).watched_by(false_lit));

    for &clause_idx in tmp.watch_scratch.iter() {
        let watched = {
            let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
            let (vars, mut ctx) = ctx.split_part(VarsP);

            let lits = db.clause_mut(clause_idx).lits_mut();

            // The falsified literal belongs into position 1; conditional
            // swap without a branch.
            let swap = (lits[1] != false_lit) as usize;
            lits.swap(0, swap);
            debug_assert_eq!(lits[1], false_lit);

            let first = lits[0];
            if vars.lit_is_true(first) {
                Watched::Satisfied
            } else {
                match (2..lits.len()).find(|&i| !vars.lit_is_false(lits[i])) {
                    Some(replacement_pos) => {
                        let replacement = lits[replacement_pos];
                        lits.swap(1, replacement_pos);
                        let watchlists = ctx.part_mut(WatchlistsP);
                        watchlists.add_watch(replacement, clause_idx);
                        watchlists.remove_watch(false_lit, clause_idx);
                        Watched::Moved
                    }
                    None if vars.lit_is_free(first) => Watched::Forcing(first),
                    None => Watched::Conflict,
                }
            }
        };

        match watched {
            Watched::Satisfied | Watched::Moved => {}
            Watched::Forcing(first) => {
                enqueue_forced(ctx.borrow(), first, Some(clause_idx));
            }
            Watched::Conflict => {
                let depth = ctx.part(TrailP).depth();
                if ctx.part(ScheduleP).full_run && depth > 0 {
                    // Full runs collect conflicts for the purge instead of
                    // resolving them.
                    ctx.part_mut(ScheduleP).record_conflict(depth, clause_idx);
                } else {
                    return Err(clause_idx);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use fascicle_formula::{lit, lits, var};

    use crate::context::set_var_count;
    use crate::trail::enqueue_decision;

    fn install(ctx: &mut Context, lits: &[Lit]) -> ClauseIdx {
        let idx = ctx.clause_db.add_clause(lits.to_vec());
        ctx.watchlists.watch_clause(idx, [lits[0], lits[1]]);
        idx
    }

    fn propagate_all(
        mut ctx: partial!(
            Context,
            mut ClauseDbP,
            mut ScheduleP,
            mut TmpDataP,
            mut TrailP,
            mut VarsP,
            mut WatchlistsP,
        ),
    ) -> Result<(), ClauseIdx> {
        while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
            propagate(ctx.borrow(), lit)?;
        }
        Ok(())
    }

    #[test]
    fn forces_unit_clauses_along_a_chain() {
        let mut ctx = Context::default();
        ctx.watchlists.set_var_count(4);
        install(&mut ctx, &lits![-1, 2]);
        install(&mut ctx, &lits![-2, 3]);
        install(&mut ctx, &lits![-3, 4]);

        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 4);

        ctx.part_mut(TrailP).new_level();
        enqueue_decision(ctx.borrow(), var!(1));

        assert_eq!(propagate_all(ctx.borrow()), Ok(()));

        let vars = ctx.part(VarsP);
        for lit in lits![1, 2, 3, 4].iter() {
            assert!(vars.lit_is_true(*lit));
        }
        assert_eq!(ctx.part(TrailP).len(), 4);
    }

    #[test]
    fn moves_watches_to_unassigned_literals() {
        let mut ctx = Context::default();
        ctx.watchlists.set_var_count(3);
        let idx = install(&mut ctx, &lits![1, 2, 3]);

        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 3);

        // flip the saved phase so the decision assigns -2
        ctx.part_mut(VarsP).data_mut(var!(2)).oval = 1;
        ctx.part_mut(TrailP).new_level();
        enqueue_decision(ctx.borrow(), var!(2));

        assert_eq!(propagate_all(ctx.borrow()), Ok(()));

        // the watch on 2 moved to 3
        assert!(ctx.part(WatchlistsP).watched_by(lit!(2)).is_empty());
        assert_eq!(ctx.part(WatchlistsP).watched_by(lit!(3)), [idx]);
        assert_eq!(ctx.part(WatchlistsP).watched_by(lit!(1)), [idx]);
        assert!(ctx.part(VarsP).is_free(var!(1)));
        assert!(ctx.part(VarsP).is_free(var!(3)));
    }

    #[test]
    fn reports_conflicts() {
        let mut ctx = Context::default();
        ctx.watchlists.set_var_count(2);
        install(&mut ctx, &lits![-1, 2]);
        let conflicting = install(&mut ctx, &lits![-1, -2]);

        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 2);

        ctx.part_mut(TrailP).new_level();
        enqueue_decision(ctx.borrow(), var!(1));

        assert_eq!(propagate_all(ctx.borrow()), Err(conflicting));
    }

    #[test]
    fn full_run_records_instead_of_failing() {
        let mut ctx = Context::default();
        ctx.watchlists.set_var_count(2);
        install(&mut ctx, &lits![-1, 2]);
        let conflicting = install(&mut ctx, &lits![-1, -2]);

        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 2);
        ctx.part_mut(ScheduleP).start_full_run();

        ctx.part_mut(TrailP).new_level();
        enqueue_decision(ctx.borrow(), var!(1));

        assert_eq!(propagate_all(ctx.borrow()), Ok(()));
        assert_eq!(
            ctx.part(ScheduleP).recorded_conflict(1),
            Some(conflicting)
        );
    }
}
