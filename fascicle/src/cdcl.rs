//! The conflict driven clause learning search loop.
use log::info;

use partial_ref::{partial, PartialRef};

use crate::analyze::{analyze_conflict, minimize};
use crate::clause::purge::purge;
use crate::clause::{install_learned, ClauseIdx};
use crate::context::{
    AnalyzeConflictP, ClauseDbP, Context, HeapP, ScheduleP, SolverConfigP, SolverStateP,
    TmpDataP, TrailP, VarsP, WatchlistsP,
};
use crate::decision::make_decision;
use crate::prop::propagate;
use crate::schedule::flush;
use crate::state::SatState;
use crate::trail::backjump;

/// Run the search until the formula is solved.
pub fn search(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut ClauseDbP,
        mut HeapP,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VarsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    while ctx.part(SolverStateP).sat_state == SatState::Unknown {
        search_step(ctx.borrow());
    }
}

/// One round of the solver state machine.
///
/// At quiescence either the formula is solved, a full run resolves into a
/// purge, or the purge and flush schedules are consulted and a new decision
/// is made. Afterwards the trail is propagated until it is either exhausted
/// or a conflict was resolved by learning a new clause.
fn search_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut ClauseDbP,
        mut HeapP,
        mut ScheduleP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VarsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
) {
    if ctx.part(TrailP).fully_propagated() {
        if ctx.part(TrailP).len() == ctx.part(VarsP).count() {
            // A total assignment: either the formula is solved, or the
            // conflicts ignored during a full run are still to be resolved.
            if ctx.part(ScheduleP).full_run {
                ctx.part_mut(ScheduleP).full_run = false;
                if ctx.part(ScheduleP).has_recorded_conflicts() {
                    purge(ctx.borrow());
                    return;
                }
            }
            ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
            return;
        }

        // A full run must reach a total assignment undisturbed: a flush
        // would unassign literals the recorded conflicts refer to.
        let schedule = ctx.part(ScheduleP);
        if !schedule.full_run {
            if schedule.total_learned > schedule.purge_threshold {
                ctx.part_mut(ScheduleP).start_full_run();
            } else if schedule.total_learned >= schedule.flush_threshold {
                flush(ctx.borrow());
            }
        }

        make_decision(ctx.borrow());
    }

    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        if let Err(conflict) = propagate(ctx.borrow(), lit) {
            if ctx.part(TrailP).depth() == 0 {
                ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
                return;
            }
            conflict_step(ctx.borrow(), conflict);
        }
    }
}

/// Resolve a conflict: learn an asserting clause and backjump.
fn conflict_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut ClauseDbP,
        mut HeapP,
        mut ScheduleP,
        mut TrailP,
        mut VarsP,
        mut WatchlistsP,
        SolverConfigP,
    ),
    conflict: ClauseIdx,
) {
    let depth = ctx.part(TrailP).depth();

    let backjump_to = analyze_conflict(ctx.borrow(), conflict, depth);
    backjump(ctx.borrow(), backjump_to);
    minimize(ctx.borrow());
    install_learned(ctx.borrow(), backjump_to);

    let schedule = ctx.part_mut(ScheduleP);
    schedule.conflict_count += 1;
    if schedule.conflict_count % 5000 == 0 {
        info!(
            "confl: {}k learned: {} purges: {} flushes: {} agility: {:.3}",
            schedule.conflict_count / 1000,
            schedule.total_learned,
            schedule.purge_count,
            schedule.flush_count,
            schedule.agility as f64 / 4294967296.0,
        );
    }
}
