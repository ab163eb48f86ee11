//! Purging of learned clauses.
//!
//! A purge is prepared by a full run: propagation continues to a total
//! assignment while conflicts are only recorded, one per level. The recorded
//! conflicts are then drained into learned clauses, every learned clause
//! gets a range score judging its usefulness under the full assignment, and
//! the worse half of the learned clauses is deleted.
use log::debug;

use partial_ref::{partial, PartialRef};

use fascicle_formula::Lit;

use crate::analyze::{analyze_conflict, minimize};
use crate::context::{
    AnalyzeConflictP, ClauseDbP, Context, HeapP, ScheduleP, SolverConfigP, TrailP, VarsP,
    WatchlistsP,
};
use crate::trail::backjump;

use super::{install_learned, ClauseIdx};

/// Resolve the conflicts recorded by a full run and delete half of the
/// learned clauses.
pub fn purge(
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
) {
    drain_recorded_conflicts(ctx.borrow());
    score_learned_clauses(ctx.borrow());
    delete_high_ranges(ctx.borrow());

    // Stretch the interval until the next purge.
    let lower_delta = ctx.part(SolverConfigP).lower_delta;
    let schedule = ctx.part_mut(ScheduleP);
    schedule.purge_threshold += schedule.cap_delta;
    schedule.cap_delta += lower_delta;
    schedule.purge_count += 1;
}

/// Analyze the recorded conflicts in reverse level order.
///
/// Every conflict is analyzed at the level it was recorded at. Only the
/// clauses backjumping to the overall minimum level are kept; after a single
/// backjump to that level they are all installed.
fn drain_recorded_conflicts(
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
) {
    let mut min_backjump = usize::max_value();
    let mut pending: Vec<Vec<Lit>> = vec![];

    for level in (1..ctx.part(ScheduleP).recorded_level_count()).rev() {
        if let Some(conflict) = ctx.part(ScheduleP).recorded_conflict(level) {
            let backjump_to = analyze_conflict(ctx.borrow(), conflict, level);
            minimize(ctx.borrow());

            if backjump_to < min_backjump {
                pending.clear();
                min_backjump = backjump_to;
            }
            if backjump_to == min_backjump {
                pending.push(ctx.part(AnalyzeConflictP).clause().to_vec());
            }
        }
    }

    ctx.part_mut(ScheduleP).clear_recorded_conflicts();

    debug_assert!(!pending.is_empty());

    backjump(ctx.borrow(), min_backjump);

    for clause in pending {
        ctx.part_mut(AnalyzeConflictP).replace_clause(&clause);
        install_learned(ctx.borrow(), min_backjump);
    }
}

/// Compute the purge range score of every learned clause.
///
/// The score blends the number of levels on which the clause is satisfied
/// with the number of levels it touches at all, relative to the assignment
/// left by the full run. Reason clauses score 0 and are never deleted; a
/// clause satisfied at level 0 scores 256 and always goes.
fn score_learned_clauses(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut ClauseDbP,
        SolverConfigP,
        VarsP,
    ),
) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let vars = ctx.part(VarsP);
    let alpha = ctx.part(SolverConfigP).clause_alpha;

    let level_stamp = analyze.level_stamp_mut();
    for stamp in level_stamp.iter_mut() {
        *stamp = 0;
    }

    for index in db.learned_start()..db.len() {
        let clause = db.clause_at_mut(index);

        if clause.reason_for().is_some() {
            clause.set_range(0);
            continue;
        }

        // Levels are stamped per clause: `touched_stamp` when the clause
        // touches them, one more once a true literal is credited, so neither
        // levels nor satisfied levels are counted twice.
        let touched_stamp = 2 * (index as u64 + 1);
        let mut satisfied_levels = 0usize;
        let mut touched_levels = 0usize;
        let mut range = None;

        for &lit in clause.lits() {
            let value = vars.data(lit.var()).value;
            if value < 0 {
                continue;
            }
            let level = (value >> 1) as usize;
            let is_true = (value as usize ^ lit.code()) & 1 == 0;

            if level == 0 {
                if is_true {
                    range = Some(256);
                    break;
                }
                continue;
            }

            if level_stamp[level] < touched_stamp {
                level_stamp[level] = touched_stamp;
                touched_levels += 1;
            } else if level_stamp[level] == touched_stamp && is_true {
                level_stamp[level] = touched_stamp + 1;
                satisfied_levels += 1;
            }
        }

        let range = range.unwrap_or_else(|| {
            let blend = 16.0
                * (satisfied_levels as f64
                    + alpha * (touched_levels - satisfied_levels) as f64);
            blend.floor().min(255.0) as u16
        });

        clause.set_range(range);
    }
}

/// Delete every learned clause ranked at or above the median range.
///
/// The cutoff is the smallest range value such that strictly more than half
/// of the scored clauses rank below it. Deletion swaps the last clause into
/// the freed slot and rewrites its watch entries and, for reason clauses,
/// the back-reference of the variable it forces.
fn delete_high_ranges(
    mut ctx: partial!(Context, mut ClauseDbP, mut VarsP, mut WatchlistsP),
) {
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);

    let mut histogram = [0u32; 256];
    for index in db.learned_start()..db.len() {
        let clause = db.clause_at(index);
        if clause.reason_for().is_none() && clause.range() < 256 {
            histogram[clause.range() as usize] += 1;
        }
    }

    let keep_target = (db.len() - db.learned_start()) / 2;
    let mut cutoff = 0usize;
    let mut kept = 0usize;
    while cutoff < 256 && kept <= keep_target {
        kept += histogram[cutoff] as usize;
        cutoff += 1;
    }

    let learned_before = db.len() - db.learned_start();

    let mut index = db.learned_start();
    while index < db.len() {
        if (db.clause_at(index).range() as usize) < cutoff {
            index += 1;
            continue;
        }

        debug_assert!(db.clause_at(index).reason_for().is_none());

        {
            let removed = db.clause_at(index);
            let watchlists = ctx.part_mut(WatchlistsP);
            watchlists.remove_watch(removed.lits()[0], ClauseIdx::from_index(index));
            watchlists.remove_watch(removed.lits()[1], ClauseIdx::from_index(index));
        }

        let last = db.len() - 1;
        db.swap_remove(index);

        if index < db.len() {
            // The clause moved down from the end keeps every back-reference
            // pointing at its new slot.
            let moved = db.clause_at(index);
            let watchlists = ctx.part_mut(WatchlistsP);
            watchlists.remove_watch(moved.lits()[0], ClauseIdx::from_index(last));
            watchlists.remove_watch(moved.lits()[1], ClauseIdx::from_index(last));
            watchlists.add_watch(moved.lits()[0], ClauseIdx::from_index(index));
            watchlists.add_watch(moved.lits()[1], ClauseIdx::from_index(index));

            if let Some(var) = moved.reason_for() {
                ctx.part_mut(VarsP).data_mut(var).reason =
                    Some(ClauseIdx::from_index(index));
            }
        }
    }

    debug!(
        "purge: kept {} of {} learned clauses (cutoff {})",
        db.len() - db.learned_start(),
        learned_before,
        cutoff,
    );
}
