//! Scheduling of purges and agility-driven trail flushes.
use log::debug;

use partial_ref::{partial, PartialRef};

use crate::clause::ClauseIdx;
use crate::context::{
    ClauseDbP, Context, HeapP, ScheduleP, SolverConfigP, TrailP, VarsP,
};
use crate::decision::query_max_free_activity;
use crate::trail::backjump;

/// Counters driving purges, full runs and trail flushes.
pub struct Schedule {
    /// Conflicts are currently only recorded instead of resolved.
    pub full_run: bool,
    /// First conflict seen per level during a full run.
    conflicts: Vec<Option<ClauseIdx>>,

    /// Learned clauses over the lifetime of the solver, units included.
    pub total_learned: u64,
    /// Learned-clause count that triggers the next purge.
    pub purge_threshold: u64,
    /// Increment of the purge threshold, itself growing after every purge.
    pub cap_delta: u64,

    /// Learned-clause count at which the flush counters advance.
    pub flush_threshold: u64,
    /// Reluctant-doubling state (Knuth's u and v).
    uf: u64,
    vf: u64,
    /// Agility bound below which a flush fires, as a 32-bit fixed point.
    theta_f: u64,
    /// Exponential moving average of polarity flips, 32-bit fixed point.
    pub agility: u64,

    // counters for progress reporting
    pub conflict_count: u64,
    pub purge_count: u64,
    pub flush_count: u64,
}

impl Default for Schedule {
    fn default() -> Schedule {
        Schedule {
            full_run: false,
            conflicts: vec![],
            total_learned: 0,
            purge_threshold: 0,
            cap_delta: 0,
            flush_threshold: 1,
            uf: 1,
            vf: 1,
            theta_f: 1,
            agility: 0,
            conflict_count: 0,
            purge_count: 0,
            flush_count: 0,
        }
    }
}

impl Schedule {
    /// Set the initial purge threshold and its increment.
    pub fn init_purge_threshold(&mut self, cap_delta: u64) {
        self.cap_delta = cap_delta;
        self.purge_threshold = cap_delta;
    }

    /// Make sure the conflict record covers the given number of levels.
    pub fn ensure_level_count(&mut self, count: usize) {
        if self.conflicts.len() < count {
            self.conflicts.resize(count, None);
        }
    }

    /// Enter full-run mode, forgetting previously recorded conflicts.
    pub fn start_full_run(&mut self) {
        self.full_run = true;
        for conflict in self.conflicts.iter_mut() {
            *conflict = None;
        }
    }

    /// Record the first conflict encountered at a level during a full run.
    pub fn record_conflict(&mut self, level: usize, clause: ClauseIdx) {
        self.ensure_level_count(level + 1);
        let slot = &mut self.conflicts[level];
        if slot.is_none() {
            *slot = Some(clause);
        }
    }

    pub fn has_recorded_conflicts(&self) -> bool {
        self.conflicts.iter().any(|conflict| conflict.is_some())
    }

    pub fn recorded_level_count(&self) -> usize {
        self.conflicts.len()
    }

    pub fn recorded_conflict(&self, level: usize) -> Option<ClauseIdx> {
        self.conflicts[level]
    }

    pub fn clear_recorded_conflicts(&mut self) {
        for conflict in self.conflicts.iter_mut() {
            *conflict = None;
        }
    }

    /// Update the agility for one assignment.
    ///
    /// `flipped` is 1 when the assignment flipped the variable's saved
    /// polarity. The result is an exponential moving average in
    /// [0, 2^32) with a half-life of roughly 2^13 assignments.
    pub fn update_agility(&mut self, flipped: u64) {
        self.agility = self.agility - (self.agility >> 13) + (flipped << 19);
    }
}

/// Advance the flush schedule and cut the trail back when the search has
/// gone stale.
///
/// Called whenever the learned-clause total crosses the flush threshold. The
/// threshold follows the reluctant-doubling sequence, with the agility bound
/// reset on every sequence restart and grown by 17/16 otherwise. The flush
/// itself fires only when the agility signals stagnation, and backjumps to
/// the deepest level whose decision still outranks the best free variable.
pub fn flush(
    mut ctx: partial!(
        Context,
        mut ClauseDbP,
        mut HeapP,
        mut ScheduleP,
        mut TrailP,
        mut VarsP,
        SolverConfigP,
    ),
) {
    {
        let (schedule, mut ctx) = ctx.split_part_mut(ScheduleP);

        schedule.flush_threshold += schedule.vf;
        if schedule.uf & schedule.uf.wrapping_neg() == schedule.vf {
            schedule.uf += 1;
            schedule.vf = 1;
            let psi = ctx.part(SolverConfigP).psi;
            schedule.theta_f = (psi * 4294967296.0) as u64;
        } else {
            schedule.vf <<= 1;
            schedule.theta_f += schedule.theta_f >> 4;
        }

        if schedule.agility > schedule.theta_f {
            return;
        }
    }

    let max_free_activity = match query_max_free_activity(ctx.borrow()) {
        Some(activity) => activity,
        None => return,
    };

    let depth = ctx.part(TrailP).depth();
    let mut target = 0;
    while target < depth {
        let decision = ctx
            .part(TrailP)
            .lit_at(ctx.part(TrailP).level_start(target + 1));
        if ctx.part(HeapP).activity(decision.var()) >= max_free_activity {
            target += 1;
        } else {
            break;
        }
    }

    if target < depth {
        debug!("flush: trail cut from level {} to {}", depth, target);
        ctx.part_mut(ScheduleP).flush_count += 1;
        backjump(ctx.borrow(), target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reluctant_doubling_drives_the_flush_threshold() {
        // the (uf & -uf) == vf recurrence yields Knuth's sequence
        // 1, 1, 2, 1, 1, 2, 4, 1, ...
        let mut schedule = Schedule::default();
        let mut increments = vec![];

        for _ in 0..14 {
            let before = schedule.flush_threshold;
            schedule.flush_threshold += schedule.vf;
            if schedule.uf & schedule.uf.wrapping_neg() == schedule.vf {
                schedule.uf += 1;
                schedule.vf = 1;
            } else {
                schedule.vf <<= 1;
            }
            increments.push(schedule.flush_threshold - before);
        }

        assert_eq!(increments, vec![1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4]);
    }

    #[test]
    fn agility_saturates_below_the_fixed_point_range() {
        let mut schedule = Schedule::default();

        for _ in 0..1_000_000 {
            schedule.update_agility(1);
        }

        // equilibrium of the moving average is 2^19 * 2^13 = 2^32
        assert!(schedule.agility <= 1u64 << 32);
        assert!(schedule.agility > (1u64 << 32) - (1u64 << 20));

        for _ in 0..1_000_000 {
            schedule.update_agility(0);
        }

        // integer truncation stalls the decay below 2^13
        assert!(schedule.agility < 1u64 << 13);
    }

    #[test]
    fn conflict_recording_keeps_the_first_conflict_per_level() {
        let mut schedule = Schedule::default();
        schedule.start_full_run();

        schedule.record_conflict(2, ClauseIdx::from_index(7));
        schedule.record_conflict(2, ClauseIdx::from_index(9));
        schedule.record_conflict(4, ClauseIdx::from_index(3));

        assert!(schedule.has_recorded_conflicts());
        assert_eq!(schedule.recorded_conflict(2), Some(ClauseIdx::from_index(7)));
        assert_eq!(schedule.recorded_conflict(4), Some(ClauseIdx::from_index(3)));
        assert_eq!(schedule.recorded_conflict(3), None);

        schedule.clear_recorded_conflicts();
        assert!(!schedule.has_recorded_conflicts());
    }
}
