//! Solver-wide state.
//!
//! One [`Context`] owns every component of the solver. The broadcast helpers
//! at the bottom (variable count changes, configuration changes) touch many
//! components at once; a new part usually means another line in them.
use partial_ref::{part, partial, PartialRef, PartialRefTarget};

use crate::analyze::AnalyzeConflict;
use crate::clause::ClauseDb;
use crate::config::SolverConfig;
use crate::decision::ActivityHeap;
use crate::schedule::Schedule;
use crate::state::SolverState;
use crate::tmp::TmpData;
use crate::trail::Trail;
use crate::vars::Vars;
use crate::watch::Watchlists;

/// One `part!` marker per [`Context`] field.
pub mod parts {
    use super::*;

    part!(pub AnalyzeConflictP: AnalyzeConflict);
    part!(pub ClauseDbP: ClauseDb);
    part!(pub HeapP: ActivityHeap);
    part!(pub ScheduleP: Schedule);
    part!(pub SolverConfigP: SolverConfig);
    part!(pub SolverStateP: SolverState);
    part!(pub TmpDataP: TmpData);
    part!(pub TrailP: Trail);
    part!(pub VarsP: Vars);
    part!(pub WatchlistsP: Watchlists);
}

pub use parts::*;

/// Everything the solver owns.
///
/// Components cross-reference each other constantly (propagation touches the
/// trail, the clause database and the watch lists in one pass), so functions
/// take a `partial!` reference naming exactly the parts they read and write
/// instead of a pile of `&mut` parameters. The part list doubles as
/// documentation of each routine's data dependencies.
#[derive(PartialRefTarget, Default)]
pub struct Context {
    #[part(AnalyzeConflictP)]
    pub analyze_conflict: AnalyzeConflict,
    #[part(ClauseDbP)]
    pub clause_db: ClauseDb,
    #[part(HeapP)]
    pub heap: ActivityHeap,
    #[part(ScheduleP)]
    pub schedule: Schedule,
    #[part(SolverConfigP)]
    pub solver_config: SolverConfig,
    #[part(SolverStateP)]
    pub solver_state: SolverState,
    #[part(TmpDataP)]
    pub tmp_data: TmpData,
    #[part(TrailP)]
    pub trail: Trail,
    #[part(VarsP)]
    pub vars: Vars,
    #[part(WatchlistsP)]
    pub watchlists: Watchlists,
}

/// Update structures for a new variable count.
pub fn set_var_count(
    mut ctx: partial!(Context, mut HeapP, mut VarsP, mut WatchlistsP),
    count: usize,
) {
    ctx.part_mut(VarsP).set_var_count(count);
    ctx.part_mut(WatchlistsP).set_var_count(count);
    ctx.part_mut(HeapP).set_var_count(count);
}

/// The solver configuration has changed.
pub fn config_changed(mut ctx: partial!(Context, mut HeapP, SolverConfigP)) {
    let (config, mut ctx) = ctx.split_part(SolverConfigP);
    let heap = ctx.part_mut(HeapP);
    heap.set_decay(config.rho);
    heap.set_random_rate(config.random_decision_rate);
    heap.set_rescale_limit(config.rescale_limit);
}
