//! Boolean satisfiability solver.
use std::time::{SystemTime, UNIX_EPOCH};

use partial_ref::{IntoPartialRef, IntoPartialRefMut, PartialRef};

use log::info;

use fascicle_formula::{CnfFormula, Lit, Var};

use crate::cdcl::search;
use crate::config::{SolverConfig, SolverConfigUpdate};
use crate::context::{
    config_changed, set_var_count, ClauseDbP, Context, HeapP, ScheduleP, SolverConfigP,
    SolverStateP, VarsP,
};
use crate::decision::initialize_heap;
use crate::load::load_clause;
use crate::state::SatState;

/// Outcome of a solver run.
///
/// A satisfiable formula comes with a total assignment, indexed by the
/// 0-based variable index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Solution {
    Sat(Vec<bool>),
    Unsat,
}

impl Solution {
    pub fn is_sat(&self) -> bool {
        match self {
            Solution::Sat(_) => true,
            Solution::Unsat => false,
        }
    }

    /// The satisfying assignment, if any.
    pub fn assignment(&self) -> Option<&[bool]> {
        match self {
            Solution::Sat(values) => Some(values),
            Solution::Unsat => None,
        }
    }
}

/// A boolean satisfiability solver.
pub struct Solver {
    ctx: Box<Context>,
}

impl Solver {
    /// Create a solver for the given formula, seeded from the system clock.
    pub fn new(formula: &CnfFormula) -> Solver {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(0);
        Solver::with_config(formula, SolverConfig::default(), seed)
    }

    /// Create a solver with a fixed seed.
    ///
    /// Runs with the same formula and seed are deterministic.
    pub fn with_seed(formula: &CnfFormula, seed: u64) -> Solver {
        Solver::with_config(formula, SolverConfig::default(), seed)
    }

    /// Create a solver with a custom configuration and a fixed seed.
    pub fn with_config(formula: &CnfFormula, config: SolverConfig, seed: u64) -> Solver {
        let mut solver = Solver {
            ctx: Box::new(Context::default()),
        };

        let mut ctx = solver.ctx.into_partial_ref_mut();

        let cap_delta = config.cap_delta;
        *ctx.part_mut(SolverConfigP) = config;
        config_changed(ctx.borrow());

        set_var_count(ctx.borrow(), formula.var_count());
        ctx.part_mut(ScheduleP).init_purge_threshold(cap_delta);
        ctx.part_mut(HeapP).set_seed(seed);

        for clause in formula.iter() {
            load_clause(ctx.borrow(), clause);
        }
        ctx.part_mut(ClauseDbP).mark_learned_start();

        // Feeding the variables to the heap in a random order keeps
        // repeated runs from always following the same path.
        initialize_heap(ctx.borrow());

        info!(
            "loaded formula with {} variables and {} clauses",
            formula.var_count(),
            formula.len()
        );

        drop(ctx);
        solver
    }

    /// Apply a configuration update.
    pub fn config(&mut self, update: &SolverConfigUpdate) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        update.apply(ctx.part_mut(SolverConfigP));
        config_changed(ctx.borrow());
    }

    /// Decide the formula's satisfiability.
    ///
    /// Returns the verdict together with a total assignment when satisfiable.
    /// All failure conditions, including contradictions detected while the
    /// formula was loaded, surface as [`Solution::Unsat`].
    pub fn solve(&mut self) -> Solution {
        let mut ctx = self.ctx.into_partial_ref_mut();

        search(ctx.borrow());

        match ctx.part(SolverStateP).sat_state {
            SatState::Sat => {
                let vars = ctx.part(VarsP);
                let values = (0..vars.count())
                    .map(|index| {
                        debug_assert!(!vars.is_free(Var::from_index(index)));
                        vars.data(Var::from_index(index)).value & 1 == 0
                    })
                    .collect();
                Solution::Sat(values)
            }
            SatState::Unsat => Solution::Unsat,
            SatState::Unknown => unreachable!("search finished in unknown state"),
        }
    }

    /// The satisfying assignment as a set of literals.
    ///
    /// Available once [`solve`](Solver::solve) returned a SAT verdict.
    pub fn model(&self) -> Option<Vec<Lit>> {
        let ctx = self.ctx.into_partial_ref();
        if ctx.part(SolverStateP).sat_state != SatState::Sat {
            return None;
        }
        let vars = ctx.part(VarsP);
        Some(
            (0..vars.count())
                .map(|index| vars.assigned_lit(Var::from_index(index)))
                .collect(),
        )
    }
}
