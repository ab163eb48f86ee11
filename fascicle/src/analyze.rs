//! Conflict analysis: First-UIP resolution and clause minimization.
use partial_ref::{partial, PartialRef};

use fascicle_formula::Lit;

use crate::clause::{ClauseDb, ClauseIdx};
use crate::context::{
    AnalyzeConflictP, ClauseDbP, Context, HeapP, SolverConfigP, TrailP, VarsP,
};
use crate::vars::Vars;

/// Temporaries for conflict analysis.
#[derive(Default)]
pub struct AnalyzeConflict {
    /// The learned clause; position 0 is the asserting literal.
    clause: Vec<Lit>,
    /// Copy of the conflicting clause under analysis.
    conflict_lits: Vec<Lit>,
    /// Generation counter; each analysis reserves three successive values.
    stamp: u64,
    /// Per-level stamps, `stamp` when one clause literal sits at the level
    /// and `stamp + 1` when two or more do. Also reused as scratch by the
    /// purge range computation.
    level_stamp: Vec<u64>,
    /// Stamped literals at the conflict level still awaiting resolution.
    pending: usize,
    /// Deepest level below the conflict level seen in the clause.
    backjump_level: usize,
}

impl AnalyzeConflict {
    /// The learned clause.
    pub fn clause(&self) -> &[Lit] {
        &self.clause
    }

    pub fn clause_mut(&mut self) -> &mut Vec<Lit> {
        &mut self.clause
    }

    /// Load a previously produced clause back into the analysis buffer.
    pub fn replace_clause(&mut self, lits: &[Lit]) {
        self.clause.clear();
        self.clause.extend_from_slice(lits);
    }

    /// Per-level stamp scratch, indexed by decision level.
    pub fn level_stamp_mut(&mut self) -> &mut Vec<u64> {
        &mut self.level_stamp
    }

    /// Make sure the per-level stamps cover the given number of levels.
    pub fn ensure_level_count(&mut self, count: usize) {
        if self.level_stamp.len() < count {
            self.level_stamp.resize(count, 0);
        }
    }
}

/// Learn a new clause from the given conflicting clause.
///
/// `depth` is the level the conflict occurred at; during normal search this
/// is the current depth, while purge draining analyzes recorded conflicts at
/// their recorded levels. Returns the backjump level: the maximum level among
/// the non-asserting literals of the learned clause, 0 for a unit.
pub fn analyze_conflict(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut ClauseDbP,
        mut HeapP,
        mut VarsP,
        SolverConfigP,
        TrailP,
    ),
    conflict: ClauseIdx,
    depth: usize,
) -> usize {
    debug_assert!(depth > 0);

    {
        let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);

        // Three stamp values per analysis; reset everything before the
        // counter can wrap.
        if analyze.stamp >= u64::max_value() - 3 {
            analyze.stamp = 0;
            ctx.part_mut(VarsP).clear_stamps();
        }
        analyze.stamp += 3;

        analyze.pending = 0;
        analyze.backjump_level = 0;
        analyze.clause.clear();
        analyze.clause.push(Lit::from_code(0));
        for level_stamp in analyze.level_stamp.iter_mut() {
            *level_stamp = 0;
        }

        analyze.conflict_lits.clear();
        analyze
            .conflict_lits
            .extend_from_slice(ctx.part(ClauseDbP).clause(conflict).lits());
    }

    // The first literal is stamped and bumped like the others but kept out
    // of the pending count: the trail walk below decrements the count for
    // every stamped literal it pops, so exempting one literal makes it stop
    // exactly when a single literal of the conflict level is left.
    {
        let stamp = ctx.part(AnalyzeConflictP).stamp;
        let first = ctx.part(AnalyzeConflictP).conflict_lits[0];
        ctx.part_mut(VarsP).data_mut(first.var()).stamp = stamp;
        ctx.part_mut(HeapP).bump(first.var());
    }

    for i in 1..ctx.part(AnalyzeConflictP).conflict_lits.len() {
        let lit = ctx.part(AnalyzeConflictP).conflict_lits[i];
        resolve_literal(ctx.borrow(), lit, depth);
    }

    // Reason clauses participating in the resolution are bumped, with later
    // conflicts weighing more.
    let clause_bump = ctx
        .part(SolverConfigP)
        .clause_rho
        .powi(-(ctx.part(ClauseDbP).learned_count() as i32));

    let mut position = 0;
    {
        let vars = ctx.part(VarsP);
        let analyze = ctx.part(AnalyzeConflictP);
        for &lit in analyze.conflict_lits.iter() {
            position = position.max(vars.data(lit.var()).tloc as isize);
        }
    }

    // Walk the trail backwards, resolving each stamped literal with its
    // reason until only the UIP is left.
    while ctx.part(AnalyzeConflictP).pending > 0 {
        let lit = ctx.part(TrailP).lit_at(position as usize);
        position -= 1;

        let stamp = ctx.part(AnalyzeConflictP).stamp;
        if ctx.part(VarsP).data(lit.var()).stamp != stamp {
            continue;
        }

        ctx.part_mut(AnalyzeConflictP).pending -= 1;

        if let Some(reason) = ctx.part(VarsP).data(lit.var()).reason {
            let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
            let clause = db.clause_mut(reason);
            clause.bump_activity(clause_bump);
            for i in 1..clause.lits().len() {
                let reason_lit = clause.lits()[i];
                resolve_literal(ctx.borrow(), reason_lit, depth);
            }
        }
    }

    // The next stamped literal further down the trail is the UIP; its
    // complement becomes the asserting literal.
    let stamp = ctx.part(AnalyzeConflictP).stamp;
    let uip = loop {
        let lit = ctx.part(TrailP).lit_at(position as usize);
        position -= 1;
        if ctx.part(VarsP).data(lit.var()).stamp == stamp {
            break lit;
        }
    };

    let analyze = ctx.part_mut(AnalyzeConflictP);
    analyze.clause[0] = !uip;
    analyze.backjump_level
}

/// Process one literal of a clause participating in the resolution.
///
/// Level-0 literals vanish from the resolvent. Literals at the conflict
/// level join the pending count, all others go into the learned clause with
/// their level stamped for the minimizer.
fn resolve_literal(
    mut ctx: partial!(Context, mut AnalyzeConflictP, mut HeapP, mut VarsP),
    lit: Lit,
    depth: usize,
) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let (vars, mut ctx) = ctx.split_part_mut(VarsP);

    let data = vars.data_mut(lit.var());
    if data.stamp == analyze.stamp {
        return;
    }
    data.stamp = analyze.stamp;

    debug_assert!(data.value >= 0);
    // Every literal fed into the resolution is false, i.e. the complement
    // of what its variable is assigned to.
    debug_assert!((data.value as usize ^ lit.code()) & 1 != 0);
    let level = (data.value >> 1) as usize;
    if level == 0 {
        return;
    }

    ctx.part_mut(HeapP).bump(lit.var());

    if level == depth {
        analyze.pending += 1;
    } else {
        debug_assert!(level < depth);
        analyze.clause.push(lit);
        if level > analyze.backjump_level {
            analyze.backjump_level = level;
        }
        let level_stamp = analyze.level_stamp[level];
        if level_stamp <= analyze.stamp {
            analyze.level_stamp[level] = analyze.stamp + (level_stamp == analyze.stamp) as u64;
        }
    }
}

/// Remove redundant literals from the learned clause.
///
/// A literal is redundant when it is implied by the rest of the clause,
/// which the predecessor test below detects by walking reasons in the
/// implication graph. Only literals on levels contributing at least two
/// clause literals can be redundant, so all others are skipped via the
/// level stamps.
pub fn minimize(mut ctx: partial!(Context, mut AnalyzeConflictP, mut VarsP, ClauseDbP)) {
    let (analyze, mut ctx) = ctx.split_part_mut(AnalyzeConflictP);
    let (vars, mut ctx) = ctx.split_part_mut(VarsP);
    let db = ctx.part(ClauseDbP);

    let stamp = analyze.stamp;
    let level_stamp = &analyze.level_stamp;
    let clause = &mut analyze.clause;

    let mut i = 1;
    while i < clause.len() {
        let lit = clause[i];
        let level = vars.level(lit.var());
        if level_stamp[level] == stamp + 1 && redundant(vars, db, level_stamp, stamp, lit) {
            clause.swap_remove(i);
        } else {
            i += 1;
        }
    }
}

/// Recursive predecessor test for clause minimization.
///
/// True iff every non-decision predecessor of the literal is stamped or
/// transitively redundant. Non-redundant literals are cached with
/// `stamp + 2`; positive results are re-derived on each query.
fn redundant(
    vars: &mut Vars,
    db: &ClauseDb,
    level_stamp: &[u64],
    stamp: u64,
    lit: Lit,
) -> bool {
    let reason = match vars.data(lit.var()).reason {
        Some(reason) => reason,
        // Decisions and unit-derived literals end the search.
        None => return false,
    };

    for i in 1..db.clause(reason).lits().len() {
        let reason_lit = db.clause(reason).lits()[i];
        let level = vars.level(reason_lit.var());
        if level == 0 {
            continue;
        }

        let var_stamp = vars.data(reason_lit.var()).stamp;
        if var_stamp == stamp + 2 {
            return false;
        }

        if var_stamp < stamp
            && (level_stamp[level] < stamp
                || !redundant(vars, db, level_stamp, stamp, reason_lit))
        {
            vars.data_mut(reason_lit.var()).stamp = stamp + 2;
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use fascicle_formula::{lit, lits};

    use crate::context::set_var_count;
    use crate::trail::{enqueue_decision, enqueue_forced};

    fn add_clause(ctx: &mut Context, lits: &[Lit]) -> ClauseIdx {
        ctx.clause_db.add_clause(lits.to_vec())
    }

    /// Deciding 1 and 2 forces 3 and then 4, and the conflict clause
    /// mentions both forced variables. Resolving 4 away leaves 3 as the
    /// single conflict-level literal, so 3 is the first UIP.
    #[test]
    fn first_uip_clause() {
        let mut ctx = Context::default();

        let c_three = add_clause(&mut ctx, &lits![3, -2]);
        let c_four = add_clause(&mut ctx, &lits![4, -3, -1]);
        let c_conflict = add_clause(&mut ctx, &lits![-4, -3]);

        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 4);

        ctx.part_mut(TrailP).new_level();
        ctx.part_mut(AnalyzeConflictP).ensure_level_count(2);
        enqueue_decision(ctx.borrow(), fascicle_formula::var!(1));

        ctx.part_mut(TrailP).new_level();
        ctx.part_mut(AnalyzeConflictP).ensure_level_count(3);
        enqueue_decision(ctx.borrow(), fascicle_formula::var!(2));
        enqueue_forced(ctx.borrow(), lit!(3), Some(c_three));
        enqueue_forced(ctx.borrow(), lit!(4), Some(c_four));

        let backjump_to = analyze_conflict(ctx.borrow(), c_conflict, 2);

        assert_eq!(backjump_to, 1);

        let clause = ctx.part(AnalyzeConflictP).clause();
        assert_eq!(clause[0], lit!(-3));
        assert_eq!(&clause[1..], &lits![-1]);
    }

    #[test]
    fn minimization_drops_implied_literals() {
        let mut ctx = Context::default();

        // Level 1: decide 1, forcing 2 and then 3. The learned clause picks
        // up both -3 and -2, but -3 is implied by -2 via 3's reason.
        let c_two = add_clause(&mut ctx, &lits![2, -1]);
        let c_three = add_clause(&mut ctx, &lits![3, -2]);
        let c_force = add_clause(&mut ctx, &lits![5, -4, -3, -2]);
        let c_conflict = add_clause(&mut ctx, &lits![-5, -3, -2]);

        let mut ctx = ctx.into_partial_ref_mut();
        set_var_count(ctx.borrow(), 5);

        ctx.part_mut(TrailP).new_level();
        ctx.part_mut(AnalyzeConflictP).ensure_level_count(2);
        enqueue_decision(ctx.borrow(), fascicle_formula::var!(1));
        enqueue_forced(ctx.borrow(), lit!(2), Some(c_two));
        enqueue_forced(ctx.borrow(), lit!(3), Some(c_three));

        ctx.part_mut(TrailP).new_level();
        ctx.part_mut(AnalyzeConflictP).ensure_level_count(3);
        enqueue_decision(ctx.borrow(), fascicle_formula::var!(4));
        enqueue_forced(ctx.borrow(), lit!(5), Some(c_force));

        let backjump_to = analyze_conflict(ctx.borrow(), c_conflict, 2);
        assert_eq!(backjump_to, 1);

        let unminimized = ctx.part(AnalyzeConflictP).clause().len();
        minimize(ctx.borrow());
        let clause = ctx.part(AnalyzeConflictP).clause();

        // -3 is implied by -2, so minimization drops it
        assert_eq!(unminimized, 3);
        assert_eq!(clause.len(), 2);
        assert_eq!(clause[0], lit!(-5));
        assert!(clause.contains(&lit!(-2)));
    }
}
