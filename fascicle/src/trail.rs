//! The assignment trail and backjumping.
use partial_ref::{partial, PartialRef};

use fascicle_formula::{lit::LitIdx, Lit, Var};

use crate::clause::ClauseIdx;
use crate::context::{ClauseDbP, Context, HeapP, ScheduleP, TrailP, VarsP};

/// The sequence of assignments currently in force.
///
/// The trail is an append-only stack of the currently assigned literals,
/// segmented into decision levels. `levels[d]` is the trail index at which
/// level `d` begins; the sentinel `levels[0] = 0` marks the level of
/// unit-derived assignments. The propagation cursor `queue_head` points at
/// the next literal awaiting propagation.
pub struct Trail {
    trail: Vec<Lit>,
    levels: Vec<LitIdx>,
    queue_head: usize,
}

impl Default for Trail {
    fn default() -> Trail {
        Trail {
            trail: vec![],
            levels: vec![0],
            queue_head: 0,
        }
    }
}

impl Trail {
    /// Assigned literals in assignment order.
    pub fn lits(&self) -> &[Lit] {
        &self.trail
    }

    /// Number of assigned literals.
    pub fn len(&self) -> usize {
        self.trail.len()
    }

    /// The literal at the given trail position.
    pub fn lit_at(&self, position: usize) -> Lit {
        self.trail[position]
    }

    /// Current decision depth.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Start a new decision level at the current end of the trail.
    pub fn new_level(&mut self) {
        self.levels.push(self.trail.len() as LitIdx);
    }

    /// Trail index at which the given level begins.
    pub fn level_start(&self, level: usize) -> usize {
        self.levels[level] as usize
    }

    /// Whether all assigned literals have been propagated.
    pub fn fully_propagated(&self) -> bool {
        self.queue_head == self.trail.len()
    }

    /// Return the next literal to propagate and advance the cursor.
    pub fn pop_queue(&mut self) -> Option<Lit> {
        let head = self.trail.get(self.queue_head).cloned();
        if head.is_some() {
            self.queue_head += 1;
        }
        head
    }

    fn push(&mut self, lit: Lit) {
        self.trail.push(lit);
    }

    fn truncate(&mut self, len: usize) {
        self.trail.truncate(len);
    }

    fn truncate_levels(&mut self, len: usize) {
        self.levels.truncate(len);
        self.queue_head = self.trail.len();
    }
}

/// Append a decision for the given variable to the trail.
///
/// The polarity is taken from the variable's saved phase. The caller has to
/// start the new decision level first.
pub fn enqueue_decision(
    mut ctx: partial!(Context, mut ScheduleP, mut TrailP, mut VarsP),
    var: Var,
) {
    let (vars, mut ctx) = ctx.split_part_mut(VarsP);
    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    let data = vars.data_mut(var);
    debug_assert!(data.value < 0);

    let value = ((trail.depth() << 1) as i32) | (data.oval & 1);
    data.value = value;
    data.tloc = trail.len() as i32;
    data.reason = None;

    ctx.part_mut(ScheduleP)
        .update_agility(((data.oval ^ value) & 1) as u64);

    trail.push(Lit::from_code(var.index() << 1 | (value & 1) as usize));
}

/// Append a forced literal to the trail.
///
/// A no-op when the variable is already assigned, which happens when the
/// learned clauses of a purge drain are installed in a batch. With a reason
/// clause given, the clause's back-reference is set as well.
pub fn enqueue_forced(
    mut ctx: partial!(Context, mut ClauseDbP, mut ScheduleP, mut TrailP, mut VarsP),
    lit: Lit,
    reason: Option<ClauseIdx>,
) {
    let (vars, mut ctx) = ctx.split_part_mut(VarsP);

    let data = vars.data_mut(lit.var());
    if data.value >= 0 {
        return;
    }

    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    let value = ((trail.depth() << 1) as i32) | (lit.code() & 1) as i32;
    data.value = value;
    data.tloc = trail.len() as i32;
    data.reason = reason;

    ctx.part_mut(ScheduleP)
        .update_agility(((data.oval ^ value) & 1) as u64);

    trail.push(lit);

    if let Some(idx) = reason {
        ctx.part_mut(ClauseDbP)
            .clause_mut(idx)
            .set_reason_for(Some(lit.var()));
    }
}

/// Unwind the trail back to the given decision level.
///
/// Every popped variable remembers its value for phase saving, gets its
/// reason cleared on both ends and returns to the activity heap.
pub fn backjump(
    mut ctx: partial!(Context, mut ClauseDbP, mut HeapP, mut TrailP, mut VarsP),
    target: usize,
) {
    debug_assert!(target < ctx.part(TrailP).depth());

    let (trail, mut ctx) = ctx.split_part_mut(TrailP);
    let (vars, mut ctx) = ctx.split_part_mut(VarsP);

    let new_len = trail.level_start(target + 1);

    for &lit in trail.lits()[new_len..].iter() {
        let data = vars.data_mut(lit.var());
        data.oval = data.value;
        data.value = -1;
        data.tloc = -1;
        if let Some(idx) = data.reason.take() {
            ctx.part_mut(ClauseDbP).clause_mut(idx).set_reason_for(None);
        }
        ctx.part_mut(HeapP).push(lit.var());
    }

    trail.truncate(new_len);
    trail.truncate_levels(target + 1);
}
