//! Variable activity and the decision heuristic.
//!
//! Free variables are kept in a binary max-heap ordered by an EVSIDS-style
//! activity. Instead of decaying every activity after a conflict, the bump
//! amount is divided by the decay factor, and everything is rescaled when a
//! value grows past the rescale limit.
//!
//! Conflict analysis bumps many variables without fixing up the heap; the
//! heap marks itself corrupted and is rebuilt lazily before the next
//! decision. A small fraction of decisions pops a uniformly random heap slot
//! instead of the maximum to keep the search from getting stuck in ruts.
use ordered_float::OrderedFloat;

use partial_ref::{partial, PartialRef};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use fascicle_formula::Var;

use crate::config::SolverConfig;
use crate::context::{
    AnalyzeConflictP, Context, HeapP, ScheduleP, TrailP, VarsP,
};
use crate::trail::enqueue_decision;

/// Max-heap of variables ordered by activity.
pub struct ActivityHeap {
    heap: Vec<Var>,
    /// Heap membership per variable.
    hloc: Vec<bool>,
    /// The activity of each variable.
    activity: Vec<OrderedFloat<f64>>,
    /// The value to add on bumping.
    bump: f64,
    /// The inverse of the decay factor.
    inv_decay: f64,
    /// Activities changed behind the heap's back; rebuild before popping.
    corrupted: bool,
    /// Random pops per 1000 pops.
    random_rate: u32,
    rescale_limit: f64,
    rng: SmallRng,
}

impl Default for ActivityHeap {
    fn default() -> ActivityHeap {
        let config = SolverConfig::default();
        ActivityHeap {
            heap: vec![],
            hloc: vec![],
            activity: vec![],
            bump: 1.0,
            inv_decay: 1.0 / config.rho,
            corrupted: false,
            random_rate: config.random_decision_rate,
            rescale_limit: config.rescale_limit,
            rng: SmallRng::seed_from_u64(0),
        }
    }
}

impl ActivityHeap {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.activity.resize(count, OrderedFloat(0.0));
        self.hloc.resize(count, false);
    }

    /// Reseed the heap's random number generator.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Change the decay factor.
    pub fn set_decay(&mut self, decay: f64) {
        debug_assert!(decay > 0.0 && decay < 1.0);
        self.inv_decay = 1.0 / decay;
    }

    pub fn set_random_rate(&mut self, rate: u32) {
        self.random_rate = rate;
    }

    pub fn set_rescale_limit(&mut self, limit: f64) {
        self.rescale_limit = limit;
    }

    /// The activity of a variable.
    pub fn activity(&self, var: Var) -> f64 {
        self.activity[var.index()].0
    }

    /// Whether activities changed since the heap order was last valid.
    pub fn corrupted(&self) -> bool {
        self.corrupted
    }

    /// Variables currently on the heap, in heap order.
    pub fn vars(&self) -> &[Var] {
        &self.heap
    }

    /// Shuffle a slice of variables with the heap's generator.
    pub fn shuffle(&mut self, vars: &mut [Var]) {
        vars.shuffle(&mut self.rng);
    }

    /// Bump a variable by increasing its activity.
    ///
    /// The heap order is not repaired here; the heap is marked corrupted
    /// instead and rebuilt before the next pop.
    pub fn bump(&mut self, var: Var) {
        let value = &mut self.activity[var.index()];
        value.0 += self.bump;
        if value.0 >= self.rescale_limit {
            self.rescale();
        }
        self.corrupted = true;
    }

    /// Decay all activities by growing the bump amount.
    pub fn decay(&mut self) {
        self.bump *= self.inv_decay;
        if self.bump >= self.rescale_limit {
            self.rescale();
        }
    }

    /// Divide all activities and the bump amount by the rescale limit.
    fn rescale(&mut self) {
        let rescale_factor = 1.0 / self.rescale_limit;
        for activity in self.activity.iter_mut() {
            activity.0 *= rescale_factor;
        }
        self.bump *= rescale_factor;
    }

    /// Insert a variable into the heap if not already present.
    pub fn push(&mut self, var: Var) {
        if self.hloc[var.index()] {
            return;
        }
        self.hloc[var.index()] = true;
        self.heap.push(var);
        self.sift_up(self.heap.len() - 1);
    }

    /// Remove and return the variable with the highest activity.
    ///
    /// With probability `random_rate / 1000` a uniformly random slot is
    /// popped instead.
    pub fn pop_max(&mut self) -> Option<Var> {
        let len = self.heap.len();
        if len == 0 {
            return None;
        }

        if self.random_rate > 0 && self.rng.gen_range(0, 1000) < self.random_rate {
            let slot = self.rng.gen_range(0, len);
            self.heap.swap(slot, len - 1);
        } else {
            self.heap.swap(0, len - 1);
        }

        let var = self.heap.pop()?;
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        self.hloc[var.index()] = false;
        Some(var)
    }

    /// Restore the heap order after external activity changes.
    pub fn reheapify(&mut self) {
        for position in (0..self.heap.len() / 2).rev() {
            self.sift_down(position);
        }
        self.corrupted = false;
    }

    /// Move a variable closer to the root until the heap property holds.
    fn sift_up(&mut self, mut pos: usize) {
        let var = self.heap[pos];
        while pos > 0 {
            let parent_pos = (pos - 1) / 2;
            let parent_var = self.heap[parent_pos];
            if self.activity[parent_var.index()] >= self.activity[var.index()] {
                return;
            }
            self.heap[pos] = parent_var;
            self.heap[parent_pos] = var;
            pos = parent_pos;
        }
    }

    /// Move a variable away from the root until the heap property holds.
    fn sift_down(&mut self, mut pos: usize) {
        loop {
            let var = self.heap[pos];
            let mut largest_pos = pos;
            let mut largest_var = var;

            for child_pos in [pos * 2 + 1, pos * 2 + 2].iter().cloned() {
                if child_pos < self.heap.len() {
                    let child_var = self.heap[child_pos];
                    if self.activity[largest_var.index()] < self.activity[child_var.index()] {
                        largest_pos = child_pos;
                        largest_var = child_var;
                    }
                }
            }

            if largest_pos == pos {
                return;
            }

            self.heap[pos] = largest_var;
            self.heap[largest_pos] = var;
            pos = largest_pos;
        }
    }
}

/// Fill the heap with all free variables in a random order.
///
/// The shuffle keeps repeated runs on the same formula from following the
/// same rut when no seed is given.
pub fn initialize_heap(mut ctx: partial!(Context, mut HeapP, VarsP)) {
    let (heap, mut ctx) = ctx.split_part_mut(HeapP);
    let vars = ctx.part(VarsP);

    let mut free: Vec<Var> = (0..vars.count())
        .map(Var::from_index)
        .filter(|&var| vars.is_free(var))
        .collect();

    heap.shuffle(&mut free);
    for var in free {
        heap.push(var);
    }
}

/// Pop free variables off the heap until one can be decided, then enqueue
/// the decision using its saved phase.
///
/// The caller has to ensure a free variable exists.
pub fn make_decision(
    mut ctx: partial!(
        Context,
        mut AnalyzeConflictP,
        mut HeapP,
        mut ScheduleP,
        mut TrailP,
        mut VarsP,
    ),
) {
    ctx.part_mut(TrailP).new_level();
    let level_count = ctx.part(TrailP).depth() + 1;
    ctx.part_mut(AnalyzeConflictP).ensure_level_count(level_count);
    ctx.part_mut(ScheduleP).ensure_level_count(level_count);

    if ctx.part(HeapP).corrupted() {
        ctx.part_mut(HeapP).reheapify();
    }

    let var = loop {
        match ctx.part_mut(HeapP).pop_max() {
            Some(var) => {
                if ctx.part(VarsP).is_free(var) {
                    break var;
                }
            }
            None => unreachable!("decision requested with no free variable"),
        }
    };

    enqueue_decision(ctx.borrow(), var);
}

/// Activity of the best free variable, without modifying the heap.
///
/// Scans the heap array from the root, which visits variables in roughly
/// decreasing activity order.
pub fn query_max_free_activity(ctx: partial!(Context, HeapP, VarsP)) -> Option<f64> {
    let heap = ctx.part(HeapP);
    let vars = ctx.part(VarsP);
    heap.vars()
        .iter()
        .find(|&&var| vars.is_free(var))
        .map(|&var| heap.activity(var))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_sorts_by_activity() {
        let mut heap = ActivityHeap::default();
        heap.set_var_count(8);
        heap.set_random_rate(0);

        for i in 0..8 {
            for _ in 0..i {
                heap.bump(Var::from_index(i));
            }
        }

        for i in 0..8 {
            heap.push(Var::from_index((i * 5) % 8));
        }
        heap.reheapify();

        for i in (0..8).rev() {
            assert_eq!(heap.pop_max(), Some(Var::from_index(i)));
        }
        assert_eq!(heap.pop_max(), None);
    }

    #[test]
    fn bump_marks_corruption_and_reheapify_clears_it() {
        let mut heap = ActivityHeap::default();
        heap.set_var_count(4);
        heap.set_random_rate(0);

        for i in 0..4 {
            heap.push(Var::from_index(i));
        }

        assert!(!heap.corrupted());
        heap.bump(Var::from_index(3));
        assert!(heap.corrupted());

        heap.reheapify();
        assert!(!heap.corrupted());
        assert_eq!(heap.pop_max(), Some(Var::from_index(3)));
    }

    #[test]
    fn decay_outweighs_earlier_bumps() {
        let mut heap = ActivityHeap::default();
        heap.set_var_count(2);
        heap.set_random_rate(0);
        heap.set_decay(0.5);

        heap.bump(Var::from_index(0));
        heap.bump(Var::from_index(0));
        heap.decay();
        heap.decay();
        heap.bump(Var::from_index(1));

        assert!(heap.activity(Var::from_index(1)) > heap.activity(Var::from_index(0)));
    }

    #[test]
    fn rescale_keeps_relative_order() {
        let mut heap = ActivityHeap::default();
        heap.set_var_count(3);
        heap.set_rescale_limit(1e3);
        heap.set_decay(0.5);

        for _ in 0..12 {
            heap.bump(Var::from_index(0));
            heap.bump(Var::from_index(1));
            heap.bump(Var::from_index(1));
            heap.decay();
        }

        assert!(heap.activity(Var::from_index(1)) > heap.activity(Var::from_index(0)));
        assert!(heap.activity(Var::from_index(0)) > heap.activity(Var::from_index(2)));
        assert!(heap.activity(Var::from_index(1)) < 1e3);
    }
}
