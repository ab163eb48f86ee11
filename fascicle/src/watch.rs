//! Watch lists for the two-watched-literal scheme.
//!
//! Every clause of length two or more keeps its two watched literals in
//! positions 0 and 1 and is registered in the watch list of both. Only the
//! falsification of a watched literal can make a clause unit or falsified,
//! so propagation has to scan just the lists of the literal that became
//! false. See [`prop`](crate::prop) for the invariant maintenance.
use fascicle_formula::Lit;

use crate::clause::ClauseIdx;

/// Watch lists indexed by literal code.
///
/// The list of a literal holds the clauses currently watching that literal,
/// which is the per-variable, per-polarity bookkeeping of Algorithm C.
#[derive(Default)]
pub struct Watchlists {
    watches: Vec<Vec<ClauseIdx>>,
}

impl Watchlists {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count * 2, vec![]);
    }

    /// Register a clause with both of its watched literals.
    ///
    /// `lits` must be the literals in the clause's positions 0 and 1.
    pub fn watch_clause(&mut self, clause: ClauseIdx, lits: [Lit; 2]) {
        self.add_watch(lits[0], clause);
        self.add_watch(lits[1], clause);
    }

    /// Add a clause to one literal's watch list.
    pub fn add_watch(&mut self, lit: Lit, clause: ClauseIdx) {
        self.watches[lit.code()].push(clause);
    }

    /// Stop watching a clause through the given literal.
    pub fn remove_watch(&mut self, lit: Lit, clause: ClauseIdx) {
        let list = &mut self.watches[lit.code()];
        let position = list.iter().position(|&entry| entry == clause);
        debug_assert!(position.is_some());
        if let Some(position) = position {
            list.swap_remove(position);
        }
    }

    /// Clauses watching the given literal.
    pub fn watched_by(&self, lit: Lit) -> &[ClauseIdx] {
        &self.watches[lit.code()]
    }
}
