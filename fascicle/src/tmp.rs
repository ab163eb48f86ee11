//! Reusable scratch buffers.
use fascicle_formula::Lit;

use crate::clause::ClauseIdx;

/// Scratch space shared between solver routines.
///
/// Nothing in here survives across calls; users clear a buffer before
/// filling it and may not rely on leftover contents.
#[derive(Default)]
pub struct TmpData {
    pub lits: Vec<Lit>,
    /// Snapshot of a watch list during propagation.
    pub watch_scratch: Vec<ClauseIdx>,
}
