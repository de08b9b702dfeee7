//! Propagator trait and constraint bookkeeping.

use crate::solver::engine::Solver;
use crate::solver::subtree::SubtreeId;
use crate::solver::trail::Timestamp;

/// Identifier of a constraint inside its solver
pub type ConstraintId = usize;

/// Propagation priority, fixed per constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(usize)]
pub enum Priority {
    /// Propagated first; value-based or very cheap constraints
    High = 0,
    /// Bound-consistent constraints
    Medium = 1,
    /// Heavy constraints that benefit from running after domains shrank
    Low = 2,
    Lowest = 3,
}

/// Number of priority classes
pub const PRIORITY_COUNT: usize = 4;

/// All priorities, from most to least urgent.
pub const PRIORITIES: [Priority; PRIORITY_COUNT] =
    [Priority::High, Priority::Medium, Priority::Low, Priority::Lowest];

/// A constraint's propagation behavior.
///
/// Implementations narrow variable domains through the solver handle; a
/// `false` return means a domain became empty and the solver must backtrack.
/// Once a constraint can no longer prune anything it may mark itself entailed
/// with [`Solver::set_done`] and will be skipped for the rest of the subtree.
pub trait Propagator {
    /// Priority class, queried once when the constraint is added.
    fn priority(&self) -> Priority {
        Priority::Medium
    }

    /// Initial propagation when the constraint is posted.
    fn post(&mut self, solver: &mut Solver, id: ConstraintId) -> bool {
        self.propagate(solver, id)
    }

    /// Propagation after a subscribed event fired.
    fn propagate(&mut self, _solver: &mut Solver, _id: ConstraintId) -> bool {
        true
    }
}

/// Queue membership of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueState {
    Unqueued,
    Queued,
    /// Currently executing; its own events must not re-enqueue it
    Propagating,
}

/// Solver-internal slot holding a constraint.
pub(crate) struct ConstraintSlot {
    /// Taken out while the propagator runs
    pub prop: Option<Box<dyn Propagator>>,
    pub priority: Priority,
    pub state: QueueState,
    /// Reversible entailment flag
    pub done: bool,
    /// Last-save stamp of the done flag
    pub done_stamp: Timestamp,
    /// Owning subtree, `None` for static constraints
    pub parent: Option<SubtreeId>,
    /// Post timestamp; static constraints newer than the solver's current
    /// timestamp are (re)posted at the next subtree activation
    pub timestamp: u64,
}
