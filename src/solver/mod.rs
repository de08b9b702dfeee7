//! Backtracking constraint-programming solver.
//!
//! The solver owns everything: variables live in typed slabs addressed by
//! [`VarRef`], propagators in constraint slots addressed by `ConstraintId`,
//! and search scopes in subtree slots. Domain operations are solver methods;
//! undo information goes to a single trail of typed restore records.

pub mod bounds;
pub mod discrete;
pub mod engine;
pub mod propagator;
pub mod small;
pub mod subtree;
pub mod trail;

pub use engine::{SearchHeuristic, Solver, Stats};
pub use propagator::{ConstraintId, Priority, Propagator, PRIORITY_COUNT};
pub use subtree::SubtreeId;

/// Handle of a solver-owned variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarRef {
    /// Sparse-set variable with a large domain
    Discrete(usize),
    /// Bitset variable with at most 32 values
    Small(usize),
    /// Bounds-only variable
    Bounds(usize),
}
