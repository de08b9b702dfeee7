//! Castor - SPARQL query engine over an RDF triple store
//!
//! Two subsystems carry the weight: a read-only, disk-backed triple store
//! with RDF-3X-style compressed indexes, and a backtracking
//! constraint-programming solver that executes queries as constraint
//! networks over value-id domains. The `builder` module produces store
//! files; `query` connects store and solver.

pub mod builder;
pub mod error;
pub mod model;
pub mod query;
pub mod solver;
pub mod store;
pub mod types;
pub mod util;

pub use error::{Error, ErrorCode, Result};
pub use model::{Category, NumCategory, Value};
pub use solver::{SearchHeuristic, Solver, VarRef};
pub use store::Store;
pub use types::{StringId, Triple, TripleOrder, ValueId, ValueRange};
