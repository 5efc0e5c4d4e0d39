//! Result-set algebra over uid arrays
//!
//! Query clauses are pushed as uid arrays and combined on demand with
//! AND, OR or NOT. An empty clause is kept as a single `0` sentinel so an
//! AND with a zero-hit clause yields nothing instead of ignoring it.
//!
//! # Invariants
//!
//! - Uid 0 is never a real container uid
//! - Execution recomputes from every pushed clause

mod accumulator;

pub use accumulator::{Intersect, IntersectError, IntersectOp, IntersectResult, IntersectState};
