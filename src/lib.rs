//! searchd - an embeddable multi-tenant search engine
//!
//! Containers (typed attribute records) are stored in a bounded cache and
//! indexed per domain according to a shared registry of index definitions.
//! Queries push uid clauses into an `Intersect` for the caller to combine.

pub mod cache;
pub mod checksum;
pub mod container;
pub mod engine;
pub mod intersect;
pub mod observability;
pub mod ordered_index;
pub mod registry;
pub mod search_index;
pub mod text;

pub use container::{CombinePolicy, Container, ContainerGuard};
pub use engine::{
    DistanceUnit, EngineConfig, EngineError, EngineErrorCode, EngineResult, SearchEngine,
    SortOrder, WriteMode,
};
pub use intersect::Intersect;
pub use registry::IndexType;
pub use search_index::RangeQuery;
