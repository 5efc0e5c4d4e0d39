//! Per-domain index storage and the indexing pipeline
//!
//! Every domain owns a `SearchIndex` holding one structure per registry
//! definition: a token map for Exact, Wildcard and UserKey definitions,
//! an integer tree for Range definitions.
//!
//! # Invariants
//!
//! - Uid lists are sorted ascending with no duplicates
//! - Removal computes exactly the keys insertion computed
//! - Queries prepare their keys with the same pipeline as indexing

mod domain;
mod errors;
mod pipeline;
mod range;
mod string_index;

pub use domain::{indexed_attributes, IndexStorage, SearchIndex};
pub use errors::{SearchIndexError, SearchIndexResult};
pub use pipeline::{
    affixes, full_string_key, range_value, string_keys, tokens, GEO_ATTRIBUTE_KEYS, GEO_SCALE,
};
pub use range::{RangeIndex, RangeQuery};
pub use string_index::StringIndex;
