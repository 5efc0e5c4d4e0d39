//! Generic ordered key/value index
//!
//! The foundation every other index in searchd is built on: a sorted map
//! from byte-string keys to opaque values.
//!
//! # Invariants
//!
//! - Keys are non-empty and unique; a put never merges into an existing key
//! - Traversal is in ascending byte order and can resume from any key
//! - Every value leaving the index without being taken goes to the disposer

mod errors;
mod tree;

pub use errors::{OrderedIndexError, OrderedIndexResult};
pub use tree::{Disposer, OrderedIndex};
