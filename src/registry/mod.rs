//! Index definition registry
//!
//! One registry per engine, shared by every domain. Definitions say which
//! attribute keys are indexed and how; domains hold the storage.
//!
//! # Invariants
//!
//! - Definition keys are normalized and unique
//! - Uids are never reused within a registry

mod definition;
mod errors;
mod catalog;

pub use definition::{
    EffectiveText, ExcludedWords, IndexDefinition, IndexSettings, IndexType, TextDefaults,
};
pub use errors::{RegistryError, RegistryResult};
pub use catalog::IndexRegistry;
