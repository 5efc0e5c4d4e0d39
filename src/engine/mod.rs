//! The search engine core
//!
//! `SearchEngine` ties the registry, the per-domain indexes, the container
//! cache, and the mutation queue together behind one handle.
//!
//! # Invariants
//!
//! - A cached container is indexed in exactly the domain named by its
//!   `searchd_domainKey` attribute
//! - Deferred mutations apply in submission order on the worker thread
//! - Uids handed out by the engine are never 0 and increase until wrap
//! - User-key values are unique per index across all domains

mod auth;
mod conf_file;
mod config;
mod container_file;
mod errors;
mod geo;
mod handle;
mod indexing;
mod mutation;
mod queue;
mod search;
mod sort;
mod state_file;
mod worker;

pub use auth::{
    Authenticator, Permission, PermitAll, TokenAuthenticator, TokenGrant, ValidationStrictness,
};
pub use conf_file::{ConfFileError, ConfigDocument};
pub use config::EngineConfig;
pub use container_file::CONTAINER_FILE_MAGIC;
pub use errors::{EngineError, EngineErrorCode, EngineResult, Severity};
pub use geo::{distance_miles, DistanceUnit};
pub use handle::{DomainInfo, SearchEngine, DOMAIN_KEY_ATTRIBUTE};
pub use indexing::{relevancy_key, relevancy_length_key, RELEVANCY_LENGTH_SUFFIX, RELEVANCY_SUFFIX};
pub use mutation::WriteMode;
pub use sort::{Facet, MultiSort, SortOrder, CONTAINER_NAME_ATTRIBUTE, CONTAINER_UID_ATTRIBUTE};
