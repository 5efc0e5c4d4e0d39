//! Container model
//!
//! A container is the basic indexable record: a uid, a name, and an
//! insertion-ordered list of typed attributes.
//!
//! # Invariants
//!
//! - A non-zero uid never changes
//! - Decoding either yields the exact encoded container or an error
//! - Attribute reads and writes on shared containers happen under the
//!   container's own lock

mod codec;
mod combine;
mod errors;
mod json;
mod record;
mod stored;
mod value;

pub use codec::{deserialize, encoded_len, serialize};
pub use combine::{combine, CombinePolicy};
pub use errors::{ContainerError, ContainerErrorCode, ContainerResult};
pub use json::{from_json, from_json_str, to_json};
pub use record::{Attribute, Container};
pub use stored::{ContainerGuard, StoredContainer};
pub use value::{parse_leading_double, parse_leading_int, AttributeValue, ValueType};
