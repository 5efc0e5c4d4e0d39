//! Container ↔ index maintenance
//!
//! Indexing never rolls back: an attribute that fails to index is logged
//! and counted, and the remaining attributes are still processed.

use crate::container::{Container, StoredContainer};
use crate::observability::{log_event_with_fields, Event};
use crate::registry::{IndexDefinition, IndexRegistry, IndexType, TextDefaults};
use crate::search_index::{indexed_attributes, tokens};
use crate::text::{build_index_string, Stemmer};

use super::handle::{EngineInner, EngineState, DOMAIN_KEY_ATTRIBUTE};
use super::errors::{EngineError, EngineErrorCode, EngineResult};

/// Suffix of the attribute holding an attribute's relevancy tokens
pub const RELEVANCY_SUFFIX: &str = "_relevancyIndex";

/// Suffix of the attribute holding the relevancy token count
pub const RELEVANCY_LENGTH_SUFFIX: &str = "_relevancyIndexLength";

pub fn relevancy_key(index_key: &str) -> String {
    format!("{}{}", index_key, RELEVANCY_SUFFIX)
}

pub fn relevancy_length_key(index_key: &str) -> String {
    format!("{}{}", index_key, RELEVANCY_LENGTH_SUFFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Maintenance {
    Insert,
    Remove,
}

/// Store the stemmed token list of every exact and wildcard attribute.
///
/// Attributes that already carry relevancy data keep it.
pub(crate) fn calculate_relevancy(
    registry: &IndexRegistry,
    text: &TextDefaults,
    stemmer: &dyn Stemmer,
    container: &mut Container,
) -> EngineResult<()> {
    let mut derived: Vec<(String, String, usize)> = Vec::new();
    for (definition, value) in indexed_attributes(container, registry) {
        if !matches!(definition.index_type, IndexType::Exact | IndexType::Wildcard) {
            continue;
        }
        if container.exists(&relevancy_key(&definition.key))
            || derived.iter().any(|(key, _, _)| key == &definition.key)
        {
            continue;
        }
        let effective = definition.effective(text);
        let found = tokens(&value.as_string(), IndexType::Wildcard, &effective, stemmer);
        let json = serde_json::to_string(&found).map_err(|e| {
            EngineError::new(EngineErrorCode::RelevancyKey, "failed to encode relevancy tokens")
                .with_source(e)
        })?;
        derived.push((definition.key.clone(), json, found.len()));
    }

    for (key, json, len) in derived {
        container.set_string(&relevancy_key(&key), &json)?;
        container.set_int(&relevancy_length_key(&key), len as i64)?;
    }
    Ok(())
}

/// Drop relevancy data for every attribute `overlay` touches so it is
/// recomputed from the merged value
pub(crate) fn strip_relevancy(container: &mut Container, overlay: &Container) {
    for attribute in overlay.attributes() {
        let key = build_index_string(&attribute.name);
        container.remove(&relevancy_key(&key));
        container.remove(&relevancy_length_key(&key));
    }
}

impl EngineInner {
    /// Add every indexed attribute of `stored` to its domain
    pub(crate) fn index_with(&self, state: &EngineState, stored: &StoredContainer) -> EngineResult<()> {
        self.maintain(state, stored, Maintenance::Insert)
    }

    /// Remove every indexed attribute of `stored` from its domain.
    /// A container whose domain is gone has nothing to remove.
    pub(crate) fn unindex_with(&self, state: &EngineState, stored: &StoredContainer) -> EngineResult<()> {
        self.maintain(state, stored, Maintenance::Remove)
    }

    fn maintain(
        &self,
        state: &EngineState,
        stored: &StoredContainer,
        op: Maintenance,
    ) -> EngineResult<()> {
        let uid = stored.uid();
        let container = stored
            .try_read_for(self.lock_timeout)
            .ok_or_else(|| EngineError::container_lock(uid))?;
        let domain_key = container.get_string(DOMAIN_KEY_ATTRIBUTE).ok_or_else(|| {
            EngineError::new(EngineErrorCode::MissingAttribute, "container has no domain")
                .with_details(format!("uid: {}", uid))
        })?;
        let domain = match state.domain(&domain_key) {
            Ok(domain) => domain,
            Err(_) if op == Maintenance::Remove => return Ok(()),
            Err(err) => return Err(err),
        };

        let text = self.text();
        for (definition, value) in indexed_attributes(&container, &state.registry) {
            let result = match op {
                Maintenance::Insert => {
                    domain.index_value(definition, &text, self.stemmer.as_ref(), uid, value)
                }
                Maintenance::Remove => {
                    domain.unindex_value(definition, &text, self.stemmer.as_ref(), uid, value)
                }
            };
            if let Err(err) = result {
                self.metrics.increment_index_failures();
                log_event_with_fields(
                    Event::IndexMaintenanceFailed,
                    &[
                        ("uid", uid.to_string().as_str()),
                        ("domain", domain.key()),
                        ("index", definition.key.as_str()),
                        ("error", err.to_string().as_str()),
                    ],
                );
            }
        }
        Ok(())
    }

    /// Index every cached container's values for one definition
    pub(crate) fn reindex(&self, state: &EngineState, definition: &IndexDefinition) {
        let text = self.text();
        let mut indexed = 0usize;
        for stored in self.cache.values() {
            let Some(container) = stored.try_read_for(self.lock_timeout) else {
                self.metrics.increment_index_failures();
                continue;
            };
            let Some(domain_key) = container.get_string(DOMAIN_KEY_ATTRIBUTE) else {
                continue;
            };
            let Ok(domain) = state.domain(&domain_key) else {
                continue;
            };
            for (def, value) in indexed_attributes(&container, &state.registry) {
                if def.key != definition.key {
                    continue;
                }
                match domain.index_value(def, &text, self.stemmer.as_ref(), stored.uid(), value) {
                    Ok(()) => indexed += 1,
                    Err(err) => {
                        self.metrics.increment_index_failures();
                        log_event_with_fields(
                            Event::IndexMaintenanceFailed,
                            &[
                                ("uid", stored.uid().to_string().as_str()),
                                ("index", def.key.as_str()),
                                ("error", err.to_string().as_str()),
                            ],
                        );
                    }
                }
            }
        }
        log_event_with_fields(
            Event::IndexReindexed,
            &[
                ("index", definition.key.as_str()),
                ("values", indexed.to_string().as_str()),
            ],
        );
    }

    /// Clear one definition's storage in every domain and reindex it
    pub(crate) fn rebuild(&self, state: &EngineState, definition: &IndexDefinition) -> EngineResult<()> {
        for domain in state.domains() {
            domain
                .reset_index(&definition.key, definition)
                .map_err(|e| EngineError::new(EngineErrorCode::IndexReindex, e.to_string()))?;
        }
        self.reindex(state, definition);
        Ok(())
    }
}
