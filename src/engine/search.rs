//! Query operations
//!
//! Every search pushes clauses into a caller-owned `Intersect`; the caller
//! chooses how to combine them. An exact or user-key search pushes one
//! clause. A wildcard search pushes one clause per query token, so
//! `exec_and` yields containers matching every token.

use std::collections::{BTreeMap, BTreeSet};

use crate::container::Container;
use crate::intersect::Intersect;
use crate::registry::{IndexDefinition, IndexType, TextDefaults};
use crate::search_index::{tokens, RangeQuery, SearchIndex};
use crate::text::build_index_string;

use super::handle::{uid_key, EngineState, SearchEngine};
use super::errors::{EngineError, EngineErrorCode, EngineResult};
use super::indexing::relevancy_key;

impl SearchEngine {
    /// Match `value` against an exact, wildcard, or user-key index in one
    /// domain
    pub fn search(
        &self,
        domain_key: &str,
        attribute_key: &str,
        value: &str,
        intersect: &mut Intersect,
    ) -> EngineResult<()> {
        let state = self.inner.read_state()?;
        let domain = state.domain(domain_key)?;
        let definition = string_definition(&state, attribute_key)?;
        let text = self.inner.text();
        for clause in self.string_clauses(domain, definition, &text, value)? {
            intersect.push(clause, true);
        }
        self.inner.metrics.increment_searches();
        Ok(())
    }

    /// `search` across every domain; each clause is the union over domains
    pub fn search_global(
        &self,
        attribute_key: &str,
        value: &str,
        intersect: &mut Intersect,
    ) -> EngineResult<()> {
        let state = self.inner.read_state()?;
        let definition = string_definition(&state, attribute_key)?;
        let text = self.inner.text();

        let mut merged: Vec<BTreeSet<u32>> = Vec::new();
        for domain in state.domains() {
            let clauses = self.string_clauses(domain, definition, &text, value)?;
            if merged.is_empty() {
                merged = vec![BTreeSet::new(); clauses.len()];
            }
            for (slot, clause) in merged.iter_mut().zip(clauses) {
                slot.extend(clause);
            }
        }
        if merged.is_empty() {
            intersect.push(Vec::new(), true);
        }
        for clause in merged {
            intersect.push(clause.into_iter().collect(), true);
        }
        self.inner.metrics.increment_searches();
        Ok(())
    }

    /// Containers with a value under the index that do not match `value`
    pub fn search_not_list(
        &self,
        domain_key: &str,
        attribute_key: &str,
        value: &str,
        intersect: &mut Intersect,
    ) -> EngineResult<()> {
        let state = self.inner.read_state()?;
        let domain = state.domain(domain_key)?;
        let definition = string_definition(&state, attribute_key)?;
        let text = self.inner.text();
        intersect.push(self.not_clause(domain, definition, &text, value)?, true);
        self.inner.metrics.increment_searches();
        Ok(())
    }

    pub fn search_not_list_global(
        &self,
        attribute_key: &str,
        value: &str,
        intersect: &mut Intersect,
    ) -> EngineResult<()> {
        let state = self.inner.read_state()?;
        let definition = string_definition(&state, attribute_key)?;
        let text = self.inner.text();
        let mut ids = BTreeSet::new();
        for domain in state.domains() {
            ids.extend(self.not_clause(domain, definition, &text, value)?);
        }
        intersect.push(ids.into_iter().collect(), true);
        self.inner.metrics.increment_searches();
        Ok(())
    }

    /// Range query against a range index in one domain
    pub fn search_range(
        &self,
        domain_key: &str,
        attribute_key: &str,
        query: RangeQuery,
        intersect: &mut Intersect,
    ) -> EngineResult<()> {
        let state = self.inner.read_state()?;
        let domain = state.domain(domain_key)?;
        let definition = range_definition(&state, attribute_key)?;
        intersect.push(domain.search_range(&definition.key, query)?, true);
        self.inner.metrics.increment_searches();
        Ok(())
    }

    pub fn search_range_global(
        &self,
        attribute_key: &str,
        query: RangeQuery,
        intersect: &mut Intersect,
    ) -> EngineResult<()> {
        let state = self.inner.read_state()?;
        let definition = range_definition(&state, attribute_key)?;
        let mut ids = BTreeSet::new();
        for domain in state.domains() {
            ids.extend(domain.search_range(&definition.key, query)?);
        }
        intersect.push(ids.into_iter().collect(), true);
        self.inner.metrics.increment_searches();
        Ok(())
    }

    /// Order `uids` by how many query tokens their stored relevancy data
    /// for `attribute_key` shares. Ties keep their input order; containers
    /// without relevancy data score zero.
    pub fn rank_by_relevancy(
        &self,
        uids: &[u32],
        attribute_key: &str,
        query: &str,
    ) -> EngineResult<Vec<u32>> {
        let budget = self.inner.settings.lock().config.max_sort_operation_memory_length;
        let needed = uids.len().saturating_mul(std::mem::size_of::<(usize, u32)>());
        if needed > budget {
            return Err(EngineError::invalid_arguments("result set exceeds sort memory")
                .with_details(format!("needed: {}, budget: {}", needed, budget)));
        }

        let query_tokens: BTreeSet<String> = {
            let state = self.inner.read_state()?;
            let definition = string_definition(&state, attribute_key)?;
            let text = self.inner.text();
            let effective = definition.effective(&text);
            tokens(query, IndexType::Wildcard, &effective, self.inner.stemmer.as_ref())
                .into_iter()
                .collect()
        };
        let field = relevancy_key(&build_index_string(attribute_key));

        let mut scored: Vec<(usize, u32)> = Vec::with_capacity(uids.len());
        let mut cache: BTreeMap<u32, usize> = BTreeMap::new();
        for &uid in uids {
            let score = match cache.get(&uid) {
                Some(score) => *score,
                None => {
                    let score = self.relevancy_score(uid, &field, &query_tokens);
                    cache.insert(uid, score);
                    score
                }
            };
            scored.push((score, uid));
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().map(|(_, uid)| uid).collect())
    }

    /// Query tokens found in a container's stored relevancy array; zero
    /// when the container or its relevancy data is missing
    pub(super) fn relevancy_score(&self, uid: u32, field: &str, query: &BTreeSet<String>) -> usize {
        self.read_cached(uid, |container| {
            container
                .get_string(field)
                .and_then(|json| serde_json::from_str::<Vec<String>>(&json).ok())
                .map(|stored_tokens| {
                    stored_tokens
                        .iter()
                        .filter(|token| query.contains(*token))
                        .count()
                })
                .unwrap_or(0)
        })
        .unwrap_or(0)
    }

    /// Run `read` against a cached container without touching its age
    pub(super) fn read_cached<T>(&self, uid: u32, read: impl FnOnce(&Container) -> T) -> Option<T> {
        let stored = self.inner.cache.peek(&uid_key(uid))?;
        let container = stored.try_read_for(self.inner.lock_timeout)?;
        Some(read(&*container))
    }

    fn string_clauses(
        &self,
        domain: &SearchIndex,
        definition: &IndexDefinition,
        text: &TextDefaults,
        value: &str,
    ) -> EngineResult<Vec<Vec<u32>>> {
        match definition.index_type {
            IndexType::Exact | IndexType::UserKey => {
                Ok(vec![domain.search_exact(definition, text, value)?])
            }
            IndexType::Wildcard => {
                let clauses =
                    domain.search_tokens(definition, text, self.inner.stemmer.as_ref(), value)?;
                // A query with no usable tokens matches nothing
                if clauses.is_empty() {
                    Ok(vec![Vec::new()])
                } else {
                    Ok(clauses)
                }
            }
            IndexType::Range => Err(type_invalid(definition)),
        }
    }

    fn not_clause(
        &self,
        domain: &SearchIndex,
        definition: &IndexDefinition,
        text: &TextDefaults,
        value: &str,
    ) -> EngineResult<Vec<u32>> {
        let mut matched = Intersect::new();
        for clause in self.string_clauses(domain, definition, text, value)? {
            matched.push(clause, true);
        }
        let matched: BTreeSet<u32> = matched.exec_and(true).iter().copied().collect();
        Ok(domain
            .all_value_uids(&definition.key)?
            .into_iter()
            .filter(|uid| !matched.contains(uid))
            .collect())
    }
}

pub(super) fn string_definition<'a>(state: &'a EngineState, attribute_key: &str) -> EngineResult<&'a IndexDefinition> {
    let definition = state
        .registry
        .get(attribute_key)
        .ok_or_else(|| EngineError::index_missing(attribute_key))?;
    if definition.index_type == IndexType::Range {
        return Err(type_invalid(definition));
    }
    Ok(definition)
}

fn range_definition<'a>(state: &'a EngineState, attribute_key: &str) -> EngineResult<&'a IndexDefinition> {
    let definition = state
        .registry
        .get(attribute_key)
        .ok_or_else(|| EngineError::index_missing(attribute_key))?;
    if definition.index_type != IndexType::Range {
        return Err(type_invalid(definition));
    }
    Ok(definition)
}

fn type_invalid(definition: &IndexDefinition) -> EngineError {
    EngineError::new(EngineErrorCode::IndexTypeInvalid, "index type does not support this query")
        .with_details(format!(
            "index: {}, type: {}",
            definition.key,
            definition.index_type.as_str()
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::engine::{EngineConfig, WriteMode};

    fn engine() -> SearchEngine {
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        engine.new_domain("books", "Books").unwrap();
        engine.new_domain("films", "Films").unwrap();
        engine.new_index(IndexType::Exact, "genre", "Genre").unwrap();
        engine.new_index(IndexType::Wildcard, "title", "Title").unwrap();
        engine.new_index(IndexType::Range, "year", "Year").unwrap();
        engine
    }

    fn put(engine: &SearchEngine, domain: &str, title: &str, genre: &str, year: i64) -> u32 {
        let mut c = Container::new("item");
        c.put_string("title", title).unwrap();
        c.put_string("genre", genre).unwrap();
        c.put_int("year", year).unwrap();
        engine.put(domain, c, WriteMode::Immediate).unwrap()
    }

    #[test]
    fn test_exact_search_single_clause() {
        let engine = engine();
        let a = put(&engine, "books", "Dune", "Science Fiction", 1965);
        put(&engine, "books", "Emma", "Romance", 1815);

        let mut intersect = Intersect::new();
        engine.search("books", "genre", "science fiction", &mut intersect).unwrap();
        assert_eq!(intersect.clause_count(), 1);
        assert_eq!(intersect.exec_and(true), &[a]);
    }

    #[test]
    fn test_wildcard_tokens_and_together() {
        let engine = engine();
        let a = put(&engine, "books", "The Running Doctors", "Drama", 2001);
        put(&engine, "books", "Running Wild", "Drama", 2002);

        let mut intersect = Intersect::new();
        engine.search("books", "title", "doctor running", &mut intersect).unwrap();
        assert_eq!(intersect.clause_count(), 2);
        assert_eq!(intersect.exec_and(true), &[a]);
    }

    #[test]
    fn test_global_search_unions_domains() {
        let engine = engine();
        let a = put(&engine, "books", "Dune", "Epic", 1965);
        let b = put(&engine, "films", "Dune", "Epic", 2021);

        let mut intersect = Intersect::new();
        engine.search_global("genre", "epic", &mut intersect).unwrap();
        let mut expected = vec![a, b];
        expected.sort_unstable();
        assert_eq!(intersect.exec_and(true), expected.as_slice());
    }

    #[test]
    fn test_not_list() {
        let engine = engine();
        put(&engine, "books", "Dune", "Epic", 1965);
        let b = put(&engine, "books", "Emma", "Romance", 1815);

        let mut intersect = Intersect::new();
        engine.search_not_list("books", "genre", "epic", &mut intersect).unwrap();
        assert_eq!(intersect.exec_and(true), &[b]);
    }

    #[test]
    fn test_range_search_and_type_checks() {
        let engine = engine();
        put(&engine, "books", "Emma", "Romance", 1815);
        let b = put(&engine, "books", "Dune", "Epic", 1965);
        let c = put(&engine, "films", "Dune", "Epic", 2021);

        let mut intersect = Intersect::new();
        engine
            .search_range("books", "year", RangeQuery::Between(1900, 2000), &mut intersect)
            .unwrap();
        assert_eq!(intersect.exec_and(true), &[b]);

        let mut intersect = Intersect::new();
        engine
            .search_range_global("year", RangeQuery::GreaterThan(1900), &mut intersect)
            .unwrap();
        assert_eq!(intersect.exec_and(true), &[b, c]);

        let mut intersect = Intersect::new();
        let err = engine.search("books", "year", "1965", &mut intersect).unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::IndexTypeInvalid);
        let err = engine
            .search_range("books", "genre", RangeQuery::LessThan(0), &mut intersect)
            .unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::IndexTypeInvalid);
        let err = engine
            .search_range("books", "year", RangeQuery::Between(5, 1), &mut intersect)
            .unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::InvalidArguments);
    }

    #[test]
    fn test_rank_by_relevancy() {
        let engine = engine();
        let a = put(&engine, "books", "Ocean Voyage", "Drama", 1);
        let b = put(&engine, "books", "Ocean Storm Voyage", "Drama", 2);
        let c = put(&engine, "books", "Quiet Garden", "Drama", 3);

        let ranked = engine
            .rank_by_relevancy(&[c, a, b], "title", "ocean storm voyage")
            .unwrap();
        assert_eq!(ranked, vec![b, a, c]);

        engine.set_max_sort_memory(4);
        assert!(engine.rank_by_relevancy(&[a, b], "title", "ocean").is_err());
    }
}
