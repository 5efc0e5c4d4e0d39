//! Result ordering and facets
//!
//! Sorts reorder the executed result of an `Intersect` in place. A
//! `MultiSort` reads one key per result position for every ordering added
//! to it and compares those keys in the order they were added; the single
//! key sorts are a `MultiSort` with one ordering.
//!
//! # Invariants
//!
//! - Sorting never adds or drops ids; equal keys keep their input order
//! - Containers missing a value sort after every present value ascending
//! - Working memory is checked against the sort budget before keys are read

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::mem::size_of;

use crate::container::Container;
use crate::intersect::Intersect;
use crate::observability::{Event, Logger};
use crate::registry::{EffectiveText, IndexType};
use crate::search_index::tokens;
use crate::text::{determine_data_type, normalize, split_tokens, DataType, Stemmer};

use super::errors::{EngineError, EngineResult};
use super::geo::{distance_miles, validate_point};
use super::handle::{SearchEngine, DOMAIN_KEY_ATTRIBUTE};
use super::indexing::relevancy_key;
use super::search::string_definition;

/// Sorts by the container uid
pub const CONTAINER_UID_ATTRIBUTE: &str = "searchd_containerUid";

/// Sorts by the container name
pub const CONTAINER_NAME_ATTRIBUTE: &str = "searchd_containerName";

/// Numbered coordinate pairs `latitude000`/`longitude000` onward
const MAX_NUMBERED_COORDINATES: usize = 1000;

/// Missing numbered pairs tolerated before the scan stops
const MAX_COORDINATE_MISSES: usize = 3;

/// Direction of one ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    }
}

/// One distinct facet value and the number of containers carrying it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    pub value: String,
    pub count: usize,
}

// ============================================================================
// Sort keys
// ============================================================================

/// Attribute text with its numeric readings
#[derive(Debug, Clone)]
struct AttributeKey {
    text: String,
    integer: Option<i64>,
    real: Option<f64>,
}

impl AttributeKey {
    fn new(text: String) -> Self {
        let unsigned = text.strip_prefix('-').unwrap_or(&text);
        let (integer, real) = match determine_data_type(unsigned) {
            DataType::Integer | DataType::BigInteger => (text.parse().ok(), text.parse().ok()),
            DataType::Double => (None, text.parse().ok()),
            _ => (None, None),
        };
        Self { text, integer, real }
    }

    /// Integers compare as integers and numbers as numbers when both sides
    /// read that way; otherwise byte order with letters folded to lowercase
    fn compare(&self, other: &Self) -> Ordering {
        if let (Some(a), Some(b)) = (self.integer, other.integer) {
            return a.cmp(&b);
        }
        if let (Some(a), Some(b)) = (self.real, other.real) {
            return a.total_cmp(&b);
        }
        compare_text(&self.text, &other.text)
    }
}

fn compare_text(alpha: &str, beta: &str) -> Ordering {
    for (a, b) in alpha.bytes().zip(beta.bytes()) {
        let (a, b) = if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() {
            (a.to_ascii_lowercase(), b.to_ascii_lowercase())
        } else {
            (a, b)
        };
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    alpha.len().cmp(&beta.len())
}

fn missing_last<T>(alpha: &Option<T>, beta: &Option<T>, compare: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (alpha, beta) {
        (Some(a), Some(b)) => compare(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Keys of one ordering, one per result position
#[derive(Debug)]
enum SortColumn {
    Attribute(Vec<Option<AttributeKey>>),
    Relevancy(Vec<usize>),
    Distance(Vec<Option<f64>>),
}

impl SortColumn {
    fn compare(&self, a: usize, b: usize) -> Ordering {
        match self {
            SortColumn::Attribute(keys) => missing_last(&keys[a], &keys[b], AttributeKey::compare),
            SortColumn::Relevancy(scores) => scores[a].cmp(&scores[b]),
            SortColumn::Distance(miles) => missing_last(&miles[a], &miles[b], f64::total_cmp),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SortColumn::Attribute(_) => "attribute",
            SortColumn::Relevancy(_) => "relevancy",
            SortColumn::Distance(_) => "distance",
        }
    }
}

fn attribute_text(container: &Container, attribute: &str) -> Option<String> {
    if attribute.eq_ignore_ascii_case(CONTAINER_UID_ATTRIBUTE) {
        Some(container.uid().to_string())
    } else if attribute.eq_ignore_ascii_case(CONTAINER_NAME_ATTRIBUTE) {
        Some(container.name().to_string())
    } else {
        container.get_string(attribute)
    }
}

/// Distances in miles from a point to every coordinate pair on a
/// container, nearest first
fn coordinate_distances(container: &Container, latitude: f64, longitude: f64) -> Vec<f64> {
    let mut miles = Vec::new();
    let mut measure = |lat_key: &str, lon_key: &str| -> bool {
        match (container.get_double(lat_key), container.get_double(lon_key)) {
            (Some(lat), Some(lon)) => {
                miles.push(distance_miles(latitude, longitude, lat, lon));
                true
            }
            _ => false,
        }
    };

    measure("latitude", "longitude");
    let mut misses = 0;
    for n in 0..MAX_NUMBERED_COORDINATES {
        if misses >= MAX_COORDINATE_MISSES {
            break;
        }
        if !measure(&format!("latitude{:03}", n), &format!("longitude{:03}", n)) {
            misses += 1;
        }
    }
    miles.sort_by(f64::total_cmp);
    miles
}

// ============================================================================
// Multi-key sort
// ============================================================================

/// Orderings applied together to one executed result
pub struct MultiSort<'a> {
    engine: &'a SearchEngine,
    intersect: &'a mut Intersect,
    columns: Vec<(SortOrder, SortColumn)>,
    budget: usize,
    memory: usize,
}

impl<'a> MultiSort<'a> {
    fn new(engine: &'a SearchEngine, intersect: &'a mut Intersect) -> EngineResult<Self> {
        let budget = engine.inner.settings.lock().config.max_sort_operation_memory_length;
        let mut sort = Self {
            engine,
            intersect,
            columns: Vec::new(),
            budget,
            memory: 0,
        };
        sort.reserve(sort.len().saturating_mul(size_of::<usize>()))?;
        Ok(sort)
    }

    /// Result positions being ordered
    pub fn len(&self) -> usize {
        self.intersect.result().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Orderings added so far
    pub fn key_count(&self) -> usize {
        self.columns.len()
    }

    /// Order by an attribute's value. `searchd_containerUid` and
    /// `searchd_containerName` order by the container's uid and name.
    pub fn by_attribute(&mut self, attribute: &str, order: SortOrder) -> EngineResult<&mut Self> {
        self.reserve(self.len().saturating_mul(size_of::<Option<AttributeKey>>()))?;
        let keys: Vec<Option<AttributeKey>> = self
            .intersect
            .result()
            .iter()
            .map(|&uid| {
                self.engine
                    .read_cached(uid, |container| attribute_text(container, attribute))
                    .flatten()
                    .map(AttributeKey::new)
            })
            .collect();
        let text_bytes = keys.iter().flatten().map(|key| key.text.len() + 1).sum();
        self.reserve(text_bytes)?;
        self.columns.push((order, SortColumn::Attribute(keys)));
        Ok(self)
    }

    /// Order by how many query tokens each container's relevancy array for
    /// `attribute` shares. A query with no usable tokens is rejected.
    pub fn by_relevancy(&mut self, attribute: &str, query: &str, order: SortOrder) -> EngineResult<&mut Self> {
        if self.is_empty() {
            return Ok(self);
        }
        self.reserve(self.len().saturating_mul(size_of::<usize>()))?;

        let (field, query_tokens) = {
            let state = self.engine.inner.read_state()?;
            let definition = string_definition(&state, attribute)?;
            let text = self.engine.inner.text();
            let effective = definition.effective(&text);
            let query_tokens: BTreeSet<String> = tokens(
                query,
                IndexType::Wildcard,
                &effective,
                self.engine.inner.stemmer.as_ref(),
            )
            .into_iter()
            .collect();
            (relevancy_key(&definition.key), query_tokens)
        };
        if query_tokens.is_empty() {
            return Err(EngineError::invalid_arguments("sort query has no usable tokens")
                .with_details(query.to_string()));
        }

        let scores = self
            .intersect
            .result()
            .iter()
            .map(|&uid| self.engine.relevancy_score(uid, &field, &query_tokens))
            .collect();
        self.columns.push((order, SortColumn::Relevancy(scores)));
        Ok(self)
    }

    /// Order by distance in miles from a point to each container's nearest
    /// coordinate pair. A uid listed more than once takes its next nearest
    /// pair on each repeat.
    pub fn by_distance(&mut self, latitude: f64, longitude: f64, order: SortOrder) -> EngineResult<&mut Self> {
        validate_point(latitude, longitude)?;
        self.reserve(self.len().saturating_mul(size_of::<Option<f64>>()))?;

        let mut repeats: BTreeMap<u32, usize> = BTreeMap::new();
        let miles = self
            .intersect
            .result()
            .iter()
            .map(|&uid| {
                let seen = repeats.entry(uid).or_insert(0);
                let repeat = *seen;
                *seen += 1;
                let distances = self
                    .engine
                    .read_cached(uid, |container| coordinate_distances(container, latitude, longitude))
                    .unwrap_or_default();
                distances
                    .get(repeat)
                    .or_else(|| distances.last())
                    .copied()
            })
            .collect();
        self.columns.push((order, SortColumn::Distance(miles)));
        Ok(self)
    }

    /// Reorder the result by every added ordering
    pub fn execute(mut self) {
        let count = self.len();
        if self.columns.is_empty() || count < 2 {
            return;
        }

        let mut positions: Vec<usize> = (0..count).collect();
        positions.sort_by(|&a, &b| {
            self.columns
                .iter()
                .map(|(order, column)| order.apply(column.compare(a, b)))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let sorted: Vec<u32> = positions.iter().map(|&i| self.intersect.result()[i]).collect();
        self.intersect.result_mut().copy_from_slice(&sorted);

        let kinds: Vec<&str> = self.columns.iter().map(|(_, column)| column.kind()).collect();
        Logger::trace(
            Event::ResultsSorted.as_str(),
            &[
                ("entries", count.to_string().as_str()),
                ("keys", kinds.join(",").as_str()),
            ],
        );
    }

    fn reserve(&mut self, bytes: usize) -> EngineResult<()> {
        let needed = self.memory.saturating_add(bytes);
        if needed > self.budget {
            return Err(EngineError::invalid_arguments("result set exceeds sort memory")
                .with_details(format!("needed: {}, budget: {}", needed, self.budget)));
        }
        self.memory = needed;
        Ok(())
    }
}

impl std::fmt::Debug for MultiSort<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiSort")
            .field("entries", &self.len())
            .field("keys", &self.columns.len())
            .field("memory", &self.memory)
            .finish()
    }
}

// ============================================================================
// Engine operations
// ============================================================================

impl SearchEngine {
    /// Start a multi-key sort over an executed result
    pub fn multi_sort<'a>(&'a self, intersect: &'a mut Intersect) -> EngineResult<MultiSort<'a>> {
        MultiSort::new(self, intersect)
    }

    pub fn sort_by_attribute(
        &self,
        intersect: &mut Intersect,
        attribute: &str,
        order: SortOrder,
    ) -> EngineResult<()> {
        let mut sort = self.multi_sort(intersect)?;
        sort.by_attribute(attribute, order)?;
        sort.execute();
        Ok(())
    }

    /// Most relevant first with `SortOrder::Descending`
    pub fn sort_by_relevancy(
        &self,
        intersect: &mut Intersect,
        attribute: &str,
        query: &str,
        order: SortOrder,
    ) -> EngineResult<()> {
        let mut sort = self.multi_sort(intersect)?;
        sort.by_relevancy(attribute, query, order)?;
        sort.execute();
        Ok(())
    }

    /// Nearest first with `SortOrder::Ascending`
    pub fn sort_by_distance(
        &self,
        intersect: &mut Intersect,
        latitude: f64,
        longitude: f64,
        order: SortOrder,
    ) -> EngineResult<()> {
        let mut sort = self.multi_sort(intersect)?;
        sort.by_distance(latitude, longitude, order)?;
        sort.execute();
        Ok(())
    }

    /// Distinct values of an indexed attribute across an executed result,
    /// in value order.
    ///
    /// Values are cut the way the attribute's index cuts them: the whole
    /// value when full-string indexing is on, and each delimited token when
    /// tokenizing is on. Terms outside the length limits or on the
    /// exclusion list are not counted. Reserved attributes have no facets.
    pub fn facets(&self, intersect: &Intersect, attribute: &str) -> EngineResult<Vec<Facet>> {
        let reserved = [
            DOMAIN_KEY_ATTRIBUTE,
            CONTAINER_UID_ATTRIBUTE,
            CONTAINER_NAME_ATTRIBUTE,
            "uid",
        ];
        if attribute.is_empty() || reserved.iter().any(|r| attribute.eq_ignore_ascii_case(r)) {
            return Ok(Vec::new());
        }

        let state = self.inner.read_state()?;
        let definition = state
            .registry
            .get(attribute)
            .ok_or_else(|| EngineError::index_missing(attribute))?;
        let text = self.inner.text();
        let effective = definition.effective(&text);
        let tokenized = effective.tokenized
            && !matches!(definition.index_type, IndexType::UserKey | IndexType::Range);
        let stemmer = self.inner.stemmer.as_ref();
        let terms = FacetTerms {
            index_type: definition.index_type,
            text: &effective,
            stemmer,
        };

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for &uid in intersect.result() {
            let value = self
                .read_cached(uid, |container| container.get_string(attribute))
                .flatten()
                .unwrap_or_default();
            if value.is_empty() {
                continue;
            }

            if effective.full_string && terms.counts(&value) {
                *counts.entry(value.clone()).or_insert(0) += 1;
            }
            if tokenized {
                let pieces = split_tokens(&value, effective.delimiters, effective.min_length);
                let whole_value = effective.full_string && pieces.len() == 1 && pieces[0] == value;
                if whole_value {
                    continue;
                }
                for piece in pieces {
                    if terms.counts(piece) {
                        *counts.entry(piece.to_string()).or_insert(0) += 1;
                    }
                }
            }
        }

        Ok(counts
            .into_iter()
            .map(|(value, count)| Facet { value, count })
            .collect())
    }
}

/// Which terms a facet counts for one index definition
struct FacetTerms<'a> {
    index_type: IndexType,
    text: &'a EffectiveText<'a>,
    stemmer: &'a dyn Stemmer,
}

impl FacetTerms<'_> {
    fn counts(&self, term: &str) -> bool {
        let (min, max) = (self.text.min_length, self.text.max_length);
        let length = term.chars().count();
        if length < min || length > max {
            return false;
        }
        let normalized = normalize(term);
        if normalized.chars().count() < min || self.text.is_excluded(&normalized) {
            return false;
        }
        if self.index_type == IndexType::Wildcard {
            let stem = self.stemmer.stem(&normalized);
            let stem_length = stem.chars().count();
            if (min..=max).contains(&stem_length) && self.text.is_excluded(&stem) {
                return false;
            }
        }
        true
    }
}
