//! Geocoordinate radius search
//!
//! A radius search is a bounding-box search over the `latitude` and
//! `longitude` range indexes. The four strict comparisons are ANDed locally
//! and the caller receives a single clause.
//!
//! # Invariants
//!
//! - Both coordinate indexes must exist and be range indexes
//! - Box edges are clamped to [-90, 90] and [-180, 180]

use std::collections::BTreeSet;

use crate::intersect::Intersect;
use crate::registry::IndexType;
use crate::search_index::{RangeQuery, SearchIndex, GEO_SCALE};

use super::handle::{EngineState, SearchEngine};
use super::errors::{EngineError, EngineErrorCode, EngineResult};

const MILES_PER_DEGREE: f64 = 69.0933;
const DEGREES_PER_MILE: f64 = 0.014473169;
const MILES_PER_KILOMETER: f64 = 0.621371192;
const EARTH_RADIUS_MILES: f64 = 3963.1;

/// Unit of a search radius
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Miles,
    Yards,
    Feet,
    Kilometers,
    Meters,
}

impl DistanceUnit {
    pub fn parse(value: &str) -> EngineResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "miles" | "mile" | "mi" => Ok(Self::Miles),
            "yards" | "yard" | "yd" => Ok(Self::Yards),
            "feet" | "foot" | "ft" => Ok(Self::Feet),
            "kilometers" | "kilometer" | "km" => Ok(Self::Kilometers),
            "meters" | "meter" | "m" => Ok(Self::Meters),
            _ => Err(EngineError::new(
                EngineErrorCode::InvalidGeoCoordDistanceType,
                "unknown distance unit",
            )
            .with_details(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Miles => "miles",
            Self::Yards => "yards",
            Self::Feet => "feet",
            Self::Kilometers => "kilometers",
            Self::Meters => "meters",
        }
    }

    pub fn to_miles(&self, distance: f64) -> f64 {
        match self {
            Self::Miles => distance,
            Self::Yards => distance / 1760.0,
            Self::Feet => distance / 5280.0,
            Self::Kilometers => distance * MILES_PER_KILOMETER,
            Self::Meters => distance * MILES_PER_KILOMETER / 1000.0,
        }
    }
}

/// Great-circle distance in miles between two decimal-degree points
pub fn distance_miles(latitude_one: f64, longitude_one: f64, latitude_two: f64, longitude_two: f64) -> f64 {
    let (lat1, lon1) = (latitude_one.to_radians(), longitude_one.to_radians());
    let (lat2, lon2) = (latitude_two.to_radians(), longitude_two.to_radians());
    let cosine = lat1.cos() * lon1.cos() * lat2.cos() * lon2.cos()
        + lat1.cos() * lon1.sin() * lat2.cos() * lon2.sin()
        + lat1.sin() * lat2.sin();
    // Rounding can push identical points just past 1.0
    cosine.clamp(-1.0, 1.0).acos() * EARTH_RADIUS_MILES
}

/// Scaled bounds of a search box
#[derive(Debug, Clone, Copy, PartialEq)]
struct GeoBox {
    min_latitude: i64,
    max_latitude: i64,
    min_longitude: i64,
    max_longitude: i64,
}

impl GeoBox {
    fn around(latitude: f64, longitude: f64, miles: f64) -> Self {
        let lat_span = miles * DEGREES_PER_MILE;
        let lon_span = miles / (MILES_PER_DEGREE * (latitude * std::f64::consts::PI / 180.0).cos());

        let scale = |degrees: f64| (degrees * GEO_SCALE) as i64;
        Self {
            min_latitude: scale((latitude - lat_span).max(-90.0)),
            max_latitude: scale((latitude + lat_span).min(90.0)),
            min_longitude: scale((longitude - lon_span).max(-180.0)),
            max_longitude: scale((longitude + lon_span).min(180.0)),
        }
    }

    fn queries(&self) -> [(&'static str, RangeQuery); 4] {
        [
            ("latitude", RangeQuery::GreaterThan(self.min_latitude)),
            ("latitude", RangeQuery::LessThan(self.max_latitude)),
            ("longitude", RangeQuery::GreaterThan(self.min_longitude)),
            ("longitude", RangeQuery::LessThan(self.max_longitude)),
        ]
    }
}

pub(super) fn validate_point(latitude: f64, longitude: f64) -> EngineResult<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(EngineError::invalid_arguments("latitude out of range")
            .with_details(latitude.to_string()));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(EngineError::invalid_arguments("longitude out of range")
            .with_details(longitude.to_string()));
    }
    Ok(())
}

fn validate(latitude: f64, longitude: f64, miles: f64) -> EngineResult<()> {
    validate_point(latitude, longitude)?;
    if !miles.is_finite() || miles <= 0.0 {
        return Err(EngineError::invalid_arguments("distance must be positive")
            .with_details(miles.to_string()));
    }
    Ok(())
}

fn require_coordinate_indexes(state: &EngineState) -> EngineResult<()> {
    for key in ["latitude", "longitude"] {
        let definition = state
            .registry
            .get(key)
            .ok_or_else(|| EngineError::index_missing(key))?;
        if definition.index_type != IndexType::Range {
            return Err(EngineError::new(
                EngineErrorCode::IndexTypeInvalid,
                "coordinate index is not a range index",
            )
            .with_details(format!("index: {}", key)));
        }
    }
    Ok(())
}

impl SearchEngine {
    /// Containers in one domain within `distance` of a point
    pub fn search_range_geocoord(
        &self,
        domain_key: &str,
        unit: DistanceUnit,
        latitude: f64,
        longitude: f64,
        distance: f64,
        intersect: &mut Intersect,
    ) -> EngineResult<()> {
        let miles = unit.to_miles(distance);
        validate(latitude, longitude, miles)?;

        let state = self.inner.read_state()?;
        let domain = state.domain(domain_key)?;
        require_coordinate_indexes(&state)?;

        let bounds = GeoBox::around(latitude, longitude, miles);
        let mut local = Intersect::new();
        for (key, query) in bounds.queries() {
            local.push(domain.search_range(key, query)?, true);
        }
        local.exec_and(true);
        intersect.push_result(&local);
        self.inner.metrics.increment_searches();
        Ok(())
    }

    /// `search_range_geocoord` across every domain
    pub fn search_range_geocoord_global(
        &self,
        unit: DistanceUnit,
        latitude: f64,
        longitude: f64,
        distance: f64,
        intersect: &mut Intersect,
    ) -> EngineResult<()> {
        let miles = unit.to_miles(distance);
        validate(latitude, longitude, miles)?;

        let state = self.inner.read_state()?;
        require_coordinate_indexes(&state)?;

        let bounds = GeoBox::around(latitude, longitude, miles);
        let domains: Vec<&SearchIndex> = state.domains().collect();
        let mut local = Intersect::new();
        for (key, query) in bounds.queries() {
            let mut ids = BTreeSet::new();
            for domain in &domains {
                ids.extend(domain.search_range(key, query)?);
            }
            local.push(ids.into_iter().collect(), true);
        }
        local.exec_and(true);
        intersect.push_result(&local);
        self.inner.metrics.increment_searches();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::engine::{EngineConfig, WriteMode};

    fn engine() -> (SearchEngine, Vec<u32>) {
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        engine.new_domain("places", "Places").unwrap();
        engine.new_index(IndexType::Range, "latitude", "Latitude").unwrap();
        engine.new_index(IndexType::Range, "longitude", "Longitude").unwrap();

        let points = [(40.01, -105.0), (40.05, -105.0), (40.0, -105.05), (40.1, -105.0)];
        let uids = points
            .iter()
            .map(|(lat, lon)| {
                let mut c = Container::new("place");
                c.put_double("latitude", *lat).unwrap();
                c.put_double("longitude", *lon).unwrap();
                engine.put("places", c, WriteMode::Immediate).unwrap()
            })
            .collect();
        (engine, uids)
    }

    fn radius(engine: &SearchEngine, unit: DistanceUnit, distance: f64) -> Vec<u32> {
        let mut intersect = Intersect::new();
        engine
            .search_range_geocoord("places", unit, 40.0, -105.0, distance, &mut intersect)
            .unwrap();
        assert_eq!(intersect.clause_count(), 1);
        intersect.exec_and(true).to_vec()
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(DistanceUnit::Yards.to_miles(1760.0), 1.0);
        assert_eq!(DistanceUnit::Feet.to_miles(5280.0), 1.0);
        assert!((DistanceUnit::Meters.to_miles(1000.0) - 0.621371192).abs() < 1e-12);
        assert_eq!(DistanceUnit::parse("KM").unwrap(), DistanceUnit::Kilometers);
        assert_eq!(
            DistanceUnit::parse("furlongs").unwrap_err().code(),
            EngineErrorCode::InvalidGeoCoordDistanceType
        );
    }

    #[test]
    fn test_distance_miles() {
        assert!(distance_miles(40.0, -105.0, 40.0, -105.0) < 1e-3);
        // One degree of latitude
        assert!((distance_miles(40.0, -105.0, 41.0, -105.0) - 69.17).abs() < 0.01);
        // Denver to New York
        let miles = distance_miles(39.7392, -104.9903, 40.7128, -74.0060);
        assert!((miles - 1629.0).abs() < 5.0, "got {}", miles);
        let there = distance_miles(10.0, 20.0, -30.0, 40.0);
        let back = distance_miles(-30.0, 40.0, 10.0, 20.0);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn test_radius_grows_with_distance() {
        let (engine, uids) = engine();
        assert_eq!(radius(&engine, DistanceUnit::Miles, 1.5), vec![uids[0]]);
        assert_eq!(radius(&engine, DistanceUnit::Miles, 5.0), uids[..3].to_vec());
        assert_eq!(radius(&engine, DistanceUnit::Miles, 10.0), uids);
        assert_eq!(radius(&engine, DistanceUnit::Kilometers, 8.1).len(), 3);
    }

    #[test]
    fn test_global_and_invalid_arguments() {
        let (engine, uids) = engine();
        let mut intersect = Intersect::new();
        engine
            .search_range_geocoord_global(DistanceUnit::Miles, 40.0, -105.0, 1.5, &mut intersect)
            .unwrap();
        assert_eq!(intersect.exec_and(true), &[uids[0]]);

        let mut intersect = Intersect::new();
        let err = engine
            .search_range_geocoord("places", DistanceUnit::Miles, 95.0, 0.0, 1.0, &mut intersect)
            .unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::InvalidArguments);
        let err = engine
            .search_range_geocoord("places", DistanceUnit::Miles, 0.0, 0.0, 0.0, &mut intersect)
            .unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::InvalidArguments);
    }

    #[test]
    fn test_missing_coordinate_index() {
        let engine = SearchEngine::new(EngineConfig::default()).unwrap();
        engine.new_domain("places", "Places").unwrap();
        let mut intersect = Intersect::new();
        let err = engine
            .search_range_geocoord("places", DistanceUnit::Miles, 0.0, 0.0, 1.0, &mut intersect)
            .unwrap_err();
        assert_eq!(err.code(), EngineErrorCode::IndexLocate);
    }
}
