//! Geocoordinate search tests
//!
//! Radius searches over the latitude/longitude range indexes.

use searchd::engine::{distance_miles, EngineConfig, EngineErrorCode, SearchEngine, WriteMode};
use searchd::{Container, DistanceUnit, IndexType, Intersect, SortOrder};

// =============================================================================
// Test Utilities
// =============================================================================

const CENTER: (f64, f64) = (34.187897, -118.892618);

const FIXTURES: [(f64, f64); 4] = [
    (34.186193, -118.876516),
    (34.16402, -118.828175),
    (34.138769, -118.823111),
    (34.14431, -118.763026),
];

fn create_engine() -> SearchEngine {
    let engine = SearchEngine::new(EngineConfig::default()).expect("Failed to create engine");
    engine.new_domain("places", "Places").unwrap();
    engine.new_index(IndexType::Range, "latitude", "Latitude").unwrap();
    engine.new_index(IndexType::Range, "longitude", "Longitude").unwrap();
    for (latitude, longitude) in FIXTURES {
        let mut place = Container::new("place");
        place.put_double("latitude", latitude).unwrap();
        place.put_double("longitude", longitude).unwrap();
        engine.put("places", place, WriteMode::Immediate).unwrap();
    }
    engine
}

fn count_within(engine: &SearchEngine, unit: DistanceUnit, distance: f64) -> usize {
    let mut intersect = Intersect::new();
    engine
        .search_range_geocoord("places", unit, CENTER.0, CENTER.1, distance, &mut intersect)
        .unwrap();
    intersect.exec_and(true).len()
}

// =============================================================================
// Radius Searches
// =============================================================================

#[test]
fn test_radius_counts_in_miles() {
    let engine = create_engine();
    assert_eq!(count_within(&engine, DistanceUnit::Miles, 1.5), 1);
    assert_eq!(count_within(&engine, DistanceUnit::Miles, 5.0), 3);
    assert_eq!(count_within(&engine, DistanceUnit::Miles, 10.0), 4);
}

#[test]
fn test_radius_in_other_units() {
    let engine = create_engine();
    assert_eq!(count_within(&engine, DistanceUnit::Kilometers, 2.4), 1);
    assert_eq!(count_within(&engine, DistanceUnit::Feet, 1.5 * 5280.0), 1);
    assert_eq!(count_within(&engine, DistanceUnit::Yards, 10.0 * 1760.0), 4);
    assert_eq!(count_within(&engine, DistanceUnit::Meters, 8_100.0), 3);
}

#[test]
fn test_global_radius_spans_domains() {
    let engine = create_engine();
    engine.new_domain("more", "More").unwrap();
    let mut extra = Container::new("place");
    extra.put_double("latitude", CENTER.0).unwrap();
    extra.put_double("longitude", CENTER.1 + 0.001).unwrap();
    engine.put("more", extra, WriteMode::Immediate).unwrap();

    let mut intersect = Intersect::new();
    engine
        .search_range_geocoord_global(DistanceUnit::Miles, CENTER.0, CENTER.1, 1.5, &mut intersect)
        .unwrap();
    assert_eq!(intersect.clause_count(), 1);
    assert_eq!(intersect.exec_and(true).len(), 2);
}

#[test]
fn test_unknown_unit_and_domain() {
    let engine = create_engine();
    assert_eq!(
        DistanceUnit::parse("leagues").unwrap_err().code(),
        EngineErrorCode::InvalidGeoCoordDistanceType
    );

    let mut intersect = Intersect::new();
    let err = engine
        .search_range_geocoord("nowhere", DistanceUnit::Miles, 0.0, 0.0, 1.0, &mut intersect)
        .unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::DomainLocate);
}

// =============================================================================
// Distance Ordering
// =============================================================================

#[test]
fn test_radius_results_sorted_by_distance() {
    let engine = create_engine();
    let mut intersect = Intersect::new();
    engine
        .search_range_geocoord("places", DistanceUnit::Miles, CENTER.0, CENTER.1, 10.0, &mut intersect)
        .unwrap();
    let found = intersect.exec_and(true).to_vec();
    assert_eq!(found.len(), 4);

    // Fixtures were put nearest first
    engine
        .sort_by_distance(&mut intersect, CENTER.0, CENTER.1, SortOrder::Descending)
        .unwrap();
    let mut farthest_first = found.clone();
    farthest_first.reverse();
    assert_eq!(intersect.result(), farthest_first.as_slice());

    engine
        .sort_by_distance(&mut intersect, CENTER.0, CENTER.1, SortOrder::Ascending)
        .unwrap();
    assert_eq!(intersect.result(), found.as_slice());
}

#[test]
fn test_distance_miles_between_fixtures() {
    let (latitude, longitude) = FIXTURES[0];
    let miles = distance_miles(CENTER.0, CENTER.1, latitude, longitude);
    assert!((miles - 0.93).abs() < 0.01, "got {}", miles);
}
