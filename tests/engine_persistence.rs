//! Snapshot and restore tests
//!
//! State snapshots carry the catalog and settings; container snapshots
//! carry the cached containers. Both rotate older generations aside.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use searchd::engine::{EngineConfig, EngineErrorCode, SearchEngine, WriteMode};
use searchd::{Container, IndexType, Intersect};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn create_temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

fn create_engine(dir: &Path) -> SearchEngine {
    let config = EngineConfig::default()
        .with_backup_path(dir)
        .with_excluded_words_path(dir.join("excluded.words.config"));
    SearchEngine::new(config).expect("Failed to create engine")
}

fn populate(engine: &SearchEngine) -> Vec<u32> {
    engine.new_domain("library", "Library").unwrap();
    engine.new_domain("archive", "Archive").unwrap();
    engine.new_index(IndexType::Wildcard, "title", "Title").unwrap();
    engine.new_index(IndexType::Exact, "shelf", "Shelf").unwrap();
    engine.new_index(IndexType::Range, "year", "Year").unwrap();
    engine.set_index_delimiters("shelf", Some("|")).unwrap();
    engine.set_index_flags("title", true, true).unwrap();

    let mut uids = Vec::new();
    for (domain, title, shelf, year) in [
        ("library", "The Left Hand of Darkness", "SF|Classics", 1969),
        ("library", "A Wizard of Earthsea", "Fantasy", 1968),
        ("archive", "The Dispossessed", "SF", 1974),
    ] {
        let mut c = Container::new("book");
        c.put_string("title", title).unwrap();
        c.put_string("shelf", shelf).unwrap();
        c.put_int("year", year).unwrap();
        uids.push(engine.put(domain, c, WriteMode::Immediate).unwrap());
    }
    uids
}

fn search(engine: &SearchEngine, domain: &str, attribute: &str, value: &str) -> Vec<u32> {
    let mut intersect = Intersect::new();
    engine.search(domain, attribute, value, &mut intersect).unwrap();
    intersect.exec_and(true).to_vec()
}

// =============================================================================
// State Snapshots
// =============================================================================

#[test]
fn test_state_restore_recreates_catalog() {
    let temp_dir = create_temp_dir();
    let source = create_engine(temp_dir.path());
    populate(&source);
    source.set_max_sort_memory(4096);
    let path = source.write_state().unwrap();
    assert!(path.ends_with("searchd.state.00.config"));

    let restored = create_engine(temp_dir.path());
    restored.restore_state(None).unwrap();

    let domains: Vec<String> = restored.domains().unwrap().into_iter().map(|d| d.key).collect();
    assert_eq!(domains, vec!["library".to_string(), "archive".to_string()]);

    let before = source.index_definitions().unwrap();
    let after = restored.index_definitions().unwrap();
    assert_eq!(before, after);
    assert_eq!(
        restored.index_definition("shelf").unwrap().settings.delimiters.as_deref(),
        Some("|")
    );
    assert_eq!(restored.config().max_sort_operation_memory_length, 4096);
}

#[test]
fn test_state_rotation_keeps_two_generations() {
    let temp_dir = create_temp_dir();
    let engine = create_engine(temp_dir.path());
    engine.new_domain("only", "Only").unwrap();

    for _ in 0..4 {
        engine.write_state().unwrap();
    }
    let dir = temp_dir.path();
    assert!(dir.join("searchd.state.00.config").exists());
    assert!(dir.join("searchd.state.01.config").exists());
    assert!(dir.join("searchd.state.02.config").exists());
    assert!(!dir.join("searchd.state.03.config").exists());
}

#[test]
fn test_missing_state_file_is_state_read() {
    let temp_dir = create_temp_dir();
    let engine = create_engine(temp_dir.path());
    let err = engine.restore_state(None).unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::StateRead);
}

// =============================================================================
// Container Snapshots
// =============================================================================

#[test]
fn test_container_snapshot_round_trip() {
    let temp_dir = create_temp_dir();
    let source = create_engine(temp_dir.path());
    let uids = populate(&source);
    source.write_state().unwrap();
    source.write_data().unwrap();

    let restored = create_engine(temp_dir.path());
    restored.restore_state(None).unwrap();
    assert_eq!(restored.restore_data(None).unwrap(), 3);
    assert!(restored.sync(Duration::from_secs(5)));

    assert_eq!(restored.container_count(), 3);
    assert_eq!(search(&restored, "library", "shelf", "classics"), vec![uids[0]]);
    assert_eq!(search(&restored, "archive", "title", "dispossessed"), vec![uids[2]]);

    // New uids continue past the restored ones
    let next = restored
        .put("archive", Container::new("book"), WriteMode::Immediate)
        .unwrap();
    assert!(next > uids[2]);
}

#[test]
fn test_corrupt_record_restores_the_rest() {
    let temp_dir = create_temp_dir();
    let source = create_engine(temp_dir.path());
    populate(&source);
    source.write_state().unwrap();
    let path = source.write_data().unwrap();

    // Flip a byte inside the first record's payload
    let mut contents = fs::read(&path).unwrap();
    contents[4 + 8 + 2] ^= 0xFF;
    fs::write(&path, contents).unwrap();

    let restored = create_engine(temp_dir.path());
    restored.restore_state(None).unwrap();
    let err = restored.restore_data(None).unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::DataRead);
    assert!(restored.sync(Duration::from_secs(5)));
    assert_eq!(restored.container_count(), 2);
}

#[test]
fn test_bad_magic_rejected() {
    let temp_dir = create_temp_dir();
    let engine = create_engine(temp_dir.path());
    let path = temp_dir.path().join("searchd.00.containers");
    fs::write(&path, b"not a snapshot").unwrap();

    let err = engine.restore_data(Some(&path)).unwrap_err();
    assert_eq!(err.code(), EngineErrorCode::DataRead);
    assert_eq!(engine.container_count(), 0);
}

// =============================================================================
// Background Writes
// =============================================================================

#[test]
fn test_worker_writes_snapshots_before_waiting_for_mutations() {
    let temp_dir = create_temp_dir();
    let mut config = EngineConfig::default()
        .with_backup_path(temp_dir.path())
        .with_excluded_words_path(temp_dir.path().join("excluded.words.config"));
    config.state_write_threshold = 0;
    config.container_write_threshold = 0;
    config.worker_idle_wait_ms = 2000;
    let engine = SearchEngine::new(config).unwrap();

    // Nothing is queued, so the first receive would block for the whole idle wait.
    let deadline = Instant::now() + Duration::from_millis(1500);
    let mut metrics = engine.metrics();
    while (metrics.state_writes == 0 || metrics.data_writes == 0) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
        metrics = engine.metrics();
    }
    assert!(metrics.state_writes >= 1);
    assert!(metrics.data_writes >= 1);
    assert_eq!(metrics.queue_batches, 0);
    assert!(temp_dir.path().join("searchd.state.00.config").exists());
    assert!(temp_dir.path().join("searchd.00.containers").exists());
}

// =============================================================================
// Excluded Words
// =============================================================================

#[test]
fn test_engine_excluded_words_skip_tokens() {
    let temp_dir = create_temp_dir();
    fs::write(
        temp_dir.path().join("excluded.words.config"),
        "[excluded.words]\nwordCount=1\nword000=darkness\n",
    )
    .unwrap();
    let engine = create_engine(temp_dir.path());
    engine.new_domain("library", "Library").unwrap();
    engine.new_index(IndexType::Wildcard, "title", "Title").unwrap();

    let mut c = Container::new("book");
    c.put_string("title", "Heart of Darkness").unwrap();
    let uid = engine.put("library", c, WriteMode::Immediate).unwrap();

    assert_eq!(search(&engine, "library", "title", "heart"), vec![uid]);
    assert!(search(&engine, "library", "title", "darkness").is_empty());
}
