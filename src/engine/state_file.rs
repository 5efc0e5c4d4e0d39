//! State snapshots and excluded-word files
//!
//! The state snapshot records index definitions with their overrides, the
//! domain list, and engine settings. It does not hold containers. Each
//! write rotates `.00` → `.01` → `.02` before writing a fresh `.00`.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::observability::{log_event_with_fields, Event, Logger};
use crate::registry::{ExcludedWords, IndexDefinition, IndexRegistry, IndexSettings, IndexType};
use crate::search_index::SearchIndex;
use crate::text::{build_index_string, normalize, Stemmer};

use super::auth::{TokenAuthenticator, ValidationStrictness};
use super::conf_file::ConfigDocument;
use super::config::EngineConfig;
use super::handle::{EngineInner, SearchEngine};
use super::errors::{EngineError, EngineErrorCode, EngineResult};

const EXCLUDED_SECTION: &str = "excluded.words";
const ENGINE_SECTION: &str = "search.engine";
const BACKUP_SECTION: &str = "search.engine.backup";
const EXCLUSIONS_SECTION: &str = "search.engine.exclusions";
const AUTH_SECTION: &str = "search.engine.authentication";
const LANG_SECTION: &str = "search.engine.lang.json";

pub(crate) fn state_file_path(dir: &Path, generation: u8) -> PathBuf {
    dir.join(format!("searchd.state.{:02}.config", generation))
}

/// Shift generation 01 to 02 and 00 to 01
pub(crate) fn rotate(path_for: impl Fn(u8) -> PathBuf) -> std::io::Result<()> {
    for generation in [1u8, 0] {
        let from = path_for(generation);
        if from.exists() {
            fs::rename(&from, path_for(generation + 1))?;
        }
    }
    Ok(())
}

/// Make sure `dir` exists and is a directory
pub(crate) fn prepare_directory(dir: &Path) -> EngineResult<()> {
    if dir.as_os_str().is_empty() {
        return Err(EngineError::new(EngineErrorCode::InvalidDirectory, "no snapshot path"));
    }
    fs::create_dir_all(dir).map_err(|e| {
        EngineError::io(EngineErrorCode::InvalidDirectory, "failed to create snapshot directory", e)
            .with_details(dir.display().to_string())
    })
}

/// Read an excluded-word file. Each word is stored normalized and stemmed.
pub(crate) fn load_excluded_words(path: &Path, stemmer: &dyn Stemmer) -> EngineResult<ExcludedWords> {
    let text = fs::read_to_string(path).map_err(|e| {
        EngineError::io(EngineErrorCode::FailedToInitConfig, "failed to read excluded words", e)
            .with_details(path.display().to_string())
    })?;
    let document = ConfigDocument::parse(&text).map_err(|e| {
        EngineError::new(EngineErrorCode::FailedToInitConfig, "invalid excluded words file")
            .with_details(path.display().to_string())
            .with_source(e)
    })?;

    let count: usize = document.get_parsed(EXCLUDED_SECTION, "wordCount").unwrap_or(0);
    let mut words = BTreeSet::new();
    for index in 0..count {
        let Some(raw) = document.get(EXCLUDED_SECTION, &format!("word{:03}", index)) else {
            continue;
        };
        let word = normalize(raw);
        if word.is_empty() {
            continue;
        }
        let stem = stemmer.stem(&word);
        if !stem.is_empty() {
            words.insert(stem);
        }
        words.insert(word);
    }

    log_event_with_fields(
        Event::ExcludedWordsLoaded,
        &[
            ("path", path.display().to_string().as_str()),
            ("words", words.len().to_string().as_str()),
        ],
    );
    Ok(ExcludedWords::new(path, words))
}

fn state_read(message: &str, details: String) -> EngineError {
    EngineError::new(EngineErrorCode::StateRead, message).with_details(details)
}

// ============================================================================
// Writing
// ============================================================================

fn write_definition(document: &mut ConfigDocument, section: &str, definition: &IndexDefinition) {
    document.set(section, "type", definition.index_type.as_str());
    document.set(section, "uid", definition.uid);
    document.set(section, "key", &definition.key);
    document.set(section, "name", &definition.name);

    let settings = &definition.settings;
    if let Some(min) = settings.min_string_length {
        document.set(section, "minStringLength", min);
    }
    if let Some(max) = settings.max_string_length {
        document.set(section, "maxStringLength", max);
    }
    if let Some(delimiters) = &settings.delimiters {
        document.set(section, "delimiters", delimiters);
    }
    if let Some(excluded) = &settings.excluded_words {
        document.set(section, "excludedWords", excluded.path.display());
    }
    document.set(section, "fullStringIndexing", settings.full_string_indexing);
    document.set(section, "tokenizedIndexing", settings.tokenized_indexing);
}

fn write_settings(document: &mut ConfigDocument, config: &EngineConfig) {
    document.set(ENGINE_SECTION, "maxContainerCount", config.max_container_count);
    document.set(ENGINE_SECTION, "maxContainerMemoryLength", config.max_container_memory_length);
    document.set(ENGINE_SECTION, "containerTimeout", config.container_timeout);
    document.set(ENGINE_SECTION, "minStringLength", config.min_string_length);
    document.set(ENGINE_SECTION, "maxStringLength", config.max_string_length);
    document.set(
        ENGINE_SECTION,
        "maxSortOperationMemoryLength",
        config.max_sort_operation_memory_length,
    );
    document.set(ENGINE_SECTION, "stringDelimiters", &config.string_delimiters);

    document.set(BACKUP_SECTION, "stateWriteThresholdSeconds", config.state_write_threshold);
    document.set(BACKUP_SECTION, "statePath", config.state_path.display());
    document.set(
        BACKUP_SECTION,
        "containerWriteThresholdSeconds",
        config.container_write_threshold,
    );
    document.set(BACKUP_SECTION, "containerPath", config.container_path.display());

    document.set(
        EXCLUSIONS_SECTION,
        "excludedWordConfigFilename",
        config.excluded_words_path.display(),
    );
    document.set(
        AUTH_SECTION,
        "authenticationConfigFilename",
        config.authentication_path.display(),
    );
    document.set(LANG_SECTION, "typeCheckLevel", config.validation_strictness.as_str());
}

impl EngineInner {
    /// Render the current catalog and settings
    fn state_document(&self) -> EngineResult<ConfigDocument> {
        let config = self.config();
        let mut document = ConfigDocument::new();
        let written = format!("written {}", chrono::Utc::now().to_rfc3339());
        document.set_comment(&["searchd state snapshot", written.as_str()]);

        let state = self.read_state()?;
        let mut registers = 0usize;
        for definition in state.registry.iter() {
            write_definition(&mut document, &format!("indexRegistry.{:03}", registers), definition);
            registers += 1;
        }
        document.set("index.registry", "registers", registers);

        let mut domains = 0usize;
        for domain in state.domains() {
            let section = format!("domain.{:03}", domains);
            document.set(&section, "key", domain.key());
            document.set(&section, "name", domain.name());
            domains += 1;
        }
        document.set("domains", "length", domains);
        drop(state);

        write_settings(&mut document, &config);
        Ok(document)
    }

    /// Write `searchd.state.00.config` under the configured state path
    pub(crate) fn write_state_file(&self) -> EngineResult<PathBuf> {
        let dir = self.settings.lock().config.state_path.clone();
        prepare_directory(&dir)?;
        let document = self.state_document()?;

        let state_write = |e: std::io::Error| {
            EngineError::io(EngineErrorCode::StateWrite, "failed to write state snapshot", e)
                .with_details(dir.display().to_string())
        };
        rotate(|generation| state_file_path(&dir, generation)).map_err(state_write)?;
        let path = state_file_path(&dir, 0);
        let mut file = File::create(&path).map_err(state_write)?;
        file.write_all(document.render().as_bytes()).map_err(state_write)?;
        file.sync_all().map_err(state_write)?;

        self.metrics.increment_state_writes();
        log_event_with_fields(
            Event::StateWriteComplete,
            &[("path", path.display().to_string().as_str())],
        );
        Ok(path)
    }
}

// ============================================================================
// Restoring
// ============================================================================

fn restore_definition(
    document: &ConfigDocument,
    section: &str,
    stemmer: &dyn Stemmer,
) -> Option<IndexDefinition> {
    let index_type = IndexType::parse(document.get(section, "type")?)?;
    let uid: u32 = document.get_parsed(section, "uid")?;
    let key = IndexRegistry::index_key(document.get(section, "key")?).ok()?;
    let name = document.get(section, "name")?.to_string();

    let mut settings = IndexSettings {
        min_string_length: document.get_parsed(section, "minStringLength"),
        max_string_length: document.get_parsed(section, "maxStringLength"),
        delimiters: document.get(section, "delimiters").map(str::to_string),
        ..IndexSettings::default()
    };
    if let Some(flag) = document.get_bool(section, "fullStringIndexing") {
        settings.full_string_indexing = flag;
    }
    if let Some(flag) = document.get_bool(section, "tokenizedIndexing") {
        settings.tokenized_indexing = flag;
    }
    if let Some(path) = document.get(section, "excludedWords") {
        match load_excluded_words(Path::new(path), stemmer) {
            Ok(words) => settings.excluded_words = Some(words),
            Err(err) => Logger::warn(
                Event::StateRestoreComplete.as_str(),
                &[("index", key.as_str()), ("error", err.to_string().as_str())],
            ),
        }
    }

    Some(IndexDefinition {
        uid,
        index_type,
        key,
        name,
        settings,
    })
}

fn restore_settings(document: &ConfigDocument, config: &mut EngineConfig) {
    macro_rules! restore {
        ($section:expr, $key:expr, $field:expr) => {
            if let Some(value) = document.get_parsed($section, $key) {
                $field = value;
            }
        };
    }

    restore!(ENGINE_SECTION, "maxContainerCount", config.max_container_count);
    restore!(ENGINE_SECTION, "maxContainerMemoryLength", config.max_container_memory_length);
    restore!(ENGINE_SECTION, "containerTimeout", config.container_timeout);
    restore!(ENGINE_SECTION, "minStringLength", config.min_string_length);
    restore!(ENGINE_SECTION, "maxStringLength", config.max_string_length);
    restore!(
        ENGINE_SECTION,
        "maxSortOperationMemoryLength",
        config.max_sort_operation_memory_length
    );
    if let Some(delimiters) = document.get(ENGINE_SECTION, "stringDelimiters") {
        if !delimiters.is_empty() {
            config.string_delimiters = delimiters.to_string();
        }
    }

    restore!(BACKUP_SECTION, "stateWriteThresholdSeconds", config.state_write_threshold);
    restore!(BACKUP_SECTION, "statePath", config.state_path);
    restore!(
        BACKUP_SECTION,
        "containerWriteThresholdSeconds",
        config.container_write_threshold
    );
    restore!(BACKUP_SECTION, "containerPath", config.container_path);
    restore!(EXCLUSIONS_SECTION, "excludedWordConfigFilename", config.excluded_words_path);
    restore!(AUTH_SECTION, "authenticationConfigFilename", config.authentication_path);

    if let Some(strictness) = document
        .get(LANG_SECTION, "typeCheckLevel")
        .and_then(ValidationStrictness::parse)
    {
        config.validation_strictness = strictness;
    }
}

impl SearchEngine {
    /// Write a state snapshot now; returns the file written
    pub fn write_state(&self) -> EngineResult<PathBuf> {
        self.inner.write_state_file()
    }

    /// Recreate definitions, domains, and settings from a state snapshot.
    ///
    /// `None` reads `searchd.state.00.config` under the configured state
    /// path. Definitions and domains that already exist are kept as they
    /// are. Every index is rebuilt from cached containers afterwards.
    pub fn restore_state(&self, path: Option<&Path>) -> EngineResult<()> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => state_file_path(&self.inner.settings.lock().config.state_path, 0),
        };
        let text = fs::read_to_string(&path).map_err(|e| {
            EngineError::io(EngineErrorCode::StateRead, "failed to read state snapshot", e)
                .with_details(path.display().to_string())
        })?;
        let document = ConfigDocument::parse(&text).map_err(|e| {
            state_read("invalid state snapshot", path.display().to_string()).with_source(e)
        })?;

        // Settings first: the settings mutex is never held with the engine lock
        let mut config = self.inner.config();
        restore_settings(&document, &mut config);
        config.validate()?;
        let excluded = if config.excluded_words_path.exists() {
            Some(load_excluded_words(&config.excluded_words_path, self.inner.stemmer.as_ref())?)
        } else {
            None
        };
        if config.authentication_path.exists() {
            let auth = TokenAuthenticator::load(&config.authentication_path)?;
            self.set_authenticator(Arc::new(auth));
        }
        self.inner.cache.set_config(config.cache_config());
        {
            let mut settings = self.inner.settings.lock();
            settings.config = config;
            settings.refresh_text(excluded);
        }

        let registers: usize = document.get_parsed("index.registry", "registers").unwrap_or(0);
        let domain_count: usize = document.get_parsed("domains", "length").unwrap_or(0);
        let mut restored_indexes = 0usize;
        let mut restored_domains = 0usize;
        {
            let mut state = self.inner.write_state()?;
            for index in 0..registers {
                let section = format!("indexRegistry.{:03}", index);
                let Some(definition) =
                    restore_definition(&document, &section, self.inner.stemmer.as_ref())
                else {
                    Logger::warn(
                        Event::StateRestoreComplete.as_str(),
                        &[("skipped", section.as_str())],
                    );
                    continue;
                };
                if state.registry.contains(&definition.key) {
                    continue;
                }
                state.registry.restore(definition)?;
                restored_indexes += 1;
            }

            for index in 0..domain_count {
                let section = format!("domain.{:03}", index);
                let (Some(key), Some(name)) =
                    (document.get(&section, "key"), document.get(&section, "name"))
                else {
                    continue;
                };
                let key = build_index_string(key);
                if key.is_empty() || state.has_domain(&key) {
                    continue;
                }
                let domain = SearchIndex::new(&key, name, state.registry.iter());
                state.add_domain(domain)?;
                restored_domains += 1;
            }

            for domain in state.domains() {
                for definition in state.registry.iter() {
                    if !domain.has_index(&definition.key) {
                        domain.new_index(definition).map_err(|e| {
                            EngineError::new(EngineErrorCode::DomainCreateIndex, e.to_string())
                        })?;
                    }
                }
            }
        }
        self.rebuild_all()?;

        log_event_with_fields(
            Event::StateRestoreComplete,
            &[
                ("path", path.display().to_string().as_str()),
                ("indexes", restored_indexes.to_string().as_str()),
                ("domains", restored_domains.to_string().as_str()),
            ],
        );
        Ok(())
    }
}
