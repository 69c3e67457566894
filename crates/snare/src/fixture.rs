//! Fixture Store
//!
//! Named, structured payloads used as canned response content. Payloads are
//! parsed once and cached immutably; every [`FixtureStore::load`] hands back a
//! deep copy so one test mutating its copy can never leak into another.
//!
//! ```ignore
//! let store = FixtureStore::from_dir("tests/fixtures");
//! let mut articles = store.load("articles")?;
//! articles["articles"][1]["favoritesCount"] = 6.into();
//! ```

use crate::result::{SnareError, SnareResult};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Extensions tried, in order, when resolving a fixture name to a file
const FIXTURE_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Backing storage for named fixtures
pub trait FixtureSource: Send + Sync {
    /// Read the fixture, or `Ok(None)` when this source does not have it
    fn read(&self, name: &str) -> SnareResult<Option<Value>>;

    /// Names this source can serve
    fn names(&self) -> SnareResult<Vec<String>>;

    /// Short description for logging
    fn describe(&self) -> String;
}

/// Fixtures stored as `<name>.json` / `<name>.yaml` files under a directory.
/// Subdirectories hold nested names (`nested/feed`).
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Create a source rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The fixture directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidate_paths(&self, name: &str) -> Vec<PathBuf> {
        FIXTURE_EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")))
            .collect()
    }
}

impl FixtureSource for DirectorySource {
    fn read(&self, name: &str) -> SnareResult<Option<Value>> {
        for path in self.candidate_paths(name) {
            if !path.is_file() {
                continue;
            }
            let raw = fs::read_to_string(&path)?;
            let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
            let parsed = if is_json {
                serde_json::from_str(&raw).map_err(|e| e.to_string())
            } else {
                serde_yaml_ng::from_str(&raw).map_err(|e| e.to_string())
            };
            return parsed
                .map(Some)
                .map_err(|message| SnareError::FixtureParse {
                    name: name.to_string(),
                    message,
                });
        }
        Ok(None)
    }

    fn names(&self) -> SnareResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        collect_names(&self.root, "", &mut names)?;
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn describe(&self) -> String {
        format!("dir:{}", self.root.display())
    }
}

fn collect_names(dir: &Path, prefix: &str, names: &mut Vec<String>) -> SnareResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            if let Some(child) = path.file_name().and_then(|s| s.to_str()) {
                collect_names(&path, &format!("{prefix}{child}/"), names)?;
            }
            continue;
        }
        let known = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| FIXTURE_EXTENSIONS.contains(&ext));
        if known {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(format!("{prefix}{stem}"));
            }
        }
    }
    Ok(())
}

/// Fixtures held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    fixtures: HashMap<String, Value>,
}

impl InMemorySource {
    /// Create an empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixture
    #[must_use]
    pub fn with(mut self, name: &str, payload: Value) -> Self {
        self.fixtures.insert(name.to_string(), payload);
        self
    }
}

impl FixtureSource for InMemorySource {
    fn read(&self, name: &str) -> SnareResult<Option<Value>> {
        Ok(self.fixtures.get(name).cloned())
    }

    fn names(&self) -> SnareResult<Vec<String>> {
        let mut names: Vec<String> = self.fixtures.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn describe(&self) -> String {
        format!("memory:{} fixtures", self.fixtures.len())
    }
}

/// Normalize a fixture name: `"articles.json"` and `"articles"` are the same
/// fixture. Names that could escape the fixture root are rejected.
pub fn normalize_name(name: &str) -> SnareResult<String> {
    let trimmed = name.trim();
    let invalid = trimmed.is_empty()
        || trimmed.contains("..")
        || trimmed.contains('\\')
        || trimmed.starts_with('/')
        || Path::new(trimmed).is_absolute();
    if invalid {
        return Err(SnareError::InvalidFixtureName {
            name: name.to_string(),
        });
    }
    let stem = FIXTURE_EXTENSIONS
        .iter()
        .find_map(|ext| trimmed.strip_suffix(&format!(".{ext}")).map(str::to_string))
        .unwrap_or_else(|| trimmed.to_string());
    Ok(stem)
}

/// Loads fixtures by name from an ordered list of sources.
///
/// Overrides inserted at runtime take precedence over every source; among
/// sources the first one that has the name wins.
#[derive(Default)]
pub struct FixtureStore {
    sources: Vec<Box<dyn FixtureSource>>,
    overrides: Mutex<HashMap<String, Arc<Value>>>,
    cache: Mutex<HashMap<String, Arc<Value>>>,
}

impl fmt::Debug for FixtureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<String> = self.sources.iter().map(|s| s.describe()).collect();
        f.debug_struct("FixtureStore")
            .field("sources", &sources)
            .finish_non_exhaustive()
    }
}

impl FixtureStore {
    /// Create a store with no sources
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store backed by a fixture directory
    #[must_use]
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new().with_source(DirectorySource::new(dir))
    }

    /// Append a source
    #[must_use]
    pub fn with_source<S: FixtureSource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Load a fixture as an independent copy
    pub fn load(&self, name: &str) -> SnareResult<Value> {
        let shared = self.shared(name)?;
        Ok(Value::clone(&shared))
    }

    /// Load and deserialize a fixture
    pub fn load_as<T: serde::de::DeserializeOwned>(&self, name: &str) -> SnareResult<T> {
        Ok(serde_json::from_value(self.load(name)?)?)
    }

    /// Whether a fixture resolves
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.shared(name).is_ok()
    }

    /// Register a payload under `name`, shadowing any source
    pub fn insert(&self, name: &str, payload: Value) -> SnareResult<()> {
        let key = normalize_name(name)?;
        tracing::debug!(fixture = %key, "fixture override registered");
        self.overrides().insert(key, Arc::new(payload));
        Ok(())
    }

    /// Drop runtime overrides (sources and the parse cache are kept)
    pub fn clear_overrides(&self) {
        self.overrides().clear();
    }

    /// All resolvable names, sorted
    pub fn names(&self) -> SnareResult<Vec<String>> {
        let mut names = Vec::new();
        for source in &self.sources {
            names.extend(source.names()?);
        }
        names.extend(self.overrides().keys().cloned());
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn overrides(&self) -> MutexGuard<'_, HashMap<String, Arc<Value>>> {
        self.overrides.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, Arc<Value>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn shared(&self, name: &str) -> SnareResult<Arc<Value>> {
        let key = normalize_name(name)?;

        if let Some(found) = self.overrides().get(&key).cloned() {
            return Ok(found);
        }
        if let Some(found) = self.cache().get(&key).cloned() {
            return Ok(found);
        }

        for source in &self.sources {
            if let Some(value) = source.read(&key)? {
                tracing::debug!(fixture = %key, source = %source.describe(), "fixture loaded");
                let shared = Arc::new(value);
                self.cache().insert(key, Arc::clone(&shared));
                return Ok(shared);
            }
        }

        Err(SnareError::FixtureNotFound {
            name: name.to_string(),
        })
    }
}
