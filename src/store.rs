//! Key-value persistence for results, the keyword history, and the
//! last-known scraping state.
//!
//! The shapes mirror a browser extension's local-storage layout: JSON values
//! under the well-known keys in [`keys`], with per-job results nested under
//! the job's `keyword-site` key.

use crate::market::models::ProductRecord;
use crate::market::sites::Site;
use crate::protocol::{now_ms, JobKey};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Well-known storage keys.
pub mod keys {
    pub const KEYWORDS: &str = "keywords";
    pub const PRODUCTS: &str = "products";
    pub const SCRAPING_STATE: &str = "scrapingState";
}

/// JSON key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store, for tests and `--no-store` runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }
}

/// Single-file JSON store, written through on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, Value>>,
}

impl FileStore {
    /// Opens (or creates) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read store file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse store file: {}", path.display()))?
        } else {
            HashMap::new()
        };
        debug!("Opened store at {} ({} keys)", path.display(), entries.len());
        Ok(Self { path, entries: Mutex::new(entries) })
    }

    /// The default store location under the platform data directory.
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().context("No data directory available")?;
        Ok(data_dir.join("pe-crawler").join("store.json"))
    }

    fn persist(&self, entries: &HashMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write store file: {}", self.path.display()))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        self.persist(&entries)
    }
}

/// Last-known job state, written at start and at every terminal event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapingState {
    pub active: bool,
    pub keyword: Option<String>,
    pub site: Option<Site>,
    pub updated_at: i64,
}

impl ScrapingState {
    pub fn active(key: &JobKey) -> Self {
        Self {
            active: true,
            keyword: Some(key.keyword.clone()),
            site: Some(key.site),
            updated_at: now_ms(),
        }
    }

    pub fn idle() -> Self {
        Self { active: false, keyword: None, site: None, updated_at: now_ms() }
    }
}

/// Adds `keyword` to the stored history, most recent first, deduplicated.
pub fn remember_keyword(store: &dyn KeyValueStore, keyword: &str) -> Result<()> {
    let mut history: Vec<String> = match store.get(keys::KEYWORDS)? {
        Some(value) => serde_json::from_value(value).unwrap_or_default(),
        None => Vec::new(),
    };
    history.retain(|k| k != keyword);
    history.insert(0, keyword.to_string());
    store.set(keys::KEYWORDS, serde_json::to_value(history)?)
}

/// Stores a job's result set under `products.<keyword>-<site>`.
pub fn record_result(
    store: &dyn KeyValueStore,
    key: &JobKey,
    records: &[ProductRecord],
) -> Result<()> {
    let mut products: HashMap<String, Value> = match store.get(keys::PRODUCTS)? {
        Some(value) => serde_json::from_value(value).unwrap_or_default(),
        None => HashMap::new(),
    };
    products.insert(key.to_string(), serde_json::to_value(records)?);
    store.set(keys::PRODUCTS, serde_json::to_value(products)?)
}

/// Loads a job's stored result set, if any.
pub fn load_result(store: &dyn KeyValueStore, key: &JobKey) -> Result<Option<Vec<ProductRecord>>> {
    let Some(value) = store.get(keys::PRODUCTS)? else {
        return Ok(None);
    };
    let mut products: HashMap<String, Value> = serde_json::from_value(value).unwrap_or_default();
    match products.remove(&key.to_string()) {
        Some(records) => Ok(Some(serde_json::from_value(records)?)),
        None => Ok(None),
    }
}

pub fn set_scraping_state(store: &dyn KeyValueStore, state: &ScrapingState) -> Result<()> {
    store.set(keys::SCRAPING_STATE, serde_json::to_value(state)?)
}
