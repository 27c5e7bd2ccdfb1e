//! Inbox filter persistence.
//!
//! The inbox remembers its filter form between sessions. Each field is
//! stored JSON-encoded under its own `inbox_*` key in a [`KeyValueStore`].
//! Reads never fail: a missing or unreadable value falls back to the
//! field's default and the problem is logged.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::api::{ChatFilterParams, PaginationParams};
use crate::error::StoreError;

pub const TELEFONE_KEY: &str = "inbox_telefoneFilter";
pub const SESSION_KEY: &str = "inbox_sessionFilter";
pub const BANK_KEY: &str = "inbox_bankFilter";
pub const HAS_BALANCE_KEY: &str = "inbox_hasBalanceFilter";
pub const INSTANCIA_KEY: &str = "inbox_instanciaFilter";
pub const DATE_FROM_KEY: &str = "inbox_dateFromFilter";
pub const DATE_TO_KEY: &str = "inbox_dateToFilter";
pub const FILTER_ACTIVE_KEY: &str = "inbox_isFilterActive";

/// String-keyed storage of raw (already encoded) values.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-process store, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A single JSON object file mapping keys to encoded values.
///
/// Writes go to a temporary sibling first and are renamed into place.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map
                .into_iter()
                .filter_map(|(key, value)| match value {
                    Value::String(raw) => Some((key, raw)),
                    _ => None,
                })
                .collect()),
            _ => Err(StoreError::NotAnObject),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(serde_json::to_string_pretty(map)?.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut map = self.read_map()?;
        f(&mut map);
        self.write_map(&map)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_map()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|map| {
            map.remove(key);
        })
    }
}

/// Reads a JSON-encoded value, falling back to `default` on any problem.
pub fn read_or<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    let raw = match store.get(key) {
        Ok(Some(raw)) if !raw.is_empty() => raw,
        Ok(_) => return default,
        Err(err) => {
            warn!(key, error = %err, "failed to read stored value");
            return default;
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!(key, error = %err, "stored value is not valid JSON");
        default
    })
}

/// Writes a value JSON-encoded. Failures are logged, not returned.
pub fn write<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(StoreError::from)
        .and_then(|raw| store.set(key, &raw));
    if let Err(err) = result {
        warn!(key, error = %err, "failed to store value");
    }
}

/// The inbox filter form.
///
/// Fields hold raw form text. `has_balance` is `""`, `"true"` or `"false"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxFilters {
    pub telefone: String,
    pub session: String,
    pub bank: String,
    pub has_balance: String,
    pub instancia: String,
    pub date_from: String,
    pub date_to: String,
    pub is_filter_active: bool,
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl InboxFilters {
    /// Restores the last saved form.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        Self {
            telefone: read_or(store, TELEFONE_KEY, String::new()),
            session: read_or(store, SESSION_KEY, String::new()),
            bank: read_or(store, BANK_KEY, String::new()),
            has_balance: read_or(store, HAS_BALANCE_KEY, String::new()),
            instancia: read_or(store, INSTANCIA_KEY, String::new()),
            date_from: read_or(store, DATE_FROM_KEY, String::new()),
            date_to: read_or(store, DATE_TO_KEY, String::new()),
            is_filter_active: read_or(store, FILTER_ACTIVE_KEY, false),
        }
    }

    /// Persists every field.
    pub fn save(&self, store: &dyn KeyValueStore) {
        write(store, TELEFONE_KEY, &self.telefone);
        write(store, SESSION_KEY, &self.session);
        write(store, BANK_KEY, &self.bank);
        write(store, HAS_BALANCE_KEY, &self.has_balance);
        write(store, INSTANCIA_KEY, &self.instancia);
        write(store, DATE_FROM_KEY, &self.date_from);
        write(store, DATE_TO_KEY, &self.date_to);
        write(store, FILTER_ACTIVE_KEY, &self.is_filter_active);
    }

    /// Returns `true` when at least one field has content.
    pub fn has_any(&self) -> bool {
        [
            &self.telefone,
            &self.session,
            &self.bank,
            &self.has_balance,
            &self.instancia,
            &self.date_from,
            &self.date_to,
        ]
        .iter()
        .any(|field| !field.trim().is_empty())
    }

    /// Activates the filter if any field is filled. Returns whether it did.
    pub fn apply(&mut self, store: &dyn KeyValueStore) -> bool {
        if !self.has_any() {
            return false;
        }
        self.is_filter_active = true;
        write(store, FILTER_ACTIVE_KEY, &true);
        true
    }

    /// Empties the form, deactivates it and persists the empty state.
    pub fn clear(&mut self, store: &dyn KeyValueStore) {
        *self = Self::default();
        self.save(store);
    }

    /// Query parameters for the filtered inbox list.
    pub fn to_params(&self, pagination: PaginationParams) -> ChatFilterParams {
        ChatFilterParams {
            telefone: non_blank(&self.telefone),
            session: non_blank(&self.session),
            bank: non_blank(&self.bank),
            has_balance: non_blank(&self.has_balance).map(|v| v == "true"),
            instancia: non_blank(&self.instancia),
            date_from: non_blank(&self.date_from),
            date_to: non_blank(&self.date_to),
            ..ChatFilterParams::default()
        }
        .with_pagination(pagination)
    }
}
