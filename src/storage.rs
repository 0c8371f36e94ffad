//! Persistence for badgegate collections.
//!
//! State lives in four named collections, each stored as one JSON document.
//! Components load their collection once at startup and save it after every
//! mutation; the [`Storage`] trait lets tests substitute [`MemoryStorage`]
//! for the on-disk [`FileStorage`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::{BadgeGateError, Result};

/// A persisted collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Registered accounts keyed by badge ID.
    Accounts,
    /// Login event log, most recent first.
    AuthLogs,
    /// Behavioral profiles keyed by badge ID.
    Profiles,
    /// Risk weight model.
    RiskModel,
}

impl Collection {
    /// All collections.
    pub const ALL: [Collection; 4] = [
        Collection::Accounts,
        Collection::AuthLogs,
        Collection::Profiles,
        Collection::RiskModel,
    ];

    /// Storage key of the collection.
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Accounts => "accounts",
            Collection::AuthLogs => "auth_logs",
            Collection::Profiles => "user_profiles",
            Collection::RiskModel => "risk_model",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Raw document storage.
pub trait Storage: Send + Sync {
    /// Read the stored document, or `None` if the collection was never saved.
    fn read(&self, collection: Collection) -> Result<Option<String>>;

    /// Replace the stored document.
    fn write(&self, collection: Collection, document: &str) -> Result<()>;
}

/// Load a collection, falling back to its default when absent.
pub fn load_json<T>(storage: &dyn Storage, collection: Collection) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match storage.read(collection)? {
        Some(document) => Ok(serde_json::from_str(&document)?),
        None => {
            debug!(%collection, "Collection not found, using defaults");
            Ok(T::default())
        }
    }
}

/// Serialize and store a collection.
pub fn save_json<T: Serialize>(
    storage: &dyn Storage,
    collection: Collection,
    value: &T,
) -> Result<()> {
    let document = serde_json::to_string_pretty(value)?;
    storage.write(collection, &document)
}

/// In-process storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    documents: RwLock<HashMap<Collection, String>>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, collection: Collection) -> Result<Option<String>> {
        let documents = self
            .documents
            .read()
            .map_err(|_| BadgeGateError::Storage("memory storage lock poisoned".to_string()))?;
        Ok(documents.get(&collection).cloned())
    }

    fn write(&self, collection: Collection, document: &str) -> Result<()> {
        let mut documents = self
            .documents
            .write()
            .map_err(|_| BadgeGateError::Storage("memory storage lock poisoned".to_string()))?;
        documents.insert(collection, document.to_string());
        Ok(())
    }
}

/// JSON files in a directory, one per collection.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    pub fn open(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        info!("Opening storage at {:?}", base_path);
        Ok(Self { base_path })
    }

    /// Directory holding the collection files.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, collection: Collection) -> PathBuf {
        self.base_path.join(format!("{}.json", collection.key()))
    }
}

impl Storage for FileStorage {
    fn read(&self, collection: Collection) -> Result<Option<String>> {
        let path = self.path_for(collection);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&path)?))
    }

    fn write(&self, collection: Collection, document: &str) -> Result<()> {
        let path = self.path_for(collection);

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, document)?;
        std::fs::rename(&temp_path, &path)?;

        debug!(%collection, bytes = document.len(), "Collection saved");
        Ok(())
    }
}
