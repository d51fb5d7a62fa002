use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::store::StoreSnapshot;

const STORAGE_VERSION: u32 = 0;

/// Where the store is loaded from at startup and written to after every change.
pub trait BillStorage: Send + Sync {
    fn load(&self) -> Result<Option<StoreSnapshot>, StorageError>;
    fn save(&self, snapshot: &StoreSnapshot) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshot: Mutex<Option<StoreSnapshot>>,
}

impl BillStorage for MemoryStorage {
    fn load(&self) -> Result<Option<StoreSnapshot>, StorageError> {
        let snapshot = self.snapshot.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(snapshot.clone())
    }

    fn save(&self, snapshot: &StoreSnapshot) -> Result<(), StorageError> {
        let mut stored = self.snapshot.lock().map_err(|_| StorageError::Poisoned)?;
        *stored = Some(snapshot.clone());
        Ok(())
    }
}

#[derive(Deserialize)]
struct Persisted {
    state: StoreSnapshot,
    version: u32,
}

#[derive(Serialize)]
struct PersistedRef<'a> {
    state: &'a StoreSnapshot,
    version: u32,
}

/// Keeps the store as a single JSON document on disk.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStorage { path: path.into() }
    }
}

impl BillStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<StoreSnapshot>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let persisted: Persisted = serde_json::from_str(&content)?;
        if persisted.version != STORAGE_VERSION {
            return Err(StorageError::UnsupportedVersion(persisted.version));
        }
        Ok(Some(persisted.state))
    }

    fn save(&self, snapshot: &StoreSnapshot) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(&PersistedRef {
            state: snapshot,
            version: STORAGE_VERSION,
        })?;
        // Write next to the target and rename so a crash never leaves half a file.
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}
