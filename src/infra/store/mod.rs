//! Store backends.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::InMemoryStore;

use crate::config::{StoreBackendConfig, StoreConfig};
use crate::core::error::StoreError;
use crate::core::store::{ResourceStore, Tables, Tx};

/// Backend chosen at runtime from [`StoreConfig`].
pub enum ConfiguredStore {
    /// Volatile tables.
    Memory(InMemoryStore),
    /// JSON snapshot on disk.
    File(FileStore),
}

impl ConfiguredStore {
    /// Open the backend named by the configuration.
    ///
    /// # Errors
    ///
    /// `StoreError::Backend` when the file backend has no path, or any error from
    /// [`FileStore::open`].
    pub fn open(cfg: &StoreConfig) -> Result<Self, StoreError> {
        match cfg.backend {
            StoreBackendConfig::InMemory => Ok(Self::Memory(InMemoryStore::new())),
            StoreBackendConfig::File => {
                let path = cfg
                    .path
                    .as_deref()
                    .ok_or_else(|| StoreError::Backend("file backend requires a path".into()))?;
                Ok(Self::File(FileStore::open(path)?))
            }
        }
    }

    /// Backend name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "in_memory",
            Self::File(_) => "file",
        }
    }
}

impl ResourceStore for ConfiguredStore {
    fn read<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Tables) -> R,
    {
        match self {
            Self::Memory(store) => store.read(f),
            Self::File(store) => store.read(f),
        }
    }

    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Tx<'_>) -> Result<R, E>,
        E: From<StoreError>,
    {
        match self {
            Self::Memory(store) => store.transaction(f),
            Self::File(store) => store.transaction(f),
        }
    }
}
