//! File-backed store persisting a JSON snapshot after every commit.
//!
//! Writes go to a temporary file that is renamed over the snapshot, so a crash at any
//! point leaves the last committed image on disk.

use std::fs::{self, create_dir_all, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::core::error::StoreError;
use crate::core::store::{ResourceStore, Snapshot, Tables, Tx};

const SNAPSHOT_FILE: &str = "parkbest.json";

/// Durable store: in-memory tables plus an atomically replaced snapshot file.
pub struct FileStore {
    dir: PathBuf,
    tables: Mutex<Tables>,
}

impl FileStore {
    /// Open (or create) a store rooted at `dir`, loading the last committed snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the directory cannot be created or the snapshot is corrupt.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        create_dir_all(&dir)?;
        let store = Self {
            dir,
            tables: Mutex::new(Tables::default()),
        };
        let tables = store.load_from_disk()?;
        *store.tables.lock() = tables;
        Ok(store)
    }

    /// Path of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    fn load_from_disk(&self) -> Result<Tables, StoreError> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(Tables::default());
        }
        let raw = fs::read(&path)?;
        let snapshot: Snapshot = serde_json::from_slice(&raw)?;
        let tables = Tables::from_snapshot(snapshot)?;
        tracing::info!(path = %path.display(), "loaded store snapshot");
        Ok(tables)
    }

    fn write_to_disk(&self, tables: &Tables) -> Result<(), StoreError> {
        let path = self.snapshot_path();
        let tmp = self.dir.join(format!("{SNAPSHOT_FILE}.tmp"));
        let bytes = serde_json::to_vec(&tables.snapshot())?;
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl ResourceStore for FileStore {
    fn read<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Tables) -> R,
    {
        let tables = self.tables.lock();
        Ok(f(&tables))
    }

    fn transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Tx<'_>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut tables = self.tables.lock();
        let mut tx = Tx::begin(&mut tables);
        let result = f(&mut tx)?;
        if tx.writes() > 0 {
            if let Err(e) = self.write_to_disk(&tx) {
                tracing::error!(error = %e, "snapshot write failed, rolling back");
                return Err(e.into());
            }
        }
        tx.commit();
        Ok(result)
    }
}
