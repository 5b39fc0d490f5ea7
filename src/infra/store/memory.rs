//! In-memory store for development and testing.

use parking_lot::Mutex;

use crate::core::error::StoreError;
use crate::core::store::{ResourceStore, Tables, Tx};

/// Volatile store keeping every table behind one `parking_lot::Mutex`.
///
/// Holding the lock for the whole transaction makes each transaction, and therefore
/// each conditional write, linearizable.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResourceStore for InMemoryStore {
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
        tx.commit();
        Ok(result)
    }
}
