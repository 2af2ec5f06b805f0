//! Durable key-value storage for sensor records.
//!
//! Stores deal in raw bytes keyed by sensor id. Encoding and validation
//! of records belong to the registry, so that a corrupt record can be
//! told apart from a failing backend.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::tracing::prelude::*;

pub trait SensorStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a record. Must be durable when it returns `Ok`.
    fn put(&self, id: &str, record: &[u8]) -> Result<(), StoreError>;

    /// Every stored `(id, record)` pair, in no particular order.
    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError>;
}

/// Sled-backed store.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = sled::open(path)?;
        info!(path = %path.display(), "Sensor store opened");
        Ok(Self { db })
    }

    /// A throwaway database, removed when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl SensorStore for SledStore {
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(id.as_bytes())?.map(|value| value.to_vec()))
    }

    fn put(&self, id: &str, record: &[u8]) -> Result<(), StoreError> {
        self.db.insert(id.as_bytes(), record)?;
        self.db.flush()?;
        Ok(())
    }

    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut records = Vec::new();
        for item in self.db.iter() {
            let (key, value) = item?;
            match String::from_utf8(key.to_vec()) {
                Ok(id) => records.push((id, value.to_vec())),
                Err(e) => warn!(error = %e, "Skipping sensor record with non-UTF-8 key"),
            }
        }
        Ok(records)
    }
}

/// In-memory store for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SensorStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.records.lock().get(id).cloned())
    }

    fn put(&self, id: &str, record: &[u8]) -> Result<(), StoreError> {
        self.records.lock().insert(id.to_string(), record.to_vec());
        Ok(())
    }

    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        Ok(self
            .records
            .lock()
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn SensorStore) {
        assert!(store.get("front").unwrap().is_none());

        store.put("front", b"one").unwrap();
        store.put("back", b"two").unwrap();
        store.put("front", b"three").unwrap();

        assert_eq!(store.get("front").unwrap().as_deref(), Some(&b"three"[..]));

        let mut all = store.scan().unwrap();
        all.sort();
        assert_eq!(
            all,
            vec![
                ("back".to_string(), b"two".to_vec()),
                ("front".to_string(), b"three".to_vec()),
            ]
        );
    }

    #[test]
    fn memory_store_round_trips() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn sled_store_round_trips() {
        exercise(&SledStore::temporary().unwrap());
    }
}
