use crate::error::LoadError;
use crate::loader::{load_bytes, FileFormat};
use crate::record::Dataset;
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

/// Hex SHA-256 of a file's bytes, the key of a parsed dataset
pub fn content_key(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Parsed datasets keyed by the hash of the bytes they came from
///
/// The same file content is parsed once. Entries live until they are
/// invalidated, which the web layer does when an upload replaces another.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: HashMap<String, Arc<Dataset>>,
}

impl DatasetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached dataset for `bytes`, parsing them on a miss
    ///
    /// Failed parses are not cached.
    pub fn get_or_load(
        &mut self,
        bytes: &[u8],
        format: FileFormat,
    ) -> Result<(String, Arc<Dataset>), LoadError> {
        let key = content_key(bytes);
        if let Some(dataset) = self.entries.get(&key) {
            debug!("Dataset cache hit for {}", &key[..12]);
            return Ok((key, Arc::clone(dataset)));
        }

        let dataset = Arc::new(load_bytes(bytes, format)?);
        self.entries.insert(key.clone(), Arc::clone(&dataset));
        Ok((key, dataset))
    }

    /// Store a dataset parsed outside the cache
    ///
    /// When the key is already present the stored dataset wins and is returned.
    pub fn insert(&mut self, key: String, dataset: Arc<Dataset>) -> Arc<Dataset> {
        Arc::clone(self.entries.entry(key).or_insert(dataset))
    }

    pub fn get(&self, key: &str) -> Option<Arc<Dataset>> {
        self.entries.get(key).cloned()
    }

    /// Drop one entry; returns whether it was present
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
