//! In-memory store for tests and embedding hosts without a filesystem.

use super::{BlobKey, Store};
use crate::{Error, Result};
use std::collections::HashMap;

/// Blobs kept in a map
///
/// Reads and writes can be made to fail on demand to exercise the
/// fail-open paths.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    blobs: HashMap<BlobKey, String>,
    pub fail_reads: bool,
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put raw (possibly malformed) contents under `key`
    pub fn insert_raw(&mut self, key: BlobKey, contents: impl Into<String>) {
        self.blobs.insert(key, contents.into());
    }

    pub fn raw(&self, key: BlobKey) -> Option<&str> {
        self.blobs.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: BlobKey) -> bool {
        self.blobs.contains_key(&key)
    }
}

impl Store for MemoryStore {
    fn read_blob(&self, key: BlobKey) -> Result<Option<String>> {
        if self.fail_reads {
            return Err(Error::Storage(format!("read of {} refused", key.name())));
        }
        Ok(self.blobs.get(&key).cloned())
    }

    fn write_blob(&mut self, key: BlobKey, contents: &str) -> Result<()> {
        if self.fail_writes {
            return Err(Error::Storage(format!("write of {} refused", key.name())));
        }
        self.blobs.insert(key, contents.to_string());
        Ok(())
    }

    fn remove_blob(&mut self, key: BlobKey) -> Result<()> {
        if self.fail_writes {
            return Err(Error::Storage(format!("removal of {} refused", key.name())));
        }
        self.blobs.remove(&key);
        Ok(())
    }
}
