//! # In-Memory Key Storage
//!
//! A `KeyStorage` that never touches the filesystem. Used by tests and by
//! callers that want a throwaway keyring for the lifetime of a process.
//!
//! Clones share the same map, so a test can keep a handle to inspect what
//! a provider wrote.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use zeroize::Zeroizing;

use super::{KeyStorage, Namespace};
use crate::crypto::KeyId;
use crate::error::{Error, Result};

/// In-process key blob map for one namespace
#[derive(Clone)]
pub struct MemoryKeyStorage {
    namespace: Namespace,
    blobs: Arc<RwLock<HashMap<KeyId, Zeroizing<Vec<u8>>>>>,
}

impl MemoryKeyStorage {
    /// Create an empty storage for `namespace`
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            blobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl KeyStorage for MemoryKeyStorage {
    fn namespace(&self) -> Namespace {
        self.namespace
    }

    fn read(&self, id: &KeyId) -> Result<Vec<u8>> {
        let blobs = self.blobs.read();
        blobs
            .get(id)
            .map(|blob| blob.to_vec())
            .ok_or_else(|| Error::KeyNotFound(id.to_string()))
    }

    fn write(&self, id: &KeyId, blob: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.write();
        blobs.insert(*id, Zeroizing::new(blob.to_vec()));
        Ok(())
    }

    fn delete(&self, id: &KeyId) -> Result<()> {
        let mut blobs = self.blobs.write();
        blobs
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::KeyNotFound(id.to_string()))
    }

    fn contains(&self, id: &KeyId) -> bool {
        self.blobs.read().contains_key(id)
    }

    fn list(&self) -> Result<Vec<KeyId>> {
        let mut ids: Vec<KeyId> = self.blobs.read().keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}

// ============================================================================
// TESTS
// ============================================================================
