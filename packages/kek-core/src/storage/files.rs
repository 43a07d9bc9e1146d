//! File-backed key storage: one file per key id.

use std::fs;
use std::path::PathBuf;

use super::{create_private_dir, write_atomic, KeyStorage, Namespace};
use crate::crypto::KeyId;
use crate::error::{Error, Result};

/// Key blobs stored as `<dir>/<id><suffix>`
///
/// Both namespaces can share one directory because the public suffix
/// (`.pub.kek`) never collides with the private one (`.kek`) for a hex id.
#[derive(Debug, Clone)]
pub struct FileKeyStorage {
    dir: PathBuf,
    namespace: Namespace,
}

impl FileKeyStorage {
    /// Open (creating if needed) a storage directory for `namespace`
    ///
    /// The directory is restricted to the owner on unix.
    pub fn new(dir: impl Into<PathBuf>, namespace: Namespace) -> Result<Self> {
        let dir = dir.into();
        create_private_dir(&dir)?;
        Ok(Self { dir, namespace })
    }

    /// Public key storage in `dir`
    pub fn public(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(dir, Namespace::Public)
    }

    /// Private key storage in `dir`
    pub fn private(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(dir, Namespace::Private)
    }

    fn key_path(&self, id: &KeyId) -> PathBuf {
        self.dir
            .join(format!("{}{}", id, self.namespace.file_suffix()))
    }
}

impl KeyStorage for FileKeyStorage {
    fn namespace(&self) -> Namespace {
        self.namespace
    }

    fn read(&self, id: &KeyId) -> Result<Vec<u8>> {
        let path = self.key_path(id);
        if !path.is_file() {
            return Err(Error::KeyNotFound(id.to_string()));
        }

        tracing::debug!("Reading {} key {}", self.namespace, id);
        Ok(fs::read(&path)?)
    }

    fn write(&self, id: &KeyId, blob: &[u8]) -> Result<()> {
        tracing::debug!("Writing {} key {}", self.namespace, id);
        write_atomic(&self.key_path(id), blob)
    }

    fn delete(&self, id: &KeyId) -> Result<()> {
        let path = self.key_path(id);
        if !path.is_file() {
            return Err(Error::KeyNotFound(id.to_string()));
        }

        tracing::debug!("Deleting {} key {}", self.namespace, id);
        fs::remove_file(&path)?;
        Ok(())
    }

    fn contains(&self, id: &KeyId) -> bool {
        self.key_path(id).is_file()
    }

    fn list(&self) -> Result<Vec<KeyId>> {
        let suffix = self.namespace.file_suffix();
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            // "<id>.pub.kek" strips to "<id>.pub" for the private suffix,
            // which is not a valid id, so namespaces never bleed together
            if let Some(stem) = name.strip_suffix(suffix) {
                if let Ok(id) = KeyId::parse(stem) {
                    ids.push(id);
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

// ============================================================================
// TESTS
// ============================================================================
