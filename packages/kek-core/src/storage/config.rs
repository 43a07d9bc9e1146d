//! # Configuration Store
//!
//! The configuration record names every key KEK knows about and which
//! private key is the default.
//!
//! ## Record Format
//!
//! ```text
//! {
//!   "default": "6a50d96f9128fe1f",
//!   "private": [
//!     "6a50d96f9128fe1f"
//!   ],
//!   "public": [
//!     "0c1f5e3a77b2d410",
//!     "6a50d96f9128fe1f"
//!   ]
//! }
//! ```
//!
//! Id lists are sorted and free of duplicates, so the file diffs cleanly.
//! A missing file is an empty record; anything unparsable, an unknown field,
//! or a default that is not a private key is `ConfigCorrupt`.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{create_private_dir, write_atomic};
use crate::crypto::KeyId;
use crate::error::{Error, Result};

/// Known keys and the default private key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigRecord {
    /// Private key used when no id is given
    pub default: Option<KeyId>,
    /// Ids with a stored private key
    pub private: BTreeSet<KeyId>,
    /// Ids with a stored public key
    pub public: BTreeSet<KeyId>,
}

impl ConfigRecord {
    /// Check the record's invariants
    pub fn validate(&self) -> Result<()> {
        match self.default {
            Some(default) if !self.private.contains(&default) => Err(Error::ConfigCorrupt(
                format!("Default key {} is not a registered private key", default),
            )),
            _ => Ok(()),
        }
    }

    /// Register a private key; it becomes the default if there is none
    pub fn add_private(&mut self, id: KeyId) {
        self.private.insert(id);
        if self.default.is_none() {
            self.default = Some(id);
        }
    }

    /// Register a public key, returning false if it was already known
    pub fn add_public(&mut self, id: KeyId) -> bool {
        self.public.insert(id)
    }

    /// Forget a private key, re-electing the default if it was removed
    ///
    /// The smallest remaining private id becomes the new default, or none
    /// when no private keys remain. Returns false if the id was unknown.
    pub fn remove_private(&mut self, id: &KeyId) -> bool {
        if !self.private.remove(id) {
            return false;
        }
        if self.default.as_ref() == Some(id) {
            self.default = self.private.iter().next().copied();
        }
        true
    }

    /// Forget a public key, returning false if it was unknown
    pub fn remove_public(&mut self, id: &KeyId) -> bool {
        self.public.remove(id)
    }
}

/// Persistence for the configuration record
pub trait ConfigStore: Send {
    /// Load the record; an absent record is an empty one
    fn load(&self) -> Result<ConfigRecord>;

    /// Overwrite the persisted record
    fn save(&self, record: &ConfigRecord) -> Result<()>;
}

/// Configuration record kept as pretty-printed JSON on disk
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<ConfigRecord> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No configuration at {}, starting empty", self.path.display());
                return Ok(ConfigRecord::default());
            }
            Err(e) => return Err(e.into()),
        };

        let record: ConfigRecord = serde_json::from_slice(&bytes)?;
        record.validate()?;
        Ok(record)
    }

    fn save(&self, record: &ConfigRecord) -> Result<()> {
        record.validate()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                create_private_dir(parent)?;
            }
        }

        let mut bytes = serde_json::to_vec_pretty(record)?;
        bytes.push(b'\n');
        write_atomic(&self.path, &bytes)?;

        tracing::debug!("Saved configuration to {}", self.path.display());
        Ok(())
    }
}

/// Configuration record held in memory
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    record: Arc<RwLock<ConfigRecord>>,
}

impl MemoryConfigStore {
    /// Start from an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record
    pub fn with_record(record: ConfigRecord) -> Self {
        Self {
            record: Arc::new(RwLock::new(record)),
        }
    }

    /// The last saved record
    pub fn snapshot(&self) -> ConfigRecord {
        self.record.read().clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<ConfigRecord> {
        let record = self.record.read().clone();
        record.validate()?;
        Ok(record)
    }

    fn save(&self, record: &ConfigRecord) -> Result<()> {
        record.validate()?;
        *self.record.write() = record.clone();
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(s: &str) -> KeyId {
        KeyId::parse(s).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty_record() {
        let temp = TempDir::new().unwrap();
        let store = JsonConfigStore::new(temp.path().join("config.json"));

        assert_eq!(store.load().unwrap(), ConfigRecord::default());
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = JsonConfigStore::new(temp.path().join("config.json"));

        let mut record = ConfigRecord::default();
        record.add_private(id("bbbbbbbbbbbbbbbb"));
        record.add_private(id("aaaaaaaaaaaaaaaa"));
        record.add_public(id("cccccccccccccccc"));
        store.save(&record).unwrap();

        assert_eq!(store.load().unwrap(), record);
    }

    #[test]
    fn test_file_is_sorted_pretty_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let store = JsonConfigStore::new(&path);

        let mut record = ConfigRecord::default();
        record.add_private(id("bbbbbbbbbbbbbbbb"));
        record.add_private(id("aaaaaaaaaaaaaaaa"));
        store.save(&record).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let expected = "{\n  \"default\": \"bbbbbbbbbbbbbbbb\",\n  \"private\": [\n    \"aaaaaaaaaaaaaaaa\",\n    \"bbbbbbbbbbbbbbbb\"\n  ],\n  \"public\": []\n}\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_missing_fields_default() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"public": ["CCCCCCCCCCCCCCCC"]}"#).unwrap();

        let record = JsonConfigStore::new(&path).load().unwrap();
        assert_eq!(record.default, None);
        assert!(record.private.is_empty());
        assert!(record.public.contains(&id("cccccccccccccccc")));
    }

    #[test]
    fn test_corrupt_content_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        let store = JsonConfigStore::new(&path);

        for content in [
            "{not json",
            r#"{"private": ["xyz"]}"#,
            r#"{"private": "aaaaaaaaaaaaaaaa"}"#,
            r#"{"colour": "blue"}"#,
            r#"{"default": "aaaaaaaaaaaaaaaa", "private": []}"#,
        ] {
            fs::write(&path, content).unwrap();
            assert!(
                matches!(store.load(), Err(Error::ConfigCorrupt(_))),
                "accepted {}",
                content
            );
        }
    }

    #[test]
    fn test_removing_default_elects_smallest() {
        let mut record = ConfigRecord::default();
        record.add_private(id("bbbbbbbbbbbbbbbb"));
        record.add_private(id("cccccccccccccccc"));
        record.add_private(id("aaaaaaaaaaaaaaaa"));
        assert_eq!(record.default, Some(id("bbbbbbbbbbbbbbbb")));

        assert!(record.remove_private(&id("bbbbbbbbbbbbbbbb")));
        assert_eq!(record.default, Some(id("aaaaaaaaaaaaaaaa")));
    }

    #[test]
    fn test_removing_last_key_clears_default() {
        let a = id("aaaaaaaaaaaaaaaa");
        let mut record = ConfigRecord::default();
        record.add_private(a);

        assert!(record.remove_private(&a));
        assert_eq!(record.default, None);
        assert!(!record.remove_private(&a));
    }

    #[test]
    fn test_removing_other_key_keeps_default() {
        let mut record = ConfigRecord::default();
        record.add_private(id("aaaaaaaaaaaaaaaa"));
        record.add_private(id("bbbbbbbbbbbbbbbb"));

        record.remove_private(&id("bbbbbbbbbbbbbbbb"));
        assert_eq!(record.default, Some(id("aaaaaaaaaaaaaaaa")));
    }

    #[test]
    fn test_memory_store_shares_record() {
        let store = MemoryConfigStore::new();
        let handle = store.clone();

        let mut record = ConfigRecord::default();
        record.add_public(id("aaaaaaaaaaaaaaaa"));
        store.save(&record).unwrap();

        assert_eq!(handle.snapshot(), record);
        assert_eq!(handle.load().unwrap(), record);
    }

    #[test]
    fn test_invalid_record_not_saved() {
        let store = MemoryConfigStore::new();
        let record = ConfigRecord {
            default: Some(id("aaaaaaaaaaaaaaaa")),
            ..Default::default()
        };

        assert!(matches!(store.save(&record), Err(Error::ConfigCorrupt(_))));
        assert_eq!(store.snapshot(), ConfigRecord::default());
    }

    #[test]
    fn test_memory_store_rejects_invalid_seed_record() {
        let store = MemoryConfigStore::with_record(ConfigRecord {
            default: Some(id("aaaaaaaaaaaaaaaa")),
            ..Default::default()
        });

        assert!(matches!(store.load(), Err(Error::ConfigCorrupt(_))));
    }
}
