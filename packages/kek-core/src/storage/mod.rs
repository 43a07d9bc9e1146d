//! # Storage Module
//!
//! Local persistence for key blobs and the configuration record.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ~/.kek/                          (0700)                                │
//! │  ├── config.json                  (0600)  ConfigRecord                  │
//! │  ├── 6a50d96f9128fe1f.kek         (0600)  private namespace             │
//! │  └── 6a50d96f9128fe1f.pub.kek     (0600)  public namespace              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyStorage trait (one instance per namespace)                  │   │
//! │  │                                                                 │   │
//! │  │  • read(id)      - Stored bytes, KeyNotFound if absent         │   │
//! │  │  • write(id, b)  - Atomic overwrite                            │   │
//! │  │  • delete(id)    - KeyNotFound if absent                       │   │
//! │  │  • contains(id)  - Existence check                             │   │
//! │  │  • list()        - Ids present, sorted                         │   │
//! │  │                                                                 │   │
//! │  │  FileKeyStorage    - one file per id, `.pub` marks public      │   │
//! │  │  MemoryKeyStorage  - in-process map for tests and dry runs     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  ConfigStore trait                                              │   │
//! │  │                                                                 │   │
//! │  │  • load()        - Empty record when nothing is persisted      │   │
//! │  │  • save(record)  - Full atomic overwrite                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Protocol
//!
//! Every file is written to a hidden temporary sibling, synced, restricted
//! to the owner, and renamed into place, so a reader never observes a
//! partially written blob or record.

mod config;
mod files;
mod memory;

pub use config::{ConfigRecord, ConfigStore, JsonConfigStore, MemoryConfigStore};
pub use files::FileKeyStorage;
pub use memory::MemoryKeyStorage;

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::crypto::KeyId;
use crate::error::{Error, Result};

/// File extension shared by every key blob
pub const KEY_FILE_EXTENSION: &str = "kek";

/// Which half of a key a storage holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Public keys, `<id>.pub.kek`
    Public,
    /// Private keys, `<id>.kek`
    Private,
}

impl Namespace {
    /// File name suffix after the key id
    pub fn file_suffix(self) -> &'static str {
        match self {
            Namespace::Public => ".pub.kek",
            Namespace::Private => ".kek",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Public => f.write_str("public"),
            Namespace::Private => f.write_str("private"),
        }
    }
}

/// Persistence for serialized keys of one namespace
///
/// Blobs are opaque here: storage never decodes them, which also makes
/// `read` the raw read the provider needs before deciding whether to ask
/// for a password.
pub trait KeyStorage: Send {
    /// Namespace this storage serves
    fn namespace(&self) -> Namespace;

    /// Read a stored blob
    ///
    /// Fails with `KeyNotFound` if the id has no blob.
    fn read(&self, id: &KeyId) -> Result<Vec<u8>>;

    /// Store a blob, replacing any previous one
    fn write(&self, id: &KeyId, blob: &[u8]) -> Result<()>;

    /// Remove a blob
    ///
    /// Fails with `KeyNotFound` if the id has no blob.
    fn delete(&self, id: &KeyId) -> Result<()>;

    /// Check if a blob exists for the id
    fn contains(&self, id: &KeyId) -> bool;

    /// Ids with a blob in this namespace, sorted
    fn list(&self) -> Result<Vec<KeyId>>;
}

/// Write `bytes` to `path` atomically with owner-only permissions
///
/// The temporary file is owner-only from the moment it exists and is
/// removed if the write or the rename fails.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::StorageIo(format!("{} has no parent directory", path.display())))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::StorageIo(format!("{} has no file name", path.display())))?;
    let temp_path = dir.join(format!(".{}.tmp", file_name));

    let result = write_private_file(&temp_path, bytes)
        .and_then(|()| fs::rename(&temp_path, path).map_err(Error::from));

    if result.is_err() {
        if let Err(e) = fs::remove_file(&temp_path) {
            tracing::debug!("Could not remove {}: {}", temp_path.display(), e);
        }
    }
    result
}

fn write_private_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file: File = options.open(path)?;

    // A leftover temp file keeps its old mode, so tighten it before writing
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Create `dir` (and parents) restricted to the owner
///
/// A directory that already exists keeps its permissions; a warning is
/// logged when others can reach into it.
pub(crate) fn create_private_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = fs::metadata(dir)?.permissions().mode();
            if mode & 0o077 != 0 {
                tracing::warn!(
                    "Key directory {} is accessible to other users (mode {:o})",
                    dir.display(),
                    mode & 0o777
                );
            }
        }
        return Ok(());
    }

    fs::create_dir_all(dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_namespace_display() {
        assert_eq!(Namespace::Public.to_string(), "public");
        assert_eq!(Namespace::Private.to_string(), "private");
        assert!(Namespace::Public.file_suffix().ends_with(KEY_FILE_EXTENSION));
    }

    #[test]
    fn test_write_atomic_replaces_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blob.kek");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!temp.path().join(".blob.kek.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("keys");
        create_private_dir(&dir).unwrap();

        let path = dir.join("blob.kek");
        write_atomic(&path, b"secret").unwrap();

        let dir_mode = fs::metadata(&dir).unwrap().permissions().mode();
        let file_mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o777, 0o700);
        assert_eq!(file_mode & 0o777, 0o600);
    }

    #[test]
    fn test_write_atomic_failure_removes_temp_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blob.kek");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), b"x").unwrap();

        assert!(write_atomic(&path, b"secret").is_err());
        assert!(!temp.path().join(".blob.kek.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_temp_file_is_tightened() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let stale = temp.path().join(".blob.kek.tmp");
        fs::write(&stale, b"old").unwrap();
        fs::set_permissions(&stale, fs::Permissions::from_mode(0o644)).unwrap();

        let path = temp.path().join("blob.kek");
        write_atomic(&path, b"secret").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(fs::read(&path).unwrap(), b"secret");
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_directory_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("shared");
        fs::create_dir(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();

        create_private_dir(&dir).unwrap();

        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
