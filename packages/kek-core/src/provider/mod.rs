//! # Key Provider
//!
//! The single point of truth for "which key does this id (or the default)
//! mean, loaded, unlocked if necessary, and cached".
//!
//! ## Resolution
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       KEY RESOLUTION FLOW                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  id? ──None──► config.default ──None──► KeyNotFound("default")         │
//! │   │                  │                                                  │
//! │   └──────────────────┤                                                  │
//! │                      ▼                                                  │
//! │             ┌─────────────────┐  hit                                    │
//! │             │  cache lookup   │ ─────► Arc<Key>                         │
//! │             └────────┬────────┘                                         │
//! │                      │ miss                                             │
//! │                      ▼                                                  │
//! │             ┌─────────────────┐  not registered                         │
//! │             │  config sets    │ ─────► KeyNotFound(id)                  │
//! │             └────────┬────────┘                                         │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │             ┌─────────────────┐  blob gone                              │
//! │             │  storage.read   │ ─────► KeyFileMissing { id, namespace } │
//! │             └────────┬────────┘                                         │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │          classify(blob) ── EncryptedPrivateKey ──► prompt.get_password  │
//! │                      │                                                  │
//! │                      ▼                                                  │
//! │                 decode, cache, return                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Mutation Order
//!
//! Adding a key writes the blobs first and the configuration last. A crash
//! in between leaves an unreferenced file, never a reference to a missing
//! one. Removal deletes the blob first for the same reason.
//!
//! One provider serves one command invocation; it is not shared between
//! threads and holds no process-wide state.

mod password;

pub use password::{
    EnvPassword, PasswordPrompt, StaticPassword, NEW_PASSWORD_ENV_VAR, PASSWORD_ENV_VAR,
};

use std::collections::HashMap;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::crypto::{classify, KeyId, KeyPair, PublicKey, SerializedKeyType};
use crate::error::{Error, Result};
use crate::storage::{ConfigRecord, ConfigStore, KeyStorage, Namespace};

/// Resolves, caches, adds, and removes keys
pub struct KeyProvider {
    config_store: Box<dyn ConfigStore>,
    public_storage: Box<dyn KeyStorage>,
    private_storage: Box<dyn KeyStorage>,
    prompt: Box<dyn PasswordPrompt>,
    config: ConfigRecord,
    public_keys: HashMap<KeyId, Arc<PublicKey>>,
    key_pairs: HashMap<KeyId, Arc<KeyPair>>,
}

impl KeyProvider {
    /// Create a provider, loading the configuration record once
    ///
    /// ## Errors
    ///
    /// - `InvalidArgument` if a storage serves the wrong namespace
    /// - `ConfigCorrupt` / `StorageIo` from loading the record
    pub fn new(
        config_store: Box<dyn ConfigStore>,
        public_storage: Box<dyn KeyStorage>,
        private_storage: Box<dyn KeyStorage>,
        prompt: Box<dyn PasswordPrompt>,
    ) -> Result<Self> {
        if public_storage.namespace() != Namespace::Public {
            return Err(Error::InvalidArgument(
                "Public key storage must serve the public namespace".into(),
            ));
        }
        if private_storage.namespace() != Namespace::Private {
            return Err(Error::InvalidArgument(
                "Private key storage must serve the private namespace".into(),
            ));
        }

        let config = config_store.load()?;
        tracing::debug!(
            "Loaded configuration: {} private, {} public, default {:?}",
            config.private.len(),
            config.public.len(),
            config.default
        );

        Ok(Self {
            config_store,
            public_storage,
            private_storage,
            prompt,
            config,
            public_keys: HashMap::new(),
            key_pairs: HashMap::new(),
        })
    }

    /// The in-memory configuration record
    pub fn config(&self) -> &ConfigRecord {
        &self.config
    }

    /// The password source this provider asks
    pub fn prompt(&self) -> &dyn PasswordPrompt {
        self.prompt.as_ref()
    }

    /// Whether a blob exists for `id` in `namespace`
    ///
    /// Used to report drift between the configuration and storage.
    pub fn has_blob(&self, namespace: Namespace, id: &KeyId) -> bool {
        self.storage(namespace).contains(id)
    }

    /// Ids with a stored blob in `namespace` that the configuration does
    /// not register
    ///
    /// These are left behind when a key was stored but the configuration
    /// write that should have followed failed.
    pub fn unregistered_blobs(&self, namespace: Namespace) -> Result<Vec<KeyId>> {
        let registered = match namespace {
            Namespace::Public => &self.config.public,
            Namespace::Private => &self.config.private,
        };
        let mut ids = self.storage(namespace).list()?;
        ids.retain(|id| !registered.contains(id));
        Ok(ids)
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Resolve `id`, or the default key when `id` is `None`
    pub fn resolve_id(&self, id: Option<&KeyId>) -> Result<KeyId> {
        match id {
            Some(id) => Ok(*id),
            None => self
                .config
                .default
                .ok_or_else(|| Error::KeyNotFound("default".into())),
        }
    }

    /// Public key for `id` (or the default)
    ///
    /// Registered public keys load from the public namespace; otherwise a
    /// registered private key is unlocked and its public half returned.
    pub fn resolve_public_key(&mut self, id: Option<&KeyId>) -> Result<Arc<PublicKey>> {
        let id = self.resolve_id(id)?;

        if let Some(key) = self.public_keys.get(&id) {
            tracing::debug!("Public key {} served from cache", id);
            return Ok(Arc::clone(key));
        }

        let key = if self.config.public.contains(&id) {
            let blob = self.read_registered(Namespace::Public, &id)?;
            PublicKey::load(&blob)?
        } else if self.config.private.contains(&id) {
            self.resolve_key_pair(Some(&id))?.public_key()
        } else {
            return Err(Error::KeyNotFound(id.to_string()));
        };

        if key.key_id() != id {
            return Err(Error::InvalidKeyFormat(format!(
                "Public key file for {} holds key {}",
                id,
                key.key_id()
            )));
        }

        let key = Arc::new(key);
        self.public_keys.insert(id, Arc::clone(&key));
        Ok(key)
    }

    /// Key pair for `id` (or the default)
    ///
    /// The password prompt is consulted only when the stored blob is
    /// encrypted, and at most once per id for the life of the provider.
    pub fn resolve_key_pair(&mut self, id: Option<&KeyId>) -> Result<Arc<KeyPair>> {
        let id = self.resolve_id(id)?;

        if let Some(pair) = self.key_pairs.get(&id) {
            tracing::debug!("Key pair {} served from cache", id);
            return Ok(Arc::clone(pair));
        }

        if !self.config.private.contains(&id) {
            return Err(Error::KeyNotFound(id.to_string()));
        }

        let blob = Zeroizing::new(self.read_registered(Namespace::Private, &id)?);
        let pair = match classify(&blob)? {
            SerializedKeyType::PrivateKey => KeyPair::load(&blob, None)?,
            SerializedKeyType::EncryptedPrivateKey => {
                let password = self.prompt.get_password(Some(&id))?;
                KeyPair::load(&blob, Some(&password))?
            }
            SerializedKeyType::PublicKey => {
                return Err(Error::InvalidKeyFormat(format!(
                    "Private key file for {} holds a public key",
                    id
                )))
            }
        };

        if pair.key_id() != id {
            return Err(Error::InvalidKeyFormat(format!(
                "Private key file for {} holds key {}",
                id,
                pair.key_id()
            )));
        }

        tracing::debug!("Loaded key pair {}", id);
        let pair = Arc::new(pair);
        self.key_pairs.insert(id, Arc::clone(&pair));
        Ok(pair)
    }

    /// Stored private key bytes for a registered id, without decoding
    pub fn read_private_key_raw(&self, id: &KeyId) -> Result<Zeroizing<Vec<u8>>> {
        if !self.config.private.contains(id) {
            return Err(Error::KeyNotFound(id.to_string()));
        }
        Ok(Zeroizing::new(self.read_registered(Namespace::Private, id)?))
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Store a key pair and register both halves
    ///
    /// The private blob is encrypted when `password` is non-empty. The new
    /// id becomes the default if there is none.
    pub fn add_key_pair(&mut self, pair: KeyPair, password: Option<&str>) -> Result<KeyId> {
        let id = pair.key_id();
        let public = pair.public_key();

        self.private_storage.write(&id, &pair.serialize(password)?)?;
        self.public_storage.write(&id, &public.serialize())?;

        let mut updated = self.config.clone();
        updated.add_private(id);
        updated.add_public(id);
        self.commit(updated, &id)?;

        self.key_pairs.insert(id, Arc::new(pair));
        self.public_keys.insert(id, Arc::new(public));

        tracing::info!("Added key pair {}", id);
        Ok(id)
    }

    /// Store a public key and register it
    pub fn add_public_key(&mut self, key: PublicKey) -> Result<KeyId> {
        let id = key.key_id();

        self.public_storage.write(&id, &key.serialize())?;

        let mut updated = self.config.clone();
        updated.add_public(id);
        self.commit(updated, &id)?;

        self.public_keys.insert(id, Arc::new(key));

        tracing::info!("Added public key {}", id);
        Ok(id)
    }

    /// Delete a private key and unregister it
    ///
    /// Returns `false` without touching storage when the id is not
    /// registered. Removing the default elects a new one.
    ///
    /// ## Errors
    ///
    /// `KeyFileMissing` if the id is registered but its blob is gone.
    pub fn remove_private_key(&mut self, id: &KeyId) -> Result<bool> {
        if !self.config.private.contains(id) {
            tracing::debug!("Private key {} not registered, nothing to remove", id);
            return Ok(false);
        }

        self.delete_registered(Namespace::Private, id)?;

        let mut updated = self.config.clone();
        updated.remove_private(id);
        let new_default = updated.default;
        let was_default = self.config.default.as_ref() == Some(id);
        self.save(updated)?;

        self.key_pairs.remove(id);
        if !self.config.public.contains(id) {
            self.public_keys.remove(id);
        }

        tracing::info!("Removed private key {}", id);
        if was_default {
            match new_default {
                Some(new_default) => tracing::info!("Default key is now {}", new_default),
                None => tracing::info!("No default key remains"),
            }
        }
        Ok(true)
    }

    /// Delete a public key and unregister it
    ///
    /// Returns `false` without touching storage when the id is not
    /// registered.
    pub fn remove_public_key(&mut self, id: &KeyId) -> Result<bool> {
        if !self.config.public.contains(id) {
            tracing::debug!("Public key {} not registered, nothing to remove", id);
            return Ok(false);
        }

        self.delete_registered(Namespace::Public, id)?;

        let mut updated = self.config.clone();
        updated.remove_public(id);
        self.save(updated)?;

        self.public_keys.remove(id);

        tracing::info!("Removed public key {}", id);
        Ok(true)
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn storage(&self, namespace: Namespace) -> &dyn KeyStorage {
        match namespace {
            Namespace::Public => self.public_storage.as_ref(),
            Namespace::Private => self.private_storage.as_ref(),
        }
    }

    /// Read a blob the configuration claims exists
    fn read_registered(&self, namespace: Namespace, id: &KeyId) -> Result<Vec<u8>> {
        self.storage(namespace)
            .read(id)
            .map_err(|e| drift(e, namespace, id))
    }

    fn delete_registered(&self, namespace: Namespace, id: &KeyId) -> Result<()> {
        self.storage(namespace)
            .delete(id)
            .map_err(|e| drift(e, namespace, id))
    }

    /// Persist `updated` and make it current
    fn save(&mut self, updated: ConfigRecord) -> Result<()> {
        self.config_store.save(&updated)?;
        self.config = updated;
        Ok(())
    }

    /// Like [`Self::save`], noting the orphaned blob when the write fails
    fn commit(&mut self, updated: ConfigRecord, id: &KeyId) -> Result<()> {
        self.save(updated).map_err(|e| {
            tracing::warn!(
                "Key {} was stored but the configuration could not be written; its file is orphaned: {}",
                id,
                e
            );
            e
        })
    }
}

/// A registered id whose blob is missing is drift, not an unknown key
fn drift(err: Error, namespace: Namespace, id: &KeyId) -> Error {
    match err {
        Error::KeyNotFound(_) => {
            tracing::warn!("Key {} is registered but its {} file is missing", id, namespace);
            Error::KeyFileMissing {
                id: id.to_string(),
                namespace,
            }
        }
        other => other,
    }
}

// ============================================================================
// TESTS
// ============================================================================
