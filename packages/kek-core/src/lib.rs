//! # KEK Core
//!
//! Key lifecycle management and chunked streaming encryption for the `kek`
//! command-line tool.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           KEK CORE MODULES                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      Command Handlers                           │   │
//! │  │   generate · import · export · delete · list                    │   │
//! │  │   encrypt · decrypt · sign · verify                             │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                       │
//! │  ┌──────────────▼──────────────┐  ┌────────────▼────────────────────┐  │
//! │  │        Key Provider         │  │    Streaming Cipher Pipeline    │  │
//! │  │                             │  │                                 │  │
//! │  │ - Resolve id / default      │◄─┤ - Metadata header               │  │
//! │  │ - Unlock (prompt once)      │  │ - Chunked AES-GCM               │  │
//! │  │ - Cache public / pairs      │  │ - Streaming signatures          │  │
//! │  │ - Add / remove / re-elect   │  │ - StreamingBuffer (2 threads)   │  │
//! │  └──────┬───────────────┬──────┘  └─────────────────────────────────┘  │
//! │         │               │                                              │
//! │  ┌──────▼──────┐ ┌──────▼──────────┐  ┌─────────────────────────────┐  │
//! │  │ ConfigStore │ │   KeyStorage    │  │          Crypto             │  │
//! │  │             │ │                 │  │                             │  │
//! │  │ config.json │ │ <id>.kek        │  │ - Ed25519 / X25519          │  │
//! │  │             │ │ <id>.pub.kek    │  │ - HKDF / Argon2id           │  │
//! │  └─────────────┘ └─────────────────┘  │ - Armored key blobs         │  │
//! │                                       └─────────────────────────────┘  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Key pairs, key ids, serialization, AEAD, signatures
//! - [`storage`] - Configuration record and key blob storage
//! - [`provider`] - Key resolution, caching, and password prompts
//! - [`stream`] - Chunked encryption, signatures, and the streaming buffer
//! - [`transfer`] - Download-and-decrypt / encrypt-and-upload helpers
//! - [`commands`] - The command handlers a front end calls
//! - [`logging`] - Tracing subscriber setup

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod commands;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod provider;
pub mod storage;
pub mod stream;
pub mod transfer;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use crypto::{KeyId, KeyPair, PublicKey};
pub use error::{Error, Result};
pub use provider::{KeyProvider, PasswordPrompt};

// ============================================================================
// CORE CONFIGURATION
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use storage::{FileKeyStorage, JsonConfigStore};

/// Environment variable overriding the key directory
pub const CONFIG_DIR_ENV_VAR: &str = "KEK_CONFIG_DIR";

/// Environment variable overriding the chunk length
pub const CHUNK_LENGTH_ENV_VAR: &str = "KEK_CHUNK_LENGTH";

/// Name of the configuration record inside the key directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Process-level settings
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Directory holding `config.json` and the key blobs
    pub config_dir: PathBuf,
    /// Chunk length for streaming operations
    pub chunk_length: usize,
    /// How long a streaming read waits before logging a stall
    pub buffer_wait_timeout: Duration,
}

impl CoreConfig {
    /// Settings rooted at `config_dir` with default chunking
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            chunk_length: stream::DEFAULT_CHUNK_LENGTH,
            buffer_wait_timeout: stream::DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Settings from the environment
    ///
    /// `KEK_CONFIG_DIR` overrides the default `~/.kek`; `KEK_CHUNK_LENGTH`
    /// overrides the chunk length and must be an integer.
    pub fn from_env() -> Result<Self> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV_VAR) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "No home directory; set {}",
                        CONFIG_DIR_ENV_VAR
                    ))
                })?
                .join(".kek"),
        };

        let mut config = Self::new(config_dir);
        if let Ok(value) = std::env::var(CHUNK_LENGTH_ENV_VAR) {
            config.chunk_length = value.trim().parse().map_err(|_| {
                Error::InvalidArgument(format!(
                    "{} must be a non-negative integer, got {:?}",
                    CHUNK_LENGTH_ENV_VAR, value
                ))
            })?;
        }

        tracing::debug!(
            "Using key directory {} with chunk length {}",
            config.config_dir.display(),
            config.chunk_length
        );
        Ok(config)
    }

    /// Location of the configuration record
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Build a file-backed provider over this directory
    ///
    /// Creates the directory (owner-only on unix) if it does not exist.
    pub fn open_provider(&self, prompt: Box<dyn PasswordPrompt>) -> Result<KeyProvider> {
        let public = FileKeyStorage::public(&self.config_dir)?;
        let private = FileKeyStorage::private(&self.config_dir)?;
        let config = JsonConfigStore::new(self.config_path());

        KeyProvider::new(Box::new(config), Box::new(public), Box::new(private), prompt)
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of KEK Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns build information for debugging
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        algorithm_version: stream::CURRENT_VERSION,
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Build information for debugging
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Newest stream algorithm version this build writes
    pub algorithm_version: u8,
    /// Build profile (debug/release)
    pub profile: &'static str,
}

// ============================================================================
// TESTS
// ============================================================================
