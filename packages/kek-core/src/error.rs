//! # Error Handling
//!
//! This module provides the error type shared by every layer of KEK Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Key Errors                                                        │
//! │  │   ├── KeyNotFound           - Id absent from the configuration      │
//! │  │   ├── KeyFileMissing        - Configured id has no blob on disk     │
//! │  │   ├── PasswordRequired      - Encrypted key, no password available  │
//! │  │   ├── InvalidPassword       - Encrypted key, wrong password         │
//! │  │   └── InvalidKeyFormat      - Serialized key cannot be decoded      │
//! │  │                                                                      │
//! │  ├── Configuration Errors                                              │
//! │  │   └── ConfigCorrupt         - Persisted record fails validation     │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   └── StorageIo             - Filesystem failure                    │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── EncryptionFailed      - Encryption operation failed           │
//! │  │   ├── DecryptionFailed      - Authentication tag mismatch           │
//! │  │   ├── SignatureInvalid      - Verification ran, signature rejected  │
//! │  │   ├── InvalidKey            - Malformed key bytes                   │
//! │  │   └── KeyDerivationFailed   - HKDF / Argon2 failure                 │
//! │  │                                                                      │
//! │  ├── Stream Errors                                                     │
//! │  │   ├── InvalidStream         - Malformed header or truncated stream  │
//! │  │   ├── UnsupportedVersion    - Unknown algorithm version             │
//! │  │   └── InvalidArgument       - Caller passed an unusable parameter   │
//! │  │                                                                      │
//! │  └── Transfer Errors                                                   │
//! │      └── Transfer              - Object source/sink reported failure  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation
//!
//! Nothing in the core retries or swallows an error. Key resolution and
//! local file I/O either succeed or need the user to step in (wrong
//! password, missing key), so every failure travels back to the command
//! layer, which owns reporting and the process exit status.

use thiserror::Error;

use crate::storage::Namespace;

/// Result type alias for KEK Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for KEK Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Key Errors (100-199)
    // ========================================================================
    /// The requested (or default) key id is not registered
    #[error("Key {0} not found")]
    KeyNotFound(String),

    /// The configuration references a key whose blob is gone from storage
    #[error("Key {id} is registered but its {namespace} key file is missing")]
    KeyFileMissing {
        /// The dangling key id
        id: String,
        /// Which namespace lost its blob
        namespace: Namespace,
    },

    /// The key is password-protected and no password could be obtained
    #[error("Password required to unlock key {0}")]
    PasswordRequired(String),

    /// The key is password-protected and the password did not decrypt it
    #[error("Invalid password")]
    InvalidPassword,

    /// The serialized key could not be decoded
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    // ========================================================================
    // Configuration Errors (200-299)
    // ========================================================================
    /// The persisted configuration failed validation
    #[error("Configuration is corrupt: {0}")]
    ConfigCorrupt(String),

    // ========================================================================
    // Storage Errors (300-399)
    // ========================================================================
    /// Reading or writing a key blob or the configuration failed
    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    // ========================================================================
    // Crypto Errors (400-499)
    // ========================================================================
    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Verification ran successfully but the signature did not match
    #[error("Signature is not valid")]
    SignatureInvalid,

    /// Invalid key bytes
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Key derivation failed
    #[error("Failed to derive key: {0}")]
    KeyDerivationFailed(String),

    // ========================================================================
    // Stream Errors (500-599)
    // ========================================================================
    /// The encrypted stream is malformed or truncated
    #[error("Invalid stream: {0}")]
    InvalidStream(String),

    /// The stream was produced by an unknown algorithm version
    #[error("Unsupported algorithm version: {0}")]
    UnsupportedVersion(u8),

    /// A caller-supplied parameter is not usable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ========================================================================
    // Transfer Errors (600-699)
    // ========================================================================
    /// The external object source or sink failed
    #[error("Transfer failed: {0}")]
    Transfer(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================
    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Keys
    /// - 200-299: Configuration
    /// - 300-399: Storage
    /// - 400-499: Crypto
    /// - 500-599: Streams
    /// - 600-699: Transfers
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Keys (100-199)
            Error::KeyNotFound(_) => 100,
            Error::KeyFileMissing { .. } => 101,
            Error::PasswordRequired(_) => 102,
            Error::InvalidPassword => 103,
            Error::InvalidKeyFormat(_) => 104,

            // Configuration (200-299)
            Error::ConfigCorrupt(_) => 200,

            // Storage (300-399)
            Error::StorageIo(_) => 300,

            // Crypto (400-499)
            Error::EncryptionFailed(_) => 400,
            Error::DecryptionFailed(_) => 401,
            Error::SignatureInvalid => 402,
            Error::InvalidKey(_) => 403,
            Error::KeyDerivationFailed(_) => 404,

            // Streams (500-599)
            Error::InvalidStream(_) => 500,
            Error::UnsupportedVersion(_) => 501,
            Error::InvalidArgument(_) => 502,

            // Transfers (600-699)
            Error::Transfer(_) => 600,

            // Internal (900-999)
            Error::Internal(_) => 900,
        }
    }

    /// Check if this error requires user action
    ///
    /// These are the conditions a user resolves by supplying a different
    /// password or key id, never by retrying.
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            Error::KeyNotFound(_) | Error::PasswordRequired(_) | Error::InvalidPassword
        )
    }

    /// True for both "not registered" and "registered but blob missing"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound(_) | Error::KeyFileMissing { .. })
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageIo(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigCorrupt(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::KeyNotFound("default".into()).code(), 100);
        assert_eq!(Error::ConfigCorrupt("bad".into()).code(), 200);
        assert_eq!(Error::StorageIo("disk".into()).code(), 300);
        assert_eq!(Error::SignatureInvalid.code(), 402);
        assert_eq!(Error::UnsupportedVersion(7).code(), 501);
        assert_eq!(Error::Transfer("s3".into()).code(), 600);
        assert_eq!(Error::Internal("test".into()).code(), 900);
    }

    #[test]
    fn test_not_found_covers_drift() {
        let drift = Error::KeyFileMissing {
            id: "6a50d96f9128fe1f".into(),
            namespace: Namespace::Private,
        };
        assert!(drift.is_not_found());
        assert!(Error::KeyNotFound("6a50d96f9128fe1f".into()).is_not_found());
        assert!(!Error::InvalidPassword.is_not_found());
        assert!(drift.to_string().contains("private"));
    }

    #[test]
    fn test_user_action_errors() {
        assert!(Error::InvalidPassword.requires_user_action());
        assert!(Error::PasswordRequired("k".into()).requires_user_action());
        assert!(!Error::SignatureInvalid.requires_user_action());
        assert!(!Error::StorageIo("x".into()).requires_user_action());
    }

    #[test]
    fn test_conversions() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(Error::from(io), Error::StorageIo(_)));

        let json = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(Error::from(json), Error::ConfigCorrupt(_)));
    }
}
