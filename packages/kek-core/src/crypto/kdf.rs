//! # Key Derivation Functions
//!
//! Every symmetric key KEK uses is derived, never stored.
//!
//! ## Key Derivation Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    KEY DERIVATION HIERARCHY                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    KEY PAIR SEED (32 bytes)                     │   │
//! │  │                                                                 │   │
//! │  │  The only secret persisted in a private key file               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │              ┌─────────────────┴─────────────────┐                     │
//! │              ▼                                   ▼                     │
//! │  ┌───────────────────────────┐   ┌───────────────────────────┐       │
//! │  │     SIGNING KEY           │   │    ENCRYPTION KEY         │       │
//! │  │                           │   │                           │       │
//! │  │  HKDF-SHA256(             │   │  HKDF-SHA256(             │       │
//! │  │    ikm = seed,            │   │    ikm = seed,            │       │
//! │  │    info = "kek-signing-   │   │    info = "kek-encryption-│       │
//! │  │            key-v1"        │   │            key-v1"        │       │
//! │  │  )                        │   │  )                        │       │
//! │  │                           │   │                           │       │
//! │  │  → 32-byte Ed25519 seed   │   │  → 32-byte X25519 secret  │       │
//! │  └───────────────────────────┘   └───────────────────────────┘       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stream and Password Keys
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  X25519(ephemeral, recipient) ──► HKDF-SHA256(                         │
//! │                                      salt = key id (8 bytes),          │
//! │                                      info = "kek-stream-v1")           │
//! │                                   ──► 32-byte AES-256-GCM stream key   │
//! │                                                                         │
//! │  password + random salt ────────► Argon2id(m=19 MiB, t=2, p=1)        │
//! │                                   ──► 32-byte AES-256-GCM wrapping key │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Considerations
//!
//! | Aspect | Design Choice |
//! |--------|---------------|
//! | KDF Algorithm | HKDF-SHA256 |
//! | Key Separation | Different `info` strings |
//! | Stream Binding | `salt = key id` |
//! | Password Hashing | Argon2id v0x13 |
//! | Version String | "-v1" suffix |

use argon2::{Algorithm, Argon2, Params, Version};
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::ZeroizeOnDrop;

use crate::error::{Error, Result};

/// Domain separation strings for HKDF
pub mod domain {
    /// Domain for signing key derivation
    pub const SIGNING_KEY: &[u8] = b"kek-signing-key-v1";

    /// Domain for encryption key derivation
    pub const ENCRYPTION_KEY: &[u8] = b"kek-encryption-key-v1";

    /// Domain for per-stream chunk keys
    pub const STREAM_KEY: &[u8] = b"kek-stream-v1";
}

/// Argon2id memory cost in KiB
const ARGON2_MEMORY_KIB: u32 = 19_456;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

/// Length of the random salt stored beside password-encrypted keys
pub const PASSWORD_SALT_SIZE: usize = 16;

/// Length of a key id in bytes
pub const KEY_ID_SIZE: usize = 8;

/// Keys derived from a key pair seed
#[derive(ZeroizeOnDrop)]
pub struct DerivedKeys {
    /// Ed25519 signing key (32 bytes)
    pub signing_key: [u8; 32],

    /// X25519 encryption key (32 bytes)
    pub encryption_key: [u8; 32],
}

/// Derive signing and encryption keys from a key pair seed
///
/// Deterministic: a private key file only needs to hold the seed.
pub fn derive_keys_from_seed(seed: &[u8; 32]) -> Result<DerivedKeys> {
    let hkdf = Hkdf::<Sha256>::new(None, seed);

    let mut signing_key = [0u8; 32];
    hkdf.expand(domain::SIGNING_KEY, &mut signing_key)
        .map_err(|_| Error::KeyDerivationFailed("Failed to derive signing key".into()))?;

    let mut encryption_key = [0u8; 32];
    hkdf.expand(domain::ENCRYPTION_KEY, &mut encryption_key)
        .map_err(|_| Error::KeyDerivationFailed("Failed to derive encryption key".into()))?;

    Ok(DerivedKeys {
        signing_key,
        encryption_key,
    })
}

/// Derive the AES-256-GCM key for one encrypted stream
///
/// ## Parameters
///
/// - `dh_output`: Raw 32-byte output of X25519(ephemeral, recipient)
/// - `key_id`: Recipient key id, bound in as the HKDF salt
pub fn derive_stream_key(dh_output: &[u8; 32], key_id: &[u8; KEY_ID_SIZE]) -> Result<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(Some(key_id), dh_output);

    let mut key = [0u8; 32];
    hkdf.expand(domain::STREAM_KEY, &mut key)
        .map_err(|_| Error::KeyDerivationFailed("Failed to derive stream key".into()))?;

    Ok(key)
}

/// Derive a wrapping key from a password using Argon2id
///
/// The caller owns the returned key and is expected to wrap it in a
/// zeroizing type as soon as it is used.
pub fn derive_password_key(password: &str, salt: &[u8; PASSWORD_SALT_SIZE]) -> Result<[u8; 32]> {
    let params = Params::new(
        ARGON2_MEMORY_KIB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(32),
    )
    .map_err(|e| Error::KeyDerivationFailed(format!("Invalid Argon2 parameters: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut output)
        .map_err(|e| Error::KeyDerivationFailed(format!("Argon2 failed: {}", e)))?;

    Ok(output)
}

/// Compute the key id of a public key
///
/// First 8 bytes of SHA-256 over `signing_public || encryption_public`.
pub fn compute_key_fingerprint(signing: &[u8; 32], encryption: &[u8; 32]) -> [u8; KEY_ID_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(signing);
    hasher.update(encryption);
    let digest = hasher.finalize();

    let mut id = [0u8; KEY_ID_SIZE];
    id.copy_from_slice(&digest[..KEY_ID_SIZE]);
    id
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_keys_deterministic() {
        let seed = [42u8; 32];

        let keys1 = derive_keys_from_seed(&seed).unwrap();
        let keys2 = derive_keys_from_seed(&seed).unwrap();

        assert_eq!(keys1.signing_key, keys2.signing_key);
        assert_eq!(keys1.encryption_key, keys2.encryption_key);
    }

    #[test]
    fn test_signing_encryption_keys_different() {
        let keys = derive_keys_from_seed(&[42u8; 32]).unwrap();
        assert_ne!(keys.signing_key, keys.encryption_key);
    }

    #[test]
    fn test_stream_key_bound_to_key_id() {
        let dh_output = [7u8; 32];

        let key1 = derive_stream_key(&dh_output, &[1u8; KEY_ID_SIZE]).unwrap();
        let key2 = derive_stream_key(&dh_output, &[1u8; KEY_ID_SIZE]).unwrap();
        let key3 = derive_stream_key(&dh_output, &[2u8; KEY_ID_SIZE]).unwrap();

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_password_key_depends_on_salt_and_password() {
        let salt = [3u8; PASSWORD_SALT_SIZE];

        let key1 = derive_password_key("correct horse", &salt).unwrap();
        let key2 = derive_password_key("correct horse", &salt).unwrap();
        let key3 = derive_password_key("battery staple", &salt).unwrap();
        let key4 = derive_password_key("correct horse", &[4u8; PASSWORD_SALT_SIZE]).unwrap();

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
        assert_ne!(key1, key4);
    }

    #[test]
    fn test_fingerprint() {
        let a = compute_key_fingerprint(&[1u8; 32], &[2u8; 32]);
        let b = compute_key_fingerprint(&[2u8; 32], &[1u8; 32]);

        assert_eq!(a.len(), KEY_ID_SIZE);
        assert_ne!(a, b);
    }
}
