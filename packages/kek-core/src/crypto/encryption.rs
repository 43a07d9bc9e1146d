//! # Encryption Module
//!
//! AES-256-GCM for private-key wrapping and for stream chunks.
//!
//! ## Chunk Sealing
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CHUNK ENCRYPTION FLOW                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Step 1: One key per stream                                            │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  ephemeral X25519 secret × recipient X25519 public          │       │
//! │  │           ↓ HKDF("kek-stream-v1", salt = key id)            │       │
//! │  │  Stream Key (32 bytes)                                       │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 2: Deterministic nonce per chunk                                 │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  nonce_prefix (8 random bytes, in header) || u32_be(index)  │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Step 3: Encrypt                                                       │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  AES-256-GCM(                                                │       │
//! │  │    key = stream_key,                                        │       │
//! │  │    nonce = chunk_nonce,                                     │       │
//! │  │    plaintext = chunk,                                       │       │
//! │  │    aad = header || u32_be(index) || final_flag              │       │
//! │  │  )                                                          │       │
//! │  │           ↓                                                  │       │
//! │  │  Ciphertext + 16-byte Auth Tag                              │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! | Property | Guarantee |
//! |----------|-----------|
//! | Confidentiality | Only the holder of the recipient key can read chunks |
//! | Integrity | Any modification of a chunk or the header is detected |
//! | Ordering | Swapping or dropping chunks fails the AAD check |
//! | Truncation | Only the last chunk carries `final_flag = 1` |

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce as AesNonce,
};
use rand::RngCore;
use zeroize::ZeroizeOnDrop;

use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Size of the random per-stream nonce prefix
pub const NONCE_PREFIX_SIZE: usize = 8;

/// A nonce (number used once) for AES-GCM encryption
///
/// **Never reuse a nonce with the same key.** Random nonces are used for
/// key wrapping; stream chunks use a random prefix plus a counter.
#[derive(Clone, Copy, Debug)]
pub struct Nonce(pub [u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Nonce for chunk `index` of a stream
    pub fn for_chunk(prefix: &[u8; NONCE_PREFIX_SIZE], index: u32) -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        bytes[..NONCE_PREFIX_SIZE].copy_from_slice(prefix);
        bytes[NONCE_PREFIX_SIZE..].copy_from_slice(&index.to_be_bytes());
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// An AES-256-GCM encryption key
///
/// Zeroized when dropped.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| Error::InvalidKey(format!("Invalid AES key: {}", e)))
    }
}

/// Encrypt with AES-256-GCM under an explicit nonce
///
/// Returns the ciphertext with the 16-byte tag appended.
pub fn seal(key: &EncryptionKey, nonce: &Nonce, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let payload = Payload {
        msg: plaintext,
        aad,
    };

    key.cipher()?
        .encrypt(AesNonce::from_slice(&nonce.0), payload)
        .map_err(|e| Error::EncryptionFailed(format!("Encryption failed: {}", e)))
}

/// Decrypt with AES-256-GCM under an explicit nonce
///
/// ## Errors
///
/// Returns `DecryptionFailed` if the ciphertext, the AAD, the key or the
/// nonce do not match what was used to seal.
pub fn open(key: &EncryptionKey, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let payload = Payload {
        msg: ciphertext,
        aad,
    };

    key.cipher()?
        .decrypt(AesNonce::from_slice(&nonce.0), payload)
        .map_err(|_| {
            Error::DecryptionFailed("Decryption failed: authentication tag mismatch".into())
        })
}

/// Encrypt a message under a fresh random nonce
///
/// ## Returns
///
/// Tuple of (nonce, ciphertext_with_tag)
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8], aad: &[u8]) -> Result<(Nonce, Vec<u8>)> {
    let nonce = Nonce::random();
    let ciphertext = seal(key, &nonce, plaintext, aad)?;
    Ok((nonce, ciphertext))
}

/// Decrypt a message produced by [`encrypt`]
pub fn decrypt(key: &EncryptionKey, nonce: &Nonce, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    open(key, nonce, ciphertext, aad)
}

// ============================================================================
// STREAM CHUNK ENCRYPTION
// ============================================================================

/// Seals and opens the chunks of one stream
///
/// Every chunk is bound to the stream header, its position, and whether it
/// is the last one.
pub struct ChunkCipher {
    key: EncryptionKey,
    nonce_prefix: [u8; NONCE_PREFIX_SIZE],
    header: Vec<u8>,
}

impl ChunkCipher {
    /// Create a chunk cipher for a stream whose header is `header`
    pub fn new(key: EncryptionKey, nonce_prefix: [u8; NONCE_PREFIX_SIZE], header: &[u8]) -> Self {
        Self {
            key,
            nonce_prefix,
            header: header.to_vec(),
        }
    }

    /// Encrypt chunk `index`; output is `plaintext.len() + TAG_SIZE` bytes
    pub fn seal(&self, index: u32, is_final: bool, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::for_chunk(&self.nonce_prefix, index);
        seal(&self.key, &nonce, plaintext, &self.aad(index, is_final))
    }

    /// Decrypt chunk `index`
    ///
    /// Fails with `DecryptionFailed` if the chunk was tampered with, moved,
    /// or is claimed final when it was not (and vice versa).
    pub fn open(&self, index: u32, is_final: bool, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(Error::InvalidStream(format!(
                "Chunk {} is {} bytes, shorter than its authentication tag",
                index,
                ciphertext.len()
            )));
        }
        let nonce = Nonce::for_chunk(&self.nonce_prefix, index);
        open(&self.key, &nonce, ciphertext, &self.aad(index, is_final))
    }

    fn aad(&self, index: u32, is_final: bool) -> Vec<u8> {
        let mut aad = Vec::with_capacity(self.header.len() + 5);
        aad.extend_from_slice(&self.header);
        aad.extend_from_slice(&index.to_be_bytes());
        aad.push(u8::from(is_final));
        aad
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_cipher() -> ChunkCipher {
        ChunkCipher::new(EncryptionKey::from_bytes([42u8; 32]), [9u8; NONCE_PREFIX_SIZE], b"header")
    }

    #[test]
    fn test_encrypt_decrypt_basic() {
        let key = EncryptionKey::from_bytes([42u8; 32]);
        let plaintext = b"Hello, World!";
        let aad = b"context";

        let (nonce, ciphertext) = encrypt(&key, plaintext, aad).unwrap();
        let decrypted = decrypt(&key, &nonce, &ciphertext, aad).unwrap();

        assert_eq!(decrypted, plaintext);
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_SIZE);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = EncryptionKey::from_bytes([42u8; 32]);
        let (nonce, mut ciphertext) = encrypt(&key, b"Hello, World!", b"context").unwrap();

        ciphertext[0] ^= 0xFF;

        let result = decrypt(&key, &nonce, &ciphertext, b"context");
        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = EncryptionKey::from_bytes([42u8; 32]);
        let (nonce, ciphertext) = encrypt(&key, b"Hello, World!", b"context").unwrap();

        assert!(decrypt(&key, &nonce, &ciphertext, b"wrong context").is_err());
    }

    #[test]
    fn test_chunk_nonce_layout() {
        let nonce = Nonce::for_chunk(&[0xAA; NONCE_PREFIX_SIZE], 0x0102_0304);
        assert_eq!(&nonce.as_bytes()[..8], &[0xAA; 8]);
        assert_eq!(&nonce.as_bytes()[8..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_chunk_round_trip() {
        let cipher = chunk_cipher();

        let sealed = cipher.seal(3, false, b"chunk data").unwrap();
        assert_eq!(cipher.open(3, false, &sealed).unwrap(), b"chunk data");
    }

    #[test]
    fn test_chunk_wrong_index_fails() {
        let cipher = chunk_cipher();

        let sealed = cipher.seal(0, false, b"chunk data").unwrap();
        assert!(cipher.open(1, false, &sealed).is_err());
    }

    #[test]
    fn test_chunk_final_flag_is_authenticated() {
        let cipher = chunk_cipher();

        let sealed = cipher.seal(0, false, b"not the end").unwrap();
        assert!(cipher.open(0, true, &sealed).is_err());
    }

    #[test]
    fn test_chunk_bound_to_header() {
        let sealed = chunk_cipher().seal(0, true, b"data").unwrap();
        let other = ChunkCipher::new(
            EncryptionKey::from_bytes([42u8; 32]),
            [9u8; NONCE_PREFIX_SIZE],
            b"other header",
        );

        assert!(other.open(0, true, &sealed).is_err());
    }

    #[test]
    fn test_short_chunk_is_invalid_stream() {
        let result = chunk_cipher().open(0, true, &[0u8; TAG_SIZE - 1]);
        assert!(matches!(result, Err(Error::InvalidStream(_))));
    }
}
