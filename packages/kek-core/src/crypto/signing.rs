//! # Digital Signatures Module
//!
//! Ed25519 signatures over a SHA-512 digest of the message, so a file of
//! any size can be signed while only one chunk is held in memory.
//!
//! ## Signature Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SIGNING FLOW                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────┐   chunk 0, chunk 1, ... chunk n                      │
//! │  │   Message    │ ─────────────────────────────┐                        │
//! │  └──────────────┘                              ▼                        │
//! │                              ┌──────────────────────────────┐           │
//! │                              │  MessageDigest (SHA-512)     │           │
//! │                              │  update() once per chunk     │           │
//! │                              └──────────────┬───────────────┘           │
//! │                                             │ 64-byte digest            │
//! │                                             ▼                           │
//! │                   ┌──────────────────────────────────────────┐          │
//! │                   │  Ed25519 Sign(                           │          │
//! │                   │    "kek-signature-v1" || digest)         │          │
//! │                   └──────────────┬───────────────────────────┘          │
//! │                                  ▼                                      │
//! │                      Signature (64 raw bytes)                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Chunking is only a digesting strategy: the signature of a message is the
//! same whatever chunk length was used to feed it.
//!
//! ## Security Properties
//!
//! | Property | Description |
//! |----------|-------------|
//! | Authenticity | Verifies the message came from the key holder |
//! | Integrity | Detects any modification to the signed message |
//! | Domain Separation | The prefix keeps KEK signatures out of other protocols |

use ed25519_dalek::{Signature as Ed25519Signature, Signer, Verifier, VerifyingKey};
use sha2::{Digest, Sha512};

use crate::crypto::SigningKeyPair;
use crate::error::{Error, Result};

/// Size of an Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Prefix mixed into every signed digest
const SIGNATURE_DOMAIN: &[u8] = b"kek-signature-v1";

/// An Ed25519 digital signature
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Signature {
    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice
    ///
    /// A slice of the wrong length cannot be a signature over anything, so
    /// it is reported as `SignatureInvalid` rather than a decoding error.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; SIGNATURE_SIZE] =
            slice.try_into().map_err(|_| Error::SignatureInvalid)?;
        Ok(Self(bytes))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Incremental SHA-512 over a message fed in pieces
#[derive(Clone, Default)]
pub struct MessageDigest {
    hasher: Sha512,
}

impl MessageDigest {
    /// Start an empty digest
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next piece of the message
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn signed_payload(self) -> Vec<u8> {
        let digest = self.hasher.finalize();
        let mut payload = Vec::with_capacity(SIGNATURE_DOMAIN.len() + digest.len());
        payload.extend_from_slice(SIGNATURE_DOMAIN);
        payload.extend_from_slice(&digest);
        payload
    }
}

/// Sign a finished message digest
pub fn sign_digest(keypair: &SigningKeyPair, digest: MessageDigest) -> Signature {
    let sig = keypair.signing_key().sign(&digest.signed_payload());
    Signature(sig.to_bytes())
}

/// Verify a signature over a finished message digest
///
/// ## Errors
///
/// - `InvalidKey` if `public_key` is not a valid Ed25519 point
/// - `SignatureInvalid` if the signature does not match
pub fn verify_digest(public_key: &[u8; 32], digest: MessageDigest, signature: &Signature) -> Result<()> {
    let verifying_key = VerifyingKey::from_bytes(public_key)
        .map_err(|e| Error::InvalidKey(format!("Invalid public key: {}", e)))?;

    let sig = Ed25519Signature::from_bytes(&signature.0);

    verifying_key
        .verify(&digest.signed_payload(), &sig)
        .map_err(|_| Error::SignatureInvalid)
}

/// Sign a message held entirely in memory
pub fn sign(keypair: &SigningKeyPair, message: &[u8]) -> Signature {
    let mut digest = MessageDigest::new();
    digest.update(message);
    sign_digest(keypair, digest)
}

/// Verify a signature over a message held entirely in memory
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &Signature) -> Result<()> {
    let mut digest = MessageDigest::new();
    digest.update(message);
    verify_digest(public_key, digest, signature)
}

// ============================================================================
// TESTS
// ============================================================================
