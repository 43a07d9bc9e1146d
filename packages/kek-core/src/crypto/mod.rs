//! # Cryptography Module
//!
//! The cryptographic engine behind KEK: key generation, key serialization,
//! stream chunk sealing, and signatures. Everything above this module sees
//! keys as opaque [`KeyPair`] / [`PublicKey`] objects.
//!
//! ## Security Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    KEY HIERARCHY                                │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │              Seed (256 bits, OS random)                         │   │
//! │  │                          │                                      │   │
//! │  │            ┌─────────────┴─────────────┐                       │   │
//! │  │            ▼                           ▼                       │   │
//! │  │  ┌─────────────────┐         ┌─────────────────┐              │   │
//! │  │  │  Signing Key    │         │ Encryption Key  │              │   │
//! │  │  │  (Ed25519)      │         │ (X25519)        │              │   │
//! │  │  │                 │         │                 │              │   │
//! │  │  │ • sign / verify │         │ • stream keys   │              │   │
//! │  │  └─────────────────┘         └─────────────────┘              │   │
//! │  │                                                                 │   │
//! │  │  Seed at rest: plain, or AES-256-GCM under Argon2id(password)  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 STREAM ENCRYPTION                               │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  1. Ephemeral X25519 × recipient X25519 → shared secret        │   │
//! │  │  2. HKDF-SHA256(shared, salt = key id) → stream key            │   │
//! │  │  3. AES-256-GCM per chunk, counter nonce, header-bound AAD     │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 SIGNATURE SCHEME                                │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  Ed25519("kek-signature-v1" || SHA-512(message)), 64 bytes     │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose |
//! |-----------|---------|
//! | Ed25519 | Signing |
//! | X25519 | Key agreement for streams |
//! | AES-256-GCM | Chunk encryption, key wrapping |
//! | HKDF-SHA256 | Key derivation |
//! | Argon2id | Password hashing |
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: Seeds and secret keys are zeroized when dropped
//! 2. **Constant-Time Operations**: Using dalek for constant-time crypto
//! 3. **Secure Random**: Using `rand::rngs::OsRng` for cryptographic randomness
//! 4. **No Nonce Reuse**: Each stream has its own key and a fresh nonce prefix

mod armor;
mod encryption;
mod kdf;
mod keys;
mod signing;

pub use armor::{classify, SerializedKeyType};
pub use encryption::{
    decrypt, encrypt, open, seal, ChunkCipher, EncryptionKey, Nonce, KEY_SIZE, NONCE_PREFIX_SIZE,
    NONCE_SIZE, TAG_SIZE,
};
pub use kdf::{
    compute_key_fingerprint, derive_keys_from_seed, derive_password_key, derive_stream_key,
    DerivedKeys, KEY_ID_SIZE, PASSWORD_SALT_SIZE,
};
pub use keys::{
    EncryptionKeyPair, KeyId, KeyPair, PublicKey, SigningKeyPair, KEY_FORMAT_VERSION, SEED_SIZE,
};
pub use signing::{
    sign, sign_digest, verify, verify_digest, MessageDigest, Signature, SIGNATURE_SIZE,
};

/// Size of X25519 / Ed25519 public keys in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;
