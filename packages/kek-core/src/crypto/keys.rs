//! # Key Management
//!
//! Key pairs, public keys, key ids, and their serialized form.
//!
//! ## Key Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY TYPES                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyPair                                                        │   │
//! │  │  ───────                                                         │   │
//! │  │                                                                  │   │
//! │  │  32-byte seed ──HKDF──► SigningKeyPair (Ed25519, sign files)    │   │
//! │  │                └─HKDF──► EncryptionKeyPair (X25519, open files) │   │
//! │  │                                                                  │   │
//! │  │  The seed is the only thing written to a private key file and   │   │
//! │  │  is zeroized on drop.                                           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  PublicKey                                                      │   │
//! │  │  ─────────                                                       │   │
//! │  │                                                                  │   │
//! │  │  Ed25519 verifying key (32) + X25519 public key (32)            │   │
//! │  │  KeyId = hex(SHA-256(signing || encryption)[..8])               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialized Bodies
//!
//! | Kind | Body (inside the armor) |
//! |------|-------------------------|
//! | Public | `version(1) ‖ signing(32) ‖ encryption(32)` |
//! | Private | `version(1) ‖ seed(32)` |
//! | Encrypted private | `version(1) ‖ salt(16) ‖ nonce(12) ‖ AES-256-GCM(seed)` |

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use super::armor::{armor, dearmor, SerializedKeyType};
use super::encryption::{decrypt, encrypt, EncryptionKey, Nonce, NONCE_SIZE, TAG_SIZE};
use super::kdf::{
    compute_key_fingerprint, derive_keys_from_seed, derive_password_key, KEY_ID_SIZE,
    PASSWORD_SALT_SIZE,
};
use crate::error::{Error, Result};

/// Version byte at the start of every serialized key body
pub const KEY_FORMAT_VERSION: u8 = 1;

/// Size of a key pair seed
pub const SEED_SIZE: usize = 32;

/// AAD for the password-wrapped seed
const WRAPPED_SEED_AAD: &[u8] = b"kek-private-key-v1";

const PUBLIC_BODY_LEN: usize = 1 + 32 + 32;
const PRIVATE_BODY_LEN: usize = 1 + SEED_SIZE;
const ENCRYPTED_BODY_LEN: usize = 1 + PASSWORD_SALT_SIZE + NONCE_SIZE + SEED_SIZE + TAG_SIZE;

// ============================================================================
// KEY ID
// ============================================================================

/// Fingerprint-derived key identifier, shown as 16 lowercase hex characters
///
/// Ordering matches the ordering of the hex strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyId([u8; KEY_ID_SIZE]);

impl KeyId {
    /// Create from raw fingerprint bytes
    pub fn from_bytes(bytes: [u8; KEY_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw fingerprint bytes
    pub fn as_bytes(&self) -> &[u8; KEY_ID_SIZE] {
        &self.0
    }

    /// Parse a hex key id; upper-case input is accepted
    pub fn parse(s: &str) -> Result<Self> {
        let lowered = s.to_ascii_lowercase();
        if lowered.len() != KEY_ID_SIZE * 2 {
            return Err(Error::InvalidArgument(format!("Invalid key id {:?}", s)));
        }

        let mut bytes = [0u8; KEY_ID_SIZE];
        hex::decode_to_slice(&lowered, &mut bytes)
            .map_err(|_| Error::InvalidArgument(format!("Invalid key id {:?}", s)))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self)
    }
}

impl FromStr for KeyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for KeyId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<KeyId> for String {
    fn from(id: KeyId) -> Self {
        id.to_string()
    }
}

// ============================================================================
// KEY PAIR
// ============================================================================

/// Combined keypair containing both signing and encryption keys
///
/// ## Security
///
/// - The seed and both private keys are zeroized when dropped
/// - Both keys are derived from the seed, so the seed is the whole backup
#[derive(ZeroizeOnDrop)]
pub struct KeyPair {
    seed: [u8; SEED_SIZE],
    /// Ed25519 keypair for signing
    pub signing: SigningKeyPair,
    /// X25519 keypair for decryption
    pub encryption: EncryptionKeyPair,
    #[zeroize(skip)]
    key_id: KeyId,
}

impl KeyPair {
    /// Generate a new random keypair from the OS random number generator
    pub fn generate() -> Result<Self> {
        let mut seed = Zeroizing::new([0u8; SEED_SIZE]);
        OsRng.fill_bytes(&mut seed[..]);
        Self::from_seed(&seed)
    }

    /// Create a keypair from a 32-byte seed
    ///
    /// Deterministic: the same seed always produces the same keys.
    pub fn from_seed(seed: &[u8; SEED_SIZE]) -> Result<Self> {
        let derived = derive_keys_from_seed(seed)?;

        let signing = SigningKeyPair::from_bytes(&derived.signing_key);
        let encryption = EncryptionKeyPair::from_bytes(&derived.encryption_key);
        let key_id = KeyId::from_bytes(compute_key_fingerprint(
            &signing.public_bytes(),
            &encryption.public_bytes(),
        ));

        Ok(Self {
            seed: *seed,
            signing,
            encryption,
            key_id,
        })
    }

    /// The id shared by this pair and its public key
    pub fn key_id(&self) -> KeyId {
        self.key_id
    }

    /// Get the public half for sharing with others
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            signing: self.signing.public_bytes(),
            encryption: self.encryption.public_bytes(),
        }
    }

    /// Serialize the private key
    ///
    /// With a non-empty password the seed is wrapped with AES-256-GCM under
    /// an Argon2id key; an empty password is treated as no password.
    pub fn serialize(&self, password: Option<&str>) -> Result<Vec<u8>> {
        match password.filter(|p| !p.is_empty()) {
            None => {
                let mut body = Zeroizing::new(Vec::with_capacity(PRIVATE_BODY_LEN));
                body.push(KEY_FORMAT_VERSION);
                body.extend_from_slice(&self.seed);
                Ok(armor(SerializedKeyType::PrivateKey, &body))
            }
            Some(password) => {
                let mut salt = [0u8; PASSWORD_SALT_SIZE];
                OsRng.fill_bytes(&mut salt);
                let key = EncryptionKey::from_bytes(derive_password_key(password, &salt)?);
                let (nonce, ciphertext) = encrypt(&key, &self.seed, WRAPPED_SEED_AAD)?;

                let mut body = Vec::with_capacity(ENCRYPTED_BODY_LEN);
                body.push(KEY_FORMAT_VERSION);
                body.extend_from_slice(&salt);
                body.extend_from_slice(nonce.as_bytes());
                body.extend_from_slice(&ciphertext);
                Ok(armor(SerializedKeyType::EncryptedPrivateKey, &body))
            }
        }
    }

    /// Load a serialized private key
    ///
    /// ## Errors
    ///
    /// - `PasswordRequired` if the key is encrypted and no password was given
    /// - `InvalidPassword` if the password does not unwrap the seed
    /// - `InvalidKeyFormat` if the blob is not a well-formed private key
    pub fn load(serialized: &[u8], password: Option<&str>) -> Result<Self> {
        let (kind, body) = dearmor(serialized)?;
        let body = Zeroizing::new(body);

        match kind {
            SerializedKeyType::PrivateKey => {
                let seed = parse_plain_body(&body)?;
                Self::from_seed(&seed)
            }
            SerializedKeyType::EncryptedPrivateKey => {
                let password = password
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| Error::PasswordRequired("encrypted private key".into()))?;
                let seed = unwrap_encrypted_body(&body, password)?;
                Self::from_seed(&seed)
            }
            SerializedKeyType::PublicKey => Err(Error::InvalidKeyFormat(
                "Expected a private key, found a public key".into(),
            )),
        }
    }
}

fn check_version(body: &[u8]) -> Result<()> {
    match body.first() {
        Some(&KEY_FORMAT_VERSION) => Ok(()),
        Some(other) => Err(Error::InvalidKeyFormat(format!(
            "Unknown key format version {}",
            other
        ))),
        None => Err(Error::InvalidKeyFormat("Empty key body".into())),
    }
}

fn parse_plain_body(body: &[u8]) -> Result<Zeroizing<[u8; SEED_SIZE]>> {
    check_version(body)?;
    if body.len() != PRIVATE_BODY_LEN {
        return Err(Error::InvalidKeyFormat(format!(
            "Private key body must be {} bytes, got {}",
            PRIVATE_BODY_LEN,
            body.len()
        )));
    }

    let mut seed = Zeroizing::new([0u8; SEED_SIZE]);
    seed.copy_from_slice(&body[1..]);
    Ok(seed)
}

fn unwrap_encrypted_body(body: &[u8], password: &str) -> Result<Zeroizing<[u8; SEED_SIZE]>> {
    check_version(body)?;
    if body.len() != ENCRYPTED_BODY_LEN {
        return Err(Error::InvalidKeyFormat(format!(
            "Encrypted key body must be {} bytes, got {}",
            ENCRYPTED_BODY_LEN,
            body.len()
        )));
    }

    let (salt, rest) = body[1..].split_at(PASSWORD_SALT_SIZE);
    let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

    let mut salt_bytes = [0u8; PASSWORD_SALT_SIZE];
    salt_bytes.copy_from_slice(salt);
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    nonce_bytes.copy_from_slice(nonce);

    let key = EncryptionKey::from_bytes(derive_password_key(password, &salt_bytes)?);

    // The structure was checked above, so a tag mismatch means a wrong password
    let plaintext = Zeroizing::new(
        decrypt(&key, &Nonce::from_bytes(nonce_bytes), ciphertext, WRAPPED_SEED_AAD)
            .map_err(|_| Error::InvalidPassword)?,
    );

    let mut seed = Zeroizing::new([0u8; SEED_SIZE]);
    seed.copy_from_slice(&plaintext);
    Ok(seed)
}

/// Ed25519 signing keypair
#[derive(ZeroizeOnDrop)]
pub struct SigningKeyPair {
    #[zeroize(skip)] // ed25519_dalek::SigningKey handles its own zeroization
    secret: SigningKey,
}

impl SigningKeyPair {
    /// Generate a new random signing keypair
    pub fn generate() -> Self {
        Self {
            secret: SigningKey::generate(&mut OsRng),
        }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            secret: SigningKey::from_bytes(bytes),
        }
    }

    /// Get the public key bytes
    pub fn public_bytes(&self) -> [u8; 32] {
        self.secret.verifying_key().to_bytes()
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.secret
    }
}

/// X25519 keypair for key agreement
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKeyPair {
    #[zeroize(skip)] // x25519_dalek handles its own zeroization
    secret: StaticSecret,
    #[zeroize(skip)]
    public: X25519PublicKey,
}

impl EncryptionKeyPair {
    /// Generate a new random encryption keypair
    ///
    /// Also used for the one-shot ephemeral key of each encrypted stream.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let secret = StaticSecret::from(*bytes);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Get the public key bytes
    pub fn public_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// Perform Diffie-Hellman key exchange
    ///
    /// `a_secret × B_public == b_secret × A_public`
    pub fn diffie_hellman(&self, their_public: &[u8; 32]) -> Zeroizing<[u8; 32]> {
        let their_public = X25519PublicKey::from(*their_public);
        Zeroizing::new(self.secret.diffie_hellman(&their_public).to_bytes())
    }
}

// ============================================================================
// PUBLIC KEY
// ============================================================================

/// Public keys that can be safely shared with others
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    /// Ed25519 public key for signature verification (32 bytes)
    pub signing: [u8; 32],

    /// X25519 public key for encryption (32 bytes)
    pub encryption: [u8; 32],
}

impl PublicKey {
    /// Create a PublicKey from raw bytes
    pub fn from_bytes(signing: [u8; 32], encryption: [u8; 32]) -> Self {
        Self {
            signing,
            encryption,
        }
    }

    /// Fingerprint-derived id
    pub fn key_id(&self) -> KeyId {
        KeyId::from_bytes(compute_key_fingerprint(&self.signing, &self.encryption))
    }

    /// Serialize as an armored public key
    pub fn serialize(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(PUBLIC_BODY_LEN);
        body.push(KEY_FORMAT_VERSION);
        body.extend_from_slice(&self.signing);
        body.extend_from_slice(&self.encryption);
        armor(SerializedKeyType::PublicKey, &body)
    }

    /// Load an armored public key
    pub fn load(serialized: &[u8]) -> Result<Self> {
        let (kind, body) = dearmor(serialized)?;
        if kind != SerializedKeyType::PublicKey {
            return Err(Error::InvalidKeyFormat(format!(
                "Expected a public key, found {}",
                kind.label()
            )));
        }

        check_version(&body)?;
        if body.len() != PUBLIC_BODY_LEN {
            return Err(Error::InvalidKeyFormat(format!(
                "Public key body must be {} bytes, got {}",
                PUBLIC_BODY_LEN,
                body.len()
            )));
        }

        let mut signing = [0u8; 32];
        signing.copy_from_slice(&body[1..33]);
        let mut encryption = [0u8; 32];
        encryption.copy_from_slice(&body[33..65]);

        VerifyingKey::from_bytes(&signing)
            .map_err(|e| Error::InvalidKeyFormat(format!("Invalid signing public key: {}", e)))?;

        Ok(Self {
            signing,
            encryption,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
