//! Stream metadata header.
//!
//! ```text
//! ┌─────────┬──────────────┬───────────────────────┬──────────────┐
//! │ version │    key id    │ ephemeral X25519 pub  │ nonce prefix │
//! │  1 byte │   8 bytes    │       32 bytes        │   8 bytes    │
//! └─────────┴──────────────┴───────────────────────┴──────────────┘
//! ```
//!
//! The key id sits at a fixed offset so a reader can learn which private
//! key it needs before touching anything else.

use std::io::Read;

use super::read_full;
use crate::crypto::{KeyId, KEY_ID_SIZE, NONCE_PREFIX_SIZE, PUBLIC_KEY_SIZE};
use crate::error::{Error, Result};

/// The only algorithm version in existence
pub const CURRENT_VERSION: u8 = 1;

/// Encoded header length in bytes
pub const HEADER_SIZE: usize = 1 + KEY_ID_SIZE + PUBLIC_KEY_SIZE + NONCE_PREFIX_SIZE;

const KEY_ID_OFFSET: usize = 1;
const EPHEMERAL_OFFSET: usize = KEY_ID_OFFSET + KEY_ID_SIZE;
const NONCE_PREFIX_OFFSET: usize = EPHEMERAL_OFFSET + PUBLIC_KEY_SIZE;

/// Leading bytes of every encrypted stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    /// Algorithm version that produced the stream
    pub version: u8,
    /// Recipient key id
    pub key_id: KeyId,
    /// Sender's one-time X25519 public key
    pub ephemeral_public: [u8; PUBLIC_KEY_SIZE],
    /// Per-stream nonce prefix; chunk nonces append the chunk index
    pub nonce_prefix: [u8; NONCE_PREFIX_SIZE],
}

impl StreamMetadata {
    /// Encode the header
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = self.version;
        bytes[KEY_ID_OFFSET..EPHEMERAL_OFFSET].copy_from_slice(self.key_id.as_bytes());
        bytes[EPHEMERAL_OFFSET..NONCE_PREFIX_OFFSET].copy_from_slice(&self.ephemeral_public);
        bytes[NONCE_PREFIX_OFFSET..].copy_from_slice(&self.nonce_prefix);
        bytes
    }

    /// Decode a header from the start of `bytes`
    ///
    /// Trailing bytes (the chunks) are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::InvalidStream(format!(
                "Stream header needs {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        check_version(bytes[0])?;

        let mut key_id = [0u8; KEY_ID_SIZE];
        key_id.copy_from_slice(&bytes[KEY_ID_OFFSET..EPHEMERAL_OFFSET]);
        let mut ephemeral_public = [0u8; PUBLIC_KEY_SIZE];
        ephemeral_public.copy_from_slice(&bytes[EPHEMERAL_OFFSET..NONCE_PREFIX_OFFSET]);
        let mut nonce_prefix = [0u8; NONCE_PREFIX_SIZE];
        nonce_prefix.copy_from_slice(&bytes[NONCE_PREFIX_OFFSET..HEADER_SIZE]);

        Ok(Self {
            version: bytes[0],
            key_id: KeyId::from_bytes(key_id),
            ephemeral_public,
            nonce_prefix,
        })
    }

    /// Read and decode exactly one header from `reader`
    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        let n = read_full(reader, &mut bytes)?;
        Self::from_bytes(&bytes[..n])
    }
}

/// Key id of the recipient, read from the leading bytes of a stream
pub fn extract_key_id(bytes: &[u8]) -> Result<KeyId> {
    if bytes.len() < EPHEMERAL_OFFSET {
        return Err(Error::InvalidStream(
            "Stream too short to contain a key id".into(),
        ));
    }
    check_version(bytes[0])?;

    let mut key_id = [0u8; KEY_ID_SIZE];
    key_id.copy_from_slice(&bytes[KEY_ID_OFFSET..EPHEMERAL_OFFSET]);
    Ok(KeyId::from_bytes(key_id))
}

pub(crate) fn check_version(version: u8) -> Result<()> {
    if version == CURRENT_VERSION {
        Ok(())
    } else {
        Err(Error::UnsupportedVersion(version))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StreamMetadata {
        StreamMetadata {
            version: CURRENT_VERSION,
            key_id: KeyId::from_bytes([0x6a, 0x50, 0xd9, 0x6f, 0x91, 0x28, 0xfe, 0x1f]),
            ephemeral_public: [7u8; PUBLIC_KEY_SIZE],
            nonce_prefix: [3u8; NONCE_PREFIX_SIZE],
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample().to_bytes();

        assert_eq!(HEADER_SIZE, 49);
        assert_eq!(bytes[0], 1);
        assert_eq!(hex::encode(&bytes[1..9]), "6a50d96f9128fe1f");
        assert_eq!(&bytes[41..], &[3u8; 8]);
        assert_eq!(StreamMetadata::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_read_from_leaves_chunks_unread() {
        let mut stream = sample().to_bytes().to_vec();
        stream.extend_from_slice(b"chunk data");
        let mut reader = stream.as_slice();

        let metadata = StreamMetadata::read_from(&mut reader).unwrap();

        assert_eq!(metadata, sample());
        assert_eq!(reader, b"chunk data");
    }

    #[test]
    fn test_extract_key_id() {
        let bytes = sample().to_bytes();
        assert_eq!(extract_key_id(&bytes[..9]).unwrap(), sample().key_id);
        assert!(matches!(
            extract_key_id(&bytes[..5]),
            Err(Error::InvalidStream(_))
        ));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = sample().to_bytes();
        assert!(matches!(
            StreamMetadata::read_from(&mut &bytes[..20]),
            Err(Error::InvalidStream(_))
        ));
    }

    #[test]
    fn test_unknown_version() {
        let mut bytes = sample().to_bytes();
        bytes[0] = 2;

        assert!(matches!(
            StreamMetadata::from_bytes(&bytes),
            Err(Error::UnsupportedVersion(2))
        ));
        assert!(matches!(
            extract_key_id(&bytes),
            Err(Error::UnsupportedVersion(2))
        ));
    }
}
