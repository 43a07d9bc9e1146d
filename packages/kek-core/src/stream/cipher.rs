//! Chunked stream encryption and decryption.
//!
//! ```text
//!   plaintext ──► ChunkSplitter ──► ChunkEncryptor ──► header ‖ chunk₀ ‖ … ‖ chunkₙ
//!                 (look-ahead)       (seal i, final?)
//!
//!   header ──► provider.resolve_key_pair(key_id) ──► ChunkDecryptor
//!   chunk frames (chunk_length + 16) ──► open i, final? ──► plaintext
//! ```
//!
//! Chunk `i` of the output depends only on chunk `i` of the input, so
//! decryption can start before the whole ciphertext has arrived. Plaintext
//! of earlier chunks is written out before later chunks are authenticated.

use std::io::{Read, Write};

use rand::rngs::OsRng;
use rand::RngCore;

use super::metadata::{check_version, StreamMetadata, HEADER_SIZE};
use super::read_up_to;
use crate::crypto::{
    derive_stream_key, ChunkCipher, EncryptionKey, EncryptionKeyPair, KeyPair, PublicKey,
    NONCE_PREFIX_SIZE, TAG_SIZE,
};
use crate::error::{Error, Result};
use crate::provider::KeyProvider;

// ============================================================================
// ENCRYPTION
// ============================================================================

/// Seals the chunks of one outgoing stream
pub struct ChunkEncryptor {
    metadata: StreamMetadata,
    cipher: ChunkCipher,
    index: u32,
    finished: bool,
}

impl ChunkEncryptor {
    /// Start a stream to `recipient` with a fresh ephemeral key
    pub fn new(recipient: &PublicKey, version: u8) -> Result<Self> {
        check_version(version)?;

        let key_id = recipient.key_id();
        let ephemeral = EncryptionKeyPair::generate();
        let shared = ephemeral.diffie_hellman(&recipient.encryption);
        let stream_key = derive_stream_key(&shared, key_id.as_bytes())?;

        let mut nonce_prefix = [0u8; NONCE_PREFIX_SIZE];
        OsRng.fill_bytes(&mut nonce_prefix);

        let metadata = StreamMetadata {
            version,
            key_id,
            ephemeral_public: ephemeral.public_bytes(),
            nonce_prefix,
        };
        let cipher = ChunkCipher::new(
            EncryptionKey::from_bytes(stream_key),
            nonce_prefix,
            &metadata.to_bytes(),
        );

        Ok(Self {
            metadata,
            cipher,
            index: 0,
            finished: false,
        })
    }

    /// Header to emit before the first chunk
    pub fn header(&self) -> [u8; HEADER_SIZE] {
        self.metadata.to_bytes()
    }

    /// Seal the next chunk
    ///
    /// No chunk may follow the one sealed with `is_final`.
    pub fn seal_chunk(&mut self, plaintext: &[u8], is_final: bool) -> Result<Vec<u8>> {
        if self.finished {
            return Err(Error::InvalidArgument(
                "Stream already has its final chunk".into(),
            ));
        }
        let sealed = self.cipher.seal(self.index, is_final, plaintext)?;
        self.advance(is_final)?;
        Ok(sealed)
    }

    fn advance(&mut self, is_final: bool) -> Result<()> {
        self.finished = is_final;
        if !is_final {
            self.index = self
                .index
                .checked_add(1)
                .ok_or_else(|| Error::InvalidArgument("Stream has too many chunks".into()))?;
        }
        Ok(())
    }
}

/// Splits a plaintext reader into chunks, flagging the last one
///
/// A full chunk is only known to be last once the next read comes back
/// empty, so one chunk is held in reserve.
pub(crate) struct ChunkSplitter<R> {
    inner: R,
    chunk_length: usize,
    next: Option<Vec<u8>>,
    done: bool,
}

impl<R: Read> ChunkSplitter<R> {
    /// `chunk_length` 0 yields the whole input as a single chunk
    pub(crate) fn new(inner: R, chunk_length: usize) -> Self {
        Self {
            inner,
            chunk_length,
            next: None,
            done: false,
        }
    }

    /// Next `(plaintext, is_final)`, or `None` after the final chunk
    ///
    /// Empty input yields one empty final chunk.
    pub(crate) fn next_chunk(&mut self) -> Result<Option<(Vec<u8>, bool)>> {
        if self.done {
            return Ok(None);
        }

        if self.chunk_length == 0 {
            let mut all = Vec::new();
            self.inner.read_to_end(&mut all)?;
            self.done = true;
            return Ok(Some((all, true)));
        }

        let current = match self.next.take() {
            Some(chunk) => chunk,
            None => self.read_chunk()?,
        };

        let is_final = if current.len() < self.chunk_length {
            true
        } else {
            let next = self.read_chunk()?;
            if next.is_empty() {
                true
            } else {
                self.next = Some(next);
                false
            }
        };

        self.done = is_final;
        Ok(Some((current, is_final)))
    }

    fn read_chunk(&mut self) -> Result<Vec<u8>> {
        read_up_to(&mut self.inner, self.chunk_length)
    }
}

/// Encrypt `input` to `recipient`, writing `header ‖ chunks` to `output`
///
/// Returns the number of bytes written.
pub fn encrypt<R, W>(
    input: &mut R,
    output: &mut W,
    recipient: &PublicKey,
    chunk_length: usize,
    version: u8,
) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut encryptor = ChunkEncryptor::new(recipient, version)?;
    let mut splitter = ChunkSplitter::new(input, chunk_length);

    output.write_all(&encryptor.header())?;
    let mut written = HEADER_SIZE as u64;
    let mut chunks = 0u32;

    while let Some((plaintext, is_final)) = splitter.next_chunk()? {
        let sealed = encryptor.seal_chunk(&plaintext, is_final)?;
        output.write_all(&sealed)?;
        written += sealed.len() as u64;
        chunks += 1;
    }
    output.flush()?;

    tracing::debug!(
        "Encrypted {} chunks ({} bytes) for key {}",
        chunks,
        written,
        recipient.key_id()
    );
    Ok(written)
}

// ============================================================================
// DECRYPTION
// ============================================================================

/// Opens the chunks of one incoming stream
pub struct ChunkDecryptor {
    cipher: ChunkCipher,
    index: u32,
    finished: bool,
}

impl ChunkDecryptor {
    /// Recover the stream key with the recipient's key pair
    pub fn new(metadata: &StreamMetadata, pair: &KeyPair) -> Result<Self> {
        check_version(metadata.version)?;
        if pair.key_id() != metadata.key_id {
            return Err(Error::InvalidArgument(format!(
                "Stream is for key {}, not {}",
                metadata.key_id,
                pair.key_id()
            )));
        }

        let shared = pair.encryption.diffie_hellman(&metadata.ephemeral_public);
        let stream_key = derive_stream_key(&shared, metadata.key_id.as_bytes())?;
        let cipher = ChunkCipher::new(
            EncryptionKey::from_bytes(stream_key),
            metadata.nonce_prefix,
            &metadata.to_bytes(),
        );

        Ok(Self {
            cipher,
            index: 0,
            finished: false,
        })
    }

    /// Open the next chunk
    pub fn open_chunk(&mut self, sealed: &[u8], is_final: bool) -> Result<Vec<u8>> {
        if self.finished {
            return Err(Error::InvalidStream("Data after the final chunk".into()));
        }
        let plaintext = self.cipher.open(self.index, is_final, sealed)?;
        self.finished = is_final;
        if !is_final {
            self.index = self
                .index
                .checked_add(1)
                .ok_or_else(|| Error::InvalidStream("Stream has too many chunks".into()))?;
        }
        Ok(plaintext)
    }

    /// Open a full-length frame that turned out to be the last one read
    ///
    /// A stream cut exactly at a chunk boundary ends on a chunk that was
    /// sealed as non-final; that is reported as truncation.
    fn open_last_frame(&mut self, sealed: &[u8]) -> Result<Vec<u8>> {
        match self.cipher.open(self.index, true, sealed) {
            Ok(plaintext) => {
                self.finished = true;
                Ok(plaintext)
            }
            Err(Error::DecryptionFailed(reason)) => {
                if self.cipher.open(self.index, false, sealed).is_ok() {
                    Err(Error::InvalidStream("Stream ends before its final chunk".into()))
                } else {
                    Err(Error::DecryptionFailed(reason))
                }
            }
            Err(e) => Err(e),
        }
    }
}

/// Decrypt a stream produced by [`encrypt`], writing plaintext to `output`
///
/// The recipient key is resolved through `provider` from the stream
/// header. `chunk_length` must match the one used to encrypt.
///
/// Returns the number of plaintext bytes written.
pub fn decrypt<R, W>(
    input: &mut R,
    output: &mut W,
    provider: &mut KeyProvider,
    chunk_length: usize,
) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let metadata = StreamMetadata::read_from(input)?;
    let pair = provider.resolve_key_pair(Some(&metadata.key_id))?;
    let mut decryptor = ChunkDecryptor::new(&metadata, &pair)?;

    let written = if chunk_length == 0 {
        let mut sealed = Vec::new();
        input.read_to_end(&mut sealed)?;
        let plaintext = decryptor.open_chunk(&sealed, true)?;
        output.write_all(&plaintext)?;
        plaintext.len() as u64
    } else {
        decrypt_frames(input, output, &mut decryptor, chunk_length)?
    };
    output.flush()?;

    tracing::debug!(
        "Decrypted {} bytes with key {}",
        written,
        metadata.key_id
    );
    Ok(written)
}

fn decrypt_frames<R, W>(
    input: &mut R,
    output: &mut W,
    decryptor: &mut ChunkDecryptor,
    chunk_length: usize,
) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let frame_length = chunk_length
        .checked_add(TAG_SIZE)
        .ok_or_else(|| Error::InvalidArgument("Chunk length too large".into()))?;
    let mut current = read_up_to(input, frame_length)?;
    if current.is_empty() {
        return Err(Error::InvalidStream("Stream has no chunks".into()));
    }

    let mut written = 0u64;
    loop {
        if current.len() < frame_length {
            let plaintext = decryptor.open_chunk(&current, true)?;
            output.write_all(&plaintext)?;
            written += plaintext.len() as u64;
            return Ok(written);
        }

        let next = read_up_to(input, frame_length)?;
        if next.is_empty() {
            let plaintext = decryptor.open_last_frame(&current)?;
            output.write_all(&plaintext)?;
            written += plaintext.len() as u64;
            return Ok(written);
        }

        let plaintext = decryptor.open_chunk(&current, false)?;
        output.write_all(&plaintext)?;
        written += plaintext.len() as u64;
        current = next;
    }
}

// ============================================================================
// TESTS
// ============================================================================
