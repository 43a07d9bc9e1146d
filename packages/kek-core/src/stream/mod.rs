//! # Streaming Cipher Pipeline
//!
//! Encrypts, decrypts, signs, and verifies byte streams of any size in
//! fixed-length chunks, so memory use is bounded by the chunk length rather
//! than the message length.
//!
//! ## Wire Format
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ENCRYPTED STREAM LAYOUT                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌──────────────────┐┌──────────────┐┌──────────────┐     ┌───────────┐ │
//! │  │ metadata header  ││   chunk 0    ││   chunk 1    │ ... │  chunk n  │ │
//! │  │    (49 bytes)    ││  len + 16    ││  len + 16    │     │ ≤ len + 16│ │
//! │  └──────────────────┘└──────────────┘└──────────────┘     └───────────┘ │
//! │                                                                         │
//! │  Chunks carry no length prefix. Both sides agree on the chunk length   │
//! │  out of band; only the last chunk may be short, and it is sealed with  │
//! │  a "final" flag so truncation is detected.                             │
//! │                                                                         │
//! │  Chunk length 0 seals the whole input as one final chunk.              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## State Machines
//!
//! ```text
//! Encrypt:  Start ──► EmitMetadata ──► EmitChunk* ──► Done
//! Decrypt:  Start ──► ReadMetadata ──► ResolveKey ──► OpenChunk* ──► Done
//! ```
//!
//! Both are terminal on the first error.
//!
//! ## Concurrency
//!
//! Everything here runs on the calling thread except [`StreamingBuffer`],
//! which relays bytes from one producer thread to one consumer thread.

mod buffer;
mod cipher;
mod metadata;
mod reader;
mod signature;

pub use buffer::{StreamingBuffer, DEFAULT_WAIT_TIMEOUT};
pub use cipher::{decrypt, encrypt, ChunkDecryptor, ChunkEncryptor};
pub use metadata::{extract_key_id, StreamMetadata, CURRENT_VERSION, HEADER_SIZE};
pub use reader::EncryptingReader;
pub use signature::{sign, verify};

use std::io::{ErrorKind, Read};

use crate::error::Result;

/// Chunk length used when the caller does not choose one (1 MiB)
pub const DEFAULT_CHUNK_LENGTH: usize = 1024 * 1024;

/// Fill `buf` from `reader`, stopping early only at end of input
///
/// Returns the number of bytes read.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Upper bound on the buffer reserved before any bytes arrive
const READ_RESERVE_LIMIT: usize = 64 * 1024;

/// Read up to `len` bytes, fewer only at end of input
///
/// Memory grows with the bytes actually read, so a chunk length far larger
/// than the input costs nothing extra.
pub(crate) fn read_up_to<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let limit = u64::try_from(len).unwrap_or(u64::MAX);
    let mut buf = Vec::with_capacity(len.min(READ_RESERVE_LIMIT));
    reader.take(limit).read_to_end(&mut buf)?;
    Ok(buf)
}
