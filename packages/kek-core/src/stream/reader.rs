//! Pull-based encryption.
//!
//! Upload clients usually want something to read from rather than
//! something to write to. [`EncryptingReader`] wraps a plaintext reader and
//! yields the encrypted stream lazily, one chunk at a time.

use std::io::{self, Read};

use bytes::{Buf, Bytes};

use super::cipher::{ChunkEncryptor, ChunkSplitter};
use crate::crypto::PublicKey;
use crate::error::{Error, Result};

/// `io::Read` adapter producing `header ‖ chunk*` from plaintext
pub struct EncryptingReader<R> {
    splitter: ChunkSplitter<R>,
    encryptor: ChunkEncryptor,
    pending: Bytes,
    exhausted: bool,
}

impl<R: Read> EncryptingReader<R> {
    /// Encrypt `inner` to `recipient`
    ///
    /// Output is byte-for-byte what [`super::encrypt`] would write for the
    /// same key material.
    pub fn new(inner: R, recipient: &PublicKey, chunk_length: usize, version: u8) -> Result<Self> {
        let encryptor = ChunkEncryptor::new(recipient, version)?;
        let pending = Bytes::copy_from_slice(&encryptor.header());

        Ok(Self {
            splitter: ChunkSplitter::new(inner, chunk_length),
            encryptor,
            pending,
            exhausted: false,
        })
    }

    /// Seal the next chunk into `pending`; false once the stream is done
    fn refill(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        match self.splitter.next_chunk()? {
            Some((plaintext, is_final)) => {
                self.pending = Bytes::from(self.encryptor.seal_chunk(&plaintext, is_final)?);
                self.exhausted = is_final;
                Ok(true)
            }
            None => {
                self.exhausted = true;
                Ok(false)
            }
        }
    }
}

impl<R: Read> Read for EncryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while !self.pending.has_remaining() {
            if !self.refill().map_err(into_io)? {
                return Ok(0);
            }
        }

        let n = buf.len().min(self.pending.remaining());
        self.pending.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

fn into_io(err: Error) -> io::Error {
    match err {
        Error::StorageIo(reason) => io::Error::new(io::ErrorKind::Other, reason),
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}
