//! # Streaming Transfers
//!
//! Glue between the cipher pipeline and an object store client that lives
//! outside this crate.
//!
//! ## Download and Decrypt
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       DOWNLOAD AND DECRYPT                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   producer thread                         calling thread                │
//! │   ───────────────                         ──────────────                │
//! │   source.fetch(&buffer)                                                 │
//! │        │ write                                                          │
//! │        ▼                                                                │
//! │   ┌─────────────────┐    read(chunk + 16)                               │
//! │   │ StreamingBuffer │ ─────────────────► stream::decrypt ──► output     │
//! │   └─────────────────┘                                                   │
//! │        ▲                                                                │
//! │        │ mark_finished (on every exit path)                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Encrypt and Upload
//!
//! The sink pulls ciphertext from an [`EncryptingReader`]; nothing is
//! encrypted ahead of what the sink has asked for.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use crate::crypto::PublicKey;
use crate::error::{Error, Result};
use crate::provider::KeyProvider;
use crate::stream::{self, EncryptingReader, StreamingBuffer};

/// Something that can deliver an object's bytes
///
/// Implemented by object storage clients. `fetch` writes the whole object
/// to `sink` and returns once it is done or has failed.
pub trait ObjectSource: Send {
    /// Write the object's bytes to `sink`
    fn fetch(&mut self, sink: &mut dyn Write) -> Result<()>;
}

/// Something that can store an object's bytes
pub trait ObjectSink {
    /// Read `body` to the end and store it
    fn upload(&mut self, body: &mut dyn Read) -> Result<()>;
}

/// Marks the buffer finished when the producer exits, however it exits
struct FinishGuard<'a>(&'a StreamingBuffer);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_finished();
    }
}

/// Fetch from `source` and decrypt while the bytes arrive
///
/// `chunk_length` must match the encrypting side and cannot be 0, since
/// the whole-buffer form needs the complete ciphertext before decrypting.
/// A failing source is reported in preference to the decrypt error it
/// causes.
///
/// Returns the number of plaintext bytes written.
pub fn download_and_decrypt<W: Write + ?Sized>(
    source: &mut dyn ObjectSource,
    provider: &mut KeyProvider,
    output: &mut W,
    chunk_length: usize,
    wait_timeout: Duration,
) -> Result<u64> {
    if chunk_length == 0 {
        return Err(Error::InvalidArgument(
            "Streaming decryption needs a non-zero chunk length".into(),
        ));
    }

    let buffer = StreamingBuffer::with_wait_timeout(wait_timeout);
    let buffer = &buffer;

    thread::scope(|scope| {
        let producer = scope.spawn(move || {
            let _finish = FinishGuard(buffer);
            let mut sink = buffer;
            source.fetch(&mut sink)
        });

        let mut reader = buffer;
        let decrypted = stream::decrypt(&mut reader, output, provider, chunk_length);

        let fetched = producer
            .join()
            .map_err(|_| Error::Internal("Download thread panicked".into()))?;

        match (fetched, decrypted) {
            (Err(e), _) => {
                tracing::warn!("Download failed: {}", e);
                Err(e)
            }
            (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(written)) => {
                tracing::info!("Downloaded and decrypted {} bytes", written);
                Ok(written)
            }
        }
    })
}

/// Encrypt `input` to `recipient` and hand the ciphertext to `sink`
pub fn encrypt_and_upload<R: Read>(
    input: R,
    recipient: &PublicKey,
    sink: &mut dyn ObjectSink,
    chunk_length: usize,
    version: u8,
) -> Result<()> {
    let mut body = EncryptingReader::new(input, recipient, chunk_length, version)?;
    sink.upload(&mut body)?;
    tracing::info!("Uploaded stream for key {}", recipient.key_id());
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::provider::StaticPassword;
    use crate::storage::{MemoryConfigStore, MemoryKeyStorage, Namespace};
    use crate::stream::CURRENT_VERSION;

    /// Delivers bytes in small pieces with pauses, optionally failing midway
    struct SlowSource {
        data: Vec<u8>,
        fail_after: Option<usize>,
    }

    impl ObjectSource for SlowSource {
        fn fetch(&mut self, sink: &mut dyn Write) -> Result<()> {
            for (i, piece) in self.data.chunks(7).enumerate() {
                if Some(i) == self.fail_after {
                    return Err(Error::Transfer("connection reset".into()));
                }
                sink.write_all(piece)?;
                if i % 4 == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct VecSink {
        stored: Vec<u8>,
    }

    impl ObjectSink for VecSink {
        fn upload(&mut self, body: &mut dyn Read) -> Result<()> {
            body.read_to_end(&mut self.stored)?;
            Ok(())
        }
    }

    fn provider_with_key() -> (KeyProvider, PublicKey) {
        let mut provider = KeyProvider::new(
            Box::new(MemoryConfigStore::new()),
            Box::new(MemoryKeyStorage::new(Namespace::Public)),
            Box::new(MemoryKeyStorage::new(Namespace::Private)),
            Box::new(StaticPassword::none()),
        )
        .unwrap();
        let pair = KeyPair::generate().unwrap();
        let public = pair.public_key();
        provider.add_key_pair(pair, None).unwrap();
        (provider, public)
    }

    fn upload(message: &[u8], public: &PublicKey, chunk_length: usize) -> Vec<u8> {
        let mut sink = VecSink::default();
        encrypt_and_upload(message, public, &mut sink, chunk_length, CURRENT_VERSION).unwrap();
        sink.stored
    }

    #[test]
    fn test_upload_then_download() {
        let (mut provider, public) = provider_with_key();
        let message: Vec<u8> = (0..500u32).map(|i| (i * 7 % 256) as u8).collect();
        let ciphertext = upload(&message, &public, 16);

        let mut source = SlowSource {
            data: ciphertext,
            fail_after: None,
        };
        let mut output = Vec::new();
        let written = download_and_decrypt(
            &mut source,
            &mut provider,
            &mut output,
            16,
            Duration::from_millis(20),
        )
        .unwrap();

        assert_eq!(written, message.len() as u64);
        assert_eq!(output, message);
    }

    #[test]
    fn test_source_failure_reported() {
        let (mut provider, public) = provider_with_key();
        let ciphertext = upload(&[42u8; 300], &public, 16);

        let mut source = SlowSource {
            data: ciphertext,
            fail_after: Some(5),
        };
        let mut output = Vec::new();
        let result = download_and_decrypt(
            &mut source,
            &mut provider,
            &mut output,
            16,
            Duration::from_millis(20),
        );

        assert!(matches!(result, Err(Error::Transfer(_))));
    }

    #[test]
    fn test_zero_chunk_length_rejected() {
        let (mut provider, _) = provider_with_key();
        let mut source = SlowSource {
            data: Vec::new(),
            fail_after: None,
        };

        assert!(matches!(
            download_and_decrypt(
                &mut source,
                &mut provider,
                &mut Vec::<u8>::new(),
                0,
                Duration::from_millis(20)
            ),
            Err(Error::InvalidArgument(_))
        ));
    }
}
