//! Streaming signatures.
//!
//! The message is digested in chunk-length pieces, so signing a large file
//! never holds it in memory. The signature does not depend on the chunk
//! length: it covers the SHA-512 digest of the whole message.

use std::io::Read;

use super::read_up_to;
use crate::crypto::{sign_digest, verify_digest, KeyPair, MessageDigest, PublicKey, Signature};
use crate::error::Result;

fn digest_stream<R: Read + ?Sized>(input: &mut R, chunk_length: usize) -> Result<MessageDigest> {
    let mut digest = MessageDigest::new();

    if chunk_length == 0 {
        let mut message = Vec::new();
        input.read_to_end(&mut message)?;
        digest.update(&message);
        return Ok(digest);
    }

    loop {
        let chunk = read_up_to(input, chunk_length)?;
        if chunk.is_empty() {
            return Ok(digest);
        }
        digest.update(&chunk);
    }
}

/// Sign everything `input` yields
pub fn sign<R: Read + ?Sized>(input: &mut R, pair: &KeyPair, chunk_length: usize) -> Result<Signature> {
    let digest = digest_stream(input, chunk_length)?;
    let signature = sign_digest(&pair.signing, digest);
    tracing::debug!("Signed stream with key {}", pair.key_id());
    Ok(signature)
}

/// Check `signature` over everything `input` yields
///
/// Fails with `SignatureInvalid` when the signature does not match; read
/// failures surface as their own errors.
pub fn verify<R: Read + ?Sized>(
    input: &mut R,
    public: &PublicKey,
    signature: &Signature,
    chunk_length: usize,
) -> Result<()> {
    let digest = digest_stream(input, chunk_length)?;
    verify_digest(&public.signing, digest, signature)?;
    tracing::debug!("Verified stream signature from key {}", public.key_id());
    Ok(())
}
