//! Data commands: encrypt, decrypt, sign, verify.
//!
//! Each context carries its own input and output streams.

use std::io::{Read, Write};

use crate::crypto::{KeyId, Signature};
use crate::error::Result;
use crate::provider::KeyProvider;
use crate::stream::{self, CURRENT_VERSION, DEFAULT_CHUNK_LENGTH};

/// Options for [`encrypt`]
pub struct EncryptContext<'a> {
    /// Plaintext
    pub input: &'a mut dyn Read,
    /// Receives the encrypted stream
    pub output: &'a mut dyn Write,
    /// Recipient; the default key when `None`
    pub key_id: Option<KeyId>,
    /// Plaintext bytes per chunk; 0 encrypts the input as one piece
    pub chunk_length: usize,
    /// Algorithm version
    pub version: u8,
}

impl<'a> EncryptContext<'a> {
    /// Encrypt to the default key with default chunking
    pub fn new(input: &'a mut dyn Read, output: &'a mut dyn Write) -> Self {
        Self {
            input,
            output,
            key_id: None,
            chunk_length: DEFAULT_CHUNK_LENGTH,
            version: CURRENT_VERSION,
        }
    }
}

/// Encrypt `ctx.input` to a registered public key
///
/// The recipient may be registered as a public key or only as a private
/// key; in the second case the private key is unlocked to derive it.
pub fn encrypt(provider: &mut KeyProvider, ctx: EncryptContext<'_>) -> Result<()> {
    let recipient = provider.resolve_public_key(ctx.key_id.as_ref())?;
    stream::encrypt(ctx.input, ctx.output, &recipient, ctx.chunk_length, ctx.version)?;
    Ok(())
}

/// Options for [`decrypt`]
pub struct DecryptContext<'a> {
    /// Encrypted stream
    pub input: &'a mut dyn Read,
    /// Receives the plaintext
    pub output: &'a mut dyn Write,
    /// Chunk length the stream was encrypted with
    pub chunk_length: usize,
}

impl<'a> DecryptContext<'a> {
    /// Decrypt with default chunking
    pub fn new(input: &'a mut dyn Read, output: &'a mut dyn Write) -> Self {
        Self {
            input,
            output,
            chunk_length: DEFAULT_CHUNK_LENGTH,
        }
    }
}

/// Decrypt `ctx.input` with the private key its header names
pub fn decrypt(provider: &mut KeyProvider, ctx: DecryptContext<'_>) -> Result<()> {
    stream::decrypt(ctx.input, ctx.output, provider, ctx.chunk_length)?;
    Ok(())
}

/// Options for [`sign`]
pub struct SignContext<'a> {
    /// Message to sign
    pub input: &'a mut dyn Read,
    /// Receives the 64-byte signature
    pub output: &'a mut dyn Write,
    /// Signing key; the default key when `None`
    pub key_id: Option<KeyId>,
    /// Bytes digested per read; 0 reads the message in one piece
    pub chunk_length: usize,
}

impl<'a> SignContext<'a> {
    /// Sign with the default key and default chunking
    pub fn new(input: &'a mut dyn Read, output: &'a mut dyn Write) -> Self {
        Self {
            input,
            output,
            key_id: None,
            chunk_length: DEFAULT_CHUNK_LENGTH,
        }
    }
}

/// Sign `ctx.input`, writing the raw signature to `ctx.output`
pub fn sign(provider: &mut KeyProvider, ctx: SignContext<'_>) -> Result<()> {
    let pair = provider.resolve_key_pair(ctx.key_id.as_ref())?;
    let signature = stream::sign(ctx.input, &pair, ctx.chunk_length)?;
    ctx.output.write_all(signature.as_bytes())?;
    ctx.output.flush()?;
    Ok(())
}

/// Options for [`verify`]
pub struct VerifyContext<'a> {
    /// Raw signature bytes
    pub signature: &'a mut dyn Read,
    /// The signed message
    pub original: &'a mut dyn Read,
    /// Key that signed; the default key when `None`
    pub key_id: Option<KeyId>,
    /// Bytes digested per read; 0 reads the message in one piece
    pub chunk_length: usize,
}

impl<'a> VerifyContext<'a> {
    /// Verify against the default key with default chunking
    pub fn new(signature: &'a mut dyn Read, original: &'a mut dyn Read) -> Self {
        Self {
            signature,
            original,
            key_id: None,
            chunk_length: DEFAULT_CHUNK_LENGTH,
        }
    }
}

/// Check a signature over `ctx.original`
///
/// Fails with `SignatureInvalid` when it does not match.
pub fn verify(provider: &mut KeyProvider, ctx: VerifyContext<'_>) -> Result<()> {
    let public = provider.resolve_public_key(ctx.key_id.as_ref())?;

    let mut raw = Vec::new();
    ctx.signature.read_to_end(&mut raw)?;
    let signature = Signature::from_slice(&raw)?;

    stream::verify(ctx.original, &public, &signature, ctx.chunk_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::error::Error;
    use crate::provider::StaticPassword;
    use crate::storage::{MemoryConfigStore, MemoryKeyStorage, Namespace};

    fn provider() -> KeyProvider {
        KeyProvider::new(
            Box::new(MemoryConfigStore::new()),
            Box::new(MemoryKeyStorage::new(Namespace::Public)),
            Box::new(MemoryKeyStorage::new(Namespace::Private)),
            Box::new(StaticPassword::none()),
        )
        .unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_default_key() {
        let mut provider = provider();
        provider.add_key_pair(KeyPair::generate().unwrap(), None).unwrap();

        let mut input: &[u8] = b"hello world";
        let mut ciphertext = Vec::new();
        let ctx = EncryptContext {
            chunk_length: 4,
            ..EncryptContext::new(&mut input, &mut ciphertext)
        };
        encrypt(&mut provider, ctx).unwrap();

        let mut encrypted: &[u8] = &ciphertext;
        let mut plaintext = Vec::new();
        let ctx = DecryptContext {
            chunk_length: 4,
            ..DecryptContext::new(&mut encrypted, &mut plaintext)
        };
        decrypt(&mut provider, ctx).unwrap();

        assert_eq!(plaintext, b"hello world");
    }

    #[test]
    fn test_encrypt_without_keys() {
        let mut provider = provider();
        let mut input: &[u8] = b"data";
        let mut out = Vec::new();

        assert!(matches!(
            encrypt(&mut provider, EncryptContext::new(&mut input, &mut out)),
            Err(Error::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_sign_verify() {
        let mut provider = provider();
        provider.add_key_pair(KeyPair::generate().unwrap(), None).unwrap();

        let mut message: &[u8] = b"signed message";
        let mut signature = Vec::new();
        sign(&mut provider, SignContext::new(&mut message, &mut signature)).unwrap();
        assert_eq!(signature.len(), 64);

        let mut sig: &[u8] = &signature;
        let mut original: &[u8] = b"signed message";
        verify(&mut provider, VerifyContext::new(&mut sig, &mut original)).unwrap();

        let mut sig: &[u8] = &signature;
        let mut tampered: &[u8] = b"signed massage";
        assert!(matches!(
            verify(&mut provider, VerifyContext::new(&mut sig, &mut tampered)),
            Err(Error::SignatureInvalid)
        ));

        let mut short: &[u8] = &signature[..10];
        let mut original: &[u8] = b"signed message";
        assert!(matches!(
            verify(&mut provider, VerifyContext::new(&mut short, &mut original)),
            Err(Error::SignatureInvalid)
        ));
    }
}
