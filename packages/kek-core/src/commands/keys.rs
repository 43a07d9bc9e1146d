//! Key management commands: generate, import, export, delete, list.

use std::io::Write;

use zeroize::Zeroizing;

use crate::crypto::{classify, KeyId, KeyPair, PublicKey, SerializedKeyType};
use crate::error::Result;
use crate::provider::KeyProvider;
use crate::storage::Namespace;

/// Where the password for a key operation comes from
fn choose_password(
    provider: &KeyProvider,
    prompt_password: bool,
    given: &Option<Zeroizing<String>>,
    creating: bool,
) -> Result<Option<Zeroizing<String>>> {
    let password = if !prompt_password {
        given.clone()
    } else if creating {
        provider.prompt().create_password()?
    } else {
        Some(provider.prompt().get_password(None)?)
    };
    Ok(password.filter(|p| !p.is_empty()))
}

// ============================================================================
// GENERATE
// ============================================================================

/// Options for [`generate`]
#[derive(Clone)]
pub struct GenerateContext {
    /// Password used when `prompt_password` is false
    pub password: Option<Zeroizing<String>>,
    /// Ask the prompt for a new password instead of using `password`
    pub prompt_password: bool,
    /// Store the key; otherwise write the serialized private key to the sink
    pub save: bool,
}

impl Default for GenerateContext {
    fn default() -> Self {
        Self {
            password: None,
            prompt_password: true,
            save: true,
        }
    }
}

/// Create a new key pair
///
/// When saved, the new id is written to `out` and becomes the default if
/// there was none.
pub fn generate(provider: &mut KeyProvider, ctx: GenerateContext, out: &mut dyn Write) -> Result<()> {
    let password = choose_password(provider, ctx.prompt_password, &ctx.password, true)?;
    let pair = KeyPair::generate()?;
    let password = password.as_deref().map(String::as_str);

    if ctx.save {
        let id = provider.add_key_pair(pair, password)?;
        writeln!(out, "{}", id)?;
    } else {
        out.write_all(&pair.serialize(password)?)?;
    }
    Ok(())
}

// ============================================================================
// IMPORT
// ============================================================================

/// Options for [`import`]
#[derive(Clone)]
pub struct ImportContext {
    /// Serialized keys, public or private
    pub blobs: Vec<Vec<u8>>,
    /// Password for encrypted private keys when `prompt_password` is false
    pub password: Option<Zeroizing<String>>,
    /// Ask the prompt instead of using `password`
    pub prompt_password: bool,
}

/// Register serialized keys
///
/// Private keys are stored under the password they arrived with (none for
/// plain keys) and also registered as public keys. The first private key
/// imported into an empty keyring becomes the default. Each imported id is
/// written to `out`.
pub fn import(provider: &mut KeyProvider, ctx: ImportContext, out: &mut dyn Write) -> Result<()> {
    for blob in &ctx.blobs {
        let id = match classify(blob)? {
            SerializedKeyType::PublicKey => provider.add_public_key(PublicKey::load(blob)?)?,
            SerializedKeyType::PrivateKey => provider.add_key_pair(KeyPair::load(blob, None)?, None)?,
            SerializedKeyType::EncryptedPrivateKey => {
                let password =
                    choose_password(provider, ctx.prompt_password, &ctx.password, false)?;
                let password = password.as_deref().map(String::as_str);
                provider.add_key_pair(KeyPair::load(blob, password)?, password)?
            }
        };
        writeln!(out, "{}", id)?;
    }
    Ok(())
}

// ============================================================================
// EXPORT
// ============================================================================

/// Options for [`export`]
#[derive(Clone)]
pub struct ExportContext {
    /// Key to export; the default key when `None`
    pub key_id: Option<KeyId>,
    /// Export the public key instead of the private key
    pub public: bool,
    /// Write the private key exactly as stored, without unlocking it
    pub raw: bool,
    /// Password for the exported private key when `prompt_password` is false
    pub password: Option<Zeroizing<String>>,
    /// Ask the prompt for the export password instead of using `password`
    pub prompt_password: bool,
}

impl Default for ExportContext {
    fn default() -> Self {
        Self {
            key_id: None,
            public: false,
            raw: false,
            password: None,
            prompt_password: true,
        }
    }
}

/// Write a serialized key to `out`
///
/// Public export works for any registered id; an id known only as a
/// private key has its public half derived. Private export either copies
/// the stored bytes (`raw`) or unlocks the key and re-serializes it under
/// a new password.
pub fn export(provider: &mut KeyProvider, ctx: ExportContext, out: &mut dyn Write) -> Result<()> {
    if ctx.public {
        let public = provider.resolve_public_key(ctx.key_id.as_ref())?;
        out.write_all(&public.serialize())?;
        return Ok(());
    }

    let id = provider.resolve_id(ctx.key_id.as_ref())?;
    if ctx.raw {
        out.write_all(&provider.read_private_key_raw(&id)?)?;
        return Ok(());
    }

    let pair = provider.resolve_key_pair(Some(&id))?;
    let password = choose_password(provider, ctx.prompt_password, &ctx.password, true)?;
    let serialized = Zeroizing::new(pair.serialize(password.as_deref().map(String::as_str))?);
    out.write_all(&serialized)?;
    Ok(())
}

// ============================================================================
// DELETE
// ============================================================================

/// Options for [`delete`]
#[derive(Debug, Clone, Default)]
pub struct DeleteContext {
    /// Keys to remove
    pub key_ids: Vec<KeyId>,
    /// Keep the public half of each key
    pub keep_public: bool,
}

/// Remove keys from storage and the configuration
///
/// Ids that are not registered are skipped.
pub fn delete(provider: &mut KeyProvider, ctx: DeleteContext) -> Result<()> {
    for id in &ctx.key_ids {
        let removed_private = provider.remove_private_key(id)?;
        let removed_public = !ctx.keep_public && provider.remove_public_key(id)?;
        if !removed_private && !removed_public {
            tracing::debug!("Nothing to delete for key {}", id);
        }
    }
    Ok(())
}

// ============================================================================
// LIST
// ============================================================================

/// Describe the keyring
///
/// ```text
/// default key: 6a50d96f9128fe1f
/// private keys:
///   6a50d96f9128fe1f
/// public keys:
///   0c1f5e3a77b2d410 (missing key file)
///   6a50d96f9128fe1f
///   93d0b7c2e8a41f55 (not registered)
/// ```
pub fn list(provider: &KeyProvider, out: &mut dyn Write) -> Result<()> {
    let config = provider.config();

    match &config.default {
        Some(id) => writeln!(out, "default key: {}", id)?,
        None => writeln!(out, "default key: null")?,
    }

    for (title, namespace, ids) in [
        ("private keys:", Namespace::Private, &config.private),
        ("public keys:", Namespace::Public, &config.public),
    ] {
        let orphans = provider.unregistered_blobs(namespace)?;

        writeln!(out, "{}", title)?;
        if ids.is_empty() && orphans.is_empty() {
            writeln!(out, "  no keys")?;
        }
        for id in ids {
            if provider.has_blob(namespace, id) {
                writeln!(out, "  {}", id)?;
            } else {
                writeln!(out, "  {} (missing key file)", id)?;
            }
        }
        for id in orphans {
            writeln!(out, "  {} (not registered)", id)?;
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
