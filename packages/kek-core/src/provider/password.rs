//! # Password Prompts
//!
//! Where passwords come from is the caller's business. The core only asks,
//! and only when a key blob turns out to be encrypted.
//!
//! | Implementation | Source |
//! |----------------|--------|
//! | [`StaticPassword`] | A value fixed up front (or none) |
//! | [`EnvPassword`] | `KEK_PASSWORD`, plus `KEK_NEW_PASSWORD` for new keys |
//!
//! Interactive terminal prompts belong to the CLI layer and implement the
//! same trait.

use zeroize::Zeroizing;

use crate::crypto::KeyId;
use crate::error::{Error, Result};

/// Environment variable holding the password that unlocks existing keys
pub const PASSWORD_ENV_VAR: &str = "KEK_PASSWORD";

/// Environment variable holding the password for newly written keys
///
/// Falls back to [`PASSWORD_ENV_VAR`] when unset.
pub const NEW_PASSWORD_ENV_VAR: &str = "KEK_NEW_PASSWORD";

/// Source of passwords for encrypted private keys
pub trait PasswordPrompt: Send {
    /// Password for unlocking an existing key
    ///
    /// `key_id` is `None` when the key being unlocked is not registered yet
    /// (importing). Fails with `PasswordRequired` if none can be obtained.
    fn get_password(&self, key_id: Option<&KeyId>) -> Result<Zeroizing<String>>;

    /// Password for protecting a key about to be written
    ///
    /// `None` (or an empty string) stores the key unencrypted.
    fn create_password(&self) -> Result<Option<Zeroizing<String>>>;
}

fn password_required(key_id: Option<&KeyId>) -> Error {
    Error::PasswordRequired(
        key_id
            .map(ToString::to_string)
            .unwrap_or_else(|| "imported key".to_string()),
    )
}

/// A fixed password, or none at all
#[derive(Clone, Default)]
pub struct StaticPassword {
    password: Option<Zeroizing<String>>,
}

impl StaticPassword {
    /// Always answer with `password`
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: Some(Zeroizing::new(password.into())),
        }
    }

    /// Never have a password: encrypted keys fail with `PasswordRequired`
    /// and new keys are stored in the clear
    pub fn none() -> Self {
        Self::default()
    }

    fn non_empty(&self) -> Option<Zeroizing<String>> {
        self.password.clone().filter(|p| !p.is_empty())
    }
}

impl PasswordPrompt for StaticPassword {
    fn get_password(&self, key_id: Option<&KeyId>) -> Result<Zeroizing<String>> {
        self.non_empty().ok_or_else(|| password_required(key_id))
    }

    fn create_password(&self) -> Result<Option<Zeroizing<String>>> {
        Ok(self.non_empty())
    }
}

/// Passwords read from environment variables
///
/// Variables are read on every call, so a caller can change them between
/// operations.
#[derive(Debug, Clone)]
pub struct EnvPassword {
    unlock_var: String,
    create_var: String,
}

impl EnvPassword {
    /// Read `KEK_PASSWORD` and `KEK_NEW_PASSWORD`
    pub fn new() -> Self {
        Self::with_vars(PASSWORD_ENV_VAR, NEW_PASSWORD_ENV_VAR)
    }

    /// Read from custom variable names
    pub fn with_vars(unlock_var: impl Into<String>, create_var: impl Into<String>) -> Self {
        Self {
            unlock_var: unlock_var.into(),
            create_var: create_var.into(),
        }
    }

    fn read(var: &str) -> Option<Zeroizing<String>> {
        std::env::var(var)
            .ok()
            .map(Zeroizing::new)
            .filter(|p| !p.is_empty())
    }
}

impl Default for EnvPassword {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordPrompt for EnvPassword {
    fn get_password(&self, key_id: Option<&KeyId>) -> Result<Zeroizing<String>> {
        let password = Self::read(&self.unlock_var).ok_or_else(|| password_required(key_id))?;
        tracing::debug!("Using password from {}", self.unlock_var);
        Ok(password)
    }

    fn create_password(&self) -> Result<Option<Zeroizing<String>>> {
        Ok(Self::read(&self.create_var).or_else(|| Self::read(&self.unlock_var)))
    }
}

// ============================================================================
// TESTS
// ============================================================================
