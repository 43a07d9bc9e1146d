//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kek_core::crypto::KeyId;
use kek_core::provider::{KeyProvider, PasswordPrompt};
use kek_core::{CoreConfig, Error, Result};
use tempfile::TempDir;
use zeroize::Zeroizing;

/// Password prompt that records how often it is asked
#[derive(Clone, Default)]
pub struct CountingPrompt {
    password: Option<String>,
    unlocks: Arc<AtomicUsize>,
}

impl CountingPrompt {
    pub fn new(password: Option<&str>) -> Self {
        Self {
            password: password.map(String::from),
            unlocks: Arc::default(),
        }
    }

    pub fn unlocks(&self) -> usize {
        self.unlocks.load(Ordering::SeqCst)
    }
}

impl PasswordPrompt for CountingPrompt {
    fn get_password(&self, key_id: Option<&KeyId>) -> Result<Zeroizing<String>> {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
        self.password
            .clone()
            .map(Zeroizing::new)
            .ok_or_else(|| Error::PasswordRequired(format!("{:?}", key_id)))
    }

    fn create_password(&self) -> Result<Option<Zeroizing<String>>> {
        Ok(self.password.clone().map(Zeroizing::new))
    }
}

/// An isolated key directory that lives as long as the value
pub struct TestHome {
    _temp: TempDir,
    pub config: CoreConfig,
}

impl TestHome {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("temp dir");
        let config = CoreConfig::new(temp.path().join(".kek"));
        Self {
            _temp: temp,
            config,
        }
    }

    /// A fresh provider over this directory, as a new process would build it
    pub fn provider(&self, prompt: CountingPrompt) -> KeyProvider {
        self.config
            .open_provider(Box::new(prompt))
            .expect("open provider")
    }
}
