//! End-to-end keyring scenarios over a real key directory.

mod common;

use std::fs;

use common::{CountingPrompt, TestHome};
use kek_core::commands::{
    self, DecryptContext, DeleteContext, EncryptContext, GenerateContext, SignContext,
    VerifyContext,
};
use kek_core::crypto::KeyId;
use kek_core::storage::{ConfigStore, JsonConfigStore, Namespace};
use kek_core::Error;
use zeroize::Zeroizing;

fn generate(home: &TestHome, password: Option<&str>) -> KeyId {
    let mut provider = home.provider(CountingPrompt::new(None));
    let mut out = Vec::new();
    let ctx = GenerateContext {
        password: password.map(|p| Zeroizing::new(p.to_string())),
        prompt_password: false,
        save: true,
    };
    commands::generate(&mut provider, ctx, &mut out).unwrap();
    KeyId::parse(String::from_utf8(out).unwrap().trim()).unwrap()
}

fn encrypt(home: &TestHome, message: &[u8], chunk_length: usize) -> Vec<u8> {
    let mut provider = home.provider(CountingPrompt::new(None));
    let mut input = message;
    let mut ciphertext = Vec::new();
    let ctx = EncryptContext {
        chunk_length,
        ..EncryptContext::new(&mut input, &mut ciphertext)
    };
    commands::encrypt(&mut provider, ctx).unwrap();
    ciphertext
}

#[test]
fn test_hello_world_chunk_length_four() {
    let home = TestHome::new();
    generate(&home, None);

    let ciphertext = encrypt(&home, b"hello world", 4);

    let mut provider = home.provider(CountingPrompt::new(None));
    let mut input = ciphertext.as_slice();
    let mut plaintext = Vec::new();
    let ctx = DecryptContext {
        chunk_length: 4,
        ..DecryptContext::new(&mut input, &mut plaintext)
    };
    commands::decrypt(&mut provider, ctx).unwrap();

    assert_eq!(plaintext, b"hello world");
}

#[test]
fn test_wrong_password_is_decode_error() {
    let home = TestHome::new();
    generate(&home, Some("correct horse"));

    // Encrypting only needs the public key, so no password is involved
    let ciphertext = encrypt(&home, b"secret", 4);

    let mut provider = home.provider(CountingPrompt::new(Some("battery staple")));
    let mut input = ciphertext.as_slice();
    let mut plaintext = Vec::new();
    let ctx = DecryptContext {
        chunk_length: 4,
        ..DecryptContext::new(&mut input, &mut plaintext)
    };
    let err = commands::decrypt(&mut provider, ctx).unwrap_err();

    assert!(matches!(err, Error::InvalidPassword));
    assert!(!err.is_not_found());
    assert!(plaintext.is_empty());
}

#[test]
fn test_prompted_once_per_provider() {
    let home = TestHome::new();
    generate(&home, Some("pw"));

    let prompt = CountingPrompt::new(Some("pw"));
    let mut provider = home.provider(prompt.clone());

    for message in [&b"first"[..], &b"second"[..]] {
        let mut input = message;
        let mut signature = Vec::new();
        commands::sign(&mut provider, SignContext::new(&mut input, &mut signature)).unwrap();

        let mut sig = signature.as_slice();
        let mut original = message;
        commands::verify(&mut provider, VerifyContext::new(&mut sig, &mut original)).unwrap();
    }

    assert_eq!(prompt.unlocks(), 1);
}

#[test]
fn test_removing_only_key_clears_default() {
    let home = TestHome::new();
    let id = generate(&home, None);

    let mut provider = home.provider(CountingPrompt::new(None));
    commands::delete(
        &mut provider,
        DeleteContext {
            key_ids: vec![id],
            keep_public: false,
        },
    )
    .unwrap();

    let record = JsonConfigStore::new(home.config.config_path()).load().unwrap();
    assert!(record.private.is_empty());
    assert!(record.public.is_empty());
    assert_eq!(record.default, None);
    assert!(!home.config.config_dir.join(format!("{}.kek", id)).exists());
}

#[test]
fn test_removing_default_elects_another() {
    let home = TestHome::new();
    let first = generate(&home, None);
    let second = generate(&home, None);
    let third = generate(&home, None);

    let mut provider = home.provider(CountingPrompt::new(None));
    assert_eq!(provider.config().default, Some(first));
    provider.remove_private_key(&first).unwrap();

    let record = JsonConfigStore::new(home.config.config_path()).load().unwrap();
    let default = record.default.unwrap();
    assert!(default == second || default == third);
    assert!(record.private.contains(&default));
}

#[test]
fn test_config_file_format() {
    let home = TestHome::new();
    let id = generate(&home, None);

    let text = fs::read_to_string(home.config.config_path()).unwrap();
    assert_eq!(
        text,
        format!(
            "{{\n  \"default\": \"{id}\",\n  \"private\": [\n    \"{id}\"\n  ],\n  \"public\": [\n    \"{id}\"\n  ]\n}}\n"
        )
    );
}

#[test]
fn test_corrupt_config_is_distinguishable() {
    let home = TestHome::new();
    generate(&home, None);
    fs::write(home.config.config_path(), "{\"default\": 7}").unwrap();

    let result = home.config.open_provider(Box::new(CountingPrompt::new(None)));
    assert!(matches!(result, Err(Error::ConfigCorrupt(_))));
}

#[test]
fn test_deleted_blob_reported_as_drift() {
    let home = TestHome::new();
    let id = generate(&home, None);
    fs::remove_file(home.config.config_dir.join(format!("{}.kek", id))).unwrap();

    let mut provider = home.provider(CountingPrompt::new(None));
    let err = provider.resolve_key_pair(None).err().unwrap();
    assert!(matches!(
        err,
        Error::KeyFileMissing {
            namespace: Namespace::Private,
            ..
        }
    ));

    let mut listing = Vec::new();
    commands::list(&provider, &mut listing).unwrap();
    assert!(String::from_utf8(listing)
        .unwrap()
        .contains(&format!("  {} (missing key file)", id)));
}
