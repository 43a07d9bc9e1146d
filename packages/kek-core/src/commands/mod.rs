//! # Command Handlers
//!
//! The operations a front end (the `kek` CLI) invokes, one function per
//! command, each taking a plain-data context.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         COMMAND SURFACE                                 │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   Key management              Data                                      │
//! │   ──────────────              ────                                      │
//! │   generate(ctx, out)          encrypt(ctx)                              │
//! │   import(ctx, out)            decrypt(ctx)                              │
//! │   export(ctx, out)            sign(ctx)                                 │
//! │   delete(ctx)                 verify(ctx)                               │
//! │   list(out)                                                             │
//! │                                                                         │
//! │   All of them: &mut KeyProvider in, Result<()> out.                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handlers never print. Anything meant for the user goes to the injected
//! writer, and failures come back as [`crate::Error`] for the caller to
//! report and turn into an exit status.

mod keys;
mod streams;

pub use keys::{
    delete, export, generate, import, list, DeleteContext, ExportContext, GenerateContext,
    ImportContext,
};
pub use streams::{
    decrypt, encrypt, sign, verify, DecryptContext, EncryptContext, SignContext, VerifyContext,
};
