//! # helix-save — signed, snapshot-oriented binary persistence
//!
//! Format guarantees:
//! - Every envelope is self-describing: magic, version, flags, type digest,
//!   timestamp, payload length
//! - The envelope is HMAC-SHA256 signed; any single bit of tampering in the
//!   signed region is rejected before the payload is ever decoded
//! - The payload codec (`serde_json`) is additive-schema-safe: new optional
//!   fields on the saved type decode cleanly from envelopes written by an
//!   older build
//! - Writes are durable: temp file, `fsync`, atomic rename; a crash at any
//!   point leaves either the old or the new content intact, never a
//!   half-written file under the real name
//! - Loads fall back once to a `.bak` sibling before giving up
//! - The core save/load path takes no lock itself; callers needing
//!   concurrent-writer safety opt into [`pathlock::PathLock`]

pub mod api;
pub mod codec;
pub mod convenience;
pub mod durable;
pub mod envelope;
pub mod error;
pub mod fingerprint;
pub mod keystore;
pub mod loader;
pub mod pathlock;

pub use api::{extract_raw_payload, load_or_fail, load_or_new, save, save_prebuilt_payload, SaveOptions};
pub use convenience::{load_bytes_or_new, load_string_or_new, save_bytes, save_string};
pub use envelope::DecodeError;
pub use error::HelixError;
pub use keystore::{Key, KeyStore, KeyStoreError};
pub use pathlock::{PathGuard, PathLock};
