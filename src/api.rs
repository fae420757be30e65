//! The public save/load surface applications embed against.
//!
//! Two layers live here: a generic, type-bound layer (`save`, `load_or_new`,
//! `load_or_fail`, `save_prebuilt_payload`, `extract_raw_payload`) for normal
//! callers who have a concrete Rust type at the call site, and a
//! digest-keyed layer underneath it for callers — namely the repair CLI —
//! who only have the type's textual name, not the type itself.
use std::path::Path;
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::HelixError;
use crate::keystore::KeyStore;
use crate::{codec, durable, envelope, fingerprint, loader};

/// Mirrors the teacher's `PackOptions`: the knobs a caller can turn on a
/// single save, all defaulted to the safe choice.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Use the portable, compiled-in global key instead of the machine key.
    pub portable: bool,
    /// Preserve the prior contents at a `.bak` sibling before overwriting.
    pub backup: bool,
    /// LZ4-compress the payload.
    pub compress: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { portable: true, backup: true, compress: true }
    }
}

fn program_keystore() -> &'static KeyStore {
    static STORE: OnceLock<KeyStore> = OnceLock::new();
    STORE.get_or_init(|| KeyStore::new(env!("CARGO_PKG_NAME")))
}

/// Serialize `value`, sign it, and durably write it to `path`.
pub fn save<T: Serialize>(value: &T, path: &Path, opts: SaveOptions) -> Result<(), HelixError> {
    let digest = fingerprint::of::<T>();
    let encoded = codec::encode(value, opts.compress)?;
    write_envelope(path, &digest, &encoded.bytes, encoded.compressed, opts.portable, opts.backup)
}

/// Write an already-serialized payload under `T`'s fingerprint, for callers
/// who encode on one thread and write on another.
pub fn save_prebuilt_payload<T: ?Sized>(
    path: &Path,
    payload_bytes: &[u8],
    portable: bool,
    backup: bool,
    is_compressed: bool,
) -> Result<(), HelixError> {
    save_prebuilt_payload_with_digest(path, &fingerprint::of::<T>(), payload_bytes, portable, backup, is_compressed)
}

/// As [`save_prebuilt_payload`], but keyed by an explicit type digest rather
/// than a compile-time generic — used by tooling that only has a type name.
pub fn save_prebuilt_payload_with_digest(
    path: &Path,
    digest: &[u8; 32],
    payload_bytes: &[u8],
    portable: bool,
    backup: bool,
    is_compressed: bool,
) -> Result<(), HelixError> {
    write_envelope(path, digest, payload_bytes, is_compressed, portable, backup)
}

fn write_envelope(
    path: &Path,
    digest: &[u8; 32],
    payload: &[u8],
    is_compressed: bool,
    portable: bool,
    backup: bool,
) -> Result<(), HelixError> {
    let key = program_keystore().select(portable)?;
    let flags = if is_compressed { envelope::FLAG_COMPRESSED } else { 0 };
    let bytes = envelope::encode(*digest, payload, flags, &key.0);
    durable::write_durable(path, &bytes, backup)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved envelope");
    Ok(())
}

/// Load `path`, falling back to its `.bak` sibling; returns `T::default()`
/// if neither path holds a usable envelope.
pub fn load_or_new<T: Default + DeserializeOwned>(path: &Path, portable: bool) -> T {
    load_or_fail_with_digest(path, &fingerprint::of::<T>(), portable)
        .ok()
        .unwrap_or_default()
}

/// Load `path`, falling back to its `.bak` sibling; surfaces the failure
/// instead of silently defaulting.
pub fn load_or_fail<T: DeserializeOwned>(path: &Path, portable: bool) -> Result<T, HelixError> {
    load_or_fail_with_digest(path, &fingerprint::of::<T>(), portable)
}

/// As [`load_or_fail`], keyed by an explicit type digest.
pub fn load_or_fail_with_digest<T: DeserializeOwned>(path: &Path, digest: &[u8; 32], portable: bool) -> Result<T, HelixError> {
    let key = program_keystore().select(portable)?;
    match loader::load_with_backup(path, digest, &key.0) {
        loader::LoadOutcome::Found(env) => Ok(codec::decode(&env.payload, env.compressed())?),
        loader::LoadOutcome::Absent => Err(HelixError::NotFound),
        loader::LoadOutcome::Rejected(e) => Err(HelixError::Rejected(e)),
    }
}

/// Recover the raw, uncompressed, still-self-describing payload bytes
/// without deserializing into `T`. When the stored envelope is uncompressed,
/// this skips MAC verification entirely and only checks structural framing
/// and the type digest — a fast path for tooling that just wants to look at
/// the bytes. Compressed envelopes always take the fully verified path,
/// since the decompression step needs the flags byte to already be trusted.
pub fn extract_raw_payload<T: ?Sized>(path: &Path, portable: bool) -> Result<Vec<u8>, HelixError> {
    extract_raw_payload_with_digest(path, &fingerprint::of::<T>(), portable)
}

pub fn extract_raw_payload_with_digest(path: &Path, digest: &[u8; 32], portable: bool) -> Result<Vec<u8>, HelixError> {
    match extract_raw_payload_at(path, digest, portable) {
        Ok(bytes) => Ok(bytes),
        Err(_) => extract_raw_payload_at(&durable::backup_path(path), digest, portable),
    }
}

/// Single-path attempt underlying [`extract_raw_payload_with_digest`]; the
/// caller retries once at the `.bak` sibling on any failure, the same
/// fallback [`loader::load_with_backup`] performs for typed loads.
fn extract_raw_payload_at(path: &Path, digest: &[u8; 32], portable: bool) -> Result<Vec<u8>, HelixError> {
    let bytes = std::fs::read(path)?;
    let header = envelope::parse_unverified(&bytes, digest)?;

    if !header.compressed() {
        return Ok(header.payload(&bytes).to_vec());
    }

    let key = program_keystore().select(portable)?;
    let decoded = envelope::decode(&bytes, digest, &key.0)?;
    Ok(codec::raw_json(&decoded.payload, true)?)
}
