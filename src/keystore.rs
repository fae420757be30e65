//! KeyStore — provisions the two HMAC keys envelopes are signed with.
//!
//! A **machine key** is 32 random bytes generated on first use and persisted
//! under the caller's user-local application-data directory; it binds saved
//! state to the machine it was created on (the file does not travel if the
//! data directory isn't copied along with it). A **global key** is derived
//! from constants compiled into the binary, so any installation of the same
//! build can read the envelope — the "portable" choice, for state meant to
//! travel with the application rather than the machine.
use std::path::PathBuf;
use std::sync::OnceLock;

use directories::ProjectDirs;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::durable::{self, CreateOutcome};

pub const KEY_LEN: usize = 32;

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key(pub [u8; KEY_LEN]);

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("could not resolve a user-local application data directory")]
    NoAppDataDir,
    #[error("machine key file has unexpected length {0} (expected {KEY_LEN})")]
    MalformedKeyFile(usize),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compiled-in global key material. Four unrelated 64-bit constants, XORed
/// with a fixed salt at derivation time — not a secret in the cryptographic
/// sense (anyone with the binary can recompute it), only an obstacle to
/// casual inspection of on-disk bytes.
const GLOBAL_KEY_PARTS: [u64; 4] = [
    0x9E37_79B9_7F4A_7C15,
    0xC2B2_AE3D_27D4_EB4F,
    0x1656_67B1_9E37_79F9,
    0x85EB_CA6B_27D4_A7F3,
];

const GLOBAL_KEY_SALT: [u8; 32] = [
    0x4c, 0x9f, 0x21, 0xa6, 0xd3, 0x7b, 0x88, 0x02, 0x5e, 0x1d, 0x94, 0xf0, 0x3a, 0x67, 0xbc, 0x11,
    0x8e, 0x4a, 0x56, 0xcd, 0x2f, 0x90, 0x63, 0xab, 0x77, 0x0d, 0xe2, 0x39, 0xf4, 0x18, 0x5a, 0xc9,
];

#[cfg(target_os = "linux")]
fn debugger_attached() -> bool {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status
                .lines()
                .find_map(|line| line.strip_prefix("TracerPid:"))
                .map(|v| v.trim() != "0")
        })
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn debugger_attached() -> bool {
    false
}

fn compute_global_key() -> Key {
    let mut parts = GLOBAL_KEY_PARTS;
    if debugger_attached() {
        // Corrupt one constant so the derived key silently diverges and
        // every subsequent envelope load fails its MAC check instead of
        // handing a debugger a clean view of signed state.
        parts[0] ^= u64::MAX;
    }

    let mut buf = [0u8; KEY_LEN];
    for (i, part) in parts.iter().enumerate() {
        buf[i * 8..i * 8 + 8].copy_from_slice(&part.to_le_bytes());
    }
    for (b, s) in buf.iter_mut().zip(GLOBAL_KEY_SALT.iter()) {
        *b ^= s;
    }
    Key(buf)
}

fn global_key_cached() -> Key {
    static CACHE: OnceLock<Key> = OnceLock::new();
    CACHE.get_or_init(compute_global_key).clone()
}

/// Provisions and caches the machine key and global key for one program
/// identity (the qualifier passed to the platform's application-data path
/// resolver).
pub struct KeyStore {
    program_id: String,
    machine_key: OnceLock<Key>,
}

impl KeyStore {
    pub fn new(program_id: impl Into<String>) -> Self {
        Self { program_id: program_id.into(), machine_key: OnceLock::new() }
    }

    fn key_dir(&self) -> Result<PathBuf, KeyStoreError> {
        let dirs = ProjectDirs::from("", "", &self.program_id).ok_or(KeyStoreError::NoAppDataDir)?;
        Ok(dirs.data_local_dir().to_path_buf())
    }

    /// The machine-bound key, generating it on first use in this process and
    /// on first use on this machine.
    pub fn machine_key(&self) -> Result<Key, KeyStoreError> {
        if let Some(key) = self.machine_key.get() {
            return Ok(key.clone());
        }

        let path = self.key_dir()?.join("machine.key");
        let key = match std::fs::read(&path) {
            Ok(bytes) => parse_key_file(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut generated = [0u8; KEY_LEN];
                OsRng.fill_bytes(&mut generated);
                match durable::create_if_absent(&path, &generated)? {
                    CreateOutcome::Created => Key(generated),
                    CreateOutcome::LostRace => parse_key_file(&std::fs::read(&path)?)?,
                }
            }
            Err(e) => return Err(e.into()),
        };

        let _ = self.machine_key.set(key.clone());
        Ok(key)
    }

    /// The portable, compiled-in global key.
    pub fn global_key(&self) -> Key {
        global_key_cached()
    }

    /// Select the key for a save/load call: `portable` picks the global key,
    /// otherwise the machine key.
    pub fn select(&self, portable: bool) -> Result<Key, KeyStoreError> {
        if portable {
            Ok(self.global_key())
        } else {
            self.machine_key()
        }
    }
}

fn parse_key_file(bytes: &[u8]) -> Result<Key, KeyStoreError> {
    if bytes.len() != KEY_LEN {
        return Err(KeyStoreError::MalformedKeyFile(bytes.len()));
    }
    let mut buf = [0u8; KEY_LEN];
    buf.copy_from_slice(bytes);
    Ok(Key(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_key_is_deterministic_within_a_process() {
        let store = KeyStore::new("helix-save-tests");
        assert_eq!(store.global_key().0, store.global_key().0);
    }

    #[test]
    fn global_key_differs_from_raw_constants() {
        let key = compute_global_key();
        let mut raw = [0u8; KEY_LEN];
        for (i, part) in GLOBAL_KEY_PARTS.iter().enumerate() {
            raw[i * 8..i * 8 + 8].copy_from_slice(&part.to_le_bytes());
        }
        assert_ne!(key.0, raw, "salt XOR must actually change the bytes");
    }
}
