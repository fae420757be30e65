//! Loader — read, verify, and fall back to the `.bak` sibling on any
//! rejection or absence, at the byte level. Type decoding is layered on top
//! in [`crate::api`].
use std::path::Path;

use crate::envelope::{self, DecodeError, DecodedEnvelope};

pub enum LoadOutcome {
    Found(DecodedEnvelope),
    Absent,
    Rejected(DecodeError),
}

fn load_single(path: &Path, expected_type_digest: &[u8; 32], key: &[u8; 32]) -> LoadOutcome {
    match std::fs::read(path) {
        Ok(bytes) => match envelope::decode(&bytes, expected_type_digest, key) {
            Ok(env) => LoadOutcome::Found(env),
            Err(e) => {
                tracing::warn!(path = %path.display(), reason = ?e, "rejected envelope");
                LoadOutcome::Rejected(e)
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "envelope unreadable");
            }
            LoadOutcome::Absent
        }
    }
}

/// Try `path`; on absence or rejection, try `path` + `.bak` once. The
/// outcome returned is whichever of the two answered, never a merge of both.
pub fn load_with_backup(path: &Path, expected_type_digest: &[u8; 32], key: &[u8; 32]) -> LoadOutcome {
    match load_single(path, expected_type_digest, key) {
        LoadOutcome::Found(env) => LoadOutcome::Found(env),
        _ => load_single(&crate::durable::backup_path(path), expected_type_digest, key),
    }
}
