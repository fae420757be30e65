//! Thin ergonomic wrappers for the two most common payload shapes: plain
//! text and raw bytes. Kept out of the core crate's test matrix per
//! spec — callers needing guarantees beyond "works" should use [`crate::api`]
//! directly. Grounded in the teacher's high-level `Archive` facade, which
//! likewise layered convenience methods (`list`, `stat`, `extract_all`) over
//! its lower-level block/index primitives.
use std::path::Path;

use crate::api::{self, SaveOptions};
use crate::error::HelixError;

pub fn save_string(value: &str, path: &Path) -> Result<(), HelixError> {
    api::save(&value.to_owned(), path, SaveOptions::default())
}

pub fn load_string_or_new(path: &Path) -> String {
    api::load_or_new::<String>(path, true)
}

pub fn save_bytes(value: &[u8], path: &Path) -> Result<(), HelixError> {
    api::save(&value.to_vec(), path, SaveOptions::default())
}

pub fn load_bytes_or_new(path: &Path) -> Vec<u8> {
    api::load_or_new::<Vec<u8>>(path, true)
}
