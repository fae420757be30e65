//! Top-level error union returned by the fallible public entry points.
use crate::codec::CodecError;
use crate::envelope::DecodeError;
use crate::keystore::KeyStoreError;

#[derive(Debug, thiserror::Error)]
pub enum HelixError {
    #[error("no usable saved value at the given path")]
    NotFound,
    #[error("saved envelope was rejected: {0}")]
    Rejected(#[from] DecodeError),
    #[error("payload codec failed: {0}")]
    Codec(#[from] CodecError),
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
