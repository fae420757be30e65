//! Type fingerprinting — binds a saved envelope to the Rust type it was
//! encoded from, independent of any value.
//!
//! The fingerprint is a SHA-256 digest of a type's canonical textual name
//! (`std::any::type_name::<T>()`). This is the only portable "identity" the
//! standard library exposes for a type at the call site; it is not a stable
//! ABI guarantee of the compiler, but it is stable enough in practice that
//! renaming the crate, moving a type to a sibling module, or bumping the
//! compiler version are the only things that change it — all of which are
//! occasions where rejecting a stale envelope rather than silently
//! misinterpreting its bytes is the correct behavior.
use sha2::{Digest, Sha256};

/// Digest of `T`'s canonical name. Two invocations for the same `T` within
/// the same build always agree; invocations across crate versions or
/// compiler versions may not, by design.
pub fn of<T: ?Sized>() -> [u8; 32] {
    of_name(std::any::type_name::<T>())
}

/// Digest of an arbitrary canonical name string, for callers that only have
/// the textual identity available (the repair CLI, cross-process tooling)
/// and no concrete Rust type to bind a generic parameter to.
pub fn of_name(name: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.finalize().into()
}
