//! DurableWriter — temp-write, force-to-storage, atomic-rename protocol for
//! crash-safe single-file persistence.
//!
//! Every write lands on a `.tmp` sibling first, is `fsync`'d, and only then
//! takes the target's name via `rename`. A crash at any point before the
//! rename leaves the previous `target` untouched; a crash after leaves the
//! new content in place. When `keep_backup` is set, the prior contents are
//! copied (not moved) to `target` + `.bak` before the rename, so `target`
//! itself never stops resolving to a valid envelope — the rename is the
//! only event a concurrent reader can observe.
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

fn backup_sibling(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".bak");
    PathBuf::from(s)
}

pub fn backup_path(target: &Path) -> PathBuf {
    backup_sibling(target)
}

struct TempGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> TempGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TempGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(self.path);
        }
    }
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    // Windows exposes no directory-handle fsync through std; NTFS's own
    // metadata journal covers the rename itself.
    Ok(())
}

fn write_temp(tmp: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut f = OpenOptions::new().write(true).create(true).truncate(true).open(tmp)?;
    f.write_all(bytes)?;
    f.flush()?;
    f.sync_all()
}

/// Write `bytes` to `target` atomically. See module docs for the crash-safety
/// argument.
pub fn write_durable(target: &Path, bytes: &[u8], keep_backup: bool) -> io::Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = tmp_sibling(target);
    let guard = TempGuard::new(&tmp);
    write_temp(&tmp, bytes)?;

    if keep_backup && target.exists() {
        // Copy, not rename: `target` must stay resolvable right up to the
        // atomic rename below, so a concurrent reader never sees it absent.
        fs::copy(target, backup_sibling(target))?;
    }
    fs::rename(&tmp, target)?;

    guard.disarm();
    sync_parent_dir(target)?;
    tracing::trace!(path = %target.display(), bytes = bytes.len(), "wrote durable file");
    Ok(())
}

/// Outcome of [`create_if_absent`].
pub enum CreateOutcome {
    Created,
    LostRace,
}

/// Create `path` with `bytes` only if nothing is there yet. Used for
/// first-writer-wins files such as the machine key, where regenerating the
/// content on every process start would be wrong: whichever process wins the
/// creation race determines the permanent value, and every loser must read
/// that winner's file rather than retry.
pub fn create_if_absent(path: &Path, bytes: &[u8]) -> io::Result<CreateOutcome> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = tmp_sibling(path);
    let guard = TempGuard::new(&tmp);
    write_temp(&tmp, bytes)?;

    // hard_link fails with AlreadyExists if `path` is already taken, unlike
    // rename, which would silently clobber the winner.
    let outcome = match fs::hard_link(&tmp, path) {
        Ok(()) => CreateOutcome::Created,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => CreateOutcome::LostRace,
        Err(e) => return Err(e),
    };

    guard.disarm();
    let _ = fs::remove_file(&tmp);
    sync_parent_dir(path)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_durable_creates_and_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.bin");

        write_durable(&path, b"first", false).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"first");

        write_durable(&path, b"second", false).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn write_durable_preserves_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.bin");

        write_durable(&path, b"first", true).unwrap();
        write_durable(&path, b"second", true).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert_eq!(fs::read(backup_path(&path)).unwrap(), b"first");
    }

    #[test]
    fn no_tmp_sibling_survives_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.bin");
        write_durable(&path, b"data", false).unwrap();
        assert!(!tmp_sibling(&path).exists());
    }

    #[test]
    fn create_if_absent_first_writer_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("machine.key");

        match create_if_absent(&path, b"key-a").unwrap() {
            CreateOutcome::Created => {}
            CreateOutcome::LostRace => panic!("first call must win"),
        }
        match create_if_absent(&path, b"key-b").unwrap() {
            CreateOutcome::LostRace => {}
            CreateOutcome::Created => panic!("second call must lose"),
        }
        assert_eq!(fs::read(&path).unwrap(), b"key-a");
    }
}
