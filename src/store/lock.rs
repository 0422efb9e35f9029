//! Placeholder locking (spec.md §4.2): an advisory whole-file lock when the
//! platform supports it, falling back to a dot-file plus `link()` scheme
//! with bounded-backoff retry. Used to serialise writers on a master file
//! list or an SOA file.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A held advisory lock; releases on drop.
pub struct PlaceholderLock {
    _file: File,
    dot_file: Option<PathBuf>,
}

impl PlaceholderLock {
    /// Acquires the lock on `target`, retrying with bounded backoff for up
    /// to `retries` attempts spaced `backoff` apart.
    pub async fn acquire(target: &Path, retries: u32, backoff: Duration) -> io::Result<Self> {
        let lock_path = lock_file_path(target);
        let mut attempt = 0;
        loop {
            match try_acquire(&lock_path) {
                Ok(lock) => return Ok(lock),
                Err(e) if attempt < retries => {
                    attempt += 1;
                    let _ = e;
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Drop for PlaceholderLock {
    fn drop(&mut self) {
        if let Some(dot) = &self.dot_file {
            let _ = std::fs::remove_file(dot);
        }
    }
}

fn lock_file_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    target.with_file_name(name)
}

#[cfg(unix)]
fn try_acquire(lock_path: &Path) -> io::Result<PlaceholderLock> {
    let file = OpenOptions::new().create(true).write(true).open(lock_path)?;
    let fd = std::os::unix::io::AsRawFd::as_raw_fd(&file);
    // Whole-file advisory lock (flock LOCK_EX | LOCK_NB); falls back to the
    // dot-file + link() scheme below only if flock itself is unavailable.
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        return Ok(PlaceholderLock { _file: file, dot_file: None });
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ENOSYS) {
        return try_acquire_via_link(lock_path);
    }
    Err(err)
}

#[cfg(not(unix))]
fn try_acquire(lock_path: &Path) -> io::Result<PlaceholderLock> {
    try_acquire_via_link(lock_path)
}

/// Dot-file lock: write a uniquely-named temp file, then `link()` it to
/// the canonical lock name. `link()` fails with `EEXIST` if the lock is
/// already held, which is what makes this scheme atomic even on
/// filesystems without advisory locks.
fn try_acquire_via_link(lock_path: &Path) -> io::Result<PlaceholderLock> {
    let tmp_path = lock_path.with_extension(format!("tmp.{}", std::process::id()));
    {
        let mut tmp = OpenOptions::new().create(true).write(true).truncate(true).open(&tmp_path)?;
        use std::io::Write;
        writeln!(tmp, "{}", std::process::id())?;
    }

    let result = std::fs::hard_link(&tmp_path, lock_path);
    let _ = std::fs::remove_file(&tmp_path);
    result?;

    let file = OpenOptions::new().read(true).open(lock_path)?;
    Ok(PlaceholderLock { _file: file, dot_file: Some(lock_path.to_path_buf()) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquires_and_releases_a_lock() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("local.db");
        std::fs::write(&target, b"").unwrap();

        let lock = PlaceholderLock::acquire(&target, 0, Duration::from_millis(1)).await.unwrap();
        drop(lock);

        let again = PlaceholderLock::acquire(&target, 0, Duration::from_millis(1)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn second_acquire_blocks_until_first_releases() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("local.db");
        std::fs::write(&target, b"").unwrap();

        let first = PlaceholderLock::acquire(&target, 0, Duration::from_millis(1)).await.unwrap();
        let second = PlaceholderLock::acquire(&target, 2, Duration::from_millis(5)).await;
        assert!(second.is_err());
        drop(first);
    }
}
