//! Single-instance guard for a job.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::storage;

/// Held while a run owns the checkpoint. Removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Create the lock file exclusively, recording our pid.
    ///
    /// A lock whose recorded process is gone is replaced. Fails with
    /// [`Error::AlreadyRunning`] while the recorded process is alive or the
    /// file holds no readable pid.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            storage::ensure_dir(parent)?;
        }

        let mut file = match create_exclusive(&path)? {
            Some(file) => file,
            None => {
                let holder = read_holder(&path);
                if holder_alive(&holder) {
                    return Err(Error::AlreadyRunning { path, pid: holder });
                }

                log::warn!(
                    "Removing stale lock {} left by pid {}",
                    path.display(),
                    holder
                );
                storage::remove_file(&path)?;
                match create_exclusive(&path)? {
                    Some(file) => file,
                    None => {
                        let pid = read_holder(&path);
                        return Err(Error::AlreadyRunning { path, pid });
                    }
                }
            }
        };

        if let Err(e) = file.write_all(std::process::id().to_string().as_bytes()) {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(Error::persistence(&path, e));
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove a lock regardless of owner.
    pub fn force_release(path: &Path) -> Result<()> {
        storage::remove_file(path)
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// `None` if the file already exists.
fn create_exclusive(path: &Path) -> Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(Error::persistence(path, e)),
    }
}

fn read_holder(path: &Path) -> String {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// An unreadable pid may belong to a run that has not written it yet.
fn holder_alive(holder: &str) -> bool {
    match holder.parse::<i32>() {
        Ok(pid) if pid > 0 => is_pid_alive(pid),
        _ => true,
    }
}

#[cfg(unix)]
fn is_pid_alive(pid: i32) -> bool {
    // Signal 0 only checks that the process exists.
    if unsafe { libc::kill(pid as libc::pid_t, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn is_pid_alive(_pid: i32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Above any kernel's pid_max, so never a live process.
    const DEAD_PID: i32 = i32::MAX;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lock");

        let lock = RunLock::acquire(&path).unwrap();
        let err = RunLock::acquire(&path).unwrap_err();
        match err {
            Error::AlreadyRunning { pid, .. } => assert_eq!(pid, std::process::id().to_string()),
            other => panic!("unexpected error: {other}"),
        }

        drop(lock);
        assert!(!path.exists());
        assert!(RunLock::acquire(&path).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lock");
        std::fs::write(&path, DEAD_PID.to_string()).unwrap();

        let lock = RunLock::acquire(&path).unwrap();
        assert_eq!(
            std::fs::read_to_string(lock.path()).unwrap(),
            std::process::id().to_string()
        );

        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn test_unreadable_holder_keeps_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lock");
        std::fs::write(&path, "").unwrap();

        assert!(matches!(
            RunLock::acquire(&path),
            Err(Error::AlreadyRunning { .. })
        ));
        assert!(path.exists());
    }

    #[test]
    fn test_holder_alive() {
        assert!(holder_alive(&std::process::id().to_string()));
        assert!(holder_alive("not a pid"));
        assert!(holder_alive("0"));
    }

    #[test]
    fn test_force_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lock");
        std::fs::write(&path, "12345").unwrap();

        RunLock::force_release(&path).unwrap();
        let lock = RunLock::acquire(&path).unwrap();
        assert_eq!(lock.path(), path.as_path());
    }
}
