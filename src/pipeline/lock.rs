//! Single-run guard on the local host.
//!
//! The lock file records the owning pid. A lock whose owner is no longer
//! running (the run was killed) is taken over instead of blocking every
//! later run.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::RunError;

pub const LOCK_FILE_NAME: &str = "reelforge.lock";

/// Exclusive lock file, removed when dropped.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Create `<dir>/reelforge.lock`, failing if a live run holds it.
    pub fn acquire(dir: &Path) -> Result<Self, RunError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| RunError::config(format!("cannot create {}: {}", dir.display(), e)))?;
        let path = dir.join(LOCK_FILE_NAME);

        match Self::create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => match holder(&path) {
                Some(pid) if !process_alive(pid) => {
                    tracing::warn!(pid, "Taking over lock file {} from a run that is gone", path.display());
                    std::fs::remove_file(&path).map_err(|e| {
                        RunError::config(format!("cannot remove stale lock file {}: {}", path.display(), e))
                    })?;
                    Self::create(&path).map_err(|e| lock_error(&path, e))
                }
                _ => Err(lock_error(&path, e)),
            },
            Err(e) => Err(lock_error(&path, e)),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let lock = Self {
            path: path.to_path_buf(),
        };
        let _ = writeln!(
            file,
            "pid={} started={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        );
        tracing::debug!("Acquired run lock {}", path.display());
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!("Failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}

fn lock_error(path: &Path, err: std::io::Error) -> RunError {
    if err.kind() == ErrorKind::AlreadyExists {
        RunError::config(format!(
            "run already in progress (lock file {} exists; remove it if no run is active)",
            path.display()
        ))
    } else {
        RunError::config(format!("cannot create lock file {}: {}", path.display(), err))
    }
}

/// Pid recorded in an existing lock file.
fn holder(path: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_pid(&content)
}

fn parse_pid(content: &str) -> Option<u32> {
    content
        .split_whitespace()
        .find_map(|field| field.strip_prefix("pid="))
        .and_then(|pid| pid.parse::<u32>().ok())
        .filter(|pid| *pid > 0)
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // EPERM means the process exists under another user.
    !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_is_exclusive_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());

        let err = RunLock::acquire(dir.path()).unwrap_err();
        assert!(err.to_string().starts_with("ConfigError: run already in progress"));

        drop(lock);
        assert!(!dir.path().join(LOCK_FILE_NAME).exists());
        let _again = RunLock::acquire(dir.path()).unwrap();
    }

    #[test]
    fn test_parse_pid() {
        assert_eq!(parse_pid("pid=4242 started=2024-01-01T00:00:00Z\n"), Some(4242));
        assert_eq!(parse_pid("pid=0"), None);
        assert_eq!(parse_pid("pid 1\n"), None);
        assert_eq!(parse_pid(""), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_lock_left_by_dead_run_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        std::fs::write(&path, "pid=999999999 started=2024-01-01T00:00:00Z\n").unwrap();

        let lock = RunLock::acquire(dir.path()).unwrap();
        let content = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(parse_pid(&content), Some(std::process::id()));
    }

    #[test]
    fn test_lock_of_live_run_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        let content = format!("pid={} started=2024-01-01T00:00:00Z\n", std::process::id());
        std::fs::write(&path, &content).unwrap();

        let err = RunLock::acquire(dir.path()).unwrap_err();
        assert!(err.to_string().contains("already in progress"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_unreadable_holder_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(LOCK_FILE_NAME), "locked by hand\n").unwrap();
        assert!(RunLock::acquire(dir.path()).is_err());
    }
}
