//! Cross-process lock over a queue's files.
//!
//! The lock is a file created with `create_new` holding the owner's pid. A
//! lock whose owner is no longer running is stale and removed.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::QueueError;

const LOCK_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(25);

/// Held lock. Dropping it removes the lock file.
#[derive(Debug)]
pub struct QueueLock {
    path: PathBuf,
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[derive(Debug)]
enum LockState {
    HeldBy(u32),
    Stale(u32),
    Unknown,
}

/// Wait for the lock at `path`.
///
/// # Errors
///
/// Returns [`QueueError::Locked`] if a live holder keeps it past the wait
/// timeout.
pub async fn acquire(path: &Path) -> Result<QueueLock, QueueError> {
    let started = Instant::now();
    loop {
        match try_acquire(path) {
            Ok(lock) => return Ok(lock),
            Err(LockState::Stale(pid)) => {
                tracing::warn!(path = %path.display(), pid, "removing stale queue lock");
                let _ = std::fs::remove_file(path);
            }
            Err(state) => {
                if started.elapsed() >= LOCK_WAIT_TIMEOUT {
                    let holder = match state {
                        LockState::HeldBy(pid) => Some(pid),
                        _ => None,
                    };
                    return Err(QueueError::Locked {
                        path: path.display().to_string(),
                        holder,
                    });
                }
                tokio::time::sleep(LOCK_RETRY_DELAY).await;
            }
        }
    }
}

fn try_acquire(path: &Path) -> Result<QueueLock, LockState> {
    match OpenOptions::new().create_new(true).write(true).open(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "{}", std::process::id());
            Ok(QueueLock {
                path: path.to_path_buf(),
            })
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            let mut pid_buf = String::new();
            if OpenOptions::new()
                .read(true)
                .open(path)
                .and_then(|mut file| file.read_to_string(&mut pid_buf))
                .is_err()
            {
                return Err(LockState::Unknown);
            }
            match pid_buf.trim().parse::<u32>().ok() {
                Some(pid) if is_process_running(pid) => Err(LockState::HeldBy(pid)),
                Some(pid) => Err(LockState::Stale(pid)),
                // Created but the pid is not written yet.
                None => Err(LockState::Unknown),
            }
        }
        Err(_) => Err(LockState::Unknown),
    }
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    pid == std::process::id()
        || std::process::Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
}

#[cfg(not(unix))]
const fn is_process_running(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn lock_file_lives_as_long_as_the_guard() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("q.lock");

        let lock = acquire(&path).await.unwrap();
        assert!(path.is_file());
        assert!(matches!(try_acquire(&path), Err(LockState::HeldBy(_))));
        drop(lock);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn lock_of_a_dead_process_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("q.lock");
        // Above the Linux pid_max ceiling, so never a live process.
        std::fs::write(&path, "4194305\n").unwrap();

        let lock = acquire(&path).await.unwrap();
        let owner = std::fs::read_to_string(&path).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
        drop(lock);
    }
}
