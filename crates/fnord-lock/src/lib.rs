use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Contents of the `owner` file written inside the lock directory, letting a
/// caller that fails to acquire report who holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockDiagnostic {
    pub pid: u32,
    pub acquired_at: chrono::DateTime<Utc>,
    pub reason: String,
}

/// An acquired filesystem lock. Dropping it removes the lock directory.
pub struct FileLock {
    lock_dir: PathBuf,
    released: bool,
}

impl FileLock {
    pub fn path(&self) -> &Path {
        &self.lock_dir
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = fs::remove_dir_all(&self.lock_dir);
        }
    }
}

/// Acquire a directory-based advisory lock adjacent to `target`, named
/// `<target>.lock`. Retries until `timeout` elapses, reclaiming the lock if
/// its owner file is older than `stale_after` (the owning process is
/// presumed dead or hung).
pub fn acquire(
    target: &Path,
    reason: &str,
    timeout: Duration,
    stale_after: Duration,
) -> Result<FileLock> {
    let lock_dir = lock_path_for(target);
    let deadline = Instant::now() + timeout;

    loop {
        match fs::create_dir(&lock_dir) {
            Ok(()) => {
                write_diagnostic(&lock_dir, reason)?;
                tracing::debug!(path = %lock_dir.display(), "acquired lock");
                return Ok(FileLock {
                    lock_dir,
                    released: false,
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if let Some(diag) = read_diagnostic(&lock_dir) {
                    let age = Utc::now().signed_duration_since(diag.acquired_at);
                    if age.to_std().map(|a| a > stale_after).unwrap_or(false) {
                        tracing::warn!(
                            holder_pid = diag.pid,
                            age_secs = age.num_seconds(),
                            "reclaiming stale lock"
                        );
                        let _ = fs::remove_dir_all(&lock_dir);
                        continue;
                    }
                }
                if Instant::now() >= deadline {
                    let holder = read_diagnostic(&lock_dir)
                        .map(|d| format!("pid {} ({})", d.pid, d.reason))
                        .unwrap_or_else(|| "unknown holder".to_string());
                    bail!("timed out waiting for lock {}: held by {}", lock_dir.display(), holder);
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(e) => {
                return Err(e).context(format!("creating lock dir {}", lock_dir.display()));
            }
        }
    }
}

pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".lock");
    target.with_file_name(name)
}

fn write_diagnostic(lock_dir: &Path, reason: &str) -> Result<()> {
    let diag = LockDiagnostic {
        pid: std::process::id(),
        acquired_at: Utc::now(),
        reason: reason.to_string(),
    };
    let owner_path = lock_dir.join("owner");
    let content = serde_json::to_string(&diag)?;
    fs::write(&owner_path, content).context("writing lock owner diagnostic")
}

fn read_diagnostic(lock_dir: &Path) -> Option<LockDiagnostic> {
    let content = fs::read_to_string(lock_dir.join("owner")).ok()?;
    serde_json::from_str(&content).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_creates_lock_dir() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("settings.json");
        let lock = acquire(&target, "test", Duration::from_secs(1), Duration::from_secs(60)).unwrap();
        assert!(lock.path().is_dir());
        assert_eq!(lock.path(), dir.path().join("settings.json.lock"));
    }

    #[test]
    fn test_drop_releases_lock() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("settings.json");
        {
            let _lock = acquire(&target, "test", Duration::from_secs(1), Duration::from_secs(60)).unwrap();
            assert!(target.with_file_name("settings.json.lock").is_dir());
        }
        assert!(!target.with_file_name("settings.json.lock").is_dir());
    }

    #[test]
    fn test_diagnostic_contents() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("settings.json");
        let lock = acquire(&target, "writing settings", Duration::from_secs(1), Duration::from_secs(60)).unwrap();
        let diag = read_diagnostic(lock.path()).unwrap();
        assert_eq!(diag.pid, std::process::id());
        assert_eq!(diag.reason, "writing settings");
    }

    #[test]
    fn test_second_acquire_times_out() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("settings.json");
        let _first = acquire(&target, "holder", Duration::from_secs(5), Duration::from_secs(60)).unwrap();
        let second = acquire(&target, "waiter", Duration::from_millis(100), Duration::from_secs(60));
        assert!(second.is_err());
        assert!(second.unwrap_err().to_string().contains("timed out"));
    }

    #[test]
    fn test_stale_lock_is_reclaimed() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("settings.json");
        let lock_dir = lock_path_for(&target);
        fs::create_dir(&lock_dir).unwrap();
        let stale_diag = LockDiagnostic {
            pid: 999_999,
            acquired_at: Utc::now() - chrono::Duration::seconds(120),
            reason: "crashed process".to_string(),
        };
        fs::write(lock_dir.join("owner"), serde_json::to_string(&stale_diag).unwrap()).unwrap();

        let lock = acquire(&target, "new holder", Duration::from_secs(2), Duration::from_secs(10)).unwrap();
        let diag = read_diagnostic(lock.path()).unwrap();
        assert_eq!(diag.pid, std::process::id());
    }

    #[test]
    fn test_lock_path_for_nonexistent_parent_dir_is_fine() {
        let path = PathBuf::from("/does/not/exist/settings.json");
        assert_eq!(lock_path_for(&path), PathBuf::from("/does/not/exist/settings.json.lock"));
    }

    #[test]
    fn test_diagnostic_debug_format_contains_pid() {
        let diag = LockDiagnostic {
            pid: 42,
            acquired_at: Utc::now(),
            reason: "x".to_string(),
        };
        assert!(format!("{diag:?}").contains("42"));
    }
}
