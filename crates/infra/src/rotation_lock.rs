//! Cross-process rotation lock using a PID file
//!
//! Keeps two rotation runs from interleaving writes to the same secret store.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use auditvault_domain::{AuditVaultError, Result};

/// How long a lock file without a readable PID counts as held.
///
/// A holder creates the file before writing its PID, so an empty file may
/// belong to a live process that has not finished writing yet.
const UNREADABLE_LOCK_GRACE: Duration = Duration::from_secs(60);

/// Exclusive ownership of a secret store for one rotation run.
///
/// Released when dropped.
#[derive(Debug)]
pub struct RotationLock {
    pid_file: PathBuf,
}

impl RotationLock {
    /// Take the lock at `pid_file`.
    ///
    /// A lock left behind by a process that is no longer running is removed
    /// and taken over. Fails if a live process holds it.
    pub fn acquire<P: AsRef<Path>>(pid_file: P) -> Result<Self> {
        let pid_file = pid_file.as_ref().to_path_buf();
        if let Some(parent) = pid_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // One retry after clearing a stale file.
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&pid_file) {
                Ok(mut file) => {
                    let current_pid = std::process::id();
                    file.write_all(current_pid.to_string().as_bytes())?;
                    file.sync_all()?;
                    tracing::info!(pid = current_pid, path = %pid_file.display(), "rotation_lock.acquired");
                    return Ok(Self { pid_file });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    Self::clear_if_stale(&pid_file)?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AuditVaultError::Io(format!(
            "could not take rotation lock at {}",
            pid_file.display()
        )))
    }

    pub fn path(&self) -> &Path {
        &self.pid_file
    }

    fn clear_if_stale(pid_file: &Path) -> Result<()> {
        let content = match fs::read_to_string(pid_file) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(_) => String::new(),
        };

        match content.trim().parse::<u32>() {
            Ok(pid) if Self::is_process_running(pid) => {
                tracing::warn!(existing_pid = pid, "rotation_lock.held");
                return Err(AuditVaultError::Io(format!(
                    "another rotation is in progress (PID: {pid}); lock file {}",
                    pid_file.display()
                )));
            }
            Ok(pid) => {
                tracing::warn!(stale_pid = pid, "rotation_lock.stale_pid_file_detected");
            }
            Err(_) => {
                let age = fs::metadata(pid_file)
                    .and_then(|meta| meta.modified())
                    .ok()
                    .and_then(|modified| SystemTime::now().duration_since(modified).ok());
                match age {
                    Some(age) if age >= UNREADABLE_LOCK_GRACE => {
                        tracing::warn!(age_secs = age.as_secs(), "rotation_lock.abandoned_lock_file");
                    }
                    _ => {
                        tracing::warn!(path = %pid_file.display(), "rotation_lock.held_without_pid");
                        return Err(AuditVaultError::Io(format!(
                            "rotation lock {} is being taken by another process",
                            pid_file.display()
                        )));
                    }
                }
            }
        }

        match fs::remove_file(pid_file) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Check if a process is running on macOS
    #[cfg(target_os = "macos")]
    fn is_process_running(pid: u32) -> bool {
        use std::process::Command;

        // `kill -0` probes for existence without sending a signal
        Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Check if a process is running on other platforms
    #[cfg(not(target_os = "macos"))]
    fn is_process_running(pid: u32) -> bool {
        #[cfg(target_os = "linux")]
        {
            Path::new("/proc").join(pid.to_string()).exists()
        }

        #[cfg(not(target_os = "linux"))]
        {
            tracing::warn!(pid = pid, "rotation_lock.process_check_unsupported");
            true
        }
    }
}

impl Drop for RotationLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.pid_file) {
            tracing::warn!(error = %e, path = %self.pid_file.display(), "rotation_lock.remove_failed");
        } else {
            tracing::info!(path = %self.pid_file.display(), "rotation_lock.released");
        }
    }
}
