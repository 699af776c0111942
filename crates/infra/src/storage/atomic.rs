//! Crash-safe file replacement

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use auditvault_domain::{AuditVaultError, Result};
use tempfile::NamedTempFile;

use crate::errors::InfraError;

/// Owner read/write only.
pub const PRIVATE_FILE_MODE: u32 = 0o600;

/// Replace `path` with `contents` through a temp file in the same directory.
///
/// The temp file is fsynced before the rename, so readers see either the old
/// or the new contents. Without `mode`, an existing file keeps its
/// permissions.
pub fn write_atomic(path: &Path, contents: &[u8], mode: Option<u32>) -> Result<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(&dir)?;

    let mut temp = NamedTempFile::new_in(&dir)?;
    temp.write_all(contents)?;

    match mode {
        Some(mode) => set_mode(temp.as_file(), mode)?,
        None => {
            if let Ok(existing) = fs::metadata(path) {
                temp.as_file().set_permissions(existing.permissions())?;
            }
        }
    }

    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| AuditVaultError::from(InfraError::from(e)))?;
    Ok(())
}

/// Run blocking file I/O off the async runtime.
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuditVaultError::Internal(format!("blocking file task failed: {e}")))?
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: u32) -> Result<()> {
    Ok(())
}
