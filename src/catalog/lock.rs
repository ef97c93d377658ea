//! Advisory cross-process lock around catalog writes.
//!
//! The lock lives next to the catalog as `<catalog>.lock` and is held with
//! `flock(LOCK_EX)` for the lifetime of the guard. On non-Unix targets the
//! guard only creates the file.

use crate::error::CatalogError;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct CatalogLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

impl CatalogLock {
    /// Block until the exclusive lock for `catalog_path` is acquired.
    pub fn acquire(catalog_path: &Path) -> Result<Self, CatalogError> {
        let path = lock_path(catalog_path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::Lock {
                path: path.clone(),
                source,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| CatalogError::Lock {
                path: path.clone(),
                source,
            })?;
        lock_exclusive(&file).map_err(|source| CatalogError::Lock {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(lock = %path.display(), "catalog lock acquired");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CatalogLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

pub fn lock_path(catalog_path: &Path) -> PathBuf {
    let mut name = catalog_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    catalog_path.with_file_name(name)
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    loop {
        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;
    // SAFETY: as above; closing the file would release the lock anyway.
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}
