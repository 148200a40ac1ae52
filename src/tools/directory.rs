//! Working Directory Checks
//!
//! A pure predicate over a path: nothing is created and the process never
//! changes directory.

use std::path::Path;

use super::validator::{Rejection, ValidationOutcome};

/// Decides whether a working directory is usable for command execution
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryManager;

impl DirectoryManager {
    pub fn new() -> Self {
        Self
    }

    /// Validate a working directory
    ///
    /// Checks run in order and the first failure is returned:
    /// non-empty, exists, is a directory (symlinks followed), and the process
    /// holds read, write and execute permission on it.
    pub fn validate(&self, directory: &str) -> ValidationOutcome {
        if directory.is_empty() {
            return Err(Rejection::DirectoryNotSpecified);
        }

        let path = Path::new(directory);
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(_) => return Err(Rejection::DirectoryNotFound(directory.to_string())),
        };

        if !metadata.is_dir() {
            return Err(Rejection::NotADirectory(directory.to_string()));
        }

        if !has_full_access(path) {
            return Err(Rejection::InsufficientPermissions(directory.to_string()));
        }

        Ok(())
    }
}

/// `access(2)` with R_OK | W_OK | X_OK, evaluated for the real uid
#[cfg(unix)]
fn has_full_access(path: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK | libc::X_OK) == 0 }
}

#[cfg(not(unix))]
fn has_full_access(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}
