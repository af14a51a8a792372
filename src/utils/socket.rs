//! Unix socket utility functions
//!
//! Provides common operations for Unix socket management including
//! safe removal, directory creation, and permission setting.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Error type for socket operations
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("Refusing to replace symlink at {path}: potential security risk")]
    SymlinkDetected { path: String },

    #[error("Failed to check existing socket at {path}: {source}")]
    MetadataError { path: String, source: io::Error },

    #[error("Failed to remove existing socket at {path}: {source}")]
    RemoveError { path: String, source: io::Error },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirError { path: String, source: io::Error },

    #[error("Failed to set permissions on socket at {path}: {source}")]
    PermissionError { path: String, source: io::Error },
}

/// Safely remove an existing socket file if present.
///
/// Uses `symlink_metadata` instead of `exists` to avoid TOCTOU races. If
/// the path is a symlink, it returns an error rather than following it.
pub fn remove_existing_socket(path: &Path) -> Result<(), SocketError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => {
            if metadata.file_type().is_symlink() {
                return Err(SocketError::SymlinkDetected {
                    path: path.display().to_string(),
                });
            }
            fs::remove_file(path).map_err(|e| SocketError::RemoveError {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            // File doesn't exist, which is fine
        }
        Err(e) => {
            return Err(SocketError::MetadataError {
                path: path.display().to_string(),
                source: e,
            });
        }
    }
    Ok(())
}

/// Create the directory that will hold generated sockets, with mode 0700.
pub fn ensure_socket_dir(dir: &Path) -> Result<(), SocketError> {
    fs::create_dir_all(dir).map_err(|e| SocketError::CreateDirError {
        path: dir.display().to_string(),
        source: e,
    })?;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(|e| {
        SocketError::PermissionError {
            path: dir.display().to_string(),
            source: e,
        }
    })
}

/// Restrict a bound socket file to the owning user (mode 0600).
pub fn set_socket_permissions(path: &Path) -> Result<(), SocketError> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
        SocketError::PermissionError {
            path: path.display().to_string(),
            source: e,
        }
    })
}
