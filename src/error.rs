use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SshKeepError>;

/// Coarse error classes callers can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Invalid,
    Io,
    ExternalTool,
}

#[derive(Debug, Error)]
pub enum SshKeepError {
    #[error("Host '{0}' not found")]
    HostNotFound(String),

    #[error("Key '{0}' not found")]
    KeyNotFound(String),

    #[error("Backup '{0}' not found")]
    BackupNotFound(String),

    #[error("Host '{0}' already exists")]
    HostAlreadyExists(String),

    #[error("Key '{0}' already exists")]
    KeyAlreadyExists(String),

    #[error("Backup '{0}' already exists")]
    BackupExists(String),

    #[error("Invalid host '{0}'")]
    InvalidHost(String),

    #[error("Invalid host alias '{0}'")]
    InvalidAlias(String),

    #[error("Invalid file name '{0}'")]
    InvalidName(String),

    #[error("Key '{name}' is not a valid public key: {message}")]
    InvalidKey { name: String, message: String },

    #[error("Line {line} out of range (file has {total} lines)")]
    LineOutOfRange { line: usize, total: usize },

    #[error("Archive entry '{0}' points outside the SSH directory")]
    UnsafeArchivePath(String),

    #[error("Could not determine the home directory")]
    HomeDirUnavailable,

    #[error("Cannot set permissions on {}: {source}", path.display())]
    Permissions {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to walk SSH directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("'{0}' was not found on PATH")]
    ToolMissing(String),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SshKeepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HostNotFound(_) | Self::KeyNotFound(_) | Self::BackupNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::HostAlreadyExists(_)
            | Self::KeyAlreadyExists(_)
            | Self::BackupExists(_)
            | Self::InvalidHost(_)
            | Self::InvalidAlias(_)
            | Self::InvalidName(_)
            | Self::InvalidKey { .. }
            | Self::LineOutOfRange { .. }
            | Self::UnsafeArchivePath(_) => ErrorKind::Invalid,
            Self::ToolMissing(_) | Self::ToolFailed { .. } => ErrorKind::ExternalTool,
            Self::HomeDirUnavailable
            | Self::Permissions { .. }
            | Self::FileIo { .. }
            | Self::Walk(_)
            | Self::Io(_)
            | Self::Json(_) => ErrorKind::Io,
        }
    }
}

/// Attach the offending path to an I/O error.
pub(crate) fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> SshKeepError {
    let path = path.to_path_buf();
    move |source| SshKeepError::FileIo { path, source }
}
