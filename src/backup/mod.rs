//! Point-in-time backups of the whole SSH directory
//!
//! Archives are written to the backup directory next to the SSH root as
//! `ssh-backup-<YYYYMMDD-HHMMSS>.tar.gz`. Filenames passed to restore, delete
//! and path resolution come from callers and are always validated before they
//! are joined onto the backup directory.

mod archive;

use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{io_at, Result, SshKeepError};
use crate::sshdir::{self, SshDir};

pub const ARCHIVE_SUFFIX: &str = ".tar.gz";
const FILENAME_PREFIX: &str = "ssh-backup-";
const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";
const NAME_RETRIES: u32 = 2;

/// Metadata of one archive in the backup directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub filename: String,
    pub size: u64,
    /// Modification time of the archive file
    pub created_at: DateTime<Local>,
}

/// Archive filename for a backup taken at `at`.
pub fn backup_filename(at: DateTime<Local>) -> String {
    format!("{FILENAME_PREFIX}{}{ARCHIVE_SUFFIX}", at.format(TIMESTAMP_FORMAT))
}

/// Backup filenames must name a file directly inside the backup directory.
pub fn validate_filename(filename: &str) -> Result<()> {
    sshdir::validate_file_name(filename)
}

/// All archives, most recent first. A missing backup directory yields an
/// empty list.
pub fn list_backups(dir: &SshDir) -> Result<Vec<Backup>> {
    let backup_dir = dir.backup_dir();
    let read_dir = match fs::read_dir(&backup_dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_at(&backup_dir)(e)),
    };

    let mut backups = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(io_at(&backup_dir))?;
        let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !filename.ends_with(ARCHIVE_SUFFIX) {
            continue;
        }
        let metadata = entry.metadata().map_err(io_at(&entry.path()))?;
        if !metadata.is_file() {
            continue;
        }

        backups.push(Backup {
            filename,
            size: metadata.len(),
            created_at: metadata.modified().map_err(io_at(&entry.path()))?.into(),
        });
    }

    backups.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.filename.cmp(&a.filename))
    });
    debug!(count = backups.len(), "listed backups");
    Ok(backups)
}

/// Archive the SSH root into a new timestamped file.
///
/// Filenames have one-second resolution. When the current name is already
/// taken the call waits for the next second instead of overwriting it.
pub fn create_backup(dir: &SshDir) -> Result<Backup> {
    dir.ensure_backup_dir()?;

    let mut attempt = 0;
    let (filename, path) = loop {
        let filename = backup_filename(Local::now());
        let path = dir.backup_dir().join(&filename);
        match archive::write_archive(dir.root(), &path) {
            Ok(()) => break (filename, path),
            Err(SshKeepError::BackupExists(_)) if attempt < NAME_RETRIES => {
                debug!(filename = %filename, "backup name taken, waiting for the next second");
                attempt += 1;
                sleep_until_next_second();
            }
            Err(e) => return Err(e),
        }
    };

    let metadata = fs::metadata(&path).map_err(io_at(&path))?;
    let backup = Backup {
        filename,
        size: metadata.len(),
        created_at: metadata.modified().map_err(io_at(&path))?.into(),
    };
    info!(filename = %backup.filename, size = backup.size, "backup created");
    Ok(backup)
}

fn sleep_until_next_second() {
    let nanos = u64::from(Local::now().timestamp_subsec_nanos()).min(999_999_999);
    thread::sleep(Duration::from_nanos(1_000_000_000 - nanos) + Duration::from_millis(5));
}

/// Replace the SSH root with the contents of `filename`.
///
/// Everything currently in the root is removed first. No safety backup is
/// taken here; that is the caller's decision.
pub fn restore_backup(dir: &SshDir, filename: &str) -> Result<()> {
    let path = resolve_backup_path(dir, filename)?;
    archive::restore_archive(dir, &path)?;
    info!(filename, "backup restored");
    Ok(())
}

pub fn delete_backup(dir: &SshDir, filename: &str) -> Result<()> {
    validate_filename(filename)?;
    let path = dir.backup_dir().join(filename);
    match fs::remove_file(&path) {
        Ok(()) => {
            info!(filename, "backup deleted");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SshKeepError::BackupNotFound(filename.to_string()))
        }
        Err(e) => Err(io_at(&path)(e)),
    }
}

/// Full path of an existing archive, for callers that serve the raw bytes.
pub fn resolve_backup_path(dir: &SshDir, filename: &str) -> Result<PathBuf> {
    validate_filename(filename)?;
    let path = dir.backup_dir().join(filename);
    if !path.is_file() {
        return Err(SshKeepError::BackupNotFound(filename.to_string()));
    }
    Ok(path)
}
