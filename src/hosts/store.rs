//! Reading and rewriting the SSH config file

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;

use tracing::{debug, info};

use crate::error::{io_at, Result, SshKeepError};
use crate::sshdir::{self, SshDir, PRIVATE_FILE_MODE};

use super::{format_block, parse_entries, reference_count, splice_block, validate_alias, HostEntry};

/// Current config text, empty when the file does not exist.
pub fn read_raw(dir: &SshDir) -> Result<String> {
    Ok(sshdir::read_optional(&dir.config_path())?.unwrap_or_default())
}

/// All host entries; a missing config file yields an empty list.
pub fn list_hosts(dir: &SshDir) -> Result<Vec<HostEntry>> {
    let text = read_raw(dir)?;
    let entries = parse_entries(&text);
    debug!(count = entries.len(), "parsed ssh config");
    Ok(entries)
}

pub fn get_host(dir: &SshDir, alias: &str) -> Result<HostEntry> {
    list_hosts(dir)?
        .into_iter()
        .find(|entry| entry.alias == alias)
        .ok_or_else(|| SshKeepError::HostNotFound(alias.to_string()))
}

/// Append a new block to the end of the config file.
pub fn add_host(dir: &SshDir, entry: &HostEntry) -> Result<()> {
    validate_alias(&entry.alias)?;
    if list_hosts(dir)?.iter().any(|e| e.alias == entry.alias) {
        return Err(SshKeepError::HostAlreadyExists(entry.alias.clone()));
    }

    dir.ensure_root()?;
    let path = dir.config_path();

    let mut options = OpenOptions::new();
    options.append(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(PRIVATE_FILE_MODE);
    }

    let mut file = options.open(&path).map_err(io_at(&path))?;
    file.write_all(format_block(entry).as_bytes()).map_err(io_at(&path))?;

    info!(alias = %entry.alias, "host added");
    Ok(())
}

/// Replace the block of `entry.alias` with the rendering of `entry`.
pub fn update_host(dir: &SshDir, entry: &HostEntry) -> Result<()> {
    validate_alias(&entry.alias)?;
    rewrite_block(dir, &entry.alias, &format_block(entry))?;
    info!(alias = %entry.alias, "host updated");
    Ok(())
}

pub fn delete_host(dir: &SshDir, alias: &str) -> Result<()> {
    rewrite_block(dir, alias, "")?;
    info!(alias, "host deleted");
    Ok(())
}

fn rewrite_block(dir: &SshDir, alias: &str, replacement: &str) -> Result<()> {
    let path = dir.config_path();
    let text = fs::read_to_string(&path).map_err(io_at(&path))?;

    if !parse_entries(&text).iter().any(|e| e.alias == alias) {
        return Err(SshKeepError::HostNotFound(alias.to_string()));
    }

    let updated = splice_block(&text, alias, replacement);
    sshdir::write_file(&path, updated.as_bytes(), PRIVATE_FILE_MODE)
}

/// Overwrite the config file verbatim.
pub fn write_raw(dir: &SshDir, text: &str) -> Result<()> {
    dir.ensure_root()?;
    sshdir::write_file(&dir.config_path(), text.as_bytes(), PRIVATE_FILE_MODE)?;
    info!(bytes = text.len(), "ssh config rewritten");
    Ok(())
}

/// How many hosts reference each identity file.
pub fn key_ref_count(dir: &SshDir) -> Result<BTreeMap<String, usize>> {
    Ok(reference_count(&list_hosts(dir)?))
}
