//! Reading and rewriting the known_hosts file

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;

use tracing::{debug, info};

use crate::error::{io_at, Result, SshKeepError};
use crate::hosts::HostEntry;
use crate::sshdir::{self, SshDir, PUBLIC_FILE_MODE};
use crate::tool::Tool;

use super::{host_target, parse_entries, KnownHostEntry};

/// Current known_hosts text, empty when the file does not exist.
pub fn read_raw(dir: &SshDir) -> Result<String> {
    Ok(sshdir::read_optional(&dir.known_hosts_path())?.unwrap_or_default())
}

/// All entries; a missing file yields an empty list.
pub fn list_known_hosts(dir: &SshDir) -> Result<Vec<KnownHostEntry>> {
    let entries = parse_entries(&read_raw(dir)?);
    debug!(count = entries.len(), "parsed known_hosts");
    Ok(entries)
}

/// Overwrite known_hosts verbatim.
pub fn write_raw(dir: &SshDir, text: &str) -> Result<()> {
    dir.ensure_root()?;
    sshdir::write_file(&dir.known_hosts_path(), text.as_bytes(), PUBLIC_FILE_MODE)?;
    info!(bytes = text.len(), "known_hosts rewritten");
    Ok(())
}

/// Drop the 1-based line `line` from `text`.
///
/// Lines are counted the way [`parse_entries`] numbers them, so a trailing
/// newline contributes one final empty line.
pub fn remove_line(text: &str, line: usize) -> Result<String> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if line < 1 || line > lines.len() {
        return Err(SshKeepError::LineOutOfRange {
            line,
            total: lines.len(),
        });
    }
    lines.remove(line - 1);
    Ok(lines.join("\n"))
}

/// Remove the entry at `line` and rewrite the file.
///
/// Line numbers come from an earlier listing; callers should list again
/// afterwards since every later line shifts up by one.
pub fn remove_at_line(dir: &SshDir, line: usize) -> Result<()> {
    let path = dir.known_hosts_path();
    let text = fs::read_to_string(&path).map_err(io_at(&path))?;
    let updated = remove_line(&text, line)?;
    sshdir::write_file(&path, updated.as_bytes(), PUBLIC_FILE_MODE)?;
    info!(line, "known_hosts entry removed");
    Ok(())
}

/// Look `host` up with `ssh-keygen -F`, which also matches hashed entries.
///
/// A missing known_hosts file yields an empty result.
pub fn lookup(
    dir: &SshDir,
    keygen: &Tool,
    host: &str,
    port: Option<u16>,
) -> Result<Vec<KnownHostEntry>> {
    let path = dir.known_hosts_path();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let target = host_target(host, port);
    let args = [
        OsStr::new("-F"),
        OsStr::new(&target),
        OsStr::new("-f"),
        path.as_os_str(),
    ];

    let output = keygen.run(args)?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    if !output.status.success() {
        // exit status 1 with no output is "not found"
        if output.status.code() == Some(1) && stdout.trim().is_empty() {
            return Ok(Vec::new());
        }
        return Err(keygen.failure(&output));
    }

    Ok(parse_lookup_output(&stdout))
}

/// Parse `ssh-keygen -F` output, taking line numbers from its
/// `# Host ... found: line N` markers.
pub fn parse_lookup_output(output: &str) -> Vec<KnownHostEntry> {
    let mut entries = Vec::new();
    let mut found_line = None;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            found_line = comment
                .rsplit_once("found: line ")
                .and_then(|(_, number)| number.trim().parse::<usize>().ok());
            continue;
        }

        let entry = KnownHostEntry::parse(found_line.take().unwrap_or(0), line);
        if !entry.key_type.is_empty() {
            entries.push(entry);
        }
    }

    entries
}

/// Replace plain-text entries for `target` with freshly scanned lines.
///
/// Comments, other hosts and hashed entries are kept verbatim.
pub fn merge_scanned(text: &str, target: &str, scanned: &str) -> String {
    let mut merged = String::new();
    for line in text.lines() {
        let trimmed = line.trim();
        let is_entry = !trimmed.is_empty() && !trimmed.starts_with('#');
        if is_entry && KnownHostEntry::parse(0, trimmed).names_host(target) {
            continue;
        }
        merged.push_str(line);
        merged.push('\n');
    }

    for line in scanned.lines() {
        let line = line.trim();
        if !line.is_empty() && !line.starts_with('#') {
            merged.push_str(line);
            merged.push('\n');
        }
    }
    merged
}

/// Fetch the host keys of `host` with `ssh-keyscan -H` and store them,
/// replacing plain-text entries already recorded for it.
///
/// Returns the number of keys added.
pub fn scan_and_add(
    dir: &SshDir,
    keyscan: &Tool,
    host: &str,
    port: Option<u16>,
) -> Result<usize> {
    // a leading dash would be read as an option
    if host.is_empty() || host.starts_with('-') || host.chars().any(char::is_whitespace) {
        return Err(SshKeepError::InvalidHost(host.to_string()));
    }
    let port_arg = port.unwrap_or(22).to_string();
    let output = keyscan.run_checked(["-H", "-p", port_arg.as_str(), "--", host])?;
    let scanned = String::from_utf8_lossy(&output.stdout);

    let added = parse_entries(&scanned).len();
    if added == 0 {
        return Err(SshKeepError::ToolFailed {
            tool: keyscan.program().to_string(),
            message: format!("no host keys returned for {host}"),
        });
    }

    let merged = merge_scanned(&read_raw(dir)?, &host_target(host, port), &scanned);
    write_raw(dir, &merged)?;
    info!(host, added, "host keys added to known_hosts");
    Ok(added)
}

/// Hosts recognised in known_hosts even without a config entry
pub const COMMON_HOSTS: [&str; 3] = ["github.com", "gitlab.com", "bitbucket.org"];

/// Map known_hosts line numbers to the config aliases whose host they trust.
///
/// Each host is looked up with `ssh-keygen -F`, so hashed entries match too.
/// [`COMMON_HOSTS`] are labelled by name. Hosts whose lookup fails are left
/// out; a missing `ssh-keygen` is an error.
pub fn match_config_hosts(
    dir: &SshDir,
    keygen: &Tool,
    hosts: &[HostEntry],
) -> Result<BTreeMap<usize, Vec<String>>> {
    let mut matches: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    if !dir.known_hosts_path().exists() {
        return Ok(matches);
    }

    let config_targets = hosts.iter().map(|entry| {
        let host = if entry.host_name.is_empty() {
            &entry.alias
        } else {
            &entry.host_name
        };
        (entry.alias.as_str(), host.as_str(), entry.port.parse::<u16>().ok())
    });
    let common_targets = COMMON_HOSTS.iter().map(|host| (*host, *host, None));

    for (label, host, port) in config_targets.chain(common_targets) {
        let found = match lookup(dir, keygen, host, port) {
            Ok(found) => found,
            Err(e @ SshKeepError::ToolMissing(_)) => return Err(e),
            Err(e) => {
                debug!(host, error = %e, "known_hosts lookup failed");
                continue;
            }
        };
        for entry in found.iter().filter(|entry| entry.line > 0) {
            let labels = matches.entry(entry.line).or_default();
            if !labels.iter().any(|existing| existing == label) {
                labels.push(label.to_string());
            }
        }
    }

    Ok(matches)
}
