//! Line-oriented parser for the OpenSSH config block format

use crate::error::{Result, SshKeepError};

use super::HostEntry;

/// Patterns of a `Host` line, or `None` if `line` is not one.
///
/// The keyword is matched case-insensitively and must be followed by
/// whitespace, so `HostName` never opens a block.
pub(crate) fn host_patterns(line: &str) -> Option<Vec<&str>> {
    let trimmed = line.trim();
    let keyword = trimmed.get(..4)?;
    if !keyword.eq_ignore_ascii_case("host") {
        return None;
    }
    let rest = &trimmed[4..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.split_whitespace().collect())
}

/// Split a directive line into name and value.
///
/// Accepts both `Name value` and `Name=value`. Returns `None` for blank
/// lines, comments and lines without a value.
fn split_directive(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let end = trimmed.find(|c: char| c.is_whitespace() || c == '=')?;
    let key = &trimmed[..end];
    let rest = trimmed[end..].trim_start();
    let value = rest.strip_prefix('=').unwrap_or(rest).trim();

    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Parse every non-wildcard `Host` block of a config file.
pub fn parse_entries(text: &str) -> Vec<HostEntry> {
    let mut entries = Vec::new();
    // `None` while outside any block or inside a skipped `Host *` block.
    let mut current: Option<HostEntry> = None;

    for line in text.lines() {
        if let Some(patterns) = host_patterns(line) {
            entries.extend(current.take());

            current = match patterns.first() {
                Some(&alias) if alias != "*" => Some(HostEntry::new(alias)),
                _ => None,
            };
            continue;
        }

        if let (Some(entry), Some((key, value))) = (current.as_mut(), split_directive(line)) {
            entry.set_directive(key, value);
        }
    }

    entries.extend(current);
    entries
}

/// Find the block whose primary alias is exactly `alias`.
pub fn lookup_by_alias(text: &str, alias: &str) -> Result<HostEntry> {
    parse_entries(text)
        .into_iter()
        .find(|entry| entry.alias == alias)
        .ok_or_else(|| SshKeepError::HostNotFound(alias.to_string()))
}
