//! Host entry structure and its rendering as a config block

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SshKeepError};

/// A single `Host` block from the SSH config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEntry {
    /// First pattern of the `Host` line
    pub alias: String,
    #[serde(default)]
    pub host_name: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub identity_file: String,
    /// Every other directive, keyed by the name as written in the file
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl HostEntry {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ..Self::default()
        }
    }

    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    pub fn with_identity_file(mut self, identity_file: impl Into<String>) -> Self {
        self.identity_file = identity_file.into();
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive lookup in `options`
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Connection target in `user@host:port` form, for display
    pub fn connection_string(&self) -> String {
        let host = if self.host_name.is_empty() {
            &self.alias
        } else {
            &self.host_name
        };
        let mut target = if self.user.is_empty() {
            host.clone()
        } else {
            format!("{}@{}", self.user, host)
        };
        if !self.port.is_empty() && self.port != "22" {
            let _ = write!(target, ":{}", self.port);
        }
        target
    }

    /// Set one of the four known fields, or an option, by directive name.
    pub(crate) fn set_directive(&mut self, key: &str, value: &str) {
        match key.to_ascii_lowercase().as_str() {
            "hostname" => self.host_name = value.to_string(),
            "user" => self.user = value.to_string(),
            "port" => self.port = value.to_string(),
            "identityfile" => self.identity_file = value.to_string(),
            _ => {
                self.options.insert(key.to_string(), value.to_string());
            }
        }
    }
}

/// Reject aliases the config engine cannot round-trip.
pub fn validate_alias(alias: &str) -> Result<()> {
    if alias.is_empty() || alias == "*" || alias.chars().any(char::is_whitespace) {
        return Err(SshKeepError::InvalidAlias(alias.to_string()));
    }
    Ok(())
}

/// Render `entry` as a config block, preceded by a blank line.
pub fn format_block(entry: &HostEntry) -> String {
    let mut block = String::new();
    let _ = writeln!(block);
    let _ = writeln!(block, "Host {}", entry.alias);

    let fields = [
        ("HostName", &entry.host_name),
        ("User", &entry.user),
        ("Port", &entry.port),
        ("IdentityFile", &entry.identity_file),
    ];
    for (key, value) in fields {
        if !value.is_empty() {
            let _ = writeln!(block, "    {key} {value}");
        }
    }
    for (key, value) in &entry.options {
        let _ = writeln!(block, "    {key} {value}");
    }

    block
}

/// How many entries reference each `IdentityFile` value.
pub fn reference_count(entries: &[HostEntry]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        if !entry.identity_file.is_empty() {
            *counts.entry(entry.identity_file.clone()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_block_field_order() {
        let entry = HostEntry::new("web")
            .with_identity_file("~/.ssh/id_web")
            .with_port("2200")
            .with_user("deploy")
            .with_host_name("web.example.com")
            .with_option("ForwardAgent", "yes");

        assert_eq!(
            format_block(&entry),
            "\nHost web\n    HostName web.example.com\n    User deploy\n    Port 2200\n    IdentityFile ~/.ssh/id_web\n    ForwardAgent yes\n"
        );
    }

    #[test]
    fn test_format_block_skips_empty_fields() {
        let entry = HostEntry::new("bare").with_user("root");
        assert_eq!(format_block(&entry), "\nHost bare\n    User root\n");
    }

    #[test]
    fn test_validate_alias() {
        assert!(validate_alias("myserver").is_ok());
        assert!(validate_alias("db-1.internal").is_ok());
        assert!(validate_alias("").is_err());
        assert!(validate_alias("*").is_err());
        assert!(validate_alias("two words").is_err());
    }

    #[test]
    fn test_reference_count() {
        let entries = vec![
            HostEntry::new("a").with_identity_file("~/.ssh/id_a"),
            HostEntry::new("b").with_identity_file("~/.ssh/id_a"),
            HostEntry::new("c").with_identity_file("~/.ssh/id_c"),
            HostEntry::new("d"),
        ];

        let counts = reference_count(&entries);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["~/.ssh/id_a"], 2);
        assert_eq!(counts["~/.ssh/id_c"], 1);
    }

    #[test]
    fn test_reference_count_empty() {
        assert!(reference_count(&[]).is_empty());
    }

    #[test]
    fn test_option_lookup_is_case_insensitive() {
        let entry = HostEntry::new("a").with_option("ProxyJump", "bastion");
        assert_eq!(entry.option("proxyjump"), Some("bastion"));
        assert_eq!(entry.option("ForwardAgent"), None);
    }

    #[test]
    fn test_connection_string() {
        let entry = HostEntry::new("a").with_host_name("10.0.0.1").with_user("root");
        assert_eq!(entry.connection_string(), "root@10.0.0.1");

        let entry = entry.with_port("2222");
        assert_eq!(entry.connection_string(), "root@10.0.0.1:2222");

        assert_eq!(HostEntry::new("plain").connection_string(), "plain");
    }

    #[test]
    fn test_json_field_names() {
        let entry = HostEntry::new("a").with_host_name("h").with_identity_file("k");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["hostName"], "h");
        assert_eq!(json["identityFile"], "k");
    }
}
