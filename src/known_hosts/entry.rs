//! known_hosts line format and key fingerprints

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use ssh_key::{HashAlg, PublicKey};

/// Prefix of a host field obscured by `HashKnownHosts`
pub const HASHED_MARKER: &str = "|1|";

/// One entry line of known_hosts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownHostEntry {
    /// 1-based line number, valid only for the read it came from
    pub line: usize,
    pub hosts: String,
    pub key_type: String,
    /// Base64 key blob as written in the file
    pub key: String,
    /// `SHA256:...`, empty when the key could not be decoded
    pub fingerprint: String,
    pub is_hashed: bool,
}

impl KnownHostEntry {
    /// Parse one trimmed, non-comment line.
    ///
    /// Lines with fewer than three fields are kept with the raw text in
    /// `hosts` so line numbering stays stable.
    pub fn parse(line_number: usize, line: &str) -> Self {
        let mut fields = line.split_whitespace();
        let (Some(hosts), Some(key_type), Some(key)) = (fields.next(), fields.next(), fields.next())
        else {
            return Self {
                line: line_number,
                hosts: line.to_string(),
                ..Self::default()
            };
        };

        Self {
            line: line_number,
            hosts: hosts.to_string(),
            key_type: key_type.to_string(),
            key: key.to_string(),
            fingerprint: fingerprint_of(key).unwrap_or_default(),
            is_hashed: hosts.starts_with(HASHED_MARKER),
        }
    }

    /// Whether the plain-text host list contains `target` (`host` or `[host]:port`).
    pub fn names_host(&self, target: &str) -> bool {
        !self.is_hashed && self.hosts.split(',').any(|candidate| candidate == target)
    }
}

/// Host field form used by OpenSSH: bare for port 22, `[host]:port` otherwise.
pub fn host_target(host: &str, port: Option<u16>) -> String {
    match port {
        Some(port) if port != 22 => format!("[{host}]:{port}"),
        _ => host.to_string(),
    }
}

/// SHA-256 fingerprint of a base64 public key blob, OpenSSH style.
///
/// Returns `None` when the text is not base64 or the blob is not a public key.
pub fn fingerprint_of(base64_key: &str) -> Option<String> {
    let blob = STANDARD.decode(base64_key).ok()?;
    let key = PublicKey::from_bytes(&blob).ok()?;
    Some(key.fingerprint(HashAlg::Sha256).to_string())
}

/// Every entry of a known_hosts text; blank and `#` lines are skipped.
pub fn parse_entries(text: &str) -> Vec<KnownHostEntry> {
    text.split('\n')
        .enumerate()
        .filter_map(|(index, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                None
            } else {
                Some(KnownHostEntry::parse(index + 1, line))
            }
        })
        .collect()
}

/// Entries whose hosts, key type or fingerprint contain `query`, ignoring case.
pub fn filter(entries: &[KnownHostEntry], query: &str) -> Vec<KnownHostEntry> {
    let query = query.to_lowercase();
    entries
        .iter()
        .filter(|entry| {
            [&entry.hosts, &entry.key_type, &entry.fingerprint]
                .iter()
                .any(|field| field.to_lowercase().contains(&query))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // github.com's published ed25519 host key
    const ED25519_KEY: &str =
        "AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";
    const ED25519_FINGERPRINT: &str = "SHA256:+DiY3wvvV6TuJJhbpZisF/zLDA0zPMSvHdkr4UvCOqU";

    #[test]
    fn test_parse_entries() {
        let text = format!(
            "github.com ssh-ed25519 {ED25519_KEY}\n192.168.1.1 ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABgQC7 comment\n"
        );

        let entries = parse_entries(&text);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].line, 1);
        assert_eq!(entries[0].hosts, "github.com");
        assert_eq!(entries[0].key_type, "ssh-ed25519");
        assert_eq!(entries[0].key, ED25519_KEY);
        assert!(!entries[0].is_hashed);

        assert_eq!(entries[1].line, 2);
        assert_eq!(entries[1].key_type, "ssh-rsa");
    }

    #[test]
    fn test_fingerprint_of_valid_key() {
        let fingerprint = fingerprint_of(ED25519_KEY).unwrap();

        assert_eq!(fingerprint, ED25519_FINGERPRINT);
        let digest = fingerprint.strip_prefix("SHA256:").unwrap();
        assert_eq!(digest.len(), 43);
        assert!(!digest.ends_with('='));
    }

    #[test]
    fn test_fingerprint_absent_for_bad_material() {
        assert_eq!(fingerprint_of("not base64 at all!"), None);
        // valid base64, truncated rsa blob
        assert_eq!(fingerprint_of("AAAAB3NzaC1yc2EAAAADAQABAAABgQC7"), None);
        // valid base64 that is not a key blob
        assert_eq!(fingerprint_of("aGVsbG8gd29ybGQ="), None);
    }

    #[test]
    fn test_bad_key_keeps_entry() {
        let entries = parse_entries("host ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABgQC7\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hosts, "host");
        assert!(entries[0].fingerprint.is_empty());
    }

    #[test]
    fn test_hashed_entry() {
        let entries = parse_entries(&format!("|1|abc123|def456 ssh-ed25519 {ED25519_KEY}\n"));

        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_hashed);
        assert_eq!(entries[0].fingerprint, ED25519_FINGERPRINT);
    }

    #[test]
    fn test_comments_and_blank_lines_keep_numbering() {
        let text = format!(
            "# comment\ngithub.com ssh-ed25519 {ED25519_KEY}\n\n   \n# another\nshort line\n"
        );
        let entries = parse_entries(&text);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].line, 2);
        assert_eq!(entries[1].line, 6);
        assert_eq!(entries[1].hosts, "short line");
        assert!(entries[1].key_type.is_empty());
    }

    #[test]
    fn test_filter() {
        let text = format!(
            "github.com ssh-ed25519 {ED25519_KEY}\n192.168.1.1 ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABgQC7\ngitlab.com ssh-ed25519 {ED25519_KEY}\n"
        );
        let entries = parse_entries(&text);

        assert_eq!(filter(&entries, "git").len(), 2);
        assert_eq!(filter(&entries, "192.168").len(), 1);
        assert_eq!(filter(&entries, "SSH-RSA").len(), 1);
        assert_eq!(filter(&entries, "+diy3wvv").len(), 2);
        assert!(filter(&entries, "nothing").is_empty());
    }

    #[test]
    fn test_names_host() {
        let entry = KnownHostEntry::parse(
            1,
            "example.com,[alt.example.com]:2222,10.0.0.1 ssh-ed25519 AAAA",
        );

        assert!(entry.names_host("example.com"));
        assert!(entry.names_host("[alt.example.com]:2222"));
        assert!(entry.names_host("10.0.0.1"));
        assert!(!entry.names_host("alt.example.com"));
        assert!(!entry.names_host("example"));

        let hashed = KnownHostEntry::parse(1, "|1|abc|def ssh-ed25519 AAAA");
        assert!(!hashed.names_host("|1|abc|def"));
    }

    #[test]
    fn test_host_target() {
        assert_eq!(host_target("example.com", None), "example.com");
        assert_eq!(host_target("example.com", Some(22)), "example.com");
        assert_eq!(host_target("example.com", Some(2222)), "[example.com]:2222");
    }
}
