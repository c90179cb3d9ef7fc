//! New key pairs and comment edits through `ssh-keygen`

use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroize;

use crate::error::{Result, SshKeepError};
use crate::sshdir::{self, SshDir};
use crate::tool::Tool;

use super::{get_key, SshKey, PUBLIC_SUFFIX};

/// Algorithms offered for new keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    #[default]
    Ed25519,
    Rsa,
    Ecdsa,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::Rsa => "rsa",
            Self::Ecdsa => "ecdsa",
        }
    }

    /// Only rsa and ecdsa take a `-b` size.
    pub fn accepts_bits(&self) -> bool {
        matches!(self, Self::Rsa | Self::Ecdsa)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(Self::Ed25519),
            "rsa" => Ok(Self::Rsa),
            "ecdsa" => Ok(Self::Ecdsa),
            other => Err(format!(
                "unsupported key type '{other}' (expected ed25519, rsa or ecdsa)"
            )),
        }
    }
}

/// Parameters of a new key pair. The passphrase is wiped on drop.
pub struct KeyGenRequest {
    pub name: String,
    pub key_type: KeyType,
    pub bits: Option<u32>,
    pub comment: String,
    pub passphrase: String,
}

impl KeyGenRequest {
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
            bits: None,
            comment: String::new(),
            passphrase: String::new(),
        }
    }

    fn keygen_args(&self, path: &std::path::Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-q".into(),
            "-t".into(),
            self.key_type.as_str().into(),
            "-f".into(),
            path.as_os_str().to_os_string(),
            "-N".into(),
            self.passphrase.as_str().into(),
        ];
        if !self.comment.is_empty() {
            args.push("-C".into());
            args.push(self.comment.as_str().into());
        }
        if let Some(bits) = self.bits.filter(|_| self.key_type.accepts_bits()) {
            args.push("-b".into());
            args.push(bits.to_string().into());
        }
        args
    }
}

impl Drop for KeyGenRequest {
    fn drop(&mut self) {
        self.passphrase.zeroize();
    }
}

impl fmt::Debug for KeyGenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGenRequest")
            .field("name", &self.name)
            .field("key_type", &self.key_type)
            .field("bits", &self.bits)
            .field("comment", &self.comment)
            .finish_non_exhaustive()
    }
}

/// Create `<name>` and `<name>.pub` in the root, never overwriting.
pub fn generate_key(dir: &SshDir, keygen: &Tool, request: &KeyGenRequest) -> Result<SshKey> {
    sshdir::validate_file_name(&request.name)?;
    dir.ensure_root()?;

    let path = dir.path(&request.name);
    if path.exists() || dir.path(&format!("{}{PUBLIC_SUFFIX}", request.name)).exists() {
        return Err(SshKeepError::KeyAlreadyExists(request.name.clone()));
    }

    let args = request.keygen_args(&path);
    let result = keygen.run_checked(&args);
    wipe(args);
    result?;

    dir.set_key_permissions(&request.name)?;
    info!(key = %request.name, key_type = %request.key_type, "key generated");
    get_key(dir, &request.name)
}

/// The argument list carries a copy of the passphrase.
fn wipe(args: Vec<OsString>) {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStringExt;
        for arg in args {
            arg.into_vec().zeroize();
        }
    }
    #[cfg(not(unix))]
    drop(args);
}

/// Rewrite the comment of an existing key pair with `ssh-keygen -c`.
pub fn update_comment(dir: &SshDir, keygen: &Tool, name: &str, comment: &str) -> Result<SshKey> {
    sshdir::validate_file_name(name)?;

    let path = dir.path(name);
    if !path.is_file() {
        return Err(SshKeepError::KeyNotFound(name.to_string()));
    }

    let args = [
        OsString::from("-c"),
        OsString::from("-C"),
        OsString::from(comment),
        OsString::from("-f"),
        path.into_os_string(),
    ];
    keygen.run_checked(&args)?;

    info!(key = name, "key comment updated");
    get_key(dir, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SshDir) {
        let tmp = TempDir::new().unwrap();
        let dir = SshDir::new(tmp.path().join(".ssh"));
        (tmp, dir)
    }

    #[test]
    fn test_key_type_parsing() {
        assert_eq!("ED25519".parse::<KeyType>().unwrap(), KeyType::Ed25519);
        assert_eq!("rsa".parse::<KeyType>().unwrap(), KeyType::Rsa);
        assert!("dsa".parse::<KeyType>().is_err());
        assert_eq!(KeyType::Ecdsa.to_string(), "ecdsa");
    }

    #[test]
    fn test_bits_only_for_rsa_and_ecdsa() {
        let path = std::path::Path::new("/tmp/k");

        let mut request = KeyGenRequest::new("k", KeyType::Ed25519);
        request.bits = Some(4096);
        assert!(!request.keygen_args(path).iter().any(|a| a == "-b"));

        let mut request = KeyGenRequest::new("k", KeyType::Rsa);
        request.bits = Some(4096);
        request.comment = "ops".into();
        let args = request.keygen_args(path);
        let tail: Vec<_> = args[7..].iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(tail, ["-C", "ops", "-b", "4096"]);
    }

    #[test]
    fn test_debug_hides_passphrase() {
        let mut request = KeyGenRequest::new("k", KeyType::Ed25519);
        request.passphrase = "hunter2".into();
        assert!(!format!("{request:?}").contains("hunter2"));
    }

    #[test]
    fn test_generate_rejects_bad_name_before_running() {
        let (_tmp, dir) = setup();
        let request = KeyGenRequest::new("../escape", KeyType::Ed25519);

        let err = generate_key(&dir, &Tool::new("sshkeep-not-installed"), &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert!(!dir.root().exists());
    }

    #[test]
    fn test_generate_refuses_existing_key() {
        let (_tmp, dir) = setup();
        dir.ensure_root().unwrap();
        fs::write(dir.path("id_taken"), "private").unwrap();

        let request = KeyGenRequest::new("id_taken", KeyType::Ed25519);
        let err = generate_key(&dir, &Tool::keygen(), &request).unwrap_err();
        assert!(matches!(err, SshKeepError::KeyAlreadyExists(_)));
        assert_eq!(fs::read_to_string(dir.path("id_taken")).unwrap(), "private");
    }

    #[test]
    fn test_update_comment_missing_key() {
        let (_tmp, dir) = setup();
        let err = update_comment(&dir, &Tool::keygen(), "absent", "x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_generate_and_recomment_with_keygen() {
        let keygen = Tool::keygen();
        if !keygen.is_available() {
            return;
        }
        let (_tmp, dir) = setup();

        let mut request = KeyGenRequest::new("id_test", KeyType::Ed25519);
        request.comment = "first@host".into();
        let key = generate_key(&dir, &keygen, &request).unwrap();

        assert_eq!(key.name, "id_test");
        assert_eq!(key.key_type, "ssh-ed25519");
        assert_eq!(key.comment, "first@host");
        assert!(key.has_private);
        assert!(key.fingerprint.starts_with("SHA256:"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dir.path("id_test")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let key = update_comment(&dir, &keygen, "id_test", "second@host").unwrap();
        assert_eq!(key.comment, "second@host");
    }
}
