//! Key pairs found in the SSH directory

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use ssh_key::{HashAlg, PublicKey};
use tracing::{debug, info, warn};

use crate::error::{io_at, Result, SshKeepError};
use crate::sshdir::{self, SshDir};

pub const PUBLIC_SUFFIX: &str = ".pub";

/// A key pair, discovered through its `<name>.pub` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKey {
    pub name: String,
    pub key_type: String,
    pub fingerprint: String,
    /// The `.pub` line, trimmed
    pub public_key: String,
    pub comment: String,
    /// Whether the private half `<name>` exists next to the public file
    pub has_private: bool,
    pub modified: DateTime<Local>,
    /// Combined size of both files in bytes
    pub size: u64,
}

impl SshKey {
    fn load(root: &Path, name: &str) -> Result<Self> {
        let public_path = root.join(format!("{name}{PUBLIC_SUFFIX}"));
        let text = fs::read_to_string(&public_path).map_err(io_at(&public_path))?;
        let public_key = text.trim().to_string();

        let key = PublicKey::from_openssh(&public_key).map_err(|e| SshKeepError::InvalidKey {
            name: name.to_string(),
            message: e.to_string(),
        })?;

        let public_meta = fs::metadata(&public_path).map_err(io_at(&public_path))?;
        let private_meta = fs::metadata(root.join(name)).ok().filter(|m| m.is_file());

        Ok(Self {
            name: name.to_string(),
            key_type: key.algorithm().as_str().to_string(),
            fingerprint: key.fingerprint(HashAlg::Sha256).to_string(),
            comment: key.comment().to_string(),
            public_key,
            has_private: private_meta.is_some(),
            modified: public_meta.modified().map_err(io_at(&public_path))?.into(),
            size: public_meta.len() + private_meta.map_or(0, |m| m.len()),
        })
    }
}

/// Every parseable key pair in the root, sorted by name.
///
/// Unparseable `.pub` files are skipped; a missing root yields an empty list.
pub fn list_keys(dir: &SshDir) -> Result<Vec<SshKey>> {
    let root = dir.root();
    let read_dir = match fs::read_dir(root) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_at(root)(e)),
    };

    let mut keys = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(io_at(root))?;
        if !entry.file_type().map_err(io_at(&entry.path()))?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name
            .to_str()
            .and_then(|f| f.strip_suffix(PUBLIC_SUFFIX))
            .filter(|name| !name.is_empty())
        else {
            continue;
        };

        match SshKey::load(root, name) {
            Ok(key) => keys.push(key),
            Err(e) => warn!(key = name, error = %e, "skipping unreadable public key"),
        }
    }

    keys.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(count = keys.len(), "listed keys");
    Ok(keys)
}

/// Keys whose name, type, comment or fingerprint contain `query`, ignoring case.
pub fn filter(keys: &[SshKey], query: &str) -> Vec<SshKey> {
    let query = query.to_lowercase();
    keys.iter()
        .filter(|key| {
            [&key.name, &key.key_type, &key.comment, &key.fingerprint]
                .iter()
                .any(|field| field.to_lowercase().contains(&query))
        })
        .cloned()
        .collect()
}

pub fn get_key(dir: &SshDir, name: &str) -> Result<SshKey> {
    sshdir::validate_file_name(name)?;
    if !dir.path(&format!("{name}{PUBLIC_SUFFIX}")).is_file() {
        return Err(SshKeepError::KeyNotFound(name.to_string()));
    }
    SshKey::load(dir.root(), name)
}

/// Remove the private and public files of `name`, whichever exist.
pub fn delete_key(dir: &SshDir, name: &str) -> Result<()> {
    sshdir::validate_file_name(name)?;

    let mut removed = 0;
    for path in [dir.path(name), dir.path(&format!("{name}{PUBLIC_SUFFIX}"))] {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_at(&path)(e)),
        }
    }

    if removed == 0 {
        return Err(SshKeepError::KeyNotFound(name.to_string()));
    }
    info!(key = name, files = removed, "key deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    const PUBLIC_LINE: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl me@laptop";

    fn setup() -> (TempDir, SshDir) {
        let tmp = TempDir::new().unwrap();
        let dir = SshDir::new(tmp.path().join(".ssh"));
        dir.ensure_root().unwrap();
        (tmp, dir)
    }

    #[test]
    fn test_list_keys_from_public_file() {
        let (_tmp, dir) = setup();
        fs::write(dir.path("id_laptop.pub"), format!("{PUBLIC_LINE}\n")).unwrap();
        fs::write(dir.path("config"), "Host x\n").unwrap();

        let keys = list_keys(&dir).unwrap();
        assert_eq!(keys.len(), 1);

        let key = &keys[0];
        assert_eq!(key.name, "id_laptop");
        assert_eq!(key.key_type, "ssh-ed25519");
        assert_eq!(key.comment, "me@laptop");
        assert_eq!(key.public_key, PUBLIC_LINE);
        assert_eq!(
            key.fingerprint,
            "SHA256:+DiY3wvvV6TuJJhbpZisF/zLDA0zPMSvHdkr4UvCOqU"
        );
        assert!(!key.has_private);
        assert_eq!(key.size, PUBLIC_LINE.len() as u64 + 1);
    }

    #[test]
    fn test_list_keys_counts_private_half() {
        let (_tmp, dir) = setup();
        fs::write(dir.path("id_work.pub"), PUBLIC_LINE).unwrap();
        fs::write(dir.path("id_work"), "0123456789").unwrap();

        let key = get_key(&dir, "id_work").unwrap();
        assert!(key.has_private);
        assert_eq!(key.size, PUBLIC_LINE.len() as u64 + 10);
    }

    #[test]
    fn test_list_keys_sorted_and_skips_garbage() {
        let (_tmp, dir) = setup();
        fs::write(dir.path("zeta.pub"), PUBLIC_LINE).unwrap();
        fs::write(dir.path("alpha.pub"), PUBLIC_LINE).unwrap();
        fs::write(dir.path("broken.pub"), "not a key").unwrap();
        fs::create_dir(dir.path("dir.pub")).unwrap();

        let names: Vec<_> = list_keys(&dir).unwrap().into_iter().map(|k| k.name).collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }

    #[test]
    fn test_filter_keys() {
        let (_tmp, dir) = setup();
        fs::write(dir.path("id_work.pub"), PUBLIC_LINE).unwrap();
        fs::write(dir.path("deploy.pub"), PUBLIC_LINE.replace("me@laptop", "ci@build")).unwrap();
        let keys = list_keys(&dir).unwrap();

        let names = |query: &str| -> Vec<String> {
            filter(&keys, query).into_iter().map(|k| k.name).collect()
        };
        assert_eq!(names("WORK"), ["id_work"]);
        assert_eq!(names("ci@"), ["deploy"]);
        assert_eq!(names("ed25519"), ["deploy", "id_work"]);
        assert_eq!(names("+diy3wvv"), ["deploy", "id_work"]);
        assert!(names("rsa").is_empty());
    }

    #[test]
    fn test_list_keys_without_root() {
        let tmp = TempDir::new().unwrap();
        let dir = SshDir::new(tmp.path().join("missing"));
        assert!(list_keys(&dir).unwrap().is_empty());
    }

    #[test]
    fn test_get_key_errors() {
        let (_tmp, dir) = setup();
        fs::write(dir.path("broken.pub"), "not a key").unwrap();

        assert_eq!(get_key(&dir, "absent").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(get_key(&dir, "broken").unwrap_err().kind(), ErrorKind::Invalid);
        assert_eq!(get_key(&dir, "../id_rsa").unwrap_err().kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_delete_key() {
        let (_tmp, dir) = setup();
        fs::write(dir.path("id_old"), "private").unwrap();
        fs::write(dir.path("id_old.pub"), PUBLIC_LINE).unwrap();

        delete_key(&dir, "id_old").unwrap();
        assert!(!dir.path("id_old").exists());
        assert!(!dir.path("id_old.pub").exists());

        let err = delete_key(&dir, "id_old").unwrap_err();
        assert!(matches!(err, SshKeepError::KeyNotFound(_)));
    }

    #[test]
    fn test_delete_key_rejects_traversal() {
        let (tmp, dir) = setup();
        fs::write(tmp.path().join("victim"), "x").unwrap();

        let err = delete_key(&dir, "../victim").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        assert!(tmp.path().join("victim").exists());
    }
}
