//! Location of the SSH directory and the files derived from it

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{io_at, Result, SshKeepError};

const SSH_DIR_NAME: &str = ".ssh";
const CONFIG_FILE: &str = "config";
const KNOWN_HOSTS_FILE: &str = "known_hosts";
const BACKUP_DIR_NAME: &str = ".ssh_backups";

/// Owner-only directory mode for the SSH root and the backup directory.
pub const DIR_MODE: u32 = 0o700;
pub const PRIVATE_FILE_MODE: u32 = 0o600;
pub const PUBLIC_FILE_MODE: u32 = 0o644;

/// An SSH directory rooted at an explicit path.
///
/// All engine operations take one of these so tests can point them at a
/// temporary directory instead of `~/.ssh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshDir {
    root: PathBuf,
}

impl SshDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `explicit` when given, otherwise `~/.ssh`.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        Ok(Self::new(resolve_root(explicit)?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a file directly inside the SSH directory
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn config_path(&self) -> PathBuf {
        self.path(CONFIG_FILE)
    }

    pub fn known_hosts_path(&self) -> PathBuf {
        self.path(KNOWN_HOSTS_FILE)
    }

    /// Backups live next to the SSH directory, never inside it, so a backup
    /// never contains earlier backups.
    pub fn backup_dir(&self) -> PathBuf {
        let parent = self.root.parent().unwrap_or_else(|| Path::new("."));
        parent.join(BACKUP_DIR_NAME)
    }

    pub fn ensure_root(&self) -> Result<()> {
        ensure_private_dir(&self.root)
    }

    pub fn ensure_backup_dir(&self) -> Result<()> {
        ensure_private_dir(&self.backup_dir())
    }

    pub fn set_key_permissions(&self, name: &str) -> Result<()> {
        set_key_permissions(&self.root, name)
    }
}

/// Resolve the SSH root: the explicit path if one was supplied, else `<home>/.ssh`.
pub fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => dirs::home_dir()
            .map(|home| home.join(SSH_DIR_NAME))
            .ok_or(SshKeepError::HomeDirUnavailable),
    }
}

/// Create `path` (and parents) if missing, owner-only on Unix.
pub fn ensure_private_dir(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }

    builder.create(path).map_err(io_at(path))
}

/// Private key `<name>` becomes 0600 and, if present, `<name>.pub` 0644.
pub fn set_key_permissions(root: &Path, name: &str) -> Result<()> {
    let private = root.join(name);
    let public = root.join(format!("{name}.pub"));

    set_mode(&private, PRIVATE_FILE_MODE)?;
    if public.exists() {
        set_mode(&public, PUBLIC_FILE_MODE)?;
    }
    debug!(key = name, "key permissions updated");
    Ok(())
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    let to_error = |source| SshKeepError::Permissions {
        path: path.to_path_buf(),
        source,
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(to_error)
    }

    #[cfg(not(unix))]
    {
        let _ = mode;
        fs::metadata(path).map(|_| ()).map_err(to_error)
    }
}

/// Create or truncate `path` and write `contents`.
///
/// `mode` applies when the file is created; an existing file keeps its mode.
pub fn write_file(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(path).map_err(io_at(path))?;
    file.write_all(contents).map_err(io_at(path))?;
    Ok(())
}

/// Reject names that could address anything other than a file directly
/// inside a known directory.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(SshKeepError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Read a text file, treating absence as `None`.
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_at(path)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_derived_paths() {
        let dir = SshDir::new("/home/alice/.ssh");

        assert_eq!(dir.config_path(), PathBuf::from("/home/alice/.ssh/config"));
        assert_eq!(
            dir.known_hosts_path(),
            PathBuf::from("/home/alice/.ssh/known_hosts")
        );
        assert_eq!(dir.backup_dir(), PathBuf::from("/home/alice/.ssh_backups"));
    }

    #[test]
    fn test_backup_dir_is_not_inside_root() {
        let dir = SshDir::new("/tmp/x/.ssh");
        assert!(!dir.backup_dir().starts_with(dir.root()));
    }

    #[test]
    fn test_resolve_explicit_root() {
        let dir = SshDir::resolve(Some(PathBuf::from("/srv/keys"))).unwrap();
        assert_eq!(dir.root(), Path::new("/srv/keys"));
    }

    #[test]
    fn test_resolve_default_root() {
        let home = dirs::home_dir().unwrap();
        let dir = SshDir::resolve(None).unwrap();
        assert_eq!(dir.root(), home.join(".ssh"));
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_root_is_owner_only_and_idempotent() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let dir = SshDir::new(tmp.path().join(".ssh"));

        dir.ensure_root().unwrap();
        dir.ensure_root().unwrap();
        dir.ensure_backup_dir().unwrap();

        let mode = fs::metadata(dir.root()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
        let mode = fs::metadata(dir.backup_dir()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn test_set_key_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("id_test"), "private").unwrap();
        fs::write(tmp.path().join("id_test.pub"), "public").unwrap();
        fs::set_permissions(tmp.path().join("id_test"), fs::Permissions::from_mode(0o666)).unwrap();

        set_key_permissions(tmp.path(), "id_test").unwrap();

        let private = fs::metadata(tmp.path().join("id_test")).unwrap();
        let public = fs::metadata(tmp.path().join("id_test.pub")).unwrap();
        assert_eq!(private.permissions().mode() & 0o777, 0o600);
        assert_eq!(public.permissions().mode() & 0o777, 0o644);
    }

    #[test]
    fn test_set_key_permissions_missing_private_key() {
        let tmp = TempDir::new().unwrap();
        let err = set_key_permissions(tmp.path(), "missing").unwrap_err();
        assert!(matches!(err, SshKeepError::Permissions { .. }));
    }

    #[test]
    fn test_read_optional_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert!(read_optional(&tmp.path().join("nope")).unwrap().is_none());
    }
}
