//! gzip-compressed tar snapshots of the SSH directory

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder, EntryType};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{io_at, Result, SshKeepError};
use crate::sshdir::{self, SshDir};

/// Write the whole SSH root into a new file at `archive_path`.
///
/// Every file and directory below the root is stored under its path relative
/// to the root; directories get their own entries so empty ones survive a
/// restore. Symlinks to regular files are stored as the file they point to.
/// Sockets, fifos, devices, dangling links and links to directories are
/// skipped. An existing `archive_path` is never overwritten. A failure
/// part-way leaves the partial archive behind.
pub(crate) fn write_archive(root: &Path, archive_path: &Path) -> Result<()> {
    let file = create_new(archive_path)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| SshKeepError::UnsafeArchivePath(entry.path().display().to_string()))?;

        match archivable_kind(entry.path(), entry.file_type()) {
            Some(Kind::Dir) => builder
                .append_dir(relative, entry.path())
                .map_err(io_at(entry.path()))?,
            Some(Kind::File) => builder
                .append_path_with_name(entry.path(), relative)
                .map_err(io_at(entry.path()))?,
            None => {
                warn!(path = %relative.display(), "skipping entry that cannot be archived");
                continue;
            }
        }
        debug!(path = %relative.display(), "archived");
    }

    let encoder = builder.into_inner().map_err(io_at(archive_path))?;
    let writer = encoder.finish().map_err(io_at(archive_path))?;
    let file = writer
        .into_inner()
        .map_err(|e| io_at(archive_path)(e.into_error()))?;
    file.sync_all().map_err(io_at(archive_path))?;
    Ok(())
}

enum Kind {
    Dir,
    File,
}

fn archivable_kind(path: &Path, file_type: fs::FileType) -> Option<Kind> {
    if file_type.is_dir() {
        return Some(Kind::Dir);
    }
    if file_type.is_file() {
        return Some(Kind::File);
    }
    // only links that resolve to a regular file are kept
    if file_type.is_symlink() && fs::metadata(path).is_ok_and(|m| m.is_file()) {
        return Some(Kind::File);
    }
    None
}

fn create_new(path: &Path) -> Result<File> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let name = path.file_name().unwrap_or(path.as_os_str());
            Err(SshKeepError::BackupExists(name.to_string_lossy().into_owned()))
        }
        Err(e) => Err(io_at(path)(e)),
    }
}

/// Replace the contents of the SSH root with the archive at `archive_path`.
///
/// Not transactional: a failure part-way leaves the root partially restored.
pub(crate) fn restore_archive(dir: &SshDir, archive_path: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(io_at(archive_path))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut entries = archive.entries().map_err(io_at(archive_path))?.peekable();
    // an unreadable archive must fail before the root is cleared
    if let Some(Err(e)) = entries.peek() {
        return Err(io_at(archive_path)(io::Error::new(e.kind(), e.to_string())));
    }

    dir.ensure_root()?;
    clear_dir(dir.root())?;

    let mut restored = 0usize;
    for entry in entries {
        let mut entry = entry.map_err(io_at(archive_path))?;
        let entry_path = entry.path().map_err(io_at(archive_path))?.into_owned();
        let target = safe_destination(dir.root(), &entry_path)?;
        let mode = entry.header().mode().map_err(io_at(archive_path))? & 0o777;

        match entry.header().entry_type() {
            EntryType::Directory => {
                sshdir::ensure_private_dir(&target)?;
                apply_mode(&target, mode)?;
            }
            EntryType::Regular | EntryType::Continuous => {
                if target == dir.root() {
                    return Err(SshKeepError::UnsafeArchivePath(entry_path.display().to_string()));
                }
                if let Some(parent) = target.parent() {
                    sshdir::ensure_private_dir(parent)?;
                }
                let mut out = create_with_mode(&target, mode)?;
                io::copy(&mut entry, &mut out).map_err(io_at(&target))?;
            }
            other => {
                warn!(
                    path = %entry_path.display(),
                    kind = ?other,
                    "skipping unsupported archive entry"
                );
                continue;
            }
        }
        restored += 1;
    }

    info!(entries = restored, "archive extracted");
    Ok(())
}

/// Remove every top-level entry of `root`, keeping `root` itself.
fn clear_dir(root: &Path) -> Result<()> {
    for entry in fs::read_dir(root).map_err(io_at(root))? {
        let entry = entry.map_err(io_at(root))?;
        let path = entry.path();
        let result = if entry.file_type().map_err(io_at(&path))?.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(io_at(&path))?;
    }
    Ok(())
}

/// Join an archive entry path onto `root`, refusing anything that would land
/// outside it.
///
/// `..` components are resolved lexically; absolute paths are rejected.
pub(crate) fn safe_destination(root: &Path, entry_path: &Path) -> Result<PathBuf> {
    let unsafe_path = || SshKeepError::UnsafeArchivePath(entry_path.display().to_string());

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in entry_path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop().ok_or_else(unsafe_path)?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(unsafe_path()),
        }
    }

    let target = parts.iter().fold(root.to_path_buf(), |path, part| path.join(part));
    if !target.starts_with(root) {
        return Err(unsafe_path());
    }
    Ok(target)
}

fn create_with_mode(path: &Path, mode: u32) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let file = options.open(path).map_err(io_at(path))?;
    // the umask may have narrowed the mode on creation
    apply_mode(path, mode)?;
    Ok(file)
}

fn apply_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(io_at(path))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}
