//! sshkeep - manage the contents of an OpenSSH user directory
//!
//! This crate reads and edits the files OpenSSH keeps in `~/.ssh`:
//! - `config` host blocks, edited in place without disturbing the rest
//! - `known_hosts` entries with SHA-256 fingerprints
//! - key pairs, generated through `ssh-keygen`
//! - whole-directory `.tar.gz` backups kept next to the SSH directory

pub mod backup;
pub mod cli;
pub mod error;
pub mod hosts;
pub mod keys;
pub mod known_hosts;
pub mod settings;
pub mod sshdir;
pub mod tool;

pub use error::{ErrorKind, Result, SshKeepError};
pub use sshdir::SshDir;
