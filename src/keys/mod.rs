//! Key pairs stored in the SSH directory
//!
//! Keys are found by their `.pub` files and parsed with `ssh-key`; creation
//! and comment edits are delegated to `ssh-keygen` so the private key format
//! is whatever the installed OpenSSH writes.

mod generate;
mod inventory;

pub use generate::{generate_key, update_comment, KeyGenRequest, KeyType};
pub use inventory::{delete_key, filter, get_key, list_keys, SshKey, PUBLIC_SUFFIX};
