//! SSH config file engine
//!
//! Turns the `config` text into [`HostEntry`] values and edits single blocks
//! in place, leaving every other byte of the file as it was.

mod entry;
mod parser;
mod splice;
mod store;

pub use entry::{format_block, reference_count, validate_alias, HostEntry};
pub use parser::{lookup_by_alias, parse_entries};
pub use splice::splice_block;
pub use store::{
    add_host, delete_host, get_host, key_ref_count, list_hosts, read_raw, update_host, write_raw,
};
