//! known_hosts trust store
//!
//! The file is handled as an array of lines: entries can be hashed, so exact
//! host lookups go through `ssh-keygen -F` while this module covers listing,
//! filtering and line-indexed removal.

mod entry;
mod store;

pub use entry::{
    fingerprint_of, filter, host_target, parse_entries, KnownHostEntry, HASHED_MARKER,
};
pub use store::{
    list_known_hosts, lookup, match_config_hosts, merge_scanned, parse_lookup_output, read_raw,
    remove_at_line, remove_line, scan_and_add, write_raw, COMMON_HOSTS,
};
