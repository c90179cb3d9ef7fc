//! `sshkeep known-hosts ...`

use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::hosts;
use crate::known_hosts::{self, KnownHostEntry};

use super::{confirm, heading, or_dash, read_input, rule, Context};

/// A `list` row: the entry plus the config aliases that resolve to it
#[derive(Serialize)]
struct ListedEntry<'a> {
    #[serde(flatten)]
    entry: &'a KnownHostEntry,
    aliases: &'a [String],
}

fn print_table(entries: &[KnownHostEntry], aliases: &BTreeMap<usize, Vec<String>>) {
    println!(
        "{:>5}  {:<40} {:<22} {:<52} {}",
        "LINE".bold(),
        "HOSTS".bold(),
        "TYPE".bold(),
        "FINGERPRINT".bold(),
        "ALIASES".bold()
    );
    rule(140);
    for entry in entries {
        let hosts = if entry.is_hashed {
            "(hashed)".dimmed().to_string()
        } else {
            entry.hosts.clone()
        };
        let labels = aliases.get(&entry.line).map(|labels| labels.join(", "));
        println!(
            "{:>5}  {:<40} {:<22} {:<52} {}",
            entry.line,
            hosts,
            or_dash(&entry.key_type),
            or_dash(&entry.fingerprint),
            or_dash(labels.as_deref().unwrap_or_default())
        );
    }
}

/// Line number to alias labels; empty when `ssh-keygen` is unavailable.
fn config_aliases(ctx: &Context) -> Result<BTreeMap<usize, Vec<String>>> {
    let keygen = ctx.settings.keygen();
    if !keygen.is_available() {
        warn!("ssh-keygen not found, aliases column left empty");
        return Ok(BTreeMap::new());
    }
    known_hosts::match_config_hosts(&ctx.dir, &keygen, &hosts::list_hosts(&ctx.dir)?)
}

pub fn list(ctx: &Context, query: Option<&str>) -> Result<()> {
    let mut entries = known_hosts::list_known_hosts(&ctx.dir)?;
    if let Some(query) = query {
        entries = known_hosts::filter(&entries, query);
    }
    let aliases = if entries.is_empty() {
        BTreeMap::new()
    } else {
        config_aliases(ctx)?
    };

    let rows: Vec<_> = entries
        .iter()
        .map(|entry| ListedEntry {
            entry,
            aliases: aliases.get(&entry.line).map(Vec::as_slice).unwrap_or_default(),
        })
        .collect();
    if ctx.emit_json(&rows)? {
        return Ok(());
    }

    heading("=== Known hosts ===");
    if entries.is_empty() {
        println!("No entries.");
        return Ok(());
    }
    print_table(&entries, &aliases);
    println!();
    Ok(())
}

pub fn remove(ctx: &Context, line: usize, yes: bool) -> Result<()> {
    let entries = known_hosts::list_known_hosts(&ctx.dir)?;
    let described = entries
        .iter()
        .find(|entry| entry.line == line)
        .map(|entry| format!("line {} ({} {})", line, entry.hosts, entry.key_type))
        .unwrap_or_else(|| format!("line {}", line));

    if !yes && !confirm(&format!("Remove {} from known_hosts?", described)) {
        println!("Cancelled.");
        return Ok(());
    }

    known_hosts::remove_at_line(&ctx.dir, line)?;
    ctx.success(&format!("Removed {}. Later line numbers have shifted.", described));
    Ok(())
}

pub fn lookup(ctx: &Context, host: &str, port: Option<u16>) -> Result<()> {
    let entries = known_hosts::lookup(&ctx.dir, &ctx.settings.keygen(), host, port)?;
    if ctx.emit_json(&entries)? {
        return Ok(());
    }

    if entries.is_empty() {
        println!("{} is not in known_hosts.", known_hosts::host_target(host, port));
        return Ok(());
    }
    print_table(&entries, &BTreeMap::new());
    Ok(())
}

pub fn scan(ctx: &Context, host: &str, port: Option<u16>) -> Result<()> {
    let added = known_hosts::scan_and_add(&ctx.dir, &ctx.settings.keyscan(), host, port)?;
    if !ctx.emit_json(&serde_json::json!({ "host": host, "added": added }))? {
        ctx.success(&format!("Added {} host key(s) for {}.", added, host));
    }
    Ok(())
}

pub fn raw(ctx: &Context) -> Result<()> {
    let text = known_hosts::read_raw(&ctx.dir)?;
    if !ctx.emit_json(&text)? {
        print!("{}", text);
    }
    Ok(())
}

pub fn import(ctx: &Context, file: &Path, yes: bool) -> Result<()> {
    let text = read_input(file)?;
    let count = known_hosts::parse_entries(&text).len();

    if !yes
        && !confirm(&format!(
            "Replace {} with {} ({} entries)?",
            ctx.dir.known_hosts_path().display(),
            file.display(),
            count
        ))
    {
        println!("Cancelled.");
        return Ok(());
    }

    known_hosts::write_raw(&ctx.dir, &text)?;
    ctx.success(&format!("known_hosts replaced ({} entries).", count));
    Ok(())
}
