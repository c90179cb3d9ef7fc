//! `sshkeep host ...`

use std::path::Path;

use colored::Colorize;

use crate::error::Result;
use crate::hosts::{self, HostEntry};

use super::{confirm, heading, or_dash, read_input, rule, Context};

/// Field values given on the command line; `None` leaves a field alone.
#[derive(Debug, Default)]
pub struct HostChanges {
    pub host_name: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub identity_file: Option<String>,
    /// Extra directives as `(key, value)`; an empty value removes the key
    pub options: Vec<(String, String)>,
}

impl HostChanges {
    pub fn apply(self, mut entry: HostEntry) -> HostEntry {
        if let Some(host_name) = self.host_name {
            entry.host_name = host_name;
        }
        if let Some(user) = self.user {
            entry.user = user;
        }
        if let Some(port) = self.port {
            entry.port = port.to_string();
        }
        if let Some(identity_file) = self.identity_file {
            entry.identity_file = identity_file;
        }
        for (key, value) in self.options {
            entry.options.retain(|k, _| !k.eq_ignore_ascii_case(&key));
            if !value.is_empty() {
                entry.options.insert(key, value);
            }
        }
        entry
    }
}

/// Parse a `Key=Value` command-line option.
pub fn parse_option(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return Err(format!("invalid option name '{key}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub fn list(ctx: &Context) -> Result<()> {
    let entries = hosts::list_hosts(&ctx.dir)?;
    if ctx.emit_json(&entries)? {
        return Ok(());
    }

    heading("=== SSH hosts ===");
    if entries.is_empty() {
        println!("No hosts configured in {}.", ctx.dir.config_path().display());
        return Ok(());
    }

    println!(
        "{:<20} {:<35} {:<30}",
        "ALIAS".bold(),
        "CONNECTION".bold(),
        "IDENTITY".bold()
    );
    rule(85);
    for entry in &entries {
        println!(
            "{:<20} {:<35} {:<30}",
            entry.alias,
            entry.connection_string(),
            or_dash(&entry.identity_file)
        );
    }
    println!();
    Ok(())
}

pub fn show(ctx: &Context, alias: &str) -> Result<()> {
    let entry = hosts::get_host(&ctx.dir, alias)?;
    if ctx.emit_json(&entry)? {
        return Ok(());
    }

    println!("{} {}", "Host".cyan().bold(), entry.alias.bold());
    println!("  {:<14} {}", "HostName", or_dash(&entry.host_name));
    println!("  {:<14} {}", "User", or_dash(&entry.user));
    println!("  {:<14} {}", "Port", or_dash(&entry.port));
    println!("  {:<14} {}", "IdentityFile", or_dash(&entry.identity_file));
    for (key, value) in &entry.options {
        println!("  {:<14} {}", key, value);
    }
    Ok(())
}

pub fn add(ctx: &Context, alias: &str, changes: HostChanges) -> Result<()> {
    let entry = changes.apply(HostEntry::new(alias));
    hosts::add_host(&ctx.dir, &entry)?;

    if !ctx.emit_json(&entry)? {
        ctx.success(&format!("Host '{}' added.", alias));
    }
    Ok(())
}

pub fn update(ctx: &Context, alias: &str, changes: HostChanges) -> Result<()> {
    let entry = changes.apply(hosts::get_host(&ctx.dir, alias)?);
    hosts::update_host(&ctx.dir, &entry)?;

    if !ctx.emit_json(&entry)? {
        ctx.success(&format!("Host '{}' updated.", alias));
    }
    Ok(())
}

pub fn remove(ctx: &Context, alias: &str, yes: bool) -> Result<()> {
    // fail on a missing alias before prompting
    hosts::get_host(&ctx.dir, alias)?;

    if !yes && !confirm(&format!("Remove host '{}' from the SSH config?", alias)) {
        println!("Cancelled.");
        return Ok(());
    }

    hosts::delete_host(&ctx.dir, alias)?;
    ctx.success(&format!("Host '{}' removed.", alias));
    Ok(())
}

/// Identity files and how many hosts use each
pub fn refs(ctx: &Context) -> Result<()> {
    let counts = hosts::key_ref_count(&ctx.dir)?;
    if ctx.emit_json(&counts)? {
        return Ok(());
    }

    if counts.is_empty() {
        println!("No host references an identity file.");
        return Ok(());
    }
    println!("{:<50} {}", "IDENTITY FILE".bold(), "HOSTS".bold());
    rule(58);
    for (identity_file, count) in &counts {
        println!("{:<50} {}", identity_file, count);
    }
    Ok(())
}

pub fn raw(ctx: &Context) -> Result<()> {
    let text = hosts::read_raw(&ctx.dir)?;
    if !ctx.emit_json(&text)? {
        print!("{}", text);
    }
    Ok(())
}

/// Replace the whole config file with the contents of `file`.
pub fn import(ctx: &Context, file: &Path, yes: bool) -> Result<()> {
    let text = read_input(file)?;
    let count = hosts::parse_entries(&text).len();

    if !yes
        && !confirm(&format!(
            "Replace {} with {} ({} hosts)?",
            ctx.dir.config_path().display(),
            file.display(),
            count
        ))
    {
        println!("Cancelled.");
        return Ok(());
    }

    hosts::write_raw(&ctx.dir, &text)?;
    ctx.success(&format!("SSH config replaced ({} hosts).", count));
    Ok(())
}
