//! `sshkeep key ...`

use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use zeroize::Zeroizing;

use crate::error::Result;
use crate::hosts;
use crate::keys::{self, KeyGenRequest, KeyType, SshKey};
use crate::sshdir::SshDir;

use super::{confirm, heading, or_dash, rule, warning, Context};

/// Options of `key generate`; unset values fall back to the settings file.
#[derive(Debug, Default)]
pub struct GenerateOptions {
    pub key_type: Option<KeyType>,
    pub bits: Option<u32>,
    pub comment: Option<String>,
    pub no_passphrase: bool,
}

/// Ask for a new passphrase twice until both entries agree.
fn prompt_new_passphrase() -> Result<Zeroizing<String>> {
    loop {
        let passphrase = Zeroizing::new(rpassword::prompt_password(
            "Passphrase (empty for none): ",
        )?);
        let again = Zeroizing::new(rpassword::prompt_password("Repeat passphrase: ")?);

        if passphrase == again {
            return Ok(passphrase);
        }
        println!("{} Passphrases do not match", "Error:".red());
    }
}

/// How many host entries name `key` as their identity file.
pub fn references_to(counts: &BTreeMap<String, usize>, key: &str) -> usize {
    counts
        .iter()
        .filter(|(identity_file, _)| {
            Path::new(identity_file.as_str())
                .file_name()
                .is_some_and(|file_name| file_name == key)
        })
        .map(|(_, count)| count)
        .sum()
}

/// A `list` row: the key plus how many hosts use it
#[derive(Debug, Serialize)]
struct ListedKey {
    #[serde(flatten)]
    key: SshKey,
    refs: usize,
}

fn listed_keys(dir: &SshDir, query: Option<&str>) -> Result<Vec<ListedKey>> {
    let mut keys = keys::list_keys(dir)?;
    if let Some(query) = query {
        keys = keys::filter(&keys, query);
    }
    if keys.is_empty() {
        return Ok(Vec::new());
    }

    let counts = hosts::key_ref_count(dir)?;
    Ok(keys
        .into_iter()
        .map(|key| {
            let refs = references_to(&counts, &key.name);
            ListedKey { key, refs }
        })
        .collect())
}

pub fn list(ctx: &Context, query: Option<&str>) -> Result<()> {
    let rows = listed_keys(&ctx.dir, query)?;
    if ctx.emit_json(&rows)? {
        return Ok(());
    }

    heading("=== SSH keys ===");
    if rows.is_empty() {
        if query.is_some() {
            println!("No keys match.");
            return Ok(());
        }
        println!("No key pairs in {}.", ctx.dir.root().display());
        println!();
        println!("Run {} to create one.", "sshkeep key generate <name>".cyan());
        return Ok(());
    }

    println!(
        "{:<20} {:<22} {:<52} {:>4}  {}",
        "NAME".bold(),
        "TYPE".bold(),
        "FINGERPRINT".bold(),
        "REFS".bold(),
        "COMMENT".bold()
    );
    rule(116);
    for row in &rows {
        let key = &row.key;
        let name = if key.has_private {
            key.name.clone()
        } else {
            format!("{} {}", key.name, "(pub only)".dimmed())
        };
        println!(
            "{:<20} {:<22} {:<52} {:>4}  {}",
            name,
            key.key_type,
            key.fingerprint,
            row.refs,
            or_dash(&key.comment)
        );
    }
    println!();
    Ok(())
}

pub fn show(ctx: &Context, name: &str) -> Result<()> {
    let key = keys::get_key(&ctx.dir, name)?;
    if ctx.emit_json(&key)? {
        return Ok(());
    }

    println!("{} {}", "Key".cyan().bold(), key.name.bold());
    println!("  {:<12} {}", "Type", key.key_type);
    println!("  {:<12} {}", "Fingerprint", key.fingerprint);
    println!("  {:<12} {}", "Comment", or_dash(&key.comment));
    println!("  {:<12} {}", "Private", if key.has_private { "yes" } else { "no" });
    println!("  {:<12} {}", "Modified", key.modified.format("%Y-%m-%d %H:%M:%S"));
    println!();
    rule(60);
    println!("{}", key.public_key);
    rule(60);
    Ok(())
}

pub fn generate(ctx: &Context, name: &str, options: GenerateOptions) -> Result<()> {
    let defaults = &ctx.settings.keys;
    let mut request = KeyGenRequest::new(name, options.key_type.unwrap_or(defaults.default_type));
    request.bits = options.bits.or(defaults.default_bits);
    request.comment = options.comment.unwrap_or_default();
    if !options.no_passphrase {
        request.passphrase.push_str(&prompt_new_passphrase()?);
    }

    let key = keys::generate_key(&ctx.dir, &ctx.settings.keygen(), &request)?;
    if ctx.emit_json(&key)? {
        return Ok(());
    }

    ctx.success(&format!("Key '{}' generated.", key.name));
    println!();
    println!("{}", "Public key:".cyan().bold());
    println!("{}", key.public_key);
    Ok(())
}

pub fn delete(ctx: &Context, name: &str, yes: bool) -> Result<()> {
    let references = references_to(&hosts::key_ref_count(&ctx.dir)?, name);
    if references > 0 {
        warning(&format!(
            "{} host entr{} still use '{}' as IdentityFile",
            references,
            if references == 1 { "y" } else { "ies" },
            name
        ));
    }

    if !yes && !confirm(&format!("Delete key pair '{}'? This cannot be undone.", name)) {
        println!("Cancelled.");
        return Ok(());
    }

    keys::delete_key(&ctx.dir, name)?;
    ctx.success(&format!("Key '{}' deleted.", name));
    Ok(())
}

pub fn comment(ctx: &Context, name: &str, comment: &str) -> Result<()> {
    let key = keys::update_comment(&ctx.dir, &ctx.settings.keygen(), name, comment)?;
    if !ctx.emit_json(&key)? {
        ctx.success(&format!("Comment of '{}' set to '{}'.", key.name, key.comment));
    }
    Ok(())
}

pub fn fix_permissions(ctx: &Context, name: &str) -> Result<()> {
    crate::sshdir::validate_file_name(name)?;
    ctx.dir.set_key_permissions(name)?;
    ctx.success(&format!("Permissions of '{}' set to 0600/0644.", name));
    Ok(())
}
