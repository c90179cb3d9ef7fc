//! `sshkeep backup ...`

use colored::Colorize;
use tracing::info;

use crate::backup::{self, Backup};
use crate::error::Result;

use super::{confirm, heading, rule, Context};

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

pub fn list(ctx: &Context) -> Result<()> {
    let backups = backup::list_backups(&ctx.dir)?;
    if ctx.emit_json(&backups)? {
        return Ok(());
    }

    heading("=== Backups ===");
    if backups.is_empty() {
        println!("No backups in {}.", ctx.dir.backup_dir().display());
        println!();
        println!("Run {} to create one.", "sshkeep backup create".cyan());
        return Ok(());
    }

    println!(
        "{:<40} {:>10}  {}",
        "FILE".bold(),
        "SIZE".bold(),
        "CREATED".bold()
    );
    rule(75);
    for backup in &backups {
        println!(
            "{:<40} {:>10}  {}",
            backup.filename,
            human_size(backup.size),
            backup.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();
    Ok(())
}

fn report_created(ctx: &Context, backup: &Backup) -> Result<()> {
    if !ctx.emit_json(backup)? {
        ctx.success(&format!(
            "Backup {} created ({}).",
            backup.filename,
            human_size(backup.size)
        ));
    }
    Ok(())
}

pub fn create(ctx: &Context) -> Result<()> {
    let backup = backup::create_backup(&ctx.dir)?;
    report_created(ctx, &backup)
}

/// Restore `filename`, first saving the current state unless told not to.
pub fn restore(ctx: &Context, filename: &str, yes: bool, no_safety_backup: bool) -> Result<()> {
    // validates the name and checks existence before anything is touched
    backup::resolve_backup_path(&ctx.dir, filename)?;

    if !yes
        && !confirm(&format!(
            "Replace everything in {} with {}?",
            ctx.dir.root().display(),
            filename
        ))
    {
        println!("Cancelled.");
        return Ok(());
    }

    if ctx.settings.backup.safety_backup_on_restore && !no_safety_backup {
        let safety = backup::create_backup(&ctx.dir)?;
        info!(filename = %safety.filename, "safety backup taken before restore");
        if !ctx.json {
            println!("Current state saved as {}.", safety.filename.bold());
        }
    }

    backup::restore_backup(&ctx.dir, filename)?;
    ctx.success(&format!("Restored {} from {}.", ctx.dir.root().display(), filename));
    Ok(())
}

pub fn delete(ctx: &Context, filename: &str, yes: bool) -> Result<()> {
    backup::resolve_backup_path(&ctx.dir, filename)?;

    if !yes && !confirm(&format!("Delete backup {}?", filename)) {
        println!("Cancelled.");
        return Ok(());
    }

    backup::delete_backup(&ctx.dir, filename)?;
    ctx.success(&format!("Backup {} deleted.", filename));
    Ok(())
}

/// Print the absolute path of an archive, for copying it elsewhere.
pub fn path(ctx: &Context, filename: &str) -> Result<()> {
    let path = backup::resolve_backup_path(&ctx.dir, filename)?;
    if !ctx.emit_json(&path)? {
        println!("{}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1536), "1.5 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
