//! Command implementations for the `sshkeep` binary

pub mod backup;
pub mod host;
pub mod key;
pub mod known_hosts;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::error::{io_at, Result};
use crate::settings::Settings;
use crate::sshdir::SshDir;

/// Everything a command needs: where to work, how to run tools, how to print
pub struct Context {
    pub dir: SshDir,
    pub settings: Settings,
    pub json: bool,
}

impl Context {
    pub fn new(dir: SshDir, settings: Settings, json: bool) -> Self {
        Self { dir, settings, json }
    }

    /// Print `value` as pretty JSON when `--json` was given.
    ///
    /// Returns `false` when the caller should render its own table instead.
    pub(crate) fn emit_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<bool> {
        if !self.json {
            return Ok(false);
        }
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(true)
    }

    /// Status line for a completed change; suppressed in JSON mode.
    pub(crate) fn success(&self, message: &str) {
        if !self.json {
            println!("{} {}", "Success:".green().bold(), message);
        }
    }
}

/// Ask a yes/no question; anything but `y`/`yes` is no.
pub fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

pub(crate) fn heading(title: &str) {
    println!("{}", title.cyan().bold());
    println!();
}

pub(crate) fn rule(width: usize) {
    println!("{}", "─".repeat(width).dimmed());
}

pub(crate) fn warning(message: &str) {
    eprintln!("{} {}", "Warning:".yellow().bold(), message);
}

/// Contents of a file named on the command line.
pub(crate) fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(io_at(path))
}

/// Dash for empty table cells
pub(crate) fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}
