//! User settings read from `<config_dir>/sshkeep/config.toml`
//!
//! Every field is optional; a missing file means all defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::keys::KeyType;
use crate::tool::{Tool, SSH_KEYGEN, SSH_KEYSCAN};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// SSH root, used when neither `--ssh-dir` nor `SSHKEEP_SSH_DIR` is set
    pub ssh_dir: Option<String>,
    pub tools: ToolSettings,
    pub backup: BackupSettings,
    pub keys: KeySettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolSettings {
    pub ssh_keygen: String,
    pub ssh_keyscan: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Take a backup of the current directory before every restore
    pub safety_backup_on_restore: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KeySettings {
    pub default_type: KeyType,
    pub default_bits: Option<u32>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ssh_keygen: SSH_KEYGEN.to_string(),
            ssh_keyscan: SSH_KEYSCAN.to_string(),
        }
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            safety_backup_on_restore: true,
        }
    }
}

impl Settings {
    pub fn load_from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse settings")
    }

    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::load_from_str(&content)
                .with_context(|| format!("Invalid settings file: {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read settings file: {}", path.display())),
        }
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Failed to determine config directory")?;
        Ok(config_dir.join("sshkeep").join("config.toml"))
    }

    /// `ssh_dir` with a leading `~/` expanded.
    pub fn ssh_dir(&self) -> Result<Option<PathBuf>> {
        self.ssh_dir
            .as_deref()
            .map(|path| expand_tilde(path).map(PathBuf::from))
            .transpose()
    }

    pub fn keygen(&self) -> Tool {
        Tool::new(&self.tools.ssh_keygen)
    }

    pub fn keyscan(&self) -> Tool {
        Tool::new(&self.tools.ssh_keyscan)
    }
}

fn expand_tilde(path: &str) -> Result<String> {
    if path == "~" {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        return Ok(home.to_string_lossy().into_owned());
    }
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home.join(rest).to_string_lossy().into_owned())
    } else {
        Ok(path.to_string())
    }
}
