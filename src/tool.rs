//! Invocation of the OpenSSH command-line tools (`ssh-keygen`, `ssh-keyscan`)

use std::ffi::{OsStr, OsString};
use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{Result, SshKeepError};

pub const SSH_KEYGEN: &str = "ssh-keygen";
pub const SSH_KEYSCAN: &str = "ssh-keyscan";

/// An external program looked up on `PATH` at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    program: String,
}

impl Tool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn keygen() -> Self {
        Self::new(SSH_KEYGEN)
    }

    pub fn keyscan() -> Self {
        Self::new(SSH_KEYSCAN)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    /// Run the tool and return its output whatever the exit status.
    pub fn run<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let path = which::which(&self.program)
            .map_err(|_| SshKeepError::ToolMissing(self.program.clone()))?;
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();

        debug!(
            tool = %self.program,
            path = %path.display(),
            args = %display_args(&args),
            "running external tool"
        );

        let output = Command::new(&path)
            .args(&args)
            .stdin(Stdio::null())
            .output()?;

        debug!(tool = %self.program, status = %output.status, "external tool finished");
        Ok(output)
    }

    /// Run the tool, turning a non-zero exit into [`SshKeepError::ToolFailed`].
    pub fn run_checked<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.run(args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(self.failure(&output))
        }
    }

    pub(crate) fn failure(&self, output: &Output) -> SshKeepError {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };

        let message = if detail.is_empty() {
            format!("exited with {}", output.status)
        } else {
            format!("{} ({})", detail, output.status)
        };

        SshKeepError::ToolFailed {
            tool: self.program.clone(),
            message,
        }
    }
}

/// Arguments joined for logging, with the value after `-N` (a passphrase) masked.
fn display_args(args: &[OsString]) -> String {
    let mut shown = Vec::with_capacity(args.len());
    let mut mask_next = false;
    for arg in args {
        if mask_next {
            shown.push("***".to_string());
            mask_next = false;
            continue;
        }
        mask_next = arg.to_str() == Some("-N");
        shown.push(arg.to_string_lossy().into_owned());
    }
    shown.join(" ")
}
