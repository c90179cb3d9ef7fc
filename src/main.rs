use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use sshkeep::cli::{self, host::HostChanges, key::GenerateOptions, Context};
use sshkeep::keys::KeyType;
use sshkeep::settings::Settings;
use sshkeep::SshDir;

#[derive(Parser)]
#[command(name = "sshkeep")]
#[command(author = "Oleg")]
#[command(version)]
#[command(about = "Manage SSH config, known_hosts, keys and backups of ~/.ssh", long_about = None)]
struct Cli {
    /// SSH directory to operate on (default: ~/.ssh)
    #[arg(long, global = true, env = "SSHKEEP_SSH_DIR", value_name = "PATH")]
    ssh_dir: Option<PathBuf>,

    /// Settings file (default: <config dir>/sshkeep/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More log output on stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host blocks of the SSH config file
    Host {
        #[command(subcommand)]
        action: HostCommands,
    },

    /// Entries of known_hosts
    KnownHosts {
        #[command(subcommand)]
        action: KnownHostsCommands,
    },

    /// Archives of the whole SSH directory
    Backup {
        #[command(subcommand)]
        action: BackupCommands,
    },

    /// Key pairs in the SSH directory
    Key {
        #[command(subcommand)]
        action: KeyCommands,
    },
}

#[derive(Args)]
struct HostFields {
    /// Real host name or address
    #[arg(long = "hostname")]
    host_name: Option<String>,

    #[arg(long)]
    user: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    identity_file: Option<String>,

    /// Extra directive as KEY=VALUE; an empty value removes it (repeatable)
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = cli::host::parse_option)]
    options: Vec<(String, String)>,
}

impl From<HostFields> for HostChanges {
    fn from(fields: HostFields) -> Self {
        Self {
            host_name: fields.host_name,
            user: fields.user,
            port: fields.port,
            identity_file: fields.identity_file,
            options: fields.options,
        }
    }
}

#[derive(Subcommand)]
enum HostCommands {
    /// List all hosts
    List,
    /// Show one host
    Show { alias: String },
    /// Append a new host block
    Add {
        alias: String,
        #[command(flatten)]
        fields: HostFields,
    },
    /// Change fields of an existing host
    Update {
        alias: String,
        #[command(flatten)]
        fields: HostFields,
    },
    /// Remove a host block
    Remove {
        alias: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Identity files referenced by hosts
    Refs,
    /// Print the config file as is
    Raw,
    /// Replace the config file with the contents of FILE
    Import {
        file: PathBuf,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum KnownHostsCommands {
    /// List entries
    List {
        /// Only entries whose hosts, type or fingerprint contain this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Remove the entry at LINE (as shown by `list`)
    Remove {
        line: usize,
        #[arg(short, long)]
        yes: bool,
    },
    /// Find entries for a host, hashed ones included
    Lookup {
        host: String,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Fetch a host's keys with ssh-keyscan and record them
    Scan {
        host: String,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print known_hosts as is
    Raw,
    /// Replace known_hosts with the contents of FILE
    Import {
        file: PathBuf,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// List backups, newest first
    List,
    /// Archive the SSH directory
    Create,
    /// Replace the SSH directory with a backup
    Restore {
        file: String,
        #[arg(short, long)]
        yes: bool,
        /// Do not archive the current state first
        #[arg(long)]
        no_safety_backup: bool,
    },
    /// Delete a backup
    Delete {
        file: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the full path of a backup
    Path { file: String },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// List key pairs
    List {
        /// Only keys whose name, type, comment or fingerprint contain this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show one key and its public line
    Show { name: String },
    /// Generate a new key pair with ssh-keygen
    Generate {
        name: String,
        /// ed25519, rsa or ecdsa
        #[arg(short = 't', long = "type")]
        key_type: Option<KeyType>,
        /// Key size (rsa and ecdsa only)
        #[arg(short, long)]
        bits: Option<u32>,
        #[arg(short = 'C', long)]
        comment: Option<String>,
        /// Create the key without asking for a passphrase
        #[arg(long)]
        no_passphrase: bool,
    },
    /// Delete a key pair
    Delete {
        name: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Change the comment of a key pair
    Comment { name: String, comment: String },
    /// Reset a key pair to mode 0600 (private) and 0644 (public)
    FixPermissions { name: String },
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_context(cli: &Cli) -> anyhow::Result<Context> {
    let settings_path = match &cli.settings {
        Some(path) => path.clone(),
        None => Settings::default_path()?,
    };
    let settings = Settings::load(&settings_path)?;

    // flag or env first, then the settings file, then ~/.ssh
    let explicit = match &cli.ssh_dir {
        Some(path) => Some(path.clone()),
        None => settings.ssh_dir()?,
    };
    let dir = SshDir::resolve(explicit).context("Failed to locate the SSH directory")?;
    tracing::debug!(
        root = %dir.root().display(),
        settings = %settings_path.display(),
        "resolved paths"
    );

    Ok(Context::new(dir, settings, cli.json))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = load_context(&cli)?;

    match cli.command {
        Commands::Host { action } => match action {
            HostCommands::List => cli::host::list(&ctx),
            HostCommands::Show { alias } => cli::host::show(&ctx, &alias),
            HostCommands::Add { alias, fields } => cli::host::add(&ctx, &alias, fields.into()),
            HostCommands::Update { alias, fields } => {
                cli::host::update(&ctx, &alias, fields.into())
            }
            HostCommands::Remove { alias, yes } => cli::host::remove(&ctx, &alias, yes),
            HostCommands::Refs => cli::host::refs(&ctx),
            HostCommands::Raw => cli::host::raw(&ctx),
            HostCommands::Import { file, yes } => cli::host::import(&ctx, &file, yes),
        },
        Commands::KnownHosts { action } => match action {
            KnownHostsCommands::List { filter } => cli::known_hosts::list(&ctx, filter.as_deref()),
            KnownHostsCommands::Remove { line, yes } => cli::known_hosts::remove(&ctx, line, yes),
            KnownHostsCommands::Lookup { host, port } => {
                cli::known_hosts::lookup(&ctx, &host, port)
            }
            KnownHostsCommands::Scan { host, port } => cli::known_hosts::scan(&ctx, &host, port),
            KnownHostsCommands::Raw => cli::known_hosts::raw(&ctx),
            KnownHostsCommands::Import { file, yes } => {
                cli::known_hosts::import(&ctx, &file, yes)
            }
        },
        Commands::Backup { action } => match action {
            BackupCommands::List => cli::backup::list(&ctx),
            BackupCommands::Create => cli::backup::create(&ctx),
            BackupCommands::Restore {
                file,
                yes,
                no_safety_backup,
            } => cli::backup::restore(&ctx, &file, yes, no_safety_backup),
            BackupCommands::Delete { file, yes } => cli::backup::delete(&ctx, &file, yes),
            BackupCommands::Path { file } => cli::backup::path(&ctx, &file),
        },
        Commands::Key { action } => match action {
            KeyCommands::List { filter } => cli::key::list(&ctx, filter.as_deref()),
            KeyCommands::Show { name } => cli::key::show(&ctx, &name),
            KeyCommands::Generate {
                name,
                key_type,
                bits,
                comment,
                no_passphrase,
            } => cli::key::generate(
                &ctx,
                &name,
                GenerateOptions {
                    key_type,
                    bits,
                    comment,
                    no_passphrase,
                },
            ),
            KeyCommands::Delete { name, yes } => cli::key::delete(&ctx, &name, yes),
            KeyCommands::Comment { name, comment } => cli::key::comment(&ctx, &name, &comment),
            KeyCommands::FixPermissions { name } => cli::key::fix_permissions(&ctx, &name),
        },
    }?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_host_add() {
        let cli = Cli::try_parse_from([
            "sshkeep",
            "--ssh-dir",
            "/tmp/ssh",
            "host",
            "add",
            "web",
            "--hostname",
            "web.example.com",
            "--port",
            "2222",
            "--option",
            "ForwardAgent=yes",
        ])
        .unwrap();

        assert_eq!(cli.ssh_dir, Some(PathBuf::from("/tmp/ssh")));
        let Commands::Host {
            action: HostCommands::Add { alias, fields },
        } = cli.command
        else {
            panic!("expected host add");
        };
        assert_eq!(alias, "web");
        assert_eq!(fields.host_name.as_deref(), Some("web.example.com"));
        assert_eq!(fields.port, Some(2222));
        assert_eq!(fields.options, [("ForwardAgent".to_string(), "yes".to_string())]);
    }

    #[test]
    fn test_parse_key_type() {
        let cli = Cli::try_parse_from([
            "sshkeep",
            "key",
            "generate",
            "id_ops",
            "-t",
            "rsa",
            "-b",
            "4096",
        ])
        .unwrap();
        let Commands::Key {
            action: KeyCommands::Generate { key_type, bits, .. },
        } = cli.command
        else {
            panic!("expected key generate");
        };
        assert_eq!(key_type, Some(KeyType::Rsa));
        assert_eq!(bits, Some(4096));

        assert!(Cli::try_parse_from(["sshkeep", "key", "generate", "x", "-t", "dsa"]).is_err());
    }

    #[test]
    fn test_parse_key_list_filter() {
        let cli = Cli::try_parse_from(["sshkeep", "key", "list", "--filter", "work"]).unwrap();
        let Commands::Key {
            action: KeyCommands::List { filter },
        } = cli.command
        else {
            panic!("expected key list");
        };
        assert_eq!(filter.as_deref(), Some("work"));
    }
}
