//! Clap derive structures for the `fleetcon` CLI.
//!
//! Also compiled by `build.rs` for man pages, so this file may only use
//! clap and clap_complete.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fleetcon -- remote console for fleet devices
#[derive(Debug, Parser)]
#[command(
    name = "fleetcon",
    version,
    about = "Run commands and move files on fleet devices over their remote console",
    long_about = "Talks to a device's console endpoint over a channel-multiplexed\n\
        WebSocket (v4.channel.k8s.io). Commands run in the device shell;\n\
        files travel base64-encoded through the same session.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config profile to use
    #[arg(long, short = 'p', env = "FLEETCON_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Fleet API host (overrides profile)
    #[arg(long, short = 'H', env = "FLEETCON_HOST", global = true)]
    pub host: Option<String>,

    /// Bearer token (overrides profile, env var, and keyring)
    #[arg(long, env = "FLEETCON_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Device id or name
    #[arg(long, short = 'd', env = "FLEETCON_DEVICE", global = true)]
    pub device: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLEETCON_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "FLEETCON_INSECURE", global = true)]
    pub insecure: bool,

    /// Operation timeout in seconds (overrides profile and defaults)
    #[arg(long, env = "FLEETCON_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable (default)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Raw text, suitable for scripting
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a shell command on the device
    #[command(alias = "x")]
    Exec(ExecArgs),

    /// Upload a local file to the device
    #[command(alias = "upload")]
    Put(PutArgs),

    /// Download a file from the device
    #[command(alias = "download")]
    Fetch(FetchArgs),

    /// List and inspect fleet devices
    #[command(alias = "dev")]
    Devices(DevicesArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Console commands ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Command line to run (joined with spaces)
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Args)]
pub struct PutArgs {
    /// Local file to upload
    pub local: PathBuf,

    /// Destination path on the device (parent directories are created)
    pub remote: String,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// File path on the device
    pub remote: String,

    /// Local destination (parent directories are created)
    pub local: PathBuf,
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List devices visible to the token
    #[command(alias = "ls")]
    List,

    /// Show one device by id or name
    Get {
        /// Device id or name
        device: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the current configuration (secrets masked)
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Set a value on the active profile
    Set {
        /// Key: host, token_env, verify_tls, device, timeout
        key: String,

        /// Value to set
        value: String,
    },

    /// Store the active profile's token in the system keyring (read from stdin)
    SetToken,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
