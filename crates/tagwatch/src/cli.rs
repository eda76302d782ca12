//! Clap derive structures for the `tagwatch` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tagwatch -- handheld RFID inventory, locate, and monitor workflows
#[derive(Debug, Parser)]
#[command(
    name = "tagwatch",
    version,
    about = "Scan, locate, and monitor RFID tags from the command line",
    long_about = "Drives an RFID reader through the tagwatch engine: connect, scan,\n\
        classify tags against the inventory backend, and track signal strength.\n\n\
        Scans run against a simulated sled fed by a built-in demo scenario.",
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
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "TAGWATCH_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Inventory backend URL (overrides profile)
    #[arg(long, short = 'b', env = "TAGWATCH_BACKEND", global = true)]
    pub backend: Option<String>,

    /// Backend bearer token
    #[arg(long, env = "TAGWATCH_API_TOKEN", global = true, hide_env = true)]
    pub api_token: Option<String>,

    /// Reader to prefer (device name or address)
    #[arg(long, short = 'd', env = "TAGWATCH_DEVICE", global = true)]
    pub device: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TAGWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed backend certificates
    #[arg(long, short = 'k', env = "TAGWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Backend request timeout in seconds
    #[arg(long, env = "TAGWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

/// Reading mode as accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Only registered tags
    #[value(name = "a", alias = "registered")]
    Registered,
    /// All tags, registration looked up
    #[value(name = "b", alias = "lookup")]
    Lookup,
    /// All tags
    #[value(name = "c", alias = "all")]
    All,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan and list every tag in range
    #[command(alias = "inv", alias = "i")]
    Inventory(InventoryArgs),

    /// Find tags of one product and track the closest
    #[command(alias = "find")]
    Locate(LocateArgs),

    /// Track the signal of a single EPC
    #[command(alias = "mon")]
    Monitor(MonitorArgs),

    /// Show the signal mapping for RSSI values
    Signal(SignalArgs),

    /// List catalog products
    Products,

    /// Show the registration of one EPC
    Tag(TagArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Scan Arguments ────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// How long to scan
    #[arg(long, short = 't', default_value = "3s", value_parser = humantime::parse_duration)]
    pub duration: Duration,

    /// Reading mode (overrides profile)
    #[arg(long, short = 'm')]
    pub mode: Option<ModeArg>,

    /// Start scanning with a trigger pull instead of a direct start
    #[arg(long)]
    pub trigger: bool,

    /// Drop reads weaker than this (dBm)
    #[arg(long, allow_negative_numbers = true)]
    pub min_rssi: Option<i32>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WORKFLOWS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct InventoryArgs {
    #[command(flatten)]
    pub scan: ScanArgs,

    /// Only keep tags of this product
    #[arg(long)]
    pub product: Option<String>,
}

#[derive(Debug, Args)]
pub struct LocateArgs {
    /// Product id to look for
    pub product: String,

    #[command(flatten)]
    pub scan: ScanArgs,
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// EPC to track
    pub epc: String,

    #[command(flatten)]
    pub scan: ScanArgs,

    /// Stop feeding the tag after this long, to show signal loss
    #[arg(long, value_parser = humantime::parse_duration)]
    pub fade_after: Option<Duration>,
}

#[derive(Debug, Args)]
pub struct SignalArgs {
    /// RSSI values in dBm
    #[arg(required = true, allow_negative_numbers = true)]
    pub rssi: Vec<i32>,
}

#[derive(Debug, Args)]
pub struct TagArgs {
    /// EPC to look up
    pub epc: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// Set a profile value
    Set {
        /// Config key (e.g., "backend", "scan.reading_mode")
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the backend token in the system keyring
    SetToken {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
