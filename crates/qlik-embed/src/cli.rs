//! Clap derive structures for the `qlik-embed` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// qlik-embed -- live Qlik Cloud objects in your terminal
#[derive(Debug, Parser)]
#[command(
    name = "qlik-embed",
    version,
    about = "Embed and watch Qlik Cloud objects from the command line",
    long_about = "Negotiates a tenant identity (web-integration cookie or OAuth2 bearer),\n\
        opens the app over the engine RPC session, and renders the configured\n\
        objects as KPIs, tables and lists that follow engine changes.",
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
    #[arg(long, short = 'p', env = "QLIK_EMBED_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Tenant host (overrides profile)
    #[arg(long, short = 't', env = "QLIK_EMBED_TENANT", global = true)]
    pub tenant: Option<String>,

    /// Web integration id for cookie identity
    #[arg(long, env = "QLIK_EMBED_WEB_INTEGRATION_ID", global = true)]
    pub web_integration_id: Option<String>,

    /// App id
    #[arg(long, short = 'a', env = "QLIK_EMBED_APP", global = true)]
    pub app: Option<String>,

    /// Comma-separated object ids, in display order
    #[arg(long, env = "QLIK_EMBED_OBJECTS", global = true)]
    pub objects: Option<String>,

    /// Engine identity segment
    #[arg(long, env = "QLIK_EMBED_IDENTITY", global = true)]
    pub identity: Option<String>,

    /// Identity scheme
    #[arg(long, env = "QLIK_EMBED_AUTH_TYPE", global = true)]
    pub auth_type: Option<AuthType>,

    /// OAuth2 client id
    #[arg(long, env = "QLIK_EMBED_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// Key-value store file (redirect guard, cached tokens)
    #[arg(long, env = "QLIK_EMBED_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "QLIK_EMBED_OUTPUT",
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

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "QLIK_EMBED_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "QLIK_EMBED_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Value Enums ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthType {
    /// Tenant cookies bound to a web integration id
    WebIntegration,
    /// Bearer token from the cache or a token exchange
    Oauth2,
}

impl AuthType {
    /// Name as written in profiles.
    pub fn as_profile_value(self) -> &'static str {
        match self {
            Self::WebIntegration => "web-integration",
            Self::Oauth2 => "oauth2",
        }
    }
}

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
    /// Plain text, one line per item (scripting)
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

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Negotiate identity and report the outcome
    Probe,

    /// Print the tenant login URL
    LoginUrl,

    /// Open the app, print every object once, and close
    #[command(alias = "get")]
    Fetch,

    /// Print object updates as the engine reports changes
    Watch(WatchArgs),

    /// Inspect or seed the cached bearer token
    Token(TokenArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Stop after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<usize>,
}

// ── Token ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

#[derive(Debug, Subcommand)]
pub enum TokenCommand {
    /// Show the token the locator would use for the tenant
    Show {
        /// Print the full token instead of a masked one
        #[arg(long)]
        reveal: bool,
    },

    /// Cache a bearer token for the tenant
    Set {
        /// The access token
        token: String,
    },

    /// Drop the cached token and the redirect guard
    Clear,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config and store file locations
    Path,

    /// Display current resolved configuration
    Show,

    /// List configured profiles
    Profiles,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
