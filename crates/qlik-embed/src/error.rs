//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use qlik_embed_config::ConfigError;
use qlik_embed_core::{AuthFailure, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the tenant")]
    #[diagnostic(
        code(qlik_embed::connection_failed),
        help(
            "Check the tenant host and your network.\n\
             {message}\n\
             For engines with self-signed certificates try --insecure (-k)."
        )
    )]
    ConnectionFailed { message: String },

    #[error("Engine session failed: {message}")]
    #[diagnostic(
        code(qlik_embed::session),
        help("Check the app id and that the web integration allows this origin.")
    )]
    Session { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication required")]
    #[diagnostic(
        code(qlik_embed::login_required),
        help(
            "The automatic login did not complete. Open this URL, log in, then rerun:\n\
             {login_url}"
        )
    )]
    LoginRequired { login_url: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(qlik_embed::auth_failed),
        help(
            "For OAuth2, seed a token with: qlik-embed token set <TOKEN>\n\
             For web integrations, check the integration id and log in with: qlik-embed login-url"
        )
    )]
    AuthFailed { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(qlik_embed::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(qlik_embed::incomplete_config),
        help(
            "Set the missing values in a profile or pass --tenant, --app and --objects.\n\
             Config file: {path}"
        )
    )]
    IncompleteConfig { message: String, path: String },

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(qlik_embed::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No tenant configured")]
    #[diagnostic(
        code(qlik_embed::no_config),
        help(
            "Pass --tenant or create a profile.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("{0}")]
    #[diagnostic(code(qlik_embed::config))]
    Config(String),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Session { .. } => exit_code::CONNECTION,
            Self::LoginRequired { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::IncompleteConfig { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            Self::Config(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config { message } => CliError::IncompleteConfig {
                message,
                path: qlik_embed_config::config_path().display().to_string(),
            },
            CoreError::Authentication(AuthFailure::ManualActionRequired { login_url }) => {
                CliError::LoginRequired {
                    login_url: login_url.to_string(),
                }
            }
            CoreError::Authentication(AuthFailure::RedirectInProgress) => CliError::AuthFailed {
                message: "login redirect still pending".into(),
            },
            CoreError::Authentication(AuthFailure::Failed { message }) => {
                CliError::AuthFailed { message }
            }
            CoreError::Network { message } => CliError::ConnectionFailed { message },
            CoreError::Session { message } => CliError::Session { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound {
                name: profile,
                available: String::new(),
            },
            ConfigError::Embed(core) => core.into(),
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other.to_string()),
        }
    }
}
