// ── Core error types ──
//
// Domain errors from qlik-embed-core. Consumers never see HTTP status
// codes or frame parse failures directly: the `From<qlik_embed_api::Error>`
// impl folds transport-layer errors into the taxonomy below.

use thiserror::Error;
use url::Url;

/// Unified error type for the core crate.
///
/// `Clone` so the last failure can be kept in observable state.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    /// Missing or inconsistent identifiers. Fatal, raised before any I/O.
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Identity ─────────────────────────────────────────────────────
    #[error(transparent)]
    Authentication(#[from] AuthFailure),

    // ── Transport ────────────────────────────────────────────────────
    /// Fetch or socket failure. Reported once, never retried.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Schema load, RPC open or `OpenDoc` failure.
    #[error("Session error: {message}")]
    Session { message: String },
}

/// Sub-states of a failed identity negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// An automatic login redirect is under way. Not a user-facing error.
    #[error("Redirecting to the tenant login")]
    RedirectInProgress,

    /// The automatic redirect already happened once without effect; the
    /// user must open `login_url` themselves.
    #[error("Authentication required, log in at {login_url}")]
    ManualActionRequired { login_url: Url },

    /// Terminal failure.
    #[error("Authentication failed: {message}")]
    Failed { message: String },
}

impl CoreError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn auth_failed(message: impl Into<String>) -> Self {
        Self::Authentication(AuthFailure::Failed {
            message: message.into(),
        })
    }

    /// Whether the error should be shown to a user. A pending redirect is
    /// a state, not a failure.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, Self::Authentication(AuthFailure::RedirectInProgress))
    }

    /// The login URL of a manual-action failure, if any.
    pub fn login_url(&self) -> Option<&Url> {
        match self {
            Self::Authentication(AuthFailure::ManualActionRequired { login_url }) => {
                Some(login_url)
            }
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<qlik_embed_api::Error> for CoreError {
    fn from(err: qlik_embed_api::Error) -> Self {
        use qlik_embed_api::Error as Api;

        match err {
            Api::Authentication { message } => Self::auth_failed(message),
            Api::MissingCsrfToken => Self::auth_failed("tenant issued no CSRF token"),
            Api::TokenExchange { status, message } => {
                Self::auth_failed(format!("token exchange answered HTTP {status}: {message}"))
            }
            Api::Transport(e) => Self::Network {
                message: e.to_string(),
            },
            Api::InvalidUrl(e) => Self::config(format!("Invalid URL: {e}")),
            Api::UnexpectedStatus { endpoint, status } => Self::Network {
                message: format!("HTTP {status} from {endpoint}"),
            },
            Api::Tls(message) => Self::Network {
                message: format!("TLS error: {message}"),
            },
            Api::Schema { message } => Self::Session {
                message: format!("Error loading schema: {message}"),
            },
            e @ (Api::UnknownMethod { .. }
            | Api::WebSocketConnect(_)
            | Api::WebSocketClosed { .. }
            | Api::SessionClosed
            | Api::Rpc { .. }
            | Api::ObjectNotFound { .. }) => Self::Session {
                message: e.to_string(),
            },
            Api::Deserialization { message, body: _ } => Self::Session {
                message: format!("Deserialization error: {message}"),
            },
        }
    }
}
