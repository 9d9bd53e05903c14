use thiserror::Error;

/// Top-level error type for the `qlik-embed-api` crate.
///
/// Covers every failure mode across the tenant REST endpoints, the token
/// exchange, and the QIX RPC session. `qlik-embed-core` maps these into
/// domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The tenant rejected the presented identity.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The CSRF endpoint answered without a `qlik-csrf-token` header.
    #[error("CSRF token missing in tenant response")]
    MissingCsrfToken,

    /// The delegated token exchange answered with a non-success status.
    #[error("Token exchange failed (HTTP {status}): {message}")]
    TokenExchange { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// An endpoint answered with a status the caller does not handle.
    #[error("Unexpected HTTP {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Schema ──────────────────────────────────────────────────────
    /// The protocol schema document could not be loaded.
    #[error("Error loading schema: {message}")]
    Schema { message: String },

    /// The schema does not define `method` on `q_type`.
    #[error("Method {method} is not defined for {q_type} in the protocol schema")]
    UnknownMethod { q_type: String, method: String },

    // ── RPC session ─────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the engine.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The session was closed locally or by the engine; no further calls.
    #[error("RPC session closed")]
    SessionClosed,

    /// Structured error returned by the engine for a single call.
    #[error("Engine error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        parameter: Option<String>,
    },

    /// `GetObject` returned no handle for the requested id.
    #[error("Object {id} not found")]
    ObjectNotFound { id: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` when the tenant refused the identity outright.
    pub fn is_auth_required(&self) -> bool {
        match self {
            Self::Authentication { .. } => true,
            Self::UnexpectedStatus { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Returns `true` for failures of the network itself rather than of
    /// the remote service's answer.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if the RPC session is gone and no retry on it can succeed.
    pub fn is_session_closed(&self) -> bool {
        matches!(self, Self::SessionClosed | Self::WebSocketClosed { .. })
    }
}
