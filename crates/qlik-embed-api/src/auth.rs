use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

/// Header carrying the registered web integration id.
pub const WEB_INTEGRATION_HEADER: &str = "qlik-web-integration-id";

/// Response header (and RPC query parameter) carrying the CSRF token.
pub const CSRF_HEADER: &str = "qlik-csrf-token";

/// Which identity scheme a request is made under.
///
/// Marker enum (no data) -- the actual secret material lives in [`Credentials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Cookie-based identity tied to a registered web integration id.
    WebIntegration,
    /// Bearer token obtained through a delegated OAuth2 exchange.
    OAuth2,
}

/// Credentials presented to the tenant.
///
/// Each variant carries what its scheme needs on the wire. Session cookies
/// for [`WebIntegration`](Self::WebIntegration) live in the client's jar.
#[derive(Debug, Clone)]
pub enum Credentials {
    WebIntegration { integration_id: String },
    Bearer { token: SecretString },
}

impl Credentials {
    pub fn mode(&self) -> AuthMode {
        match self {
            Self::WebIntegration { .. } => AuthMode::WebIntegration,
            Self::Bearer { .. } => AuthMode::OAuth2,
        }
    }

    /// Attach the scheme's identifying header to a request.
    pub(crate) fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            Self::WebIntegration { integration_id } => {
                builder.header(WEB_INTEGRATION_HEADER, integration_id)
            }
            Self::Bearer { token } => builder.bearer_auth(token.expose_secret()),
        }
    }
}
