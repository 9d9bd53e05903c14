use secrecy::SecretString;
use url::Url;

use qlik_embed_api::{AuthMode, Credentials};

use crate::error::CoreError;

/// Identity presented to one tenant.
///
/// Built token-less from the configuration; the negotiator fills in
/// `token` on the OAuth2 path.
#[derive(Debug, Clone)]
pub struct Credential {
    pub mode: AuthMode,
    pub tenant: Url,
    pub web_integration_id: Option<String>,
    pub identity: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub token: Option<SecretString>,
}

impl Credential {
    /// Tenant host, the key of all per-tenant persisted state.
    pub fn tenant_key(&self) -> &str {
        self.tenant.host_str().unwrap_or_default()
    }

    /// Wire credentials for the api crate.
    pub fn to_api(&self) -> Result<Credentials, CoreError> {
        match self.mode {
            AuthMode::WebIntegration => self
                .web_integration_id
                .clone()
                .map(|integration_id| Credentials::WebIntegration { integration_id })
                .ok_or_else(|| CoreError::config("Web integration ID is required")),
            AuthMode::OAuth2 => self
                .token
                .clone()
                .map(|token| Credentials::Bearer { token })
                .ok_or_else(|| CoreError::auth_failed("no usable token")),
        }
    }
}
