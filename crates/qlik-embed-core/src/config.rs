// ── Runtime embed configuration ──
//
// These types describe *what* to embed and *how* to prove identity.
// They never touch disk: the CLI (through qlik-embed-config) builds an
// `EmbedConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use qlik_embed_api::AuthMode;
use qlik_embed_api::qix::DEFAULT_SCHEMA_URL;

use crate::auth::Credential;
use crate::error::CoreError;

/// Delay before the same-window login navigation when a top-level one is
/// refused.
pub const DEFAULT_REDIRECT_FALLBACK: Duration = Duration::from_millis(100);

/// Identity scheme and its scheme-specific settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSettings {
    /// Cookie identity bound to the registered web integration id.
    WebIntegration,
    /// Bearer token minted through a delegated exchange.
    OAuth2 {
        client_id: String,
        /// Where the identity provider sends the user back. Derived from
        /// `return_to` when absent.
        redirect_uri: Option<String>,
        /// HTTP endpoint of the token exchange, when one is deployed.
        token_exchange_url: Option<Url>,
    },
}

impl AuthSettings {
    pub fn mode(&self) -> AuthMode {
        match self {
            Self::WebIntegration => AuthMode::WebIntegration,
            Self::OAuth2 { .. } => AuthMode::OAuth2,
        }
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default for cloud tenants.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (local engines with self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for embedding the objects of one app.
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Tenant root, e.g. `https://acme.eu.qlikcloud.com`.
    pub tenant: Url,
    pub web_integration_id: Option<String>,
    pub app_id: String,
    /// Object ids in display order. Slot `i` shows `object_ids[i]`.
    pub object_ids: Vec<String>,
    /// Optional engine identity segment, isolating the session state.
    pub identity: Option<String>,
    pub auth: AuthSettings,
    /// Location the tenant login sends the user back to.
    pub return_to: Url,
    pub schema_url: Url,
    pub tls: TlsVerification,
    pub timeout: Duration,
    pub redirect_fallback_delay: Duration,
}

impl EmbedConfig {
    /// Build a config with defaults for everything but the identifiers.
    pub fn new(
        tenant: Url,
        app_id: impl Into<String>,
        object_ids: Vec<String>,
        auth: AuthSettings,
    ) -> Result<Self, CoreError> {
        let schema_url = Url::parse(DEFAULT_SCHEMA_URL)
            .map_err(|e| CoreError::config(format!("Invalid schema URL: {e}")))?;
        Ok(Self {
            return_to: tenant.clone(),
            tenant,
            web_integration_id: None,
            app_id: app_id.into(),
            object_ids,
            identity: None,
            auth,
            schema_url,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            redirect_fallback_delay: DEFAULT_REDIRECT_FALLBACK,
        })
    }

    /// Check that every identifier the chosen scheme needs is present.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tenant.host_str().is_none_or(str::is_empty) {
            return Err(CoreError::config("Tenant host is required"));
        }
        if self.app_id.trim().is_empty() || self.object_ids.is_empty() {
            return Err(CoreError::config("App ID and Object IDs are required"));
        }
        match &self.auth {
            AuthSettings::WebIntegration => {
                if self
                    .web_integration_id
                    .as_deref()
                    .is_none_or(|id| id.trim().is_empty())
                {
                    return Err(CoreError::config(
                        "Web integration ID is required for web-integration identity",
                    ));
                }
            }
            AuthSettings::OAuth2 { client_id, .. } => {
                if client_id.trim().is_empty() {
                    return Err(CoreError::config("Client ID is required for OAuth2 identity"));
                }
            }
        }
        Ok(())
    }

    /// The OAuth2 redirect URI: configured, or `return_to` with its last
    /// path segment replaced by `oauth-callback`.
    pub fn redirect_uri(&self) -> Option<String> {
        match &self.auth {
            AuthSettings::OAuth2 {
                redirect_uri: Some(uri),
                ..
            } => Some(uri.clone()),
            AuthSettings::OAuth2 { .. } => Some(derive_redirect_uri(&self.return_to)),
            AuthSettings::WebIntegration => None,
        }
    }

    /// Fresh, token-less credential for a negotiation.
    pub fn credential(&self) -> Credential {
        let (client_id, redirect_uri) = match &self.auth {
            AuthSettings::OAuth2 { client_id, .. } => (Some(client_id.clone()), self.redirect_uri()),
            AuthSettings::WebIntegration => (None, None),
        };
        Credential {
            mode: self.auth.mode(),
            tenant: self.tenant.clone(),
            web_integration_id: self.web_integration_id.clone(),
            identity: self.identity.clone(),
            client_id,
            redirect_uri,
            token: None,
        }
    }
}

/// Replace the last path segment of `location` with `oauth-callback`.
pub fn derive_redirect_uri(location: &Url) -> String {
    let mut url = location.clone();
    url.set_query(None);
    url.set_fragment(None);
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop().push("oauth-callback");
    }
    url.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> EmbedConfig {
        let mut cfg = EmbedConfig::new(
            Url::parse("https://acme.eu.qlikcloud.com").unwrap(),
            "app-1",
            vec!["a".into(), "b".into()],
            AuthSettings::WebIntegration,
        )
        .unwrap();
        cfg.web_integration_id = Some("wid".into());
        cfg
    }

    #[test]
    fn valid_web_integration_config() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn missing_objects_is_config_error() {
        let mut cfg = base();
        cfg.object_ids.clear();
        let err = cfg.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: App ID and Object IDs are required"
        );
    }

    #[test]
    fn web_integration_requires_integration_id() {
        let mut cfg = base();
        cfg.web_integration_id = Some("  ".into());
        assert!(matches!(cfg.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn oauth2_requires_client_id() {
        let mut cfg = base();
        cfg.auth = AuthSettings::OAuth2 {
            client_id: String::new(),
            redirect_uri: None,
            token_exchange_url: None,
        };
        assert!(matches!(cfg.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn redirect_uri_derived_from_return_location() {
        let mut cfg = base();
        cfg.auth = AuthSettings::OAuth2 {
            client_id: "c".into(),
            redirect_uri: None,
            token_exchange_url: None,
        };
        cfg.return_to = Url::parse("https://portal.example.com/s/dashboard?tab=2").unwrap();
        assert_eq!(
            cfg.redirect_uri().as_deref(),
            Some("https://portal.example.com/s/oauth-callback")
        );
        assert_eq!(cfg.credential().client_id.as_deref(), Some("c"));
    }
}
