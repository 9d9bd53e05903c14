// Tenant HTTP client
//
// Wraps `reqwest::Client` with tenant-rooted URL construction and the
// cookie jar used by web-integration identity. Endpoint methods (identity
// probe, CSRF, login URL) live in `tenant::auth` as inherent methods to
// keep this module focused on transport mechanics.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::{TlsMode, TransportConfig};

/// HTTP client bound to one Qlik Cloud tenant.
///
/// Cheap to clone: the inner `reqwest::Client` and cookie jar are shared.
#[derive(Debug, Clone)]
pub struct TenantClient {
    http: reqwest::Client,
    base_url: Url,
    /// Cookie jar reference for forwarding session cookies on the RPC upgrade.
    cookie_jar: Option<Arc<Jar>>,
    /// Certificate policy, reused for the engine WebSocket.
    tls: TlsMode,
}

impl TenantClient {
    /// Create a tenant client from a `TransportConfig`.
    ///
    /// If the config doesn't already include a cookie jar, one is created
    /// (web-integration identity rides on tenant cookies). `base_url` is the
    /// tenant root, e.g. `https://acme.eu.qlikcloud.com`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let cookie_jar = config.cookie_jar.clone();
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url,
            cookie_jar,
            tls: config.tls,
        })
    }

    /// Create a tenant client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            cookie_jar: None,
            tls: TlsMode::System,
        }
    }

    /// The underlying HTTP client (shared with schema and token fetches).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn tls(&self) -> &TlsMode {
        &self.tls
    }

    /// The tenant base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The tenant host, used as the key for per-tenant persisted state.
    pub fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    /// Extract the `Cookie` header value for the RPC upgrade request.
    pub fn cookie_header(&self) -> Option<String> {
        let jar = self.cookie_jar.as_ref()?;
        let cookies = jar.cookies(&self.base_url)?;
        cookies.to_str().ok().map(String::from)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api/v1/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/v1/{path}"))?)
    }

    /// Build the engine WebSocket URL:
    /// `wss://{host}/app/{app_id}[/identity/{identity}]?{params}`.
    ///
    /// A plain `http` tenant URL yields `ws://`, for local engines.
    pub fn engine_url(
        &self,
        app_id: &str,
        identity: Option<&str>,
        params: &[(String, String)],
    ) -> Result<Url, Error> {
        let scheme = if self.base_url.scheme() == "http" {
            "ws"
        } else {
            "wss"
        };

        let mut url = self.base_url.clone();
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot use {scheme} for {url}")))?;
        url.set_path("");
        url.set_query(None);
        url.set_fragment(None);

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?;
            segments.pop_if_empty().push("app").push(app_id);
            if let Some(identity) = identity.filter(|i| !i.is_empty()) {
                segments.push("identity").push(identity);
            }
        }

        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }

        debug!(url = %redact_query(&url), "built engine URL");
        Ok(url)
    }
}

/// Render a URL with query values masked, for logging.
pub(crate) fn redact_query(url: &Url) -> String {
    let mut shown = url.clone();
    let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
    if keys.is_empty() {
        return shown.to_string();
    }
    shown.set_query(None);
    shown
        .query_pairs_mut()
        .extend_pairs(keys.iter().map(|k| (k.as_str(), "****")));
    shown.to_string()
}
