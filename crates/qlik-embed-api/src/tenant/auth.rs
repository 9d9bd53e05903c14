// Tenant identity endpoints
//
// Identity probe (`/api/v1/users/me`), CSRF token fetch for
// web-integration sessions, and the interactive login URL. Cookie-based
// identity rides on the client's jar; bearer identity on the
// `Authorization` header.

use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use crate::auth::{CSRF_HEADER, Credentials, WEB_INTEGRATION_HEADER};
use crate::error::Error;
use crate::tenant::client::TenantClient;

/// What the tenant said about the presented identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// HTTP 200: the identity is valid.
    Authenticated,
    /// HTTP 401: an interactive login is needed.
    LoginRequired,
    /// Anything else; carries the status code.
    Unexpected(u16),
}

impl TenantClient {
    /// Ask the tenant who we are.
    ///
    /// Only transport failures are errors; every HTTP answer maps to a
    /// [`ProbeOutcome`] so the caller can drive its own state machine.
    pub async fn probe_identity(&self, credentials: &Credentials) -> Result<ProbeOutcome, Error> {
        let url = self.api_url("users/me")?;
        debug!(mode = ?credentials.mode(), "probing identity at {}", url);

        let resp = credentials
            .apply(self.http().get(url))
            .send()
            .await
            .map_err(Error::Transport)?;

        let outcome = match resp.status() {
            StatusCode::OK => ProbeOutcome::Authenticated,
            StatusCode::UNAUTHORIZED => ProbeOutcome::LoginRequired,
            other => ProbeOutcome::Unexpected(other.as_u16()),
        };
        debug!(?outcome, "identity probe answered");
        Ok(outcome)
    }

    /// Fetch a CSRF token for a web-integration RPC session.
    ///
    /// The token arrives in the `qlik-csrf-token` response header and is
    /// later folded into the engine URL's query.
    pub async fn fetch_csrf_token(&self, integration_id: &str) -> Result<String, Error> {
        let url = self.api_url("csrf-token")?;
        debug!("fetching CSRF token at {}", url);

        let resp = self
            .http()
            .get(url.clone())
            .header(WEB_INTEGRATION_HEADER, integration_id)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "CSRF token request was not authenticated".into(),
            });
        }
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                endpoint: url.path().to_string(),
                status: status.as_u16(),
            });
        }

        resp.headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from)
            .ok_or(Error::MissingCsrfToken)
    }

    /// Interactive login URL that returns to `return_to` afterwards:
    /// `{tenant}/login?qlik-web-integration-id={id}&returnto={return_to}`.
    pub fn login_url(&self, integration_id: &str, return_to: &str) -> Result<Url, Error> {
        let base = self.base_url().as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/login"))?;
        url.query_pairs_mut()
            .append_pair(WEB_INTEGRATION_HEADER, integration_id)
            .append_pair("returnto", return_to);
        Ok(url)
    }
}
