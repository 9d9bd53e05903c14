//! Identity negotiation against a tenant.
//!
//! [`AuthNegotiator::negotiate`] runs one attempt of the state machine
//!
//! ```text
//! Unauthenticated ─▶ Probing ─┬─▶ Authenticated        (200)
//!                             ├─▶ RedirectPending      (401, guard unset)
//!                             ├─▶ ManualAuthRequired   (401, guard set)
//!                             └─▶ Failed               (other status, network, no token)
//! ```
//!
//! The redirect guard is a flag in the persisted store. It allows exactly
//! one automatic login redirect: the first 401 sets it and navigates, a
//! second 401 after the round trip clears it and asks the user to log in
//! by hand. Any 200 clears it.
//!
//! On the OAuth2 path a cached token is tried first. If it is rejected the
//! cache entry is dropped, a new token is requested from the
//! [`SsoExchange`], cached, and probed exactly once more.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use qlik_embed_api::{AuthMode, Credentials, ProbeOutcome, TenantClient, TokenRequest};

use super::credential::Credential;
use super::navigator::Navigator;
use super::sso::SsoExchange;
use super::token_locator::{TokenLocator, TokenSource};
use crate::config::DEFAULT_REDIRECT_FALLBACK;
use crate::error::{AuthFailure, CoreError};
use crate::store::KeyValueStore;

/// Store key of the one-shot redirect guard.
pub const REDIRECT_GUARD_KEY: &str = "qlik-embed:redirect-attempted";

/// Store key under which issued tokens are cached.
pub fn token_cache_key(tenant: &str) -> String {
    format!("qlik-access-token-{tenant}")
}

// ── AuthSession ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthStatus {
    Unauthenticated,
    Probing,
    RedirectPending,
    ManualAuthRequired,
    Authenticated,
    Failed,
}

impl AuthStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Unauthenticated | Self::Probing)
    }
}

/// Outcome of one negotiation.
#[derive(Debug, Clone)]
pub struct AuthSession {
    status: AuthStatus,
    login_url: Option<Url>,
    error: Option<CoreError>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self {
            status: AuthStatus::Unauthenticated,
            login_url: None,
            error: None,
        }
    }
}

impl AuthSession {
    pub fn status(&self) -> AuthStatus {
        self.status
    }

    /// Tenant login URL, set once a 401 was seen.
    pub fn login_url(&self) -> Option<&Url> {
        self.login_url.as_ref()
    }

    pub fn error(&self) -> Option<&CoreError> {
        self.error.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    /// `Ok` when authenticated; otherwise the failure the status stands for.
    /// A pending redirect maps to [`AuthFailure::RedirectInProgress`],
    /// which callers must not surface.
    pub fn into_result(self) -> Result<Self, CoreError> {
        match self.status {
            AuthStatus::Authenticated => Ok(self),
            AuthStatus::RedirectPending => Err(AuthFailure::RedirectInProgress.into()),
            AuthStatus::ManualAuthRequired | AuthStatus::Failed => Err(self
                .error
                .unwrap_or_else(|| CoreError::auth_failed("authentication did not complete"))),
            AuthStatus::Unauthenticated | AuthStatus::Probing => {
                Err(CoreError::auth_failed("authentication did not complete"))
            }
        }
    }

    fn advance(&mut self, next: AuthStatus) {
        if self.status.is_terminal() {
            warn!(from = %self.status, to = %next, "ignoring transition out of a terminal state");
            return;
        }
        info!(from = %self.status, to = %next, "auth state");
        self.status = next;
    }

    fn fail(&mut self, error: CoreError) {
        warn!(error = %error, "authentication failed");
        self.advance(AuthStatus::Failed);
        self.error = Some(error);
    }
}

// ── AuthNegotiator ───────────────────────────────────────────────────

/// Decides whether the configured identity is accepted by the tenant.
pub struct AuthNegotiator {
    client: TenantClient,
    store: Arc<dyn KeyValueStore>,
    locator: TokenLocator,
    navigator: Arc<dyn Navigator>,
    sso: Arc<dyn SsoExchange>,
    return_to: Url,
    fallback_delay: Duration,
    cancel: CancellationToken,
}

impl AuthNegotiator {
    /// `return_to` is where the tenant login sends the user back.
    pub fn new(
        client: TenantClient,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        sso: Arc<dyn SsoExchange>,
        return_to: Url,
    ) -> Self {
        Self {
            client,
            locator: TokenLocator::new(Arc::clone(&store)),
            store,
            navigator,
            sso,
            return_to,
            fallback_delay: DEFAULT_REDIRECT_FALLBACK,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_fallback_delay(mut self, delay: Duration) -> Self {
        self.fallback_delay = delay;
        self
    }

    /// Cancelling `cancel` drops a fallback navigation that has not fired yet.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one negotiation. On the OAuth2 path the usable token, if any,
    /// is written back into `credential`.
    pub async fn negotiate(&self, credential: &mut Credential) -> AuthSession {
        let mut session = AuthSession::default();
        debug!(mode = ?credential.mode, tenant = credential.tenant_key(), "negotiating identity");

        match credential.mode {
            AuthMode::WebIntegration => self.negotiate_cookie(credential, &mut session).await,
            AuthMode::OAuth2 => self.negotiate_bearer(credential, &mut session).await,
        }
        session
    }

    // ── Cookie identity ──────────────────────────────────────────────

    async fn negotiate_cookie(&self, credential: &Credential, session: &mut AuthSession) {
        let creds = match credential.to_api() {
            Ok(creds) => creds,
            Err(e) => return session.fail(e),
        };
        let integration_id = match &creds {
            Credentials::WebIntegration { integration_id } => integration_id.clone(),
            Credentials::Bearer { .. } => {
                return session.fail(CoreError::config("Web integration ID is required"));
            }
        };

        session.advance(AuthStatus::Probing);
        match self.client.probe_identity(&creds).await {
            Ok(ProbeOutcome::Authenticated) => self.authenticated(session),
            Ok(ProbeOutcome::LoginRequired) => self.login_required(&integration_id, session),
            Ok(ProbeOutcome::Unexpected(status)) => session.fail(CoreError::auth_failed(format!(
                "Qlik Cloud authentication failed with status {status}"
            ))),
            Err(e) => session.fail(CoreError::from(e)),
        }
    }

    fn login_required(&self, integration_id: &str, session: &mut AuthSession) {
        let login_url = match self.client.login_url(integration_id, self.return_to.as_str()) {
            Ok(url) => url,
            Err(e) => return session.fail(CoreError::from(e)),
        };
        session.login_url = Some(login_url.clone());

        if self.store.get(REDIRECT_GUARD_KEY).is_none() {
            self.store.set(REDIRECT_GUARD_KEY, "1");
            session.advance(AuthStatus::RedirectPending);
            self.redirect(&login_url);
        } else {
            // The automatic redirect already ran once; cookies are likely
            // blocked.
            self.store.remove(REDIRECT_GUARD_KEY);
            session.advance(AuthStatus::ManualAuthRequired);
            session.error = Some(AuthFailure::ManualActionRequired { login_url }.into());
        }
    }

    /// Navigate to the login, falling back to a delayed same-context
    /// navigation when the top-level one is refused.
    fn redirect(&self, login_url: &Url) {
        match self.navigator.navigate_top(login_url) {
            Ok(()) => info!("redirecting to the tenant login"),
            Err(e) => {
                info!(reason = %e, delay = ?self.fallback_delay, "top-level navigation refused, falling back");
                let navigator = Arc::clone(&self.navigator);
                let cancel = self.cancel.clone();
                let delay = self.fallback_delay;
                let url = login_url.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => debug!("fallback navigation cancelled"),
                        () = tokio::time::sleep(delay) => navigator.navigate_self(&url),
                    }
                });
            }
        }
    }

    fn authenticated(&self, session: &mut AuthSession) {
        self.store.remove(REDIRECT_GUARD_KEY);
        session.login_url = None;
        session.advance(AuthStatus::Authenticated);
    }

    // ── Bearer identity ──────────────────────────────────────────────

    async fn negotiate_bearer(&self, credential: &mut Credential, session: &mut AuthSession) {
        let tenant = credential.tenant_key().to_string();
        let cache_key = token_cache_key(&tenant);
        session.advance(AuthStatus::Probing);

        if let Some(token) = credential.token.take() {
            if self.accepts_cached(&token).await {
                credential.token = Some(token);
                return self.authenticated(session);
            }
            self.store.remove(&cache_key);
        } else {
            // Each rejected known-key entry is evicted, so this walks the
            // candidates in priority order and ends.
            while let Some(found) = self.locator.locate_entry(&tenant) {
                if self.accepts_cached(&found.token).await {
                    credential.token = Some(found.token);
                    return self.authenticated(session);
                }
                if found.source == TokenSource::Scan {
                    break;
                }
                debug!(key = %found.key, "evicting rejected token");
                self.store.remove(&found.key);
            }
        }

        let Some(token) = self.issue_token(credential, &tenant).await else {
            return session.fail(CoreError::auth_failed("no usable token"));
        };
        self.store.set(&cache_key, token.expose_secret());

        match self.probe_bearer(&token).await {
            Ok(ProbeOutcome::Authenticated) => {
                credential.token = Some(token);
                self.authenticated(session);
            }
            Ok(outcome) => {
                debug!(?outcome, "issued token rejected");
                session.fail(CoreError::auth_failed("no usable token"));
            }
            Err(e) => session.fail(CoreError::from(e)),
        }
    }

    async fn accepts_cached(&self, token: &SecretString) -> bool {
        match self.probe_bearer(token).await {
            Ok(ProbeOutcome::Authenticated) => true,
            Ok(outcome) => {
                debug!(?outcome, "cached token rejected");
                false
            }
            Err(e) => {
                debug!(error = %e, "cached token probe failed");
                false
            }
        }
    }

    async fn probe_bearer(&self, token: &SecretString) -> Result<ProbeOutcome, qlik_embed_api::Error> {
        let creds = Credentials::Bearer {
            token: token.clone(),
        };
        self.client.probe_identity(&creds).await
    }

    /// Primary exchange, then the identity-derived attempt if the primary
    /// fails. A failing secondary attempt counts as "no token".
    async fn issue_token(&self, credential: &Credential, tenant: &str) -> Option<SecretString> {
        let request = TokenRequest {
            tenant: tenant.to_string(),
            client_id: credential.client_id.clone().unwrap_or_default(),
            redirect_uri: credential.redirect_uri.clone().unwrap_or_default(),
        };

        match self.sso.issue_token(&request).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token exchange failed, trying identity-derived token");
                self.sso
                    .issue_token_for_identity(credential.identity.as_deref())
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "identity-derived token failed");
                        None
                    })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_do_not_move() {
        let mut session = AuthSession::default();
        session.advance(AuthStatus::Probing);
        session.advance(AuthStatus::Authenticated);
        session.advance(AuthStatus::Failed);
        assert_eq!(session.status(), AuthStatus::Authenticated);
    }

    #[test]
    fn redirect_pending_is_a_suppressed_error() {
        let mut session = AuthSession::default();
        session.advance(AuthStatus::Probing);
        session.advance(AuthStatus::RedirectPending);
        let err = session.into_result().unwrap_err();
        assert!(!err.is_user_facing());
    }

    #[test]
    fn failed_session_carries_its_error() {
        let mut session = AuthSession::default();
        session.advance(AuthStatus::Probing);
        session.fail(CoreError::auth_failed("no usable token"));
        assert_eq!(session.status(), AuthStatus::Failed);
        assert_eq!(
            session.into_result().unwrap_err().to_string(),
            "Authentication failed: no usable token"
        );
    }

    #[test]
    fn status_names_are_snake_case() {
        assert_eq!(AuthStatus::ManualAuthRequired.to_string(), "manual_auth_required");
        assert_eq!(token_cache_key("acme"), "qlik-access-token-acme");
    }
}
