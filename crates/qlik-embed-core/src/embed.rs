// ── Embed facade ──
//
// Full lifecycle of one embedded app: negotiate identity, open the live
// connection, expose state and slots, tear everything down. At most one
// connection is live per `Embed`.

use std::sync::{Arc, Weak};

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use qlik_embed_api::{TenantClient, TlsMode, TokenExchangeClient, TransportConfig};

use crate::auth::{AuthNegotiator, AuthSession, AuthStatus, Navigator, NoTokenExchange, SsoExchange};
use crate::config::{AuthSettings, EmbedConfig, TlsVerification};
use crate::error::CoreError;
use crate::session::{AppConnection, SessionManager};
use crate::store::KeyValueStore;
use crate::stream::{SlotStream, Slots};

// ── EmbedState ───────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EmbedState {
    Idle,
    Authenticating,
    /// An automatic login redirect is under way; not an error.
    Redirecting { login_url: Url },
    ManualAuthRequired { login_url: Url },
    Connecting,
    Ready,
    Failed { message: String },
    Closed,
}

// ── Embed ────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<EmbedInner>`.
#[derive(Clone)]
pub struct Embed {
    inner: Arc<EmbedInner>,
}

struct EmbedInner {
    config: EmbedConfig,
    client: TenantClient,
    negotiator: AuthNegotiator,
    sessions: SessionManager,
    state: watch::Sender<EmbedState>,
    connection: Mutex<Option<AppConnection>>,
    cancel: CancellationToken,
}

impl Embed {
    /// Create an embed from configuration. Does NOT connect; call
    /// [`activate()`](Self::activate).
    ///
    /// Without an explicit `sso`, OAuth2 configs use the HTTP token
    /// exchange at `token_exchange_url`, or none at all.
    pub fn new(
        config: EmbedConfig,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        sso: Option<Arc<dyn SsoExchange>>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let client = TenantClient::new(config.tenant.clone(), &build_transport(&config))?;
        let sso = sso.unwrap_or_else(|| default_sso(&config, &client));
        let cancel = CancellationToken::new();

        let negotiator = AuthNegotiator::new(
            client.clone(),
            store,
            navigator,
            sso,
            config.return_to.clone(),
        )
        .with_fallback_delay(config.redirect_fallback_delay)
        .with_cancel(cancel.clone());

        let sessions = SessionManager::new(client.clone(), config.schema_url.clone())
            .with_origin(config.return_to.origin().ascii_serialization())
            .with_cancel(cancel.clone());

        let (state, _) = watch::channel(EmbedState::Idle);

        Ok(Self {
            inner: Arc::new(EmbedInner {
                config,
                client,
                negotiator,
                sessions,
                state,
                connection: Mutex::new(None),
                cancel,
            }),
        })
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Negotiate identity and open the connection.
    ///
    /// A pending login redirect comes back as
    /// [`AuthFailure::RedirectInProgress`](crate::error::AuthFailure::RedirectInProgress); check
    /// [`CoreError::is_user_facing`] before reporting. Calling this while a
    /// connection is live is a no-op.
    pub async fn activate(&self) -> Result<(), CoreError> {
        let mut connection = self.inner.connection.lock().await;
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Session {
                message: "embed was torn down".into(),
            });
        }
        if connection.as_ref().is_some_and(|c| !c.is_closed()) {
            debug!("already connected");
            return Ok(());
        }

        let mut credential = self.inner.config.credential();
        let session = self.negotiate_with(&mut credential).await;
        session.into_result()?;

        self.set_state(EmbedState::Connecting);
        let config = &self.inner.config;
        let opened = self
            .inner
            .sessions
            .open(
                &credential,
                &config.app_id,
                config.identity.as_deref(),
                &config.object_ids,
            )
            .await;

        match opened {
            Ok(conn) if self.inner.cancel.is_cancelled() => {
                conn.close();
                Err(CoreError::Session {
                    message: "embed was torn down".into(),
                })
            }
            Ok(conn) => {
                let ended = conn.session_end();
                *connection = Some(conn);
                self.set_state(EmbedState::Ready);
                tokio::spawn(fail_on_session_end(Arc::downgrade(&self.inner), ended));
                info!(app_id = %config.app_id, "embed ready");
                Ok(())
            }
            Err(e) => {
                self.set_state(EmbedState::Failed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run only the identity negotiation, updating the state.
    pub async fn negotiate(&self) -> AuthSession {
        let mut credential = self.inner.config.credential();
        self.negotiate_with(&mut credential).await
    }

    async fn negotiate_with(&self, credential: &mut crate::auth::Credential) -> AuthSession {
        self.set_state(EmbedState::Authenticating);
        let session = self.inner.negotiator.negotiate(credential).await;

        let next = match (session.status(), session.login_url()) {
            (AuthStatus::Authenticated, _) => None,
            (AuthStatus::RedirectPending, Some(url)) => Some(EmbedState::Redirecting {
                login_url: url.clone(),
            }),
            (AuthStatus::ManualAuthRequired, Some(url)) => Some(EmbedState::ManualAuthRequired {
                login_url: url.clone(),
            }),
            _ => Some(EmbedState::Failed {
                message: session.error().map_or_else(
                    || format!("authentication ended in state {}", session.status()),
                    ToString::to_string,
                ),
            }),
        };
        if let Some(next) = next {
            self.set_state(next);
        }
        session
    }

    /// Close the connection and cancel pending timers. Idempotent; the
    /// embed cannot be activated again afterwards.
    pub async fn teardown(&self) {
        self.inner.cancel.cancel();
        if let Some(conn) = self.inner.connection.lock().await.take() {
            conn.close();
        }
        if *self.inner.state.borrow() != EmbedState::Closed {
            self.set_state(EmbedState::Closed);
            debug!("embed torn down");
        }
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn state(&self) -> EmbedState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<EmbedState> {
        self.inner.state.subscribe()
    }

    /// Current slots; empty when not connected.
    pub async fn slots(&self) -> Slots {
        self.inner
            .connection
            .lock()
            .await
            .as_ref()
            .filter(|c| !c.is_closed())
            .map(AppConnection::subscriptions)
            .unwrap_or_default()
    }

    /// Slot subscription of the live connection, if any.
    pub async fn subscribe_slots(&self) -> Option<SlotStream> {
        self.inner
            .connection
            .lock()
            .await
            .as_ref()
            .filter(|c| !c.is_closed())
            .map(AppConnection::subscribe)
    }

    /// Login URL for a manual login: from the last negotiation if it saw a
    /// 401, else computed from the configuration (web-integration only).
    pub fn login_url(&self) -> Option<Url> {
        match &*self.inner.state.borrow() {
            EmbedState::Redirecting { login_url } | EmbedState::ManualAuthRequired { login_url } => {
                return Some(login_url.clone());
            }
            _ => {}
        }
        let config = &self.inner.config;
        match (&config.auth, &config.web_integration_id) {
            (AuthSettings::WebIntegration, Some(id)) => self
                .inner
                .client
                .login_url(id, config.return_to.as_str())
                .map_err(|e| warn!(error = %e, "cannot build login URL"))
                .ok(),
            _ => None,
        }
    }

    fn set_state(&self, next: EmbedState) {
        self.inner.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = ?state, to = ?next, "embed state");
            *state = next;
            true
        });
    }
}

/// Move a ready embed to `Failed` once the engine ends its session.
/// A teardown, or a newer live connection, takes precedence.
async fn fail_on_session_end(
    inner: Weak<EmbedInner>,
    ended: impl Future<Output = ()> + Send + 'static,
) {
    ended.await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    if inner.cancel.is_cancelled() {
        return;
    }
    let embed = Embed { inner };
    let connection = embed.inner.connection.lock().await;
    if connection.as_ref().is_some_and(|c| !c.is_closed()) {
        return;
    }
    if embed.state() == EmbedState::Ready {
        warn!("engine closed the session");
        embed.set_state(EmbedState::Failed {
            message: "engine closed the session".into(),
        });
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn build_transport(config: &EmbedConfig) -> TransportConfig {
    let tls = match &config.tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    };
    TransportConfig {
        tls,
        timeout: config.timeout,
        cookie_jar: None,
    }
}

fn default_sso(config: &EmbedConfig, client: &TenantClient) -> Arc<dyn SsoExchange> {
    match &config.auth {
        AuthSettings::OAuth2 {
            token_exchange_url: Some(endpoint),
            ..
        } => Arc::new(TokenExchangeClient::new(client.http().clone(), endpoint.clone())),
        _ => Arc::new(NoTokenExchange),
    }
}
