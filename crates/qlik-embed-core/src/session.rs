// ── Session manager ──
//
// Opens the engine RPC session for one app, fetches every configured
// object in order, and keeps the resulting slots live. Each object with a
// handle gets a listener task that re-fetches its layout on change and
// passes the result to the connection's `ChangeNotifier` task.

use std::sync::{Arc, Mutex};

use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use qlik_embed_api::auth::{CSRF_HEADER, WEB_INTEGRATION_HEADER};
use qlik_embed_api::{ChangeSubscription, Credentials, Handle, RpcSession, Schema, TenantClient};

use crate::auth::Credential;
use crate::error::CoreError;
use crate::model::DisplayModel;
use crate::normalize::normalize;
use crate::notifier::{ChangeNotifier, SlotUpdate};
use crate::store::SlotBoard;
use crate::stream::{SlotStream, Slots};

/// Query parameters and upgrade headers of the engine connection.
#[derive(Default)]
struct ConnectParams {
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
}

/// Opens [`AppConnection`]s against one tenant.
pub struct SessionManager {
    client: TenantClient,
    schema_url: Url,
    origin: Option<String>,
    cancel: CancellationToken,
}

impl SessionManager {
    pub fn new(client: TenantClient, schema_url: Url) -> Self {
        Self {
            client,
            schema_url,
            origin: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Origin header sent on the upgrade; tenants check it against the
    /// web integration's allowed origins.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Connections opened by this manager are closed when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Open the app and fetch `object_ids` into fixed slots.
    ///
    /// Fails only on connection-level problems (parameters, schema, socket,
    /// `OpenDoc`); a failing object is recorded as an error in its slot.
    pub async fn open(
        &self,
        credential: &Credential,
        app_id: &str,
        identity: Option<&str>,
        object_ids: &[String],
    ) -> Result<AppConnection, CoreError> {
        let params = self.connect_params(credential).await?;

        let schema = Schema::fetch(self.client.http(), &self.schema_url).await?;
        let url = self.client.engine_url(app_id, identity, &params.query)?;

        let cancel = self.cancel.child_token();
        let rpc = RpcSession::open(
            &url,
            &params.headers,
            Arc::new(schema),
            self.client.tls(),
            cancel.child_token(),
        )
        .await
        .map_err(session_error)?;

        let doc = match rpc.open_doc(app_id).await {
            Ok(doc) => doc,
            Err(e) => {
                rpc.close();
                return Err(session_error(e));
            }
        };
        info!(app_id, objects = object_ids.len(), "app opened");

        let board = Arc::new(SlotBoard::new(object_ids));
        let mut live = Vec::new();

        for (slot_index, object_id) in object_ids.iter().enumerate() {
            match fetch_object(&rpc, &doc, object_id).await {
                Ok((handle, changes, layout)) => {
                    let model = normalize(&layout, object_id, slot_index);
                    debug!(slot_index, object_id, kind = model.kind(), "object loaded");
                    board.replace(slot_index, object_id, model);
                    live.push((slot_index, object_id.clone(), handle, changes));
                }
                Err(e) => {
                    warn!(slot_index, object_id, error = %e, "error fetching object");
                    board.replace(
                        slot_index,
                        object_id,
                        DisplayModel::Error {
                            message: e.to_string(),
                        },
                    );
                }
            }
        }

        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let mut tasks = Vec::with_capacity(live.len() + 2);
        tasks.push(tokio::spawn(
            ChangeNotifier::new(Arc::clone(&board)).run(updates_rx, cancel.clone()),
        ));
        tasks.push(tokio::spawn(close_on_session_end(
            rpc.clone(),
            Arc::clone(&board),
            cancel.clone(),
        )));
        for (slot_index, object_id, handle, changes) in live {
            tasks.push(tokio::spawn(watch_object(
                rpc.clone(),
                ObjectWatch {
                    slot_index,
                    object_id,
                    handle,
                },
                changes,
                updates_tx.clone(),
                cancel.clone(),
            )));
        }

        Ok(AppConnection {
            app_id: app_id.to_string(),
            identity: identity.map(String::from),
            rpc,
            board,
            cancel,
            tasks: Mutex::new(tasks),
        })
    }

    async fn connect_params(&self, credential: &Credential) -> Result<ConnectParams, CoreError> {
        let mut params = ConnectParams::default();
        match credential.to_api()? {
            Credentials::WebIntegration { integration_id } => {
                let csrf = self
                    .client
                    .fetch_csrf_token(&integration_id)
                    .await
                    .map_err(|e| match e {
                        e if e.is_network() => CoreError::from(e),
                        e => CoreError::Session {
                            message: format!("Failed to get CSRF token: {e}"),
                        },
                    })?;
                params
                    .query
                    .push((WEB_INTEGRATION_HEADER.to_string(), integration_id));
                params.query.push((CSRF_HEADER.to_string(), csrf));
                if let Some(cookie) = self.client.cookie_header() {
                    params.headers.push(("Cookie".into(), cookie));
                }
            }
            Credentials::Bearer { token } => {
                let bearer = format!("Bearer {}", token.expose_secret());
                params.query.push(("authorization".into(), bearer.clone()));
                params.headers.push(("Authorization".into(), bearer));
            }
        }
        if let Some(origin) = &self.origin {
            params.headers.push(("Origin".into(), origin.clone()));
        }
        Ok(params)
    }
}

fn session_error(e: qlik_embed_api::Error) -> CoreError {
    if e.is_network() {
        return CoreError::from(e);
    }
    CoreError::Session {
        message: e.to_string(),
    }
}

/// `GetObject`, subscribe, `GetLayout`. Subscribing before the first
/// layout means a change racing the initial fetch is not lost.
async fn fetch_object(
    rpc: &RpcSession,
    doc: &Handle,
    object_id: &str,
) -> Result<(Handle, ChangeSubscription, serde_json::Value), qlik_embed_api::Error> {
    let handle = rpc.get_object(doc, object_id).await?;
    let changes = rpc.subscribe_changes(&handle);
    let layout = rpc.get_layout(&handle).await?;
    Ok((handle, changes, layout))
}

struct ObjectWatch {
    slot_index: usize,
    object_id: String,
    handle: Handle,
}

/// Re-fetch the layout on every change signal and forward it.
async fn watch_object(
    rpc: RpcSession,
    object: ObjectWatch,
    mut changes: ChangeSubscription,
    updates: mpsc::UnboundedSender<SlotUpdate>,
    cancel: CancellationToken,
) {
    let ObjectWatch {
        slot_index,
        object_id,
        handle,
    } = object;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            signal = changes.changed() => if signal.is_none() { break },
        }

        debug!(slot_index, object_id, "object changed");
        let update = match rpc.get_layout(&handle).await {
            Ok(layout) => SlotUpdate::Changed {
                slot_index,
                object_id: object_id.clone(),
                layout,
            },
            Err(e) if e.is_session_closed() => break,
            Err(e) => SlotUpdate::FetchFailed {
                slot_index,
                object_id: object_id.clone(),
                message: e.to_string(),
            },
        };

        if cancel.is_cancelled() || updates.send(update).is_err() {
            break;
        }
    }
    changes.unsubscribe();
    debug!(slot_index, object_id, "object listener exiting");
}

/// Close the slots once the engine ends the session on its own.
async fn close_on_session_end(rpc: RpcSession, board: Arc<SlotBoard>, cancel: CancellationToken) {
    tokio::select! {
        () = cancel.cancelled() => return,
        () = rpc.closed() => {}
    }
    if !board.is_closed() {
        warn!("engine ended the session");
        board.close();
    }
    cancel.cancel();
}

// ── AppConnection ────────────────────────────────────────────────────

/// A live app: its RPC session, its slots, and the tasks keeping them
/// current. Closed on [`close`](Self::close) or drop.
pub struct AppConnection {
    app_id: String,
    identity: Option<String>,
    rpc: RpcSession,
    board: Arc<SlotBoard>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for AppConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConnection")
            .field("app_id", &self.app_id)
            .field("identity", &self.identity)
            .field("slots", &self.board.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl AppConnection {
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Current slot sequence, in configuration order.
    pub fn subscriptions(&self) -> Slots {
        self.board.snapshot()
    }

    /// Slot subscription; ends when the connection closes.
    pub fn subscribe(&self) -> SlotStream {
        SlotStream::new(self.board.subscribe(), self.board.closed_signal())
    }

    /// True after [`close`](Self::close) or once the engine has ended the
    /// session.
    pub fn is_closed(&self) -> bool {
        self.board.is_closed() || self.rpc.is_closed()
    }

    /// Resolves when the engine session ends, locally or remotely.
    pub async fn session_closed(&self) {
        self.rpc.closed().await;
    }

    /// Owned form of [`session_closed`](Self::session_closed), for
    /// watchers that outlive the borrow.
    pub fn session_end(&self) -> impl Future<Output = ()> + Send + use<> {
        let rpc = self.rpc.clone();
        async move { rpc.closed().await }
    }

    /// Close the session and stop all listeners. Idempotent.
    ///
    /// Updates still in flight when this returns are dropped.
    pub fn close(&self) {
        let tasks: Vec<_> = self
            .tasks
            .lock()
            .expect("connection task lock poisoned")
            .drain(..)
            .collect();
        self.board.close();
        self.cancel.cancel();
        self.rpc.close();
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            task.abort();
        }
        info!(app_id = %self.app_id, "connection closed");
    }
}

impl Drop for AppConnection {
    fn drop(&mut self) {
        self.close();
    }
}
