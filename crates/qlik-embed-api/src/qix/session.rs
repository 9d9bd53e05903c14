//! QIX engine RPC session over a WebSocket.
//!
//! One background task writes outbound frames, another reads inbound
//! frames and routes them: responses resolve the pending call with the
//! matching `id`, `change` lists wake the [`ChangeSubscription`] of each
//! listed handle, `close` lists drop them. Once the session is closed,
//! frames still in flight are ignored and every pending call fails with
//! [`Error::SessionClosed`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use qlik_embed_api::qix::{RpcSession, Schema};
//! use qlik_embed_api::TlsMode;
//! use tokio_util::sync::CancellationToken;
//!
//! let session = RpcSession::open(&url, &headers, Arc::new(schema), &TlsMode::System, CancellationToken::new()).await?;
//! let doc = session.open_doc("app-id").await?;
//! let obj = session.get_object(&doc, "htaMkv").await?;
//! let layout = session.get_layout(&obj).await?;
//!
//! let mut changes = session.subscribe_changes(&obj);
//! while changes.changed().await.is_some() {
//!     let layout = session.get_layout(&obj).await?;
//! }
//! session.close();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;
use crate::qix::protocol::{Handle, Incoming, ObjectRef, Request};
use crate::qix::schema::Schema;
use crate::tenant::client::redact_query;
use crate::transport::TlsMode;

type PendingCall = oneshot::Sender<Result<Value, Error>>;

struct Listener {
    id: u64,
    tx: mpsc::UnboundedSender<()>,
}

struct SessionInner {
    outbound: mpsc::UnboundedSender<Message>,
    pending: DashMap<u64, PendingCall>,
    listeners: DashMap<i64, Vec<Listener>>,
    next_id: AtomicU64,
    next_listener: AtomicU64,
    schema: Arc<Schema>,
    cancel: CancellationToken,
    closed: AtomicBool,
}

// ── RpcSession ───────────────────────────────────────────────────────

/// Handle to an open engine session.
///
/// Cheaply cloneable; all clones share the same socket.
#[derive(Clone)]
pub struct RpcSession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for RpcSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcSession")
            .field("closed", &self.is_closed())
            .field("pending", &self.inner.pending.len())
            .field("listeners", &self.inner.listeners.len())
            .finish()
    }
}

impl RpcSession {
    /// Connect to the engine and spawn the reader and writer tasks.
    ///
    /// `headers` are added to the upgrade request (cookies, bearer
    /// authorization, origin). `tls` governs certificate checks on `wss://`
    /// the same way it does for the tenant's HTTP client. Cancelling
    /// `cancel` closes the session.
    pub async fn open(
        url: &Url,
        headers: &[(String, String)],
        schema: Arc<Schema>,
        tls: &TlsMode,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        info!(url = %redact_query(url), "opening RPC session");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

        let mut request = ClientRequestBuilder::new(uri);
        for (name, value) in headers {
            request = request.with_header(name.clone(), value.clone());
        }

        let connector = tls.websocket_connector()?;
        let (ws_stream, _response) =
            tokio_tungstenite::connect_async_tls_with_config(request, None, false, connector)
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        info!("RPC session connected");

        let (write, read) = ws_stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(SessionInner {
            outbound,
            pending: DashMap::new(),
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            next_listener: AtomicU64::new(1),
            schema,
            cancel,
            closed: AtomicBool::new(false),
        });

        tokio::spawn(write_loop(write, outbound_rx, inner.cancel.clone()));
        tokio::spawn(read_loop(read, Arc::clone(&inner)));

        Ok(Self { inner })
    }

    /// The global handle (`-1`).
    pub fn global(&self) -> Handle {
        Handle::global()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Resolves once the session is closed, locally or by the engine.
    pub async fn closed(&self) {
        self.inner.cancel.cancelled().await;
    }

    /// Issue one method call and wait for its result.
    pub async fn call(&self, handle: &Handle, method: &str, params: Value) -> Result<Value, Error> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        self.inner.schema.check_method(&handle.q_type, method)?;

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            jsonrpc: "2.0",
            id,
            handle: handle.id,
            method,
            params: &params,
        };
        let text = serde_json::to_string(&request).map_err(|e| Error::Deserialization {
            message: format!("failed to encode {method} request: {e}"),
            body: String::new(),
        })?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(id, tx);

        trace!(frame = %text, "sent");
        if self.inner.outbound.send(Message::Text(text.into())).is_err() {
            self.inner.pending.remove(&id);
            return Err(Error::SessionClosed);
        }

        tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => {
                self.inner.pending.remove(&id);
                Err(Error::SessionClosed)
            }
            result = rx => result.unwrap_or(Err(Error::SessionClosed)),
        }
    }

    /// `OpenDoc` on the global handle.
    pub async fn open_doc(&self, app_id: &str) -> Result<Handle, Error> {
        let result = self
            .call(&self.global(), "OpenDoc", json!({ "qDocName": app_id }))
            .await?;
        handle_from_result(&result).ok_or_else(|| Error::Rpc {
            code: -1,
            message: format!("app {app_id} could not be opened"),
            parameter: Some(app_id.to_string()),
        })
    }

    /// `GetObject` on a document handle.
    pub async fn get_object(&self, doc: &Handle, object_id: &str) -> Result<Handle, Error> {
        let result = self
            .call(doc, "GetObject", json!({ "qId": object_id }))
            .await?;
        handle_from_result(&result).ok_or_else(|| Error::ObjectNotFound {
            id: object_id.to_string(),
        })
    }

    /// `GetLayout` on an object handle; returns the raw `qLayout`.
    pub async fn get_layout(&self, object: &Handle) -> Result<Value, Error> {
        let mut result = self.call(object, "GetLayout", json!({})).await?;
        match result.get_mut("qLayout").map(Value::take) {
            Some(layout) if !layout.is_null() => Ok(layout),
            _ => Err(Error::Deserialization {
                message: "GetLayout result carries no qLayout".into(),
                body: result.to_string(),
            }),
        }
    }

    /// Listen for engine change signals on `handle`.
    ///
    /// Every subscription on a handle is woken by its changes; the engine
    /// hands out the same handle when one object is requested twice.
    pub fn subscribe_changes(&self, handle: &Handle) -> ChangeSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener_id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);

        if !self.is_closed() {
            self.inner
                .listeners
                .entry(handle.id)
                .or_default()
                .push(Listener { id: listener_id, tx });
        }

        ChangeSubscription {
            handle: handle.id,
            listener_id,
            rx,
            session: Arc::downgrade(&self.inner),
        }
    }

    /// Close the session. Idempotent.
    ///
    /// Pending calls fail with [`Error::SessionClosed`], subscriptions end,
    /// and frames that still arrive are dropped unread.
    pub fn close(&self) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        info!("closing RPC session");
        self.inner.shutdown("closed locally");
    }
}

fn handle_from_result(result: &Value) -> Option<Handle> {
    let object: ObjectRef = serde_json::from_value(result.get("qReturn")?.clone()).ok()?;
    Some(Handle {
        id: object.q_handle?,
        q_type: object.q_type,
        generic_id: object.q_generic_id,
        generic_type: object.q_generic_type,
    })
}

impl SessionInner {
    fn shutdown(&self, reason: &str) {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        self.cancel.cancel();

        let ids: Vec<u64> = self.pending.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(Error::SessionClosed));
            }
        }
        self.listeners.clear();

        if first {
            debug!(reason, "RPC session shut down");
        }
    }

    /// Route one inbound text frame.
    fn dispatch(&self, text: &str) {
        if self.closed.load(Ordering::Acquire) {
            trace!("ignoring frame for closed session");
            return;
        }
        trace!(frame = %text, "received");

        let frame: Incoming = match serde_json::from_str(text) {
            Ok(f) => f,
            Err(e) => {
                debug!(error = %e, "failed to parse engine frame");
                return;
            }
        };

        if let Some(id) = frame.id {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let result = match (frame.error, frame.result) {
                    (Some(err), _) => Err(Error::Rpc {
                        code: err.code,
                        message: err.message,
                        parameter: err.parameter,
                    }),
                    (None, Some(result)) => Ok(result),
                    (None, None) => Ok(Value::Null),
                };
                let _ = tx.send(result);
            } else {
                debug!(id, "response for unknown request");
            }
        } else if let Some(method) = frame.method.as_deref() {
            match method {
                "OnAuthenticationInformation" => {
                    warn!(params = ?frame.params, "engine requests authentication");
                }
                _ => debug!(method, "engine notification"),
            }
        }

        for handle in frame.close {
            self.listeners.remove(&handle);
        }
        for handle in frame.change {
            self.notify_change(handle);
        }
    }

    fn notify_change(&self, handle: i64) {
        if let Some(mut listeners) = self.listeners.get_mut(&handle) {
            listeners.retain(|l| l.tx.send(()).is_ok());
        }
        self.listeners.remove_if(&handle, |_, listeners| listeners.is_empty());
    }
}

// ── ChangeSubscription ───────────────────────────────────────────────

/// Change signals for one remote object.
///
/// Dropping the subscription (or calling [`unsubscribe`](Self::unsubscribe))
/// deregisters it.
#[derive(Debug)]
pub struct ChangeSubscription {
    handle: i64,
    listener_id: u64,
    rx: mpsc::UnboundedReceiver<()>,
    session: Weak<SessionInner>,
}

impl ChangeSubscription {
    pub fn handle(&self) -> i64 {
        self.handle
    }

    /// Wait for the next change. Signals that queued up meanwhile are
    /// coalesced into one. Returns `None` once the session or the handle
    /// is closed.
    pub async fn changed(&mut self) -> Option<()> {
        self.rx.recv().await?;
        while self.rx.try_recv().is_ok() {}
        Some(())
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.session.upgrade() {
            let id = self.listener_id;
            if let Some(mut listeners) = inner.listeners.get_mut(&self.handle) {
                listeners.retain(|l| l.id != id);
            }
            inner
                .listeners
                .remove_if(&self.handle, |_, listeners| listeners.is_empty());
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            msg = outbound.recv() => match msg {
                Some(msg) => {
                    if let Err(e) = sink.send(msg).await {
                        warn!(error = %e, "RPC write failed");
                        break;
                    }
                }
                None => break,
            }
        }
    }
    trace!("RPC writer exiting");
}

async fn read_loop<S>(mut stream: S, inner: Arc<SessionInner>)
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let reason = loop {
        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break "closed locally",
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => inner.dispatch(&text),
                Some(Ok(Message::Close(frame))) => {
                    if let Some(ref cf) = frame {
                        info!(code = %cf.code, reason = %cf.reason, "engine closed the session");
                    } else {
                        info!("engine closed the session");
                    }
                    break "closed by engine";
                }
                Some(Ok(_)) => {
                    // Binary, Ping, Pong -- tungstenite answers pings itself
                }
                Some(Err(e)) => {
                    warn!(error = %e, "RPC read failed");
                    break "transport error";
                }
                None => break "stream ended",
            }
        }
    };
    inner.shutdown(reason);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn inner() -> (Arc<SessionInner>, mpsc::UnboundedReceiver<Message>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SessionInner {
            outbound,
            pending: DashMap::new(),
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
            next_listener: AtomicU64::new(1),
            schema: Arc::new(Schema::default()),
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
        });
        (inner, rx)
    }

    #[test]
    fn dispatch_resolves_pending_call() {
        let (inner, _rx) = inner();
        let (tx, mut rx) = oneshot::channel();
        inner.pending.insert(7, tx);

        inner.dispatch(r#"{"jsonrpc":"2.0","id":7,"result":{"qLayout":{"qInfo":{}}}}"#);

        let result = rx.try_recv().unwrap().unwrap();
        assert!(result.get("qLayout").is_some());
        assert!(inner.pending.is_empty());
    }

    #[test]
    fn dispatch_maps_engine_error() {
        let (inner, _rx) = inner();
        let (tx, mut rx) = oneshot::channel();
        inner.pending.insert(2, tx);

        inner.dispatch(
            r#"{"jsonrpc":"2.0","id":2,"error":{"code":2,"parameter":"qId","message":"Invalid handle"}}"#,
        );

        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, Error::Rpc { code: 2, .. }));
    }

    #[test]
    fn change_list_wakes_only_listed_handles() {
        let (inner, _rx) = inner();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        inner.listeners.insert(1, vec![Listener { id: 1, tx: tx1 }]);
        inner.listeners.insert(2, vec![Listener { id: 2, tx: tx2 }]);

        inner.dispatch(r#"{"jsonrpc":"2.0","change":[2]}"#);

        assert!(rx1.try_recv().is_err());
        assert!(rx2.try_recv().is_ok());
    }

    #[tokio::test]
    async fn shared_handle_wakes_every_subscription() {
        let (inner, _rx) = inner();
        let session = RpcSession {
            inner: Arc::clone(&inner),
        };
        let handle = Handle {
            id: 10,
            q_type: "GenericObject".into(),
            generic_id: Some("sales".into()),
            generic_type: None,
        };
        let mut first = session.subscribe_changes(&handle);
        let mut second = session.subscribe_changes(&handle);

        inner.dispatch(r#"{"jsonrpc":"2.0","change":[10]}"#);
        assert_eq!(first.changed().await, Some(()));
        assert_eq!(second.changed().await, Some(()));

        drop(second);
        assert_eq!(inner.listeners.get(&10).map(|l| l.len()), Some(1));
        inner.dispatch(r#"{"jsonrpc":"2.0","change":[10]}"#);
        assert_eq!(first.changed().await, Some(()));

        drop(first);
        assert!(inner.listeners.is_empty());
    }

    #[test]
    fn frames_after_shutdown_are_ignored() {
        let (inner, _rx) = inner();
        let (tx, mut rx) = mpsc::unbounded_channel();
        inner.listeners.insert(3, vec![Listener { id: 1, tx }]);
        inner.shutdown("test");

        inner.dispatch(r#"{"jsonrpc":"2.0","change":[3]}"#);

        // Listener was dropped by shutdown, nothing was delivered.
        assert!(rx.try_recv().is_err());
        assert!(inner.listeners.is_empty());
    }

    #[test]
    fn shutdown_fails_pending_calls() {
        let (inner, _rx) = inner();
        let (tx, mut rx) = oneshot::channel();
        inner.pending.insert(9, tx);

        inner.shutdown("test");

        assert!(matches!(rx.try_recv().unwrap(), Err(Error::SessionClosed)));
        assert!(inner.cancel.is_cancelled());
    }

    #[tokio::test]
    async fn open_applies_tls_mode_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("ca.pem");
        std::fs::write(&ca, "").unwrap();
        let url = Url::parse("wss://127.0.0.1:1/app/app-1").unwrap();

        let err = RpcSession::open(
            &url,
            &[],
            Arc::new(Schema::default()),
            &TlsMode::CustomCa(ca),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Tls(_)), "{err}");
    }

    #[test]
    fn handle_from_result_requires_a_handle() {
        let ok = json!({"qReturn": {"qType": "GenericObject", "qHandle": 3, "qGenericId": "x"}});
        let missing = json!({"qReturn": {"qType": "GenericObject", "qHandle": null}});
        assert_eq!(handle_from_result(&ok).map(|h| h.id), Some(3));
        assert!(handle_from_result(&missing).is_none());
        assert!(handle_from_result(&json!({})).is_none());
    }
}
