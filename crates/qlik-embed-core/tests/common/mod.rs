// Mock tenant plus engine on one local port.
//
// Plain HTTP requests (identity probe, CSRF, schema) get canned answers
// with `connection: close`; `/app/...` requests are upgraded to a
// WebSocket that answers OpenDoc, GetObject and GetLayout from an
// in-memory object table. Object `i` of the table lives at handle 10 + i.
// GetLayout replies can be held back to open a window between a change
// signal and its re-fetch.

#![allow(clippy::unwrap_used, dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;

pub const APP_ID: &str = "app-1";
const FIRST_OBJECT_HANDLE: i64 = 10;

/// Request line and headers of one WebSocket upgrade.
#[derive(Debug, Clone)]
pub struct Upgrade {
    pub uri: String,
    pub headers: Vec<(String, String)>,
}

impl Upgrade {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum EngineEvent {
    Change(i64),
    DropSessions,
}

struct Shared {
    objects: Mutex<Vec<(String, Value)>>,
    csrf: Option<String>,
    upgrades: Mutex<Vec<Upgrade>>,
    events: broadcast::Sender<EngineEvent>,
    /// `true` while GetLayout replies are held back.
    hold_layouts: watch::Sender<bool>,
    held_layouts: AtomicUsize,
}

pub struct MockEngine {
    addr: SocketAddr,
    shared: Arc<Shared>,
}

impl MockEngine {
    /// Start an engine serving `objects` of app [`APP_ID`]. `csrf` is the
    /// value of the `qlik-csrf-token` header, or `None` to omit it.
    pub async fn start(objects: &[(&str, Value)], csrf: Option<&str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (events, _) = broadcast::channel(16);
        let shared = Arc::new(Shared {
            objects: Mutex::new(
                objects
                    .iter()
                    .map(|(id, layout)| ((*id).to_string(), layout.clone()))
                    .collect(),
            ),
            csrf: csrf.map(String::from),
            upgrades: Mutex::new(Vec::new()),
            events,
            hold_layouts: watch::Sender::new(false),
            held_layouts: AtomicUsize::new(0),
        });

        let accept = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&accept)));
            }
        });

        Self { addr, shared }
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn schema_url(&self) -> Url {
        self.base_url().join("/schema.json").unwrap()
    }

    pub fn upgrades(&self) -> Vec<Upgrade> {
        self.shared.upgrades.lock().unwrap().clone()
    }

    /// Replace the layout of `object_id` and signal the change.
    pub fn change(&self, object_id: &str, layout: Value) {
        let handle = {
            let mut objects = self.shared.objects.lock().unwrap();
            let index = objects.iter().position(|(id, _)| id == object_id).unwrap();
            objects[index].1 = layout;
            FIRST_OBJECT_HANDLE + i64::try_from(index).unwrap()
        };
        let _ = self.shared.events.send(EngineEvent::Change(handle));
    }

    /// Close every open engine session from the server side.
    pub fn drop_sessions(&self) {
        let _ = self.shared.events.send(EngineEvent::DropSessions);
    }

    /// Hold GetLayout replies until [`release_layouts`](Self::release_layouts).
    pub fn hold_layouts(&self) {
        self.shared.hold_layouts.send_replace(true);
    }

    pub fn release_layouts(&self) {
        self.shared.hold_layouts.send_replace(false);
    }

    /// GetLayout requests that arrived while replies were held.
    pub fn held_layouts(&self) -> usize {
        self.shared.held_layouts.load(Ordering::SeqCst)
    }
}

// ── Layout fixtures ─────────────────────────────────────────────────

pub fn kpi_layout(title: &str, value: &str) -> Value {
    json!({
        "qInfo": { "qType": "kpi" },
        "qMeta": { "title": title },
        "qHyperCube": { "qDataPages": [{ "qMatrix": [[{ "qText": value, "qNum": "NaN" }]] }] }
    })
}

pub fn table_layout(title: &str) -> Value {
    json!({
        "qMeta": { "title": title },
        "qHyperCube": { "qDataPages": [{ "qMatrix": [
            [{ "qText": "North" }, { "qText": "12", "qNum": 12 }],
            [{ "qText": "South" }, { "qText": "7", "qNum": 7 }]
        ] }] }
    })
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

// ── Connection handling ─────────────────────────────────────────────

async fn serve(mut stream: TcpStream, shared: Arc<Shared>) {
    let Some(path) = peek_path(&stream).await else {
        return;
    };
    if path.starts_with("/app/") {
        serve_engine(stream, shared).await;
        return;
    }

    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => request.extend_from_slice(&buf[..n]),
        }
    }

    let response = match path.split('?').next().unwrap_or_default() {
        "/api/v1/users/me" => http_response("200 OK", &[], r#"{"id":"u1"}"#),
        "/api/v1/csrf-token" => match &shared.csrf {
            Some(token) => http_response("200 OK", &[("qlik-csrf-token", token)], ""),
            None => http_response("200 OK", &[], ""),
        },
        "/schema.json" => http_response("200 OK", &[], &schema_document().to_string()),
        _ => http_response("404 Not Found", &[], ""),
    };
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn peek_path(stream: &TcpStream) -> Option<String> {
    let mut buf = [0u8; 1024];
    for _ in 0..200 {
        let n = stream.peek(&mut buf).await.ok()?;
        if n == 0 {
            return None;
        }
        let head = String::from_utf8_lossy(&buf[..n]);
        if let Some(line) = head.split("\r\n").next().filter(|_| head.contains("\r\n")) {
            return line.split(' ').nth(1).map(String::from);
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    None
}

fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
    let extra: String = headers
        .iter()
        .map(|(n, v)| format!("{n}: {v}\r\n"))
        .collect();
    format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n{extra}\r\n{body}",
        body.len()
    )
}

fn schema_document() -> Value {
    json!({
        "version": "12.612.0",
        "structs": {
            "Global": { "OpenDoc": {} },
            "Doc": { "GetObject": {} },
            "GenericObject": { "GetLayout": {} }
        }
    })
}

async fn serve_engine(stream: TcpStream, shared: Arc<Shared>) {
    let record = Arc::clone(&shared);
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let headers = req
            .headers()
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        record.upgrades.lock().unwrap().push(Upgrade {
            uri: req.uri().to_string(),
            headers,
        });
        Ok(resp)
    };
    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
        return;
    };
    let mut events = shared.events.subscribe();
    let (late_tx, mut late_rx) = mpsc::unbounded_channel::<Value>();

    loop {
        tokio::select! {
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let text = text.as_str().to_string();
                    if is_layout_request(&text) && *shared.hold_layouts.borrow() {
                        shared.held_layouts.fetch_add(1, Ordering::SeqCst);
                        let shared = Arc::clone(&shared);
                        let late_tx = late_tx.clone();
                        tokio::spawn(async move {
                            let mut gate = shared.hold_layouts.subscribe();
                            let _ = gate.wait_for(|held| !held).await;
                            let _ = late_tx.send(answer(&shared, &text));
                        });
                        continue;
                    }
                    let reply = answer(&shared, &text);
                    if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            Some(reply) = late_rx.recv() => {
                if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                    break;
                }
            }
            event = events.recv() => match event {
                Ok(EngineEvent::Change(handle)) => {
                    let frame = json!({ "jsonrpc": "2.0", "change": [handle] });
                    if ws.send(Message::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
                Ok(EngineEvent::DropSessions) => {
                    let _ = ws.close(None).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

fn is_layout_request(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .is_ok_and(|request| request["method"] == "GetLayout")
}

fn answer(shared: &Shared, text: &str) -> Value {
    let request: Value = serde_json::from_str(text).unwrap();
    let id = request["id"].clone();
    let handle = request["handle"].as_i64().unwrap_or_default();
    let objects = shared.objects.lock().unwrap();

    let result = match request["method"].as_str().unwrap_or_default() {
        "OpenDoc" if request["params"]["qDocName"] == APP_ID => {
            Ok(json!({ "qReturn": { "qType": "Doc", "qHandle": 1 } }))
        }
        "GetObject" => {
            let wanted = request["params"]["qId"].as_str().unwrap_or_default();
            objects
                .iter()
                .position(|(id, _)| id == wanted)
                .map(|index| {
                    json!({ "qReturn": {
                        "qType": "GenericObject",
                        "qHandle": FIRST_OBJECT_HANDLE + i64::try_from(index).unwrap(),
                        "qGenericId": wanted
                    } })
                })
                .ok_or_else(|| json!({ "code": 2, "parameter": "qId", "message": "Object not found" }))
        }
        "GetLayout" => usize::try_from(handle - FIRST_OBJECT_HANDLE)
            .ok()
            .and_then(|index| objects.get(index))
            .map(|(_, layout)| json!({ "qLayout": layout }))
            .ok_or_else(|| json!({ "code": 3, "message": "Invalid handle" })),
        _ => Err(json!({ "code": 1002, "message": "App not found" })),
    };

    match result {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(error) => json!({ "jsonrpc": "2.0", "id": id, "error": error }),
    }
}
