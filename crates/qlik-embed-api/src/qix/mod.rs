// QIX engine protocol
//
// JSON-RPC over a WebSocket: schema bootstrap, session with pending-call
// routing, and per-handle change subscriptions.

pub mod protocol;
pub mod schema;
pub mod session;

pub use protocol::{GLOBAL_HANDLE, Handle, RpcError};
pub use schema::{DEFAULT_SCHEMA_URL, Schema};
pub use session::{ChangeSubscription, RpcSession};
