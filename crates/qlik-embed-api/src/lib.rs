// qlik-embed-api: Async Rust client for Qlik Cloud tenants and the QIX engine

pub mod auth;
pub mod error;
pub mod qix;
pub mod tenant;
pub mod transport;

pub use auth::{AuthMode, Credentials};
pub use error::Error;
pub use qix::{ChangeSubscription, Handle, RpcSession, Schema};
pub use tenant::{ProbeOutcome, TenantClient, TokenExchangeClient, TokenRequest};
pub use transport::{TlsMode, TransportConfig};
