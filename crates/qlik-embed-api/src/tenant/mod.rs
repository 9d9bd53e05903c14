// Qlik Cloud tenant REST surface
//
// Identity probe, CSRF token, login URL, and the delegated token exchange.

pub mod auth;
pub mod client;
pub mod exchange;

pub use auth::ProbeOutcome;
pub use client::TenantClient;
pub use exchange::{TokenExchangeClient, TokenRequest};
