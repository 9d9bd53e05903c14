//! Live embedding of Qlik Cloud objects on top of `qlik-embed-api`.
//!
//! This crate owns identity negotiation, the live app connection and the
//! display model consumers render from:
//!
//! - **[`Embed`]**: central facade managing the full lifecycle.
//!   [`activate()`](Embed::activate) negotiates identity, opens the app and
//!   fetches every configured object; [`teardown()`](Embed::teardown) closes
//!   the session and guarantees no slot changes afterwards.
//!
//! - **[`AuthNegotiator`]**: the identity state machine over cookie
//!   (web-integration) and bearer (OAuth2) identity, with the one-shot
//!   redirect guard kept in a [`KeyValueStore`]. [`TokenLocator`] finds
//!   previously cached tokens for the OAuth2 path.
//!
//! - **[`SessionManager`]**: opens the engine RPC session and produces an
//!   [`AppConnection`] whose slots follow configuration order.
//!
//! - **[`normalize()`]**: pure reduction of raw layouts to [`DisplayModel`].
//!
//! - **[`ChangeNotifier`]**: applies per-slot updates sent by the
//!   connection's listener tasks. [`SlotStream`] exposes them reactively.

pub mod auth;
pub mod config;
pub mod embed;
pub mod error;
pub mod model;
pub mod normalize;
pub mod notifier;
pub mod session;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use auth::{
    AuthNegotiator, AuthSession, AuthStatus, Credential, NavigationError, Navigator,
    NoTokenExchange, NullNavigator, SsoExchange, TokenLocator,
};
pub use config::{AuthSettings, EmbedConfig, TlsVerification};
pub use embed::{Embed, EmbedState};
pub use error::{AuthFailure, CoreError};
pub use model::{Cell, DisplayModel, ObjectSubscription, Row};
pub use normalize::normalize;
pub use notifier::{ChangeNotifier, SlotUpdate};
pub use session::{AppConnection, SessionManager};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use stream::{SlotStream, Slots};

// Transport types consumers need to drive the lower layers directly.
pub use qlik_embed_api::{AuthMode, TenantClient, TokenRequest};
