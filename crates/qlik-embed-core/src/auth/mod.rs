// ── Identity negotiation ──
//
// Everything needed to turn configured identifiers into a usable tenant
// identity: the credential itself, the persisted-token locator, the
// negotiator state machine, and the two host collaborators it drives
// (navigation and delegated token issuance).

mod credential;
mod navigator;
mod negotiator;
mod sso;
mod token_locator;

pub use credential::Credential;
pub use navigator::{NavigationError, Navigator, NullNavigator};
pub use negotiator::{
    AuthNegotiator, AuthSession, AuthStatus, REDIRECT_GUARD_KEY, token_cache_key,
};
pub use sso::{NoTokenExchange, SsoExchange};
pub use token_locator::{LocatedToken, TokenLocator, TokenSource};
