use thiserror::Error;
use url::Url;

/// Why a navigation could not be performed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    /// The host refused a top-level navigation (sandboxed frame,
    /// cross-origin parent).
    #[error("navigation blocked: {0}")]
    Blocked(String),
}

/// Host collaborator that sends the user to the tenant login.
pub trait Navigator: Send + Sync {
    /// Navigate the top-level context. May be refused.
    fn navigate_top(&self, url: &Url) -> Result<(), NavigationError>;

    /// Navigate the embedding context itself. Used as the delayed fallback
    /// when [`navigate_top`](Self::navigate_top) is refused.
    fn navigate_self(&self, url: &Url);
}

/// Navigator for hosts that cannot navigate at all; every attempt is
/// refused and the fallback does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNavigator;

impl Navigator for NullNavigator {
    fn navigate_top(&self, _url: &Url) -> Result<(), NavigationError> {
        Err(NavigationError::Blocked("host cannot navigate".into()))
    }

    fn navigate_self(&self, _url: &Url) {}
}
