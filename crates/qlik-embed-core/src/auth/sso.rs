use async_trait::async_trait;
use secrecy::SecretString;

use qlik_embed_api::{TokenExchangeClient, TokenRequest};

use crate::error::CoreError;

/// Delegated single-sign-on token issuance.
///
/// `Ok(None)` is a legitimate "no token for this user", not a failure.
#[async_trait]
pub trait SsoExchange: Send + Sync {
    /// Primary exchange: `{tenant, client_id, redirect_uri}` to a token.
    async fn issue_token(&self, request: &TokenRequest) -> Result<Option<SecretString>, CoreError>;

    /// Secondary attempt from the host's own user identity, made when the
    /// primary exchange fails. Hosts without such an identity return none.
    async fn issue_token_for_identity(
        &self,
        _identity: Option<&str>,
    ) -> Result<Option<SecretString>, CoreError> {
        Ok(None)
    }
}

#[async_trait]
impl SsoExchange for TokenExchangeClient {
    async fn issue_token(&self, request: &TokenRequest) -> Result<Option<SecretString>, CoreError> {
        Ok(self.request_token(request).await?)
    }
}

/// Exchange for deployments without a token endpoint. Always fails, which
/// sends the negotiator to the secondary attempt.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTokenExchange;

#[async_trait]
impl SsoExchange for NoTokenExchange {
    async fn issue_token(&self, _request: &TokenRequest) -> Result<Option<SecretString>, CoreError> {
        Err(CoreError::auth_failed("no token exchange endpoint configured"))
    }
}
