// Delegated token exchange
//
// Asks an identity-provider bridge to mint a tenant bearer token for the
// current user. The bridge receives `{tenant, clientId, redirectUri}` and
// answers with a token, either as a JSON envelope or as a bare string.
// An empty answer is a legitimate "no token for this user".

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// Input to the delegated exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub tenant: String,
    pub client_id: String,
    pub redirect_uri: String,
}

/// HTTP implementation of the delegated exchange.
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl TokenExchangeClient {
    pub fn new(http: reqwest::Client, endpoint: Url) -> Self {
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST the request and extract a token from the answer.
    ///
    /// Returns `Ok(None)` for `204 No Content`, an empty body, `null`, or a
    /// JSON object without a token field.
    pub async fn request_token(&self, request: &TokenRequest) -> Result<Option<SecretString>, Error> {
        debug!(tenant = %request.tenant, "requesting token at {}", self.endpoint);

        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::TokenExchange {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        Ok(extract_token(&body).map(SecretString::from))
    }
}

/// Pull a token out of an exchange answer.
fn extract_token(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => ["access_token", "accessToken", "token"]
            .iter()
            .find_map(|field| map.get(*field).and_then(|v| v.as_str()))
            .filter(|t| !t.is_empty())
            .map(String::from),
        Ok(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Ok(_) => None,
        // Bare, unquoted token.
        Err(_) => Some(trimmed.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn extract_token_from_envelopes() {
        assert_eq!(
            extract_token(r#"{"access_token":"a1"}"#).as_deref(),
            Some("a1")
        );
        assert_eq!(extract_token(r#"{"accessToken":"a2"}"#).as_deref(), Some("a2"));
        assert_eq!(extract_token(r#"{"token":"a3"}"#).as_deref(), Some("a3"));
        assert_eq!(extract_token(r#""quoted""#).as_deref(), Some("quoted"));
        assert_eq!(extract_token("eyJhbGciOi.bare").as_deref(), Some("eyJhbGciOi.bare"));
    }

    #[test]
    fn extract_token_none_cases() {
        assert_eq!(extract_token(""), None);
        assert_eq!(extract_token("null"), None);
        assert_eq!(extract_token(r#"{"error":"nope"}"#), None);
        assert_eq!(extract_token(r#"{"access_token":""}"#), None);
    }

    #[test]
    fn token_request_serializes_camel_case() {
        let req = TokenRequest {
            tenant: "t".into(),
            client_id: "c".into(),
            redirect_uri: "r".into(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({"tenant": "t", "clientId": "c", "redirectUri": "r"})
        );
    }
}
