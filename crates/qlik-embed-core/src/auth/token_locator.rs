//! Best-effort lookup of a previously cached bearer token.
//!
//! Other embedding components cache tokens under a handful of key
//! conventions. The locator first tries the known key templates for the
//! tenant, then falls back to scanning every key that looks
//! token-related. This is a heuristic: an unrelated entry whose key and
//! value happen to match the patterns will be returned as a token.

use std::sync::Arc;

use secrecy::SecretString;
use serde_json::Value;
use tracing::debug;

use crate::store::KeyValueStore;

/// Key templates, in priority order. `{t}` is the tenant host.
const KEY_TEMPLATES: &[&str] = &[
    "qlik-embed-access-token-{t}",
    "qlik-access-token-{t}",
    "qlik-access-token",
    "qlik_{t}_access_token",
    "qlik_access_token",
    "qlik.embed.accessToken.{t}",
    "qlik.embed.accessToken",
];

const SCAN_KEY_MARKERS: &[&str] = &["qlik", "access", "token"];

/// Raw (non-JSON) values at a known key must be longer than this.
const MIN_KNOWN_KEY_LEN: usize = 10;
/// Scanned values of this length or shorter are skipped.
const MIN_SCAN_LEN: usize = 20;
/// Raw scanned values longer than this are taken as opaque tokens.
const MIN_OPAQUE_LEN: usize = 50;
const JWT_PREFIX: &str = "eyJ";

/// Which lookup step produced a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// One of the known key templates.
    KnownKey,
    /// The fallback scan over token-looking keys.
    Scan,
}

/// A cached token together with the store key it was read from.
#[derive(Debug)]
pub struct LocatedToken {
    pub key: String,
    pub token: SecretString,
    pub source: TokenSource,
}

#[derive(Clone)]
pub struct TokenLocator {
    store: Arc<dyn KeyValueStore>,
}

impl TokenLocator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// First qualifying token for `tenant`, if any. Never mutates the store.
    pub fn locate(&self, tenant: &str) -> Option<SecretString> {
        self.locate_entry(tenant).map(|found| found.token)
    }

    /// Like [`locate`](Self::locate), but also reports the key the token
    /// was read from.
    pub fn locate_entry(&self, tenant: &str) -> Option<LocatedToken> {
        let (key, token, source) = self
            .from_known_keys(tenant)
            .map(|(key, token)| (key, token, TokenSource::KnownKey))
            .or_else(|| {
                self.from_scan()
                    .map(|(key, token)| (key, token, TokenSource::Scan))
            })?;
        Some(LocatedToken {
            key,
            token: SecretString::from(token),
            source,
        })
    }

    fn from_known_keys(&self, tenant: &str) -> Option<(String, String)> {
        KEY_TEMPLATES.iter().find_map(|template| {
            let key = template.replace("{t}", tenant);
            let value = self.store.get(&key).filter(|v| !v.is_empty())?;
            let token = match serde_json::from_str::<Value>(&value) {
                Ok(parsed) => envelope_token(&parsed, &["access_token", "accessToken"]),
                Err(_) => Some(value).filter(|v| v.len() > MIN_KNOWN_KEY_LEN),
            };
            if token.is_some() {
                debug!(key, "cached token found at known key");
            }
            token.map(|t| (key, t))
        })
    }

    fn from_scan(&self) -> Option<(String, String)> {
        self.store
            .keys()
            .into_iter()
            .filter(|key| SCAN_KEY_MARKERS.iter().any(|m| key.contains(m)))
            .find_map(|key| {
                let value = self.store.get(&key).filter(|v| v.len() > MIN_SCAN_LEN)?;
                let token = match serde_json::from_str::<Value>(&value) {
                    Ok(parsed) => {
                        envelope_token(&parsed, &["access_token", "accessToken", "token"])
                    }
                    Err(_) => Some(value)
                        .filter(|v| v.starts_with(JWT_PREFIX) || v.len() > MIN_OPAQUE_LEN),
                };
                if token.is_some() {
                    debug!(key, "cached token found by scan");
                }
                token.map(|t| (key, t))
            })
    }
}

fn envelope_token(parsed: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|f| parsed.get(*f).and_then(Value::as_str))
        .filter(|t| !t.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;
    use crate::store::MemoryStore;

    fn locate(entries: &[(&str, &str)], tenant: &str) -> Option<String> {
        let store = Arc::new(MemoryStore::with_entries(entries.iter().copied()));
        TokenLocator::new(store)
            .locate(tenant)
            .map(|t| t.expose_secret().to_string())
    }

    #[test]
    fn json_envelope_at_tenant_key() {
        assert_eq!(
            locate(
                &[("qlik-access-token-tenantX", r#"{"access_token":"abc"}"#)],
                "tenantX"
            )
            .as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn templates_are_tried_in_order() {
        let entries = [
            ("qlik_access_token", "later-template-value"),
            ("qlik-embed-access-token-t1", r#"{"accessToken":"first"}"#),
        ];
        assert_eq!(locate(&entries, "t1").as_deref(), Some("first"));
    }

    #[test]
    fn short_raw_value_at_known_key_is_skipped() {
        assert_eq!(locate(&[("qlik-access-token", "tooshort")], "t"), None);
        assert_eq!(
            locate(&[("qlik-access-token", "long-enough-1")], "t").as_deref(),
            Some("long-enough-1")
        );
    }

    #[test]
    fn json_without_token_field_at_known_key_falls_through_to_scan() {
        let entries = [
            ("qlik-access-token", r#"{"expires":12}"#),
            ("other-token-cache", r#"{"token":"from-the-scan-step"}"#),
        ];
        assert_eq!(locate(&entries, "t").as_deref(), Some("from-the-scan-step"));
    }

    #[test]
    fn scan_accepts_jwt_prefix_or_long_values() {
        assert_eq!(
            locate(&[("my-access", "eyJhbGciOiJIUzI1NiJ9.payload")], "t").as_deref(),
            Some("eyJhbGciOiJIUzI1NiJ9.payload")
        );
        let opaque = "x".repeat(51);
        assert_eq!(
            locate(&[("session-token", opaque.as_str())], "t"),
            Some(opaque.clone())
        );
        let medium = "x".repeat(40);
        assert_eq!(locate(&[("session-token", medium.as_str())], "t"), None);
    }

    #[test]
    fn scan_ignores_unrelated_keys() {
        let jwt = "eyJhbGciOiJIUzI1NiJ9.payload.signature";
        assert_eq!(locate(&[("theme", jwt)], "t"), None);
    }

    #[test]
    fn located_entry_reports_its_key() {
        let store = Arc::new(MemoryStore::with_entries([
            ("qlik-embed-access-token-t1", "stale-priority-token"),
            ("qlik-access-token-t1", "valid-second-token"),
        ]));
        let found = TokenLocator::new(store).locate_entry("t1").unwrap();
        assert_eq!(found.key, "qlik-embed-access-token-t1");
        assert_eq!(found.token.expose_secret(), "stale-priority-token");
        assert_eq!(found.source, TokenSource::KnownKey);

        let store = Arc::new(MemoryStore::with_entries([("my-access", "eyJscanned-token-value")]));
        let found = TokenLocator::new(store).locate_entry("t1").unwrap();
        assert_eq!(found.key, "my-access");
        assert_eq!(found.source, TokenSource::Scan);
    }

    #[test]
    fn scan_returns_first_match_in_store_order() {
        let entries = [
            ("a-token", "eyJfirst-token-in-store-order"),
            ("b-token", "eyJsecond-token-in-store-order"),
        ];
        assert_eq!(
            locate(&entries, "t").as_deref(),
            Some("eyJfirst-token-in-store-order")
        );
    }
}
