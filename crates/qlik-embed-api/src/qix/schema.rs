//! Protocol schema document.
//!
//! The engine publishes a versioned JSON description of its callable
//! surface: `structs` maps each handle type (`Global`, `Doc`,
//! `GenericObject`, ...) to its methods. A session loads it once and
//! rejects calls the schema does not define for a known handle type.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::Error;

/// Default schema location, pinned to the protocol version the engine speaks.
pub const DEFAULT_SCHEMA_URL: &str = "https://unpkg.com/enigma.js@2.7.3/schemas/12.612.0.json";

/// Method and type definitions of the QIX protocol.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub structs: HashMap<String, HashMap<String, serde_json::Value>>,
}

impl Schema {
    /// Fetch and parse the schema document.
    pub async fn fetch(http: &reqwest::Client, url: &Url) -> Result<Self, Error> {
        debug!("loading protocol schema from {}", url);

        let resp = http
            .get(url.clone())
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Schema {
                message: format!("HTTP {status}"),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let schema: Self = serde_json::from_str(&body).map_err(|e| Error::Schema {
            message: format!("invalid schema document: {e}"),
        })?;

        if schema.structs.is_empty() {
            return Err(Error::Schema {
                message: "schema defines no structs".into(),
            });
        }

        debug!(version = ?schema.version, types = schema.structs.len(), "schema loaded");
        Ok(schema)
    }

    /// Check that `method` may be called on a handle of `q_type`.
    ///
    /// Types the schema does not describe are let through; the engine
    /// remains the authority for those.
    pub fn check_method(&self, q_type: &str, method: &str) -> Result<(), Error> {
        match self.structs.get(q_type) {
            Some(methods) if !methods.contains_key(method) => Err(Error::UnknownMethod {
                q_type: q_type.to_string(),
                method: method.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
