// QIX JSON-RPC wire types
//
// Requests address a handle (`-1` is the global handle) and name a
// method. Every incoming frame may carry `change` / `close` arrays of
// handles in addition to a response or a notification.

use serde::{Deserialize, Serialize};

/// Handle of the global object, always present on an open session.
pub const GLOBAL_HANDLE: i64 = -1;

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub handle: i64,
    pub method: &'a str,
    pub params: &'a serde_json::Value,
}

/// Any frame the engine sends: response, notification, or both
/// piggy-backing `change` / `close` lists.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Incoming {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
    #[serde(default)]
    pub change: Vec<i64>,
    #[serde(default)]
    pub close: Vec<i64>,
}

/// Error object of a failed call.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    #[serde(default)]
    pub parameter: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// `qReturn` of a call that yields a new handle (`OpenDoc`, `GetObject`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ObjectRef {
    #[serde(default)]
    pub q_type: String,
    #[serde(default)]
    pub q_handle: Option<i64>,
    #[serde(default)]
    pub q_generic_id: Option<String>,
    #[serde(default)]
    pub q_generic_type: Option<String>,
}

/// A remote object the session can address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    pub id: i64,
    pub q_type: String,
    pub generic_id: Option<String>,
    pub generic_type: Option<String>,
}

impl Handle {
    pub(crate) fn global() -> Self {
        Self {
            id: GLOBAL_HANDLE,
            q_type: "Global".into(),
            generic_id: None,
            generic_type: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn response_with_change_list() {
        let frame: Incoming = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":3,"result":{"qReturn":{"qType":"Doc","qHandle":1}},"change":[1,2]}"#,
        )
        .unwrap();
        assert_eq!(frame.id, Some(3));
        assert_eq!(frame.change, vec![1, 2]);
        assert!(frame.close.is_empty());
    }

    #[test]
    fn notification_without_id() {
        let frame: Incoming = serde_json::from_str(
            r#"{"jsonrpc":"2.0","method":"OnConnected","params":{"qSessionState":"SESSION_CREATED"}}"#,
        )
        .unwrap();
        assert_eq!(frame.id, None);
        assert_eq!(frame.method.as_deref(), Some("OnConnected"));
    }

    #[test]
    fn object_ref_reads_q_fields() {
        let r: ObjectRef = serde_json::from_value(serde_json::json!({
            "qType": "GenericObject",
            "qHandle": 4,
            "qGenericId": "htaMkv",
            "qGenericType": "kpi"
        }))
        .unwrap();
        assert_eq!(r.q_handle, Some(4));
        assert_eq!(r.q_generic_id.as_deref(), Some("htaMkv"));
        assert_eq!(r.q_generic_type.as_deref(), Some("kpi"));
    }
}
