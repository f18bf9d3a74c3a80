//! JSON wire protocol for the revision server.
//!
//! Client frames carry the client's known revision for the touched file and
//! its parent; server frames carry the server-assigned revision and an ack
//! payload. Field names are camelCase on the wire; enums are tagged by
//! `type`. Offsets and lengths are Unicode codepoints.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Per-file revision as known by the client. `None` only on `Init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Revision {
    None,
    Some { number: u64 },
}

/// One text mutation in codepoint units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditChange {
    pub text: String,
    /// Zero-based codepoint offset of the replaced span.
    pub range_offset: usize,
    /// Codepoint length of the replaced span.
    pub range_length: usize,
    /// Codepoint count of the file remainder after the edit.
    pub rest_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    Init { project_id: String },
    OpenFile { path: String },
    EditFile { path: String, changes: Vec<EditChange> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    pub client_id: Uuid,
    pub revision: Revision,
    pub parent_revision: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub action: Action,
}

impl ClientMessage {
    /// First frame after a socket opens; carries no prior revision.
    pub fn init(client_id: Uuid, project_id: &str) -> Self {
        Self {
            client_id,
            revision: Revision::None,
            parent_revision: 0,
            timestamp: Utc::now().timestamp_millis(),
            action: Action::Init {
                project_id: project_id.to_string(),
            },
        }
    }

    pub fn open_file(client_id: Uuid, path: &str, revision: u64) -> Self {
        Self {
            client_id,
            revision: Revision::Some { number: revision },
            parent_revision: revision.saturating_sub(1),
            timestamp: Utc::now().timestamp_millis(),
            action: Action::OpenFile {
                path: path.to_string(),
            },
        }
    }

    /// `revision` is the client's current counter for the file;
    /// `parentRevision` is `n-1` (clamped at 0).
    pub fn edit_file(
        client_id: Uuid,
        path: &str,
        changes: Vec<EditChange>,
        revision: u64,
    ) -> Self {
        Self {
            client_id,
            revision: Revision::Some { number: revision },
            parent_revision: revision.saturating_sub(1),
            timestamp: Utc::now().timestamp_millis(),
            action: Action::EditFile {
                path: path.to_string(),
                changes,
            },
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

/// A file as listed by `InitOk`: the synchronization baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub path: String,
    pub revision: u64,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerPayload {
    InitOk { files: Vec<RemoteFile> },
    EditFileOk { path: String },
    OpenFileOk,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub revision: u64,
    pub payload: ServerPayload,
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_wire_shape() {
        let msg = ClientMessage::init(Uuid::new_v4(), "proj-1");
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();

        assert_eq!(json["revision"]["type"], "None");
        assert!(json["revision"].get("number").is_none());
        assert_eq!(json["parentRevision"], 0);
        assert_eq!(json["action"]["type"], "Init");
        assert_eq!(json["action"]["projectId"], "proj-1");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_edit_file_wire_shape() {
        let change = EditChange {
            text: "world".into(),
            range_offset: 6,
            range_length: 0,
            rest_length: 1,
        };
        let msg = ClientMessage::edit_file(Uuid::new_v4(), "/main.typ", vec![change], 4);
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();

        assert_eq!(json["revision"]["type"], "Some");
        assert_eq!(json["revision"]["number"], 4);
        assert_eq!(json["parentRevision"], 3);
        assert_eq!(json["action"]["type"], "EditFile");
        assert_eq!(json["action"]["changes"][0]["rangeOffset"], 6);
        assert_eq!(json["action"]["changes"][0]["restLength"], 1);
    }

    #[test]
    fn test_parent_revision_clamps_at_zero() {
        let msg = ClientMessage::edit_file(Uuid::new_v4(), "/main.typ", Vec::new(), 0);
        assert_eq!(msg.parent_revision, 0);
        assert_eq!(msg.revision, Revision::Some { number: 0 });
    }

    #[test]
    fn test_server_message_decode() {
        let raw = r#"{
            "revision": 2,
            "payload": {
                "type": "InitOk",
                "files": [{"path": "/main.typ", "revision": 2, "content": "= Hi"}]
            }
        }"#;
        let msg = ServerMessage::decode(raw).unwrap();
        assert_eq!(msg.revision, 2);
        match msg.payload {
            ServerPayload::InitOk { files } => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].revision, 2);
            }
            other => panic!("expected InitOk, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(ServerMessage::decode("not json").is_err());
        assert!(ClientMessage::decode("{}").is_err());
    }
}
