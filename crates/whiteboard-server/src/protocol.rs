//! WebSocket wire frames.
//!
//! Both directions carry JSON objects discriminated by a top-level `type`.
//! Server-originated `cursor` and `userLeft` frames spell the originating
//! user field `oderId`, a typo in the historical wire contract kept
//! bit-exact for deployed clients, and additionally carry a corrected
//! `userId` alias with the same value.

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::Element;

/// Frames accepted from a connected socket.
///
/// `draw` and `move` carry the element as raw JSON; the schema validator
/// decides whether it is a well-formed element.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientFrame {
    Draw { element: Value },
    Erase { element_id: String },
    Clear,
    Move { element_id: String, element: Value },
    Reorder { element_id: String, position: String },
    Cursor { x: f64, y: f64 },
}

/// Frames emitted to connected sockets.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    /// Sent to exactly one subscriber on attach.
    Init { user_id: String, elements: Vec<Element>, user_count: usize },
    Draw {
        element: Element,
    },
    Erase {
        element_id: String,
    },
    Clear,
    Move {
        element_id: String,
        element: Element,
    },
    Reorder {
        element_id: String,
        position: String,
    },
    Cursor {
        x: f64,
        y: f64,
        #[serde(rename = "oderId")]
        oder_id: String,
        user_id: String,
    },
    UserCount {
        count: usize,
    },
    UserLeft {
        #[serde(rename = "oderId")]
        oder_id: String,
        user_id: String,
    },
}

impl ServerFrame {
    /// Build a cursor relay frame carrying both user-field spellings.
    #[must_use]
    pub fn cursor(user_id: &str, x: f64, y: f64) -> Self {
        Self::Cursor { x, y, oder_id: user_id.to_string(), user_id: user_id.to_string() }
    }

    /// Build a departure notice carrying both user-field spellings.
    #[must_use]
    pub fn user_left(user_id: &str) -> Self {
        Self::UserLeft { oder_id: user_id.to_string(), user_id: user_id.to_string() }
    }

    /// Encode the frame once; the returned bytes are cheap to clone per
    /// subscriber.
    pub fn encode(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_frame_tags() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "erase", "elementId": "e1"})).unwrap();
        assert!(matches!(frame, ClientFrame::Erase { element_id } if element_id == "e1"));

        let frame: ClientFrame = serde_json::from_value(json!({"type": "clear"})).unwrap();
        assert!(matches!(frame, ClientFrame::Clear));

        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "cursor", "x": 1.0, "y": 2.0})).unwrap();
        assert!(matches!(frame, ClientFrame::Cursor { .. }));
    }

    #[test]
    fn test_client_mutation_frames_decode() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "draw",
            "element": {"type": "circle", "cx": 0.0, "cy": 0.0, "radius": 5.0}
        }))
        .unwrap();
        let ClientFrame::Draw { element } = frame else { panic!("expected draw") };
        assert_eq!(element["type"], json!("circle"));

        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "move",
            "elementId": "e1",
            "element": {"type": "rectangle", "x": 9.0}
        }))
        .unwrap();
        let ClientFrame::Move { element_id, element } = frame else { panic!("expected move") };
        assert_eq!(element_id, "e1");
        assert_eq!(element["x"], json!(9.0));

        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "reorder",
            "elementId": "e2",
            "position": "front"
        }))
        .unwrap();
        let ClientFrame::Reorder { element_id, position } = frame else {
            panic!("expected reorder")
        };
        assert_eq!(element_id, "e2");
        assert_eq!(position, "front");
    }

    #[test]
    fn test_unknown_client_frame_is_an_error() {
        let result = serde_json::from_value::<ClientFrame>(json!({"type": "undo"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_server_frame_tag_spelling() {
        let out = serde_json::to_value(ServerFrame::UserCount { count: 3 }).unwrap();
        assert_eq!(out, json!({"type": "userCount", "count": 3}));
    }

    #[test]
    fn test_cursor_carries_both_spellings() {
        let out = serde_json::to_value(ServerFrame::cursor("u1", 5.0, 6.0)).unwrap();
        assert_eq!(out["type"], json!("cursor"));
        assert_eq!(out["oderId"], json!("u1"));
        assert_eq!(out["userId"], json!("u1"));
        assert_eq!(out["x"], json!(5.0));
    }

    #[test]
    fn test_user_left_carries_both_spellings() {
        let out = serde_json::to_value(ServerFrame::user_left("u2")).unwrap();
        assert_eq!(out, json!({"type": "userLeft", "oderId": "u2", "userId": "u2"}));
    }

    #[test]
    fn test_encode_is_shareable() {
        let frame = ServerFrame::Clear;
        let bytes = frame.encode().unwrap();
        let copy = bytes.clone();
        assert_eq!(bytes.as_str(), copy.as_str());
        assert_eq!(bytes.as_str(), r#"{"type":"clear"}"#);
    }
}
