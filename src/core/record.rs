//! Persisted leaf records and the content codec
//!
//! A record is serialized exactly once, when the store writes it. Everything
//! above the store hands [`Content`] around untouched: plain text stays a
//! string and a canvas snapshot stays a JSON value, never a JSON string that
//! holds JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{Result, StoreError};
use super::node::NodeKind;

/// Application-side content of a leaf
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Note body
    PlainText(String),
    /// Opaque canvas snapshot, carried verbatim
    Structured(Value),
}

impl Content {
    /// Initial content of a freshly created leaf
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Canvas => Content::Structured(Value::Object(Map::new())),
            _ => Content::PlainText(String::new()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::PlainText(text) => Some(text),
            Content::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Content::Structured(value) => Some(value),
            Content::PlainText(_) => None,
        }
    }

    /// `createdAt` embedded at the top level of a structured snapshot
    pub fn embedded_created_at(&self) -> Option<String> {
        self.as_structured()?
            .get("createdAt")?
            .as_str()
            .map(str::to_string)
    }
}

/// On-disk form of a leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    /// Encoded content, decoded only through [`decode`]
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Fields written by other tools, preserved on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Record {
    /// A new record holding the empty content for `kind`
    pub fn new(id: String, title: String, kind: NodeKind, now: String) -> Result<Self> {
        Ok(Self {
            id,
            title,
            kind: Some(kind),
            content: encode(Content::empty(kind), kind)?,
            created_at: Some(now.clone()),
            updated_at: Some(now),
            extra: Map::new(),
        })
    }

    /// Parse a record file; `path` is only used for error reporting
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Self> {
        let record: Record =
            serde_json::from_slice(bytes).map_err(|e| StoreError::malformed(path, e))?;
        if record.id.trim().is_empty() {
            return Err(StoreError::malformed(path, "record has an empty id"));
        }
        Ok(record)
    }

    /// Serialize for storage. This is the only place a record becomes text.
    pub fn to_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| StoreError::malformed(path, e))
    }
}

/// Decode stored content for a leaf of `kind`
pub fn decode(raw: &Value, kind: NodeKind) -> Content {
    match kind {
        NodeKind::Canvas => Content::Structured(decode_structured(raw)),
        _ => Content::PlainText(match raw {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }),
    }
}

/// Objects and arrays come back exactly as written. Scalar snapshots do not:
/// an empty string reads as `{}` and a string holding JSON reads as what it
/// encodes.
fn decode_structured(raw: &Value) -> Value {
    match raw {
        Value::Null => Value::Object(Map::new()),
        Value::String(text) if text.trim().is_empty() => Value::Object(Map::new()),
        // Legacy records stored the snapshot as a JSON string: decode it once.
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
            _ => raw.clone(),
        },
        other => other.clone(),
    }
}

/// Encode content for storage in a record of `kind`
pub fn encode(content: Content, kind: NodeKind) -> Result<Value> {
    match (kind, content) {
        (NodeKind::Note, Content::PlainText(text)) => Ok(Value::String(text)),
        (NodeKind::Canvas, Content::Structured(value)) => Ok(value),
        (kind, _) => Err(StoreError::ContentMismatch { kind }),
    }
}
