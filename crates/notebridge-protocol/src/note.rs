//! Note transfer payload
//!
//! Only the fields the component reads or writes are typed. Everything else
//! the host sends (content type, title, references, timestamps...) is kept
//! in `extra` so a read-modify-save cycle hands it back untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// appData domain owned by the host application itself.
pub const DEFAULT_APP_DOMAIN: &str = "org.standardnotes.sn";

/// Key under the default domain flagging a note as read-only.
pub const LOCKED_KEY: &str = "locked";

/// Relational fields the host can resolve on its side; never sent back.
const RELATIONAL_FIELDS: &[&str] = &["children", "parent"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteItem {
    pub uuid: String,
    #[serde(default)]
    pub content: NoteContent,
    /// Set by the host when only metadata changed and the UI need not
    /// re-render.
    #[serde(
        rename = "isMetadataUpdate",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_metadata_update: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteContent {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_plain: Option<String>,
    #[serde(rename = "appData", default)]
    pub app_data: BTreeMap<String, Map<String, Value>>,
    #[serde(
        rename = "editorIdentifier",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub editor_identifier: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NoteItem {
    pub fn new(uuid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            content: NoteContent {
                text: text.into(),
                ..NoteContent::default()
            },
            is_metadata_update: false,
            extra: Map::new(),
        }
    }

    /// Value stored under `key` in the given appData domain.
    pub fn app_data_value(&self, domain: &str, key: &str) -> Option<&Value> {
        self.content.app_data.get(domain)?.get(key)
    }

    /// Value stored under `key` in the host's own appData domain.
    pub fn default_app_data_value(&self, key: &str) -> Option<&Value> {
        self.app_data_value(DEFAULT_APP_DOMAIN, key)
    }

    pub fn is_locked(&self) -> bool {
        self.default_app_data_value(LOCKED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Metadata the current editor keeps on this note.
    pub fn editor_meta(&self) -> Option<&Map<String, Value>> {
        let editor = self.content.editor_identifier.as_deref()?;
        self.content.app_data.get(editor)
    }

    /// Replace the current editor's metadata. Returns `false` when the note
    /// names no editor to file it under.
    pub fn set_editor_meta(&mut self, meta: Map<String, Value>) -> bool {
        match self.content.editor_identifier.clone() {
            Some(editor) => {
                self.content.app_data.insert(editor, meta);
                true
            }
            None => false,
        }
    }

    /// JSON form sent with `save-items`: relational links nulled out.
    pub fn sanitized(&self) -> serde_json::Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(fields) = &mut value {
            for field in RELATIONAL_FIELDS {
                fields.insert((*field).to_string(), Value::Null);
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note_json() -> Value {
        json!({
            "uuid": "note-1",
            "content_type": "Note",
            "children": [{ "uuid": "child" }],
            "content": {
                "text": "hello",
                "title": "Groceries",
                "editorIdentifier": "com.example.rows",
                "appData": {
                    "org.standardnotes.sn": { "locked": true },
                    "com.example.rows": { "rows": 4 }
                }
            }
        })
    }

    #[test]
    fn test_unknown_fields_survive() {
        let note: NoteItem = serde_json::from_value(note_json()).unwrap();
        assert_eq!(note.extra["content_type"], "Note");
        assert_eq!(note.content.extra["title"], "Groceries");

        let back = serde_json::to_value(&note).unwrap();
        assert_eq!(back["content"]["title"], "Groceries");
        assert!(back.get("isMetadataUpdate").is_none());
    }

    #[test]
    fn test_reserved_domain_accessors() {
        let note: NoteItem = serde_json::from_value(note_json()).unwrap();
        assert!(note.is_locked());
        assert_eq!(note.editor_meta().unwrap()["rows"], 4);

        let plain = NoteItem::new("note-2", "text");
        assert!(!plain.is_locked());
        assert!(plain.editor_meta().is_none());
    }

    #[test]
    fn test_set_editor_meta_needs_identifier() {
        let mut note: NoteItem = serde_json::from_value(note_json()).unwrap();
        let mut meta = Map::new();
        meta.insert("rows".into(), json!(7));
        assert!(note.set_editor_meta(meta.clone()));
        assert_eq!(note.editor_meta().unwrap()["rows"], 7);

        let mut plain = NoteItem::new("note-2", "text");
        assert!(!plain.set_editor_meta(meta));
    }

    #[test]
    fn test_sanitized_nulls_relations() {
        let note: NoteItem = serde_json::from_value(note_json()).unwrap();
        let value = note.sanitized().unwrap();

        assert_eq!(value["children"], Value::Null);
        assert_eq!(value["parent"], Value::Null);
        assert_eq!(value["content"]["text"], "hello");
    }
}
