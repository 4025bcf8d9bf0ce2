//! Envelopes and inbound messages

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::action::{ComponentAction, MessageApi};
use crate::environment::Environment;
use crate::error::ProtocolError;
use crate::note::NoteItem;
use crate::Result;

/// Outbound message posted to the host once a session key exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub action: ComponentAction,
    pub data: Value,
    pub message_id: String,
    pub session_key: String,
    pub api: MessageApi,
}

impl Envelope {
    /// Build an envelope with a freshly generated message id.
    pub fn new(action: ComponentAction, data: Value, session_key: String) -> Self {
        Self {
            action,
            data,
            message_id: Uuid::new_v4().to_string(),
            session_key,
            api: MessageApi::Component,
        }
    }

    /// Encode for the host: a JSON string for hosts that cannot receive
    /// structured clones, the structured value otherwise.
    pub fn to_wire(&self, as_text: bool) -> Result<WirePayload> {
        if as_text {
            Ok(WirePayload::Text(serde_json::to_string(self)?))
        } else {
            Ok(WirePayload::Structured(serde_json::to_value(self)?))
        }
    }
}

/// What actually crosses the window boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum WirePayload {
    Structured(Value),
    Text(String),
}

impl WirePayload {
    /// Decode back into an envelope, whichever form it was sent in.
    pub fn envelope(&self) -> Result<Envelope> {
        match self {
            WirePayload::Structured(value) => Ok(serde_json::from_value(value.clone())?),
            WirePayload::Text(text) => Ok(serde_json::from_str(text)?),
        }
    }
}

/// Reference from a reply to the message it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalRef {
    pub message_id: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Anything the host sends to the component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    #[serde(default)]
    pub action: ComponentAction,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<OriginalRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
}

/// `data` of a `component-registered` message.
///
/// Each field is decoded on its own: a null or malformed value leaves that
/// field at its default without touching the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationData {
    #[serde(deserialize_with = "lenient")]
    pub environment: Option<Environment>,
    #[serde(deserialize_with = "lenient")]
    pub platform: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub uuid: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub active_theme_urls: Vec<String>,
}

/// `data` of an `activate-themes` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemesData {
    #[serde(deserialize_with = "lenient")]
    pub themes: Vec<String>,
}

/// Field decoder falling back to the default for null or mistyped values.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// `data` of a reply to `stream-context-item`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamedItem {
    pub item: NoteItem,
}

/// Decode raw event data into an inbound message.
///
/// Mobile hosts send JSON strings; those are parsed when they hold an object
/// or array. Other values are taken as they are. Falsy values (`null`,
/// `false`, `0`, `""`) are rejected as empty.
pub fn decode_event_data(data: Value) -> Result<InboundMessage> {
    let decoded = match data {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
            _ => Value::String(text),
        },
        other => other,
    };

    if is_falsy(&decoded) {
        return Err(ProtocolError::EmptyPayload);
    }

    Ok(serde_json::from_value(decoded)?)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
