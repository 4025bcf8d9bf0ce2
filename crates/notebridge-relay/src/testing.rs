//! In-memory host for tests
//!
//! `FakeWindow` records what the relay posts and lets a test play the host
//! by dispatching events; `FakeDocument` records stylesheet mutations.

use notebridge_protocol::{ComponentAction, Envelope, WirePayload};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::host::{MessageEvent, MessageListener, ParentWindow, StylesheetLink, ThemeDocument};

pub const HOST_ORIGIN: &str = "https://app.notes.example";

#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub payload: WirePayload,
    pub target_origin: String,
}

#[derive(Default)]
pub struct FakeWindow {
    listeners: Mutex<Vec<MessageListener>>,
    referrer: Mutex<Option<String>>,
    title: Mutex<String>,
    posted: Mutex<Vec<PostedMessage>>,
    alerts: Mutex<Vec<String>>,
}

impl FakeWindow {
    pub fn new() -> Arc<Self> {
        let window = Self::default();
        *window.title.lock() = "Plain Editor".to_string();
        Arc::new(window)
    }

    pub fn set_referrer(&self, referrer: Option<&str>) {
        *self.referrer.lock() = referrer.map(str::to_string);
    }

    pub fn set_title(&self, title: &str) {
        *self.title.lock() = title.to_string();
    }

    /// Deliver an event to every registered listener, as the browser would.
    pub fn dispatch(&self, origin: &str, data: Value) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(MessageEvent::new(origin, data.clone()));
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn posted(&self) -> Vec<PostedMessage> {
        self.posted.lock().clone()
    }

    pub fn envelopes(&self) -> Vec<Envelope> {
        self.posted
            .lock()
            .iter()
            .filter_map(|posted| posted.payload.envelope().ok())
            .collect()
    }

    pub fn actions(&self) -> Vec<ComponentAction> {
        self.envelopes().into_iter().map(|e| e.action).collect()
    }

    pub fn sent_with(&self, action: ComponentAction) -> Vec<Envelope> {
        self.envelopes()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }

    pub fn last_message_id(&self, action: ComponentAction) -> Option<String> {
        self.sent_with(action).pop().map(|e| e.message_id)
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().clone()
    }
}

impl ParentWindow for FakeWindow {
    fn subscribe(&self, listener: MessageListener) {
        self.listeners.lock().push(listener);
    }

    fn post_message(&self, payload: WirePayload, target_origin: &str) {
        self.posted.lock().push(PostedMessage {
            payload,
            target_origin: target_origin.to_string(),
        });
    }

    fn referrer(&self) -> Option<String> {
        self.referrer.lock().clone()
    }

    fn document_title(&self) -> String {
        self.title.lock().clone()
    }

    fn alert(&self, message: &str) {
        self.alerts.lock().push(message.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentMutation {
    Appended(String),
    Disabled(String),
    Removed(String),
}

#[derive(Default)]
pub struct FakeDocument {
    links: Mutex<Vec<StylesheetLink>>,
    mutations: Mutex<Vec<DocumentMutation>>,
}

impl FakeDocument {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn links(&self) -> Vec<StylesheetLink> {
        self.links.lock().clone()
    }

    pub fn hrefs(&self) -> Vec<String> {
        self.links.lock().iter().map(|l| l.href.clone()).collect()
    }

    pub fn mutations(&self) -> Vec<DocumentMutation> {
        self.mutations.lock().clone()
    }

    pub fn clear_mutations(&self) {
        self.mutations.lock().clear();
    }
}

impl ThemeDocument for FakeDocument {
    fn append_stylesheet(&self, link: StylesheetLink) {
        self.mutations
            .lock()
            .push(DocumentMutation::Appended(link.id.clone()));
        self.links.lock().push(link);
    }

    fn disable_stylesheet(&self, element_id: &str) -> bool {
        let attached = self.links.lock().iter().any(|l| l.id == element_id);
        if attached {
            self.mutations
                .lock()
                .push(DocumentMutation::Disabled(element_id.to_string()));
        }
        attached
    }

    fn remove_stylesheet(&self, element_id: &str) {
        self.links.lock().retain(|l| l.id != element_id);
        self.mutations
            .lock()
            .push(DocumentMutation::Removed(element_id.to_string()));
    }
}

/// `component-registered` as a host would send it.
pub fn registration(session_key: &str, environment: &str, themes: &[&str]) -> Value {
    json!({
        "action": "component-registered",
        "sessionKey": session_key,
        "componentData": { "spacing": "Default" },
        "data": {
            "environment": environment,
            "platform": "linux",
            "uuid": "component-uuid",
            "activeThemeUrls": themes,
        }
    })
}

pub fn reply(message_id: &str, data: Value) -> Value {
    json!({
        "action": "reply",
        "data": data,
        "original": { "messageId": message_id },
    })
}

pub fn note_json(uuid: &str, text: &str) -> Value {
    json!({
        "uuid": uuid,
        "content_type": "Note",
        "content": {
            "text": text,
            "title": format!("Note {}", uuid),
            "editorIdentifier": "org.example.plain-editor",
            "appData": {
                "org.standardnotes.sn": { "locked": false },
                "org.example.plain-editor": { "rows": 3 }
            }
        }
    })
}

/// Reply to `stream-context-item` carrying `item`.
pub fn streamed(message_id: &str, item: Value) -> Value {
    reply(message_id, json!({ "item": item }))
}
