//! Host surfaces
//!
//! The relay never touches a browser directly. Whatever embeds it (a wasm
//! shim, a webview bridge) implements these traits.

use notebridge_protocol::WirePayload;
use serde_json::Value;
use std::sync::Arc;

/// A raw cross-window message event.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Serialized origin of the sender, e.g. `https://app.example.com`
    pub origin: String,
    /// Event data as received; mobile hosts send a JSON string
    pub data: Value,
}

impl MessageEvent {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

pub type MessageListener = Arc<dyn Fn(MessageEvent) + Send + Sync>;

/// The window the component runs in, and through it the parent window.
pub trait ParentWindow: Send + Sync {
    /// Register the listener for inbound message events.
    fn subscribe(&self, listener: MessageListener);

    /// Post to the parent window, restricted to `target_origin`.
    fn post_message(&self, payload: WirePayload, target_origin: &str);

    /// `document.referrer`, when the browser exposes one.
    fn referrer(&self) -> Option<String>;

    fn document_title(&self) -> String;

    /// Blocking user-facing alert.
    fn alert(&self, message: &str);
}

/// A `<link rel="stylesheet">` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylesheetLink {
    pub id: String,
    pub href: String,
    pub link_type: String,
    pub rel: String,
    pub media: String,
    pub class_name: String,
}

/// The component document's stylesheet links.
pub trait ThemeDocument: Send + Sync {
    /// Append a link to the document head.
    fn append_stylesheet(&self, link: StylesheetLink);

    /// Mark the link with `element_id` disabled. Returns `false` when no such
    /// link is attached.
    fn disable_stylesheet(&self, element_id: &str) -> bool;

    /// Detach the link with `element_id` from its parent.
    fn remove_stylesheet(&self, element_id: &str);
}
