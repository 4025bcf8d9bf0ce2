//! Editor facade
//!
//! Typed accessors over the streamed note for UI code. Writes to note
//! fields go through the relay's coalesced save; extension metadata is
//! posted straight away.

use notebridge_protocol::NoteItem;
use notebridge_relay::{ComponentRelay, Presave, RelayError, Subscription};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::preview::plain_preview;
use crate::Result;

pub struct Editor {
    relay: ComponentRelay,
    config: EditorConfig,
    /// Manual previews by note uuid; a note listed here gets no generated one
    preview_overrides: Arc<RwLock<HashMap<String, String>>>,
}

impl Editor {
    pub fn new(relay: ComponentRelay, config: EditorConfig) -> Self {
        Self {
            relay,
            config,
            preview_overrides: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn relay(&self) -> &ComponentRelay {
        &self.relay
    }

    fn item(&self) -> Result<NoteItem> {
        Ok(self.relay.current_item().ok_or(RelayError::NotReady)?)
    }

    pub fn text(&self) -> Result<String> {
        Ok(self.item()?.content.text)
    }

    /// Replace the note text and schedule a save.
    pub fn set_text(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        let item = self
            .relay
            .update_current_item(|item| item.content.text = text)?;
        self.save(item);
        Ok(())
    }

    /// This editor's metadata on the current note.
    pub fn meta(&self) -> Result<Option<Map<String, Value>>> {
        Ok(self.item()?.editor_meta().cloned())
    }

    pub fn set_meta(&self, meta: Map<String, Value>) -> Result<()> {
        let mut stored = false;
        let item = self
            .relay
            .update_current_item(|item| stored = item.set_editor_meta(meta))?;
        if !stored {
            return Err(EditorError::MissingEditorIdentifier);
        }
        self.save(item);
        Ok(())
    }

    /// Component data, shared by every note this extension opens.
    pub fn extension_meta(&self) -> Option<Map<String, Value>> {
        self.relay.component_data()
    }

    pub fn set_extension_meta(&self, meta: Map<String, Value>) {
        self.relay.set_component_data(meta);
    }

    pub fn locked(&self) -> Result<bool> {
        Ok(self.item()?.is_locked())
    }

    pub fn preview(&self) -> Result<Option<String>> {
        let item = self.item()?;
        if let Some(manual) = self.preview_overrides.read().get(&item.uuid) {
            return Ok(Some(manual.clone()));
        }
        Ok(item.content.preview_plain)
    }

    /// Set the preview by hand. Later saves of this note keep it instead of
    /// generating one from the text.
    pub fn set_preview(&self, preview: impl Into<String>) -> Result<()> {
        let preview = preview.into();
        let item = self
            .relay
            .update_current_item(|item| item.content.preview_plain = Some(preview.clone()))?;
        self.preview_overrides
            .write()
            .insert(item.uuid.clone(), preview);
        self.save(item);
        Ok(())
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NoteItem) + Send + Sync + 'static,
    {
        self.relay.subscribe(listener)
    }

    fn save(&self, item: NoteItem) {
        tracing::debug!(uuid = %item.uuid, "Scheduling save");
        self.relay
            .save_item_with_presave(item, self.fill_previews(), None);
    }

    fn fill_previews(&self) -> Presave {
        let overrides = Arc::clone(&self.preview_overrides);
        let length = self.config.preview_length;
        Box::new(move |items: &mut [NoteItem]| {
            let overrides = overrides.read();
            for item in items.iter_mut() {
                item.content.preview_plain = Some(match overrides.get(&item.uuid) {
                    Some(manual) => manual.clone(),
                    None => plain_preview(&item.content.text, length),
                });
            }
        })
    }
}

impl Clone for Editor {
    fn clone(&self) -> Self {
        Self {
            relay: self.relay.clone(),
            config: self.config.clone(),
            preview_overrides: Arc::clone(&self.preview_overrides),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notebridge_protocol::ComponentAction;
    use notebridge_relay::testing::{
        note_json, registration, streamed, FakeDocument, FakeWindow, HOST_ORIGIN,
    };
    use notebridge_relay::RelayConfig;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn setup() -> (Editor, Arc<FakeWindow>) {
        let window = FakeWindow::new();
        let relay = ComponentRelay::new(window.clone(), FakeDocument::new());
        relay.initialize(RelayConfig::default());
        window.dispatch(HOST_ORIGIN, registration("key-1", "web", &[]));
        (Editor::new(relay, EditorConfig::default()), window)
    }

    fn stream(window: &FakeWindow, item: Value) {
        let id = window
            .last_message_id(ComponentAction::StreamContextItem)
            .unwrap();
        window.dispatch(HOST_ORIGIN, streamed(&id, item));
    }

    fn saved_items(window: &FakeWindow) -> Vec<Vec<Value>> {
        window
            .sent_with(ComponentAction::SaveItems)
            .into_iter()
            .map(|envelope| envelope.data["items"].as_array().unwrap().clone())
            .collect()
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_note_fields_not_ready_before_streaming() {
        let (editor, _window) = setup();
        assert!(editor.text().unwrap_err().is_not_ready());
        assert!(editor.set_text("x").unwrap_err().is_not_ready());
        assert!(editor.locked().unwrap_err().is_not_ready());
        assert!(editor.preview().unwrap_err().is_not_ready());
        assert!(editor.meta().unwrap_err().is_not_ready());
        assert!(editor.set_meta(Map::new()).unwrap_err().is_not_ready());

        // Extension metadata is not note-scoped.
        assert_eq!(editor.extension_meta(), Some(map(json!({ "spacing": "Default" }))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_text_flushes_before_switching_notes() {
        let (editor, window) = setup();
        stream(&window, note_json("A", "hello"));
        assert_eq!(editor.text().unwrap(), "hello");

        editor.set_text("hello world").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        stream(&window, note_json("B", "other"));

        let saves = saved_items(&window);
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0][0]["uuid"], "A");
        assert_eq!(saves[0][0]["content"]["text"], "hello world");
        assert_eq!(saves[0][0]["content"]["preview_plain"], "hello world");
        assert_eq!(editor.text().unwrap(), "other");

        editor.set_text("other!").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let saves = saved_items(&window);
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[1].len(), 1);
        assert_eq!(saves[1][0]["uuid"], "B");
        assert_eq!(saves[1][0]["content"]["text"], "other!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_meta_is_filed_under_the_editor_identifier() {
        let (editor, window) = setup();
        stream(&window, note_json("A", "hello"));
        assert_eq!(editor.meta().unwrap(), Some(map(json!({ "rows": 3 }))));

        editor.set_meta(map(json!({ "rows": 8 }))).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let saves = saved_items(&window);
        assert_eq!(
            saves[0][0]["content"]["appData"]["org.example.plain-editor"],
            json!({ "rows": 8 })
        );
        assert_eq!(
            saves[0][0]["content"]["appData"]["org.standardnotes.sn"],
            json!({ "locked": false })
        );
        assert_eq!(saves[0][0]["content"]["title"], "Note A");
    }

    #[tokio::test(start_paused = true)]
    async fn test_meta_without_editor_identifier() {
        let (editor, window) = setup();
        stream(&window, json!({ "uuid": "A", "content": { "text": "bare" } }));

        assert_eq!(editor.meta().unwrap(), None);
        assert!(matches!(
            editor.set_meta(Map::new()),
            Err(EditorError::MissingEditorIdentifier)
        ));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(saved_items(&window).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_locked_flag() {
        let (editor, window) = setup();
        stream(&window, note_json("A", "hello"));
        assert!(!editor.locked().unwrap());

        let mut locked = note_json("A", "hello");
        locked["content"]["appData"]["org.standardnotes.sn"]["locked"] = json!(true);
        stream(&window, locked);
        assert!(editor.locked().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_preview_stops_generation() {
        let (editor, window) = setup();
        stream(&window, note_json("A", "hello"));

        editor.set_preview("Pinned summary").unwrap();
        editor.set_text("completely different text").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let saves = saved_items(&window);
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0][0]["content"]["preview_plain"], "Pinned summary");
        assert_eq!(editor.preview().unwrap().as_deref(), Some("Pinned summary"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_preview_is_truncated() {
        let (editor, window) = setup();
        stream(&window, note_json("A", ""));

        editor.set_text("word ".repeat(40)).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let saves = saved_items(&window);
        let preview = saves[0][0]["content"]["preview_plain"].as_str().unwrap();
        assert_eq!(preview.chars().count(), 90);
        assert!(!preview.contains("  "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_extension_meta_posts_immediately() {
        let (editor, window) = setup();
        editor.set_extension_meta(map(json!({ "spacing": "Cozy" })));

        let sent = window.sent_with(ComponentAction::SetComponentData);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data["componentData"], json!({ "spacing": "Cozy" }));
        assert_eq!(editor.extension_meta(), Some(map(json!({ "spacing": "Cozy" }))));
        assert!(saved_items(&window).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_passthrough() {
        let (editor, window) = setup();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let subscription = editor.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        stream(&window, note_json("A", "hello"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        subscription.unsubscribe();
        stream(&window, note_json("A", "changed"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
