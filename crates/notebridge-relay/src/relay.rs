//! Component relay
//!
//! One relay per embedded component. It owns all protocol state; callers
//! share it through cheap `Clone` handles. The state lock is never held
//! while a callback, listener, presave hook, or host surface runs, so any of
//! those may call back into the relay.
//!
//! Timers (save debounce, save watchdog) and next-tick subscriber delivery
//! run on Tokio: the relay must be driven from within a runtime.

use notebridge_protocol::{
    ComponentAction, Envelope, Environment, InboundMessage, NoteItem, RegistrationData,
    StreamedItem, ThemesData,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Weak};
use tokio::time::Instant;

use crate::coalescer::{PendingSave, Presave, SaveCallback, SaveCoalescer};
use crate::config::RelayConfig;
use crate::correlator::{
    Correlator, QueuedMessage, ReplyCallback, ReplyHandler, Resolution, StreamCallback,
};
use crate::diagnostics::{DiagnosticSink, Diagnostics};
use crate::error::{InboundRejection, RelayError};
use crate::host::{MessageEvent, ParentWindow, ThemeDocument};
use crate::scheduler::ScheduledTask;
use crate::session::{Session, SessionPhase};
use crate::Result;

pub type ItemListener = Arc<dyn Fn(&NoteItem) + Send + Sync>;

pub const SAVE_TIMEOUT_ALERT: &str = "This editor is unable to communicate with the host \
    application. Your changes may not be saved. Please backup your changes, then restart the \
    application and try again.";

struct RelayState {
    session: Session,
    correlator: Correlator,
    saves: SaveCoalescer,
    last_streamed_item: Option<NoteItem>,
    subscribers: Vec<Subscriber>,
    next_subscriber_id: u64,
    config: RelayConfig,
}

struct Subscriber {
    id: u64,
    listener: ItemListener,
    /// Set once an update reached this listener; the next-tick delivery is
    /// then skipped
    notified: bool,
}

struct RelayInner {
    state: Mutex<RelayState>,
    window: Arc<dyn ParentWindow>,
    document: Arc<dyn ThemeDocument>,
    diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct ComponentRelay {
    inner: Arc<RelayInner>,
}

/// Handle returned by `ComponentRelay::subscribe`.
pub struct Subscription {
    relay: Weak<RelayInner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.relay.upgrade() {
            inner
                .state
                .lock()
                .subscribers
                .retain(|subscriber| subscriber.id != self.id);
        }
    }
}

impl ComponentRelay {
    pub fn new(window: Arc<dyn ParentWindow>, document: Arc<dyn ThemeDocument>) -> Self {
        Self::build(window, document, None)
    }

    /// Like `new`, also forwarding every diagnostic to `sink`.
    pub fn with_sink(
        window: Arc<dyn ParentWindow>,
        document: Arc<dyn ThemeDocument>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        Self::build(window, document, Some(sink))
    }

    fn build(
        window: Arc<dyn ParentWindow>,
        document: Arc<dyn ThemeDocument>,
        sink: Option<Arc<dyn DiagnosticSink>>,
    ) -> Self {
        let config = RelayConfig::default();
        let state = RelayState {
            session: Session::new(),
            correlator: Correlator::new(),
            saves: SaveCoalescer::new(config.coalesced_saving_delay()),
            last_streamed_item: None,
            subscribers: Vec::new(),
            next_subscriber_id: 0,
            config,
        };

        Self {
            inner: Arc::new(RelayInner {
                state: Mutex::new(state),
                window,
                document,
                diagnostics: Diagnostics::new(sink),
            }),
        }
    }

    fn downgrade(&self) -> Weak<RelayInner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<RelayInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    // === Handshake ===

    /// Start listening to the host and ask for the item in context.
    /// Only the first call has any effect.
    pub fn initialize(&self, config: RelayConfig) {
        {
            let mut state = self.inner.state.lock();
            if !state
                .session
                .transition_to(SessionPhase::AwaitingRegistration)
            {
                drop(state);
                self.inner
                    .diagnostics
                    .error("fatal: cannot call initialize more than once", None);
                return;
            }
            state.saves.set_delay(config.coalesced_saving_delay());
            state.session.themes.set_accepts(config.accepts_themes);
            state.config = config;
        }

        self.register_message_handler();
        self.request_context_stream(None, true);

        tracing::info!("Component relay initialized");
    }

    fn register_message_handler(&self) {
        let relay = self.downgrade();
        self.inner.window.subscribe(Arc::new(move |event| {
            if let Some(relay) = ComponentRelay::upgrade(&relay) {
                relay.receive(event);
            }
        }));
    }

    /// Entry point for every raw cross-window event.
    pub fn receive(&self, event: MessageEvent) {
        self.inner
            .diagnostics
            .info("Components API Message received:", Some(&event.data));

        let referrer = self.inner.window.referrer();
        let screened = self
            .inner
            .state
            .lock()
            .session
            .guard
            .screen(&event, referrer.as_deref());

        match screened {
            Ok(message) => self.handle_message(message),
            Err(InboundRejection::Protocol(reason)) => self.inner.diagnostics.error(
                "Invalid data received. Skipping...",
                Some(&json!({ "reason": reason })),
            ),
            Err(rejection) => {
                tracing::warn!(origin = %event.origin, %rejection, "Dropped inbound message");
            }
        }
    }

    fn handle_message(&self, message: InboundMessage) {
        match message.action {
            ComponentAction::ComponentRegistered => self.on_registered(message),
            ComponentAction::ActivateThemes => {
                match data_or_default::<ThemesData>(message.data) {
                    Ok(data) => self.activate_themes(data.themes),
                    Err(e) => self.inner.diagnostics.error(
                        "Invalid themes received. Skipping...",
                        Some(&json!({ "reason": e.to_string() })),
                    ),
                }
            }
            _ => {
                if let Some(original) = message.original {
                    self.resolve_reply(&original.message_id, message.data);
                }
            }
        }
    }

    fn on_registered(&self, message: InboundMessage) {
        let Some(session_key) = message.session_key.clone() else {
            self.inner
                .diagnostics
                .error("Registration carried no session key. Skipping...", None);
            return;
        };

        let data = match data_or_default::<RegistrationData>(message.data.clone()) {
            Ok(data) => data,
            Err(e) => {
                self.inner.diagnostics.error(
                    "Invalid registration data received",
                    Some(&json!({ "reason": e.to_string() })),
                );
                RegistrationData::default()
            }
        };

        let queued = {
            let mut state = self.inner.state.lock();
            match state.session.phase {
                SessionPhase::Uninitialized => {
                    tracing::warn!("Registration received before initialize; ignoring");
                    return;
                }
                SessionPhase::Registered => {
                    state
                        .session
                        .accept_registration(session_key, message.component_data.clone());
                    tracing::info!("Host reissued the session key");
                    return;
                }
                SessionPhase::AwaitingRegistration => {}
            }

            state
                .session
                .accept_registration(session_key, message.component_data.clone());
            state.session.transition_to(SessionPhase::Registered);
            state.session.capture_identity(&data);
            state.correlator.drain_queue()
        };

        if let Ok(payload) = serde_json::to_value(&message) {
            self.inner.diagnostics.info(
                "Component successfully registered with payload:",
                Some(&payload),
            );
        }

        for message in queued {
            self.post(message.action, message.data, message.handler);
        }

        if let Ok(ready) = serde_json::to_value(&data) {
            self.inner
                .diagnostics
                .info("Data passed to onReady:", Some(&ready));
        }

        self.activate_themes(data.active_theme_urls);
        self.post(ComponentAction::ThemesActivated, json!({}), None);
    }

    // === Session accessors ===

    pub fn phase(&self) -> SessionPhase {
        self.inner.state.lock().session.phase
    }

    pub fn session_key(&self) -> Option<String> {
        self.inner.state.lock().session.session_key.clone()
    }

    pub fn origin(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .session
            .origin()
            .map(str::to_string)
    }

    pub fn environment(&self) -> Option<Environment> {
        self.inner.state.lock().session.environment
    }

    pub fn platform(&self) -> Option<String> {
        self.inner.state.lock().session.platform.clone()
    }

    /// The component's own uuid, as assigned by the host.
    pub fn component_uuid(&self) -> Option<String> {
        self.inner.state.lock().session.uuid.clone()
    }

    pub fn is_running_in_desktop_application(&self) -> bool {
        self.inner.state.lock().session.is_desktop()
    }

    pub fn is_running_in_mobile_application(&self) -> bool {
        self.inner.state.lock().session.is_mobile()
    }

    pub fn active_themes(&self) -> Vec<String> {
        self.inner.state.lock().session.themes.active().to_vec()
    }

    // === Component data ===

    pub fn component_data(&self) -> Option<Map<String, Value>> {
        self.inner.state.lock().session.component_data.clone()
    }

    pub fn component_data_value(&self, key: &str) -> Option<Value> {
        self.inner
            .state
            .lock()
            .session
            .component_data
            .as_ref()?
            .get(key)
            .cloned()
    }

    /// Store one key of the component data and persist the whole map.
    pub fn set_component_data_value(&self, key: &str, value: Value) -> Result<()> {
        let data = {
            let mut state = self.inner.state.lock();
            let data = state
                .session
                .component_data
                .as_mut()
                .ok_or(RelayError::ComponentDataUnavailable)?;
            if key.is_empty() {
                return Err(RelayError::EmptyComponentDataKey);
            }
            data.insert(key.to_string(), value);
            data.clone()
        };

        self.post_component_data(data);
        Ok(())
    }

    /// Replace the component data and persist it. Not coalesced.
    pub fn set_component_data(&self, data: Map<String, Value>) {
        self.inner.state.lock().session.component_data = Some(data.clone());
        self.post_component_data(data);
    }

    pub fn clear_component_data(&self) {
        self.set_component_data(Map::new());
    }

    fn post_component_data(&self, data: Map<String, Value>) {
        self.post(
            ComponentAction::SetComponentData,
            json!({ "componentData": data }),
            None,
        );
    }

    // === Outbound ===

    /// Post a message to the host, or queue it until registration.
    /// `callback` receives the `data` of the host's reply.
    pub fn post_message(&self, action: ComponentAction, data: Value, callback: Option<ReplyCallback>) {
        self.post(action, data, callback.map(ReplyHandler::Once));
    }

    fn post(&self, action: ComponentAction, data: Value, handler: Option<ReplyHandler>) {
        let (envelope, as_text, origin) = {
            let mut state = self.inner.state.lock();
            let Some(session_key) = state.session.session_key.clone() else {
                tracing::debug!(%action, "Queued message until registration");
                state.correlator.enqueue(QueuedMessage {
                    action,
                    data,
                    handler,
                });
                return;
            };
            let Some(origin) = state.session.origin().map(str::to_string) else {
                tracing::error!(%action, "No pinned origin to post to; dropping message");
                return;
            };

            let envelope = Envelope::new(action, data, session_key);
            let ttl = state.config.correlation_ttl();
            state.correlator.record(
                envelope.message_id.clone(),
                action,
                handler,
                Instant::now(),
                ttl,
            );
            (envelope, state.session.is_mobile(), origin)
        };

        match envelope.to_wire(as_text) {
            Ok(payload) => {
                if let Ok(logged) = serde_json::to_value(&envelope) {
                    self.inner
                        .diagnostics
                        .info("Posting message:", Some(&logged));
                }
                self.inner.window.post_message(payload, &origin);
            }
            Err(e) => self.inner.diagnostics.error(
                "Unable to encode message",
                Some(&json!({ "action": action.as_str(), "reason": e.to_string() })),
            ),
        }
    }

    fn resolve_reply(&self, message_id: &str, data: Value) {
        let resolution = self.inner.state.lock().correlator.resolve(message_id);

        match resolution {
            Resolution::Once(callback) => callback(data),
            Resolution::Stream(callback) => callback(data),
            Resolution::Acknowledged => {}
            Resolution::Unknown => {
                // The relay may have been torn down and rebuilt, losing the
                // original message; nothing to do but tell the user.
                let extension = self.inner.window.document_title();
                let message = format!(
                    "The extension '{}' is attempting to communicate with the host \
                     application, but an error is preventing it from doing so. Please \
                     restart this extension and try again.",
                    extension
                );
                self.inner
                    .diagnostics
                    .info(&message, Some(&json!({ "messageId": message_id })));
            }
        }
    }

    /// Messages waiting for registration.
    pub fn queued_messages(&self) -> usize {
        self.inner.state.lock().correlator.queued_len()
    }

    /// Posted messages still correlatable.
    pub fn pending_correlations(&self) -> usize {
        self.inner.state.lock().correlator.pending_len()
    }

    // === Themes ===

    /// Bring the document's theme links in line with `incoming`.
    pub fn activate_themes(&self, incoming: Vec<String>) {
        self.inner
            .diagnostics
            .info("Incoming themes:", Some(&json!(incoming)));

        let plan = self.inner.state.lock().session.themes.plan(incoming);
        let Some(plan) = plan else {
            return;
        };

        self.inner
            .diagnostics
            .info("Deactivating themes:", Some(&json!(plan.deactivate)));
        self.inner
            .diagnostics
            .info("Activating themes:", Some(&json!(plan.activate)));

        plan.apply(self.inner.document.as_ref());
    }

    // === Context item ===

    /// Observe every item the host streams. Switching to a different item
    /// commits any pending save first.
    pub fn stream_context_item<F>(&self, observer: F)
    where
        F: Fn(&NoteItem) + Send + Sync + 'static,
    {
        self.request_context_stream(Some(Arc::new(observer)), false);
    }

    fn request_context_stream(&self, observer: Option<ItemListener>, notify_subscribers: bool) {
        let relay = self.downgrade();
        let handler: StreamCallback = Arc::new(move |data| {
            if let Some(relay) = ComponentRelay::upgrade(&relay) {
                relay.on_context_item(data, observer.as_ref(), notify_subscribers);
            }
        });

        self.post(
            ComponentAction::StreamContextItem,
            json!({}),
            Some(ReplyHandler::Stream(handler)),
        );
    }

    fn on_context_item(
        &self,
        data: Value,
        observer: Option<&ItemListener>,
        notify_subscribers: bool,
    ) {
        let item = match serde_json::from_value::<StreamedItem>(data) {
            Ok(streamed) => streamed.item,
            Err(e) => {
                self.inner.diagnostics.error(
                    "Invalid context item received. Skipping...",
                    Some(&json!({ "reason": e.to_string() })),
                );
                return;
            }
        };

        // A debounced save still reads as the previous item; commit it
        // before the new item takes over.
        let stale = {
            let mut state = self.inner.state.lock();
            let is_new_item = state
                .last_streamed_item
                .as_ref()
                .map_or(true, |last| last.uuid != item.uuid);
            if is_new_item {
                state.saves.take_live()
            } else {
                None
            }
        };
        if let Some(pending) = stale {
            tracing::info!(next_item = %item.uuid, "Committing pending save before switching items");
            self.perform_saving_of_items(pending);
        }

        let listeners: Vec<ItemListener> = {
            let mut state = self.inner.state.lock();
            state.last_streamed_item = Some(item.clone());
            if notify_subscribers && !item.is_metadata_update {
                state
                    .subscribers
                    .iter_mut()
                    .map(|subscriber| {
                        subscriber.notified = true;
                        Arc::clone(&subscriber.listener)
                    })
                    .collect()
            } else {
                Vec::new()
            }
        };

        if let Some(observer) = observer {
            observer(&item);
        }
        for listener in listeners {
            listener(&item);
        }
    }

    /// The item the host most recently streamed.
    pub fn current_item(&self) -> Option<NoteItem> {
        self.inner.state.lock().last_streamed_item.clone()
    }

    /// Edit the current item in place and return the edited copy.
    pub fn update_current_item<F>(&self, edit: F) -> Result<NoteItem>
    where
        F: FnOnce(&mut NoteItem),
    {
        let mut item = self.current_item().ok_or(RelayError::NotReady)?;
        edit(&mut item);

        let mut state = self.inner.state.lock();
        match state.last_streamed_item.as_mut() {
            Some(current) if current.uuid == item.uuid => *current = item.clone(),
            _ => tracing::debug!(uuid = %item.uuid, "Context switched during edit; not writing back"),
        }
        Ok(item)
    }

    /// Value of `key` in the host's own appData domain.
    pub fn item_app_data_value(item: &NoteItem, key: &str) -> Option<Value> {
        item.default_app_data_value(key).cloned()
    }

    // === Subscriptions ===

    /// Call `listener` on every non-metadata update of the streamed item,
    /// and on the next tick if an item is already there.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NoteItem) + Send + Sync + 'static,
    {
        let listener: ItemListener = Arc::new(listener);
        let (id, has_item) = {
            let mut state = self.inner.state.lock();
            state.next_subscriber_id += 1;
            let id = state.next_subscriber_id;
            state.subscribers.push(Subscriber {
                id,
                listener: Arc::clone(&listener),
                notified: false,
            });
            (id, state.last_streamed_item.is_some())
        };

        if has_item {
            let relay = self.downgrade();
            tokio::spawn(async move {
                let Some(relay) = ComponentRelay::upgrade(&relay) else {
                    return;
                };
                if let Some(item) = relay.take_initial_delivery(id) {
                    listener(&item);
                }
            });
        }

        Subscription {
            relay: self.downgrade(),
            id,
        }
    }

    /// The item owed to subscriber `id` on its first tick, unless it
    /// unsubscribed or an update already reached it.
    fn take_initial_delivery(&self, id: u64) -> Option<NoteItem> {
        let mut state = self.inner.state.lock();
        let subscriber = state
            .subscribers
            .iter_mut()
            .find(|subscriber| subscriber.id == id)?;
        if subscriber.notified {
            return None;
        }
        subscriber.notified = true;
        state.last_streamed_item.clone()
    }

    // === Saving ===

    pub fn save_item(&self, item: NoteItem, callback: Option<SaveCallback>, skip_debounce: bool) {
        self.save_items(vec![item], callback, skip_debounce, None);
    }

    /// `presave` runs inside the debounce cycle, right before sending, so
    /// derived fields (previews) need no debouncing of their own.
    pub fn save_item_with_presave(
        &self,
        item: NoteItem,
        presave: Presave,
        callback: Option<SaveCallback>,
    ) {
        self.save_items_with_presave(vec![item], presave, callback);
    }

    pub fn save_items_with_presave(
        &self,
        items: Vec<NoteItem>,
        presave: Presave,
        callback: Option<SaveCallback>,
    ) {
        self.save_items(items, callback, false, Some(presave));
    }

    /// Persist `items`, coalesced with other saves inside the debounce
    /// window unless `skip_debounce` is set or debouncing is disabled.
    pub fn save_items(
        &self,
        items: Vec<NoteItem>,
        callback: Option<SaveCallback>,
        skip_debounce: bool,
        presave: Option<Presave>,
    ) {
        let immediate = {
            let mut state = self.inner.state.lock();
            match state.saves.debounce_for(skip_debounce) {
                Some(delay) => {
                    let generation = state.saves.merge(items, presave, callback);
                    let relay = self.downgrade();
                    state.saves.arm(ScheduledTask::after(delay, move || {
                        if let Some(relay) = ComponentRelay::upgrade(&relay) {
                            relay.flush_debounced(generation);
                        }
                    }));
                    None
                }
                None => Some(PendingSave {
                    items,
                    presave,
                    callback,
                }),
            }
        };

        if let Some(save) = immediate {
            self.perform_saving_of_items(save);
        }
    }

    /// Uuids waiting in the debounce buffer.
    pub fn pending_save_uuids(&self) -> Vec<String> {
        self.inner.state.lock().saves.pending_uuids()
    }

    fn flush_debounced(&self, generation: u64) {
        let pending = self.inner.state.lock().saves.take_expired(generation);
        if let Some(pending) = pending {
            self.perform_saving_of_items(pending);
        }
    }

    fn perform_saving_of_items(&self, save: PendingSave) {
        let PendingSave {
            mut items,
            presave,
            callback,
        } = save;

        if items.is_empty() {
            tracing::debug!("Nothing to save");
            return;
        }

        self.arm_watchdog();

        if let Some(presave) = presave {
            presave(&mut items);
        }

        let mut mapped = Vec::with_capacity(items.len());
        for item in &items {
            match item.sanitized() {
                Ok(value) => mapped.push(value),
                Err(e) => self.inner.diagnostics.error(
                    "Unable to serialize item for saving",
                    Some(&json!({ "uuid": item.uuid, "reason": e.to_string() })),
                ),
            }
        }

        let relay = self.downgrade();
        let acknowledged: ReplyCallback = Box::new(move |_| {
            if let Some(relay) = ComponentRelay::upgrade(&relay) {
                relay.clear_watchdogs();
            }
            if let Some(callback) = callback {
                callback();
            }
        });

        self.post(
            ComponentAction::SaveItems,
            json!({ "items": mapped }),
            Some(ReplyHandler::Once(acknowledged)),
        );
    }

    fn arm_watchdog(&self) {
        let mut state = self.inner.state.lock();
        let delay = state.config.save_watchdog();
        let relay = self.downgrade();
        let watchdog = ScheduledTask::after(delay, move || {
            if let Some(relay) = ComponentRelay::upgrade(&relay) {
                relay.on_save_timeout();
            }
        });
        state.saves.track_watchdog(watchdog);
    }

    fn clear_watchdogs(&self) {
        self.inner.state.lock().saves.cancel_watchdogs();
    }

    fn on_save_timeout(&self) {
        let cleared = self.inner.state.lock().saves.cancel_watchdogs();
        tracing::warn!(watchdogs = cleared, "Host did not acknowledge a save in time");
        self.inner
            .diagnostics
            .error("Save was not acknowledged by the host", None);
        self.inner.window.alert(SAVE_TIMEOUT_ALERT);
    }
}

fn data_or_default<T>(data: Value) -> serde_json::Result<T>
where
    T: DeserializeOwned + Default,
{
    if data.is_null() {
        Ok(T::default())
    } else {
        serde_json::from_value(data)
    }
}
