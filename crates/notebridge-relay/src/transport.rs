//! Transport and origin guard
//!
//! Screens raw message events before anything else sees them:
//! 1. cross-check the document referrer's origin against the event origin
//! 2. decode the payload (JSON strings from mobile hosts, values otherwise)
//! 3. pin the sender origin on the first `component-registered` and reject
//!    every other origin afterwards
//!
//! Nothing here panics or returns a caller-facing error; rejected events are
//! reported as `InboundRejection` for logging only.

use notebridge_protocol::{decode_event_data, ComponentAction, InboundMessage};
use url::Url;

use crate::error::InboundRejection;
use crate::host::MessageEvent;

#[derive(Debug, Default)]
pub struct OriginGuard {
    pinned: Option<String>,
}

impl OriginGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Origin pinned by the first registration, if any.
    pub fn pinned(&self) -> Option<&str> {
        self.pinned.as_deref()
    }

    /// Accept or reject one event.
    pub fn screen(
        &mut self,
        event: &MessageEvent,
        referrer: Option<&str>,
    ) -> Result<InboundMessage, InboundRejection> {
        // Parent origin is not readable cross-domain; the referrer is the
        // best available hint.
        if let Some(referrer) = referrer.filter(|r| !r.is_empty()) {
            check_referrer(referrer, &event.origin)?;
        }

        let message = decode_event_data(event.data.clone())
            .map_err(|e| InboundRejection::Protocol(e.to_string()))?;

        let accepted = match self.pinned.as_deref() {
            None => message.action == ComponentAction::ComponentRegistered,
            Some(pinned) => pinned == event.origin,
        };
        if !accepted {
            return Err(InboundRejection::OriginMismatch {
                origin: event.origin.clone(),
                pinned: self.pinned.clone(),
            });
        }

        if self.pinned.is_none() {
            tracing::info!(origin = %event.origin, "Pinned host origin");
            self.pinned = Some(event.origin.clone());
        }

        Ok(message)
    }
}

/// Serialized origin of a URL, so `https://a.example` and
/// `https://a.example/path` compare equal.
pub fn serialized_origin(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .map(|url| url.origin().ascii_serialization())
}

fn check_referrer(referrer: &str, event_origin: &str) -> Result<(), InboundRejection> {
    let mismatch = || InboundRejection::ReferrerMismatch {
        referrer: referrer.to_string(),
        origin: event_origin.to_string(),
    };

    let referrer_origin = serialized_origin(referrer).ok_or_else(mismatch)?;
    let event_origin = serialized_origin(event_origin).ok_or_else(mismatch)?;

    if referrer_origin == event_origin {
        Ok(())
    } else {
        Err(mismatch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HOST: &str = "https://app.notes.example";

    fn registered(origin: &str) -> MessageEvent {
        MessageEvent::new(
            origin,
            json!({ "action": "component-registered", "sessionKey": "k", "data": {} }),
        )
    }

    fn reply(origin: &str) -> MessageEvent {
        MessageEvent::new(
            origin,
            json!({ "action": "reply", "data": {}, "original": { "messageId": "m" } }),
        )
    }

    #[test]
    fn test_first_registration_pins_origin() {
        let mut guard = OriginGuard::new();
        assert!(guard.screen(&registered(HOST), None).is_ok());
        assert_eq!(guard.pinned(), Some(HOST));

        assert!(guard.screen(&reply(HOST), None).is_ok());
        assert!(matches!(
            guard.screen(&reply("https://evil.example"), None),
            Err(InboundRejection::OriginMismatch { .. })
        ));
    }

    #[test]
    fn test_pinned_origin_never_changes() {
        let mut guard = OriginGuard::new();
        guard.screen(&registered(HOST), None).unwrap();

        let hijack = guard.screen(&registered("https://evil.example"), None);
        assert!(hijack.is_err());
        assert_eq!(guard.pinned(), Some(HOST));
    }

    #[test]
    fn test_nothing_but_registration_before_pinning() {
        let mut guard = OriginGuard::new();
        assert!(guard.screen(&reply(HOST), None).is_err());
        assert!(guard.pinned().is_none());
    }

    #[test]
    fn test_referrer_cross_check() {
        let mut guard = OriginGuard::new();

        let referrer = format!("{}/notes/123", HOST);
        assert!(guard.screen(&registered(HOST), Some(&referrer)).is_ok());

        let rejected = guard.screen(&reply(HOST), Some("https://other.example/"));
        assert!(matches!(
            rejected,
            Err(InboundRejection::ReferrerMismatch { .. })
        ));

        // Unparseable referrers reject too.
        assert!(guard.screen(&reply(HOST), Some("not a url")).is_err());

        // An empty referrer means "not available".
        assert!(guard.screen(&reply(HOST), Some("")).is_ok());
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let mut guard = OriginGuard::new();
        let event = MessageEvent::new(HOST, json!(""));
        assert!(matches!(
            guard.screen(&event, None),
            Err(InboundRejection::Protocol(_))
        ));
        assert!(guard.pinned().is_none());
    }

    #[test]
    fn test_serialized_origin_ignores_path() {
        assert_eq!(
            serialized_origin("https://a.example/some/path").as_deref(),
            Some("https://a.example")
        );
        assert_eq!(
            serialized_origin("https://a.example"),
            serialized_origin("https://a.example/")
        );
        assert!(serialized_origin("::").is_none());
    }
}
