//! Outbound queue and reply correlation
//!
//! Messages posted before the host issues a session key wait in a FIFO
//! queue. Once posted, a message is recorded under its message id so the
//! host's reply (`original.messageId`) can find the callback.
//!
//! Eviction:
//! - one-shot entries are removed when their reply arrives
//! - streaming entries stay, the host answers them on every context change
//! - one-shot entries nobody answered expire after a time-to-live

use notebridge_protocol::ComponentAction;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub type ReplyCallback = Box<dyn FnOnce(Value) + Send>;
pub type StreamCallback = Arc<dyn Fn(Value) + Send + Sync>;

pub enum ReplyHandler {
    /// Runs for the first reply, then the entry is dropped
    Once(ReplyCallback),
    /// Runs for every reply for as long as the relay lives
    Stream(StreamCallback),
}

/// A message waiting for the session key.
pub struct QueuedMessage {
    pub action: ComponentAction,
    pub data: Value,
    pub handler: Option<ReplyHandler>,
}

struct SentMessage {
    action: ComponentAction,
    handler: Option<ReplyHandler>,
    expires_at: Option<Instant>,
}

/// Outcome of matching a reply.
pub enum Resolution {
    Once(ReplyCallback),
    Stream(StreamCallback),
    /// Known message that asked for no callback
    Acknowledged,
    /// No such message: never sent, expired, or already answered
    Unknown,
}

#[derive(Default)]
pub struct Correlator {
    queue: VecDeque<QueuedMessage>,
    sent: HashMap<String, SentMessage>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, message: QueuedMessage) {
        self.queue.push_back(message);
    }

    /// Everything queued, in submission order. The queue is left empty.
    pub fn drain_queue(&mut self) -> Vec<QueuedMessage> {
        self.queue.drain(..).collect()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_len(&self) -> usize {
        self.sent.len()
    }

    /// Record a posted message. Expired entries are pruned first.
    pub fn record(
        &mut self,
        message_id: String,
        action: ComponentAction,
        handler: Option<ReplyHandler>,
        now: Instant,
        ttl: Duration,
    ) {
        self.prune(now);

        let expires_at = match handler {
            Some(ReplyHandler::Stream(_)) => None,
            _ => Some(now + ttl),
        };
        self.sent.insert(
            message_id,
            SentMessage {
                action,
                handler,
                expires_at,
            },
        );
    }

    /// Match a reply to the message it answers.
    pub fn resolve(&mut self, message_id: &str) -> Resolution {
        if let Some(SentMessage {
            handler: Some(ReplyHandler::Stream(callback)),
            ..
        }) = self.sent.get(message_id)
        {
            return Resolution::Stream(Arc::clone(callback));
        }

        match self.sent.remove(message_id) {
            Some(entry) => {
                tracing::trace!(message_id, action = %entry.action, "Matched reply");
                match entry.handler {
                    Some(ReplyHandler::Once(callback)) => Resolution::Once(callback),
                    _ => Resolution::Acknowledged,
                }
            }
            None => Resolution::Unknown,
        }
    }

    /// Drop one-shot entries past their time-to-live. Returns how many went.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.sent.len();
        self.sent
            .retain(|_, entry| entry.expires_at.map_or(true, |deadline| deadline > now));
        let pruned = before - self.sent.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned unanswered messages");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(60);

    fn recorder() -> (Arc<Mutex<Vec<Value>>>, ReplyCallback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, Box::new(move |data| sink.lock().push(data)))
    }

    #[test]
    fn test_queue_is_fifo_and_drains_once() {
        let mut correlator = Correlator::new();
        for action in [
            ComponentAction::StreamContextItem,
            ComponentAction::SetComponentData,
            ComponentAction::SaveItems,
        ] {
            correlator.enqueue(QueuedMessage {
                action,
                data: json!({}),
                handler: None,
            });
        }

        let drained: Vec<_> = correlator
            .drain_queue()
            .into_iter()
            .map(|m| m.action)
            .collect();
        assert_eq!(
            drained,
            vec![
                ComponentAction::StreamContextItem,
                ComponentAction::SetComponentData,
                ComponentAction::SaveItems,
            ]
        );
        assert!(correlator.drain_queue().is_empty());
    }

    #[test]
    fn test_one_shot_reply_is_evicted() {
        let mut correlator = Correlator::new();
        let (seen, callback) = recorder();
        correlator.record(
            "m-1".into(),
            ComponentAction::SaveItems,
            Some(ReplyHandler::Once(callback)),
            Instant::now(),
            TTL,
        );

        match correlator.resolve("m-1") {
            Resolution::Once(callback) => callback(json!({ "ok": true })),
            _ => panic!("expected one-shot handler"),
        }
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(correlator.pending_len(), 0);
        assert!(matches!(correlator.resolve("m-1"), Resolution::Unknown));
    }

    #[test]
    fn test_stream_reply_stays_registered() {
        let mut correlator = Correlator::new();
        let callback: StreamCallback = Arc::new(|_| {});
        correlator.record(
            "m-1".into(),
            ComponentAction::StreamContextItem,
            Some(ReplyHandler::Stream(callback)),
            Instant::now(),
            TTL,
        );

        assert!(matches!(correlator.resolve("m-1"), Resolution::Stream(_)));
        assert!(matches!(correlator.resolve("m-1"), Resolution::Stream(_)));
        assert_eq!(correlator.pending_len(), 1);
    }

    #[test]
    fn test_unknown_reply() {
        let mut correlator = Correlator::new();
        assert!(matches!(correlator.resolve("nope"), Resolution::Unknown));
    }

    #[test]
    fn test_expired_entries_are_pruned() {
        let mut correlator = Correlator::new();
        let start = Instant::now();
        correlator.record(
            "old".into(),
            ComponentAction::ThemesActivated,
            None,
            start,
            TTL,
        );
        correlator.record(
            "stream".into(),
            ComponentAction::StreamContextItem,
            Some(ReplyHandler::Stream(Arc::new(|_| {}))),
            start,
            TTL,
        );

        let later = start + TTL + Duration::from_secs(1);
        correlator.record("new".into(), ComponentAction::SaveItems, None, later, TTL);

        assert_eq!(correlator.pending_len(), 2);
        assert!(matches!(correlator.resolve("old"), Resolution::Unknown));
        assert!(matches!(correlator.resolve("new"), Resolution::Acknowledged));
    }
}
