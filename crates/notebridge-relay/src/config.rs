//! Relay configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_COALESCED_SAVING_DELAY_MS: u64 = 250;
const DEFAULT_SAVE_WATCHDOG_MS: u64 = 5_000;
const DEFAULT_CORRELATION_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Quiet period before coalesced saves are flushed; 0 saves immediately
    pub coalesced_saving_delay_ms: u64,
    /// How long a save may go unacknowledged before the user is alerted
    pub save_watchdog_ms: u64,
    /// How long an unanswered one-shot message stays correlatable
    pub correlation_ttl_secs: u64,
    /// Apply theme stylesheets pushed by the host
    pub accepts_themes: bool,
}

impl RelayConfig {
    pub fn new() -> Self {
        Self {
            coalesced_saving_delay_ms: DEFAULT_COALESCED_SAVING_DELAY_MS,
            save_watchdog_ms: DEFAULT_SAVE_WATCHDOG_MS,
            correlation_ttl_secs: DEFAULT_CORRELATION_TTL_SECS,
            accepts_themes: true,
        }
    }

    pub fn with_saving_delay(mut self, delay: Duration) -> Self {
        self.coalesced_saving_delay_ms = delay.as_millis() as u64;
        self
    }

    /// `None` when debouncing is disabled.
    pub fn coalesced_saving_delay(&self) -> Option<Duration> {
        (self.coalesced_saving_delay_ms > 0)
            .then(|| Duration::from_millis(self.coalesced_saving_delay_ms))
    }

    pub fn save_watchdog(&self) -> Duration {
        Duration::from_millis(self.save_watchdog_ms)
    }

    pub fn correlation_ttl(&self) -> Duration {
        Duration::from_secs(self.correlation_ttl_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}
