//! notebridge Relay
//!
//! Everything between an embedded editor and the note host: the
//! registration handshake, origin pinning, reply correlation, the context
//! item stream, coalesced saves with a watchdog, and theme activation.

mod coalescer;
mod config;
mod correlator;
mod diagnostics;
mod error;
mod host;
mod relay;
mod scheduler;
mod session;
mod themes;
mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use coalescer::{Presave, SaveCallback};
pub use config::RelayConfig;
pub use correlator::ReplyCallback;
pub use diagnostics::{DiagnosticSink, LogEntry, LogLevel, MemoryLog};
pub use error::{InboundRejection, RelayError};
pub use host::{MessageEvent, MessageListener, ParentWindow, StylesheetLink, ThemeDocument};
pub use relay::{ComponentRelay, ItemListener, Subscription, SAVE_TIMEOUT_ALERT};
pub use session::SessionPhase;
pub use themes::{theme_element_id, theme_link, THEME_LINK_CLASS};
pub use transport::serialized_origin;

pub type Result<T> = std::result::Result<T, RelayError>;
