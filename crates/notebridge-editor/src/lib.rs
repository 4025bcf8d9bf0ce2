//! notebridge Editor
//!
//! What an editor extension's UI code talks to. Wraps a shared
//! `ComponentRelay` with typed accessors for the note text, editor
//! metadata, the locked flag and the preview.

mod config;
mod editor;
mod error;
mod preview;

pub use config::EditorConfig;
pub use editor::Editor;
pub use error::EditorError;
pub use preview::plain_preview;

pub use notebridge_protocol::{NoteContent, NoteItem};
pub use notebridge_relay::{
    ComponentRelay, DiagnosticSink, MemoryLog, ParentWindow, RelayConfig, RelayError,
    Subscription, ThemeDocument,
};

pub type Result<T> = std::result::Result<T, EditorError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
