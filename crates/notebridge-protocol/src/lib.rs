//! notebridge protocol
//!
//! Wire types exchanged between an embedded editor component and the note
//! host across the iframe boundary:
//! - `ComponentAction` names every message kind
//! - `Envelope` is what the component posts
//! - `InboundMessage` is what the host sends back (registrations, theme
//!   pushes, replies)
//! - `NoteItem` is the streamed document

mod action;
mod environment;
mod error;
mod message;
mod note;

pub use action::{ComponentAction, MessageApi};
pub use environment::Environment;
pub use error::ProtocolError;
pub use message::{
    decode_event_data, Envelope, InboundMessage, OriginalRef, RegistrationData, StreamedItem,
    ThemesData, WirePayload,
};
pub use note::{NoteContent, NoteItem, DEFAULT_APP_DOMAIN, LOCKED_KEY};

pub type Result<T> = std::result::Result<T, ProtocolError>;
