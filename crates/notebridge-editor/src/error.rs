//! Editor error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error(transparent)]
    Relay(#[from] notebridge_relay::RelayError),

    #[error("The current item has no editor identifier")]
    MissingEditorIdentifier,
}

impl EditorError {
    /// True when no item has been streamed yet.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::Relay(notebridge_relay::RelayError::NotReady))
    }
}
