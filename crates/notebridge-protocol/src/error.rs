//! Protocol error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Empty payload")]
    EmptyPayload,

    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}
