//! Relay error types
//!
//! Only programmer-facing misuse is returned as an error. Problems caused by
//! the untrusted channel are described by `InboundRejection` and logged.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("No item has been streamed from the host yet")]
    NotReady,

    #[error("The component has not been initialized")]
    ComponentDataUnavailable,

    #[error("The key for the data value should be a valid string")]
    EmptyComponentDataKey,
}

/// Why an inbound event was dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InboundRejection {
    #[error("Referrer origin {referrer} does not match event origin {origin}")]
    ReferrerMismatch { referrer: String, origin: String },

    #[error("Event origin {origin} does not match pinned origin {pinned:?}")]
    OriginMismatch {
        origin: String,
        pinned: Option<String>,
    },

    #[error("Invalid data received: {0}")]
    Protocol(String),
}
