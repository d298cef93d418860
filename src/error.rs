// Error types shared across the layers
use thiserror::Error;

/// Failures on the live channel. Always recovered by reconnecting.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("failed to receive frame: {0}")]
    Receive(String),
    #[error("channel is not open")]
    NotOpen,
}

/// A frame or history document that could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload for `{message_type}` does not match its schema: {source}")]
    Payload {
        message_type: &'static str,
        source: serde_json::Error,
    },
    #[error("unsupported sample value: {0}")]
    SampleValue(String),
    #[error("sample timestamp out of range: {0}")]
    Timestamp(f64),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("a handler for `{0}` is already registered")]
    Duplicate(&'static str),
    #[error("`{0}` is not an inbound message type")]
    NotInbound(&'static str),
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("history endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
