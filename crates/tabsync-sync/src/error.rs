//! Replication-level errors.

use tabsync_proto::error::ProtoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed envelope: {0}")]
    Envelope(#[source] ProtoError),

    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("failed to decode {tag} message: {source}")]
    Decode {
        tag: String,
        #[source]
        source: ProtoError,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
