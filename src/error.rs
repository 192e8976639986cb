//! Error taxonomy for the broker client and order-lifecycle OMS.
//!
//! Protocol/connection errors are fatal to the affected connection and
//! bubble out of the call in progress. Validation and transition errors are
//! data, not faults — the OMS layer turns them into published events and
//! must never let them panic or abort the service loop.

use thiserror::Error;

use crate::domain::validation::ValidationError;
use crate::statemachine::transition::TransitionError;

/// Malformed wire data or an unexpected server response during handshake.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("invalid size field: {0}")]
    InvalidSize(String),
    #[error("payload of {size} bytes exceeds server max_payload of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("unknown verb: {0}")]
    UnknownVerb(String),
    #[error("server rejected handshake: {0}")]
    ServerError(String),
}

/// The socket is gone, or `close()` was called.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,
    #[error("i/o error: {0}")]
    Io(String),
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),
    #[error("invalid subject: {0}")]
    InvalidSubject(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e.to_string())
    }
}

/// `request()` did not receive a reply within the deadline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("request timed out")]
    Timeout,
    #[error("connection closed while awaiting reply")]
    ConnectionClosed,
    #[error("payload could not be serialized: {0}")]
    Serialization(String),
}

/// Top-level error type unifying every layer below it.
#[derive(Debug, Error)]
pub enum OmsError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OmsError>;
