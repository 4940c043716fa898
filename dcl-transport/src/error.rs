//! `DCLException`'s hierarchy carried over one to one (spec.md §7): a
//! connection never established or since lost, an I/O failure on an
//! otherwise-healthy socket, a message that violated the protocol, and a
//! reference to an object id nobody bound.

use dcl_core::{CLError, ObjectId};
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum TransportError {
    Connection(String),
    Io(io::Error),
    Protocol(String),
    InvalidObject(ObjectId),
    /// A blocking wait (`ResponseBuffer::get`, `DataTransferHandle::wait`)
    /// was woken by `interrupt()` rather than completing normally.
    Interrupted,
    /// A blocking wait's deadline elapsed first.
    TimedOut,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Connection(msg) => write!(f, "connection error: {}", msg),
            TransportError::Io(err) => write!(f, "io error: {}", err),
            TransportError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            TransportError::InvalidObject(id) => write!(f, "invalid object: {}", id),
            TransportError::Interrupted => write!(f, "wait was interrupted"),
            TransportError::TimedOut => write!(f, "wait timed out"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io(err)
    }
}

impl From<dcl_wire::BufferError> for TransportError {
    fn from(err: dcl_wire::BufferError) -> Self {
        TransportError::Protocol(err.to_string())
    }
}

impl From<TransportError> for CLError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Connection(_) => CLError::CONNECTION_ERROR,
            TransportError::Io(_) => CLError::IO_ERROR,
            TransportError::Protocol(_) => CLError::PROTOCOL_ERROR,
            TransportError::InvalidObject(_) => CLError::INVALID_VALUE,
            TransportError::Interrupted => CLError::THREAD_INTERRUPTED,
            TransportError::TimedOut => CLError::THREAD_INTERRUPTED,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
