//! Error types for the protocol layer.
//!
//! Every `ProtocolError` means the peer sent something that is not a valid
//! frame. The server answers all of them the same way: drop the
//! connection, keep running.

use crate::MessageType;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The type byte does not name any message.
    #[error("unknown message type tag 0x{0:02x}")]
    UnknownType(u8),

    /// The tag is known but travels in the other direction
    /// (e.g. a client sending `Kick`).
    #[error("message type {0:?} is not valid in this direction")]
    WrongDirection(MessageType),

    /// The frame or payload ended before a field was complete.
    #[error("truncated {0}")]
    Truncated(&'static str),

    /// A varint ran past five bytes or overflowed `u32`.
    #[error("malformed varint")]
    MalformedVarint,

    /// The declared payload length exceeds the configured maximum.
    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    /// The payload had bytes left over after the last field.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    /// A string field was not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// A field decoded but holds a value outside its domain.
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: u32 },
}
