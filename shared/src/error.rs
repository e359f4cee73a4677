//! Errors raised while reading room frames and state

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors produced while decoding protocol frames, schema state or
/// MessagePack payloads
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unexpected end of input at offset {offset} (needed {needed} more bytes)")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("unknown number prefix 0x{prefix:02x} at offset {offset}")]
    UnknownNumberPrefix { prefix: u8, offset: usize },

    #[error("unknown protocol code {0}")]
    UnknownProtocol(u8),

    #[error("schema '{schema}' has no field with index {index}")]
    UnknownField { schema: String, index: u8 },

    #[error("index {index} is out of range for a collection of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("unknown primitive type '{0}'")]
    UnknownType(String),

    #[error("MessagePack decode error: {0}")]
    MsgPack(#[from] rmp_serde::decode::Error),
}
