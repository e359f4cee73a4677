//! User message types and payloads exchanged with a room

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::encode::{encode_number, encode_string};

use crate::error::Result;

/// MessagePack `nil`, decoded in place of an absent payload
const EMPTY_PAYLOAD: [u8; 1] = [0xc0];

/// Identifies a user message: a numeric code or a name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    Code(i32),
    Name(String),
}

impl MessageType {
    /// Key a handler is registered under: `i{code}` for codes, the name otherwise
    pub fn handler_key(&self) -> String {
        match self {
            MessageType::Code(code) => format!("i{}", code),
            MessageType::Name(name) => name.clone(),
        }
    }

    pub(crate) fn encode_into(&self, buffer: &mut Vec<u8>) {
        match self {
            MessageType::Code(code) => encode_number(buffer, *code as i64),
            MessageType::Name(name) => encode_string(buffer, name),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Code(code) => write!(f, "{}", code),
            MessageType::Name(name) => f.write_str(name),
        }
    }
}

impl From<i32> for MessageType {
    fn from(code: i32) -> Self {
        MessageType::Code(code)
    }
}

impl From<&str> for MessageType {
    fn from(name: &str) -> Self {
        MessageType::Name(name.to_string())
    }
}

impl From<String> for MessageType {
    fn from(name: String) -> Self {
        MessageType::Name(name)
    }
}

/// MessagePack payload of a received user message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    payload: Vec<u8>,
}

impl Message {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Decodes the payload; an absent payload decodes as `nil`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let bytes: &[u8] = if self.payload.is_empty() {
            &EMPTY_PAYLOAD
        } else {
            &self.payload
        };
        Ok(rmp_serde::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        self.decode()
    }
}

/// Encodes a `[code, type, payload?]` user message frame
pub(crate) fn encode_frame<T: Serialize + ?Sized>(
    code: u8,
    message_type: &MessageType,
    message: Option<&T>,
) -> Result<Vec<u8>> {
    let mut frame = vec![code];
    message_type.encode_into(&mut frame);
    if let Some(message) = message {
        rmp_serde::encode::write_named(&mut frame, message)?;
    }
    Ok(frame)
}
