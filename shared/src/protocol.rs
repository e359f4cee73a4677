//! Room protocol codes and schema markers

use crate::error::DecodeError;

/// First byte of every frame exchanged with a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Protocol {
    Handshake = 9,
    JoinRoom = 10,
    JoinError = 11,
    LeaveRoom = 12,
    RoomData = 13,
    RoomState = 14,
    RoomStatePatch = 15,
    RoomDataSchema = 16,
}

impl Protocol {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Protocol {
    type Error = DecodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            9 => Ok(Protocol::Handshake),
            10 => Ok(Protocol::JoinRoom),
            11 => Ok(Protocol::JoinError),
            12 => Ok(Protocol::LeaveRoom),
            13 => Ok(Protocol::RoomData),
            14 => Ok(Protocol::RoomState),
            15 => Ok(Protocol::RoomStatePatch),
            16 => Ok(Protocol::RoomDataSchema),
            other => Err(DecodeError::UnknownProtocol(other)),
        }
    }
}

/// Ends a schema structure (never used by MessagePack itself)
pub const END_OF_STRUCTURE: u8 = 0xc1;
/// Marks the following field or collection entry as removed
pub const NIL: u8 = 0xc0;
/// Precedes the previous index of a moved collection entry
pub const INDEX_CHANGE: u8 = 0xd4;

/// Close code for a normal, consented close
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code reported when the local connection fails
pub const CLOSE_CONNECTION_ERROR: u16 = 1005;
/// Close code reported when the socket drops without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code reported when leaving a room that was never joined
pub const CLOSE_NOT_JOINED: u16 = 4000;
