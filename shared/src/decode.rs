//! Primitive decoders for room frames and schema state
//!
//! Room frames mix MessagePack-style prefixes with little-endian payloads.
//! Every decoder reads from a [`Cursor`] whose offset is shared by all
//! nested structures, so a schema decoder and the frame dispatcher can hand
//! the same cursor back and forth.

use crate::error::{DecodeError, Result};
use crate::protocol::{INDEX_CHANGE, NIL};

/// Read position over a received frame
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub fn with_offset(bytes: &'a [u8], offset: usize) -> Self {
        Self { bytes, offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn has_remaining(&self) -> bool {
        self.offset < self.bytes.len()
    }

    /// Bytes not consumed yet
    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.offset.min(self.bytes.len())..]
    }

    /// Next byte without advancing
    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(count);
        match end {
            Some(end) if end <= self.bytes.len() => {
                let slice = &self.bytes[self.offset..end];
                self.offset = end;
                Ok(slice)
            }
            _ => Err(DecodeError::UnexpectedEof {
                offset: self.offset,
                needed: count,
            }),
        }
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn decode_string(&mut self) -> Result<String> {
        let prefix = self.decode_uint8()?;

        let length = if prefix < 0xc0 {
            (prefix & 0x1f) as usize
        } else if prefix == 0xd9 {
            self.decode_uint8()? as usize
        } else if prefix == 0xda {
            self.decode_uint16()? as usize
        } else if prefix == 0xdb {
            self.decode_uint32()? as usize
        } else {
            0
        };

        let start = self.offset;
        let raw = self.take(length)?;
        String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { offset: start })
    }

    pub fn decode_int8(&mut self) -> Result<i8> {
        Ok(self.decode_uint8()? as i8)
    }

    pub fn decode_uint8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn decode_int16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    pub fn decode_uint16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn decode_int32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn decode_uint32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn decode_int64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub fn decode_uint64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub fn decode_float32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn decode_float64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    /// Decodes any numeric encoding into an `f64`
    pub fn decode_number(&mut self) -> Result<f64> {
        let offset = self.offset;
        let prefix = self.decode_uint8()?;

        let value = match prefix {
            // positive fixint
            0x00..=0x7f => prefix as f64,
            0xca => self.decode_float32()? as f64,
            0xcb => self.decode_float64()?,
            0xcc => self.decode_uint8()? as f64,
            0xcd => self.decode_uint16()? as f64,
            0xce => self.decode_uint32()? as f64,
            0xcf => self.decode_uint64()? as f64,
            0xd0 => self.decode_int8()? as f64,
            0xd1 => self.decode_int16()? as f64,
            0xd2 => self.decode_int32()? as f64,
            0xd3 => self.decode_int64()? as f64,
            // negative fixint
            0xe0..=0xff => -((0xff - prefix as i32 + 1) as f64),
            _ => return Err(DecodeError::UnknownNumberPrefix { prefix, offset }),
        };

        Ok(value)
    }

    /// Decodes a number used as a collection index or length
    pub fn decode_index(&mut self) -> Result<usize> {
        let number = self.decode_number()?;
        // Saturating cast: negative or NaN collapse to zero
        Ok(number as usize)
    }

    pub fn decode_boolean(&mut self) -> Result<bool> {
        Ok(self.decode_uint8()? > 0)
    }

    pub fn number_check(&self) -> bool {
        matches!(self.peek(), Some(prefix) if prefix < 0x80 || (0xca..=0xd3).contains(&prefix))
    }

    pub fn array_check(&self) -> bool {
        matches!(self.peek(), Some(prefix) if prefix < 0xa0)
    }

    pub fn nil_check(&self) -> bool {
        self.peek() == Some(NIL)
    }

    pub fn index_change_check(&self) -> bool {
        self.peek() == Some(INDEX_CHANGE)
    }
}
