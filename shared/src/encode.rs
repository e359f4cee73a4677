//! Encoders matching the [`Cursor`](crate::decode::Cursor) decoders

/// Appends a string with the smallest length prefix that fits
pub fn encode_string(buffer: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    let length = bytes.len();

    if length < 0x20 {
        buffer.push(0xa0 | length as u8);
    } else if length <= u8::MAX as usize {
        buffer.push(0xd9);
        buffer.push(length as u8);
    } else if length <= u16::MAX as usize {
        buffer.push(0xda);
        buffer.extend_from_slice(&(length as u16).to_le_bytes());
    } else {
        buffer.push(0xdb);
        buffer.extend_from_slice(&(length as u32).to_le_bytes());
    }

    buffer.extend_from_slice(bytes);
}

/// Appends an integer with the smallest numeric prefix that fits
pub fn encode_number(buffer: &mut Vec<u8>, value: i64) {
    match value {
        0..=0x7f => buffer.push(value as u8),
        -32..=-1 => buffer.push(value as i8 as u8),
        0x80..=0xff => {
            buffer.push(0xcc);
            buffer.push(value as u8);
        }
        -128..=-33 => {
            buffer.push(0xd0);
            buffer.push(value as i8 as u8);
        }
        0x100..=0xffff => {
            buffer.push(0xcd);
            buffer.extend_from_slice(&(value as u16).to_le_bytes());
        }
        -32768..=-129 => {
            buffer.push(0xd1);
            buffer.extend_from_slice(&(value as i16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buffer.push(0xce);
            buffer.extend_from_slice(&(value as u32).to_le_bytes());
        }
        -2_147_483_648..=-32769 => {
            buffer.push(0xd2);
            buffer.extend_from_slice(&(value as i32).to_le_bytes());
        }
        _ => {
            buffer.push(0xd3);
            buffer.extend_from_slice(&value.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Cursor;

    #[test]
    fn test_short_string_uses_fixstr() {
        let mut buffer = Vec::new();
        encode_string(&mut buffer, "move");
        assert_eq!(buffer, vec![0xa4, b'm', b'o', b'v', b'e']);
    }

    #[test]
    fn test_strings_read_back() {
        for length in [0usize, 31, 32, 255, 256, 70_000] {
            let text = "z".repeat(length);
            let mut buffer = Vec::new();
            encode_string(&mut buffer, &text);
            assert_eq!(Cursor::new(&buffer).decode_string().unwrap(), text);
        }
    }

    #[test]
    fn test_numbers_read_back() {
        let values = [
            0i64, 5, 127, 128, 255, 256, 65_535, 65_536, -1, -32, -33, -128, -129, -40_000,
            4_000_000_000, -3_000_000_000,
        ];
        let mut buffer = Vec::new();
        for value in values {
            encode_number(&mut buffer, value);
        }

        let mut cursor = Cursor::new(&buffer);
        for value in values {
            assert_eq!(cursor.decode_number().unwrap(), value as f64);
        }
        assert!(!cursor.has_remaining());
    }

    #[test]
    fn test_small_numbers_are_single_bytes() {
        let mut buffer = Vec::new();
        encode_number(&mut buffer, 13);
        encode_number(&mut buffer, -2);
        assert_eq!(buffer, vec![13, 0xfe]);
    }
}
