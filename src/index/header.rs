//! The 8-byte record header.
//!
//! ```text
//! offset 0..1: sequence number (low half of the delimiter word)
//! offset 2..3: magic 0xACED    (high half of the delimiter word)
//! offset 4..5: type id
//! offset 6..7: payload length in bytes
//! ```
//!
//! All fields are little-endian. Records follow each other with no padding.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{LogError, Result};

pub const HEADER_SIZE: usize = 8;

/// Value of header bytes 2..3, read as a little-endian u16.
pub const DELIMITER_MAGIC: u16 = 0xACED;

/// Type id of removed records. Never appears in a produced index.
pub const NULL_TYPE_ID: u16 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    pub delimiter: u32,
    pub type_id: u16,
    pub payload_len: u16,
}

impl RecordHeader {
    pub fn new(type_id: u16, payload_len: u16) -> Self {
        Self::with_sequence(0, type_id, payload_len)
    }

    /// Header carrying a producer sequence number in the low half of the delimiter.
    pub fn with_sequence(sequence: u16, type_id: u16, payload_len: u16) -> Self {
        Self {
            delimiter: (u32::from(DELIMITER_MAGIC) << 16) | u32::from(sequence),
            type_id,
            payload_len,
        }
    }

    pub fn magic(&self) -> u16 {
        (self.delimiter >> 16) as u16
    }

    pub fn sequence(&self) -> u16 {
        (self.delimiter & 0xFFFF) as u16
    }

    /// Decode the header that starts at `offset`, validating the magic.
    ///
    /// The caller guarantees `offset + HEADER_SIZE <= buffer.len()`.
    #[inline]
    pub fn read(buffer: &[u8], offset: usize) -> Result<Self> {
        let bytes = &buffer[offset..offset + HEADER_SIZE];
        let header = Self {
            delimiter: LittleEndian::read_u32(&bytes[0..4]),
            type_id: LittleEndian::read_u16(&bytes[4..6]),
            payload_len: LittleEndian::read_u16(&bytes[6..8]),
        };
        if header.magic() != DELIMITER_MAGIC {
            return Err(LogError::FramingCorruption {
                offset,
                expected: DELIMITER_MAGIC,
                found: header.magic(),
            });
        }
        Ok(header)
    }

    /// Decode the header of the record whose payload starts at `payload_offset`.
    pub fn read_before(buffer: &[u8], payload_offset: usize) -> Result<Self> {
        if payload_offset < HEADER_SIZE || payload_offset > buffer.len() {
            return Err(LogError::RecordShape {
                schema: "record header".to_string(),
                reason: format!(
                    "payload offset {payload_offset} has no header inside a {} byte buffer",
                    buffer.len()
                ),
            });
        }
        Self::read(buffer, payload_offset - HEADER_SIZE)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], self.delimiter);
        LittleEndian::write_u16(&mut bytes[4..6], self.type_id);
        LittleEndian::write_u16(&mut bytes[6..8], self.payload_len);
        bytes
    }

    /// Overwrite the type id of the header starting at `offset` in place.
    pub(crate) fn write_type_id(buffer: &mut [u8], offset: usize, type_id: u16) {
        LittleEndian::write_u16(&mut buffer[offset + 4..offset + 6], type_id);
    }
}
