//! Fob reader protocol types and constants.

use std::fmt;

// Command opcodes
pub const CMD_DETECT: u8 = 0xFA;
pub const CMD_INIT: u8 = 0xFB;
pub const CMD_GET_FIRMWARE: u8 = 0xFC;
pub const CMD_GET_TAGS: u8 = 0xFD;
pub const CMD_GET_AVAILABLE: u8 = 0xFE;
pub const CMD_SELF_TEST: u8 = 0xDC;
pub const CMD_MIFARE_VERSION: u8 = 0xDB;

// Response codes
pub const DETECT_ACK: u8 = 0xDA;
/// Reserved by the reader firmware; no reply currently carries it.
pub const BAD_CARD: u8 = 0xDD;

// Reply sizes
pub const DETECT_REPLY_SIZE: usize = 1;
pub const INIT_REPLY_SIZE: usize = 1;
pub const FW_PREAMBLE_SIZE: usize = 2;
pub const TAG_PRESENCE_SIZE: usize = 2;
pub const TAG_DATA_SIZE: usize = 14;
pub const MIFARE_VER_SIZE: usize = 2;
pub const SELF_TEST_SIZE: usize = 2;

/// Largest firmware reply: preamble plus a one-byte declared length.
pub const FW_MAX_REPLY_SIZE: usize = FW_PREAMBLE_SIZE + u8::MAX as usize;

/// Capacity of a tag record payload.
pub const MAX_TAG_BYTES: usize = 10;

/// Offset of the first payload byte in a tag data reply.
pub const TAG_PAYLOAD_OFFSET: usize = 3;

/// `Tag::id` value for "nothing decoded".
pub const TAG_ID_EMPTY: u8 = 0xFF;
/// `Tag::id` value for a decoded, valid tag.
pub const TAG_ID_VALID: u8 = 0x00;

/// Peripheral version code reported before a successful query.
pub const VERSION_UNKNOWN: u8 = 0xFF;

/// Decoded proximity tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    /// Number of logical records on the tag.
    pub records: u8,
    /// Raw tag bytes; only the first `size` are meaningful.
    pub bytes: [u8; MAX_TAG_BYTES],
    /// Count of significant bytes, never above `MAX_TAG_BYTES`.
    pub size: u8,
    /// `TAG_ID_EMPTY` until a decode succeeds, then `TAG_ID_VALID`.
    pub id: u8,
}

impl Tag {
    /// The empty sentinel record.
    pub const fn empty() -> Self {
        Self {
            records: 0,
            bytes: [0xFF; MAX_TAG_BYTES],
            size: 0,
            id: TAG_ID_EMPTY,
        }
    }

    /// Reset to the empty sentinel.
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    pub fn is_valid(&self) -> bool {
        self.id == TAG_ID_VALID
    }

    /// The bytes the device declared as significant.
    pub fn significant_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.size).min(MAX_TAG_BYTES)]
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_hex(self.significant_bytes()))
    }
}

/// Render bytes as space-prefixed upper-case hex pairs (" 04 A1 FF").
pub fn format_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!(" {b:02X}")).collect()
}
