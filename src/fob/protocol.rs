//! Fob reader reply validation and payload decoding.
//!
//! Every reply starts with an echo of the opcode that was sent (DETECT is
//! answered with `DETECT_ACK` instead). On a shared bus this echo is the only
//! guard against reading a stale or misrouted reply, so it is checked for
//! every command.

use super::types::{
    FW_PREAMBLE_SIZE, MAX_TAG_BYTES, TAG_DATA_SIZE, TAG_ID_VALID, TAG_PAYLOAD_OFFSET, Tag,
};
use crate::error::{AppError, Result};

/// Check that a reply begins with `expected`.
pub(crate) fn check_echo(reply: &[u8], expected: u8) -> Result<()> {
    match reply.first() {
        Some(&received) if received == expected => Ok(()),
        Some(&received) => Err(AppError::UnexpectedResponse { expected, received }),
        None => Err(AppError::bus("Empty reply")),
    }
}

/// Declared payload length from a firmware preamble `[echo, length]`.
pub(crate) fn firmware_length(preamble: &[u8; FW_PREAMBLE_SIZE]) -> usize {
    usize::from(preamble[1])
}

/// Decode the firmware string from a full `[echo, length, ascii...]` reply.
///
/// NUL bytes are padding inside the string, not terminators, and are dropped.
pub(crate) fn decode_firmware(reply: &[u8]) -> String {
    reply
        .iter()
        .skip(FW_PREAMBLE_SIZE)
        .filter(|&&b| b != 0)
        .map(|&b| char::from(b))
        .collect()
}

/// Decode a 14-byte tag data reply `[echo, records, size, payload..., padding]`.
///
/// The declared size is checked against the record capacity before anything
/// is copied.
pub(crate) fn decode_tag(reply: &[u8; TAG_DATA_SIZE]) -> Result<Tag> {
    let size = usize::from(reply[2]);
    if size > MAX_TAG_BYTES {
        return Err(AppError::OversizedTag {
            size,
            max: MAX_TAG_BYTES,
        });
    }

    let mut tag = Tag::empty();
    tag.id = TAG_ID_VALID;
    tag.records = reply[1];
    tag.size = reply[2];
    tag.bytes[..size].copy_from_slice(&reply[TAG_PAYLOAD_OFFSET..TAG_PAYLOAD_OFFSET + size]);
    Ok(tag)
}

/// Human-readable label for an RFID front-end version code.
///
/// Clone and counterfeit markers are ordinary outcomes of the lookup.
pub fn translate_peripheral_version(code: u8) -> &'static str {
    match code {
        0x88 => "(clone)",
        0x90 => "v0.0",
        0x91 => "v1.0",
        0x92 => "v2.0",
        0x12 => "counterfeit chip",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fob::types::{CMD_GET_FIRMWARE, CMD_GET_TAGS, TAG_ID_EMPTY};

    fn tag_reply(size: u8, fill: u8) -> [u8; TAG_DATA_SIZE] {
        let mut reply = [fill; TAG_DATA_SIZE];
        reply[0] = CMD_GET_TAGS;
        reply[1] = 1;
        reply[2] = size;
        reply
    }

    #[test]
    fn test_check_echo() {
        assert!(check_echo(&[0xFC, 0x05], 0xFC).is_ok());
        assert!(matches!(
            check_echo(&[0xFD], 0xFC),
            Err(AppError::UnexpectedResponse { expected: 0xFC, received: 0xFD })
        ));
        assert!(matches!(check_echo(&[], 0xFC), Err(AppError::Bus(_))));
    }

    #[test]
    fn test_decode_firmware_skips_nul_bytes() {
        let reply = [CMD_GET_FIRMWARE, 5, b'A', 0x00, b'B', b'C', 0x00];
        assert_eq!(decode_firmware(&reply), "ABC");
    }

    #[test]
    fn test_decode_firmware_empty_payload() {
        assert_eq!(decode_firmware(&[CMD_GET_FIRMWARE, 0]), "");
        assert_eq!(firmware_length(&[CMD_GET_FIRMWARE, 0]), 0);
    }

    #[test]
    fn test_decode_tag() {
        let mut reply = tag_reply(4, 0xEE);
        reply[3..7].copy_from_slice(&[0x04, 0xA1, 0x2B, 0x7C]);

        let tag = decode_tag(&reply).unwrap();
        assert_eq!(tag.id, TAG_ID_VALID);
        assert_eq!(tag.records, 1);
        assert_eq!(tag.significant_bytes(), &[0x04, 0xA1, 0x2B, 0x7C]);
        // Bytes past the declared size keep the cleared value
        assert_eq!(tag.bytes[4], 0xFF);
    }

    #[test]
    fn test_decode_tag_full_capacity() {
        let tag = decode_tag(&tag_reply(MAX_TAG_BYTES as u8, 0x11)).unwrap();
        assert_eq!(tag.significant_bytes(), &[0x11; MAX_TAG_BYTES]);
    }

    #[test]
    fn test_decode_tag_rejects_oversized() {
        for size in (MAX_TAG_BYTES as u8 + 1)..=u8::MAX {
            let result = decode_tag(&tag_reply(size, 0x11));
            match result {
                Err(AppError::OversizedTag { size: s, max }) => {
                    assert_eq!(s, usize::from(size));
                    assert_eq!(max, MAX_TAG_BYTES);
                }
                other => panic!("size {size} should be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_tag_sentinel() {
        let tag = Tag::empty();
        assert_eq!(tag.id, TAG_ID_EMPTY);
        assert!(!tag.is_valid());
        assert!(tag.significant_bytes().is_empty());
        assert_eq!(tag.to_string(), "");
    }

    #[test]
    fn test_translate_known_versions() {
        let table = [
            (0x88, "(clone)"),
            (0x90, "v0.0"),
            (0x91, "v1.0"),
            (0x92, "v2.0"),
            (0x12, "counterfeit chip"),
        ];
        for (code, label) in table {
            assert_eq!(translate_peripheral_version(code), label, "code 0x{code:02X}");
        }
    }

    #[test]
    fn test_translate_unknown_versions() {
        let known = [0x88, 0x90, 0x91, 0x92, 0x12];
        for code in (0..=u8::MAX).filter(|c| !known.contains(c)) {
            assert_eq!(translate_peripheral_version(code), "unknown", "code 0x{code:02X}");
        }
    }
}
