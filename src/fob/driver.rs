//! Command/response driver for a single fob reader.

use tracing::{debug, warn};

use super::protocol::{check_echo, decode_firmware, decode_tag, firmware_length};
use super::types::{
    CMD_DETECT, CMD_GET_AVAILABLE, CMD_GET_FIRMWARE, CMD_GET_TAGS, CMD_INIT, CMD_MIFARE_VERSION,
    CMD_SELF_TEST, DETECT_ACK, DETECT_REPLY_SIZE, FW_MAX_REPLY_SIZE, FW_PREAMBLE_SIZE,
    INIT_REPLY_SIZE, MIFARE_VER_SIZE, SELF_TEST_SIZE, TAG_DATA_SIZE, TAG_PRESENCE_SIZE, Tag,
    VERSION_UNKNOWN, format_hex,
};
use crate::bus::BusTransport;
use crate::error::{AppError, Result};

/// Protocol driver bound to one device address.
///
/// Each call sends one logical command and blocks until the whole reply has
/// been read. Transport failures are returned as errors; a reply with the
/// wrong echo yields the operation's documented failure value instead.
pub struct FobReader<T: BusTransport> {
    bus: T,
    address: u8,
}

impl<T: BusTransport> FobReader<T> {
    pub fn new(bus: T, address: u8) -> Self {
        Self { bus, address }
    }

    /// Send DETECT and check for `DETECT_ACK`.
    pub fn probe(&mut self) -> Result<bool> {
        debug!("Sending detect to address 0x{:02X}", self.address);
        let reply = self.exchange::<DETECT_REPLY_SIZE>(CMD_DETECT)?;
        Ok(self.accept(&reply, DETECT_ACK))
    }

    /// Send INIT; the device acknowledges by echoing it.
    pub fn initialize(&mut self) -> Result<bool> {
        let reply = self.exchange::<INIT_REPLY_SIZE>(CMD_INIT)?;
        Ok(self.accept(&reply, CMD_INIT))
    }

    /// Run the reader's RFID self-test.
    pub fn self_test(&mut self) -> Result<bool> {
        let reply = self.exchange::<SELF_TEST_SIZE>(CMD_SELF_TEST)?;
        debug!("Self-test packet ={}", format_hex(&reply));
        Ok(self.accept(&reply, CMD_SELF_TEST) && reply[1] != 0)
    }

    /// Read the reader firmware version string.
    ///
    /// The length is only known after a first exchange, so GET_FIRMWARE is
    /// always sent twice: once for `[echo, length]`, then again for the
    /// length-qualified reply. Returns an empty string on a bad echo.
    pub fn firmware_version(&mut self) -> Result<String> {
        let preamble = self.exchange::<FW_PREAMBLE_SIZE>(CMD_GET_FIRMWARE)?;
        if !self.accept(&preamble, CMD_GET_FIRMWARE) {
            return Ok(String::new());
        }

        let len = FW_PREAMBLE_SIZE + firmware_length(&preamble);
        let mut reply = [0u8; FW_MAX_REPLY_SIZE];
        self.bus.send_opcode(self.address, CMD_GET_FIRMWARE)?;
        self.bus.receive_bytes(self.address, &mut reply[..len])?;
        debug!("Firmware packet ={}", format_hex(&reply[..len]));

        Ok(decode_firmware(&reply[..len]))
    }

    /// Ask whether a new tag is in the field.
    pub fn is_tag_present(&mut self) -> Result<bool> {
        let reply = self.exchange::<TAG_PRESENCE_SIZE>(CMD_GET_AVAILABLE)?;
        debug!("Presence packet ={}", format_hex(&reply));
        Ok(self.accept(&reply, CMD_GET_AVAILABLE) && reply[1] == 0x01)
    }

    /// Fetch and decode the current tag.
    ///
    /// # Errors
    /// `UnexpectedResponse` on a bad echo, `OversizedTag` when the device
    /// declares more bytes than a tag record holds.
    pub fn read_tag_data(&mut self) -> Result<Tag> {
        let reply = self.exchange::<TAG_DATA_SIZE>(CMD_GET_TAGS)?;
        debug!("Tag data packet ={}", format_hex(&reply));
        check_echo(&reply, CMD_GET_TAGS)?;
        decode_tag(&reply)
    }

    /// Read the RFID front-end version code, `VERSION_UNKNOWN` on a bad echo.
    pub fn peripheral_version(&mut self) -> Result<u8> {
        let reply = self.exchange::<MIFARE_VER_SIZE>(CMD_MIFARE_VERSION)?;
        if self.accept(&reply, CMD_MIFARE_VERSION) {
            Ok(reply[1])
        } else {
            Ok(VERSION_UNKNOWN)
        }
    }

    /// Send `opcode` and read a fixed-size reply.
    fn exchange<const N: usize>(&mut self, opcode: u8) -> Result<[u8; N]> {
        let mut reply = [0u8; N];
        self.bus.send_opcode(self.address, opcode)?;
        self.bus.receive_bytes(self.address, &mut reply)?;
        Ok(reply)
    }

    /// Echo check that downgrades a mismatch to `false`.
    fn accept(&self, reply: &[u8], expected: u8) -> bool {
        match check_echo(reply, expected) {
            Ok(()) => true,
            Err(AppError::UnexpectedResponse { expected, received }) => {
                warn!(
                    "Device 0x{:02X} answered 0x{received:02X}, expected 0x{expected:02X}",
                    self.address
                );
                false
            }
            Err(e) => {
                warn!("Device 0x{:02X}: {e}", self.address);
                false
            }
        }
    }
}
