//! In-memory bus with emulated fob readers, for tests and `--simulate`.

use std::collections::VecDeque;

use tracing::debug;

use super::BusTransport;
use crate::error::{AppError, Result};
use crate::fob::{
    CMD_DETECT, CMD_GET_AVAILABLE, CMD_GET_FIRMWARE, CMD_GET_TAGS, CMD_INIT, CMD_MIFARE_VERSION,
    CMD_SELF_TEST, DETECT_ACK,
};

/// Traffic seen by a [`SimulatedBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Scan,
    Send { address: u8, opcode: u8 },
    Receive { address: u8, len: usize },
}

/// Emulated fob reader answering the way the reader firmware does.
#[derive(Debug, Clone)]
pub struct SimulatedReader {
    pub address: u8,
    pub firmware: Vec<u8>,
    pub peripheral_version: u8,
    pub self_test_passes: bool,
    pub tag_present: bool,
    pub tag_records: u8,
    pub tag_bytes: Vec<u8>,
}

impl SimulatedReader {
    /// A healthy v2.0 reader with firmware "1.0" and no tag in the field.
    pub fn new(address: u8) -> Self {
        Self {
            address,
            firmware: b"1.0".to_vec(),
            peripheral_version: 0x92,
            self_test_passes: true,
            tag_present: false,
            tag_records: 0,
            tag_bytes: Vec::new(),
        }
    }

    /// Firmware string reported by GET_FIRMWARE. The length prefix is one
    /// byte, so only the first 255 bytes are ever sent.
    pub fn with_firmware(mut self, firmware: &[u8]) -> Self {
        self.firmware = firmware.to_vec();
        self
    }

    pub fn with_peripheral_version(mut self, code: u8) -> Self {
        self.peripheral_version = code;
        self
    }

    pub fn with_self_test(mut self, passes: bool) -> Self {
        self.self_test_passes = passes;
        self
    }

    /// Place a tag in the field. The size byte saturates at 255; sizes over
    /// `MAX_TAG_BYTES` are sent as-is so decoders can be exercised.
    pub fn with_tag(mut self, records: u8, bytes: &[u8]) -> Self {
        self.tag_present = true;
        self.tag_records = records;
        self.tag_bytes = bytes.to_vec();
        self
    }

    fn reply_to(&self, opcode: u8) -> Vec<u8> {
        match opcode {
            CMD_DETECT => vec![DETECT_ACK],
            CMD_INIT => vec![CMD_INIT],
            CMD_SELF_TEST => vec![CMD_SELF_TEST, u8::from(self.self_test_passes)],
            CMD_GET_FIRMWARE => {
                let (len, firmware) = length_prefixed(&self.firmware);
                let mut reply = vec![CMD_GET_FIRMWARE, len];
                reply.extend_from_slice(firmware);
                reply
            }
            CMD_GET_AVAILABLE => vec![CMD_GET_AVAILABLE, u8::from(self.tag_present)],
            CMD_GET_TAGS => {
                let (len, bytes) = length_prefixed(&self.tag_bytes);
                let mut reply = vec![CMD_GET_TAGS, self.tag_records, len];
                reply.extend_from_slice(bytes);
                reply
            }
            CMD_MIFARE_VERSION => vec![CMD_MIFARE_VERSION, self.peripheral_version],
            _ => Vec::new(),
        }
    }
}

/// One-byte length prefix for `data`, with the data cut to match.
fn length_prefixed(data: &[u8]) -> (u8, &[u8]) {
    let len = u8::try_from(data.len()).unwrap_or(u8::MAX);
    (len, &data[..usize::from(len)])
}

/// Bus hosting emulated readers, with scripted replies and a traffic log.
#[derive(Debug, Default)]
pub struct SimulatedBus {
    readers: Vec<SimulatedReader>,
    scripted: VecDeque<Vec<u8>>,
    pending: Option<(u8, u8)>,
    events: Vec<BusEvent>,
}

impl SimulatedBus {
    /// An empty bus: scans find nothing.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reader(mut self, reader: SimulatedReader) -> Self {
        self.add_reader(reader);
        self
    }

    pub fn add_reader(&mut self, reader: SimulatedReader) {
        self.readers.push(reader);
    }

    pub fn reader_mut(&mut self, address: u8) -> Option<&mut SimulatedReader> {
        self.readers.iter_mut().find(|r| r.address == address)
    }

    /// Queue a raw reply that is returned by the next read instead of the
    /// emulated one. Short replies are padded with `0xFF`.
    pub fn push_reply(&mut self, reply: &[u8]) {
        self.scripted.push_back(reply.to_vec());
    }

    pub fn events(&self) -> &[BusEvent] {
        &self.events
    }

    /// Opcodes sent so far, in order.
    pub fn sent_opcodes(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|e| match e {
                BusEvent::Send { opcode, .. } => Some(*opcode),
                _ => None,
            })
            .collect()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn reader(&self, address: u8) -> Option<&SimulatedReader> {
        self.readers.iter().find(|r| r.address == address)
    }
}

impl BusTransport for SimulatedBus {
    fn scan_addresses(&mut self) -> Result<Vec<u8>> {
        self.events.push(BusEvent::Scan);
        let mut found: Vec<u8> = self.readers.iter().map(|r| r.address).collect();
        found.sort_unstable();
        debug!("Simulated scan found {found:02X?}");
        Ok(found)
    }

    fn send_opcode(&mut self, address: u8, opcode: u8) -> Result<()> {
        self.events.push(BusEvent::Send { address, opcode });
        if self.reader(address).is_none() {
            return Err(AppError::bus(format!("No acknowledge from 0x{address:02X}")));
        }
        self.pending = Some((address, opcode));
        Ok(())
    }

    fn receive_bytes(&mut self, address: u8, buf: &mut [u8]) -> Result<()> {
        self.events.push(BusEvent::Receive {
            address,
            len: buf.len(),
        });

        let pending = self.pending.take();
        let reply = match self.scripted.pop_front() {
            Some(reply) => reply,
            None => {
                let opcode = match pending {
                    Some((pending_address, opcode)) if pending_address == address => opcode,
                    _ => {
                        return Err(AppError::DeviceTimeout(format!(
                            "No reply pending from 0x{address:02X}"
                        )));
                    }
                };
                self.reader(address)
                    .map(|r| r.reply_to(opcode))
                    .ok_or_else(|| AppError::bus(format!("No acknowledge from 0x{address:02X}")))?
            }
        };

        buf.fill(0xFF);
        let n = reply.len().min(buf.len());
        buf[..n].copy_from_slice(&reply[..n]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bus_scan() {
        let mut bus = SimulatedBus::new();
        assert!(bus.scan_addresses().unwrap().is_empty());
        assert_eq!(bus.events(), &[BusEvent::Scan]);
    }

    #[test]
    fn test_reply_is_padded_and_truncated() {
        let mut bus = SimulatedBus::new().with_reader(SimulatedReader::new(0x42));

        bus.send_opcode(0x42, CMD_DETECT).unwrap();
        let mut buf = [0u8; 3];
        bus.receive_bytes(0x42, &mut buf).unwrap();
        assert_eq!(buf, [DETECT_ACK, 0xFF, 0xFF]);

        bus.send_opcode(0x42, CMD_GET_FIRMWARE).unwrap();
        let mut buf = [0u8; 2];
        bus.receive_bytes(0x42, &mut buf).unwrap();
        assert_eq!(buf, [CMD_GET_FIRMWARE, 3]);
    }

    #[test]
    fn test_long_firmware_length_saturates() {
        let firmware = vec![b'x'; 300];
        let mut bus =
            SimulatedBus::new().with_reader(SimulatedReader::new(0x42).with_firmware(&firmware));

        bus.send_opcode(0x42, CMD_GET_FIRMWARE).unwrap();
        let mut buf = [0u8; 2 + 300];
        bus.receive_bytes(0x42, &mut buf).unwrap();
        assert_eq!(buf[1], u8::MAX);
        assert!(buf[2..257].iter().all(|&b| b == b'x'));
        assert!(buf[257..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_missing_device_does_not_acknowledge() {
        let mut bus = SimulatedBus::new();
        assert!(matches!(bus.send_opcode(0x42, CMD_DETECT), Err(AppError::Bus(_))));
    }

    #[test]
    fn test_read_without_request_times_out() {
        let mut bus = SimulatedBus::new().with_reader(SimulatedReader::new(0x42));
        let mut buf = [0u8; 1];
        assert!(matches!(
            bus.receive_bytes(0x42, &mut buf),
            Err(AppError::DeviceTimeout(_))
        ));
    }

    #[test]
    fn test_scripted_reply_takes_precedence() {
        let mut bus = SimulatedBus::new().with_reader(SimulatedReader::new(0x42));
        bus.push_reply(&[0x00]);

        bus.send_opcode(0x42, CMD_DETECT).unwrap();
        let mut buf = [0u8; 1];
        bus.receive_bytes(0x42, &mut buf).unwrap();
        assert_eq!(buf, [0x00]);
        assert_eq!(bus.sent_opcodes(), vec![CMD_DETECT]);
    }
}
