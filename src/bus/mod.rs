//! Byte-oriented bus transports for talking to the fob reader.
//!
//! The protocol driver only needs three primitives: find out who is on the
//! bus, push a single opcode to an address, and read a fixed number of reply
//! bytes back. Everything else (framing, validation) lives in [`crate::fob`].

mod i2c;
mod simulated;

pub use i2c::I2cBus;
pub use simulated::{BusEvent, SimulatedBus, SimulatedReader};

use crate::error::Result;

/// Blocking transport to devices on an addressable bus.
///
/// Implementations handle one request at a time; callers never issue a new
/// opcode before the previous reply has been read in full.
pub trait BusTransport {
    /// Probe the bus and return every responding address, in scan order.
    fn scan_addresses(&mut self) -> Result<Vec<u8>>;

    /// Send a single opcode byte to `address`.
    fn send_opcode(&mut self, address: u8, opcode: u8) -> Result<()>;

    /// Fill `buf` with the device's reply, waiting up to the transport's timeout.
    fn receive_bytes(&mut self, address: u8, buf: &mut [u8]) -> Result<()>;
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    fn scan_addresses(&mut self) -> Result<Vec<u8>> {
        (**self).scan_addresses()
    }

    fn send_opcode(&mut self, address: u8, opcode: u8) -> Result<()> {
        (**self).send_opcode(address, opcode)
    }

    fn receive_bytes(&mut self, address: u8, buf: &mut [u8]) -> Result<()> {
        (**self).receive_bytes(address, buf)
    }
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn scan_addresses(&mut self) -> Result<Vec<u8>> {
        (**self).scan_addresses()
    }

    fn send_opcode(&mut self, address: u8, opcode: u8) -> Result<()> {
        (**self).send_opcode(address, opcode)
    }

    fn receive_bytes(&mut self, address: u8, buf: &mut [u8]) -> Result<()> {
        (**self).receive_bytes(address, buf)
    }
}
