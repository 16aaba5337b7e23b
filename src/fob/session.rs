//! Device session: discovery, handshake and cached reader state.

use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use super::driver::FobReader;
use super::protocol::translate_peripheral_version;
use super::types::{Tag, VERSION_UNKNOWN};
use crate::bus::BusTransport;
use crate::error::{AppError, Result};

/// Lifecycle of a [`DeviceSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No responding address found (or not scanned yet).
    Unbound,
    /// An address is bound but the handshake has not completed.
    Bound,
    /// Detect and init succeeded; versions are cached.
    Initialized,
}

/// Owns the bus and everything known about the bound fob reader.
pub struct DeviceSession<T: BusTransport> {
    bus: T,
    address: Option<u8>,
    state: SessionState,
    firmware_version: String,
    peripheral_version: u8,
    tag: Tag,
    last_read_at: Option<DateTime<Local>>,
}

impl<T: BusTransport> DeviceSession<T> {
    /// Create an unbound session; call [`start`](Self::start) to discover the reader.
    pub fn new(bus: T) -> Self {
        Self {
            bus,
            address: None,
            state: SessionState::Unbound,
            firmware_version: String::new(),
            peripheral_version: VERSION_UNKNOWN,
            tag: Tag::empty(),
            last_read_at: None,
        }
    }

    /// Discover, handshake with and initialize the reader.
    ///
    /// Binds the last responding address. A failed detect or init leaves the
    /// session `Bound`; nothing is retried. Anything cached from an earlier
    /// start is dropped first.
    pub fn start(&mut self) -> Result<()> {
        self.reset();
        let addresses = self.bus.scan_addresses()?;
        let Some(&address) = addresses.last() else {
            warn!("Detecting prox readers... NONE FOUND");
            return Err(AppError::NoDevice);
        };
        if addresses.len() > 1 {
            warn!(
                "{} devices responded ({:02X?}), using the last one at 0x{address:02X}",
                addresses.len(),
                addresses
            );
        }

        self.address = Some(address);
        self.state = SessionState::Bound;

        let mut reader = FobReader::new(&mut self.bus, address);
        if !reader.probe()? {
            error!("No fob reader acknowledged detect at 0x{address:02X}");
            return Err(AppError::init_failed(format!(
                "device at 0x{address:02X} did not acknowledge detect"
            )));
        }

        info!("Initializing fob reader at address 0x{address:02X}");
        if !reader.initialize()? {
            error!("Failed to initialize reader at 0x{address:02X}");
            return Err(AppError::init_failed(format!(
                "device at 0x{address:02X} rejected init"
            )));
        }

        self.state = SessionState::Initialized;
        info!("Fob reader detected and initialized");

        self.firmware_version = reader.firmware_version()?;
        self.peripheral_version = reader.peripheral_version()?;
        info!("Reader FW version = {}", self.firmware_version);
        info!(
            "RFID reader FW version = 0x{:02X} - {}",
            self.peripheral_version,
            self.peripheral_version_label()
        );

        Ok(())
    }

    /// Drop everything known about the reader and run discovery again.
    pub fn restart(&mut self) -> Result<()> {
        info!("Restarting device session");
        self.start()
    }

    /// Run the reader's RFID self-test.
    pub fn self_test(&mut self) -> Result<bool> {
        self.reader()?.self_test()
    }

    /// Poll for a tag in the field. Never touches the cached tag.
    pub fn is_tag_present(&mut self) -> Result<bool> {
        self.reader()?.is_tag_present()
    }

    /// Read the current tag into the cached record.
    ///
    /// The cached record is cleared first and only overwritten on success.
    pub fn read_tag_data(&mut self) -> Result<&Tag> {
        let address = self.address.ok_or(AppError::NoDevice)?;
        self.tag.clear();

        let result = FobReader::new(&mut self.bus, address).read_tag_data();
        match result {
            Ok(tag) => {
                self.tag = tag;
                self.last_read_at = Some(Local::now());
                Ok(&self.tag)
            }
            Err(e) => {
                if e.is_transport() {
                    error!("Tag data request failed: {e}");
                } else {
                    warn!("Rejected tag data: {e}");
                }
                Err(e)
            }
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn address(&self) -> Option<u8> {
        self.address
    }

    /// Cached reader firmware version, empty until initialized.
    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }

    /// Cached RFID front-end version code, `VERSION_UNKNOWN` until initialized.
    pub fn peripheral_version(&self) -> u8 {
        self.peripheral_version
    }

    pub fn peripheral_version_label(&self) -> &'static str {
        translate_peripheral_version(self.peripheral_version)
    }

    /// Last decoded tag (the empty sentinel if none).
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// When the cached tag was read.
    pub fn last_read_at(&self) -> Option<DateTime<Local>> {
        self.last_read_at
    }

    pub fn bus(&self) -> &T {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut T {
        &mut self.bus
    }

    fn reset(&mut self) {
        self.address = None;
        self.state = SessionState::Unbound;
        self.firmware_version.clear();
        self.peripheral_version = VERSION_UNKNOWN;
        self.tag.clear();
        self.last_read_at = None;
    }

    fn reader(&mut self) -> Result<FobReader<&mut T>> {
        let address = self.address.ok_or(AppError::NoDevice)?;
        Ok(FobReader::new(&mut self.bus, address))
    }
}
