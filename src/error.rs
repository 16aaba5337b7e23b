//! Error types and handling.

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// I2C bus operation failed
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    /// Bus transport failed (no acknowledge, short transfer)
    #[error("Bus error: {0}")]
    Bus(String),

    /// Device did not answer within the read timeout
    #[error("Device timeout: {0}")]
    DeviceTimeout(String),

    /// No fob reader is bound to the session
    #[error("No device: no fob reader responded on the bus")]
    NoDevice,

    /// Reply did not start with the expected opcode echo
    #[error("Unexpected response: expected 0x{expected:02X}, received 0x{received:02X}")]
    UnexpectedResponse { expected: u8, received: u8 },

    /// Device declared more tag bytes than the record can hold
    #[error("Tag payload too large: device reported {size} bytes, maximum is {max}")]
    OversizedTag { size: usize, max: usize },

    /// Detect or init handshake was refused
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// File or console I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Create a bus error with message
    pub fn bus(msg: impl Into<String>) -> Self {
        Self::Bus(msg.into())
    }

    /// Create an initialization error with message
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitFailed(msg.into())
    }

    /// Whether the error came from the transport rather than the protocol.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::I2c(_) | Self::Bus(_) | Self::DeviceTimeout(_))
    }
}
