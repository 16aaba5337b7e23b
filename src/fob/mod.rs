//! Fob reader protocol driver.
//!
//! Single-byte opcodes, echo-checked replies, and a two-phase read for the
//! variable-length firmware string. [`DeviceSession`] sequences discovery and
//! initialization on top of the per-command [`FobReader`].

mod driver;
mod protocol;
mod session;
mod types;


// Re-export public API
pub use driver::FobReader;
pub use protocol::translate_peripheral_version;
pub use session::{DeviceSession, SessionState};
pub use types::*;
