pub mod bus;
pub mod config;
pub mod error;
pub mod fob;
pub mod shell;

pub use error::{AppError, Result};
