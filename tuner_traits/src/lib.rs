//! Collaborator seams for the station tuner.
//!
//! The core only ever talks to the outside world through these traits:
//! a line-oriented duplex [`Transport`], a [`PortProvider`] that lists and
//! opens ports, and a [`Clock`]. Errors crossing these boundaries are boxed
//! so concrete backends can keep their own error types.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;

/// Error type used at every trait boundary in this crate.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An open, line-oriented, half-duplex byte channel.
pub trait Transport {
    /// Write the whole buffer to the device.
    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError>;

    /// Block until one `\n`-terminated line arrives or `timeout` expires.
    ///
    /// The returned bytes exclude the terminator. A timeout is always an
    /// error: with no bytes received, and also after a partial line, whose
    /// bytes are dropped rather than carried into the next read.
    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, BoxError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        (**self).write(bytes)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, BoxError> {
        (**self).read_line(timeout)
    }
}

/// Enumerates and opens ports. Port discovery itself belongs to the platform.
pub trait PortProvider {
    type Port: Transport;

    /// Names of the ports currently visible to the platform.
    fn available_ports(&self) -> Result<Vec<String>, BoxError>;

    /// Open `name` at `baud` with the given per-read timeout.
    fn open(&self, name: &str, baud: u32, timeout: Duration) -> Result<Self::Port, BoxError>;
}
