//! Concrete transports for the station tuner.
//!
//! - [`SerialTransport`] / [`SerialPorts`]: the real link, on the `serialport` crate.
//! - [`sim::SimulatedStation`] / [`sim::SimPorts`]: an in-memory station that
//!   answers the line protocol the way the firmware does.
pub mod error;
pub mod sim;
pub mod util;

pub use error::LinkError;
pub use sim::{SIM_PORT_NAME, SimPorts, SimulatedStation};

use std::io::{Read, Write};
use std::time::Duration;

use tuner_traits::{BoxError, PortProvider, Transport};

/// One open serial port speaking newline-terminated ASCII.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
    pending: Vec<u8>,
}

impl SerialTransport {
    pub fn open(name: &str, baud: u32, timeout: Duration) -> error::Result<Self> {
        let port = serialport::new(name, baud).timeout(timeout).open()?;
        tracing::info!(port = name, baud, timeout_ms = timeout.as_millis() as u64, "serial port opened");
        Ok(Self {
            port,
            pending: Vec::new(),
        })
    }

    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        self.port.write_all(bytes).map_err(LinkError::Io)?;
        self.port.flush().map_err(LinkError::Io)?;
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, BoxError> {
        let port = &mut self.port;
        let line = util::read_line_with_timeout(|buf| port.read(buf), &mut self.pending, timeout)?;
        tracing::trace!(len = line.len(), "serial line received");
        Ok(line)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        tracing::debug!(port = ?self.port.name(), "serial port closed");
    }
}

/// Platform serial ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPorts;

impl PortProvider for SerialPorts {
    type Port = SerialTransport;

    fn available_ports(&self) -> Result<Vec<String>, BoxError> {
        let ports = serialport::available_ports().map_err(LinkError::from)?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(&self, name: &str, baud: u32, timeout: Duration) -> Result<Self::Port, BoxError> {
        Ok(SerialTransport::open(name, baud, timeout)?)
    }
}

/// Either a real serial port or the simulated station, chosen at runtime.
pub enum AnyTransport {
    Serial(SerialTransport),
    Sim(SimulatedStation),
}

impl Transport for AnyTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        match self {
            AnyTransport::Serial(t) => t.write(bytes),
            AnyTransport::Sim(t) => t.write(bytes),
        }
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, BoxError> {
        match self {
            AnyTransport::Serial(t) => t.read_line(timeout),
            AnyTransport::Sim(t) => t.read_line(timeout),
        }
    }
}

/// Serial ports plus the reserved [`SIM_PORT_NAME`] entry.
///
/// Listing always includes the simulated port so an operator can rehearse
/// without hardware; opening it returns a station sharing one state, so
/// values written survive a disconnect the way the device's EEPROM does.
#[derive(Default, Clone)]
pub struct StationPorts {
    sim: SimPorts,
    include_serial: bool,
}

impl StationPorts {
    pub fn new(include_serial: bool) -> Self {
        Self {
            sim: SimPorts::default(),
            include_serial,
        }
    }

    pub fn sim(&self) -> &SimPorts {
        &self.sim
    }
}

impl PortProvider for StationPorts {
    type Port = AnyTransport;

    fn available_ports(&self) -> Result<Vec<String>, BoxError> {
        let mut names = if self.include_serial {
            SerialPorts.available_ports()?
        } else {
            Vec::new()
        };
        names.extend(self.sim.available_ports()?);
        Ok(names)
    }

    fn open(&self, name: &str, baud: u32, timeout: Duration) -> Result<Self::Port, BoxError> {
        if name == SIM_PORT_NAME {
            return Ok(AnyTransport::Sim(self.sim.open(name, baud, timeout)?));
        }
        Ok(AnyTransport::Serial(SerialPorts.open(name, baud, timeout)?))
    }
}
