//! The station client: one open link, one bound tip, one exchange at a time.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, TryLockError};

use tuner_traits::{PortProvider, Transport};

use crate::command::{CommandId, TipIndex, TipRef};
use crate::config::LinkCfg;
use crate::error::{ConnectError, InvalidReason, Result, StationError, TipError};
use crate::link_error::{map_link_error, map_open_error};
use crate::protocol::{self, Mode, Request};

/// Owns the link to the station and the currently selected tip.
///
/// Every request method takes `&mut self`, so a request is always written
/// and its single response line consumed before another can start.
pub struct StationClient<P: PortProvider> {
    ports: P,
    link: LinkCfg,
    transport: Option<P::Port>,
    port_name: Option<String>,
    tip: Option<TipIndex>,
    tip_changed: bool,
}

impl<P: PortProvider> fmt::Debug for StationClient<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationClient")
            .field("link", &self.link)
            .field("port", &self.port_name)
            .field("tip", &self.tip)
            .field("tip_changed", &self.tip_changed)
            .finish_non_exhaustive()
    }
}

impl<P: PortProvider> StationClient<P> {
    pub fn new(ports: P) -> Self {
        Self::with_link(ports, LinkCfg::default())
    }

    pub fn with_link(ports: P, link: LinkCfg) -> Self {
        Self {
            ports,
            link,
            transport: None,
            port_name: None,
            tip: None,
            tip_changed: false,
        }
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    pub fn link(&self) -> LinkCfg {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn tip(&self) -> Option<TipIndex> {
        self.tip
    }

    /// Port names currently listed by the platform.
    pub fn available_ports(&self) -> std::result::Result<Vec<String>, ConnectError> {
        self.ports
            .available_ports()
            .map_err(|e| ConnectError::ListingFailed(e.to_string()))
    }

    /// Open `port_name`, closing any link that is already open.
    ///
    /// The name must appear in the current port listing. On failure the client
    /// is left disconnected.
    pub fn connect(&mut self, port_name: &str) -> std::result::Result<(), ConnectError> {
        self.disconnect();

        let listed = self.available_ports()?;
        if !listed.iter().any(|p| p == port_name) {
            tracing::warn!(port = port_name, "connect refused: port not listed");
            return Err(ConnectError::PortUnavailable(port_name.to_string()));
        }

        let transport = self
            .ports
            .open(port_name, self.link.baud, self.link.read_timeout)
            .map_err(|e| {
                let err = map_open_error(port_name, &*e);
                tracing::warn!(port = port_name, error = %err, "connect failed");
                err
            })?;

        self.transport = Some(transport);
        self.port_name = Some(port_name.to_string());
        // anything cached for the tip came from a previous session
        self.tip_changed = self.tip.is_some();
        tracing::info!(port = port_name, baud = self.link.baud, "connected");
        Ok(())
    }

    /// Release the link. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            tracing::info!(port = ?self.port_name, "disconnected");
        }
        self.port_name = None;
    }

    /// Bind a tip by name or index. On failure the previous tip stays bound.
    pub fn select_tip<'a>(&mut self, tip: impl Into<TipRef<'a>>) -> std::result::Result<TipIndex, TipError> {
        let index = tip.into().resolve()?;
        self.tip = Some(index);
        self.tip_changed = true;
        tracing::debug!(tip = index.name(), index = index.get(), "tip selected");
        Ok(index)
    }

    /// Returns and clears the "tip changed" flag.
    pub fn take_tip_changed(&mut self) -> bool {
        std::mem::take(&mut self.tip_changed)
    }

    pub fn tip_changed(&self) -> bool {
        self.tip_changed
    }

    /// Flag tip-scoped state as stale without changing the tip.
    pub fn mark_tip_changed(&mut self) {
        self.tip_changed = true;
    }

    /// Validation order: command set membership, then link, then tip.
    fn check(&self, command: &str) -> Result<(CommandId, TipIndex)> {
        let id = CommandId::from_str(command)
            .map_err(|_| StationError::invalid(command, InvalidReason::Unknown))?;
        if self.transport.is_none() {
            return Err(StationError::invalid(command, InvalidReason::NotConnected));
        }
        let tip = self
            .tip
            .ok_or_else(|| StationError::invalid(command, InvalidReason::NoTip))?;
        Ok((id, tip))
    }

    /// Write one request and read exactly one line back.
    ///
    /// Any write or read failure drops the link: a late or partial reply
    /// would otherwise be taken as the answer to the next request.
    fn exchange(&mut self, request: &Request) -> Result<String> {
        let result = self.exchange_on_link(request);
        if let Err(err @ StationError::Protocol(_)) = &result {
            tracing::warn!(command = %request.command, error = %err, "link out of step, disconnecting");
            self.disconnect();
        }
        result
    }

    fn exchange_on_link(&mut self, request: &Request) -> Result<String> {
        let timeout = self.link.read_timeout;
        let Some(transport) = self.transport.as_mut() else {
            return Err(StationError::invalid(
                request.command.wire(),
                InvalidReason::NotConnected,
            ));
        };
        let bytes = request.encode();
        tracing::trace!(request = %request.to_string().trim_end(), "tx");
        transport
            .write(&bytes)
            .map_err(|e| map_link_error(&*e))?;
        let line = transport.read_line(timeout).map_err(|e| map_link_error(&*e))?;
        let line = String::from_utf8_lossy(&line).into_owned();
        tracing::trace!(response = %line, "rx");
        Ok(line)
    }

    /// Write `value` to `command` on the bound tip. Succeeds only on `OK`.
    pub fn set(&mut self, command: impl AsRef<str>, value: impl fmt::Display) -> Result<()> {
        let (id, tip) = self.check(command.as_ref())?;
        let request = Request::set(tip, id, value.to_string())?;
        let line = self.exchange(&request)?;
        let outcome = protocol::classify_set(id, &line);
        match &outcome {
            Ok(()) => tracing::debug!(command = %id, value = %request.payload.as_deref().unwrap_or_default(), "set"),
            Err(e) => tracing::debug!(command = %id, error = %e, "set failed"),
        }
        outcome
    }

    /// Read `command` on the bound tip; `argument` defaults to `?`.
    ///
    /// Returns the raw response text; decoding is up to the caller.
    pub fn get(&mut self, command: impl AsRef<str>, argument: Option<&str>) -> Result<String> {
        let (id, tip) = self.check(command.as_ref())?;
        let request = Request::new(tip, id, Mode::Get, argument.map(str::to_owned))?;
        let line = self.exchange(&request)?;
        protocol::classify_get(id, &line)
    }

    pub fn get_number(&mut self, command: CommandId) -> Result<f64> {
        self.get(command, None).and_then(|s| protocol::parse_number(&s))
    }

    pub fn get_flag(&mut self, command: CommandId) -> Result<bool> {
        self.get(command, None).and_then(|s| protocol::parse_flag(&s))
    }

    /// Set, then read the value back once. The read-back is authoritative.
    pub fn write_and_confirm(&mut self, command: impl AsRef<str>, value: impl fmt::Display) -> Result<String> {
        let command = command.as_ref();
        self.set(command, value)?;
        self.get(command, None)
    }
}

/// A client shared between callers that must never interleave exchanges.
///
/// `with` waits for the current exchange to finish; `try_with` refuses with
/// [`StationError::Busy`] instead.
pub struct SharedStation<P: PortProvider> {
    inner: Arc<Mutex<StationClient<P>>>,
}

impl<P: PortProvider> Clone for SharedStation<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: PortProvider> SharedStation<P> {
    pub fn new(client: StationClient<P>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(client)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut StationClient<P>) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn try_with<R>(&self, f: impl FnOnce(&mut StationClient<P>) -> R) -> Result<R> {
        match self.inner.try_lock() {
            Ok(mut guard) => Ok(f(&mut guard)),
            Err(TryLockError::Poisoned(p)) => Ok(f(&mut p.into_inner())),
            Err(TryLockError::WouldBlock) => Err(StationError::Busy),
        }
    }
}
