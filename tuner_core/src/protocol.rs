//! Request encoding and response classification for the station line protocol.
//!
//! Set: `"{tip}:{command}:{value}\n"` answered by `OK` or `ERROR {message}`.
//! Get: `"{tip}:{command}:{argument}"` answered by the raw value or `ERROR {message}`.

use std::fmt;
use std::str::FromStr;

use crate::command::{CommandId, TipIndex};
use crate::error::{InvalidReason, StationError};

/// Prefix the firmware puts in front of every refusal.
pub const ERROR_PREFIX: &str = "ERROR ";
/// Literal acknowledgement of a successful set.
pub const ACK: &str = "OK";
/// Argument of a get that asks for the live value.
pub const QUERY: &str = "?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Set,
    Get,
}

/// One request, built per call and dropped after the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub tip: TipIndex,
    pub command: CommandId,
    pub mode: Mode,
    pub payload: Option<String>,
}

impl Request {
    /// General constructor. A set without a payload is refused, as is any
    /// payload that would break the line framing.
    pub fn new(
        tip: TipIndex,
        command: CommandId,
        mode: Mode,
        payload: Option<String>,
    ) -> Result<Self, StationError> {
        match (&mode, payload.as_deref()) {
            (Mode::Set, None | Some("")) => {
                return Err(StationError::invalid(command.wire(), InvalidReason::MissingPayload));
            }
            (_, Some(p)) if p.contains(['\n', '\r']) => {
                return Err(StationError::invalid(command.wire(), InvalidReason::MalformedPayload));
            }
            _ => {}
        }
        Ok(Self {
            tip,
            command,
            mode,
            payload,
        })
    }

    pub fn set(tip: TipIndex, command: CommandId, value: impl Into<String>) -> Result<Self, StationError> {
        Self::new(tip, command, Mode::Set, Some(value.into()))
    }

    pub fn get(tip: TipIndex, command: CommandId, argument: Option<&str>) -> Result<Self, StationError> {
        Self::new(tip, command, Mode::Get, argument.map(str::to_owned))
    }

    /// Serialize to the bytes written on the link.
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            Mode::Set => writeln!(
                f,
                "{}:{}:{}",
                self.tip,
                self.command,
                self.payload.as_deref().unwrap_or_default()
            ),
            Mode::Get => write!(
                f,
                "{}:{}:{}",
                self.tip,
                self.command,
                self.payload.as_deref().unwrap_or(QUERY)
            ),
        }
    }
}

fn device_error(command: CommandId, line: &str) -> Option<StationError> {
    line.strip_prefix(ERROR_PREFIX).map(|msg| StationError::Device {
        command,
        message: msg.to_string(),
    })
}

/// Classify the reply to a get. Surrounding whitespace is ignored.
pub fn classify_get(command: CommandId, line: &str) -> Result<String, StationError> {
    let value = line.trim();
    if let Some(err) = device_error(command, value) {
        return Err(err);
    }
    if value.is_empty() {
        return Err(StationError::Protocol(format!("empty response to {command}")));
    }
    Ok(value.to_string())
}

/// Classify the reply to a set. Only the exact token `OK` succeeds.
pub fn classify_set(command: CommandId, line: &str) -> Result<(), StationError> {
    let line = line.trim();
    if let Some(err) = device_error(command, line) {
        return Err(err);
    }
    if line == ACK {
        Ok(())
    } else {
        tracing::warn!(%command, response = line, "unexpected acknowledgement");
        Err(StationError::Protocol("unexpected response".into()))
    }
}

/// Decode a plain numeric reply.
pub fn parse_number(text: &str) -> Result<f64, StationError> {
    let t = text.trim();
    t.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| StationError::Protocol(format!("expected a number, got {t:?}")))
}

/// Decode a `0`/`1` flag.
pub fn parse_flag(text: &str) -> Result<bool, StationError> {
    match text.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(StationError::Protocol(format!("expected 0 or 1, got {other:?}"))),
    }
}

/// One calibration-table row: thermocouple voltage and reference temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationEntry {
    pub voltage_uv: f64,
    pub temperature_c: f64,
}

impl CalibrationEntry {
    pub fn new(voltage_uv: f64, temperature_c: f64) -> Self {
        Self {
            voltage_uv,
            temperature_c,
        }
    }

    /// Set payload for row `index`: `{index}[{v},{s}]`.
    pub fn payload(&self, index: usize) -> String {
        format!("{index}{self}")
    }
}

impl fmt::Display for CalibrationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.voltage_uv, self.temperature_c)
    }
}

impl FromStr for CalibrationEntry {
    type Err = StationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || StationError::Protocol(format!("malformed calibration entry {s:?}"));
        let inner = s
            .trim()
            .strip_prefix('[')
            .and_then(|r| r.strip_suffix(']'))
            .ok_or_else(bad)?;
        let (v, t) = inner.split_once(',').ok_or_else(bad)?;
        if t.contains(',') {
            return Err(bad());
        }
        let voltage_uv = parse_number(v).map_err(|_| bad())?;
        let temperature_c = parse_number(t).map_err(|_| bad())?;
        Ok(Self::new(voltage_uv, temperature_c))
    }
}
