//! Tip-scoped parameters: tuning, limits, sleep behaviour and the
//! thermocouple calibration table.

use tuner_traits::PortProvider;

use crate::client::StationClient;
use crate::command::CommandId;
use crate::error::{InvalidReason, Result, StationError};
use crate::protocol::{CalibrationEntry, parse_number};

/// Unit the setpoint and process value are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum UnitMode {
    /// °C; setpoint `set_t`, process value `meas_t`.
    #[default]
    Temperature,
    /// µV; setpoint `set_uv`, process value is the thermocouple reading.
    Voltage,
}

impl UnitMode {
    pub fn setpoint_command(self) -> CommandId {
        match self {
            UnitMode::Temperature => CommandId::TempSet,
            UnitMode::Voltage => CommandId::TcVoltageSetpoint,
        }
    }
}

/// Everything shown for a tip besides live telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TipSettings {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub d_tau: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub temp_runaway: f64,
    pub sleep_temp: f64,
    pub sleep_delay_ms: f64,
}

impl TipSettings {
    /// Read all tip-scoped parameters from the bound tip. Stops at the first failure.
    pub fn load<P: PortProvider>(client: &mut StationClient<P>) -> Result<Self> {
        let s = Self {
            kp: client.get_number(CommandId::PidKp)?,
            ki: client.get_number(CommandId::PidKi)?,
            kd: client.get_number(CommandId::PidKd)?,
            d_tau: client.get_number(CommandId::PidDerivativeFilterTime)?,
            temp_min: client.get_number(CommandId::TempSetMin)?,
            temp_max: client.get_number(CommandId::TempSetMax)?,
            temp_runaway: client.get_number(CommandId::TempRunaway)?,
            sleep_temp: client.get_number(CommandId::SleepTemp)?,
            sleep_delay_ms: client.get_number(CommandId::SleepDelay)?,
        };
        tracing::debug!(?s, "tip settings loaded");
        Ok(s)
    }
}

/// The thermocouple calibration table as read from the station.
///
/// Rows that failed to read keep their error so the rest of the table is
/// still usable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalibrationTable {
    pub rows: Vec<std::result::Result<CalibrationEntry, StationError>>,
}

impl CalibrationTable {
    pub fn load<P: PortProvider>(client: &mut StationClient<P>) -> Result<Self> {
        let count = client.get_number(CommandId::CalTcTable)?;
        if count < 0.0 || count.fract() != 0.0 || count > f64::from(u16::MAX) {
            return Err(StationError::Protocol(format!(
                "calibration table size {count} is not a row count"
            )));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = count as usize;
        let rows = (0..count)
            .map(|i| {
                let row = client
                    .get(CommandId::CalTcTable, Some(&i.to_string()))
                    .and_then(|text| text.parse::<CalibrationEntry>());
                if let Err(e) = &row {
                    tracing::warn!(index = i, error = %e, "calibration row unreadable");
                }
                row
            })
            .collect();
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows that were read successfully, with their index.
    pub fn entries(&self) -> impl Iterator<Item = (usize, CalibrationEntry)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().ok().map(|e| (i, *e)))
    }

    pub fn errors(&self) -> impl Iterator<Item = (usize, &StationError)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().err().map(|e| (i, e)))
    }

    /// Write one row and return the station's read-back of it.
    pub fn write_row<P: PortProvider>(
        client: &mut StationClient<P>,
        index: usize,
        entry: CalibrationEntry,
    ) -> Result<CalibrationEntry> {
        client.set(CommandId::CalTcTable, entry.payload(index))?;
        client
            .get(CommandId::CalTcTable, Some(&index.to_string()))?
            .parse()
    }
}

/// Largest thermocouple constant the station accepts, µV/K.
pub const MAX_TC_CONSTANT: f64 = 40.0;

/// Reset tuning, limits and the calibration table of the bound tip.
///
/// `tc_constant` seeds the default calibration table and must lie in (0, 40].
pub fn restore_defaults<P: PortProvider>(client: &mut StationClient<P>, tc_constant: f64) -> Result<()> {
    if !(tc_constant > 0.0 && tc_constant <= MAX_TC_CONSTANT) {
        return Err(StationError::InvalidCommand {
            command: CommandId::RestoreDefaults.to_string(),
            reason: InvalidReason::OutOfRange,
        });
    }
    client.set(CommandId::RestoreDefaults, tc_constant)?;
    client.mark_tip_changed();
    tracing::info!(tip = ?client.tip(), tc_constant, "defaults restored");
    Ok(())
}

/// Send a new setpoint in `mode` units and return the read-back value.
pub fn send_setpoint<P: PortProvider>(client: &mut StationClient<P>, mode: UnitMode, value: f64) -> Result<f64> {
    let echoed = client.write_and_confirm(mode.setpoint_command(), value)?;
    parse_number(&echoed)
}

pub fn set_enabled<P: PortProvider>(client: &mut StationClient<P>, on: bool) -> Result<()> {
    client.set(CommandId::Enable, u8::from(on))
}
