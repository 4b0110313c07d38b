//! The polling cycle feeding the telemetry series.
//!
//! One tick issues a fixed, ordered set of queries, folds the answers into
//! the series and tells the caller how long to wait before the next tick.

use std::time::{Duration, Instant};

use tuner_traits::{Clock, PortProvider};

use crate::average::MovingAverage;
use crate::client::StationClient;
use crate::command::CommandId;
use crate::config::AcquisitionCfg;
use crate::error::{Result, StationError};
use crate::settings::{TipSettings, UnitMode};
use crate::telemetry::{TelemetrySample, TelemetrySeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Not connected or no tip bound.
    Idle,
    Active,
}

/// What one tick observed.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub state: CycleState,
    /// Recommended wait before the next tick.
    pub delay: Duration,
    /// Appended to the series only when setpoint, process value and output all arrived.
    pub sample: Option<TelemetrySample>,
    pub tc_voltage: Option<f64>,
    pub tc_voltage_avg: Option<f64>,
    pub enabled: Option<bool>,
    pub sleeping: Option<bool>,
    /// Present when the tick reloaded tip-scoped settings.
    pub reloaded: Option<TipSettings>,
    pub errors: Vec<StationError>,
}

impl TickReport {
    fn idle(delay: Duration) -> Self {
        Self {
            state: CycleState::Idle,
            delay,
            sample: None,
            tc_voltage: None,
            tc_voltage_avg: None,
            enabled: None,
            sleeping: None,
            reloaded: None,
            errors: Vec::new(),
        }
    }
}

/// Run one query while the link is up. After a link failure the client has
/// disconnected, and the rest of the tick is skipped without more errors.
fn query<P: PortProvider, T>(
    client: &mut StationClient<P>,
    errors: &mut Vec<StationError>,
    f: impl FnOnce(&mut StationClient<P>) -> Result<T>,
) -> Option<T> {
    if !client.is_connected() {
        return None;
    }
    match f(client) {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

pub struct AcquisitionCycle<C: Clock> {
    cfg: AcquisitionCfg,
    clock: C,
    state: CycleState,
    mode: UnitMode,
    series: TelemetrySeries,
    tc_average: MovingAverage,
    epoch: Instant,
}

impl<C: Clock> AcquisitionCycle<C> {
    pub fn new(cfg: AcquisitionCfg, clock: C) -> Self {
        let epoch = clock.now();
        Self {
            mode: cfg.mode,
            series: TelemetrySeries::new(cfg.record_length),
            tc_average: MovingAverage::new(cfg.average_window),
            state: CycleState::Idle,
            cfg,
            clock,
            epoch,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn mode(&self) -> UnitMode {
        self.mode
    }

    pub fn series(&self) -> &TelemetrySeries {
        &self.series
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &AcquisitionCfg {
        &self.cfg
    }

    /// Restart elapsed time and refill the series with zeros.
    pub fn reset(&mut self) {
        self.epoch = self.clock.now();
        self.series.clear();
        tracing::debug!(capacity = self.series.capacity(), "acquisition reset");
    }

    /// Switch unit mode. Changing mode resets the record.
    pub fn set_mode(&mut self, mode: UnitMode) {
        if mode != self.mode {
            tracing::info!(from = %self.mode, to = %mode, "unit mode switched");
            self.mode = mode;
            self.reset();
        }
    }

    pub fn set_scan_interval(&mut self, interval: Duration) {
        self.cfg.scan_interval = interval;
    }

    /// Change the record length; see [`TelemetrySeries::resize`].
    pub fn resize(&mut self, record_length: usize) {
        self.series.resize(record_length);
        if record_length > 0 {
            self.cfg.record_length = record_length;
        }
    }

    pub fn tick<P: PortProvider>(&mut self, client: &mut StationClient<P>) -> TickReport {
        if !client.is_connected() || client.tip().is_none() {
            if self.state == CycleState::Active {
                tracing::info!("acquisition idle");
                self.state = CycleState::Idle;
            }
            return TickReport::idle(self.cfg.idle_interval);
        }

        if self.state == CycleState::Idle {
            tracing::info!(tip = ?client.tip(), mode = %self.mode, "acquisition active");
            self.state = CycleState::Active;
            self.tc_average.clear();
            self.reset();
        }

        let mut errors = Vec::new();

        let reloaded = if client.take_tip_changed() {
            self.reset();
            query(client, &mut errors, TipSettings::load)
        } else {
            None
        };

        let tc = query(client, &mut errors, |c| c.get_number(CommandId::TcVoltageMeasure));
        let (sp, pv) = match self.mode {
            UnitMode::Temperature => (
                query(client, &mut errors, |c| c.get_number(CommandId::TempSet)),
                query(client, &mut errors, |c| c.get_number(CommandId::TempMeasure)),
            ),
            UnitMode::Voltage => (
                query(client, &mut errors, |c| c.get_number(CommandId::TcVoltageSetpoint)),
                tc,
            ),
        };
        let enabled = query(client, &mut errors, |c| c.get_flag(CommandId::Enable));
        let sleeping = query(client, &mut errors, |c| c.get_flag(CommandId::SleepState));
        let op = query(client, &mut errors, |c| c.get_number(CommandId::PidOutput));
        let elapsed_s = self.clock.secs_since(self.epoch);

        let tc_voltage_avg = match tc {
            Some(v) => Some(self.tc_average.push(v)),
            None => self.tc_average.average(),
        };

        let sample = match (sp, pv, op) {
            (Some(sp), Some(pv), Some(op)) => {
                let s = TelemetrySample::new(sp, pv, op, elapsed_s);
                self.series.append(s);
                Some(s)
            }
            _ => None,
        };

        if !errors.is_empty() {
            tracing::warn!(count = errors.len(), first = %errors[0], "tick completed with errors");
        }
        tracing::trace!(?sample, ?tc_voltage_avg, "tick");

        TickReport {
            state: CycleState::Active,
            delay: self.cfg.scan_interval,
            sample,
            tc_voltage: tc,
            tc_voltage_avg,
            enabled,
            sleeping,
            reloaded,
            errors,
        }
    }
}
