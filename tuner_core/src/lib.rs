#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Station protocol and live telemetry (transport-agnostic).
//!
//! All device I/O goes through `tuner_traits::Transport`, opened by a
//! `tuner_traits::PortProvider`.
//!
//! ## Architecture
//!
//! - **Command set**: wire identifiers and the tip table (`command` module)
//! - **Protocol**: request encoding, reply classification, value decoding (`protocol`)
//! - **Client**: connect/select tip/get/set, one exchange at a time (`client`)
//! - **Telemetry**: rolling sample record and moving average (`telemetry`, `average`)
//! - **Acquisition**: the per-tick polling sequence and its runner (`acquisition`, `runner`)
//! - **Settings**: tip-scoped parameters and the calibration table (`settings`)

pub mod acquisition;
pub mod average;
pub mod client;
pub mod command;
pub mod config;
pub mod conversions;
pub mod error;
pub mod link_error;
pub mod mocks;
pub mod protocol;
pub mod runner;
pub mod settings;
pub mod telemetry;

pub use acquisition::{AcquisitionCycle, CycleState, TickReport};
pub use average::MovingAverage;
pub use client::{SharedStation, StationClient};
pub use command::{CommandId, TipIndex, TipRef, is_valid, tip_index_of, tip_name_of};
pub use config::{AcquisitionCfg, LinkCfg};
pub use error::{ConnectError, InvalidReason, StationError, TipError};
pub use protocol::{CalibrationEntry, Request, parse_flag, parse_number};
pub use runner::{MonitorOpts, MonitorSummary, MonitorView, run_monitor};
pub use settings::{CalibrationTable, TipSettings, UnitMode, restore_defaults, send_setpoint, set_enabled};
pub use telemetry::{TelemetrySample, TelemetrySeries};
