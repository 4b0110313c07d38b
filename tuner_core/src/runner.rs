//! Cooperative monitor loop: refresh ports, tick, report, sleep.
//!
//! Everything runs on the calling thread. Other callers that want to talk to
//! the station in between go through the same [`SharedStation`] lock.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tuner_traits::{Clock, PortProvider};

use crate::acquisition::{AcquisitionCycle, TickReport};
use crate::client::SharedStation;
use crate::telemetry::TelemetrySeries;

/// Stop conditions for [`run_monitor`].
#[derive(Debug, Default, Clone)]
pub struct MonitorOpts {
    /// Stop after this many ticks.
    pub max_ticks: Option<u64>,
    /// Stop once this flag is set (e.g. from a Ctrl-C handler).
    pub shutdown: Option<Arc<AtomicBool>>,
}

impl MonitorOpts {
    fn should_stop(&self, ticks: u64) -> bool {
        self.max_ticks.is_some_and(|max| ticks >= max)
            || self
                .shutdown
                .as_ref()
                .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSummary {
    pub ticks: u64,
    pub samples: u64,
    pub errors: u64,
}

/// What the callback sees on every pass.
pub struct MonitorView<'a> {
    pub report: &'a TickReport,
    pub series: &'a TelemetrySeries,
    /// Current port listing; `None` when enumeration failed.
    pub ports: Option<&'a [String]>,
}

/// Drive `cycle` until the callback breaks, the tick budget is spent or
/// the shutdown flag is raised.
pub fn run_monitor<P, C, F>(
    station: &SharedStation<P>,
    cycle: &mut AcquisitionCycle<C>,
    opts: &MonitorOpts,
    mut on_tick: F,
) -> MonitorSummary
where
    P: PortProvider,
    C: Clock,
    F: FnMut(MonitorView<'_>) -> ControlFlow<()>,
{
    let mut summary = MonitorSummary::default();
    let mut last_ports: Option<Vec<String>> = None;

    while !opts.should_stop(summary.ticks) {
        let (ports, report) = station.with(|client| {
            let ports = match client.available_ports() {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(error = %e, "port refresh failed");
                    None
                }
            };
            if let (Some(list), Some(current)) = (&ports, client.port_name())
                && !list.iter().any(|p| p == current)
            {
                tracing::warn!(port = current, "connected port no longer listed");
            }
            (ports, cycle.tick(client))
        });

        if ports.is_some() && ports != last_ports {
            tracing::debug!(ports = ?ports, "port list changed");
            last_ports.clone_from(&ports);
        }

        summary.ticks += 1;
        summary.samples += u64::from(report.sample.is_some());
        summary.errors += report.errors.len() as u64;

        let view = MonitorView {
            report: &report,
            series: cycle.series(),
            ports: ports.as_deref(),
        };
        if on_tick(view).is_break() {
            break;
        }
        if opts.should_stop(summary.ticks) {
            break;
        }
        cycle.clock().sleep(report.delay);
    }

    tracing::info!(
        ticks = summary.ticks,
        samples = summary.samples,
        errors = summary.errors,
        "monitor stopped"
    );
    summary
}
