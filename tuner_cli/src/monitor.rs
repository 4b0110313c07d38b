//! `monitor`: run the acquisition loop until Ctrl-C or a tick budget.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::json;
use tuner_core::{
    AcquisitionCfg, AcquisitionCycle, CycleState, MonitorOpts, MonitorView, SharedStation,
    TickReport, run_monitor,
};
use tuner_hardware::StationPorts;
use tuner_traits::MonotonicClock;

use crate::commands::Station;

fn state_label(r: &TickReport) -> &'static str {
    match (r.sleeping, r.enabled) {
        (Some(true), _) => "SLEEP",
        (_, Some(true)) => "ON",
        (_, Some(false)) => "OFF",
        _ => "?",
    }
}

fn print_tick(view: &MonitorView<'_>, json: bool) {
    let r = view.report;
    if json {
        let errors: Vec<String> = r.errors.iter().map(ToString::to_string).collect();
        let line = json!({
            "state": if r.state == CycleState::Active { "active" } else { "idle" },
            "t": r.sample.map(|s| s.elapsed_s),
            "sp": r.sample.map(|s| s.setpoint),
            "pv": r.sample.map(|s| s.process_value),
            "op": r.sample.map(|s| s.output),
            "tc_uv": r.tc_voltage,
            "tc_uv_avg": r.tc_voltage_avg,
            "enabled": r.enabled,
            "sleeping": r.sleeping,
            "reloaded": r.reloaded.is_some(),
            "errors": errors,
        });
        println!("{line}");
        return;
    }
    if r.state == CycleState::Idle {
        println!("idle");
        return;
    }
    if let Some(s) = &r.reloaded {
        println!(
            "tip settings: kp={} ki={} kd={} d_tau={}",
            s.kp, s.ki, s.kd, s.d_tau
        );
    }
    match r.sample {
        Some(s) => println!(
            "t={:>7.1}s sp={:>8.2} pv={:>8.2} op={:.4} tc_avg={:>8.2} {}",
            s.elapsed_s,
            s.setpoint,
            s.process_value,
            s.output,
            r.tc_voltage_avg.unwrap_or(f64::NAN),
            state_label(r)
        ),
        None => println!("(no sample)"),
    }
    for e in &r.errors {
        eprintln!("warning: {e}");
    }
}

pub struct MonitorArgs {
    pub cfg: AcquisitionCfg,
    pub ticks: Option<u64>,
}

pub fn run(client: Station, args: MonitorArgs, json: bool) -> eyre::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        if let Err(e) = ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        }) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    let station: SharedStation<StationPorts> = SharedStation::new(client);
    let mut cycle = AcquisitionCycle::new(args.cfg, MonotonicClock::new());
    let opts = MonitorOpts {
        max_ticks: args.ticks,
        shutdown: Some(Arc::clone(&shutdown)),
    };
    tracing::info!(
        scan_ms = args.cfg.scan_interval.as_millis() as u64,
        record_length = args.cfg.record_length,
        mode = %args.cfg.mode,
        "monitor start"
    );

    let summary = run_monitor(&station, &mut cycle, &opts, |view| {
        print_tick(&view, json);
        if view.report.state == CycleState::Idle {
            // nothing reconnects a one-shot console
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    });

    station.with(|c| c.disconnect());
    if json {
        println!(
            "{}",
            json!({ "summary": { "ticks": summary.ticks, "samples": summary.samples, "errors": summary.errors } })
        );
    } else {
        println!(
            "{} ticks, {} samples, {} errors",
            summary.ticks, summary.samples, summary.errors
        );
    }
    if summary.ticks > 0 && summary.samples == 0 {
        eyre::bail!("monitor collected no samples");
    }
    Ok(())
}

/// Scan interval from `--scan-ms`, rejecting values the station cannot keep up with.
pub fn scan_interval(ms: u64) -> eyre::Result<Duration> {
    if ms < 10 {
        eyre::bail!("--scan-ms must be >= 10");
    }
    Ok(Duration::from_millis(ms))
}
