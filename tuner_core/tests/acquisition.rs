use std::collections::HashMap;
use std::time::Duration;

use tuner_core::mocks::ScriptedPorts;
use tuner_core::{
    AcquisitionCfg, AcquisitionCycle, CycleState, StationClient, StationError, TelemetrySample,
    UnitMode,
};
use tuner_traits::ManualClock;

/// Answers every get from a fixed table; sets are acknowledged.
fn station(values: &[(&str, &str)]) -> ScriptedPorts {
    let table: HashMap<String, String> = values
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let ports = ScriptedPorts::new(&["COM3"]);
    ports.respond_with(move |req| {
        let mut parts = req.splitn(3, ':');
        let _tip = parts.next()?;
        let cmd = parts.next()?;
        let arg = parts.next()?;
        if arg != "?" {
            return Some("OK".into());
        }
        Some(
            table
                .get(cmd)
                .cloned()
                .unwrap_or_else(|| "ERROR Unknown command".into()),
        )
    });
    ports
}

const HEALTHY: &[(&str, &str)] = &[
    ("meas_uv", "1200.00"),
    ("set_t", "250.00"),
    ("meas_t", "25.50"),
    ("set_uv", "9000.00"),
    ("en", "1"),
    ("sleep_state", "0"),
    ("pid_op", "0.4200"),
    ("pid_kp", "1.5"),
    ("pid_ki", "0.1"),
    ("pid_kd", "0"),
    ("pid_d_tau", "0.25"),
    ("set_min_t", "100"),
    ("set_max_t", "400"),
    ("runaway_t", "480"),
    ("sleep_set_t", "150"),
    ("sleep_delay", "30000"),
];

fn cycle(clock: &ManualClock) -> AcquisitionCycle<ManualClock> {
    AcquisitionCycle::new(AcquisitionCfg::default(), clock.clone())
}

fn client(ports: &ScriptedPorts) -> StationClient<ScriptedPorts> {
    let mut c = StationClient::new(ports.clone());
    c.connect("COM3").unwrap();
    c.select_tip("T245").unwrap();
    c
}

#[test]
fn idle_without_connection() {
    let ports = station(HEALTHY);
    let clock = ManualClock::new();
    let mut cyc = cycle(&clock);
    let mut c = StationClient::new(ports.clone());

    let r = cyc.tick(&mut c);
    assert_eq!(r.state, CycleState::Idle);
    assert_eq!(r.delay, Duration::from_millis(500));
    assert!(r.sample.is_none());

    c.connect("COM3").unwrap();
    let r = cyc.tick(&mut c);
    assert_eq!(r.state, CycleState::Idle, "no tip bound yet");
    assert!(ports.writes().is_empty());
}

#[test]
fn measured_temperature_becomes_process_value() {
    let ports = station(HEALTHY);
    let clock = ManualClock::new();
    let mut cyc = cycle(&clock);
    let mut c = client(&ports);

    let r = cyc.tick(&mut c);
    assert_eq!(r.state, CycleState::Active);
    assert_eq!(r.delay, Duration::from_millis(200));
    assert!(r.errors.is_empty(), "{:?}", r.errors);
    let s = r.sample.expect("sample");
    assert!((s.process_value - 25.50).abs() < 1e-9);
    assert!((s.setpoint - 250.0).abs() < 1e-9);
    assert!((s.output - 0.42).abs() < 1e-9);
    assert_eq!(r.enabled, Some(true));
    assert_eq!(r.sleeping, Some(false));
    assert_eq!(r.tc_voltage_avg, Some(1200.0));
    assert_eq!(cyc.series().latest(), Some(&s));
}

#[test]
fn first_tick_after_tip_change_reloads_settings() {
    let ports = station(HEALTHY);
    let clock = ManualClock::new();
    let mut cyc = cycle(&clock);
    let mut c = client(&ports);

    let r = cyc.tick(&mut c);
    let settings = r.reloaded.expect("reloaded");
    assert!((settings.kp - 1.5).abs() < 1e-9);
    assert!((settings.sleep_delay_ms - 30000.0).abs() < 1e-9);

    let r = cyc.tick(&mut c);
    assert!(r.reloaded.is_none());

    c.select_tip("C360").unwrap();
    ports.clear_writes();
    let r = cyc.tick(&mut c);
    assert!(r.reloaded.is_some());
    assert!(ports.writes().iter().all(|w| w.starts_with("3:")));
    assert_eq!(ports.writes()[0], "3:pid_kp:?");
}

#[test]
fn query_order_is_fixed() {
    let ports = station(HEALTHY);
    let clock = ManualClock::new();
    let mut cyc = cycle(&clock);
    let mut c = client(&ports);
    c.take_tip_changed();
    cyc.tick(&mut c);
    ports.clear_writes();

    cyc.tick(&mut c);
    assert_eq!(
        ports.writes(),
        vec!["0:meas_uv:?", "0:set_t:?", "0:meas_t:?", "0:en:?", "0:sleep_state:?", "0:pid_op:?"]
    );
}

#[test]
fn voltage_mode_uses_tc_reading_as_process_value() {
    let ports = station(HEALTHY);
    let clock = ManualClock::new();
    let mut cyc = cycle(&clock);
    let mut c = client(&ports);
    cyc.tick(&mut c);

    cyc.set_mode(UnitMode::Voltage);
    assert_eq!(cyc.series().len(), 100, "mode switch clears to zeros");
    ports.clear_writes();
    let s = cyc.tick(&mut c).sample.expect("sample");
    assert!((s.setpoint - 9000.0).abs() < 1e-9);
    assert!((s.process_value - 1200.0).abs() < 1e-9);
    assert!(!ports.writes().iter().any(|w| w.contains(":meas_t:")));
}

#[test]
fn elapsed_time_restarts_on_reset() {
    let ports = station(HEALTHY);
    let clock = ManualClock::new();
    let mut cyc = cycle(&clock);
    let mut c = client(&ports);
    cyc.tick(&mut c);

    clock.advance(Duration::from_millis(1500));
    let s = cyc.tick(&mut c).sample.unwrap();
    assert!((s.elapsed_s - 1.5).abs() < 1e-6);

    cyc.reset();
    clock.advance(Duration::from_millis(200));
    let s = cyc.tick(&mut c).sample.unwrap();
    assert!((s.elapsed_s - 0.2).abs() < 1e-6);
}

#[test]
fn partial_failure_reports_errors_and_appends_nothing() {
    let mut values = HEALTHY.to_vec();
    values.retain(|(k, _)| *k != "pid_op");
    let ports = station(&values);
    let clock = ManualClock::new();
    let mut cyc = cycle(&clock);
    let mut c = client(&ports);
    c.take_tip_changed();

    let r = cyc.tick(&mut c);
    assert_eq!(r.state, CycleState::Active);
    assert!(r.sample.is_none());
    assert_eq!(r.enabled, Some(true));
    assert!(matches!(
        r.errors.as_slice(),
        [StationError::Device { message, .. }] if message == "Unknown command"
    ));
    assert_eq!(r.delay, Duration::from_millis(200));
    assert!(cyc.series().samples().all(|s| *s == TelemetrySample::ZERO));
}

#[test]
fn silent_station_drops_the_link_and_goes_idle() {
    let ports = ScriptedPorts::new(&["COM3"]);
    let clock = ManualClock::new();
    let mut cyc = cycle(&clock);
    let mut c = client(&ports);
    c.take_tip_changed();

    let r = cyc.tick(&mut c);
    assert_eq!(r.state, CycleState::Active);
    assert!(r.sample.is_none());
    assert!(matches!(
        r.errors.as_slice(),
        [StationError::Protocol(m)] if m.contains("timeout")
    ));
    assert!(!c.is_connected());
    assert_eq!(ports.writes().len(), 1);

    let r = cyc.tick(&mut c);
    assert_eq!(r.state, CycleState::Idle);
    assert!(r.errors.is_empty());
}

#[test]
fn truncated_reply_mid_tick_appends_nothing() {
    let ports = station(HEALTHY);
    let clock = ManualClock::new();
    let mut cyc = cycle(&clock);
    let mut c = client(&ports);
    c.take_tip_changed();
    assert!(cyc.tick(&mut c).sample.is_some());
    let before: Vec<TelemetrySample> = cyc.series().samples().copied().collect();

    // meas_uv answers normally, set_t is cut off
    ports.reply("1000").partial("25");
    let r = cyc.tick(&mut c);
    assert!(r.sample.is_none());
    assert_eq!(r.tc_voltage, Some(1000.0));
    assert!(matches!(
        r.errors.as_slice(),
        [StationError::Protocol(m)] if m.contains("truncated")
    ));
    assert!(!c.is_connected());
    assert_eq!(cyc.series().samples().copied().collect::<Vec<_>>(), before);
}

#[test]
fn moving_average_uses_configured_window() {
    let ports = ScriptedPorts::new(&["COM3"]);
    let readings = ["100", "200", "300", "400"];
    let mut n = 0usize;
    ports.respond_with(move |req| {
        let cmd = req.split(':').nth(1)?;
        Some(match cmd {
            "meas_uv" => {
                let v = readings[n % readings.len()];
                n += 1;
                v.to_string()
            }
            "en" | "sleep_state" => "0".into(),
            _ => "1".into(),
        })
    });
    let clock = ManualClock::new();
    let cfg = AcquisitionCfg {
        average_window: 2,
        ..AcquisitionCfg::default()
    };
    let mut cyc = AcquisitionCycle::new(cfg, clock);
    let mut c = client(&ports);
    c.take_tip_changed();

    let avgs: Vec<Option<f64>> = (0..4).map(|_| cyc.tick(&mut c).tc_voltage_avg).collect();
    assert_eq!(avgs, vec![Some(100.0), Some(150.0), Some(250.0), Some(350.0)]);
}

#[test]
fn disconnect_goes_idle_and_reconnect_resets() {
    let ports = station(HEALTHY);
    let clock = ManualClock::new();
    let mut cyc = cycle(&clock);
    let mut c = client(&ports);
    for _ in 0..3 {
        cyc.tick(&mut c);
    }
    c.disconnect();
    assert_eq!(cyc.tick(&mut c).state, CycleState::Idle);

    c.connect("COM3").unwrap();
    let r = cyc.tick(&mut c);
    assert_eq!(r.state, CycleState::Active);
    let zeros = cyc
        .series()
        .samples()
        .filter(|s| **s == TelemetrySample::ZERO)
        .count();
    assert_eq!(zeros, 99);
}

#[test]
fn resize_keeps_recent_samples() {
    let ports = station(HEALTHY);
    let clock = ManualClock::new();
    let mut cyc = cycle(&clock);
    let mut c = client(&ports);
    cyc.tick(&mut c);
    cyc.resize(150);
    assert_eq!(cyc.series().capacity(), 150);
    assert_eq!(cyc.series().len(), 150);
    assert_eq!(cyc.config().record_length, 150);
    assert!((cyc.series().latest().unwrap().process_value - 25.5).abs() < 1e-9);
}
