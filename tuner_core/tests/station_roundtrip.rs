//! End-to-end against the simulated station.

use rstest::rstest;
use tuner_core::mocks::ScriptedPorts;
use tuner_core::{
    AcquisitionCfg, AcquisitionCycle, CalibrationEntry, CalibrationTable, CommandId, ConnectError,
    InvalidReason, StationClient, StationError, TipSettings, UnitMode, parse_number,
    restore_defaults, send_setpoint, set_enabled,
};
use tuner_hardware::{SIM_PORT_NAME, SimPorts};
use tuner_traits::ManualClock;

fn sim_client(tip: &str) -> StationClient<SimPorts> {
    let mut c = StationClient::new(SimPorts::default());
    c.connect(SIM_PORT_NAME).expect("connect sim");
    c.select_tip(tip).expect("tip");
    c
}

#[rstest]
#[case("pid_kp", "1.75")]
#[case("pid_ki", "0.02")]
#[case("pid_kd", "3")]
#[case("pid_d_tau", "0.5")]
#[case("set_min_t", "150")]
#[case("set_max_t", "420")]
#[case("runaway_t", "500")]
#[case("sleep_set_t", "180")]
#[case("sleep_delay", "60000")]
#[case("set_t", "300")]
fn set_then_get_round_trips(#[case] command: &str, #[case] value: &str) {
    let mut c = sim_client("AM120-1");
    c.set(command, value).unwrap();
    let back = c.get(command, None).unwrap();
    let expected: f64 = value.parse().unwrap();
    assert!((parse_number(&back).unwrap() - expected).abs() < 1e-9, "{command}: {back}");
}

#[test]
fn unknown_port_never_reaches_open() {
    let mut c = StationClient::new(SimPorts::default());
    assert_eq!(
        c.connect("/dev/ttyUSB0"),
        Err(ConnectError::PortUnavailable("/dev/ttyUSB0".into()))
    );
    assert!(!c.is_connected());
}

#[test]
fn refusals_carry_the_firmware_message() {
    let mut c = sim_client("T245");
    assert_eq!(
        c.set(CommandId::TempSet, 900).unwrap_err(),
        StationError::Device {
            command: CommandId::TempSet,
            message: "out of bounds".into()
        }
    );
    assert_eq!(
        c.set(CommandId::TempMeasure, 1).unwrap_err(),
        StationError::Device {
            command: CommandId::TempMeasure,
            message: "read only".into()
        }
    );
}

#[test]
fn settings_and_calibration_table_load() {
    let mut c = sim_client("C360");
    let s = TipSettings::load(&mut c).unwrap();
    assert!((s.temp_max - 400.0).abs() < 1e-9);
    assert!((s.d_tau - 0.25).abs() < 1e-9);

    let table = CalibrationTable::load(&mut c).unwrap();
    assert_eq!(table.len(), 10);
    assert_eq!(table.errors().count(), 0);
    let (i, last) = table.entries().last().unwrap();
    assert_eq!(i, 9);
    assert!((last.temperature_c - 450.0).abs() < 1e-9);
    assert!((last.voltage_uv - 18000.0).abs() < 1e-9);
}

#[test]
fn calibration_row_write_reads_back() {
    let mut c = sim_client("T245");
    let back = CalibrationTable::write_row(&mut c, 3, CalibrationEntry::new(6100.5, 151.0)).unwrap();
    assert_eq!(back, CalibrationEntry::new(6100.5, 151.0));

    let err = CalibrationTable::write_row(&mut c, 12, CalibrationEntry::new(1.0, 1.0)).unwrap_err();
    assert!(matches!(err, StationError::Device { ref message, .. } if message == "Invalid index"));
}

#[test]
fn calibration_rows_fail_independently() {
    let ports = ScriptedPorts::new(&["COM3"]);
    ports.reply("3").reply("[0.00,0.00]").reply("garbage").reply("[80.00,2.00]");
    let mut c = StationClient::new(ports);
    c.connect("COM3").unwrap();
    c.select_tip("T245").unwrap();

    let table = CalibrationTable::load(&mut c).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.entries().map(|(i, _)| i).collect::<Vec<_>>(), vec![0, 2]);
    assert_eq!(table.errors().map(|(i, _)| i).collect::<Vec<_>>(), vec![1]);
}

#[test]
fn restore_checks_the_constant_locally() {
    let ports = ScriptedPorts::new(&["COM3"]);
    let mut c = StationClient::new(ports.clone());
    c.connect("COM3").unwrap();
    c.select_tip("T245").unwrap();
    for bad in [0.0, -1.0, 40.5, f64::NAN] {
        let err = restore_defaults(&mut c, bad).unwrap_err();
        assert!(matches!(
            err,
            StationError::InvalidCommand { reason: InvalidReason::OutOfRange, .. }
        ));
    }
    assert!(ports.writes().is_empty());
}

#[test]
fn restore_resets_tuning_and_flags_reload() {
    let mut c = sim_client("AM120-2");
    c.set("pid_kp", 9).unwrap();
    c.take_tip_changed();
    restore_defaults(&mut c, 20.0).unwrap();
    assert!(c.take_tip_changed());
    assert_eq!(c.get("pid_kp", None).unwrap(), "0");
    assert_eq!(c.get("tc_cal_table", Some("9")).unwrap(), "[9000.00,450.00]");
}

#[test]
fn setpoint_follows_unit_mode() {
    let mut c = sim_client("T245");
    assert!((send_setpoint(&mut c, UnitMode::Temperature, 320.0).unwrap() - 320.0).abs() < 1e-9);
    let uv = send_setpoint(&mut c, UnitMode::Voltage, 8000.0).unwrap();
    assert!((uv - 8000.0).abs() < 1e-9);
    let t = parse_number(&c.get("set_t", None).unwrap()).unwrap();
    assert!((t - 200.0).abs() < 1e-6);
}

#[test]
fn enabled_station_heats_up_under_monitoring() {
    let mut c = sim_client("T245");
    set_enabled(&mut c, true).unwrap();
    let mut cyc = AcquisitionCycle::new(AcquisitionCfg::default(), ManualClock::new());

    let first = cyc.tick(&mut c).sample.unwrap();
    let mut last = first;
    for _ in 0..20 {
        last = cyc.tick(&mut c).sample.unwrap();
    }
    assert!(last.process_value > first.process_value);
    assert!(last.output < first.output);
    assert!((last.setpoint - 250.0).abs() < 1e-9);
}
