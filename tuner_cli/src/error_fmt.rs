//! Human-readable error descriptions and structured JSON error formatting.

use tuner_core::{ConnectError, InvalidReason, StationError, TipError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ce) = err.downcast_ref::<ConnectError>() {
        return match ce {
            ConnectError::PortUnavailable(port) => format!(
                "What happened: Port {port} is not in the current port list.\nLikely causes: Station unplugged, wrong port name, or the port was renamed after a replug.\nHow to fix: Run `station-tuner ports` and pass one of the listed names with --port (or `--port sim` to rehearse)."
            ),
            ConnectError::OpenFailed { port, reason } => format!(
                "What happened: Port {port} is listed but could not be opened ({reason}).\nLikely causes: Another program holds the port, or missing permissions.\nHow to fix: Close other serial monitors; on Linux add your user to the dialout group."
            ),
            ConnectError::ListingFailed(reason) => format!(
                "What happened: The list of serial ports could not be read ({reason}).\nLikely causes: Missing permissions on the platform's device listing.\nHow to fix: Check access to /dev and /sys/class/tty, or use `--port sim` to rehearse."
            ),
        };
    }

    if let Some(TipError::Unknown(tip)) = err.downcast_ref::<TipError>() {
        return format!(
            "What happened: Unknown tip {tip:?}.\nLikely causes: Typo in --tip or tip.default.\nHow to fix: Use one of T245, AM120-1, AM120-2, C360 or an index 0..3."
        );
    }

    if let Some(se) = err.downcast_ref::<StationError>() {
        return match se {
            StationError::Device { command, message } => format!(
                "What happened: The station refused {command}: {message}.\nLikely causes: Value outside the tip's limits, read-only parameter, or malformed value.\nHow to fix: Check limits with `station-tuner settings` and retry with a value in range."
            ),
            StationError::Protocol(reason) if reason.contains("timeout") => {
                "What happened: The station did not answer within the read timeout.\nLikely causes: Wrong port, station powered off, or baud rate mismatch.\nHow to fix: Check the cable and power, confirm link.baud = 152000, or raise link.read_timeout_ms.".to_string()
            }
            StationError::Protocol(reason) => format!(
                "What happened: Unexpected reply from the station ({reason}).\nLikely causes: Line noise, firmware mismatch, or another program writing to the port.\nHow to fix: Reconnect and retry; if it persists re-run with --log-level=trace to see the raw exchange."
            ),
            StationError::InvalidCommand { command, reason } => match reason {
                InvalidReason::Unknown => format!(
                    "What happened: `{command}` is not a station command.\nLikely causes: Typo in the parameter name.\nHow to fix: Use a wire identifier such as set_t, meas_t, pid_kp, pid_ki, pid_kd, pid_d_tau, sleep_set_t, tc_cal_table."
                ),
                InvalidReason::OutOfRange => format!(
                    "What happened: Value for {command} is out of range.\nLikely causes: The thermocouple constant must lie in (0, 40] µV/K.\nHow to fix: Pass a value such as --tc-constant 40."
                ),
                other => format!(
                    "What happened: Request {command} was not sent ({other}).\nLikely causes: Missing connection, tip or value.\nHow to fix: Pass --port and --tip, and a value for set requests."
                ),
            },
            StationError::Busy => {
                "What happened: Another request was in flight.\nLikely causes: Concurrent access to the same station.\nHow to fix: Retry once the other operation has finished.".to_string()
            }
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("no port given") {
        return "What happened: No port to connect to.\nLikely causes: Neither --port nor link.port in the config is set.\nHow to fix: Pass --port NAME (see `station-tuner ports`) or --port sim.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range or misspelled values in the TOML.\nHow to fix: Edit the config file and try again. See etc/tuner.toml for a sample."
        );
    }

    // Calibration CSV header special-case
    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'index,voltage_uv,temperature_c'.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 protocol, 4 connect, 5 invalid command/tip, 6 device refusal, else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<ConnectError>().is_some() {
        return 4;
    }
    if err.downcast_ref::<TipError>().is_some() {
        return 5;
    }
    if let Some(se) = err.downcast_ref::<StationError>() {
        return match se {
            StationError::Device { .. } => 6,
            StationError::Protocol(_) | StationError::Busy => 3,
            StationError::InvalidCommand { .. } => 5,
        };
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(ce) = err.downcast_ref::<ConnectError>() {
        return match ce {
            ConnectError::PortUnavailable(_) => "PortUnavailable",
            ConnectError::OpenFailed { .. } => "OpenFailed",
            ConnectError::ListingFailed(_) => "ListingFailed",
        };
    }
    if err.downcast_ref::<TipError>().is_some() {
        return "UnknownTip";
    }
    match err.downcast_ref::<StationError>() {
        Some(StationError::Device { .. }) => "Device",
        Some(StationError::Protocol(_)) => "Protocol",
        Some(StationError::InvalidCommand { .. }) => "InvalidCommand",
        Some(StationError::Busy) => "Busy",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    if let Some(StationError::Device { command, message }) = err.downcast_ref::<StationError>() {
        obj["details"] = json!({ "command": command.wire(), "device_message": message });
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tuner_core::CommandId;

    fn device() -> StationError {
        StationError::Device {
            command: CommandId::TempSet,
            message: "out of bounds".into(),
        }
    }

    #[rstest]
    #[case(eyre::Report::new(device()), 6)]
    #[case(eyre::Report::new(StationError::Protocol("unexpected response".into())), 3)]
    #[case(eyre::Report::new(ConnectError::PortUnavailable("COM9".into())), 4)]
    #[case(eyre::Report::new(ConnectError::ListingFailed("denied".into())), 4)]
    #[case(eyre::Report::new(TipError::Unknown("X".into())), 5)]
    #[case(eyre::eyre!("something else"), 1)]
    fn exit_codes_are_stable(#[case] err: eyre::Report, #[case] code: i32) {
        assert_eq!(exit_code_for_error(&err), code);
    }

    #[test]
    fn wrapped_errors_keep_their_code() {
        use eyre::WrapErr;
        let r: eyre::Result<()> = Err(device()).wrap_err("set set_t");
        let err = r.unwrap_err();
        assert_eq!(exit_code_for_error(&err), 6);
        assert!(humanize(&err).contains("refused set_t: out of bounds"));
    }

    #[test]
    fn json_error_carries_device_details() {
        let v: serde_json::Value =
            serde_json::from_str(&format_error_json(&eyre::Report::new(device()))).unwrap();
        assert_eq!(v["reason"], "Device");
        assert_eq!(v["exit_code"], 6);
        assert_eq!(v["details"]["command"], "set_t");
        assert_eq!(v["details"]["device_message"], "out of bounds");
    }

    #[test]
    fn timeouts_get_their_own_hint() {
        let err = eyre::Report::new(StationError::Protocol("no response from station (timeout)".into()));
        assert!(humanize(&err).contains("did not answer"));
    }
}
