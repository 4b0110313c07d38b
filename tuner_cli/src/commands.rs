//! One-shot subcommands: open the station, run one request/confirm cycle, print.

use eyre::WrapErr;
use serde_json::json;
use tuner_core::{
    CalibrationEntry, CalibrationTable, CommandId, LinkCfg, StationClient, TipSettings, UnitMode,
    restore_defaults, send_setpoint, set_enabled,
};
use tuner_hardware::{SIM_PORT_NAME, SerialPorts, StationPorts};
use tuner_traits::PortProvider;

use crate::cli::{CalAction, Cli, OnOff};

pub type Station = StationClient<StationPorts>;

/// Connect to the configured port, bind the tip and probe the link once.
///
/// A probe failure disconnects before the error is returned.
pub fn open_station(cli: &Cli, cfg: &tuner_config::Config) -> eyre::Result<Station> {
    let port = cli
        .port
        .clone()
        .or_else(|| cfg.link.port.clone())
        .ok_or_else(|| eyre::eyre!("no port given: pass --port or set link.port"))?;
    let tip = cli.tip.as_deref().unwrap_or(&cfg.tip.default);

    let ports = StationPorts::new(port != SIM_PORT_NAME);
    let mut client = StationClient::with_link(ports, LinkCfg::from(&cfg.link));
    client.connect(&port)?;
    client.select_tip(tip.trim())?;
    if let Err(e) = client.get(CommandId::Enable, None) {
        client.disconnect();
        return Err(e).wrap_err_with(|| format!("station on {port} did not answer the probe"));
    }
    tracing::info!(port = %port, tip = tip, "station ready");
    Ok(client)
}

fn tip_name(client: &Station) -> &'static str {
    client.tip().map_or("?", |t| t.name())
}

pub fn ports(json: bool) -> eyre::Result<()> {
    let mut names = match SerialPorts.available_ports() {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "serial port enumeration failed");
            Vec::new()
        }
    };
    names.push(SIM_PORT_NAME.to_string());
    if json {
        println!("{}", json!({ "ports": names }));
    } else {
        for n in names {
            println!("{n}");
        }
    }
    Ok(())
}

pub fn get(client: &mut Station, command: &str, arg: Option<&str>, json: bool) -> eyre::Result<()> {
    let value = client.get(command, arg)?;
    if json {
        println!(
            "{}",
            json!({ "tip": tip_name(client), "command": command, "arg": arg, "value": value })
        );
    } else {
        println!("{value}");
    }
    Ok(())
}

/// Commands whose value cannot be read back with `?`.
fn write_only(command: &str) -> bool {
    matches!(
        command.parse::<CommandId>(),
        Ok(CommandId::RestoreDefaults | CommandId::CalTcTable)
    )
}

pub fn set(client: &mut Station, command: &str, value: &str, json: bool) -> eyre::Result<()> {
    let echoed = if write_only(command) {
        client.set(command, value)?;
        None
    } else {
        Some(client.write_and_confirm(command, value)?)
    };
    if json {
        println!(
            "{}",
            json!({ "tip": tip_name(client), "command": command, "sent": value, "value": echoed })
        );
    } else {
        println!("{}", echoed.as_deref().unwrap_or("OK"));
    }
    Ok(())
}

pub fn setpoint(client: &mut Station, mode: UnitMode, value: f64, json: bool) -> eyre::Result<()> {
    let echoed = send_setpoint(client, mode, value)?;
    if json {
        println!("{}", json!({ "tip": tip_name(client), "mode": mode.to_string(), "setpoint": echoed }));
    } else {
        println!("{echoed:.2}");
    }
    Ok(())
}

pub fn enable(client: &mut Station, state: OnOff, json: bool) -> eyre::Result<()> {
    set_enabled(client, state == OnOff::On)?;
    let on = client.get_flag(CommandId::Enable)?;
    if json {
        println!("{}", json!({ "tip": tip_name(client), "enabled": on }));
    } else {
        println!("{}", if on { "on" } else { "off" });
    }
    Ok(())
}

fn settings_json(s: &TipSettings) -> serde_json::Value {
    json!({
        "pid": { "kp": s.kp, "ki": s.ki, "kd": s.kd, "d_tau": s.d_tau },
        "limits": { "temp_min": s.temp_min, "temp_max": s.temp_max, "temp_runaway": s.temp_runaway },
        "sleep": { "temp": s.sleep_temp, "delay_ms": s.sleep_delay_ms },
    })
}

pub fn settings(client: &mut Station, json: bool) -> eyre::Result<()> {
    let s = TipSettings::load(client)?;
    let mut doc = settings_json(&s);
    if json {
        doc["tip"] = json!(tip_name(client));
        println!("{doc}");
    } else {
        // only tables at the top level, the tip goes in a comment
        let text = toml::to_string(&doc).wrap_err("render settings as TOML")?;
        println!("# tip = {}", tip_name(client));
        print!("{text}");
    }
    Ok(())
}

fn rows_of(table: &CalibrationTable) -> Vec<tuner_config::CalibrationRow> {
    table
        .entries()
        .map(|(index, e)| tuner_config::CalibrationRow {
            index,
            voltage_uv: e.voltage_uv,
            temperature_c: e.temperature_c,
        })
        .collect()
}

pub fn cal(client: &mut Station, action: &CalAction, json: bool) -> eyre::Result<()> {
    match action {
        CalAction::Show => {
            let table = CalibrationTable::load(client)?;
            if json {
                let rows: Vec<_> = table
                    .rows
                    .iter()
                    .enumerate()
                    .map(|(i, r)| match r {
                        Ok(e) => json!({ "index": i, "voltage_uv": e.voltage_uv, "temperature_c": e.temperature_c }),
                        Err(err) => json!({ "index": i, "error": err.to_string() }),
                    })
                    .collect();
                println!("{}", json!({ "tip": tip_name(client), "rows": rows }));
            } else {
                println!("{:>5} {:>12} {:>10}", "index", "voltage_uv", "temp_c");
                for (i, r) in table.rows.iter().enumerate() {
                    match r {
                        Ok(e) => println!("{i:>5} {:>12.2} {:>10.2}", e.voltage_uv, e.temperature_c),
                        Err(err) => println!("{i:>5} error: {err}"),
                    }
                }
            }
            Ok(())
        }
        CalAction::Export { path } => {
            let table = CalibrationTable::load(client)?;
            let failed: Vec<String> = table.errors().map(|(i, e)| format!("row {i}: {e}")).collect();
            if !failed.is_empty() {
                eyre::bail!("calibration table incomplete, not exported ({})", failed.join("; "));
            }
            let rows = rows_of(&table);
            tuner_config::save_calibration_csv(path, &rows)?;
            if json {
                println!("{}", json!({ "exported": rows.len(), "path": path.display().to_string() }));
            } else {
                println!("exported {} rows to {}", rows.len(), path.display());
            }
            Ok(())
        }
        CalAction::Import { path } => {
            let rows = tuner_config::load_calibration_csv(path)?;
            let size = client.get_number(CommandId::CalTcTable)?;
            if rows.len() as f64 > size {
                eyre::bail!(
                    "calibration CSV has {} rows but the station table holds {size}",
                    rows.len()
                );
            }
            let mut written = Vec::with_capacity(rows.len());
            for row in &rows {
                let back = CalibrationTable::write_row(client, row.index, CalibrationEntry::from(row))
                    .wrap_err_with(|| format!("write calibration row {}", row.index))?;
                written.push(back);
            }
            tracing::info!(rows = written.len(), "calibration imported");
            if json {
                println!("{}", json!({ "imported": written.len() }));
            } else {
                println!("imported {} rows", written.len());
            }
            Ok(())
        }
        CalAction::Write {
            index,
            voltage_uv,
            temperature_c,
        } => {
            let back = CalibrationTable::write_row(
                client,
                *index,
                CalibrationEntry::new(*voltage_uv, *temperature_c),
            )?;
            if json {
                println!(
                    "{}",
                    json!({ "index": index, "voltage_uv": back.voltage_uv, "temperature_c": back.temperature_c })
                );
            } else {
                println!("{index} {back}");
            }
            Ok(())
        }
    }
}

pub fn restore(client: &mut Station, tc_constant: f64, json: bool) -> eyre::Result<()> {
    restore_defaults(client, tc_constant)?;
    if json {
        println!("{}", json!({ "tip": tip_name(client), "restored": true, "tc_constant": tc_constant }));
    } else {
        println!("defaults restored on {}", tip_name(client));
    }
    Ok(())
}

pub fn self_check(client: &mut Station, json: bool) -> eyre::Result<()> {
    let enabled = client.get_flag(CommandId::Enable)?;
    let op = client.get_number(CommandId::PidOutput)?;
    let rows = client.get_number(CommandId::CalTcTable)?;
    let port = client.port_name().unwrap_or("?").to_string();
    if json {
        println!(
            "{}",
            json!({ "ok": true, "port": port, "tip": tip_name(client), "enabled": enabled, "output": op, "cal_rows": rows })
        );
    } else {
        println!(
            "self-check ok: port={port} tip={} enabled={} op={op:.4} cal_rows={rows}",
            tip_name(client),
            u8::from(enabled)
        );
    }
    Ok(())
}
