#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod commands;
mod error_fmt;
mod logging;
mod monitor;

use std::path::Path;

use clap::Parser;
use eyre::WrapErr;
use tuner_core::{AcquisitionCfg, UnitMode};

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }

    if let Err(err) = run(cli) {
        let code = exit_code_for_error(&err);
        tracing::error!(error = ?err, code, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("error: {}", humanize(&err));
        }
        std::process::exit(code);
    }
}

/// An explicit `--config` must exist; the default path is optional.
fn load_config(path: Option<&Path>) -> eyre::Result<tuner_config::Config> {
    let (path, required) = match path {
        Some(p) => (p, true),
        None => (Path::new(DEFAULT_CONFIG), false),
    };
    if !required && !path.exists() {
        return Ok(tuner_config::Config::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = tuner_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    logging::init(&cli.log_level, cli.json, &cfg.logging)?;
    let json = cli.json;
    let default_mode = UnitMode::from(cfg.acquisition.mode);

    if matches!(cli.cmd, Commands::Ports) {
        return commands::ports(json);
    }

    let mut client = commands::open_station(&cli, &cfg)?;
    let result = match &cli.cmd {
        Commands::Ports => Ok(()),
        Commands::Get { command, arg } => commands::get(&mut client, command, arg.as_deref(), json),
        Commands::Set { command, value } => commands::set(&mut client, command, value, json),
        Commands::Setpoint { value, mode } => commands::setpoint(
            &mut client,
            mode.map_or(default_mode, UnitMode::from),
            *value,
            json,
        ),
        Commands::Enable { state } => commands::enable(&mut client, *state, json),
        Commands::Settings => commands::settings(&mut client, json),
        Commands::Cal { action } => commands::cal(&mut client, action, json),
        Commands::Restore { tc_constant } => commands::restore(&mut client, *tc_constant, json),
        Commands::SelfCheck => commands::self_check(&mut client, json),
        Commands::Monitor {
            mode,
            ticks,
            scan_ms,
            record_length,
        } => {
            let mut acq = AcquisitionCfg::from(&cfg.acquisition);
            if let Some(m) = mode {
                acq.mode = UnitMode::from(*m);
            }
            if let Some(ms) = scan_ms {
                acq.scan_interval = monitor::scan_interval(*ms)?;
            }
            if let Some(n) = record_length {
                if *n == 0 {
                    eyre::bail!("--record-length must be >= 1");
                }
                acq.record_length = *n;
            }
            return monitor::run(
                client,
                monitor::MonitorArgs {
                    cfg: acq,
                    ticks: *ticks,
                },
                json,
            );
        }
    };
    client.disconnect();
    result
}
