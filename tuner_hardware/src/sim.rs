//! In-memory soldering station.
//!
//! Parses `"{tip}:{command}:{value}"` messages and answers with one line,
//! like the firmware: the raw value for queries, `OK` after a successful
//! write, or `ERROR {message}` when the request is refused. Each
//! thermocouple-voltage query advances a crude first-order thermal model so
//! a monitor loop sees the tip heat up after it is enabled.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tuner_traits::{BoxError, PortProvider, Transport};

use crate::error::LinkError;

/// Port name under which the simulated station is listed.
pub const SIM_PORT_NAME: &str = "sim";

const TIP_COUNT: usize = 4;
const CAL_ROWS: usize = 10;
const AMBIENT_C: f64 = 25.0;
const DEFAULT_TC_UV_PER_K: f64 = 40.0;

#[derive(Debug, Clone)]
struct TipState {
    enabled: bool,
    temp_sp: f64,
    temp_min: f64,
    temp_max: f64,
    runaway: f64,
    tc_uv_sp: f64,
    kp: f64,
    ki: f64,
    kd: f64,
    d_tau: f64,
    sleep_temp: f64,
    sleep_delay: f64,
    sleeping: bool,
    temperature: f64,
    cal: [[f64; 2]; CAL_ROWS],
}

impl TipState {
    fn factory(tc_s: f64) -> Self {
        let mut cal = [[0.0; 2]; CAL_ROWS];
        for (i, row) in cal.iter_mut().enumerate() {
            let t = 450.0 * i as f64 / (CAL_ROWS - 1) as f64;
            *row = [t * tc_s, t];
        }
        let mut s = Self {
            enabled: false,
            temp_sp: 250.0,
            temp_min: 100.0,
            temp_max: 400.0,
            runaway: 480.0,
            tc_uv_sp: 0.0,
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            d_tau: 0.25,
            sleep_temp: 150.0,
            sleep_delay: 30_000.0,
            sleeping: false,
            temperature: AMBIENT_C,
            cal,
        };
        s.tc_uv_sp = s.temp_to_uv(s.temp_sp);
        s
    }

    fn restore(&mut self, tc_s: f64) {
        let temperature = self.temperature;
        let enabled = self.enabled;
        *self = Self::factory(tc_s);
        self.temperature = temperature;
        self.enabled = enabled;
    }

    fn uv_to_temp(&self, v: f64) -> f64 {
        interpolate(&self.cal, v, 0, 1)
    }

    fn temp_to_uv(&self, t: f64) -> f64 {
        interpolate(&self.cal, t, 1, 0)
    }

    fn output(&self) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        ((self.temp_sp - self.temperature) / 100.0).clamp(0.0, 1.0)
    }

    fn step(&mut self) {
        let target = if self.enabled { self.temp_sp } else { AMBIENT_C };
        let rate = if self.enabled { 0.1 } else { 0.05 };
        self.temperature += (target - self.temperature) * rate;
    }
}

/// Piecewise-linear lookup in the calibration table, extrapolating past
/// either end with the outermost segment.
fn interpolate(table: &[[f64; 2]; CAL_ROWS], x: f64, from: usize, to: usize) -> f64 {
    let segment = table
        .windows(2)
        .position(|w| x < w[1][from])
        .unwrap_or(CAL_ROWS - 2);
    let (a, b) = (table[segment], table[segment + 1]);
    let dx = b[from] - a[from];
    if dx == 0.0 {
        return a[to];
    }
    a[to] + (b[to] - a[to]) / dx * (x - a[from])
}

/// Mirror of the firmware's float parser: optional sign, digits with at most
/// one `.`, no exponent, at most ten digits either side of the point.
fn parse_device_float(s: &str) -> Option<f64> {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    if digits.is_empty() || !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let mut parts = digits.splitn(2, '.');
    let int = parts.next().unwrap_or("");
    let frac = parts.next().unwrap_or("");
    let valid = |p: &str| p.len() <= 10 && p.chars().all(|c| c.is_ascii_digit());
    if !valid(int) || !valid(frac) || (int.is_empty() && frac.is_empty()) {
        return None;
    }
    s.parse().ok()
}

#[derive(Debug)]
struct StationState {
    tips: Vec<TipState>,
    replies: VecDeque<String>,
    muted: bool,
    requests: usize,
}

impl Default for StationState {
    fn default() -> Self {
        Self {
            tips: vec![TipState::factory(DEFAULT_TC_UV_PER_K); TIP_COUNT],
            replies: VecDeque::new(),
            muted: false,
            requests: 0,
        }
    }
}

type Reply = Result<Option<String>, String>;

impl StationState {
    fn handle(&mut self, message: &str) -> Reply {
        let mut fields = message.splitn(3, ':');
        let (Some(id), Some(command), Some(value)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err("Malformed command. Format: id:command:value_or_?".into());
        };
        let tip = id
            .parse::<usize>()
            .ok()
            .and_then(|i| self.tips.get_mut(i))
            .ok_or_else(|| "Invalid device ID".to_string())?;
        let query = value == "?";

        macro_rules! number {
            ($field:expr) => {{
                if query {
                    return Ok(Some(format!("{}", $field)));
                }
                let v = parse_device_float(value).ok_or("invalid float value")?;
                $field = v;
                Ok(None)
            }};
            ($field:expr, min = $min:expr) => {{
                if !query {
                    let v = parse_device_float(value).ok_or("invalid float value")?;
                    if v < $min {
                        return Err(format!("invalid value < {}", $min));
                    }
                }
                number!($field)
            }};
        }
        macro_rules! read_only {
            ($expr:expr) => {{
                if !query {
                    return Err("read only".into());
                }
                Ok(Some($expr))
            }};
        }

        match command {
            "en" => {
                if query {
                    return Ok(Some((if tip.enabled { "1" } else { "0" }).to_string()));
                }
                tip.enabled = match value {
                    "1" => true,
                    "0" => false,
                    _ => return Err("invalid bool value".into()),
                };
                Ok(None)
            }
            "set_t" => {
                if query {
                    return Ok(Some(format!("{:.2}", tip.temp_sp)));
                }
                let t = parse_device_float(value).ok_or("invalid float value")?;
                if t < tip.temp_min || t > tip.temp_max {
                    return Err("out of bounds".into());
                }
                tip.temp_sp = t;
                tip.tc_uv_sp = tip.temp_to_uv(t);
                Ok(None)
            }
            "set_uv" => {
                if query {
                    return Ok(Some(format!("{:.2}", tip.tc_uv_sp)));
                }
                let v = parse_device_float(value).ok_or("invalid float value")?;
                let t = tip.uv_to_temp(v);
                if t < tip.temp_min || t > tip.temp_max {
                    return Err("out of bounds".into());
                }
                tip.tc_uv_sp = v;
                tip.temp_sp = t;
                Ok(None)
            }
            "set_min_t" => number!(tip.temp_min, min = 0.0),
            "set_max_t" => number!(tip.temp_max, min = 0.0),
            "runaway_t" => number!(tip.runaway, min = 0.0),
            "pid_kp" => number!(tip.kp, min = 0.0),
            "pid_ki" => number!(tip.ki, min = 0.0),
            "pid_kd" => number!(tip.kd, min = 0.0),
            "pid_d_tau" => number!(tip.d_tau, min = 0.0),
            "sleep_set_t" => number!(tip.sleep_temp, min = 0.0),
            "sleep_delay" => number!(tip.sleep_delay, min = 0.0),
            "meas_t" => read_only!(format!("{:.2}", tip.temperature)),
            "meas_uv" => {
                if query {
                    tip.step();
                }
                read_only!(format!("{:.2}", tip.temp_to_uv(tip.temperature)))
            }
            "pid_op" => read_only!(format!("{:.4}", tip.output())),
            "sleep_state" => read_only!((if tip.sleeping { "1" } else { "0" }).to_string()),
            "tc_cal_table" => cal_table(tip, value),
            "restore" => {
                let s = parse_device_float(value).ok_or("invalid thermocouple S[uV/K]")?;
                if s <= 0.0 || s > 40.0 {
                    return Err("S[uV/K] outside of range".into());
                }
                tip.restore(s);
                Ok(None)
            }
            _ => Err("Unknown command".into()),
        }
    }
}

fn cal_table(tip: &mut TipState, value: &str) -> Reply {
    if value == "?" {
        return Ok(Some(CAL_ROWS.to_string()));
    }
    let index_of = |s: &str| {
        s.parse::<usize>()
            .ok()
            .filter(|i| *i < CAL_ROWS)
            .ok_or_else(|| "Invalid index".to_string())
    };
    if !value.contains(['[', ',', ']']) {
        let row = tip.cal[index_of(value)?];
        return Ok(Some(format!("[{:.2},{:.2}]", row[0], row[1])));
    }
    let (Some(open), Some(comma), Some(close)) =
        (value.find('['), value.find(','), value.find(']'))
    else {
        return Err("Format must be index[x,y]".into());
    };
    if !(open < comma && comma < close) {
        return Err("Format must be index[x,y]".into());
    }
    let index = index_of(&value[..open])?;
    let (Some(v), Some(t)) = (
        parse_device_float(&value[open + 1..comma]),
        parse_device_float(&value[comma + 1..close]),
    ) else {
        return Err("Invalid float value".into());
    };
    tip.cal[index] = [v, t];
    Ok(None)
}

/// A connection to the simulated station.
///
/// Every `write` is treated as one complete request (queries are sent
/// without a terminator), and its single reply line is queued for the next
/// `read_line`.
#[derive(Clone, Default)]
pub struct SimulatedStation {
    state: Arc<Mutex<StationState>>,
}

impl SimulatedStation {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StationState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Stop answering: requests are still applied but no reply is queued.
    pub fn set_muted(&self, muted: bool) {
        self.lock().muted = muted;
    }

    /// Current simulated tip temperature in °C.
    pub fn temperature(&self, tip: usize) -> Option<f64> {
        self.lock().tips.get(tip).map(|t| t.temperature)
    }

    /// Number of requests received so far.
    pub fn requests(&self) -> usize {
        self.lock().requests
    }
}

impl Transport for SimulatedStation {
    fn write(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        let text = std::str::from_utf8(bytes).map_err(|e| LinkError::Serial(e.to_string()))?;
        let message = text.trim_end_matches(['\r', '\n']);
        let mut state = self.lock();
        state.requests += 1;
        let reply = match state.handle(message) {
            Ok(Some(value)) => value,
            Ok(None) => "OK".to_string(),
            Err(msg) => format!("ERROR {msg}"),
        };
        tracing::trace!(request = message, reply = %reply, "sim exchange");
        if !state.muted {
            state.replies.push_back(reply);
        }
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> Result<Vec<u8>, BoxError> {
        match self.lock().replies.pop_front() {
            Some(line) => Ok(line.into_bytes()),
            None => Err(Box::new(LinkError::Timeout)),
        }
    }
}

/// Port provider exposing one simulated station under [`SIM_PORT_NAME`].
#[derive(Clone, Default)]
pub struct SimPorts {
    station: SimulatedStation,
}

impl SimPorts {
    /// Handle to the station state shared by every opened connection.
    pub fn station(&self) -> &SimulatedStation {
        &self.station
    }
}

impl PortProvider for SimPorts {
    type Port = SimulatedStation;

    fn available_ports(&self) -> Result<Vec<String>, BoxError> {
        Ok(vec![SIM_PORT_NAME.to_string()])
    }

    fn open(&self, name: &str, _baud: u32, _timeout: Duration) -> Result<Self::Port, BoxError> {
        if name != SIM_PORT_NAME {
            return Err(Box::new(LinkError::PortNotFound(name.to_string())));
        }
        let station = self.station.clone();
        station.lock().replies.clear();
        Ok(station)
    }
}
