//! Wire format of the ESP32 bridge: command lines out, JSON replies in.

use tracing::warn;

use crate::error::{Error, Result};

use super::types::{Boost, DeviceList, DisplayState, Event, SettableMode, Status, Window};

/// An intent addressed to one thermostat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Power(bool),
    Boost(bool),
    Mode(SettableMode),
    Offset(f64),
    SetTemp(f64),
    DisplayLock(bool),
}

impl Command {
    pub fn action(&self) -> &'static str {
        match self {
            Command::Power(true) => "on",
            Command::Power(false) => "off",
            Command::Boost(true) => "boost",
            Command::Boost(false) => "unboost",
            Command::Mode(mode) => mode.as_str(),
            Command::Offset(_) => "offset",
            Command::SetTemp(_) => "settemp",
            // Inverted on purpose: the bridge firmware expects "unlock" to lock.
            Command::DisplayLock(true) => "unlock",
            Command::DisplayLock(false) => "lock",
        }
    }

    pub fn param(&self) -> Option<String> {
        match self {
            Command::Offset(value) | Command::SetTemp(value) => {
                Some(round_to_half(*value).to_string())
            }
            _ => None,
        }
    }

    /// Render as `"<bleaddr> <action> [<param>]"`.
    pub fn encode(&self, bleaddr: &str) -> String {
        let param = self.param().unwrap_or_default();
        format!("{bleaddr} {} {param}", self.action())
            .trim()
            .to_string()
    }
}

/// Round half up, the way the bridge's reference client rounds (`-2.5 -> -2`).
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Snap a temperature to the thermostat's 0.5 degree grid.
///
/// The tenths digit decides: 3..=7 snaps to `.5` of the truncated value,
/// anything else rounds to the nearest whole degree. Negative values always
/// have a tenths digit below 3 and therefore round to a whole degree.
pub fn round_to_half(value: f64) -> f64 {
    let whole = value.trunc();
    let tenths = round_half_up((value - whole) * 10.0);

    if tenths == 5.0 {
        return whole + 0.5;
    }
    if tenths < 3.0 || tenths > 7.0 {
        return round_half_up(value);
    }
    whole + 0.5
}

pub fn decode_device_list(topic: &str, payload: &[u8]) -> Result<DeviceList> {
    serde_json::from_slice(payload).map_err(|source| Error::Decode {
        topic: topic.to_string(),
        source,
    })
}

pub fn decode_status(topic: &str, payload: &[u8]) -> Result<Status> {
    serde_json::from_slice(payload).map_err(|source| Error::Decode {
        topic: topic.to_string(),
        source,
    })
}

/// Parse a temperature string. Blank is zero, garbage is NaN.
pub fn parse_temperature(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse().unwrap_or_else(|_| {
        warn!("Non-numeric temperature in status: {:?}", raw);
        f64::NAN
    })
}

/// Expand a status report into the per-field events followed by the record.
pub fn status_events(status: Status) -> Vec<Event> {
    vec![
        Event::Temp(parse_temperature(&status.temp)),
        Event::OffsetTemp(parse_temperature(&status.offset_temp)),
        Event::Mode(status.mode),
        Event::Boost(status.boost == Boost::Active),
        Event::DisplayOn(status.state == DisplayState::Unlocked),
        Event::Battery(status.battery),
        Event::Window(status.window == Window::Open),
        Event::State(status),
    ]
}
