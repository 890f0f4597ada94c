use std::fmt;

use serde::{Deserialize, Serialize};

/// A thermostat reported by the bridge's BLE scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// BLE MAC address, unique per unit.
    pub bleaddr: String,
    pub rssi: i64,
}

/// Reply published on `<out>/devlist` after a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceList {
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Auto,
    Manual,
    Holiday,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::Manual => "manual",
            Mode::Holiday => "holiday",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modes a command can request. Holiday mode is only ever reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettableMode {
    Manual,
    Auto,
}

impl SettableMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettableMode::Manual => "manual",
            SettableMode::Auto => "auto",
        }
    }
}

impl fmt::Display for SettableMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boost {
    Active,
    Inactive,
}

/// Display lock state. The bridge reports it under the `state` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayState {
    Locked,
    Unlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Battery {
    Good,
    Low,
}

impl Battery {
    /// Approximate charge percentage; the firmware only reports good/low.
    pub fn level(&self) -> u8 {
        match self {
            Battery::Good => 100,
            Battery::Low => 10,
        }
    }
}

impl fmt::Display for Battery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Battery::Good => f.write_str("GOOD"),
            Battery::Low => f.write_str("LOW"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Open,
    Closed,
}

/// One status report from `<out>/status`. Temperatures arrive as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub trv: String,
    pub temp: String,
    #[serde(rename = "offsetTemp")]
    pub offset_temp: String,
    pub mode: Mode,
    pub boost: Boost,
    pub state: DisplayState,
    pub battery: Battery,
    pub window: Window,
}

impl Status {
    /// A valve in holiday mode or with an open window is not heating.
    pub fn is_heating(&self) -> bool {
        self.mode != Mode::Holiday && self.window != Window::Open
    }
}

/// Everything the session reports to its listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DevicesDiscovered(Vec<Device>),
    Temp(f64),
    OffsetTemp(f64),
    Mode(Mode),
    Boost(bool),
    DisplayOn(bool),
    Battery(Battery),
    Window(bool),
    /// The full record, emitted last for every status report.
    State(Status),
}

impl Event {
    /// Stable name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Event::DevicesDiscovered(_) => "devices-discovered",
            Event::Temp(_) => "change:temp",
            Event::OffsetTemp(_) => "change:offsetTemp",
            Event::Mode(_) => "change:mode",
            Event::Boost(_) => "change:boost",
            Event::DisplayOn(_) => "change:displayOn",
            Event::Battery(_) => "change:battery",
            Event::Window(_) => "change:window",
            Event::State(_) => "change:state",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(mode: Mode, window: Window) -> Status {
        Status {
            trv: "eq3".into(),
            temp: "21.5".into(),
            offset_temp: "0".into(),
            mode,
            boost: Boost::Inactive,
            state: DisplayState::Locked,
            battery: Battery::Good,
            window,
        }
    }

    #[test]
    fn heating_requires_closed_window_and_no_holiday() {
        assert!(status(Mode::Auto, Window::Closed).is_heating());
        assert!(status(Mode::Manual, Window::Closed).is_heating());
        assert!(!status(Mode::Holiday, Window::Closed).is_heating());
        assert!(!status(Mode::Manual, Window::Open).is_heating());
    }

    #[test]
    fn battery_level() {
        assert_eq!(Battery::Good.level(), 100);
        assert_eq!(Battery::Low.level(), 10);
    }

    #[test]
    fn status_uses_wire_names() {
        let json = serde_json::to_value(status(Mode::Holiday, Window::Open)).unwrap();
        assert_eq!(json["offsetTemp"], "0");
        assert_eq!(json["mode"], "holiday");
        assert_eq!(json["state"], "locked");
        assert_eq!(json["battery"], "GOOD");
        assert_eq!(json["window"], "open");
    }
}
