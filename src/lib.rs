//! MQTT client for EQ3 radiator thermostats behind an ESP32 BLE bridge.
//!
//! [`eq3`] holds the wire codec, [`mqtt`] the session that turns bridge
//! replies into [`Event`]s and intents into command lines.

pub mod config;
pub mod eq3;
pub mod error;
pub mod mqtt;

pub use config::Config;
pub use eq3::{Device, Event, SettableMode, Status};
pub use error::{Error, Result};
pub use mqtt::{Commands, Listeners, MqttClient, Session, SessionState, Topics, Transport};
