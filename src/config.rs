use std::env;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Pause before polling a failed connection again.
    pub reconnect_delay_secs: u64,
    /// Namespace the ESP32 bridge was flashed with; topics derive from it.
    pub mqtt_id: String,
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
    }

    fn or_default<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source, e.g. a map in tests.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars { lookup };

        let config = Self {
            mqtt: MqttConfig {
                broker_host: vars.required("MQTT_BROKER_HOST")?,
                broker_port: vars.or_default("MQTT_BROKER_PORT", 1883),
                username: vars.get("MQTT_USERNAME"),
                password: vars.get("MQTT_PASSWORD"),
                client_id: vars.or_default("MQTT_CLIENT_ID", "eq3-mqtt".to_string()),
                keep_alive_secs: vars.or_default("MQTT_KEEP_ALIVE_SECS", 30),
                reconnect_delay_secs: vars.or_default("MQTT_RECONNECT_DELAY_SECS", 5),
                mqtt_id: vars.required("EQ3_MQTT_ID")?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.mqtt.broker_host.trim().is_empty() {
            return Err(Error::Config("MQTT_BROKER_HOST must not be empty".into()));
        }
        if self.mqtt.mqtt_id.trim_matches('/').is_empty() {
            return Err(Error::Config("EQ3_MQTT_ID must name a topic namespace".into()));
        }
        if self.mqtt.keep_alive_secs == 0 {
            return Err(Error::Config("MQTT_KEEP_ALIVE_SECS must be > 0".into()));
        }
        if self.mqtt.reconnect_delay_secs == 0 {
            return Err(Error::Config("MQTT_RECONNECT_DELAY_SECS must be > 0".into()));
        }
        Ok(())
    }
}
