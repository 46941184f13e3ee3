use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_CLIENT_ID: &str = "egauge-mqtt-bridge";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_POLL_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub credentials: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub topic_prefix: String,
    pub hosts: Vec<String>,
    pub retain: bool,
    pub mqtt: MqttSettings,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub snapshot_topic: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let topic_prefix =
            non_empty(lookup("TOPIC_PREFIX")).ok_or(ConfigError::Missing("TOPIC_PREFIX"))?;

        let hosts: Vec<String> = lookup("EGAUGE_HOSTS")
            .ok_or(ConfigError::Missing("EGAUGE_HOSTS"))?
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        if hosts.is_empty() {
            return Err(ConfigError::NoHosts("EGAUGE_HOSTS"));
        }

        let credentials = match (lookup("MQTT_USER"), lookup("MQTT_PASS")) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        };
        let mqtt = MqttSettings {
            host: non_empty(lookup("MQTT_HOST")).unwrap_or_else(|| "localhost".to_string()),
            port: parse_or(&lookup, "MQTT_PORT", DEFAULT_MQTT_PORT)?,
            client_id: non_empty(lookup("MQTT_CLIENT_ID"))
                .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            credentials,
        };

        let poll_interval_ms = parse_or(&lookup, "POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "POLL_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            topic_prefix,
            hosts,
            retain: parse_bool_safe(lookup("MQTT_RETAIN")),
            mqtt,
            poll_interval: Duration::from_millis(poll_interval_ms),
            poll_timeout: Duration::from_millis(parse_or(
                &lookup,
                "POLL_TIMEOUT_MS",
                DEFAULT_POLL_TIMEOUT_MS,
            )?),
            snapshot_topic: non_empty(lookup("SNAPSHOT_TOPIC")),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// Safely parses a boolean from an optional string, defaulting to false
fn parse_bool_safe(val: Option<String>) -> bool {
    val.unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
        .parse()
        .unwrap_or_default()
}
