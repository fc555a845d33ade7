use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: String,
    pub database_url: Option<String>,
    pub state_dir: PathBuf,
    pub broadcast_interval: Duration,
    pub session_queue_capacity: usize,
    pub setpoint_refresh_interval: Duration,
    pub reconnect_interval: Duration,
    pub watchdog_interval: Duration,
    pub watchdog_threshold: Duration,
    pub autosave_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&var, "PORT", 1884)?,
            mqtt_host: var("MQTT_HOST").context("Cannot load MQTT_HOST env variable")?,
            mqtt_port: parse_or(&var, "MQTT_PORT", 1883)?,
            mqtt_user: var("MQTT_USER"),
            mqtt_password: var("MQTT_PASSWORD"),
            mqtt_client_id: var("MQTT_CLIENT_ID").unwrap_or_else(|| "server".to_string()),
            database_url: var("DATABASE_URL"),
            state_dir: var("STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("home")),
            broadcast_interval: millis_or(&var, "BROADCAST_INTERVAL_MS", 1000)?,
            session_queue_capacity: positive_or(&var, "SESSION_QUEUE_CAPACITY", 10)?,
            setpoint_refresh_interval: millis_or(&var, "SETPOINT_REFRESH_INTERVAL_MS", 1000)?,
            reconnect_interval: millis_or(&var, "RECONNECT_INTERVAL_MS", 1000)?,
            watchdog_interval: millis_or(&var, "WATCHDOG_INTERVAL_MS", 5000)?,
            watchdog_threshold: millis_or(&var, "WATCHDOG_THRESHOLD_MS", 10_000)?,
            autosave_interval: Duration::from_secs(positive_or(&var, "AUTOSAVE_INTERVAL_SECS", 60)?),
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number")),
        None => Ok(default),
    }
}

fn positive_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = parse_or(var, key, default)?;
    if value == T::default() {
        bail!("{key} must be greater than zero");
    }
    Ok(value)
}

fn millis_or(var: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    positive_or(var, key, default).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("MQTT_HOST", "broker.local")]).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 1884);
        assert_eq!(config.mqtt_port, 1883);
        assert_eq!(config.mqtt_client_id, "server");
        assert_eq!(config.mqtt_user, None);
        assert_eq!(config.database_url, None);
        assert_eq!(config.state_dir, PathBuf::from("home"));
        assert_eq!(config.session_queue_capacity, 10);
        assert_eq!(config.watchdog_threshold, Duration::from_secs(10));
        assert_eq!(config.autosave_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("MQTT_HOST", "broker.local"),
            ("PORT", "8080"),
            ("MQTT_USER", "track"),
            ("DATABASE_URL", "postgres://localhost/telemetry"),
            ("BROADCAST_INTERVAL_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.mqtt_user.as_deref(), Some("track"));
        assert!(config.database_url.is_some());
        assert_eq!(config.broadcast_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_broker_host_fails() {
        assert!(config(&[]).is_err());
    }

    #[test]
    fn test_zero_intervals_fail() {
        for key in [
            "BROADCAST_INTERVAL_MS",
            "WATCHDOG_INTERVAL_MS",
            "AUTOSAVE_INTERVAL_SECS",
            "SESSION_QUEUE_CAPACITY",
        ] {
            let err = config(&[("MQTT_HOST", "broker.local"), (key, "0")]).unwrap_err();
            assert!(err.to_string().contains(key), "{key}: {err}");
        }
    }

    #[test]
    fn test_non_numeric_port_fails() {
        let err = config(&[("MQTT_HOST", "broker.local"), ("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
