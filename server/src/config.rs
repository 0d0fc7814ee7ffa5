use system::DocumentLimits;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_CONNECTION_BUFFER: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of each connection's outbound queue. Events beyond it are dropped.
    pub connection_buffer: usize,
    pub evict_empty_sessions: bool,
    pub document_limits: DocumentLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            connection_buffer: DEFAULT_CONNECTION_BUFFER,
            evict_empty_sessions: true,
            document_limits: DocumentLimits::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let max_operations = match lookup("RELAY_MAX_OPERATIONS") {
            Some(value) => Some(parse_value("RELAY_MAX_OPERATIONS", value)?),
            None => defaults.document_limits.max_operations,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", &lookup, defaults.port)?,
            connection_buffer: parse_or(
                "RELAY_CONNECTION_BUFFER",
                &lookup,
                defaults.connection_buffer,
            )?,
            evict_empty_sessions: match lookup("RELAY_EVICT_EMPTY_SESSIONS") {
                Some(value) => parse_bool("RELAY_EVICT_EMPTY_SESSIONS", value)?,
                None => defaults.evict_empty_sessions,
            },
            document_limits: DocumentLimits {
                max_operations,
                activity_limit: parse_or(
                    "RELAY_ACTIVITY_LIMIT",
                    &lookup,
                    defaults.document_limits.activity_limit,
                )?,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, F>(name: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => parse_value(name, value),
        None => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value })
}

fn parse_bool(name: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn it_defaults_to_port_3001() {
        let config = ServerConfig::from_lookup(lookup(&[])).expect("");
        assert_eq!(config.port, 3001);
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
        assert!(config.evict_empty_sessions);
        assert_eq!(config.document_limits.max_operations, None);
        assert_eq!(config.document_limits.activity_limit, 100);
    }

    #[test]
    fn it_reads_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("RELAY_EVICT_EMPTY_SESSIONS", "no"),
            ("RELAY_MAX_OPERATIONS", "1000"),
            ("RELAY_ACTIVITY_LIMIT", "20"),
            ("RELAY_CONNECTION_BUFFER", "64"),
        ]))
        .expect("");
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert!(!config.evict_empty_sessions);
        assert_eq!(config.document_limits.max_operations, Some(1000));
        assert_eq!(config.document_limits.activity_limit, 20);
        assert_eq!(config.connection_buffer, 64);
    }

    #[test]
    fn it_rejects_garbage() {
        match ServerConfig::from_lookup(lookup(&[("PORT", "three-thousand")])) {
            Err(ConfigError::InvalidValue { name, .. }) => assert_eq!(name, "PORT"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(ServerConfig::from_lookup(lookup(&[("RELAY_EVICT_EMPTY_SESSIONS", "maybe")])).is_err());
    }
}
