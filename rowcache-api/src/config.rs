//! Service Configuration Module
//!
//! Process-level settings: where to listen, how lookups are parsed, how often
//! the cache refreshes and which row store backs it. Everything is read from
//! environment variables with defaults from [`crate::constants`]. Unlike a
//! silently ignored typo, a value that is present but unparseable is a
//! startup error.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use rowcache_core::ConfigError;

use crate::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_KEY_PARAM, DEFAULT_MAX_KEYS, DEFAULT_PORT,
    DEFAULT_REFRESH_PERIOD_SECS,
};

// ============================================================================
// ENVIRONMENT HELPERS
// ============================================================================

/// Read `name` through `lookup`, parsing it as `T` or falling back to `default`.
pub(crate) fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            field: name.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

/// Read a string variable, falling back to `default` when unset.
pub(crate) fn string_var<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).unwrap_or_else(|| default.to_string())
}

pub(crate) fn invalid(field: &str, value: impl fmt::Display, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// BACKEND SELECTION
// ============================================================================

/// Which row store the cache mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// PostgreSQL table configured by `DbConfig`.
    Postgres,
    /// Built-in two-row sample table. For local runs and demos.
    Fixture,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Backend::Postgres),
            "fixture" | "mock" => Ok(Backend::Fixture),
            other => Err(format!("unknown backend '{}', expected postgres or fixture", other)),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Postgres => write!(f, "postgres"),
            Backend::Fixture => write!(f, "fixture"),
        }
    }
}

// ============================================================================
// SERVICE CONFIGURATION
// ============================================================================

/// Listener, lookup and refresh settings.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to bind, without port.
    pub bind_address: String,

    pub port: u16,

    /// Query parameter that carries the comma-separated key list.
    pub key_param: String,

    /// Upper bound on keys per request.
    pub max_keys: usize,

    /// Time between incremental refreshes.
    pub refresh_period: Duration,

    pub backend: Backend,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            key_param: DEFAULT_KEY_PARAM.to_string(),
            max_keys: DEFAULT_MAX_KEYS,
            refresh_period: Duration::from_secs(DEFAULT_REFRESH_PERIOD_SECS),
            backend: Backend::Postgres,
        }
    }
}

impl ServiceConfig {
    /// Create ServiceConfig from environment variables.
    ///
    /// Environment variables:
    /// - `ROWCACHE_BIND`: Listen address (default: 0.0.0.0)
    /// - `PORT` or `ROWCACHE_PORT`: Listen port (default: 8080)
    /// - `ROWCACHE_KEY_PARAM`: Key list query parameter (default: keys)
    /// - `ROWCACHE_MAX_KEYS`: Maximum keys per request (default: 1000)
    /// - `ROWCACHE_REFRESH_PERIOD_SECS`: Refresh period (default: 600)
    /// - `ROWCACHE_BACKEND`: "postgres" or "fixture" (default: postgres)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port_var = if lookup("PORT").is_some() {
            "PORT"
        } else {
            "ROWCACHE_PORT"
        };

        let config = Self {
            bind_address: string_var(&lookup, "ROWCACHE_BIND", DEFAULT_BIND_ADDRESS),
            port: parse_var(&lookup, port_var, DEFAULT_PORT)?,
            key_param: string_var(&lookup, "ROWCACHE_KEY_PARAM", DEFAULT_KEY_PARAM),
            max_keys: parse_var(&lookup, "ROWCACHE_MAX_KEYS", DEFAULT_MAX_KEYS)?,
            refresh_period: Duration::from_secs(parse_var(
                &lookup,
                "ROWCACHE_REFRESH_PERIOD_SECS",
                DEFAULT_REFRESH_PERIOD_SECS,
            )?),
            backend: parse_var(&lookup, "ROWCACHE_BACKEND", Backend::Postgres)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_param.is_empty() {
            return Err(invalid("ROWCACHE_KEY_PARAM", "", "must not be empty"));
        }
        if self.max_keys == 0 {
            return Err(invalid("ROWCACHE_MAX_KEYS", 0, "must be at least 1"));
        }
        if self.refresh_period.is_zero() {
            return Err(invalid(
                "ROWCACHE_REFRESH_PERIOD_SECS",
                0,
                "must be at least 1 second",
            ));
        }
        Ok(())
    }

    /// Resolve the listen socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_address, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| invalid("ROWCACHE_BIND", &addr, &e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.key_param, "keys");
        assert_eq!(config.max_keys, 1000);
        assert_eq!(config.refresh_period, Duration::from_secs(600));
        assert_eq!(config.backend, Backend::Postgres);
    }

    #[test]
    fn test_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("ROWCACHE_BIND", "127.0.0.1"),
            ("ROWCACHE_PORT", "9000"),
            ("ROWCACHE_KEY_PARAM", "k"),
            ("ROWCACHE_MAX_KEYS", "10"),
            ("ROWCACHE_REFRESH_PERIOD_SECS", "5"),
            ("ROWCACHE_BACKEND", "fixture"),
        ]))
        .unwrap();

        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!(config.key_param, "k");
        assert_eq!(config.max_keys, 10);
        assert_eq!(config.refresh_period, Duration::from_secs(5));
        assert_eq!(config.backend, Backend::Fixture);
    }

    #[test]
    fn test_port_prefers_platform_variable() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("PORT", "3001"),
            ("ROWCACHE_PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(config.port, 3001);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "PORT"));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err =
            ServiceConfig::from_lookup(lookup_from(&[("ROWCACHE_BACKEND", "redis")])).unwrap_err();
        assert!(format!("{}", err).contains("redis"));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        assert!(ServiceConfig::from_lookup(lookup_from(&[(
            "ROWCACHE_REFRESH_PERIOD_SECS",
            "0"
        )]))
        .is_err());
        assert!(ServiceConfig::from_lookup(lookup_from(&[("ROWCACHE_MAX_KEYS", "0")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup_from(&[("ROWCACHE_KEY_PARAM", "")])).is_err());
    }

    #[test]
    fn test_backend_parse_aliases() {
        assert_eq!("PostgreSQL".parse::<Backend>(), Ok(Backend::Postgres));
        assert_eq!("mock".parse::<Backend>(), Ok(Backend::Fixture));
        assert_eq!(Backend::Fixture.to_string(), "fixture");
    }

    #[test]
    fn test_bad_bind_address() {
        let config = ServiceConfig {
            bind_address: "not an address".to_string(),
            ..Default::default()
        };
        assert!(config.socket_addr().is_err());
    }
}
