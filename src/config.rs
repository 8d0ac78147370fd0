//! Environment configuration, read once at startup.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `uri` / `MONGODB_URI` | — | MongoDB connection string, including the database name |
//! | `HOST` | `0.0.0.0` | bind address |
//! | `PORT` | `3000` | listen port |
//! | `USUARIOS_STORE` | `mongo` | `mongo` or `memory` |
//!
//! A `.env` file in the working directory is loaded first when present.

use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info, warn};

const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no MongoDB connection string; set `uri` or `MONGODB_URI`")]
    MissingUri,

    #[error("unknown store `{0}`; expected `mongo` or `memory`")]
    UnknownStore(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreKind {
    #[default]
    Mongo,
    Memory,
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(Self::Mongo),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::UnknownStore(s.to_owned())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub store: StoreKind,
    pub mongo_uri: Option<String>,
}

impl Config {
    /// Loads `.env` (if any), then reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => info!("loaded {}", path.display()),
            Err(e) => debug!("no .env file loaded: {e}"),
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through `lookup`, so tests need not touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = match lookup("USUARIOS_STORE") {
            Some(raw) => raw.parse()?,
            None => StoreKind::default(),
        };

        let mongo_uri = lookup("uri")
            .or_else(|| lookup("MONGODB_URI"))
            .filter(|uri| !uri.trim().is_empty());

        if store == StoreKind::Mongo && mongo_uri.is_none() {
            return Err(ConfigError::MissingUri);
        }

        Ok(Self {
            host: try_load(&lookup, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            port: try_load(&lookup, "PORT", DEFAULT_PORT),
            store,
            mongo_uri,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Parses `key`, falling back to `default` when it is unset or invalid.
fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        debug!("{key} not set, using default: {default}");
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("invalid {key} value {raw:?}: {e}; using default: {default}");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("uri", "mongodb://localhost/app")]).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cfg.store, StoreKind::Mongo);
        assert_eq!(cfg.mongo_uri.as_deref(), Some("mongodb://localhost/app"));
    }

    #[test]
    fn mongo_requires_a_uri() {
        assert_eq!(config(&[]), Err(ConfigError::MissingUri));
        assert_eq!(config(&[("uri", "  ")]), Err(ConfigError::MissingUri));
    }

    #[test]
    fn uri_alias() {
        let cfg = config(&[("MONGODB_URI", "mongodb://db/x")]).unwrap();
        assert_eq!(cfg.mongo_uri.as_deref(), Some("mongodb://db/x"));
    }

    #[test]
    fn memory_store_needs_no_uri() {
        let cfg = config(&[("USUARIOS_STORE", "Memory"), ("PORT", "8080"), ("HOST", "127.0.0.1")]).unwrap();
        assert_eq!(cfg.store, StoreKind::Memory);
        assert_eq!(cfg.addr(), "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn invalid_port_falls_back() {
        let cfg = config(&[("USUARIOS_STORE", "memory"), ("PORT", "eighty")]).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn unknown_store_is_an_error() {
        assert_eq!(
            config(&[("USUARIOS_STORE", "redis")]),
            Err(ConfigError::UnknownStore("redis".into())),
        );
    }
}
