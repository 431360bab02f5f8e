//! Runtime configuration, read from the environment:
//!
//! - `DATABASE_URL` (required) Postgres connection string
//! - `TRACKER_MAX_CONNECTIONS` pool size, default 5
//! - `RUST_LOG` log filter, default `info`

use anyhow::Context;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .context("DATABASE_URL must be set to a Postgres instance")?;

        let max_connections = match lookup("TRACKER_MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| {
                    format!("TRACKER_MAX_CONNECTIONS must be a positive integer, got {raw:?}")
                })?,
        };

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            database_url,
            max_connections,
            log_filter,
        })
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_url_is_set() {
        let url = ("DATABASE_URL", "postgres://localhost/tracker");
        let config = Config::from_lookup(lookup(&[url])).unwrap();
        assert_eq!(config.database_url, "postgres://localhost/tracker");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn missing_url_is_an_error() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("DATABASE_URL", " ")])).is_err());
    }

    #[test]
    fn max_connections_must_be_positive() {
        let url = ("DATABASE_URL", "postgres://localhost/tracker");
        let config =
            Config::from_lookup(lookup(&[url, ("TRACKER_MAX_CONNECTIONS", "12")])).unwrap();
        assert_eq!(config.max_connections, 12);
        for bad in ["0", "lots"] {
            let pairs = [url, ("TRACKER_MAX_CONNECTIONS", bad)];
            assert!(Config::from_lookup(lookup(&pairs)).is_err());
        }
    }

    #[test]
    fn log_filter_is_passed_through() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/tracker"),
            ("RUST_LOG", "placement_tracker=debug"),
        ]))
        .unwrap();
        assert_eq!(config.log_filter, "placement_tracker=debug");
    }
}
