use std::{env, fmt::Display, str::FromStr};

use anyhow::{anyhow, Context};
use tracing::info;

pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set to a production Postgres instance")?,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
        })
    }
}

/// Read before the subscriber exists, so it cannot log its default.
pub fn log_json_enabled() -> anyhow::Result<bool> {
    match env::var("ATTENDANCE_LOG_JSON") {
        Ok(value) => parse_value("ATTENDANCE_LOG_JSON", &value),
        Err(_) => Ok(false),
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let value = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    parse_value(key, &value)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("invalid {key} value {value:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trimmed_values() {
        let connections: u32 = parse_value("DATABASE_MAX_CONNECTIONS", " 8 ").unwrap();
        assert_eq!(connections, 8);
        let json: bool = parse_value("ATTENDANCE_LOG_JSON", "true").unwrap();
        assert!(json);
    }

    #[test]
    fn invalid_values_name_the_key() {
        let err = parse_value::<u32>("DATABASE_MAX_CONNECTIONS", "many").unwrap_err();
        assert!(err.to_string().contains("DATABASE_MAX_CONNECTIONS"));
    }
}
