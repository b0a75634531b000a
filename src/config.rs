use anyhow::{bail, Context};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_LOG_FILTER: &str = "plant_dashboard=info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Process configuration read from the environment (and `.env`, if present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    database_url: Option<String>,
    pub max_connections: u32,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse::<u32>().with_context(|| {
                format!("DATABASE_MAX_CONNECTIONS must be a number, got {raw:?}")
            })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if max_connections == 0 {
            bail!("DATABASE_MAX_CONNECTIONS must be at least 1");
        }

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") => LogFormat::default(),
            Some(value) if value.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            Some(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(other) => bail!("LOG_FORMAT must be \"pretty\" or \"json\", got {other:?}"),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_connections,
            log_format,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url().is_err());
    }

    #[test]
    fn reads_values() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/plants"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/plants");
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(config(&[("DATABASE_MAX_CONNECTIONS", "many")]).is_err());
        assert!(config(&[("DATABASE_MAX_CONNECTIONS", "0")]).is_err());
        assert!(config(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
