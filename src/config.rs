use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

use crate::window::TimeRange;

/// Settings read from the environment (and `.env`, when present).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL connection URL; only required by database-backed commands.
    pub database_url: Option<String>,

    #[serde(default = "default_range")]
    pub default_range: String,

    #[serde(default = "default_report_top_items")]
    pub report_top_items: usize,

    /// JSON catalog of item descriptors.
    pub descriptors_path: Option<PathBuf>,
}

fn default_range() -> String {
    "7d".to_string()
}

fn default_report_top_items() -> usize {
    10
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().context("failed to load configuration from environment")
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a Postgres instance (or pass --events)")
    }

    /// Fails fast on an unrecognized `DEFAULT_RANGE`.
    pub fn range(&self) -> anyhow::Result<TimeRange> {
        self.default_range
            .parse()
            .with_context(|| format!("invalid DEFAULT_RANGE `{}`", self.default_range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);
        assert!(config.database_url.is_none());
        assert_eq!(config.range().unwrap(), TimeRange::Last7Days);
        assert_eq!(config.report_top_items, 10);
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/trends"),
            ("DEFAULT_RANGE", "30d"),
            ("REPORT_TOP_ITEMS", "5"),
            ("DESCRIPTORS_PATH", "catalog.json"),
        ]);
        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/trends");
        assert_eq!(config.range().unwrap(), TimeRange::Last30Days);
        assert_eq!(config.report_top_items, 5);
        assert_eq!(config.descriptors_path, Some(PathBuf::from("catalog.json")));
    }

    #[test]
    fn unknown_default_range_fails_fast() {
        let config = config_from(&[("DEFAULT_RANGE", "fortnight")]);
        assert!(config.range().is_err());
    }
}
