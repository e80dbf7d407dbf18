//! Engine settings read from the environment

use crate::alignment::ALIGN_TOLERANCE_SECS;
use crate::error::{EvalError, Result};
use crate::source::ROW_LIMIT;
use std::collections::HashMap;
use std::str::FromStr;

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "forecast_eval=info";

/// Runtime settings for the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Rows per read, never above [`ROW_LIMIT`]
    pub row_limit: usize,
    /// Nearest-match tolerance for scoring joins, in seconds
    pub align_tolerance_secs: i64,
    /// `tracing` filter directive
    pub log_filter: String,
    /// Database holding prediction tables for external storage
    pub external_database_url: Option<String>,
    /// Pool size for each per-request connection
    pub pg_max_connections: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            row_limit: ROW_LIMIT,
            align_tolerance_secs: ALIGN_TOLERANCE_SECS,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            external_database_url: None,
            pg_max_connections: 2,
        }
    }
}

impl EngineSettings {
    /// Load settings from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Build settings from `HORIZON_*` variables; anything else is ignored.
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with("HORIZON_"))
            .collect();
        let defaults = Self::default();

        let row_limit: usize = parse_var(&vars, "HORIZON_ROW_LIMIT")?.unwrap_or(defaults.row_limit);
        if row_limit == 0 {
            return Err(EvalError::InvalidParameter(
                "HORIZON_ROW_LIMIT must be positive".to_string(),
            ));
        }

        let align_tolerance_secs = parse_var(&vars, "HORIZON_ALIGN_TOLERANCE_SECS")?
            .unwrap_or(defaults.align_tolerance_secs);
        if align_tolerance_secs < 0 {
            return Err(EvalError::InvalidParameter(
                "HORIZON_ALIGN_TOLERANCE_SECS must not be negative".to_string(),
            ));
        }

        Ok(Self {
            row_limit: row_limit.min(ROW_LIMIT),
            align_tolerance_secs,
            log_filter: vars
                .get("HORIZON_LOG")
                .cloned()
                .unwrap_or(defaults.log_filter),
            external_database_url: vars
                .get("HORIZON_EXTERNAL_DATABASE_URL")
                .filter(|url| !url.is_empty())
                .cloned(),
            pg_max_connections: parse_var(&vars, "HORIZON_PG_MAX_CONNECTIONS")?
                .unwrap_or(defaults.pg_max_connections),
        })
    }
}

fn parse_var<T: FromStr>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>> {
    match vars.get(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            EvalError::InvalidParameter(format!("{} has an invalid value: {}", key, raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_without_variables() {
        let settings = EngineSettings::from_vars(vars(&[("PATH", "/bin")])).unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.row_limit, 300);
        assert_eq!(settings.align_tolerance_secs, 300);
    }

    #[test]
    fn row_limit_is_capped() {
        let settings = EngineSettings::from_vars(vars(&[("HORIZON_ROW_LIMIT", "1000")])).unwrap();
        assert_eq!(settings.row_limit, 300);
        let settings = EngineSettings::from_vars(vars(&[("HORIZON_ROW_LIMIT", "50")])).unwrap();
        assert_eq!(settings.row_limit, 50);
    }

    #[test]
    fn reads_all_variables() {
        let settings = EngineSettings::from_vars(vars(&[
            ("HORIZON_ALIGN_TOLERANCE_SECS", "120"),
            ("HORIZON_LOG", "forecast_eval=debug"),
            ("HORIZON_EXTERNAL_DATABASE_URL", "postgres://svc@localhost/horizon"),
            ("HORIZON_PG_MAX_CONNECTIONS", "4"),
        ]))
        .unwrap();
        assert_eq!(settings.align_tolerance_secs, 120);
        assert_eq!(settings.log_filter, "forecast_eval=debug");
        assert_eq!(
            settings.external_database_url.as_deref(),
            Some("postgres://svc@localhost/horizon")
        );
        assert_eq!(settings.pg_max_connections, 4);
    }

    #[test]
    fn rejects_invalid_numbers() {
        assert!(matches!(
            EngineSettings::from_vars(vars(&[("HORIZON_ROW_LIMIT", "lots")])),
            Err(EvalError::InvalidParameter(_))
        ));
        assert!(EngineSettings::from_vars(vars(&[("HORIZON_ROW_LIMIT", "0")])).is_err());
        assert!(
            EngineSettings::from_vars(vars(&[("HORIZON_ALIGN_TOLERANCE_SECS", "-5")])).is_err()
        );
    }
}
