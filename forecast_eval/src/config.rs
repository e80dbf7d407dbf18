//! Forecast configurations, connection settings and the collaborators that supply them

use crate::error::{EvalError, Result};
use crate::source::validate_identifier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Column names reserved for aligned frames; methods may not use them
pub const RESERVED_COLUMNS: [&str; 2] = [crate::data::TIME_COLUMN, crate::alignment::REAL_COLUMN];

/// Where prediction tables are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetStorage {
    /// Prediction tables live in the same database as the source table
    CoLocated,
    /// Prediction tables live in the service's own database
    External,
}

impl From<String> for TargetStorage {
    fn from(value: String) -> Self {
        if value == "self_host" {
            TargetStorage::CoLocated
        } else {
            TargetStorage::External
        }
    }
}

impl From<TargetStorage> for String {
    fn from(value: TargetStorage) -> Self {
        match value {
            TargetStorage::CoLocated => "self_host".to_string(),
            TargetStorage::External => "external".to_string(),
        }
    }
}

/// A prediction method and the table its output is written to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastMethodBinding {
    /// Method name, e.g. `XGBoost` or `LSTM`
    pub method: String,
    /// Table holding the method's predictions
    pub target_table: String,
}

impl ForecastMethodBinding {
    pub fn new(method: impl Into<String>, target_table: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target_table: target_table.into(),
        }
    }

    /// Binding with the conventional target table name for a new configuration
    pub fn derived(
        organization_id: i64,
        connection_id: i64,
        method: &str,
        target_column: &str,
        source_table: &str,
    ) -> Self {
        Self::new(
            method,
            format!(
                "_{}_{}_{}_target_{}_{}",
                organization_id, connection_id, method, target_column, source_table
            ),
        )
    }
}

/// Stored settings for one forecasted series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Name the dashboard uses for the series
    pub data_name: String,
    /// Connection holding the source table
    pub connection_id: i64,
    pub source_table: String,
    pub time_column: String,
    pub target_column: String,
    /// Native sampling interval in seconds
    pub discreteness: u64,
    /// Number of future points each method should produce
    #[serde(rename = "count_time_points_predict")]
    pub horizon: usize,
    #[serde(rename = "target_db")]
    pub target_storage: TargetStorage,
    /// Prediction methods in display order
    #[serde(rename = "methods_predict", default)]
    pub methods: Vec<ForecastMethodBinding>,
}

impl ForecastConfig {
    /// Check every identifier and method name before the config is stored.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.source_table)?;
        validate_identifier(&self.time_column)?;
        validate_identifier(&self.target_column)?;

        let mut seen = HashSet::new();
        for binding in &self.methods {
            validate_identifier(&binding.target_table)?;
            if binding.method.trim().is_empty() {
                return Err(EvalError::InvalidParameter(
                    "method name must not be empty".to_string(),
                ));
            }
            if RESERVED_COLUMNS.contains(&binding.method.as_str()) {
                return Err(EvalError::InvalidParameter(format!(
                    "method name '{}' is reserved",
                    binding.method
                )));
            }
            if !seen.insert(binding.method.as_str()) {
                return Err(EvalError::InvalidParameter(format!(
                    "method '{}' is configured twice",
                    binding.method
                )));
            }
        }
        Ok(())
    }
}

/// Request to set up forecasting for a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewForecastRequest {
    pub data_name: String,
    pub connection_id: i64,
    pub source_table: String,
    pub time_column: String,
    pub target_column: String,
    /// Forecast length in `time_interval` units
    pub horizon_count: u64,
    /// One of `minute`, `hour`, `day`, `month`
    pub time_interval: String,
    #[serde(rename = "target_db")]
    pub target_storage: TargetStorage,
    pub methods: Vec<String>,
}

/// Decrypted settings for a registered database connection
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Database kind, only `PostgreSQL` is supported
    #[serde(rename = "connection_schema")]
    pub schema: String,
    pub host: String,
    pub port: u16,
    #[serde(rename = "db_user")]
    pub user: String,
    #[serde(rename = "db_password")]
    pub password: String,
    pub db_name: String,
}

impl ConnectionSettings {
    /// Fail unless the connection points at a database kind the engine reads.
    pub fn ensure_supported(&self) -> Result<()> {
        if self.schema.eq_ignore_ascii_case("postgresql") {
            Ok(())
        } else {
            Err(EvalError::UnsupportedSchema(self.schema.clone()))
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("schema", &self.schema)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("db_name", &self.db_name)
            .finish()
    }
}

/// Supplies forecast configurations by organization and data name
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn get(&self, organization_id: i64, data_name: &str) -> Result<ForecastConfig>;
}

/// Supplies decrypted connection settings by organization and connection id
#[async_trait]
pub trait ConnectionResolver: Send + Sync {
    async fn get(&self, organization_id: i64, connection_id: i64) -> Result<ConnectionSettings>;
}

/// Config provider backed by a fixed map
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    configs: HashMap<(i64, String), ForecastConfig>,
}

impl StaticConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, organization_id: i64, config: ForecastConfig) {
        self.configs
            .insert((organization_id, config.data_name.clone()), config);
    }
}

#[async_trait]
impl ConfigProvider for StaticConfigProvider {
    async fn get(&self, organization_id: i64, data_name: &str) -> Result<ForecastConfig> {
        self.configs
            .get(&(organization_id, data_name.to_string()))
            .cloned()
            .ok_or_else(|| EvalError::ConfigNotFound(data_name.to_string()))
    }
}

/// Connection resolver backed by a fixed map
#[derive(Debug, Clone, Default)]
pub struct StaticConnectionResolver {
    connections: HashMap<(i64, i64), ConnectionSettings>,
}

impl StaticConnectionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        organization_id: i64,
        connection_id: i64,
        settings: ConnectionSettings,
    ) {
        self.connections
            .insert((organization_id, connection_id), settings);
    }
}

#[async_trait]
impl ConnectionResolver for StaticConnectionResolver {
    async fn get(&self, organization_id: i64, connection_id: i64) -> Result<ConnectionSettings> {
        self.connections
            .get(&(organization_id, connection_id))
            .cloned()
            .ok_or(EvalError::ConnectionNotFound(connection_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ForecastConfig {
        ForecastConfig {
            data_name: "boiler_temp".to_string(),
            connection_id: 3,
            source_table: "sensors".to_string(),
            time_column: "ts".to_string(),
            target_column: "temp".to_string(),
            discreteness: 600,
            horizon: 60,
            target_storage: TargetStorage::CoLocated,
            methods: vec![
                ForecastMethodBinding::new("XGBoost", "xgb_sensors"),
                ForecastMethodBinding::new("LSTM", "lstm_sensors"),
            ],
        }
    }

    #[test]
    fn derived_target_table_name() {
        let binding = ForecastMethodBinding::derived(7, 3, "LSTM", "temp", "sensors");
        assert_eq!(binding.target_table, "_7_3_LSTM_target_temp_sensors");
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn duplicate_and_reserved_methods_are_rejected() {
        let mut cfg = config();
        cfg.methods.push(ForecastMethodBinding::new("LSTM", "other"));
        assert!(matches!(cfg.validate(), Err(EvalError::InvalidParameter(_))));

        let mut cfg = config();
        cfg.methods = vec![ForecastMethodBinding::new("real", "t")];
        assert!(matches!(cfg.validate(), Err(EvalError::InvalidParameter(_))));
    }

    #[test]
    fn unquotable_table_is_rejected() {
        let mut cfg = config();
        cfg.source_table = "sensors\"; drop table x; --".to_string();
        assert!(matches!(cfg.validate(), Err(EvalError::InvalidIdentifier(_))));
    }

    #[test]
    fn config_uses_stored_field_names() {
        let json = serde_json::to_value(config()).unwrap();
        assert_eq!(json["target_db"], "self_host");
        assert_eq!(json["count_time_points_predict"], 60);
        assert_eq!(json["methods_predict"][0]["method"], "XGBoost");

        let parsed: ForecastConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, config());
    }

    #[test]
    fn only_postgres_connections_are_supported() {
        let mut settings = ConnectionSettings {
            schema: "PostgreSQL".to_string(),
            host: "db".to_string(),
            port: 5432,
            user: "reader".to_string(),
            password: "secret".to_string(),
            db_name: "plant".to_string(),
        };
        assert!(settings.ensure_supported().is_ok());
        assert!(!format!("{:?}", settings).contains("secret"));

        settings.schema = "MySQL".to_string();
        assert!(matches!(
            settings.ensure_supported(),
            Err(EvalError::UnsupportedSchema(s)) if s == "MySQL"
        ));
    }
}
