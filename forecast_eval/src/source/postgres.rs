//! PostgreSQL tabular source

use super::{quote_identifier, SeriesLocator, Selector, SourceFactory, SourceHandle, TabularSource};
use crate::config::ConnectionSettings;
use crate::data::TimePoint;
use crate::error::{EvalError, Result};
use crate::settings::EngineSettings;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::debug;

/// Connection pool to one Postgres database, opened for a single request
#[derive(Debug, Clone)]
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    /// Connect to the database behind a registered connection
    pub async fn connect(settings: &ConnectionSettings, max_connections: u32) -> Result<Self> {
        settings.ensure_supported()?;
        let options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.db_name);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        debug!(host = %settings.host, db = %settings.db_name, "opened source pool");
        Ok(Self { pool })
    }

    /// Connect using a database URL
    pub async fn connect_url(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }
}

/// Build the SELECT for a series read.
///
/// Times are cast to `timestamp` (dropping any zone) and values to
/// `double precision`; rows with a NULL time or value are skipped.
pub fn build_select(locator: &SeriesLocator, selector: &Selector) -> String {
    let table = quote_identifier(&locator.table);
    let time = quote_identifier(&locator.time_column);
    let value = quote_identifier(&locator.target_column);
    let head = format!(
        "SELECT {time}::timestamp AS ts, {value}::double precision AS value FROM {table} \
         WHERE {time} IS NOT NULL AND {value} IS NOT NULL"
    );

    match selector {
        Selector::Latest { .. } => format!("{head} ORDER BY {time} DESC LIMIT $1"),
        Selector::Since { .. } => format!("{head} AND {time} >= $1 ORDER BY {time} ASC LIMIT $2"),
        Selector::Range { .. } => {
            format!("{head} AND {time} BETWEEN $1 AND $2 ORDER BY {time} ASC")
        }
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl TabularSource for PgSource {
    async fn read(&self, locator: &SeriesLocator, selector: Selector) -> Result<Vec<TimePoint>> {
        let sql = build_select(locator, &selector);
        let query = sqlx::query_as::<_, (NaiveDateTime, f64)>(&sql);
        let query = match selector {
            Selector::Latest { limit } => query.bind(limit_param(limit)),
            Selector::Since { from, limit } => query.bind(from).bind(limit_param(limit)),
            Selector::Range { start, end } => query.bind(start).bind(end),
        };

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|(time, value)| TimePoint::new(time, value))
            .collect())
    }

    async fn bounds(
        &self,
        locator: &SeriesLocator,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let time = quote_identifier(&locator.time_column);
        let sql = format!(
            "SELECT MIN({time})::timestamp, MAX({time})::timestamp FROM {}",
            quote_identifier(&locator.table)
        );
        let (min, max): (Option<NaiveDateTime>, Option<NaiveDateTime>) =
            sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(min.zip(max))
    }

    async fn row_count(&self, locator: &SeriesLocator) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&locator.table));
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl SourceHandle for PgSource {
    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Opens a fresh pool per request
#[derive(Debug, Clone)]
pub struct PgSourceFactory {
    max_connections: u32,
    external_url: Option<String>,
}

impl PgSourceFactory {
    pub fn new(max_connections: u32, external_url: Option<String>) -> Self {
        Self {
            max_connections,
            external_url,
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(
            settings.pg_max_connections,
            settings.external_database_url.clone(),
        )
    }
}

#[async_trait]
impl SourceFactory for PgSourceFactory {
    async fn open(&self, settings: &ConnectionSettings) -> Result<Box<dyn SourceHandle>> {
        Ok(Box::new(PgSource::connect(settings, self.max_connections).await?))
    }

    async fn open_external(&self) -> Result<Box<dyn SourceHandle>> {
        let url = self.external_url.as_deref().ok_or_else(|| {
            EvalError::InvalidParameter(
                "external prediction database is not configured".to_string(),
            )
        })?;
        Ok(Box::new(PgSource::connect_url(url, self.max_connections).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn locator() -> SeriesLocator {
        SeriesLocator::new("sensor data", "ts", "temp")
    }

    #[test]
    fn latest_query_orders_descending() {
        let sql = build_select(&locator(), &Selector::Latest { limit: 300 });
        assert_eq!(
            sql,
            "SELECT \"ts\"::timestamp AS ts, \"temp\"::double precision AS value \
             FROM \"sensor data\" WHERE \"ts\" IS NOT NULL AND \"temp\" IS NOT NULL \
             ORDER BY \"ts\" DESC LIMIT $1"
        );
    }

    #[test]
    fn range_query_is_inclusive() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let sql = build_select(&locator(), &Selector::Range { start: day, end: day });
        assert!(sql.ends_with("AND \"ts\" BETWEEN $1 AND $2 ORDER BY \"ts\" ASC"));
    }

    #[test]
    fn since_query_binds_start_and_limit() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let sql = build_select(&locator(), &Selector::Since { from: day, limit: 10 });
        assert!(sql.contains("\"ts\" >= $1"));
        assert!(sql.ends_with("LIMIT $2"));
    }
}
