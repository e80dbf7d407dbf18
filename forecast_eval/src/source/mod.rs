//! Reading time series windows from tabular sources
//!
//! A [`TabularSource`] is any backend that can return `(timestamp, value)`
//! rows for a table/time-column/target-column triple. [`SourceReader`] wraps
//! a source and applies the read contract used by the engine: a failed read
//! or a read with no rows produces an empty window instead of an error.

use crate::config::ConnectionSettings;
use crate::data::{TimePoint, TimeSeriesWindow};
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::{debug, warn};

pub mod memory;
pub mod postgres;

pub use memory::{MemorySource, MemorySourceFactory};
pub use postgres::{PgSource, PgSourceFactory};

/// Maximum number of rows a single read may return
pub const ROW_LIMIT: usize = 300;

/// Longest identifier Postgres keeps without truncation
const MAX_IDENTIFIER_LEN: usize = 63;

/// Table and columns a series is read from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesLocator {
    pub table: String,
    pub time_column: String,
    pub target_column: String,
}

impl SeriesLocator {
    pub fn new(
        table: impl Into<String>,
        time_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            time_column: time_column.into(),
            target_column: target_column.into(),
        }
    }
}

/// Which rows of a series to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// The most recent `limit` rows
    Latest { limit: usize },
    /// Rows at or after `from`, oldest first, at most `limit`
    Since { from: NaiveDateTime, limit: usize },
    /// Rows with `start <= time <= end`
    Range {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// Backend able to read timestamped values from a table
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Read rows matching `selector`. Order is not guaranteed.
    async fn read(&self, locator: &SeriesLocator, selector: Selector) -> Result<Vec<TimePoint>>;

    /// Earliest and latest timestamp in the table, `None` when it is empty
    async fn bounds(
        &self,
        locator: &SeriesLocator,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime)>>;

    /// Number of rows in the table
    async fn row_count(&self, locator: &SeriesLocator) -> Result<u64>;
}

/// A source opened for a single request that must be closed afterwards
#[async_trait]
pub trait SourceHandle: TabularSource {
    async fn close(&self);
}

/// Opens request-scoped source handles
#[async_trait]
pub trait SourceFactory: Send + Sync {
    /// Open the database behind a registered connection
    async fn open(&self, settings: &ConnectionSettings) -> Result<Box<dyn SourceHandle>>;

    /// Open the service's own database, where external prediction tables live
    async fn open_external(&self) -> Result<Box<dyn SourceHandle>>;
}

/// Quote a table or column name for use in SQL
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Reject identifiers that cannot be stored and quoted safely.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(EvalError::InvalidIdentifier("identifier is empty".to_string()));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(EvalError::InvalidIdentifier(format!(
            "'{}' is longer than {} bytes",
            name, MAX_IDENTIFIER_LEN
        )));
    }
    if name.contains('"') || name.contains('\0') {
        return Err(EvalError::InvalidIdentifier(format!(
            "'{}' contains a quote or NUL character",
            name.escape_default()
        )));
    }
    Ok(())
}

/// Reads windows from a source, turning failures into empty windows
#[derive(Debug)]
pub struct SourceReader<'a, S: TabularSource + ?Sized> {
    source: &'a S,
    row_limit: usize,
}

impl<'a, S: TabularSource + ?Sized> SourceReader<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            row_limit: ROW_LIMIT,
        }
    }

    /// Use a smaller row limit. Values above [`ROW_LIMIT`] are capped.
    pub fn with_row_limit(mut self, limit: usize) -> Self {
        self.row_limit = limit.min(ROW_LIMIT);
        self
    }

    pub fn row_limit(&self) -> usize {
        self.row_limit
    }

    /// Most recent `limit` rows, ascending by time
    pub async fn fetch_latest(&self, locator: &SeriesLocator, limit: usize) -> TimeSeriesWindow {
        let limit = limit.min(self.row_limit);
        self.read_window(locator, Selector::Latest { limit }).await
    }

    /// Rows at or after `from`, ascending, at most `limit`
    pub async fn fetch_since(
        &self,
        locator: &SeriesLocator,
        from: NaiveDateTime,
        limit: usize,
    ) -> TimeSeriesWindow {
        let limit = limit.min(self.row_limit);
        self.read_window(locator, Selector::Since { from, limit }).await
    }

    /// Rows within `[start, end]`, ascending
    pub async fn fetch_range(
        &self,
        locator: &SeriesLocator,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> TimeSeriesWindow {
        self.read_window(locator, Selector::Range { start, end }).await
    }

    /// Earliest and latest timestamp, `None` on error or an empty table
    pub async fn time_bounds(
        &self,
        locator: &SeriesLocator,
    ) -> Option<(NaiveDateTime, NaiveDateTime)> {
        match self.source.bounds(locator).await {
            Ok(bounds) => bounds,
            Err(e) => {
                warn!(table = %locator.table, error = %e, "failed to read time bounds");
                None
            }
        }
    }

    async fn read_window(&self, locator: &SeriesLocator, selector: Selector) -> TimeSeriesWindow {
        match self.source.read(locator, selector).await {
            Ok(points) => {
                debug!(table = %locator.table, rows = points.len(), ?selector, "read window");
                let mut points = TimeSeriesWindow::new(points).into_points();
                match selector {
                    Selector::Latest { limit } if points.len() > limit => {
                        points.drain(..points.len() - limit);
                    }
                    Selector::Since { limit, .. } => points.truncate(limit),
                    _ => {}
                }
                TimeSeriesWindow::new(points)
            }
            Err(e) => {
                warn!(table = %locator.table, error = %e, "read failed, using empty window");
                TimeSeriesWindow::empty()
            }
        }
    }
}
