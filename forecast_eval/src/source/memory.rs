//! In-memory tabular source, used by tests and local demos

use super::{SeriesLocator, Selector, SourceFactory, SourceHandle, TabularSource};
use crate::config::ConnectionSettings;
use crate::data::{TimePoint, TimeSeriesWindow};
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Tables held in memory, keyed by table name.
///
/// Clones share the same tables and close counter.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: Arc<HashMap<String, Vec<TimePoint>>>,
    failing: Arc<HashSet<String>>,
    closed: Arc<AtomicUsize>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table with the given rows
    pub fn with_table(mut self, table: impl Into<String>, window: TimeSeriesWindow) -> Self {
        Arc::make_mut(&mut self.tables).insert(table.into(), window.into_points());
        self
    }

    /// Make every read of `table` fail as a backend error would
    pub fn with_failing_table(mut self, table: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.failing).insert(table.into());
        self
    }

    /// How many times a handle to this source has been closed
    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn rows(&self, table: &str) -> Result<&[TimePoint]> {
        if self.failing.contains(table) {
            return Err(EvalError::Database(sqlx::Error::PoolTimedOut));
        }
        self.tables
            .get(table)
            .map(Vec::as_slice)
            .ok_or_else(|| EvalError::InvalidParameter(format!("table {} does not exist", table)))
    }
}

#[async_trait]
impl TabularSource for MemorySource {
    async fn read(&self, locator: &SeriesLocator, selector: Selector) -> Result<Vec<TimePoint>> {
        let rows = TimeSeriesWindow::new(self.rows(&locator.table)?.to_vec()).into_points();

        let selected = match selector {
            Selector::Latest { limit } => {
                let skip = rows.len().saturating_sub(limit);
                rows.into_iter().skip(skip).rev().collect()
            }
            Selector::Since { from, limit } => rows
                .into_iter()
                .filter(|p| p.time >= from)
                .take(limit)
                .collect(),
            Selector::Range { start, end } => rows
                .into_iter()
                .filter(|p| p.time >= start && p.time <= end)
                .collect(),
        };
        Ok(selected)
    }

    async fn bounds(
        &self,
        locator: &SeriesLocator,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let rows = self.rows(&locator.table)?;
        let min = rows.iter().map(|p| p.time).min();
        let max = rows.iter().map(|p| p.time).max();
        Ok(min.zip(max))
    }

    async fn row_count(&self, locator: &SeriesLocator) -> Result<u64> {
        Ok(self.rows(&locator.table)?.len() as u64)
    }
}

#[async_trait]
impl SourceHandle for MemorySource {
    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory handing out clones of fixed in-memory sources
#[derive(Debug, Clone, Default)]
pub struct MemorySourceFactory {
    source: MemorySource,
    external: MemorySource,
    opened: Arc<AtomicUsize>,
}

impl MemorySourceFactory {
    /// `source` backs every registered connection, `external` the service's own store
    pub fn new(source: MemorySource, external: MemorySource) -> Self {
        Self {
            source,
            external,
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handles opened so far
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Handles closed so far, across both sources
    pub fn close_count(&self) -> usize {
        self.source.close_count() + self.external.close_count()
    }
}

#[async_trait]
impl SourceFactory for MemorySourceFactory {
    async fn open(&self, settings: &ConnectionSettings) -> Result<Box<dyn SourceHandle>> {
        settings.ensure_supported()?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.source.clone()))
    }

    async fn open_external(&self) -> Result<Box<dyn SourceHandle>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.external.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceReader;
    use chrono::{Duration, NaiveDate};

    fn ts(minutes: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(minutes)
    }

    fn source() -> MemorySource {
        let window = TimeSeriesWindow::from_pairs((0..10).map(|i| (ts(i * 10), i as f64)));
        MemorySource::new()
            .with_table("readings", window)
            .with_failing_table("broken")
    }

    fn locator(table: &str) -> SeriesLocator {
        SeriesLocator::new(table, "ts", "value")
    }

    #[tokio::test]
    async fn latest_returns_most_recent_rows_ascending() {
        let source = source();
        let reader = SourceReader::new(&source);
        let window = reader.fetch_latest(&locator("readings"), 3).await;
        assert_eq!(window.values(), vec![7.0, 8.0, 9.0]);
    }

    #[tokio::test]
    async fn since_is_inclusive_and_capped() {
        let source = source();
        let reader = SourceReader::new(&source);
        let window = reader.fetch_since(&locator("readings"), ts(50), 2).await;
        assert_eq!(window.values(), vec![5.0, 6.0]);
    }

    #[tokio::test]
    async fn range_is_closed_on_both_ends() {
        let source = source();
        let reader = SourceReader::new(&source);
        let window = reader.fetch_range(&locator("readings"), ts(20), ts(40)).await;
        assert_eq!(window.values(), vec![2.0, 3.0, 4.0]);
    }

    #[tokio::test]
    async fn limit_is_capped_at_row_ceiling() {
        let source = source();
        let reader = SourceReader::new(&source).with_row_limit(10_000);
        assert_eq!(reader.row_limit(), crate::source::ROW_LIMIT);
    }

    #[tokio::test]
    async fn failures_and_missing_tables_give_empty_windows() {
        let source = source();
        let reader = SourceReader::new(&source);
        assert!(reader.fetch_latest(&locator("broken"), 5).await.is_empty());
        assert!(reader.fetch_latest(&locator("missing"), 5).await.is_empty());
        assert_eq!(reader.time_bounds(&locator("broken")).await, None);
    }

    #[tokio::test]
    async fn bounds_cover_the_table() {
        let source = source();
        let reader = SourceReader::new(&source);
        assert_eq!(
            reader.time_bounds(&locator("readings")).await,
            Some((ts(0), ts(90)))
        );
    }
}
