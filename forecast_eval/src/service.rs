//! Request-level operations behind the forecasting dashboard
//!
//! Every operation resolves the forecast configuration and its connection,
//! opens the databases it needs for the duration of the request, and closes
//! them again before returning, whether the request succeeded or not.

use crate::alignment::align_methods;
use crate::config::{
    ConfigProvider, ConnectionResolver, ConnectionSettings, ForecastConfig,
    ForecastMethodBinding, NewForecastRequest, TargetStorage,
};
use crate::data::{parse_timestamp, TimeSeriesWindow};
use crate::discreteness::estimate_discreteness;
use crate::error::{EvalError, Result};
use crate::horizon::{plan_horizon, TimeUnit};
use crate::metrics::{compute_report_offloaded, MetricReport};
use crate::settings::EngineSettings;
use crate::source::{
    validate_identifier, SeriesLocator, SourceFactory, SourceHandle, SourceReader,
};
use crate::view::{DashboardView, ForecastViewBuilder};
use chrono::{Duration, NaiveDateTime};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

/// Rows sampled when estimating the discreteness of a new series
pub const DISCRETENESS_SAMPLE_ROWS: usize = 100;

/// Dates the metrics page offers for a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    /// Earliest prediction across all methods, if any method has rows
    pub earliest_date: Option<NaiveDateTime>,
    /// Latest real observation
    pub max_date: NaiveDateTime,
    pub start_default_date: NaiveDateTime,
    pub end_default_date: NaiveDateTime,
}

impl DateWindow {
    fn new(earliest_date: Option<NaiveDateTime>, max_date: NaiveDateTime) -> Self {
        Self {
            earliest_date,
            max_date,
            start_default_date: max_date - Duration::days(1),
            end_default_date: max_date,
        }
    }
}

/// Databases opened for one request
struct RequestSources {
    anchor: Box<dyn SourceHandle>,
    external: Option<Box<dyn SourceHandle>>,
}

impl RequestSources {
    /// Where prediction tables are read from
    fn predictions(&self) -> &dyn SourceHandle {
        self.external.as_deref().unwrap_or(self.anchor.as_ref())
    }

    fn anchor(&self) -> &dyn SourceHandle {
        self.anchor.as_ref()
    }

    async fn release(self) {
        self.anchor.close().await;
        if let Some(external) = self.external {
            external.close().await;
        }
    }
}

fn anchor_locator(config: &ForecastConfig) -> SeriesLocator {
    SeriesLocator::new(
        &config.source_table,
        &config.time_column,
        &config.target_column,
    )
}

fn method_locator(config: &ForecastConfig, binding: &ForecastMethodBinding) -> SeriesLocator {
    SeriesLocator::new(
        &binding.target_table,
        &config.time_column,
        &config.target_column,
    )
}

/// Log a failed request: validation problems as warnings, everything else as errors
fn logged<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        if e.is_validation() {
            warn!(operation, error = %e, "request rejected");
        } else {
            error!(operation, error = %e, "request failed");
        }
    }
    result
}

/// Pair method names with their windows, leaving out methods without rows
fn non_empty_methods(
    config: &ForecastConfig,
    windows: Vec<TimeSeriesWindow>,
) -> Vec<(String, TimeSeriesWindow)> {
    config
        .methods
        .iter()
        .zip(windows)
        .filter_map(|(binding, window)| {
            if window.is_empty() {
                warn!(
                    method = %binding.method,
                    table = %binding.target_table,
                    "no predictions, method dropped"
                );
                None
            } else {
                Some((binding.method.clone(), window))
            }
        })
        .collect()
}

/// Forecast accuracy service over pluggable configuration, credentials and data access
#[derive(Debug)]
pub struct ForecastService<P, R, F> {
    configs: P,
    connections: R,
    sources: F,
    settings: EngineSettings,
}

impl<P, R, F> ForecastService<P, R, F>
where
    P: ConfigProvider,
    R: ConnectionResolver,
    F: SourceFactory,
{
    pub fn new(configs: P, connections: R, sources: F, settings: EngineSettings) -> Self {
        Self {
            configs,
            connections,
            sources,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    async fn load(&self, organization_id: i64, data_name: &str) -> Result<ForecastConfig> {
        let config = self.configs.get(organization_id, data_name).await?;
        config.validate()?;
        debug!(
            methods = config.methods.len(),
            table = %config.source_table,
            "loaded forecast config"
        );
        Ok(config)
    }

    async fn connection(
        &self,
        organization_id: i64,
        connection_id: i64,
    ) -> Result<ConnectionSettings> {
        let settings = self.connections.get(organization_id, connection_id).await?;
        settings.ensure_supported()?;
        Ok(settings)
    }

    async fn open_sources(
        &self,
        config: &ForecastConfig,
        connection: &ConnectionSettings,
    ) -> Result<RequestSources> {
        let anchor = self.sources.open(connection).await?;
        let external = match config.target_storage {
            TargetStorage::CoLocated => None,
            TargetStorage::External => match self.sources.open_external().await {
                Ok(handle) => Some(handle),
                Err(e) => {
                    anchor.close().await;
                    return Err(e);
                }
            },
        };
        Ok(RequestSources { anchor, external })
    }

    /// Date bounds for the metrics page of `data_name`.
    ///
    /// The default window is the last day of real data.
    #[instrument(skip(self))]
    pub async fn evaluate_dates(
        &self,
        organization_id: i64,
        data_name: &str,
    ) -> Result<DateWindow> {
        logged(
            "evaluate_dates",
            self.evaluate_dates_inner(organization_id, data_name).await,
        )
    }

    async fn evaluate_dates_inner(
        &self,
        organization_id: i64,
        data_name: &str,
    ) -> Result<DateWindow> {
        let config = self.load(organization_id, data_name).await?;
        if config.methods.is_empty() {
            return Err(EvalError::NoMethods(data_name.to_string()));
        }
        let connection = self.connection(organization_id, config.connection_id).await?;

        let sources = self.open_sources(&config, &connection).await?;
        let result = self.read_date_window(&config, &sources).await;
        sources.release().await;
        result
    }

    async fn read_date_window(
        &self,
        config: &ForecastConfig,
        sources: &RequestSources,
    ) -> Result<DateWindow> {
        let anchor = SourceReader::new(sources.anchor());
        let (_, max_date) = anchor
            .time_bounds(&anchor_locator(config))
            .await
            .ok_or_else(|| EvalError::NoDataInSource(config.source_table.clone()))?;

        let predictions = SourceReader::new(sources.predictions());
        let locators: Vec<SeriesLocator> = config
            .methods
            .iter()
            .map(|binding| method_locator(config, binding))
            .collect();
        let earliest = join_all(locators.iter().map(|l| predictions.time_bounds(l)))
            .await
            .into_iter()
            .flatten()
            .map(|(min, _)| min)
            .min();

        Ok(DateWindow::new(earliest, max_date))
    }

    /// Accuracy of every method of `data_name` over `[start, end]`.
    ///
    /// Methods with no predictions in the range are left out of the report.
    #[instrument(skip(self))]
    pub async fn evaluate_metrics(
        &self,
        organization_id: i64,
        data_name: &str,
        start: &str,
        end: &str,
    ) -> Result<MetricReport> {
        logged(
            "evaluate_metrics",
            self.evaluate_metrics_inner(organization_id, data_name, start, end)
                .await,
        )
    }

    async fn evaluate_metrics_inner(
        &self,
        organization_id: i64,
        data_name: &str,
        start: &str,
        end: &str,
    ) -> Result<MetricReport> {
        let start = parse_timestamp(start)?;
        let end = parse_timestamp(end)?;

        let config = self.load(organization_id, data_name).await?;
        if config.methods.is_empty() {
            return Err(EvalError::NoMethods(data_name.to_string()));
        }
        let connection = self.connection(organization_id, config.connection_id).await?;

        let sources = self.open_sources(&config, &connection).await?;
        let result = self.score_range(&config, &sources, start, end).await;
        sources.release().await;
        result
    }

    async fn score_range(
        &self,
        config: &ForecastConfig,
        sources: &RequestSources,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<MetricReport> {
        let real = SourceReader::new(sources.anchor())
            .fetch_range(&anchor_locator(config), start, end)
            .await;
        if real.is_empty() {
            return Err(EvalError::NoDataInSource(config.source_table.clone()));
        }

        let predictions = SourceReader::new(sources.predictions());
        let locators: Vec<SeriesLocator> = config
            .methods
            .iter()
            .map(|binding| method_locator(config, binding))
            .collect();
        let windows = join_all(
            locators
                .iter()
                .map(|l| predictions.fetch_range(l, start, end)),
        )
        .await;
        let methods = non_empty_methods(config, windows);

        let tolerance = Duration::seconds(self.settings.align_tolerance_secs);
        let frame = align_methods(&real, &methods, tolerance)?;
        info!(
            real_rows = real.len(),
            aligned_rows = frame.height(),
            methods = frame.methods().len(),
            "aligned predictions"
        );

        compute_report_offloaded(frame).await
    }

    /// Chart, legend, download table and accuracy tables for `data_name`
    #[instrument(skip(self))]
    pub async fn build_dashboard_view(
        &self,
        organization_id: i64,
        data_name: &str,
    ) -> Result<DashboardView> {
        logged(
            "build_dashboard_view",
            self.build_dashboard_view_inner(organization_id, data_name)
                .await,
        )
    }

    async fn build_dashboard_view_inner(
        &self,
        organization_id: i64,
        data_name: &str,
    ) -> Result<DashboardView> {
        let config = self.load(organization_id, data_name).await?;
        let connection = self.connection(organization_id, config.connection_id).await?;

        let sources = self.open_sources(&config, &connection).await?;
        let result = self.assemble_view(&config, &sources).await;
        sources.release().await;
        result
    }

    async fn assemble_view(
        &self,
        config: &ForecastConfig,
        sources: &RequestSources,
    ) -> Result<DashboardView> {
        let limit = self.settings.row_limit;
        let anchor = SourceReader::new(sources.anchor())
            .with_row_limit(limit)
            .fetch_latest(&anchor_locator(config), limit)
            .await;
        let first_real = anchor
            .first_time()
            .ok_or_else(|| EvalError::NoDataInSource(config.source_table.clone()))?;

        let predictions = SourceReader::new(sources.predictions()).with_row_limit(limit);
        let locators: Vec<SeriesLocator> = config
            .methods
            .iter()
            .map(|binding| method_locator(config, binding))
            .collect();
        let windows = join_all(
            locators
                .iter()
                .map(|l| predictions.fetch_since(l, first_real, limit)),
        )
        .await;

        let mut builder = ForecastViewBuilder::new(&config.data_name, &config.time_column, anchor);
        for (method, window) in non_empty_methods(config, windows) {
            builder = builder.add_method(method, window);
        }

        let view = tokio::task::spawn_blocking(move || builder.build()).await??;
        Ok(view)
    }

    /// Derive a forecast configuration for a new series.
    ///
    /// Samples the latest rows of the source table to estimate its
    /// discreteness, sizes the horizon from it, and names a prediction table
    /// for every requested method. The result is validated but not stored.
    #[instrument(skip(self, request), fields(data_name = %request.data_name))]
    pub async fn plan_forecast(
        &self,
        organization_id: i64,
        request: NewForecastRequest,
    ) -> Result<ForecastConfig> {
        logged(
            "plan_forecast",
            self.plan_forecast_inner(organization_id, request).await,
        )
    }

    async fn plan_forecast_inner(
        &self,
        organization_id: i64,
        request: NewForecastRequest,
    ) -> Result<ForecastConfig> {
        let unit: TimeUnit = request.time_interval.parse()?;
        for identifier in [
            &request.source_table,
            &request.time_column,
            &request.target_column,
        ] {
            validate_identifier(identifier)?;
        }

        let connection = self
            .connection(organization_id, request.connection_id)
            .await?;
        let locator = SeriesLocator::new(
            &request.source_table,
            &request.time_column,
            &request.target_column,
        );

        let handle = self.sources.open(&connection).await?;
        let sample = SourceReader::new(handle.as_ref())
            .fetch_latest(&locator, DISCRETENESS_SAMPLE_ROWS)
            .await;
        let row_count = handle.row_count(&locator).await;
        handle.close().await;

        if sample.is_empty() {
            return Err(EvalError::NoDataInSource(request.source_table));
        }
        let row_count = row_count?;
        let discreteness = estimate_discreteness(&sample)?;
        let plan = plan_horizon(request.horizon_count, unit, discreteness, row_count)?;
        info!(
            discreteness,
            row_count,
            total_seconds = plan.total_seconds,
            raw_points = plan.raw_points,
            points = plan.points,
            "planned forecast horizon"
        );

        let methods = request
            .methods
            .iter()
            .map(|method| {
                ForecastMethodBinding::derived(
                    organization_id,
                    request.connection_id,
                    method,
                    &request.target_column,
                    &request.source_table,
                )
            })
            .collect();

        let config = ForecastConfig {
            data_name: request.data_name,
            connection_id: request.connection_id,
            source_table: request.source_table,
            time_column: request.time_column,
            target_column: request.target_column,
            discreteness,
            horizon: plan.points as usize,
            target_storage: request.target_storage,
            methods,
        };
        config.validate()?;
        Ok(config)
    }
}
