//! Dashboard payload: anchor data, forecast segments, legend and accuracy tables

use crate::alignment::{last_known_time, pair_nearest, split_segments};
use crate::data::{TimePoint, TimeSeriesWindow};
use crate::error::{EvalError, Result};
use crate::metrics::{comparison_rows, ComparisonRow, ExtendedMetricSet};
use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::io;

/// Timestamp format used in downloadable tables
pub const DOWNLOAD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Key prefix for a method's forecast line in the chart data
pub const PREDICTION_KEY_PREFIX: &str = "actual_prediction_";

const LAST_KNOWN_COLOR: &str = "#A9A9A9";
const REAL_DATA_COLOR: &str = "#0000FF";
const ENSEMBLE_COLOR: &str = "#FFFF00";

/// Colors for methods without a fixed legend entry, assigned in order
const FALLBACK_COLORS: [&str; 4] = ["#E377C2", "#8C564B", "#17BECF", "#BCBD22"];

/// Methods with a fixed position and color in the legend
const KNOWN_METHODS: [(&str, &str); 2] = [("LSTM", "#FFA500"), ("XGBoost", "#a7f3d0")];

/// The same caption in every dashboard language
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalizedText {
    pub en: String,
    pub ru: String,
    pub zh: String,
    pub it: String,
    pub fr: String,
    pub de: String,
}

impl LocalizedText {
    fn from_parts(parts: [&str; 6]) -> Self {
        let [en, ru, zh, it, fr, de] = parts.map(str::to_string);
        Self {
            en,
            ru,
            zh,
            it,
            fr,
            de,
        }
    }

    /// Caption for a method's current forecast line
    pub fn method_forecast(method: &str) -> Self {
        Self {
            en: format!("{} current forecast", method),
            ru: format!("{} актуальный прогноз", method),
            zh: format!("{} 当前预测", method),
            it: format!("Previsione attuale {}", method),
            fr: format!("Prévision actuelle {}", method),
            de: format!("Aktuelle {}-Vorhersage", method),
        }
    }

    /// Caption for a method's accuracy table
    pub fn metrics_caption(method: &str) -> Self {
        Self {
            en: format!("Forecast accuracy metrics for {}", method),
            ru: format!("Метрики точности прогноза для {}", method),
            zh: format!("{} 预测准确性指标", method),
            it: format!("Metriche di accuratezza delle previsioni per {}", method),
            fr: format!("Métriques de précision des prévisions pour {}", method),
            de: format!("Prognosegenauigkeitsmetriken für {}", method),
        }
    }
}

/// One plotted line in the legend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub text: LocalizedText,
    pub color: String,
}

/// Legend lines keyed by `<name>_line`, in plotting order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Legend {
    entries: Vec<(String, LegendEntry)>,
}

impl Legend {
    /// Fixed lines, the known methods, then one generated line per other method.
    ///
    /// The ensemble line is always listed even though nothing populates it.
    pub fn for_methods(methods: &[String]) -> Self {
        let mut legend = Legend::default();
        legend.push(
            "last_know_data_line",
            LocalizedText::from_parts([
                "Last known date",
                "Последняя известная дата",
                "最后已知日期",
                "Ultima data conosciuta",
                "Dernière date connue",
                "Letztes bekanntes Datum",
            ]),
            LAST_KNOWN_COLOR,
        );
        legend.push(
            "real_data_line",
            LocalizedText::from_parts([
                "Real data",
                "Реальные данные",
                "真实数据",
                "Dati reali",
                "Données réelles",
                "Echte Daten",
            ]),
            REAL_DATA_COLOR,
        );

        for (method, color) in KNOWN_METHODS {
            legend.push(
                &format!("{}_data_line", method),
                LocalizedText::method_forecast(method),
                color,
            );
        }

        let extra = methods
            .iter()
            .filter(|m| !KNOWN_METHODS.iter().any(|(known, _)| *known == m.as_str()));
        for (method, color) in extra.zip(FALLBACK_COLORS.iter().cycle()) {
            legend.push(
                &format!("{}_data_line", method),
                LocalizedText::method_forecast(method),
                color,
            );
        }

        legend.push(
            "Ensemble_data_line",
            LocalizedText::from_parts([
                "Ensemble forecast",
                "Ансамбль прогноз",
                "集成预测",
                "Previsione dell'ensemble",
                "Prévision d'ensemble",
                "Ensemble-Vorhersage",
            ]),
            ENSEMBLE_COLOR,
        );
        legend
    }

    fn push(&mut self, key: &str, text: LocalizedText, color: &str) {
        self.entries.push((
            key.to_string(),
            LegendEntry {
                text,
                color: color.to_string(),
            },
        ));
    }

    pub fn get(&self, key: &str) -> Option<&LegendEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for Legend {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

/// Series plotted on the main chart
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartData {
    /// Recent real points
    pub last_real_data: Vec<TimePoint>,
    /// Per method: the last real point followed by its display segment
    pub predictions: Vec<(String, Vec<TimePoint>)>,
    /// Combined forecast line; never computed
    pub ensemble: Option<Vec<TimePoint>>,
}

impl ChartData {
    pub fn prediction(&self, method: &str) -> Option<&[TimePoint]> {
        self.predictions
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, points)| points.as_slice())
    }
}

impl Serialize for ChartData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.predictions.len() + 2))?;
        map.serialize_entry("last_real_data", &self.last_real_data)?;
        for (method, points) in &self.predictions {
            let key = format!("{}{}", PREDICTION_KEY_PREFIX, method.to_lowercase());
            map.serialize_entry(&key, points)?;
        }
        map.serialize_entry("ensemble", &self.ensemble)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapData {
    pub data: ChartData,
    pub last_know_data: NaiveDateTime,
    pub legend: Legend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Description {
    pub sensor_name: String,
    pub data_name: Option<String>,
}

/// Accuracy of one method over the points it predicted for already observed times
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodAccuracy {
    /// Each evaluation point paired with its nearest real point
    pub metrics_table: Vec<ComparisonRow>,
    /// Aggregate metrics over the same pairs
    pub summary: ExtendedMetricSet,
    pub text: LocalizedText,
}

/// Accuracy tables keyed by method, in configuration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodTables {
    entries: Vec<(String, MethodAccuracy)>,
}

impl MethodTables {
    pub fn get(&self, method: &str) -> Option<&MethodAccuracy> {
        self.entries.iter().find(|(m, _)| m == method).map(|(_, a)| a)
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(m, _)| m.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for MethodTables {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

/// A row of the downloadable table
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRow {
    pub time: NaiveDateTime,
    /// One value per method column; the primary method is always present
    pub values: Vec<Option<f64>>,
}

/// Flat forecast table offered for download.
///
/// Rows come from the primary method. Other methods are merged in as extra
/// columns where their timestamps coincide with the primary's.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableToDownload {
    time_column: String,
    methods: Vec<String>,
    rows: Vec<DownloadRow>,
}

impl TableToDownload {
    fn build(time_column: &str, forecasts: &[(String, Vec<TimePoint>)]) -> Self {
        let Some((primary, primary_points)) = forecasts.first() else {
            return Self {
                time_column: time_column.to_string(),
                ..Self::default()
            };
        };

        let others: Vec<(&String, HashMap<NaiveDateTime, f64>)> = forecasts[1..]
            .iter()
            .map(|(method, points)| {
                let mut by_time = HashMap::with_capacity(points.len());
                for p in points {
                    by_time.entry(p.time).or_insert(p.value);
                }
                (method, by_time)
            })
            .collect();

        let rows = primary_points
            .iter()
            .map(|p| {
                let mut values = Vec::with_capacity(others.len() + 1);
                values.push(Some(p.value));
                values.extend(others.iter().map(|(_, by_time)| by_time.get(&p.time).copied()));
                DownloadRow {
                    time: p.time,
                    values,
                }
            })
            .collect();

        let mut methods = vec![primary.clone()];
        methods.extend(others.into_iter().map(|(m, _)| m.clone()));

        Self {
            time_column: time_column.to_string(),
            methods,
            rows,
        }
    }

    /// Column names: the time column, then one per method
    pub fn headers(&self) -> Vec<&str> {
        std::iter::once(self.time_column.as_str())
            .chain(self.methods.iter().map(String::as_str))
            .collect()
    }

    pub fn rows(&self) -> &[DownloadRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table as CSV with a header row. Missing values are empty cells.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.headers())?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(row.values.len() + 1);
            record.push(row.time.format(DOWNLOAD_TIME_FORMAT).to_string());
            record.extend(
                row.values
                    .iter()
                    .map(|v| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

struct RecordRef<'a> {
    table: &'a TableToDownload,
    row: &'a DownloadRow,
}

impl Serialize for RecordRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.row.values.len() + 1))?;
        map.serialize_entry(&self.table.time_column, &self.row.time)?;
        for (method, value) in self.table.methods.iter().zip(&self.row.values) {
            map.serialize_entry(method, value)?;
        }
        map.end()
    }
}

impl Serialize for TableToDownload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RecordRef { table: self, row })?;
        }
        seq.end()
    }
}

/// Everything the dashboard needs to draw one forecasted series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    #[serde(skip)]
    pub data_name: String,
    pub description: Description,
    pub map_data: MapData,
    pub table_to_download: TableToDownload,
    pub metrix_tables: MethodTables,
}

impl DashboardView {
    /// The payload wrapped as `[{"<data_name>": {...}}]`
    pub fn to_keyed_json(&self) -> Result<serde_json::Value> {
        let mut keyed = serde_json::Map::new();
        keyed.insert(self.data_name.clone(), serde_json::to_value(self)?);
        Ok(serde_json::Value::Array(vec![serde_json::Value::Object(keyed)]))
    }
}

/// Assembles a [`DashboardView`] from the anchor window and each method's predictions
#[derive(Debug, Clone)]
pub struct ForecastViewBuilder {
    data_name: String,
    time_column: String,
    anchor: TimeSeriesWindow,
    methods: Vec<(String, TimeSeriesWindow)>,
}

impl ForecastViewBuilder {
    pub fn new(
        data_name: impl Into<String>,
        time_column: impl Into<String>,
        anchor: TimeSeriesWindow,
    ) -> Self {
        Self {
            data_name: data_name.into(),
            time_column: time_column.into(),
            anchor,
            methods: Vec::new(),
        }
    }

    /// Add a method's predictions. Methods are shown in the order added; an
    /// empty window leaves the method out of every section.
    pub fn add_method(mut self, method: impl Into<String>, predictions: TimeSeriesWindow) -> Self {
        if !predictions.is_empty() {
            self.methods.push((method.into(), predictions));
        }
        self
    }

    pub fn build(self) -> Result<DashboardView> {
        let boundary = *self
            .anchor
            .last()
            .ok_or_else(|| EvalError::NoDataInSource(self.data_name.clone()))?;
        let last_known = last_known_time(&self.anchor).unwrap_or(boundary.time);

        let mut predictions = Vec::with_capacity(self.methods.len());
        let mut tables = MethodTables::default();
        let mut forecasts = Vec::new();

        for (method, window) in &self.methods {
            let segments = split_segments(window, last_known);

            let mut line = Vec::with_capacity(segments.display.len() + 1);
            line.push(boundary);
            line.extend_from_slice(segments.display.points());

            if !segments.display.is_empty() {
                forecasts.push((method.clone(), line.clone()));
            }
            predictions.push((method.clone(), line));

            let paired = pair_nearest(&segments.evaluation, &self.anchor);
            tables.entries.push((
                method.clone(),
                MethodAccuracy {
                    metrics_table: comparison_rows(&paired),
                    summary: ExtendedMetricSet::from_paired(&paired)?,
                    text: LocalizedText::metrics_caption(method),
                },
            ));
        }

        let method_names: Vec<String> = self.methods.iter().map(|(m, _)| m.clone()).collect();

        Ok(DashboardView {
            description: Description {
                sensor_name: self.data_name.clone(),
                data_name: None,
            },
            map_data: MapData {
                data: ChartData {
                    last_real_data: self.anchor.points().to_vec(),
                    predictions,
                    ensemble: None,
                },
                last_know_data: last_known,
                legend: Legend::for_methods(&method_names),
            },
            table_to_download: TableToDownload::build(&self.time_column, &forecasts),
            metrix_tables: tables,
            data_name: self.data_name,
        })
    }
}
