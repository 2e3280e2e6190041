//! Composition root: charts, bar clicks, example tables.
//!
//! The explorer owns the parsed report, the selection slot, the fetcher and
//! the table for the active system. A bar click is split into
//! [`ResultsExplorer::begin_bar_click`] (record the selection, get a ticket),
//! the fetch itself, and [`ResultsExplorer::commit`] (feed the outcome back
//! through the token check), so several clicks can be in flight and only
//! the newest lands.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::client::{DataProvider, ExampleRecord};
use crate::error::{ExplorerError, FetchError};
use crate::fetcher::{BucketRequest, ExampleFetcher};
use crate::logging::{log, obj, v_int, v_str, Domain, Level};
use crate::results::{ComparisonReport, ConfidenceInterval, FeatureSeries, MetricPane, SystemInfo};
use crate::selection::{RequestToken, Selection, SelectionEvent, SelectionState, Transition};
use crate::table::{Column, PaginatedTableView, PaginationProps, RendererRegistry, Row, TableSource};

/// Level whose cases are plain ids; anything else is shown as-is.
const EXAMPLE_LEVEL: &str = "example";

/// Combo (two-feature) charts drill into one system's entry rather than a
/// bar shared by every system.
pub fn is_combo_feature(feature: &str) -> bool {
    feature.to_lowercase().starts_with("combo")
}

/// Everything a bar chart widget needs for one feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartProps {
    pub feature: String,
    pub title: String,
    /// Clicks go through [`ResultsExplorer::on_entry_click`].
    pub combo: bool,
    pub series_names: Vec<String>,
    pub x_axis: Vec<String>,
    /// One array per system.
    pub values: Vec<Vec<f64>>,
    pub sample_counts: Vec<Vec<u64>>,
    pub confidence: Vec<Vec<Option<ConfidenceInterval>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableProps {
    pub title: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub loading: bool,
    pub pagination: PaginationProps,
    pub range_label: String,
}

/// Transient user-facing message (a failed fetch).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub message: String,
}

/// A launched bar click: the token to commit under and one request per system.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTicket {
    pub token: RequestToken,
    pub requests: Vec<BucketRequest>,
}

/// Bucket boundaries of a feature, used for chart layout.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketIntervals {
    pub min: f64,
    pub max: f64,
    pub bounds: Vec<f64>,
}

pub struct ResultsExplorer {
    report: ComparisonReport,
    active_metric: Option<String>,
    selection: SelectionState,
    fetcher: ExampleFetcher,
    table: Option<PaginatedTableView>,
    registry: RendererRegistry,
    descriptions: HashMap<String, String>,
    notice: Option<Notice>,
}

impl ResultsExplorer {
    pub fn new(report: ComparisonReport, provider: Arc<dyn DataProvider>) -> Self {
        let active_metric = report.metrics.first().map(|m| m.metric.clone());
        Self {
            report,
            active_metric,
            selection: SelectionState::new(),
            fetcher: ExampleFetcher::new(provider),
            table: None,
            registry: RendererRegistry::with_defaults(),
            descriptions: HashMap::new(),
            notice: None,
        }
    }

    pub fn with_registry(mut self, registry: RendererRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Feature key -> human-readable column title.
    pub fn with_descriptions(mut self, descriptions: HashMap<String, String>) -> Self {
        self.descriptions = descriptions;
        self
    }

    pub fn report(&self) -> &ComparisonReport {
        &self.report
    }

    pub fn systems(&self) -> &[SystemInfo] {
        &self.report.systems
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn table(&self) -> Option<&PaginatedTableView> {
        self.table.as_ref()
    }

    pub fn fetcher(&self) -> ExampleFetcher {
        self.fetcher.clone()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn active_metric(&self) -> Option<&str> {
        self.active_metric.as_deref()
    }

    fn active_pane(&self) -> Option<&MetricPane> {
        self.report.metric(self.active_metric.as_deref()?)
    }

    /// Switch metric tab. Clears the selection and example table; returns
    /// false for an unknown metric.
    pub fn set_active_metric(&mut self, metric: &str) -> bool {
        if self.report.metric(metric).is_none() {
            return false;
        }
        if self.active_metric.as_deref() == Some(metric) {
            return true;
        }
        self.active_metric = Some(metric.to_string());
        self.selection.dispatch(SelectionEvent::MetricChanged);
        self.table = None;
        self.notice = None;
        log(Level::Info, Domain::Explorer, "metric_changed", obj(&[("metric", v_str(metric))]));
        true
    }

    fn chart_title(&self, pane: &MetricPane, feature: &FeatureSeries) -> String {
        format!("{} by {}", pane.metric, feature.description)
    }

    pub fn charts(&self) -> Vec<ChartProps> {
        let Some(pane) = self.active_pane() else {
            return Vec::new();
        };
        let series_names: Vec<String> = self.report.systems.iter().map(|s| s.system_name.clone()).collect();
        pane.features
            .iter()
            .map(|feature| ChartProps {
                feature: feature.feature.clone(),
                title: self.chart_title(pane, feature),
                combo: is_combo_feature(&feature.feature),
                series_names: series_names.clone(),
                x_axis: feature.labels(),
                values: feature.per_system.iter().map(|s| s.values()).collect(),
                sample_counts: feature.per_system.iter().map(|s| s.sample_counts()).collect(),
                confidence: feature.per_system.iter().map(|s| s.confidence()).collect(),
            })
            .collect()
    }

    /// Record a bar click and prepare one request per system.
    pub fn begin_bar_click(
        &mut self,
        feature: &str,
        bucket_index: usize,
        system_index: usize,
    ) -> Result<FetchTicket, ExplorerError> {
        let invalid = || ExplorerError::InvalidSelection {
            feature: feature.to_string(),
            bucket_index,
            system_index,
        };
        let pane = self.active_pane().ok_or_else(invalid)?;
        let series = pane.feature(feature).ok_or_else(invalid)?;
        if system_index >= self.report.systems.len() {
            return Err(invalid());
        }
        let samples = series.bucket_samples(bucket_index).ok_or_else(invalid)?;
        let requests: Vec<BucketRequest> = self
            .report
            .systems
            .iter()
            .zip(samples)
            .map(|(system, ids)| BucketRequest {
                system_id: system.system_id.clone(),
                level: series.level.clone(),
                ids,
            })
            .collect();

        let selection = Selection {
            feature: feature.to_string(),
            bucket_index,
            system_index,
        };
        self.launch("bar_clicked", selection, requests).ok_or_else(invalid)
    }

    /// Record a click on one system's entry of a combo chart. Only that
    /// system is asked for its examples, always at the example level.
    ///
    /// `Ok(None)` when `bar_index` is past the system's entries; nothing
    /// changes then.
    pub fn begin_entry_click(
        &mut self,
        feature: &str,
        bar_index: usize,
        system_index: usize,
    ) -> Result<Option<FetchTicket>, ExplorerError> {
        let invalid = || ExplorerError::InvalidSelection {
            feature: feature.to_string(),
            bucket_index: bar_index,
            system_index,
        };
        if !is_combo_feature(feature) {
            return Err(invalid());
        }
        let pane = self.active_pane().ok_or_else(invalid)?;
        let series = pane.feature(feature).ok_or_else(invalid)?;
        let entries = series.per_system.get(system_index).ok_or_else(invalid)?;
        let Some(entry) = entries.buckets.get(bar_index) else {
            return Ok(None);
        };
        let requests: Vec<BucketRequest> = self
            .report
            .systems
            .iter()
            .enumerate()
            .map(|(i, system)| BucketRequest {
                system_id: system.system_id.clone(),
                level: EXAMPLE_LEVEL.to_string(),
                ids: if i == system_index { entry.samples.clone() } else { Vec::new() },
            })
            .collect();

        let selection = Selection {
            feature: feature.to_string(),
            bucket_index: bar_index,
            system_index,
        };
        self.launch("entry_clicked", selection, requests).map(Some).ok_or_else(invalid)
    }

    fn launch(&mut self, event: &str, selection: Selection, requests: Vec<BucketRequest>) -> Option<FetchTicket> {
        let fields = obj(&[
            ("feature", v_str(&selection.feature)),
            ("bucket", v_int(selection.bucket_index as u64)),
            ("system", v_int(selection.system_index as u64)),
        ]);
        match self.selection.dispatch(SelectionEvent::BarClicked(selection)) {
            Transition::FetchRequested(token) => {
                let mut fields = fields;
                fields.insert("request_token".to_string(), v_int(token.0));
                log(Level::Info, Domain::Explorer, event, fields);
                Some(FetchTicket { token, requests })
            }
            _ => None,
        }
    }

    /// Feed a finished fetch back in. Results for superseded clicks are
    /// dropped (`Transition::Stale`).
    pub fn commit(
        &mut self,
        token: RequestToken,
        result: Result<Vec<Vec<ExampleRecord>>, FetchError>,
    ) -> Transition {
        let event = match result {
            Ok(records) => SelectionEvent::ExamplesLoaded { token, records },
            Err(error) => SelectionEvent::FetchFailed { token, error },
        };
        let transition = self.selection.dispatch(event);
        match &transition {
            Transition::Committed => {
                self.notice = None;
                self.sync_table();
            }
            Transition::Failed(err) => self.raise(err),
            Transition::Stale => log(
                Level::Debug,
                Domain::Explorer,
                "stale_result_dropped",
                obj(&[("request_token", v_int(token.0))]),
            ),
            _ => {}
        }
        transition
    }

    /// Click, fetch every system, commit, and load the first table page.
    pub async fn on_bar_click(
        &mut self,
        feature: &str,
        bucket_index: usize,
        system_index: usize,
    ) -> Result<Transition, ExplorerError> {
        let ticket = self.begin_bar_click(feature, bucket_index, system_index)?;
        let result = self.fetcher.clone().fetch(&ticket.requests).await;
        let transition = self.commit(ticket.token, result);
        if transition == Transition::Committed {
            self.refresh_table().await;
        }
        Ok(transition)
    }

    /// Click, fetch the one system, commit, and load the first table page.
    pub async fn on_entry_click(
        &mut self,
        feature: &str,
        bar_index: usize,
        system_index: usize,
    ) -> Result<Transition, ExplorerError> {
        let Some(ticket) = self.begin_entry_click(feature, bar_index, system_index)? else {
            return Ok(Transition::Ignored);
        };
        let result = self.fetcher.clone().fetch(&ticket.requests).await;
        let transition = self.commit(ticket.token, result);
        if transition == Transition::Committed {
            self.refresh_table().await;
        }
        Ok(transition)
    }

    /// Show another system's examples for the committed selection.
    pub fn set_active_system(&mut self, system_index: usize) -> Transition {
        let transition = self.selection.dispatch(SelectionEvent::ActiveSystemChanged(system_index));
        if transition == Transition::SystemSwitched {
            self.sync_table();
        }
        transition
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
        self.selection.dispatch(SelectionEvent::ErrorDismissed);
    }

    fn raise(&mut self, err: &FetchError) {
        log(
            Level::Warn,
            Domain::Explorer,
            "notice",
            obj(&[("error", v_str(&err.message())), ("error_code", v_str(&err.error_code.to_string()))]),
        );
        self.notice = Some(Notice { message: err.message() });
    }

    /// Point the table at the committed selection's active system.
    fn sync_table(&mut self) {
        let Some(committed) = self.selection.committed() else {
            self.table = None;
            return;
        };
        let system_index = committed.selection.system_index;
        let Some(system) = self.report.systems.get(system_index) else {
            return;
        };
        let feature = &committed.selection.feature;
        let level = if is_combo_feature(feature) {
            EXAMPLE_LEVEL.to_string()
        } else {
            self.active_pane()
                .and_then(|p| p.feature(feature))
                .map(|f| f.level.clone())
                .unwrap_or_else(|| EXAMPLE_LEVEL.to_string())
        };
        let records = committed.records.get(system_index).cloned().unwrap_or_default();
        let source = if level == EXAMPLE_LEVEL {
            TableSource::Ids(records.into_iter().map(|r| r.sample_id).collect())
        } else {
            TableSource::Composite(records)
        };
        match self.table.as_mut() {
            Some(table) => table.set_source(&system.system_id, source),
            None => {
                self.table = Some(
                    PaginatedTableView::new(&self.report.task, &system.system_id, source)
                        .with_descriptions(self.descriptions.clone()),
                )
            }
        }
    }

    /// Load the table's current window if needed. Failures become a notice.
    pub async fn refresh_table(&mut self) -> bool {
        let provider = self.fetcher.provider().clone();
        let Some(table) = self.table.as_mut() else {
            return false;
        };
        match table.refresh(provider.as_ref()).await {
            Ok(fetched) => fetched,
            Err(err) => {
                self.raise(&err);
                false
            }
        }
    }

    /// Table widget callback; 1-based page.
    pub fn on_page_change(&mut self, ui_page: usize) {
        if let Some(table) = self.table.as_mut() {
            table.on_page_change(ui_page);
        }
    }

    /// "Examples from bar # 3 in Accuracy by text length"
    pub fn example_title(&self) -> Option<String> {
        let committed = self.selection.committed()?;
        let pane = self.active_pane()?;
        let feature = pane.feature(&committed.selection.feature)?;
        Some(format!(
            "Examples from bar # {} in {}",
            committed.selection.bucket_index + 1,
            self.chart_title(pane, feature)
        ))
    }

    pub fn table_props(&mut self) -> Option<TableProps> {
        let title = self.example_title()?;
        let table = self.table.as_ref()?;
        Some(TableProps {
            title,
            columns: table.columns(&mut self.registry),
            rows: table.rows(&mut self.registry),
            loading: self.selection.is_loading() || table.is_loading(),
            pagination: table.pagination(),
            range_label: table.range_label(),
        })
    }

    /// Grid span (out of 24) for each chart: wider when buckets are many or
    /// several systems share a chart.
    pub fn col_span(&self, bucket_info: &HashMap<String, BucketIntervals>) -> u8 {
        let systems = self.report.systems.len();
        let max_bounds = bucket_info.values().map(|b| b.bounds.len()).max().unwrap_or(0);
        if max_bounds > 5 || (systems > 1 && max_bounds > 3) {
            24
        } else if max_bounds > 3 || systems > 1 {
            12
        } else {
            8
        }
    }
}
