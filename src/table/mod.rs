//! Paginated example table.
//!
//! Shows a fixed window of ten rows over an ordered id list. Full records
//! for the window are fetched only when the system, the window's ids or the
//! page index change; refreshing with an unchanged key is a no-op.

pub mod render;

use std::collections::HashMap;
use std::ops::Range;

use serde::Serialize;

use crate::client::{DataProvider, ExampleRecord, OutputRecord};
use crate::error::FetchError;
use crate::logging::{log, obj, v_int, v_str, Domain, Level};
use crate::results::SampleId;

pub use render::{FieldShape, RendererRegistry, RowKind, TaskSchema};

pub const PAGE_SIZE: usize = 10;

/// Half-open row range shown on zero-based `page`.
pub fn window_range(total: usize, page: usize) -> Range<usize> {
    let start = page.saturating_mul(PAGE_SIZE).min(total);
    let end = start.saturating_add(PAGE_SIZE).min(total);
    start..end
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// Ids whose output rows must be fetched page by page.
    Ids(Vec<SampleId>),
    /// Cases that already carry their displayable fields.
    Composite(Vec<ExampleRecord>),
}

impl TableSource {
    pub fn len(&self) -> usize {
        match self {
            TableSource::Ids(ids) => ids.len(),
            TableSource::Composite(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inputs that decide whether a page must be refetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchKey {
    pub system_id: String,
    pub ids_csv: String,
    pub page: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub key: String,
    pub title: String,
    /// Rendered as a copyable value.
    pub copyable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub id: String,
    /// One cell per non-id column, in column order.
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationProps {
    pub total: usize,
    pub page_size: usize,
    /// 1-based, as table widgets expect.
    pub current: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExampleWindow {
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub records: Vec<OutputRecord>,
}

#[derive(Debug, Clone)]
pub struct PaginatedTableView {
    task: String,
    system_id: String,
    source: TableSource,
    page: usize,
    loaded_key: Option<FetchKey>,
    /// Key of the last window whose fetch failed; not loading, not loaded.
    failed_key: Option<FetchKey>,
    records: Vec<OutputRecord>,
    descriptions: HashMap<String, String>,
}

impl PaginatedTableView {
    pub fn new(task: &str, system_id: &str, source: TableSource) -> Self {
        Self {
            task: task.to_string(),
            system_id: system_id.to_string(),
            source,
            page: 0,
            loaded_key: None,
            failed_key: None,
            records: Vec::new(),
            descriptions: HashMap::new(),
        }
    }

    /// Column titles for known feature keys.
    pub fn with_descriptions(mut self, descriptions: HashMap<String, String>) -> Self {
        self.descriptions = descriptions;
        self
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub fn source(&self) -> &TableSource {
        &self.source
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total(&self) -> usize {
        self.source.len()
    }

    /// The current window is owed a fetch that has neither landed nor
    /// failed. Stays true from a page/source change until `refresh` settles.
    pub fn is_loading(&self) -> bool {
        match self.fetch_key() {
            Some(key) => self.loaded_key.as_ref() != Some(&key) && self.failed_key.as_ref() != Some(&key),
            None => false,
        }
    }

    pub fn window(&self) -> Range<usize> {
        window_range(self.total(), self.page)
    }

    /// Replace the row source; a different list starts again at page 0.
    pub fn set_source(&mut self, system_id: &str, source: TableSource) {
        if self.system_id == system_id && self.source == source {
            return;
        }
        self.system_id = system_id.to_string();
        self.source = source;
        self.page = 0;
        self.records.clear();
        self.loaded_key = None;
        self.failed_key = None;
    }

    /// Widget callback with a 1-based page number.
    pub fn on_page_change(&mut self, ui_page: usize) {
        let last = self.total().saturating_sub(1) / PAGE_SIZE;
        self.page = ui_page.saturating_sub(1).min(last);
    }

    /// `None` for composite sources, which never fetch.
    pub fn fetch_key(&self) -> Option<FetchKey> {
        match &self.source {
            TableSource::Ids(ids) => Some(FetchKey {
                system_id: self.system_id.clone(),
                ids_csv: ids[self.window()]
                    .iter()
                    .map(|id| id.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
                page: self.page,
            }),
            TableSource::Composite(_) => None,
        }
    }

    pub fn needs_fetch(&self) -> bool {
        match self.fetch_key() {
            Some(key) => self.loaded_key.as_ref() != Some(&key),
            None => false,
        }
    }

    /// Fetch the current window if its key changed. Returns whether a
    /// request was issued.
    pub async fn refresh(&mut self, provider: &dyn DataProvider) -> Result<bool, FetchError> {
        let Some(key) = self.fetch_key() else {
            return Ok(false);
        };
        if self.loaded_key.as_ref() == Some(&key) {
            return Ok(false);
        }
        if key.ids_csv.is_empty() {
            self.records.clear();
            self.loaded_key = Some(key);
            return Ok(false);
        }

        let result = provider.get_outputs_page(&key.system_id, &key.ids_csv).await;
        match result {
            Ok(page) => {
                log(
                    Level::Debug,
                    Domain::Table,
                    "page_loaded",
                    obj(&[
                        ("system_id", v_str(&key.system_id)),
                        ("page", v_int(key.page as u64)),
                        ("rows", v_int(page.records.len() as u64)),
                    ]),
                );
                self.records = page.records;
                self.loaded_key = Some(key);
                self.failed_key = None;
                Ok(true)
            }
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Table,
                    "page_failed",
                    obj(&[
                        ("system_id", v_str(&key.system_id)),
                        ("page", v_int(key.page as u64)),
                        ("error", v_str(&err.message())),
                    ]),
                );
                // rows of the previous window must not show under this page
                self.records.clear();
                self.loaded_key = None;
                self.failed_key = Some(key);
                Err(err)
            }
        }
    }

    pub fn example_window(&self) -> ExampleWindow {
        ExampleWindow {
            total: self.total(),
            page: self.page,
            page_size: PAGE_SIZE,
            records: self.records.clone(),
        }
    }

    fn title_for(&self, key: &str) -> String {
        self.descriptions.get(key).cloned().unwrap_or_else(|| key.to_string())
    }

    fn schema<'r>(&self, registry: &'r mut RendererRegistry) -> Option<&'r TaskSchema> {
        match &self.source {
            TableSource::Ids(_) => {
                let first = self.records.first()?;
                Some(registry.resolve(&self.task, RowKind::Output, &first.fields, "id"))
            }
            TableSource::Composite(records) => {
                let first = records.first()?;
                Some(registry.resolve(&self.task, RowKind::Case, &first.fields, "sample_id"))
            }
        }
    }

    /// Id column first, then every other field of the row kind.
    pub fn columns(&self, registry: &mut RendererRegistry) -> Vec<Column> {
        let Some(schema) = self.schema(registry) else {
            return Vec::new();
        };
        let mut columns = vec![Column {
            key: "id".to_string(),
            title: "ID".to_string(),
            copyable: true,
        }];
        columns.extend(schema.field_names().map(|name| Column {
            key: name.to_string(),
            title: self.title_for(name),
            copyable: false,
        }));
        columns
    }

    pub fn rows(&self, registry: &mut RendererRegistry) -> Vec<Row> {
        let Some(schema) = self.schema(registry) else {
            return Vec::new();
        };
        match &self.source {
            TableSource::Ids(_) => self
                .records
                .iter()
                .map(|r| Row {
                    id: r.id.to_string(),
                    cells: schema.render_row(&r.fields),
                })
                .collect(),
            TableSource::Composite(records) => records[self.window()]
                .iter()
                .map(|r| Row {
                    id: r.sample_id.to_string(),
                    cells: schema.render_row(&r.fields),
                })
                .collect(),
        }
    }

    pub fn pagination(&self) -> PaginationProps {
        PaginationProps {
            total: self.total(),
            page_size: PAGE_SIZE,
            current: self.page + 1,
        }
    }

    /// "11-20 (total: 25)"
    pub fn range_label(&self) -> String {
        let w = self.window();
        let from = if w.is_empty() { 0 } else { w.start + 1 };
        format!("{}-{} (total: {})", from, w.end, self.total())
    }
}
