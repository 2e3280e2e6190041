//! Backend data provider seam.
//!
//! The explorer never talks HTTP directly: every component receives an
//! `Arc<dyn DataProvider>` built once by the composition root.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::results::SampleId;

mod http;
pub mod retry;

pub use http::HttpProvider;

/// One analysis case of a bucket. Span-level tasks carry extra
/// displayable fields next to the sample id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    pub sample_id: SampleId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ExampleRecord {
    pub fn new(sample_id: impl Into<SampleId>) -> Self {
        Self {
            sample_id: sample_id.into(),
            fields: Map::new(),
        }
    }

    pub fn sort_key(&self) -> &str {
        self.sample_id.as_str()
    }
}

/// One system output row; field order is the backend's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: SampleId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputsPage {
    #[serde(rename = "system_outputs", default)]
    pub records: Vec<OutputRecord>,
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Analysis cases of `system_id` at `level` for the given ids.
    async fn get_examples_by_ids(
        &self,
        system_id: &str,
        level: &str,
        ids: &[SampleId],
    ) -> Result<Vec<ExampleRecord>, FetchError>;

    /// System outputs whose ids are in the comma-separated `ids_csv`.
    async fn get_outputs_page(&self, system_id: &str, ids_csv: &str) -> Result<OutputsPage, FetchError>;
}
