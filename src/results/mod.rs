//! Bucketed evaluation results: wire shapes, parsed series and the
//! cross-system comparison report.

pub mod compare;
pub mod parser;
pub mod report;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use compare::{compare_sample_keys, compare_sample_keys_i32, sort_sample_ids};
pub use parser::{bucket_label, format_name, parse_system};
pub use report::{ComparisonContext, ComparisonReport, FeatureSeries, MetricPane, SystemInfo};

/// Example identifier. The backend sends integers for most tasks and
/// strings for some; both land here as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawSampleId")]
pub struct SampleId(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSampleId {
    Num(serde_json::Number),
    Str(String),
}

impl From<RawSampleId> for SampleId {
    fn from(raw: RawSampleId) -> Self {
        match raw {
            RawSampleId::Num(n) => SampleId(n.to_string()),
            RawSampleId::Str(s) => SampleId(s),
        }
    }
}

impl SampleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SampleId {
    fn from(s: &str) -> Self {
        SampleId(s.to_string())
    }
}

impl From<u64> for SampleId {
    fn from(n: u64) -> Self {
        SampleId(n.to_string())
    }
}

/// One bucket of one (metric, feature, system) as the backend sends it.
/// Numeric fields arrive string-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBucketElement {
    pub bucket_name: Vec<String>,
    pub value: String,
    pub n_samples: u64,
    pub confidence_score_low: String,
    pub confidence_score_up: String,
    pub metric_name: String,
    #[serde(default)]
    pub bucket_samples: Vec<SampleId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketRecord {
    pub label: String,
    pub value: f64,
    pub n_samples: u64,
    pub confidence: Option<ConfidenceInterval>,
    pub samples: Vec<SampleId>,
}

/// One system's buckets for one (metric, feature), in source order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedSeries {
    pub system_id: String,
    pub task: String,
    pub metric: String,
    pub feature: String,
    pub description: String,
    /// Analysis level the bucket samples belong to ("example", "span", ...).
    pub level: String,
    pub buckets: Vec<BucketRecord>,
}

impl ParsedSeries {
    pub fn labels(&self) -> Vec<String> {
        self.buckets.iter().map(|b| b.label.clone()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.value).collect()
    }

    pub fn sample_counts(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.n_samples).collect()
    }

    pub fn confidence(&self) -> Vec<Option<ConfidenceInterval>> {
        self.buckets.iter().map(|b| b.confidence).collect()
    }
}
