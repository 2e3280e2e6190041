//! Cross-system comparison report: metric -> feature -> one series per system.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ExplorerError;
use crate::logging::{log, obj, v_int, v_str, Domain, Level, ProfileScope};
use crate::results::parser::{parse_system, SeriesContext};
use crate::results::{ParsedSeries, RawBucketElement, SampleId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub system_id: String,
    pub system_name: String,
}

/// Raw per-feature results for one system, as loaded from the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureResults {
    pub name: String,
    pub description: String,
    #[serde(default = "default_level")]
    pub level: String,
    /// Outer: buckets. Inner: one element per metric.
    pub elements: Vec<Vec<RawBucketElement>>,
}

fn default_level() -> String {
    "example".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemResults {
    #[serde(flatten)]
    pub info: SystemInfo,
    pub features: Vec<FeatureResults>,
}

/// A whole analysis payload: task, metrics and every compared system.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisPayload {
    pub task: String,
    pub metric_names: Vec<String>,
    pub systems: Vec<SystemResults>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSeries {
    pub feature: String,
    pub description: String,
    pub level: String,
    /// Index-aligned with the report's systems.
    pub per_system: Vec<ParsedSeries>,
}

impl FeatureSeries {
    pub fn labels(&self) -> Vec<String> {
        self.per_system.first().map(|s| s.labels()).unwrap_or_default()
    }

    pub fn bucket_count(&self) -> usize {
        self.per_system.first().map(|s| s.buckets.len()).unwrap_or(0)
    }

    /// Sample ids of one bucket for every system, in system order.
    pub fn bucket_samples(&self, bucket_index: usize) -> Option<Vec<Vec<SampleId>>> {
        self.per_system
            .iter()
            .map(|s| s.buckets.get(bucket_index).map(|b| b.samples.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPane {
    pub metric: String,
    pub features: Vec<FeatureSeries>,
}

impl MetricPane {
    pub fn feature(&self, name: &str) -> Option<&FeatureSeries> {
        self.features.iter().find(|f| f.feature == name)
    }
}

/// A (metric, feature) series left out of the report and why.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedSeries {
    pub system_id: String,
    pub metric: String,
    pub feature: String,
    pub error: ExplorerError,
}

/// Systems under comparison, in display order. Every per-system vector in
/// the report is index-aligned with it.
pub type ComparisonContext = Vec<SystemInfo>;

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    pub task: String,
    pub systems: ComparisonContext,
    pub metrics: Vec<MetricPane>,
    pub rejected: Vec<RejectedSeries>,
}

impl ComparisonReport {
    /// Parse every system and align the results.
    ///
    /// A (metric, feature) series that fails to parse for any system, or
    /// whose bucket labels differ between systems, is dropped for all
    /// systems and recorded in `rejected`. Other metrics of the same
    /// feature and the rest of the report are unaffected.
    pub fn build(payload: &AnalysisPayload) -> Self {
        let _scope = ProfileScope::new("build_report");
        let systems: ComparisonContext = payload.systems.iter().map(|s| s.info.clone()).collect();
        let mut rejected = Vec::new();

        // feature order follows the first system
        let feature_order: Vec<&FeatureResults> = payload
            .systems
            .first()
            .map(|s| s.features.iter().collect())
            .unwrap_or_default();

        let mut by_metric: BTreeMap<String, Vec<FeatureSeries>> = BTreeMap::new();

        'features: for first in feature_order {
            let mut per_system = Vec::with_capacity(payload.systems.len());
            for system in &payload.systems {
                let Some(results) = system.features.iter().find(|f| f.name == first.name) else {
                    for metric in &payload.metric_names {
                        rejected.push(RejectedSeries {
                            system_id: system.info.system_id.clone(),
                            metric: metric.clone(),
                            feature: first.name.clone(),
                            error: ExplorerError::Misaligned {
                                metric: metric.clone(),
                                feature: first.name.clone(),
                            },
                        });
                    }
                    continue 'features;
                };
                let ctx = SeriesContext {
                    system_id: &system.info.system_id,
                    task: &payload.task,
                    level: &results.level,
                    feature: &results.name,
                    description: &results.description,
                    metric_names: &payload.metric_names,
                };
                per_system.push(parse_system(&ctx, &results.elements));
            }

            for (system, parsed) in payload.systems.iter().zip(&per_system) {
                for (metric, result) in parsed {
                    if let Err(error) = result {
                        rejected.push(RejectedSeries {
                            system_id: system.info.system_id.clone(),
                            metric: metric.clone(),
                            feature: first.name.clone(),
                            error: error.clone(),
                        });
                    }
                }
            }

            'metrics: for metric in &payload.metric_names {
                let mut series: Vec<ParsedSeries> = Vec::with_capacity(per_system.len());
                for parsed in per_system.iter_mut() {
                    match parsed.remove(metric) {
                        Some(Ok(s)) => series.push(s),
                        // failure already recorded above
                        _ => continue 'metrics,
                    }
                }
                let labels = series.first().map(|s| s.labels()).unwrap_or_default();
                if let Some(odd) = series.iter().find(|s| s.labels() != labels) {
                    rejected.push(RejectedSeries {
                        system_id: odd.system_id.clone(),
                        metric: metric.clone(),
                        feature: first.name.clone(),
                        error: ExplorerError::Misaligned {
                            metric: metric.clone(),
                            feature: first.name.clone(),
                        },
                    });
                    continue;
                }
                by_metric.entry(metric.clone()).or_default().push(FeatureSeries {
                    feature: first.name.clone(),
                    description: first.description.clone(),
                    level: first.level.clone(),
                    per_system: series,
                });
            }
        }

        let metrics = payload
            .metric_names
            .iter()
            .map(|metric| MetricPane {
                metric: metric.clone(),
                features: by_metric.remove(metric).unwrap_or_default(),
            })
            .collect();

        for r in &rejected {
            log(
                Level::Warn,
                Domain::Parse,
                "series_dropped",
                obj(&[
                    ("system_id", v_str(&r.system_id)),
                    ("metric", v_str(&r.metric)),
                    ("feature", v_str(&r.feature)),
                    ("error", v_str(&r.error.to_string())),
                ]),
            );
        }
        log(
            Level::Info,
            Domain::Parse,
            "report_built",
            obj(&[
                ("systems", v_int(systems.len() as u64)),
                ("metrics", v_int(payload.metric_names.len() as u64)),
                ("rejected", v_int(rejected.len() as u64)),
            ]),
        );

        Self {
            task: payload.task.clone(),
            systems,
            metrics,
            rejected,
        }
    }

    pub fn metric(&self, name: &str) -> Option<&MetricPane> {
        self.metrics.iter().find(|m| m.metric == name)
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.metric.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> AnalysisPayload {
        serde_json::from_str(json).unwrap()
    }

    fn bucket(name: &str, value: &str, metric: &str) -> String {
        format!(
            r#"{{"bucket_name": ["{}"], "value": "{}", "n_samples": 2, "confidence_score_low": "0",
                "confidence_score_up": "0", "metric_name": "{}", "bucket_samples": [1, 2]}}"#,
            name, value, metric
        )
    }

    fn two_systems(second_bucket: &str) -> String {
        format!(
            r#"{{"task": "text-classification", "metric_names": ["Accuracy"], "systems": [
                {{"system_id": "a", "system_name": "A", "features": [
                    {{"name": "label", "description": "gold label", "elements": [[{}], [{}]]}},
                    {{"name": "len", "description": "length", "elements": [[{}]]}}]}},
                {{"system_id": "b", "system_name": "B", "features": [
                    {{"name": "label", "description": "gold label", "elements": [[{}], [{}]]}},
                    {{"name": "len", "description": "length", "elements": [[{}]]}}]}}]}}"#,
            bucket("neg", "0.5", "Accuracy"),
            bucket("pos", "0.7", "Accuracy"),
            bucket("5", "0.6", "Accuracy"),
            bucket("neg", "0.55", "Accuracy"),
            bucket(second_bucket, "0.75", "Accuracy"),
            bucket("5", "0.65", "Accuracy"),
        )
    }

    #[test]
    fn test_aligned_systems_build_report() {
        let report = ComparisonReport::build(&payload(&two_systems("pos")));
        assert!(report.rejected.is_empty());
        let pane = report.metric("Accuracy").unwrap();
        assert_eq!(pane.features.len(), 2);
        let label = pane.feature("label").unwrap();
        assert_eq!(label.per_system.len(), 2);
        assert_eq!(label.labels(), vec!["neg\n\n", "pos\n\n"]);
        assert_eq!(label.per_system[1].values(), vec![0.55, 0.75]);
        assert_eq!(label.bucket_samples(1).unwrap().len(), 2);
        assert!(label.bucket_samples(2).is_none());
    }

    #[test]
    fn test_misaligned_feature_dropped_others_kept() {
        let report = ComparisonReport::build(&payload(&two_systems("neutral")));
        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(report.rejected[0].error, ExplorerError::Misaligned { .. }));
        assert_eq!(report.rejected[0].system_id, "b");
        assert_eq!(report.rejected[0].metric, "Accuracy");
        let pane = report.metric("Accuracy").unwrap();
        assert!(pane.feature("label").is_none());
        assert!(pane.feature("len").is_some());
    }

    #[test]
    fn test_bad_series_rejected_not_fatal() {
        let json = two_systems("pos").replacen("\"0.7\"", "\"oops\"", 1);
        let report = ComparisonReport::build(&payload(&json));
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].system_id, "a");
        assert_eq!(report.rejected[0].error, ExplorerError::parse("value", "oops"));
        assert_eq!(report.metric("Accuracy").unwrap().features.len(), 1);
    }

    #[test]
    fn test_bad_metric_drops_only_that_series() {
        let json = format!(
            r#"{{"task": "text-classification", "metric_names": ["Accuracy", "F1"], "systems": [
                {{"system_id": "a", "system_name": "A", "features": [
                    {{"name": "len", "description": "length", "elements": [[{}, {}]]}}]}}]}}"#,
            bucket("5", "0.5", "Accuracy"),
            bucket("5", "oops", "F1"),
        );
        let report = ComparisonReport::build(&payload(&json));
        let accuracy = report.metric("Accuracy").unwrap();
        assert_eq!(accuracy.features.len(), 1);
        assert_eq!(accuracy.feature("len").unwrap().per_system[0].values(), vec![0.5]);
        assert!(report.metric("F1").unwrap().features.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].metric, "F1");
        assert_eq!(report.rejected[0].feature, "len");
        assert_eq!(report.rejected[0].error, ExplorerError::parse("value", "oops"));
    }

    #[test]
    fn test_feature_missing_in_one_system_rejected() {
        // system b reports `len` under another name
        let json = two_systems("pos");
        let last = json.rfind(r#"{"name": "len""#).unwrap();
        let mut lopsided = json.clone();
        lopsided.replace_range(last..last + 14, r#"{"name": "xyz""#);
        let report = ComparisonReport::build(&payload(&lopsided));
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].system_id, "b");
        assert!(report.metric("Accuracy").unwrap().feature("len").is_none());
        assert!(report.metric("Accuracy").unwrap().feature("label").is_some());
    }
}
