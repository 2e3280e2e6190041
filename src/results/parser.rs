//! Raw bucket elements -> per-metric series.
//!
//! Bucket labels are formatted for chart x-axes, numeric fields parsed, and
//! confidence intervals kept only when the backend actually computed them
//! (a zero bound means "not computed"). Bucket order is source order.

use std::collections::BTreeMap;

use crate::error::ExplorerError;
use crate::logging::{log, obj, v_str, Domain, Level};
use crate::results::{BucketRecord, ConfidenceInterval, ParsedSeries, RawBucketElement};

/// Identity of the series being parsed; shared by every bucket.
#[derive(Debug, Clone)]
pub struct SeriesContext<'a> {
    pub system_id: &'a str,
    pub task: &'a str,
    pub level: &'a str,
    pub feature: &'a str,
    pub description: &'a str,
    pub metric_names: &'a [String],
}

/// Render a bucket bound for display.
///
/// Surrounding whitespace is dropped. Integer-valued numbers render without
/// a fraction, other finite numbers with two decimals, anything else as
/// given. Text already in two-decimal form is returned as is, so the
/// function is idempotent on its own output.
pub fn format_name(name: &str) -> String {
    let trimmed = name.trim();
    if is_two_decimal(trimmed) {
        return trimmed.to_string();
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            if v.fract() == 0.0 {
                format_integer(v)
            } else {
                format!("{:.2}", v)
            }
        }
        _ => trimmed.to_string(),
    }
}

fn format_integer(v: f64) -> String {
    if v.abs() < 9.0e15 {
        format!("{}", v as i64)
    } else {
        format!("{:.0}", v)
    }
}

fn is_two_decimal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    match digits.split_once('.') {
        Some((int, frac)) => {
            !int.is_empty()
                && int.bytes().all(|b| b.is_ascii_digit())
                && frac.len() == 2
                && frac.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// One-part names get a trailing blank line so every label is three rows tall.
pub fn bucket_label(parts: &[String]) -> Result<String, ExplorerError> {
    match parts {
        [single] => Ok(format!("{}\n\n", format_name(single))),
        [low, high] => Ok(format!("{}\n|\n{}", format_name(low), format_name(high))),
        _ => Err(ExplorerError::UnsupportedShape { parts: parts.len() }),
    }
}

fn parse_number(field: &str, raw: &str) -> Result<f64, ExplorerError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ExplorerError::parse(field, raw)),
    }
}

/// `None` when either bound is exactly zero.
pub fn confidence_interval(low_raw: &str, high_raw: &str) -> Result<Option<ConfidenceInterval>, ExplorerError> {
    let low = parse_number("confidence_score_low", low_raw)?;
    let high = parse_number("confidence_score_up", high_raw)?;
    if low == 0.0 || high == 0.0 {
        return Ok(None);
    }
    if low > high {
        return Err(ExplorerError::parse(
            "confidence_interval",
            &format!("{},{}", low_raw, high_raw),
        ));
    }
    Ok(Some(ConfidenceInterval { low, high }))
}

fn parse_element(element: &RawBucketElement) -> Result<BucketRecord, ExplorerError> {
    Ok(BucketRecord {
        label: bucket_label(&element.bucket_name)?,
        value: parse_number("value", &element.value)?,
        n_samples: element.n_samples,
        confidence: confidence_interval(&element.confidence_score_low, &element.confidence_score_up)?,
        samples: element.bucket_samples.clone(),
    })
}

fn log_rejected(ctx: &SeriesContext<'_>, metric: &str, err: &ExplorerError) {
    log(
        Level::Warn,
        Domain::Parse,
        "series_rejected",
        obj(&[
            ("system_id", v_str(ctx.system_id)),
            ("feature", v_str(ctx.feature)),
            ("metric", v_str(metric)),
            ("error", v_str(&err.to_string())),
        ]),
    );
}

/// Parse one system's results for one feature.
///
/// `elements[i]` holds bucket `i`, one element per metric. Every metric in
/// `ctx.metric_names` gets an entry, even if no bucket mentions it. A bad
/// element fails only its own metric's series; an element naming a metric
/// outside `ctx.metric_names` gets an `Err` entry under that name.
pub fn parse_system(
    ctx: &SeriesContext<'_>,
    elements: &[Vec<RawBucketElement>],
) -> BTreeMap<String, Result<ParsedSeries, ExplorerError>> {
    let mut parsed: BTreeMap<String, Result<ParsedSeries, ExplorerError>> = ctx
        .metric_names
        .iter()
        .map(|metric| {
            (
                metric.clone(),
                Ok(ParsedSeries {
                    system_id: ctx.system_id.to_string(),
                    task: ctx.task.to_string(),
                    metric: metric.clone(),
                    feature: ctx.feature.to_string(),
                    description: ctx.description.to_string(),
                    level: ctx.level.to_string(),
                    buckets: Vec::new(),
                }),
            )
        })
        .collect();

    for bucket in elements {
        for element in bucket {
            if !parsed.contains_key(&element.metric_name) {
                let err = ExplorerError::parse("metric_name", &element.metric_name);
                log_rejected(ctx, &element.metric_name, &err);
                parsed.insert(element.metric_name.clone(), Err(err));
                continue;
            }
            let Some(slot) = parsed.get_mut(&element.metric_name) else {
                continue;
            };
            // series already aborted
            let Ok(series) = slot else {
                continue;
            };
            match parse_element(element) {
                Ok(record) => series.buckets.push(record),
                Err(err) => {
                    log_rejected(ctx, &element.metric_name, &err);
                    *slot = Err(err);
                }
            }
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::SampleId;

    fn s(v: &str) -> String {
        v.to_string()
    }

    fn element(name: &[&str], value: &str, low: &str, high: &str, metric: &str) -> RawBucketElement {
        RawBucketElement {
            bucket_name: name.iter().map(|n| n.to_string()).collect(),
            value: value.to_string(),
            n_samples: 3,
            confidence_score_low: low.to_string(),
            confidence_score_up: high.to_string(),
            metric_name: metric.to_string(),
            bucket_samples: vec![SampleId::from(7u64), SampleId::from(8u64), SampleId::from(9u64)],
        }
    }

    fn ctx<'a>(metrics: &'a [String]) -> SeriesContext<'a> {
        SeriesContext {
            system_id: "sys-a",
            task: "text-classification",
            level: "example",
            feature: "text_length",
            description: "text length",
            metric_names: metrics,
        }
    }

    #[test]
    fn test_format_name_rules() {
        assert_eq!(format_name("10"), "10");
        assert_eq!(format_name("10.0"), "10");
        assert_eq!(format_name("1e3"), "1000");
        assert_eq!(format_name("0.4242"), "0.42");
        assert_eq!(format_name("2.5"), "2.50");
        assert_eq!(format_name("-3"), "-3");
        assert_eq!(format_name("short"), "short");
        assert_eq!(format_name("NaN"), "NaN");
        assert_eq!(format_name(""), "");
    }

    #[test]
    fn test_format_name_trims_every_branch() {
        assert_eq!(format_name(" 3.10 "), "3.10");
        assert_eq!(format_name(" 2.5"), "2.50");
        assert_eq!(format_name(" pos\t"), "pos");
        assert_eq!(format_name(" NaN "), "NaN");
    }

    #[test]
    fn test_format_name_idempotent() {
        for raw in ["7", "0.4242", "1.004", "12.999", "-0.5", "label", "3.10"] {
            let once = format_name(raw);
            assert_eq!(format_name(&once), once, "not idempotent for {}", raw);
        }
    }

    #[test]
    fn test_single_part_label_has_blank_line() {
        assert_eq!(bucket_label(&[s("5")]).unwrap(), "5\n\n");
        assert_eq!(bucket_label(&[s("pos")]).unwrap(), "pos\n\n");
    }

    #[test]
    fn test_two_part_label() {
        assert_eq!(bucket_label(&[s("0"), s("10")]).unwrap(), "0\n|\n10");
        assert_eq!(bucket_label(&[s("0.333"), s("1")]).unwrap(), "0.33\n|\n1");
    }

    #[test]
    fn test_unsupported_shapes_fail_loudly() {
        assert_eq!(
            bucket_label(&[s("a"), s("b"), s("c")]),
            Err(ExplorerError::UnsupportedShape { parts: 3 })
        );
        assert_eq!(bucket_label(&[]), Err(ExplorerError::UnsupportedShape { parts: 0 }));
    }

    #[test]
    fn test_zero_bound_omits_interval() {
        assert_eq!(confidence_interval("0", "0.9").unwrap(), None);
        assert_eq!(confidence_interval("0.1", "0").unwrap(), None);
        assert_eq!(confidence_interval("0.0", "0.0").unwrap(), None);
        assert_eq!(
            confidence_interval("0.1", "0.9").unwrap(),
            Some(ConfidenceInterval { low: 0.1, high: 0.9 })
        );
    }

    #[test]
    fn test_inverted_interval_rejected() {
        let err = confidence_interval("0.9", "0.1").unwrap_err();
        assert!(matches!(err, ExplorerError::Parse { ref field, .. } if field == "confidence_interval"));
    }

    #[test]
    fn test_parse_preserves_order_and_splits_metrics() {
        let metrics = vec![s("Accuracy"), s("F1")];
        let elements = vec![
            vec![element(&["9"], "0.9", "0.8", "0.95", "Accuracy"), element(&["9"], "0.7", "0", "0", "F1")],
            vec![element(&["1"], "0.5", "0", "0", "Accuracy"), element(&["1"], "0.4", "0", "0", "F1")],
            vec![element(&["4"], "0.6", "0", "0", "Accuracy"), element(&["4"], "0.3", "0", "0", "F1")],
        ];
        let parsed = parse_system(&ctx(&metrics), &elements);
        let acc = parsed["Accuracy"].as_ref().unwrap();
        assert_eq!(acc.labels(), vec!["9\n\n", "1\n\n", "4\n\n"]);
        assert_eq!(acc.values(), vec![0.9, 0.5, 0.6]);
        assert_eq!(acc.buckets[0].confidence, Some(ConfidenceInterval { low: 0.8, high: 0.95 }));
        assert_eq!(acc.buckets[1].confidence, None);
        assert_eq!(parsed["F1"].as_ref().unwrap().values(), vec![0.7, 0.4, 0.3]);
        assert_eq!(acc.level, "example");
    }

    #[test]
    fn test_non_numeric_value_names_field() {
        let metrics = vec![s("Accuracy")];
        let elements = vec![vec![element(&["1"], "n/a", "0", "0", "Accuracy")]];
        let parsed = parse_system(&ctx(&metrics), &elements);
        assert_eq!(parsed["Accuracy"], Err(ExplorerError::parse("value", "n/a")));
    }

    #[test]
    fn test_unknown_metric_rejected() {
        let metrics = vec![s("Accuracy")];
        let elements = vec![vec![element(&["1"], "0.1", "0", "0", "BLEU")]];
        let parsed = parse_system(&ctx(&metrics), &elements);
        assert_eq!(parsed["BLEU"], Err(ExplorerError::parse("metric_name", "BLEU")));
        assert!(parsed["Accuracy"].as_ref().unwrap().buckets.is_empty());
    }

    #[test]
    fn test_metric_without_buckets_still_present() {
        let metrics = vec![s("Accuracy"), s("F1")];
        let elements = vec![vec![element(&["1"], "0.1", "0", "0", "Accuracy")]];
        let parsed = parse_system(&ctx(&metrics), &elements);
        assert!(parsed["F1"].as_ref().unwrap().buckets.is_empty());
    }

    #[test]
    fn test_bad_element_fails_only_its_metric() {
        let metrics = vec![s("Accuracy"), s("F1")];
        let elements = vec![
            vec![element(&["1"], "0.5", "0", "0", "Accuracy"), element(&["1"], "oops", "0", "0", "F1")],
            vec![element(&["2"], "0.6", "0", "0", "Accuracy"), element(&["2"], "0.4", "0", "0", "F1")],
        ];
        let parsed = parse_system(&ctx(&metrics), &elements);
        assert_eq!(parsed["Accuracy"].as_ref().unwrap().values(), vec![0.5, 0.6]);
        assert_eq!(parsed["F1"], Err(ExplorerError::parse("value", "oops")));
    }
}
