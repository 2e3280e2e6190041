//! Stable ordering for bucket sample keys.
//!
//! Integer-valued keys compare numerically, everything else byte-wise.
//! Integer keys sort ahead of non-integer keys so the order stays total
//! when a list mixes both kinds.

use std::cmp::Ordering;

use crate::results::SampleId;

fn as_integer(key: &str) -> Option<f64> {
    match key.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Some(v),
        _ => None,
    }
}

pub fn compare_sample_keys(a: &str, b: &str) -> Ordering {
    match (as_integer(a), as_integer(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Same ordering as [`compare_sample_keys`], as -1/0/1 for widget callbacks.
pub fn compare_sample_keys_i32(a: &str, b: &str) -> i32 {
    match compare_sample_keys(a, b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

pub fn sort_sample_ids(ids: &mut [SampleId]) {
    ids.sort_by(|a, b| compare_sample_keys(a.as_str(), b.as_str()));
}
