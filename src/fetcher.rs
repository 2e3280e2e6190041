//! Per-system example retrieval for a selected bucket.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::client::{DataProvider, ExampleRecord};
use crate::error::FetchError;
use crate::logging::{log, obj, v_int, v_str, Domain, Level, ProfileScope};
use crate::results::compare::compare_sample_keys;
use crate::results::SampleId;

/// What to ask one system for.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRequest {
    pub system_id: String,
    pub level: String,
    pub ids: Vec<SampleId>,
}

#[derive(Clone)]
pub struct ExampleFetcher {
    provider: Arc<dyn DataProvider>,
}

impl ExampleFetcher {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn DataProvider> {
        &self.provider
    }

    /// Fetch every system's examples concurrently.
    ///
    /// Requests with no ids resolve to an empty list without a backend call.
    /// All requests are awaited; if any fails the whole call fails and no
    /// partial result is returned. Each successful list is sorted by
    /// sample id.
    pub async fn fetch(&self, requests: &[BucketRequest]) -> Result<Vec<Vec<ExampleRecord>>, FetchError> {
        let _scope = ProfileScope::with_context("fetch_bucket", &[("systems", v_int(requests.len() as u64))]);
        let pending = requests.iter().map(|req| async move {
            // nothing to ask this system for
            if req.ids.is_empty() {
                return Ok(Vec::new());
            }
            self.provider.get_examples_by_ids(&req.system_id, &req.level, &req.ids).await
        });
        let results = join_all(pending).await;

        let mut out = Vec::with_capacity(results.len());
        for (req, result) in requests.iter().zip(results) {
            match result {
                Ok(mut records) => {
                    records.sort_by(|a, b| compare_sample_keys(a.sort_key(), b.sort_key()));
                    out.push(records);
                }
                Err(err) => {
                    log(
                        Level::Warn,
                        Domain::Fetch,
                        "bucket_fetch_failed",
                        obj(&[
                            ("system_id", v_str(&req.system_id)),
                            ("level", v_str(&req.level)),
                            ("error", v_str(&err.message())),
                        ]),
                    );
                    return Err(err);
                }
            }
        }
        Ok(out)
    }
}
