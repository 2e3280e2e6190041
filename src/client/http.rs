use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::client::retry::{is_retryable_network_error, retry_async, RetryConfig};
use crate::client::{DataProvider, ExampleRecord, OutputsPage};
use crate::config::Config;
use crate::error::FetchError;
use crate::logging::{log, obj, v_int, v_str, Domain, Level, ProfileScope};
use crate::results::SampleId;

/// reqwest-backed provider for the evaluation backend.
pub struct HttpProvider {
    client: Client,
    base: Url,
    retry: RetryConfig,
}

impl HttpProvider {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base: cfg.base_url()?,
            retry: cfg.retry(),
        })
    }

    fn endpoint(&self, system_id: &str, tail: &str) -> Result<Url, FetchError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::transport(format!("base url cannot hold a path: {}", self.base)).permanent())?
            .pop_if_empty()
            .extend(["systems", system_id, tail]);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let resp = self.client.get(url.clone()).send().await.map_err(|e| {
            let err = FetchError::transport(format!("{}: {}", url, e));
            if is_retryable_network_error(&e) {
                err
            } else {
                err.permanent()
            }
        })?;
        decode(resp).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, FetchError> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json::<T>()
            .await
            .map_err(|e| FetchError::transport(format!("invalid response body: {}", e)).permanent());
    }
    let status_text = status.canonical_reason().unwrap_or("error").to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(FetchError::from_response(status.as_u16(), &status_text, &body))
}

fn ids_csv(ids: &[SampleId]) -> String {
    ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(",")
}

#[async_trait]
impl DataProvider for HttpProvider {
    async fn get_examples_by_ids(
        &self,
        system_id: &str,
        level: &str,
        ids: &[SampleId],
    ) -> Result<Vec<ExampleRecord>, FetchError> {
        let _scope = ProfileScope::with_context("get_examples_by_ids", &[("system_id", v_str(system_id))]);
        let mut url = self.endpoint(system_id, "cases")?;
        url.query_pairs_mut()
            .append_pair("level", level)
            .append_pair("case_ids", &ids_csv(ids));
        let result = retry_async(&self.retry, "get_examples_by_ids", || {
            self.get_json::<Vec<ExampleRecord>>(url.clone())
        })
        .await;
        match &result {
            Ok(records) => log(
                Level::Debug,
                Domain::Fetch,
                "examples_fetched",
                obj(&[
                    ("system_id", v_str(system_id)),
                    ("level", v_str(level)),
                    ("requested", v_int(ids.len() as u64)),
                    ("received", v_int(records.len() as u64)),
                ]),
            ),
            Err(err) => log(
                Level::Warn,
                Domain::Fetch,
                "examples_failed",
                obj(&[("system_id", v_str(system_id)), ("error", v_str(&err.message()))]),
            ),
        }
        result
    }

    async fn get_outputs_page(&self, system_id: &str, ids_csv: &str) -> Result<OutputsPage, FetchError> {
        let _scope = ProfileScope::with_context("get_outputs_page", &[("system_id", v_str(system_id))]);
        let mut url = self.endpoint(system_id, "outputs")?;
        url.query_pairs_mut().append_pair("output_ids", ids_csv);
        retry_async(&self.retry, "get_outputs_page", || self.get_json::<OutputsPage>(url.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base: &str) -> HttpProvider {
        let cfg = Config {
            api_base: base.to_string(),
            ..Default::default()
        };
        HttpProvider::new(&cfg).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_api_prefix() {
        let p = provider("http://localhost:5000/api");
        let url = p.endpoint("sys 1", "cases").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/systems/sys%201/cases");
    }

    #[test]
    fn test_ids_csv() {
        let ids = vec![SampleId::from(3u64), SampleId::from("7")];
        assert_eq!(ids_csv(&ids), "3,7");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let cfg = Config {
            api_base: "http://127.0.0.1:9/api".to_string(),
            request_timeout_secs: 2,
            max_retries: 0,
            ..Default::default()
        };
        let p = HttpProvider::new(&cfg).unwrap();
        let err = p.get_outputs_page("sys", "1,2").await.unwrap_err();
        assert_eq!(err.status, None);
        assert_eq!(err.error_code, -1);
    }
}
