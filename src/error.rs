//! Error taxonomy for result parsing, drill-down and example fetching.
//!
//! Parsing errors abort the single series they occur in. Fetch errors are
//! caught at the selection boundary and surfaced as transient notices.

use std::fmt;

use serde::Deserialize;

/// Failure retrieving examples or outputs from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchError {
    /// HTTP status; `None` when the request never produced a response.
    pub status: Option<u16>,
    pub status_text: String,
    /// Backend-supplied error code, `-1` when the backend gave none.
    pub error_code: i64,
    pub detail: String,
    /// Whether another attempt can succeed; decided where the error is built.
    pub retryable: bool,
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default = "no_error_code")]
    pub error_code: i64,
    #[serde(default)]
    pub detail: String,
}

fn no_error_code() -> i64 {
    -1
}

impl FetchError {
    /// Request never produced a usable response (connect, timeout, reset).
    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            status: None,
            status_text: "network error".to_string(),
            error_code: -1,
            detail: detail.into(),
            retryable: true,
        }
    }

    /// Same failure on every attempt: a malformed body, a bad URL, a
    /// request reqwest refused to build.
    pub fn permanent(mut self) -> Self {
        self.retryable = false;
        self
    }

    pub fn from_response(status: u16, status_text: &str, body: &str) -> Self {
        let retryable = crate::client::retry::is_retryable_http_error(status);
        match serde_json::from_str::<BackendErrorBody>(body) {
            Ok(parsed) => Self {
                status: Some(status),
                status_text: status_text.to_string(),
                error_code: parsed.error_code,
                detail: parsed.detail,
                retryable,
            },
            Err(_) => Self {
                status: Some(status),
                status_text: status_text.to_string(),
                error_code: -1,
                detail: status_text.to_string(),
                retryable,
            },
        }
    }

    /// User-facing message: `[<status text>: <code>] <detail>`, code omitted when -1.
    pub fn message(&self) -> String {
        let code = if self.error_code == -1 {
            String::new()
        } else {
            format!(": {}", self.error_code)
        };
        format!("[{}{}] {}", self.status_text, code, self.detail)
    }

    /// Transient transport failures and 408/429/5xx gateway-style statuses.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ExplorerError {
    /// Malformed numeric (or otherwise unusable) field in a raw result.
    Parse { field: String, raw: String },
    /// Bucket name tuples must have one or two parts.
    UnsupportedShape { parts: usize },
    /// Systems disagree on bucket labels for the same metric and feature.
    Misaligned { metric: String, feature: String },
    InvalidSelection {
        feature: String,
        bucket_index: usize,
        system_index: usize,
    },
    Fetch(FetchError),
}

impl ExplorerError {
    pub fn parse(field: &str, raw: &str) -> Self {
        ExplorerError::Parse {
            field: field.to_string(),
            raw: raw.to_string(),
        }
    }
}

impl fmt::Display for ExplorerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplorerError::Parse { field, raw } => {
                write!(f, "cannot parse field `{}` from {:?}", field, raw)
            }
            ExplorerError::UnsupportedShape { parts } => write!(
                f,
                "bucket names with {} parts are not supported (expected 1 or 2)",
                parts
            ),
            ExplorerError::Misaligned { metric, feature } => write!(
                f,
                "systems disagree on buckets for metric `{}` feature `{}`",
                metric, feature
            ),
            ExplorerError::InvalidSelection {
                feature,
                bucket_index,
                system_index,
            } => write!(
                f,
                "no bar at bucket {} system {} for feature `{}`",
                bucket_index, system_index, feature
            ),
            ExplorerError::Fetch(err) => write!(f, "fetch failed: {}", err),
        }
    }
}

impl std::error::Error for ExplorerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExplorerError::Fetch(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FetchError> for ExplorerError {
    fn from(err: FetchError) -> Self {
        ExplorerError::Fetch(err)
    }
}
