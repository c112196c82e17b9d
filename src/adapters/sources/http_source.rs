use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::query_history::{normalize_row, query_history_sql};
use crate::core::errors::{CaptureError, Result};
use crate::core::models::capture_record::CaptureRecord;
use crate::core::traits::credentials::CredentialProvider;
use crate::core::traits::source::CaptureSource;

/// Body posted to the SQL gateway.
#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    timeout_secs: u64,
}

/// Gateways answer either with a bare array of rows or `{"rows": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryResponse {
    Rows(Vec<Map<String, Value>>),
    Wrapped { rows: Vec<Map<String, Value>> },
}

impl QueryResponse {
    fn into_rows(self) -> Vec<Map<String, Value>> {
        match self {
            Self::Rows(rows) | Self::Wrapped { rows } => rows,
        }
    }
}

/// Fetches query history by posting T-SQL to an HTTP SQL gateway in front
/// of the lakehouse SQL endpoint. `TdsQuerySource` talks to the endpoint
/// directly; this adapter is for deployments that only expose HTTP.
///
/// Credentials come from the injected `CredentialProvider` on every call.
pub struct HttpQuerySource<C: CredentialProvider> {
    endpoint: String,
    lakehouse: Option<String>,
    timeout: Duration,
    credentials: C,
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

impl<C: CredentialProvider> HttpQuerySource<C> {
    pub fn new(
        endpoint: impl Into<String>,
        lakehouse: Option<String>,
        timeout: Duration,
        credentials: C,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("qhlog/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CaptureError::InvalidConfig {
                detail: format!("failed to create HTTP client: {e}"),
            })?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CaptureError::InvalidConfig {
                detail: format!("failed to create async runtime: {e}"),
            })?;

        Ok(Self {
            endpoint: endpoint.into(),
            lakehouse,
            timeout,
            credentials,
            client,
            runtime,
        })
    }
}

impl<C: CredentialProvider> CaptureSource for HttpQuerySource<C> {
    fn fetch_top_queries(&self, n: usize) -> Result<Vec<CaptureRecord>> {
        let token = self.credentials.bearer_token()?;
        let sql = query_history_sql(n);
        let request = QueryRequest {
            query: &sql,
            database: self.lakehouse.as_deref(),
            timeout_secs: self.timeout.as_secs(),
        };

        let rows = self.runtime.block_on(async {
            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(token.secret())
                .json(&request)
                .send()
                .await
                .map_err(|e| CaptureError::Transport {
                    reason: format!("request to {} failed: {e}", self.endpoint),
                })?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(classify_status(status, &body));
            }

            let body = resp.text().await.map_err(|e| CaptureError::Transport {
                reason: format!("failed to read response body: {e}"),
            })?;
            parse_rows(&body)
        })?;

        Ok(rows.into_iter().take(n).map(normalize_row).collect())
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Map a non-success HTTP status to the error taxonomy.
fn classify_status(status: StatusCode, body: &str) -> CaptureError {
    let snippet: String = body.chars().take(200).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CaptureError::Authentication {
            reason: format!("endpoint returned {status}: {snippet}"),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => CaptureError::Transport {
            reason: format!("endpoint returned {status}"),
        },
        _ => CaptureError::Remote {
            reason: format!("endpoint returned {status}: {snippet}"),
        },
    }
}

fn parse_rows(body: &str) -> Result<Vec<Map<String, Value>>> {
    serde_json::from_str::<QueryResponse>(body)
        .map(QueryResponse::into_rows)
        .map_err(|e| CaptureError::Remote {
            reason: format!("unexpected response payload: {e}"),
        })
}
