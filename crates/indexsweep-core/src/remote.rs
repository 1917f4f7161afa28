//! Resilient HTTP client shared by the index boundary and the API source.
//!
//! Every request runs inside the retry loop: transport failures, undecodable
//! bodies, 429 and 5xx responses are retried under the policy's backoff
//! budget, while other client errors surface immediately. Decoding happens
//! inside the loop so a garbled body is retried like any transient fault.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{SweepError, SweepResult};
use crate::retry::RetryPolicy;

/// Per-request timeout. Bounds a hanging connection; the retry budget only
/// covers time spent sleeping between attempts.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Response body bytes kept when quoting an error.
const ERROR_BODY_LIMIT: usize = 512;

const USER_AGENT: &str = concat!("indexsweep/", env!("CARGO_PKG_VERSION"));

/// HTTP client with a retry policy baked in.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    client: Client,
    policy: RetryPolicy,
}

impl RemoteClient {
    pub fn new(policy: RetryPolicy) -> SweepResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .tcp_nodelay(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SweepError::Init(format!("http client build failed: {e}")))?;
        Ok(Self { client, policy })
    }

    /// GET `url` and decode the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        context: &'static str,
        url: &str,
        query: &[(&str, String)],
    ) -> SweepResult<T> {
        self.with_retry(context, || {
            let request = self.client.get(url).query(query);
            async move { read_json(context, request.send().await).await }
        })
        .await
    }

    /// POST a JSON `body` to `url` and decode the JSON response into `T`.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        context: &'static str,
        url: &str,
        body: &Value,
    ) -> SweepResult<T> {
        self.with_retry(context, || {
            let request = self.client.post(url).json(body);
            async move { read_json(context, request.send().await).await }
        })
        .await
    }

    /// DELETE `url`, returning the terminal status code.
    ///
    /// 404 and 409 count as terminal here: for an idempotent delete they
    /// mean the document is gone or was just rewritten, and the caller maps
    /// them to an outcome rather than an error.
    pub async fn delete(&self, context: &'static str, url: &str) -> SweepResult<u16> {
        self.with_retry(context, || {
            let request = self.client.delete(url);
            async move { read_delete_status(context, request.send().await).await }
        })
        .await
    }

    async fn with_retry<T, F, Fut>(&self, context: &'static str, mut run: F) -> SweepResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = SweepResult<T>>,
    {
        let mut attempt: u32 = 0;
        let mut waited = Duration::ZERO;
        loop {
            let err = match run().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            match self.policy.next_delay(attempt, waited) {
                Some(delay) => {
                    warn!(
                        "[Remote] {} attempt {} failed, retrying in {}ms: {}",
                        context,
                        attempt + 1,
                        delay.as_millis(),
                        err
                    );
                    sleep(delay).await;
                    waited += delay;
                    attempt += 1;
                }
                None => {
                    return Err(SweepError::RetryExhausted {
                        waited_ms: waited.as_millis() as u64,
                        source: Box::new(err),
                    });
                }
            }
        }
    }
}

async fn read_json<T: DeserializeOwned>(
    context: &'static str,
    sent: Result<Response, reqwest::Error>,
) -> SweepResult<T> {
    let response = sent?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SweepError::Status {
            context,
            status: status.as_u16(),
            body: clip_body(&body),
        });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| SweepError::Malformed {
        context,
        detail: e.to_string(),
    })
}

async fn read_delete_status(
    context: &'static str,
    sent: Result<Response, reqwest::Error>,
) -> SweepResult<u16> {
    let response = sent?;
    let status = response.status();
    let code = status.as_u16();
    if status.is_success() || code == 404 || code == 409 {
        return Ok(code);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SweepError::Status {
        context,
        status: code,
        body: clip_body(&body),
    })
}

fn clip_body(body: &str) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut cut = ERROR_BODY_LIMIT;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(truncated)", &body[..cut])
}
