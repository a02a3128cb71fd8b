//! HTTP client seam used by virtual users

use crate::error::RunResult;
use async_trait::async_trait;
use rampload_core::config::HttpSettings;
use rampload_core::ResponseSample;
use tokio::time::Instant;

/// Issues one GET request and describes its outcome.
///
/// Implementations never fail: transport errors come back as status-0
/// samples with `error` set, so a broken endpoint is only ever a failed
/// metric sample.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// `name` is the request name from the scenario; `capture_body` asks the
    /// client to keep the body for body checks.
    async fn get(&self, name: &str, url: &str, capture_body: bool) -> ResponseSample;
}

/// Client backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Create new client with the configured timeout and user agent
    pub fn new(settings: &HttpSettings) -> RunResult<Self> {
        let inner = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, name: &str, url: &str, capture_body: bool) -> ResponseSample {
        let start = Instant::now();

        let response = match self.inner.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(request = name, url, error = %e, "Request failed");
                return ResponseSample::transport_error(start.elapsed(), e.to_string());
            }
        };

        let status = response.status().as_u16();
        // Latency covers the full body, not just the headers
        match response.bytes().await {
            Ok(body) => {
                let sample = ResponseSample::ok(status, start.elapsed());
                if capture_body {
                    sample.with_body(String::from_utf8_lossy(&body))
                } else {
                    ResponseSample {
                        body_len: body.len() as u64,
                        ..sample
                    }
                }
            }
            Err(e) => {
                tracing::debug!(request = name, url, status, error = %e, "Failed to read body");
                ResponseSample::transport_error(start.elapsed(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampload_core::RunnerSettings;

    #[tokio::test]
    async fn test_connection_refused_is_status_zero() {
        let settings = RunnerSettings::default();
        let client = ReqwestClient::new(&settings.http).unwrap();

        // port 1 is never listening in the test environment
        let sample = client.get("refused", "http://127.0.0.1:1/", false).await;

        assert_eq!(sample.status, 0);
        assert!(sample.error.is_some());
        assert!(sample.is_failure());
    }
}
