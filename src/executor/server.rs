//! Direct upstream execution over HTTP.

use std::time::Duration;

use serde_json::Value;

use crate::error::GatewayError;
use crate::executor::UpstreamResponse;
use crate::template::BuiltRequest;

/// Executes built requests as-is over a shared HTTP client.
#[derive(Debug, Clone)]
pub struct ServerExecutor {
    client: reqwest::Client,
}

impl ServerExecutor {
    pub fn new(request_timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(GatewayError::Transport)?;
        Ok(Self { client })
    }

    /// Send `request` without modification and classify the outcome.
    ///
    /// No retries at this layer: a 5xx is surfaced as `UpstreamError` and
    /// the caller decides whether to back off and try again.
    pub async fn execute(&self, request: &BuiltRequest) -> Result<UpstreamResponse, GatewayError> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let retry_after = parse_retry_after(&response);

        if let Some(err) = classify_status(status.as_u16(), retry_after) {
            return Err(err);
        }

        let text = response.text().await?;
        let payload = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(UpstreamResponse {
            status: status.as_u16(),
            payload,
        })
    }
}

/// Map a non-2xx upstream status to its error variant. Returns `None` for
/// success statuses.
pub fn classify_status(status: u16, retry_after: Option<Duration>) -> Option<GatewayError> {
    match status {
        200..=299 => None,
        401 | 403 => Some(GatewayError::AuthRejected { status }),
        429 => Some(GatewayError::RateLimited { retry_after }),
        500..=599 => Some(GatewayError::UpstreamError { status }),
        _ => Some(GatewayError::ClientError { status }),
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
