//! HTTP utilities for GCP REST API calls

use crate::error::{DclError, Result};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and drops non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// `error.message` of a GCP error body, or the sanitized body itself
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(sanitize_for_log)
        })
        .unwrap_or_else(|| sanitize_for_log(body))
}

/// Map a non-success status to the engine's error classes
pub fn classify_status(status: StatusCode, url: &str, body: &str) -> DclError {
    let message = error_message(body);
    match status {
        StatusCode::NOT_FOUND => DclError::NotFound(url.to_string()),
        StatusCode::CONFLICT => DclError::Conflict(message),
        _ => DclError::Http {
            status: status.as_u16(),
            message,
        },
    }
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gdcl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DclError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Send one request. Empty success bodies come back as `Value::Null`.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method, url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
            return Err(classify_status(status, url, &text));
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            DclError::MalformedResponse(format!("{}: {}", url, e))
        })
    }
}

/// Format an engine error for terminal display
/// Security: avoids echoing raw response bodies
pub fn format_gcp_error(error: &DclError) -> String {
    match error {
        DclError::Http { status: 401, .. } => {
            "Authentication failed. Run 'gcloud auth application-default login'.".to_string()
        }
        DclError::Http { status: 403, .. } => {
            "Permission denied. Check your GCP IAM permissions.".to_string()
        }
        DclError::Http { status: 429, .. } => {
            "Rate limit exceeded. Please try again later.".to_string()
        }
        DclError::Http { status, .. } if *status >= 500 => {
            "GCP service temporarily unavailable. Please try again.".to_string()
        }
        DclError::Conflict(_) => {
            "Resource conflict. The resource is being modified concurrently.".to_string()
        }
        other => other.to_string(),
    }
}
