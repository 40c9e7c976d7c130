//! Compute Engine long-running operations
//!
//! Mutating calls return an `Operation` resource; callers poll its
//! `selfLink` until `status` is `DONE` and then inspect `error`.

use super::client::GcpClient;
use crate::error::{DclError, Result};
use serde_json::Value;
use std::time::Duration;

/// Terminal or in-flight state of an operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationStatus {
    Running,
    Done,
    Failed { code: Option<u16>, message: String },
}

/// True if `body` is a Compute Engine operation rather than a resource
pub fn is_operation(body: &Value) -> bool {
    body.get("kind")
        .and_then(|k| k.as_str())
        .map(|k| k == "compute#operation")
        .unwrap_or(false)
}

pub fn operation_status(op: &Value) -> OperationStatus {
    if op.get("status").and_then(|s| s.as_str()) != Some("DONE") {
        return OperationStatus::Running;
    }

    let Some(errors) = op
        .get("error")
        .and_then(|e| e.get("errors"))
        .and_then(|e| e.as_array())
        .filter(|e| !e.is_empty())
    else {
        return OperationStatus::Done;
    };

    let message = errors
        .iter()
        .map(|e| {
            let code = e.get("code").and_then(|c| c.as_str()).unwrap_or("UNKNOWN");
            let msg = e.get("message").and_then(|m| m.as_str()).unwrap_or("");
            format!("{}: {}", code, msg)
        })
        .collect::<Vec<_>>()
        .join("; ");

    let code = op
        .get("httpErrorStatusCode")
        .and_then(|c| c.as_u64())
        .and_then(|c| u16::try_from(c).ok());

    OperationStatus::Failed { code, message }
}

fn operation_name(op: &Value) -> String {
    op.get("name")
        .and_then(|n| n.as_str())
        .unwrap_or("operation")
        .to_string()
}

/// Poll `operation` until it completes
pub async fn wait_for_operation(
    client: &GcpClient,
    operation: Value,
    interval: Duration,
) -> Result<Value> {
    let mut op = operation;
    loop {
        match operation_status(&op) {
            OperationStatus::Done => return Ok(op),
            OperationStatus::Failed { code, message } => {
                let name = operation_name(&op);
                tracing::warn!("Operation {} failed: {}", name, message);
                return Err(match code {
                    Some(409) => DclError::Conflict(message),
                    Some(404) => DclError::NotFound(message),
                    _ => DclError::OperationFailed {
                        operation: name,
                        message,
                    },
                });
            }
            OperationStatus::Running => {}
        }

        let Some(link) = op.get("selfLink").and_then(|l| l.as_str()).map(String::from) else {
            return Err(DclError::MalformedResponse(format!(
                "operation {} has no selfLink",
                operation_name(&op)
            )));
        };

        tracing::debug!("Waiting for operation {}", operation_name(&op));
        tokio::time::sleep(interval).await;
        op = client.get(&link).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_status() {
        assert_eq!(
            operation_status(&json!({"status": "RUNNING"})),
            OperationStatus::Running
        );
        assert_eq!(
            operation_status(&json!({"status": "DONE"})),
            OperationStatus::Done
        );

        let failed = json!({
            "status": "DONE",
            "httpErrorStatusCode": 409,
            "error": {"errors": [{"code": "RESOURCE_NOT_READY", "message": "busy"}]}
        });
        assert_eq!(
            operation_status(&failed),
            OperationStatus::Failed {
                code: Some(409),
                message: "RESOURCE_NOT_READY: busy".to_string()
            }
        );
    }

    #[test]
    fn test_is_operation() {
        assert!(is_operation(&json!({"kind": "compute#operation"})));
        assert!(!is_operation(&json!({"kind": "compute#route"})));
        assert!(!is_operation(&Value::Null));
    }
}
