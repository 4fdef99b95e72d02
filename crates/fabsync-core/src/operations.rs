use std::thread;
use std::time::{Duration, Instant};

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{FabricError, Result};
use crate::transport::Gateway;

/// Polling budget for one long-running operation.
#[derive(Debug, Clone, Copy)]
pub struct TrackOptions {
    pub max_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    Done,
    Failed,
    Pending,
}

/// Statuses compare case-insensitively. Anything unrecognized keeps the
/// poll alive; only the budget ends it.
pub(crate) fn classify_status(raw: &str) -> Progress {
    match raw.to_ascii_lowercase().as_str() {
        "succeeded" | "completed" => Progress::Done,
        "failed" | "cancelled" => Progress::Failed,
        _ => Progress::Pending,
    }
}

/// The remote `error` object when present, the whole operation otherwise.
pub(crate) fn failure_detail(operation: &Value) -> String {
    operation.get("error").unwrap_or(operation).to_string()
}

/// Polls an operation URL until it reaches a terminal state or the wait
/// budget is spent. Poll-level transport errors are logged and retried.
pub fn track_operation(
    gateway: &dyn Gateway,
    operation_url: &str,
    options: &TrackOptions,
) -> Result<Value> {
    let started = Instant::now();
    let mut attempt: u32 = 0;

    while started.elapsed() < options.max_wait {
        attempt += 1;

        let outcome = gateway
            .call(Method::GET, operation_url, None)
            .and_then(|response| response.json());
        let operation = match outcome {
            Ok(operation) => operation,
            Err(error) => {
                warn!(attempt, %error, "operation poll failed, retrying");
                thread::sleep(options.poll_interval);
                continue;
            }
        };

        let status = operation
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let percent = operation
            .get("percentComplete")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        debug!(attempt, status, percent, "operation poll");

        match classify_status(status) {
            Progress::Done => return Ok(operation),
            Progress::Failed => {
                return Err(FabricError::OperationFailed {
                    status: status.to_ascii_lowercase(),
                    detail: failure_detail(&operation),
                });
            }
            Progress::Pending => thread::sleep(options.poll_interval),
        }
    }

    Err(FabricError::OperationTimeout {
        waited_secs: options.max_wait.as_secs(),
    })
}
