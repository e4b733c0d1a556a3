use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

const BACKOFF_BASE_SECS: u64 = 1;
const BACKOFF_MAX_SECS: u64 = 30;
/// Jitter fraction applied to each delay (±10%), same shape as the channel
/// reconnect backoff this is grounded on.
const JITTER_FRACTION: f64 = 0.10;

/// Outcome of a callback delivery attempt (§4.5c).
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    pub success: bool,
    pub error: Option<String>,
}

/// POSTs `payload` to `{base_url}/{endpoint}`, retrying with exponential
/// backoff (1s -> 30s cap) up to `max_retries` attempts. A 2xx response is
/// only a delivery if its JSON body also carries `code == 200`; a non-2xx
/// status, a body with any other `code`, or an unparseable body are all
/// treated as retryable failures (§6). Non-retryable in the durability sense
/// — this activity either eventually succeeds or reports failure, it never
/// panics or blocks the caller beyond `timeout` per attempt.
pub async fn send_callback(
    client: &reqwest::Client,
    base_url: &str,
    endpoint: &str,
    task_name: &str,
    payload: &Value,
    headers: &[(String, String)],
    timeout: Duration,
    max_retries: u32,
) -> CallbackOutcome {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'));
    let mut delay_secs = BACKOFF_BASE_SECS;

    for attempt in 1..=max_retries.max(1) {
        let mut request = client.post(&url).timeout(timeout).json(payload);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                let status = response.status();
                match response.json::<Value>().await {
                    Ok(body) if body_reports_delivered(&body) => {
                        info!(task = task_name, attempt, %url, "callback delivered");
                        return CallbackOutcome {
                            success: true,
                            error: None,
                        };
                    }
                    Ok(body) => {
                        let code = body.get("code").cloned().unwrap_or(Value::Null);
                        let msg = body.get("msg").and_then(Value::as_str).unwrap_or("");
                        if attempt == max_retries.max(1) {
                            return CallbackOutcome {
                                success: false,
                                error: Some(format!("callback body reported code {code}: {msg}")),
                            };
                        }
                        warn!(task = task_name, attempt, %code, "callback body code != 200, retrying");
                    }
                    Err(e) => {
                        if attempt == max_retries.max(1) {
                            return CallbackOutcome {
                                success: false,
                                error: Some(format!("callback response body unreadable: {e}")),
                            };
                        }
                        warn!(task = task_name, attempt, %status, error = %e, "callback response body unreadable, retrying");
                    }
                }
            }
            Ok(response) => {
                let status = response.status();
                if attempt == max_retries.max(1) {
                    return CallbackOutcome {
                        success: false,
                        error: Some(format!("callback rejected with status {status}")),
                    };
                }
                warn!(task = task_name, attempt, %status, "callback rejected, retrying");
            }
            Err(e) => {
                if attempt == max_retries.max(1) {
                    return CallbackOutcome {
                        success: false,
                        error: Some(e.to_string()),
                    };
                }
                warn!(task = task_name, attempt, error = %e, "callback request failed, retrying");
            }
        }

        let jitter = jitter_secs(delay_secs);
        tokio::time::sleep(Duration::from_secs(delay_secs + jitter)).await;
        delay_secs = (delay_secs * 2).min(BACKOFF_MAX_SECS);
    }

    unreachable!("backoff loop exited without returning")
}

/// A 2xx status alone isn't delivery; the receiving service reports its own
/// outcome in the body's `code` field (§6).
fn body_reports_delivered(body: &Value) -> bool {
    body.get("code").and_then(Value::as_i64) == Some(200)
}

/// Deterministic pseudo-random jitter derived from the current monotonic
/// timestamp, avoiding a `rand` dependency.
fn jitter_secs(base_secs: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let max_jitter = ((base_secs as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_is_bounded_by_fraction() {
        for base in [1, 5, 10, 30] {
            let j = jitter_secs(base);
            assert!(j <= (base as f64 * JITTER_FRACTION) as u64);
        }
    }

    #[test]
    fn body_reports_delivered_requires_code_200() {
        assert!(body_reports_delivered(&serde_json::json!({"code": 200, "msg": "ok"})));
        assert!(!body_reports_delivered(&serde_json::json!({"code": 500, "msg": "boom"})));
        assert!(!body_reports_delivered(&serde_json::json!({"msg": "no code field"})));
        assert!(!body_reports_delivered(&serde_json::json!({"code": "200"})));
    }
}
