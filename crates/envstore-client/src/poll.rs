// SPDX-License-Identifier: GPL-3.0-or-later

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::{ClientError, Result};

/// Iteration budget and fixed sleep interval for a polling loop.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_iterations: usize,
    pub sleep: Duration,
}

impl PollPolicy {
    pub fn new(max_iterations: usize, sleep: Duration) -> Self {
        Self {
            max_iterations,
            sleep,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            sleep: Duration::from_secs(5),
        }
    }
}

/// Outcome of a single poll attempt.
#[derive(Debug)]
pub enum PollStep<T> {
    /// The resource reached a terminal state; polling stops.
    Terminal(T),
    /// Not there yet. Carries the payload the server returned, so the
    /// timeout error can report what was last seen.
    Pending(serde_json::Value),
}

/// Run `fetch` at a fixed interval until it reports a terminal state or the
/// iteration budget runs out. Errors from `fetch` end the loop immediately.
pub async fn poll_until<T, F, Fut>(operation: &str, policy: &PollPolicy, mut fetch: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStep<T>>>,
{
    let mut last = serde_json::Value::Null;

    for attempt in 0..policy.max_iterations {
        match fetch().await? {
            PollStep::Terminal(value) => return Ok(value),
            PollStep::Pending(payload) => {
                debug!(target: "client", attempt, operation, "not terminal yet");
                last = payload;
            }
        }
        tokio::time::sleep(policy.sleep).await;
    }

    Err(ClientError::PollTimeout {
        operation: operation.to_string(),
        last,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn fast(max_iterations: usize) -> PollPolicy {
        PollPolicy::new(max_iterations, Duration::ZERO)
    }

    #[tokio::test]
    async fn returns_on_first_terminal_step() {
        let calls = AtomicUsize::new(0);
        let result = poll_until("thing", &fast(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(PollStep::Terminal(42)) }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_terminal() {
        let calls = AtomicUsize::new(0);
        let result = poll_until("thing", &fast(10), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Ok(PollStep::Pending(json!({"n": n})))
                } else {
                    Ok(PollStep::Terminal(n))
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn budget_exhaustion_carries_last_payload() {
        let calls = AtomicUsize::new(0);
        let err = poll_until::<(), _, _>("creation of namespace ns", &fast(2), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(PollStep::Pending(json!({"status": "building", "n": n}))) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match err {
            ClientError::PollTimeout { operation, last } => {
                assert_eq!(operation, "creation of namespace ns");
                assert_eq!(last["status"], "building");
                assert_eq!(last["n"], 1);
            }
            other => panic!("expected PollTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_message_includes_last_payload() {
        let err = poll_until::<(), _, _>("build 7", &fast(1), || async {
            Ok(PollStep::Pending(json!({"data": {"status": "QUEUED"}})))
        })
        .await
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("build 7"));
        assert!(message.contains("QUEUED"));
    }

    #[tokio::test]
    async fn fetch_errors_end_the_loop() {
        let calls = AtomicUsize::new(0);
        let err = poll_until::<(), _, _>("thing", &fast(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ClientError::UnknownStatus("WEIRD".to_string())) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, ClientError::UnknownStatus(_)));
    }

    #[tokio::test]
    async fn zero_budget_times_out_without_fetching() {
        let calls = AtomicUsize::new(0);
        let err = poll_until::<(), _, _>("thing", &fast(0), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(PollStep::Terminal(())) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(err, ClientError::PollTimeout { .. }));
    }
}
