use std::time::Duration;

use async_trait::async_trait;

use crate::config::RetryConfig;
use crate::errors::ScreenLoopResult;
use crate::planner::provider::Planner;
use crate::planner::types::{DisplaySpec, TurnRequest, TurnResponse};
use crate::surface::Observation;

/// Resends failed planning round trips with exponential backoff.
///
/// Only the HTTP exchange is repeated: the same request (same `call_id`) goes
/// out again, and nothing touches the surface in between.
pub struct RetryingPlanner<P> {
    inner: P,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl<P: Planner> RetryingPlanner<P> {
    pub fn new(inner: P, cfg: &RetryConfig) -> Self {
        Self {
            inner,
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
        }
    }

    async fn with_retry<F, Fut>(&self, what: &str, mut call: F) -> ScreenLoopResult<TurnResponse>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = ScreenLoopResult<TurnResponse>> + Send,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            match call().await {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(
                        planner = self.inner.name(),
                        request = what,
                        attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "planning request failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<P: Planner> Planner for RetryingPlanner<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn begin(
        &self,
        task: &str,
        observation: &Observation,
        display: DisplaySpec,
    ) -> ScreenLoopResult<TurnResponse> {
        self.with_retry("begin", || self.inner.begin(task, observation, display))
            .await
    }

    async fn submit(&self, request: &TurnRequest) -> ScreenLoopResult<TurnResponse> {
        self.with_retry("submit", || self.inner.submit(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ScreenLoopError;
    use crate::planner::types::Environment;
    use crate::testing::{final_turn, ScriptedPlanner};

    fn request() -> TurnRequest {
        TurnRequest {
            previous_response_id: "resp_0".into(),
            call_id: "call_1".into(),
            acknowledged_safety_checks: vec![],
            observation: Observation::new(b"png".to_vec()),
            display: DisplaySpec { width: 1024, height: 768, environment: Environment::Browser },
        }
    }

    fn cfg(max_attempts: u32) -> RetryConfig {
        RetryConfig { max_attempts, initial_backoff_ms: 100 }
    }

    fn unavailable() -> ScreenLoopError {
        ScreenLoopError::PlanningStatus { status: 503, body: "overloaded".into() }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_with_same_call_id() {
        let inner = ScriptedPlanner::with_results(vec![
            Err(unavailable()),
            Err(unavailable()),
            Ok(final_turn("resp_1", "ok")),
        ]);
        let planner = RetryingPlanner::new(inner, &cfg(3));

        let resp = planner.submit(&request()).await.unwrap();

        assert_eq!(resp.id, "resp_1");
        let sent = planner.inner.recorded();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|r| r.call_id == "call_1" && r.previous_response_id == "resp_0"));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let inner = ScriptedPlanner::with_results(vec![Err(unavailable()), Err(unavailable())]);
        let planner = RetryingPlanner::new(inner, &cfg(2));

        let err = planner.submit(&request()).await.unwrap_err();

        assert!(matches!(err, ScreenLoopError::PlanningStatus { status: 503, .. }));
        assert_eq!(planner.inner.recorded().len(), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let inner = ScriptedPlanner::with_results(vec![
            Err(ScreenLoopError::PlanningStatus { status: 400, body: "bad input".into() }),
            Ok(final_turn("resp_1", "unused")),
        ]);
        let planner = RetryingPlanner::new(inner, &cfg(5));

        assert!(planner.submit(&request()).await.is_err());
        assert_eq!(planner.inner.recorded().len(), 1);
    }
}
