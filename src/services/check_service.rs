use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::math::{Bindings, EquivalenceChecker, Verdict};

/// Runs answer checks off the async runtime under a time limit.
///
/// The blocking task cannot be cancelled from outside, so the checker is
/// handed the same deadline and abandons symbolic work once it passes.
#[derive(Clone)]
pub struct CheckService {
    checker: Arc<EquivalenceChecker>,
    timeout: Duration,
}

impl CheckService {
    pub fn new(checker: Arc<EquivalenceChecker>, timeout: Duration) -> Self {
        Self { checker, timeout }
    }

    pub fn checker(&self) -> &Arc<EquivalenceChecker> {
        &self.checker
    }

    pub async fn check(
        &self,
        user_answer: String,
        reference_answer: String,
        kind: String,
        bindings: Bindings,
        tolerance: Option<f64>,
    ) -> Result<Verdict> {
        let checker = self.checker.clone();
        let deadline = Instant::now() + self.timeout;
        let task = tokio::task::spawn_blocking(move || {
            checker.check_until(
                &user_answer,
                &reference_answer,
                &kind,
                &bindings,
                tolerance,
                deadline,
            )
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(verdict)) => Ok(verdict),
            Ok(Err(join_error)) => {
                tracing::error!("Answer check task failed: {:?}", join_error);
                Err(Error::Internal("answer check failed".to_string()))
            }
            Err(_) => {
                let ms = self.timeout.as_millis() as u64;
                tracing::warn!("Answer check exceeded {} ms", ms);
                Err(Error::Timeout(ms))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_check_on_blocking_pool() {
        let svc = CheckService::new(
            Arc::new(EquivalenceChecker::default()),
            Duration::from_secs(5),
        );
        let verdict = svc
            .check(
                "x^2 - 1".into(),
                "(x-1)(x+1)".into(),
                "expression".into(),
                Bindings::new(),
                None,
            )
            .await
            .unwrap();
        assert!(verdict.is_correct);
    }

    #[tokio::test]
    async fn zero_budget_times_out() {
        let svc = CheckService::new(Arc::new(EquivalenceChecker::default()), Duration::ZERO);
        let result = svc
            .check(
                "(x+1)^64".into(),
                "(1+x)^64".into(),
                "expression".into(),
                Bindings::new(),
                None,
            )
            .await;
        assert!(matches!(result, Err(Error::Timeout(0))));
    }
}
