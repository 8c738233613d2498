use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::steps::{detect_issues, expected_answer, final_answer, StepIssue};
use crate::math::{Bindings, EquivalenceChecker};

/// Scores how plausible a worked solution is, in `[0, 1]`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StepScorer: Send + Sync {
    async fn score(&self, problem_text: &str, workings: &[String]) -> Result<f64>;
}

/// Step scorer backed by a model server. The server receives
/// `{"problem": ..., "workings": [...]}` and answers `{"score": f64}`.
#[derive(Clone)]
pub struct RemoteStepScorer {
    client: Client,
    url: String,
}

impl RemoteStepScorer {
    pub fn new(url: String, client: Client) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl StepScorer for RemoteStepScorer {
    async fn score(&self, problem_text: &str, workings: &[String]) -> Result<f64> {
        #[derive(Serialize)]
        struct Req<'a> {
            problem: &'a str,
            workings: &'a [String],
        }
        #[derive(Deserialize)]
        struct Resp {
            score: f64,
        }

        let resp: Resp = self
            .client
            .post(&self.url)
            .json(&Req {
                problem: problem_text,
                workings,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.score)
    }
}

#[derive(Debug, Clone)]
pub struct StepConfig {
    pub neural_weight: f64,
    pub symbolic_weight: f64,
    pub pass_threshold: f64,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            neural_weight: 0.7,
            symbolic_weight: 0.3,
            pass_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvaluation {
    pub is_correct: bool,
    pub score: f64,
    pub errors: Vec<StepIssue>,
    pub expected_answer: String,
}

impl StepEvaluation {
    fn failed(issue: StepIssue) -> Self {
        Self {
            is_correct: false,
            score: 0.0,
            errors: vec![issue],
            expected_answer: String::new(),
        }
    }
}

/// Grades worked solutions by blending a model score with a symbolic check
/// of the final answer.
#[derive(Clone)]
pub struct StepService {
    scorer: Option<Arc<dyn StepScorer>>,
    checker: Arc<EquivalenceChecker>,
    config: StepConfig,
}

impl StepService {
    pub fn new(
        scorer: Option<Arc<dyn StepScorer>>,
        checker: Arc<EquivalenceChecker>,
        config: StepConfig,
    ) -> Self {
        Self {
            scorer,
            checker,
            config,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.scorer.is_some()
    }

    pub async fn evaluate(&self, problem_text: &str, workings: &[String]) -> StepEvaluation {
        let Some(scorer) = &self.scorer else {
            return StepEvaluation::failed(StepIssue::ModelNotLoaded);
        };

        let score = match scorer.score(problem_text, workings).await {
            Ok(score) => score.clamp(0.0, 1.0),
            Err(e) => {
                tracing::error!("Step scoring failed: {:?}", e);
                return StepEvaluation::failed(StepIssue::EvaluationError);
            }
        };

        let expected = expected_answer(problem_text);
        let symbolic_correct = match final_answer(workings) {
            Some(answer) if !expected.is_empty() => {
                let verdict =
                    self.checker
                        .check(&answer, &expected, "expression", &Bindings::new(), None);
                if let Some(err) = &verdict.error {
                    tracing::debug!("Symbolic check of final answer failed: {}", err);
                }
                verdict.is_correct
            }
            _ => false,
        };

        let symbolic = if symbolic_correct { 1.0 } else { 0.0 };
        let combined = self.config.neural_weight * score + self.config.symbolic_weight * symbolic;

        StepEvaluation {
            is_correct: combined > self.config.pass_threshold,
            score: combined,
            errors: detect_issues(problem_text, workings),
            expected_answer: expected,
        }
    }
}
