use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::math::{Bindings, CheckError, EqualityChecks, ProblemKind, Verdict};

pub const EVALUATION_METHOD: &str = "symbolic";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckMathRequest {
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub user_answer: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub correct_answer: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub problem_type: String,
    #[serde(default)]
    pub variables: Bindings,
    #[validate(range(min = 0.0))]
    pub tolerance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckMathResponse {
    pub correct: bool,
    pub user_answer: String,
    pub expected_answer: String,
    pub problem_type: ProblemKind,
    pub evaluation_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_answer_symbolic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_answer_symbolic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<EqualityChecks>,
}

impl TryFrom<Verdict> for CheckMathResponse {
    type Error = CheckError;

    fn try_from(verdict: Verdict) -> Result<Self, Self::Error> {
        if let Some(err) = verdict.error {
            return Err(err);
        }
        let problem_type = verdict
            .kind
            .ok_or_else(|| CheckError::InvalidProblemType(String::new()))?;
        let (user_answer_symbolic, expected_answer_symbolic) = match verdict.symbolic_forms {
            Some((user, expected)) => (Some(user), Some(expected)),
            None => (None, None),
        };
        Ok(Self {
            correct: verdict.is_correct,
            user_answer: verdict.normalized_user_answer,
            expected_answer: verdict.normalized_reference_answer,
            problem_type,
            evaluation_method: EVALUATION_METHOD.to_string(),
            user_answer_symbolic,
            expected_answer_symbolic,
            checks: verdict.checks,
        })
    }
}
