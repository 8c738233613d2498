use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EvaluateStepsRequest {
    #[validate(length(min = 1, max = 4000))]
    pub problem_text: String,
    #[serde(default)]
    #[validate(length(max = 50))]
    pub workings: Vec<String>,
}
