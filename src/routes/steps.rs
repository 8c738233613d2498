use axum::{extract::State, Json};
use validator::Validate;

use crate::dto::step_dto::EvaluateStepsRequest;
use crate::services::step_service::StepEvaluation;
use crate::AppState;

#[axum::debug_handler]
pub async fn evaluate_steps(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateStepsRequest>,
) -> crate::error::Result<Json<StepEvaluation>> {
    payload.validate()?;
    let result = state
        .step_service
        .evaluate(&payload.problem_text, &payload.workings)
        .await;
    tracing::info!(
        "Evaluated {} steps: score={:.3}, correct={}",
        payload.workings.len(),
        result.score,
        result.is_correct
    );
    Ok(Json(result))
}
