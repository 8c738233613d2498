use axum::{extract::State, Json};
use validator::Validate;

use crate::dto::check_dto::{CheckMathRequest, CheckMathResponse};
use crate::AppState;

#[axum::debug_handler]
pub async fn check_math_answer(
    State(state): State<AppState>,
    Json(payload): Json<CheckMathRequest>,
) -> crate::error::Result<Json<CheckMathResponse>> {
    payload.validate()?;

    let request_id = uuid::Uuid::new_v4();
    tracing::info!(
        %request_id,
        problem_type = %payload.problem_type,
        "Checking math answer"
    );

    let verdict = state
        .check_service
        .check(
            payload.user_answer,
            payload.correct_answer,
            payload.problem_type,
            payload.variables,
            payload.tolerance,
        )
        .await?;

    if let Some(err) = &verdict.error {
        tracing::info!(%request_id, error_type = err.kind(), "Answer rejected: {}", err);
    }
    let response = CheckMathResponse::try_from(verdict)?;
    tracing::info!(%request_id, correct = response.correct, "Answer checked");
    Ok(Json(response))
}
