use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use math_check_backend::{
    config::Config,
    router,
    services::step_service::StepScorer,
    AppState,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

struct FixedScorer(f64);

#[async_trait]
impl StepScorer for FixedScorer {
    async fn score(
        &self,
        _problem_text: &str,
        _workings: &[String],
    ) -> math_check_backend::error::Result<f64> {
        Ok(self.0)
    }
}

fn test_config() -> Config {
    Config {
        server_address: "127.0.0.1:0".to_string(),
        public_rps: 1000,
        default_tolerance: 0.01,
        check_timeout_ms: 5000,
        max_expansion_degree: 64,
        step_scorer_url: None,
        step_pass_threshold: 0.7,
    }
}

fn app(scorer: Option<Arc<dyn StepScorer>>) -> Router {
    router(AppState::with_scorer(test_config(), scorer))
}

async fn evaluate(app: Router, body: JsonValue) -> (StatusCode, JsonValue) {
    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/evaluate-steps/")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null))
}

#[tokio::test]
async fn without_model_reports_not_loaded() {
    let (status, body) = evaluate(
        app(None),
        json!({ "problem_text": "Solve 2x = 4 for x = 2", "workings": ["x = 2"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_correct"], false);
    assert_eq!(body["score"], 0.0);
    assert_eq!(body["errors"], json!(["model_not_loaded"]));
}

#[tokio::test]
async fn correct_workings_pass() {
    let (status, body) = evaluate(
        app(Some(Arc::new(FixedScorer(0.9)))),
        json!({
            "problem_text": "Solve 2x = 4 for x = 2",
            "workings": ["2x = 4", "x = 4/2", "x = 2"]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_correct"], true);
    assert_eq!(body["expected_answer"], "2");
    assert_eq!(body["errors"], json!([]));
}

#[tokio::test]
async fn double_sign_is_flagged() {
    let (status, body) = evaluate(
        app(Some(Arc::new(FixedScorer(0.5)))),
        json!({
            "problem_text": "Simplify 3 - -2 = 5",
            "workings": ["3 - -2", "5"]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let errors = body["errors"].as_array().unwrap();
    assert!(errors.contains(&json!("sign_error")));
}

#[tokio::test]
async fn empty_problem_text_fails_validation() {
    let (status, body) = evaluate(
        app(None),
        json!({ "problem_text": "", "workings": [] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
