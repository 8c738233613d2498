use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use math_check_backend::{config::Config, router, AppState};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

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

fn app() -> Router {
    router(AppState::with_scorer(test_config(), None))
}

async fn post_json(app: Router, uri: &str, body: JsonValue) -> (StatusCode, JsonValue) {
    let res = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let res = app()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), 1024).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["step_model_loaded"], false);
}

#[tokio::test]
async fn equivalent_expressions_are_correct() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "2x+2",
            "correct_answer": "2*(x+1)",
            "problem_type": "expression"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], true);
    assert_eq!(body["user_answer"], "2*x+2");
    assert_eq!(body["problem_type"], "expression");
    assert_eq!(body["evaluation_method"], "symbolic");
    assert_eq!(body["checks"]["simplified_difference"], true);
}

#[tokio::test]
async fn latex_answer_matches_plain_form() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "\\frac{x^2-1}{x-1}",
            "correct_answer": "x + 1",
            "problem_type": "expression"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], true);
}

#[tokio::test]
async fn wrong_answer_is_200_not_correct() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "x^2",
            "correct_answer": "2x",
            "problem_type": "expression"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], false);
}

#[tokio::test]
async fn bound_variables_are_substituted() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "3y",
            "correct_answer": "6",
            "problem_type": "expression",
            "variables": { "y": 2 }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], true);
}

#[tokio::test]
async fn numeric_answers_use_tolerance() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "3.14",
            "correct_answer": "pi",
            "problem_type": "numeric"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], true);

    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "3.14",
            "correct_answer": "pi",
            "problem_type": "numeric",
            "tolerance": 0.0001
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], false);
}

#[tokio::test]
async fn scientific_notation_reference_is_numeric() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "100000",
            "correct_answer": "1e5",
            "problem_type": "numeric"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], true);
    assert_eq!(body["expected_answer"], "1e5");
}

#[tokio::test]
async fn tiny_exact_difference_is_not_correct() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "x + 0.0000000001",
            "correct_answer": "x",
            "problem_type": "expression"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], false);
    assert_eq!(body["checks"]["exact"], true);
    assert_eq!(body["checks"]["disagreement"], true);
}

#[tokio::test]
async fn equation_sides_may_be_swapped() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "2 = x + 1",
            "correct_answer": "x + 1 = 2",
            "problem_type": "equation"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["correct"], true);
}

#[tokio::test]
async fn malformed_equation_is_400() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "x = 1 = 1",
            "correct_answer": "x = 1",
            "problem_type": "equation"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "MalformedEquation");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unknown_problem_type_is_400() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "x",
            "correct_answer": "x",
            "problem_type": "matrix"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "InvalidProblemType");
}

#[tokio::test]
async fn missing_answer_is_400() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "correct_answer": "x",
            "problem_type": "expression"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "MissingAnswer");
}

#[tokio::test]
async fn non_numeric_value_is_400() {
    let (status, body) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "x",
            "correct_answer": "2",
            "problem_type": "numeric"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "NumericEvaluationError");
}

#[tokio::test]
async fn negative_tolerance_fails_validation() {
    let (status, _) = post_json(
        app(),
        "/api/check-math/",
        json!({
            "user_answer": "1",
            "correct_answer": "1",
            "problem_type": "numeric",
            "tolerance": -1.0
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rate_limit_rejects_excess_requests() {
    let mut config = test_config();
    config.public_rps = 1;
    let app = router(AppState::with_scorer(config, None));
    let body = json!({
        "user_answer": "1",
        "correct_answer": "1",
        "problem_type": "numeric"
    });

    let (first, _) = post_json(app.clone(), "/api/check-math/", body.clone()).await;
    let (second, second_body) = post_json(app, "/api/check-math/", body).await;
    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second_body["error"], "rate_limit_exceeded");
}
