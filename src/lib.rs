pub mod config;
pub mod dto;
pub mod error;
pub mod math;
pub mod middleware;
pub mod routes;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::math::EquivalenceChecker;
use crate::middleware::{cors::api_cors, rate_limit};
use crate::services::{
    check_service::CheckService,
    step_service::{RemoteStepScorer, StepScorer, StepService},
};

const MAX_BODY_BYTES: usize = 256 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub check_service: CheckService,
    pub step_service: StepService,
}

impl AppState {
    pub fn new(config: Config) -> error::Result<Self> {
        let scorer = match &config.step_scorer_url {
            Some(url) => {
                let http_client = Client::builder()
                    .timeout(Duration::from_secs(30))
                    .build()?;
                tracing::info!("Step scorer configured at {}", url);
                Some(Arc::new(RemoteStepScorer::new(url.clone(), http_client)) as Arc<dyn StepScorer>)
            }
            None => {
                tracing::warn!("STEP_SCORER_URL not set; step evaluation will report model_not_loaded");
                None
            }
        };
        Ok(Self::with_scorer(config, scorer))
    }

    pub fn with_scorer(config: Config, scorer: Option<Arc<dyn StepScorer>>) -> Self {
        let checker = Arc::new(EquivalenceChecker::new(config.checker_config()));
        let check_service = CheckService::new(checker.clone(), config.check_timeout());
        let step_service = StepService::new(scorer, checker, config.step_config());

        Self {
            config: Arc::new(config),
            check_service,
            step_service,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let base_routes = Router::new().route("/health", get(routes::health::health));

    let api = Router::new()
        .route("/api/check-math/", post(routes::check::check_math_answer))
        .route("/api/evaluate-steps/", post(routes::steps::evaluate_steps))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::RateLimiter::new(state.config.public_rps),
            rate_limit::rps_middleware,
        ));

    base_routes
        .merge(api)
        .with_state(state)
        .layer(api_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
