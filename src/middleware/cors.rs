use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// The checker is called from browser frontends on other origins; only the
/// JSON endpoints' verbs and headers are exposed.
pub fn api_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_origin(Any)
}
