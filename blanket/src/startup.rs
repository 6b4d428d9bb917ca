use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use told_core::middleware::tracing::{request_id_middleware, REQUEST_ID_HEADER};
use tower_http::trace::TraceLayer;

use crate::handlers::{app::health_check, beregning::beregning, metrics::metrics, varesatser::varesatser};
use crate::middleware::metrics::metrics_middleware;
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/varesatser", get(varesatser))
        .route("/api/beregning", post(beregning))
        .route_layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
