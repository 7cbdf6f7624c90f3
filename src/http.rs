//! HTTP surface: `POST /screenshot`, `GET /health`, `GET /cache/stats`,
//! `DELETE /cache`, `GET /metrics`.

use crate::config::CaptureRequest;
use crate::pipeline::{self, PipelineOutcome, Services};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(services: Arc<Services>) -> Router {
    Router::new()
        .route("/screenshot", post(screenshot))
        .route("/health", get(health))
        .route("/cache/stats", get(cache_stats))
        .route("/cache", delete(clear_cache))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(services)
}

#[derive(Serialize)]
struct ScreenshotResponse {
    url: String,
}

async fn screenshot(
    State(services): State<Arc<Services>>,
    Json(request): Json<CaptureRequest>,
) -> Response {
    match pipeline::handle_request(&services, request).await {
        Ok(PipelineOutcome::Processed(url)) => {
            (StatusCode::OK, Json(ScreenshotResponse { url })).into_response()
        }
        Ok(PipelineOutcome::Rejected) => error_response(503, Some(30), "overloaded"),
        Ok(PipelineOutcome::TimedOut) => error_response(429, Some(10), "queue timeout"),
        Err(e) => {
            let (status, retry_after) = e.http_status();
            error_response(status, retry_after, &e.to_string())
        }
    }
}

fn error_response(status: u16, retry_after: Option<u64>, message: &str) -> Response {
    #[derive(Serialize)]
    struct ErrorBody {
        error: String,
    }
    let mut response = (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response();
    if let Some(seconds) = retry_after {
        if let Ok(value) = axum::http::HeaderValue::from_str(&seconds.to_string()) {
            response.headers_mut().insert("Retry-After", value);
        }
    }
    response
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    browser_pool: crate::BrowserPoolStats,
    queue: crate::queue::QueueStats,
    cache: crate::cache::CacheStats,
}

async fn health(State(services): State<Arc<Services>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        browser_pool: services.capture.browser_pool.get_stats().await,
        queue: services.queue.stats(),
        cache: services.cache.stats(),
    })
}

async fn cache_stats(State(services): State<Arc<Services>>) -> Json<crate::cache::CacheStats> {
    Json(services.cache.stats())
}

async fn clear_cache(State(services): State<Arc<Services>>) -> StatusCode {
    services.cache.clear();
    StatusCode::NO_CONTENT
}

async fn metrics(State(services): State<Arc<Services>>) -> impl IntoResponse {
    (StatusCode::OK, services.metrics_handle.render())
}
