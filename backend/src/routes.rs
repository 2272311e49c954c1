use crate::handlers;
use crate::state::AppState;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("ignoring invalid cors origin {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_credentials(true)
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::COOKIE,
            axum::http::HeaderName::from_static("x-csrf-token"),
            axum::http::HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/auth/sign-in", post(handlers::sign_in))
        .route("/api/v1/auth/sign-out", post(handlers::sign_out))
        .route("/api/v1/auth/me", get(handlers::me))
        .route("/api/v1/dashboard", get(handlers::dashboard))
        .route("/api/v1/quizzes", get(handlers::list_quizzes).post(handlers::create_quiz))
        .route(
            "/api/v1/quizzes/:id",
            get(handlers::get_quiz).put(handlers::update_quiz).delete(handlers::delete_quiz),
        )
        .route("/api/v1/quizzes/:id/attempts", post(handlers::start_attempt))
        .route("/api/v1/attempts/:id", get(handlers::get_attempt))
        .route("/api/v1/attempts/:id/actions", post(handlers::attempt_action))
        .route("/api/v1/drafts", post(handlers::create_draft))
        .route("/api/v1/drafts/:id", get(handlers::get_draft))
        .route("/api/v1/drafts/:id/actions", post(handlers::draft_action))
        .route("/api/v1/drafts/:id/submit", post(handlers::submit_draft))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}
