//! Axum router construction.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(routes::health::health_check))
        // Videos
        .route(
            "/videos",
            get(routes::videos::list_videos).post(routes::videos::create_video),
        )
        .route(
            "/videos/{id}",
            get(routes::videos::get_video).delete(routes::videos::delete_video),
        )
        .route("/videos/{id}/requeue", post(routes::videos::requeue_video))
        // Encoders
        .route("/encoders", get(routes::encoders::list_encoders))
        .route("/encoders/{id}", get(routes::encoders::get_encoder))
        // SSE Events
        .route("/events", get(routes::events::events_handler));

    Router::new()
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
