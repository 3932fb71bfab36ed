use axum::{
    routing::{get, post},
    Router,
};

use crate::api::{handlers, state::ApiState};

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/cron/pipeline", post(handlers::run_pipeline))
        .with_state(state)
}
