use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use timehook_core::TimehookConfig;
use timehook_scheduler::TaskManager;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: TimehookConfig,
    pub tasks: Arc<TaskManager>,
}

impl AppState {
    pub fn new(config: TimehookConfig, tasks: Arc<TaskManager>) -> Self {
        Self { config, tasks }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::tasks::list_summaries))
        .route("/task", post(crate::http::tasks::add_task))
        .route("/tasks", get(crate::http::tasks::list_tasks))
        .route("/tasks/{id}", delete(crate::http::tasks::remove_task))
        .route("/health", get(crate::http::health::health_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
