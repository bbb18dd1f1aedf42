//! HTTP API for the chat pipeline

pub mod handlers;
pub mod integration;
pub mod models;
pub mod routes;

pub use handlers::AppState;
pub use integration::{build_app, build_app_with, init_orchestrator};
pub use models::{ApiError, ChatRequestBody, HealthResponse};
pub use routes::build_router;
