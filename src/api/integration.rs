//! Wiring configuration into a ready-to-serve router

use axum::Router;
use std::sync::Arc;
use tracing::info;

use crate::{
    api::{handlers::AppState, routes::build_router},
    config::Config,
    context::{CharRatioEstimator, ChatOrchestrator, CompactionEngine, TracingObserver},
    error::Result,
    llm::{build_capability, ModelCapability},
};

/// Build the orchestrator from explicit capabilities
pub fn init_orchestrator(
    config: &Config,
    compactor: Arc<dyn ModelCapability>,
    inference: Arc<dyn ModelCapability>,
) -> ChatOrchestrator {
    let engine = CompactionEngine::new(
        compactor,
        Arc::new(CharRatioEstimator::default()),
        config.compactor.token_threshold,
    );

    ChatOrchestrator::new(engine, inference).with_observer(Arc::new(TracingObserver))
}

/// Build both model clients from configuration, then the router
pub fn build_app(config: &Config) -> Result<Router> {
    let compactor = build_capability(&config.models.compactor, &config.vertex)?;
    let inference = build_capability(&config.models.inference, &config.vertex)?;

    info!(
        "Pipeline: compactor={}, inference={}, threshold={} tokens",
        compactor.model_name(),
        inference.model_name(),
        config.compactor.token_threshold
    );

    Ok(build_app_with(config, compactor, inference))
}

/// Router over caller-supplied capabilities
pub fn build_app_with(
    config: &Config,
    compactor: Arc<dyn ModelCapability>,
    inference: Arc<dyn ModelCapability>,
) -> Router {
    let state = AppState {
        orchestrator: Arc::new(init_orchestrator(config, compactor, inference)),
    };
    build_router(state, config.server.max_body_bytes)
}
