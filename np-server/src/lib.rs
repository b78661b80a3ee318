//! np-server library interface
//!
//! Exposes the router and state so integration tests can drive the service
//! with fake collaborators.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::http::HeaderName;
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::pipeline::response::EXPOSED_HEADERS;
use crate::pipeline::PredictionPipeline;
use crate::services::{BasicPitchCli, StratumTempoEstimator};
use crate::utils::SymphoniaLoader;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PredictionPipeline>,
    /// Delete served MIDI files after this long (None = keep)
    pub output_retention: Option<Duration>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last prediction failure, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: PredictionPipeline, output_retention: Option<Duration>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            output_retention,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// State wired to the production collaborators (basic-pitch CLI, symphonia, stratum-dsp)
    pub fn from_config(config: &ServiceConfig) -> Self {
        let pipeline = PredictionPipeline::new(
            config.work_dirs(),
            Arc::new(BasicPitchCli::new(
                config.basic_pitch_bin.clone(),
                config.model_path.clone(),
            )),
            Arc::new(SymphoniaLoader),
            Arc::new(StratumTempoEstimator::default()),
            config.tempo_max_seconds,
        );
        Self::new(pipeline, config.output_retention)
    }
}

/// Build application router
///
/// `/predict`, `/`, `/health`, plus the output directory under `/outputs`.
pub fn build_router(state: AppState) -> Router {
    let outputs = ServeDir::new(state.pipeline.dirs().output_dir());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(EXPOSED_HEADERS.map(HeaderName::from_static));

    Router::new()
        .merge(api::predict_routes())
        .merge(api::health_routes())
        .nest_service("/outputs", outputs)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
