pub mod config;
pub mod error;
pub mod handlers;
pub mod matcher;
pub mod model;
pub mod models;
pub mod normalize;
pub mod recommend;
pub mod routes;
pub mod scoring;
pub mod state;

use std::sync::Arc;

pub fn build_state(config: config::AppConfig) -> anyhow::Result<state::AppState> {
    let predictor: Arc<dyn recommend::PredictionService> = match config.model_path.as_deref() {
        Some(path) => Arc::new(model::TreeModel::from_path(path)?),
        None => {
            tracing::info!("MODEL_PATH not set, using the stub predictor");
            Arc::new(model::StubPredictionService::default())
        }
    };
    Ok(state::AppState::new(predictor, config))
}
