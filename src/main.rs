use quiz_recommender::{build_state, config::AppConfig, routes::build_router};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        max_questions = config.quiz.max_questions,
        sample_seed = config.quiz.sample_seed,
        attempt_retention_secs = config.attempts.retention_secs,
        max_live_attempts = config.attempts.max_live,
        "quiz configuration"
    );
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let state = build_state(config)?;

    let attempts = state.attempts.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let purged = attempts.purge_expired(chrono::Utc::now()).await;
            if purged > 0 {
                tracing::info!(purged, "expired attempts purged");
            }
        }
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("recommender listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
