use crate::handlers;
use crate::state::AppState;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/quizzes/normalize", post(handlers::normalize_quiz))
        .route("/api/v1/attempts", post(handlers::create_attempt))
        .route("/api/v1/attempts/:id", get(handlers::get_attempt))
        .route("/api/v1/attempts/:id/start", post(handlers::start_attempt))
        .route("/api/v1/attempts/:id/answers/:index", put(handlers::record_selection))
        .route("/api/v1/attempts/:id/submit", post(handlers::submit_attempt))
        .route("/api/v1/score", post(handlers::score_attempt))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::model::StubPredictionService;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router() -> Router {
        build_router(AppState::new(
            Arc::new(StubPredictionService::default()),
            AppConfig::default(),
        ))
    }

    #[tokio::test]
    async fn health() {
        let resp = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn unknown_attempt_is_404_with_request_id() {
        let resp = router()
            .oneshot(
                Request::get("/api/v1/attempts/41")
                    .header("x-request-id", "trace-me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "NOT_FOUND");
        assert_eq!(json["error"]["request_id"], "trace-me");
    }

    #[tokio::test]
    async fn blank_topic_fails_validation() {
        let resp = router()
            .oneshot(
                Request::post("/api/v1/quizzes/normalize")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"topic": "", "rows": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["details"][0]["field"], "topic");
    }

    #[tokio::test]
    async fn whitespace_topic_fails_validation() {
        let resp = router()
            .oneshot(
                Request::post("/api/v1/attempts")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"topic": "   ", "rows": [{"Question": "q"}]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["details"][0]["field"], "topic");
    }
}
