// src/api/mod.rs
//
// HTTP/WebSocket surface:
//   GET  /api/health
//   GET  /api/sports
//   GET  /api/alerts/history?limit=N
//   GET  /api/metrics
//   POST /api/analyze-frame
//   WS   /ws/analyze

pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;
pub mod websocket;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/sports", get(handlers::sports))
        .route("/api/alerts/history", get(handlers::alert_history))
        .route("/api/metrics", get(handlers::metrics))
        .route("/api/analyze-frame", post(handlers::analyze_frame))
        .route("/ws/analyze", get(websocket::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::PredictorRegistry;
    use crate::types::{Config, PredictorConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use crate::profiles::Sport;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        let mut config = Config::default();
        config.predictor = PredictorConfig::fast();
        let registry = Arc::new(PredictorRegistry::new(config.predictor.clone()));
        create_router(AppState::new(config, registry))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_sports() {
        let app = app();
        let (status, body) = send(&app, get_req("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&app, get_req("/api/sports")).await;
        assert_eq!(status, StatusCode::OK);
        let sports = body["sports"].as_array().unwrap();
        assert_eq!(sports.len(), 4);
        assert_eq!(sports[0]["sport"], "football");
        assert_eq!(sports[0]["injury_count"], 5);
    }

    #[tokio::test]
    async fn test_analyze_frame_with_client_keypoints() {
        let app = app();
        let request = json!({
            "sport": "football",
            "timestamp": 1.0,
            "keypoints": {
                "left_hip": {"x": 0.56, "y": 0.55},
                "left_knee": {"x": 0.56, "y": 0.75},
                "left_ankle": {"x": 0.62, "y": 0.56}
            }
        });
        let (status, body) = send(&app, post_json("/api/analyze-frame", request)).await;
        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert_eq!(body["sport"], "football");
        assert_eq!(body["alert_level"], "RED", "acute knee flexion escalates");
        assert_eq!(body["posture_alerts"][0]["severity"], "danger");

        let (status, body) = send(&app, get_req("/api/alerts/history?limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);

        let (_, metrics) = send(&app, get_req("/api/metrics")).await;
        assert_eq!(metrics["frames_admitted"], 1);
        assert_eq!(metrics["alerts_red"], 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_history_answers_while_a_sport_trains() {
        let mut config = Config::default();
        config.predictor = PredictorConfig {
            synthetic_samples: 2500,
            n_estimators: 25,
            ..PredictorConfig::default()
        };
        let registry = Arc::new(PredictorRegistry::new(config.predictor.clone()));
        let state = AppState::new(config, registry.clone());
        let app = create_router(state);

        let training = {
            let app = app.clone();
            tokio::spawn(async move {
                let request = json!({"sport": "cricket", "keypoints": {"nose": {"x": 0.5, "y": 0.2}}});
                send(&app, post_json("/api/analyze-frame", request)).await
            })
        };
        tokio::time::sleep(Duration::from_millis(300)).await;

        let (status, body) = tokio::time::timeout(
            Duration::from_secs(2),
            send(&app, get_req("/api/alerts/history")),
        )
        .await
        .expect("history must not wait for training");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
        assert_eq!(registry.trainings(), 1, "cricket training has started");
        assert!(registry.get(Sport::Cricket).is_none(), "cricket still training");

        let (status, body) = training.await.unwrap();
        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert_eq!(body["sport"], "cricket");
        assert_eq!(registry.trainings(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_image_is_bad_request() {
        let app = app();
        let request = json!({"image_base64": "data:image/png;base64,@@@@"});
        let (status, body) = send(&app, post_json("/api/analyze-frame", request)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        // The failed frame does not disturb the session.
        let png = crate::api::dto::tests::png_base64(32, 24);
        let (status, body) = send(&app, post_json("/api/analyze-frame", json!({"image_base64": png}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["frame_index"], 1);
    }
}
