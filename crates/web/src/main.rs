use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use chess_orchestrator_core::{Orchestrator, OrchestratorConfig};

mod error;
mod routes;

pub struct AppState {
    pub orchestrator: Mutex<Orchestrator>,
}

pub type SharedState = Arc<AppState>;

pub fn app(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/metrics", get(routes::metrics))
        .route("/game", get(routes::game::state))
        .route("/game/new", post(routes::game::new_game))
        .route("/game/fen", post(routes::game::load_fen))
        .route("/game/move", post(routes::game::make_move))
        .route("/game/undo", post(routes::game::undo))
        .route("/game/resign", post(routes::game::resign))
        .route("/game/mode", post(routes::game::set_mode))
        .route("/game/pgn", get(routes::game::pgn))
        .route("/game/analysis", get(routes::game::analysis))
        .route("/game/ai-move", post(routes::game::ai_move))
        .route("/game/thinking", get(routes::game::thinking))
        .route("/game/sync", get(routes::game::sync))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = OrchestratorConfig::from_env();
    let mut orchestrator = match Orchestrator::new(config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "failed to open storage");
            std::process::exit(1);
        }
    };
    if let Err(e) = orchestrator.initialize().await {
        tracing::error!(error = %e, "failed to initialize");
        std::process::exit(1);
    }

    let state = Arc::new(AppState {
        orchestrator: Mutex::new(orchestrator),
    });

    let addr = std::env::var("CHESS_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %addr, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("Server running at http://{}", addr);

    if let Err(e) = axum::serve(listener, app(state)).await {
        tracing::error!(error = %e, "server stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let mut orchestrator = Orchestrator::new(OrchestratorConfig::default()).unwrap();
        orchestrator.initialize().await.unwrap();
        app(Arc::new(AppState {
            orchestrator: Mutex::new(orchestrator),
        }))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_move_and_undo() {
        let app = test_app().await;
        let (status, body) = call(&app, "POST", "/game/move", Some(r#"{"from":"e2","to":"e4"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["notation"], "e4");

        let (_, body) = call(&app, "POST", "/game/undo", None).await;
        assert_eq!(body["undone"], true);
        assert_eq!(body["state"]["moves"].as_array().unwrap().len(), 0);

        let (_, body) = call(&app, "GET", "/game/sync", None).await;
        assert_eq!(body["synchronized"], true);
    }

    #[tokio::test]
    async fn test_rejected_move_and_bad_fen() {
        let app = test_app().await;
        let (status, body) = call(&app, "POST", "/game/move", Some(r#"{"from":"e2","to":"e5"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);

        let (status, body) = call(&app, "POST", "/game/fen", Some(r#"{"fen":"nonsense"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("Invalid FEN"));
    }

    #[tokio::test]
    async fn test_resign_and_health() {
        let app = test_app().await;
        let (_, body) = call(&app, "POST", "/game/resign", Some(r#"{"color":"white"}"#)).await;
        assert_eq!(body["resigned"], true);
        assert_eq!(body["state"]["result"], "black_wins");

        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");

        let (status, _) = call(&app, "POST", "/game/ai-move", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
