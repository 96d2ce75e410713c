use axum::{extract::State, Json};
use serde::Serialize;

use chess_orchestrator_core::orchestrator::{ComponentHealth, PerformanceMetrics};

use crate::SharedState;

pub mod game;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub components: Vec<ComponentHealth>,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let orchestrator = state.orchestrator.lock().await;
    Json(HealthResponse {
        status: "OK",
        components: orchestrator.check_component_health(),
    })
}

pub async fn metrics(State(state): State<SharedState>) -> Json<PerformanceMetrics> {
    let orchestrator = state.orchestrator.lock().await;
    Json(orchestrator.get_performance_metrics().clone())
}
