//! Phase timings, running performance counters and component health

use std::time::Instant;

use serde::Serialize;

/// Milliseconds spent in each phase of one move
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTimings {
    pub validation_ms: f64,
    pub execution_ms: f64,
    pub history_ms: f64,
    pub sync_ms: f64,
    pub notation_ms: f64,
    pub endgame_ms: f64,
    pub total_ms: f64,
}

/// Wall-clock stopwatch that reads out in fractional milliseconds
pub(crate) struct Stopwatch(Instant);

impl Stopwatch {
    pub(crate) fn start() -> Self {
        Self(Instant::now())
    }

    pub(crate) fn elapsed_ms(&self) -> f64 {
        self.0.elapsed().as_secs_f64() * 1000.0
    }

    /// Elapsed time since the last lap, restarting the watch
    pub(crate) fn lap(&mut self) -> f64 {
        let ms = self.elapsed_ms();
        self.0 = Instant::now();
        ms
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_moves: u64,
    pub failed_moves: u64,
    pub average_move_ms: f64,
    pub last_move_ms: f64,
    pub slowest_move_ms: f64,
    pub slow_operations: u64,
    pub errors: u64,
    pub events_emitted: u64,
    pub listener_failures: u64,
    pub sync_checks: u64,
    pub sync_failures: u64,
    pub last_timings: Option<PhaseTimings>,
}

impl PerformanceMetrics {
    pub fn record_move(&mut self, timings: PhaseTimings) {
        let n = self.total_moves as f64;
        self.average_move_ms = (self.average_move_ms * n + timings.total_ms) / (n + 1.0);
        self.total_moves += 1;
        self.last_move_ms = timings.total_ms;
        self.slowest_move_ms = self.slowest_move_ms.max(timings.total_ms);
        self.last_timings = Some(timings);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentHealth {
    pub component: &'static str,
    pub status: HealthStatus,
    pub detail: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(component: &'static str) -> Self {
        Self {
            component,
            status: HealthStatus::Healthy,
            detail: None,
        }
    }

    pub fn with(component: &'static str, status: HealthStatus, detail: impl Into<String>) -> Self {
        Self {
            component,
            status,
            detail: Some(detail.into()),
        }
    }
}
