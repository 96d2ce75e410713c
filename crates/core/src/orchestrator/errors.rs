//! Integration error taxonomy and recovery strategies

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::engine::EngineError;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationErrorKind {
    ComponentInitialization,
    StateSynchronization,
    EventPropagation,
    ApiValidation,
    PerformanceViolation,
    RecoveryFailure,
    Unknown,
}

impl IntegrationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationErrorKind::ComponentInitialization => "component_initialization",
            IntegrationErrorKind::StateSynchronization => "state_synchronization",
            IntegrationErrorKind::EventPropagation => "event_propagation",
            IntegrationErrorKind::ApiValidation => "api_validation",
            IntegrationErrorKind::PerformanceViolation => "performance_violation",
            IntegrationErrorKind::RecoveryFailure => "recovery_failure",
            IntegrationErrorKind::Unknown => "unknown",
        }
    }

    /// Default strategy for this kind. None means no automatic recovery.
    pub fn recovery_strategy(&self) -> Option<RecoveryStrategy> {
        match self {
            IntegrationErrorKind::ComponentInitialization => Some(RecoveryStrategy::new(3, 1_000)),
            IntegrationErrorKind::StateSynchronization => Some(RecoveryStrategy::new(2, 100)),
            IntegrationErrorKind::EventPropagation => Some(RecoveryStrategy::new(1, 0)),
            IntegrationErrorKind::PerformanceViolation => Some(RecoveryStrategy::new(1, 0)),
            IntegrationErrorKind::ApiValidation
            | IntegrationErrorKind::RecoveryFailure
            | IntegrationErrorKind::Unknown => None,
        }
    }
}

impl fmt::Display for IntegrationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error tagged at the orchestrator boundary
#[derive(Error, Debug, Clone, Serialize)]
#[error("[{kind}] {component}.{operation}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct IntegrationError {
    pub kind: IntegrationErrorKind,
    pub component: String,
    pub operation: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub recoverable: bool,
    pub retry_attempts: u32,
}

impl IntegrationError {
    pub fn new(
        kind: IntegrationErrorKind,
        component: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            component: component.into(),
            operation: operation.into(),
            message: message.into(),
            timestamp: Utc::now(),
            recoverable: kind.recovery_strategy().is_some(),
            retry_attempts: 0,
        }
    }

    /// Tags a crate error raised while running `operation`
    pub fn from_error(error: &Error, component: &str, operation: &str) -> Self {
        Self::new(classify(error), component, operation, error.to_string())
    }
}

/// Maps a crate error onto the integration taxonomy
pub fn classify(error: &Error) -> IntegrationErrorKind {
    match error {
        Error::NotInitialized | Error::Destroyed | Error::EngineUnavailable => {
            IntegrationErrorKind::ComponentInitialization
        }
        Error::Engine(EngineError::Spawn(_) | EngineError::NotReady | EngineError::Crashed(_)) => {
            IntegrationErrorKind::ComponentInitialization
        }
        Error::Sync(_) => IntegrationErrorKind::StateSynchronization,
        Error::InvalidFen(_)
        | Error::InvalidSquare(_)
        | Error::InvalidRequest(_)
        | Error::Pgn(_)
        | Error::Move(_) => IntegrationErrorKind::ApiValidation,
        Error::Recovery(_) => IntegrationErrorKind::RecoveryFailure,
        _ => IntegrationErrorKind::Unknown,
    }
}

/// Retry budget with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecoveryStrategy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RecoveryStrategy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
        }
    }

    /// Delay before `attempt` (0-based): base, 2x base, 4x base, ...
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}
