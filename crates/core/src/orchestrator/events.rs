//! Typed event stream with per-kind listeners and a bounded replay buffer

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::IntegrationError;
use super::metrics::PhaseTimings;
use crate::endgame::EndgameAnalysis;
use crate::rules::{ChessMove, EndReason, GameResult, GameStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    #[serde(rename = "game:initialized")]
    GameInitialized,
    #[serde(rename = "move:attempted")]
    MoveAttempted,
    #[serde(rename = "move:completed")]
    MoveCompleted,
    #[serde(rename = "move:failed")]
    MoveFailed,
    #[serde(rename = "game:state_changed")]
    GameStateChanged,
    #[serde(rename = "game:ended")]
    GameEnded,
    #[serde(rename = "history:updated")]
    HistoryUpdated,
    #[serde(rename = "notation:generated")]
    NotationGenerated,
    #[serde(rename = "endgame:detected")]
    EndgameDetected,
    #[serde(rename = "state:saved")]
    StateSaved,
    #[serde(rename = "state:loaded")]
    StateLoaded,
    #[serde(rename = "error:occurred")]
    ErrorOccurred,
    #[serde(rename = "performance:measured")]
    PerformanceMeasured,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::GameInitialized => "game:initialized",
            EventKind::MoveAttempted => "move:attempted",
            EventKind::MoveCompleted => "move:completed",
            EventKind::MoveFailed => "move:failed",
            EventKind::GameStateChanged => "game:state_changed",
            EventKind::GameEnded => "game:ended",
            EventKind::HistoryUpdated => "history:updated",
            EventKind::NotationGenerated => "notation:generated",
            EventKind::EndgameDetected => "endgame:detected",
            EventKind::StateSaved => "state:saved",
            EventKind::StateLoaded => "state:loaded",
            EventKind::ErrorOccurred => "error:occurred",
            EventKind::PerformanceMeasured => "performance:measured",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    GameInitialized {
        fen: String,
    },
    MoveAttempted {
        from: String,
        to: String,
        promotion: Option<String>,
    },
    MoveCompleted {
        #[serde(rename = "move")]
        mv: ChessMove,
        notation: String,
        timings: PhaseTimings,
    },
    MoveFailed {
        from: String,
        to: String,
        reason: String,
    },
    GameStateChanged {
        fen: String,
        status: GameStatus,
        move_count: usize,
    },
    GameEnded {
        result: GameResult,
        reason: Option<EndReason>,
    },
    HistoryUpdated {
        total_moves: usize,
        current_index: isize,
    },
    NotationGenerated {
        san: String,
        lan: String,
    },
    EndgameDetected {
        analysis: EndgameAnalysis,
    },
    StateSaved {
        slot: String,
    },
    StateLoaded {
        slot: String,
    },
    ErrorOccurred {
        error: IntegrationError,
    },
    PerformanceMeasured {
        operation: String,
        duration_ms: f64,
    },
}

impl OrchestratorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            OrchestratorEvent::GameInitialized { .. } => EventKind::GameInitialized,
            OrchestratorEvent::MoveAttempted { .. } => EventKind::MoveAttempted,
            OrchestratorEvent::MoveCompleted { .. } => EventKind::MoveCompleted,
            OrchestratorEvent::MoveFailed { .. } => EventKind::MoveFailed,
            OrchestratorEvent::GameStateChanged { .. } => EventKind::GameStateChanged,
            OrchestratorEvent::GameEnded { .. } => EventKind::GameEnded,
            OrchestratorEvent::HistoryUpdated { .. } => EventKind::HistoryUpdated,
            OrchestratorEvent::NotationGenerated { .. } => EventKind::NotationGenerated,
            OrchestratorEvent::EndgameDetected { .. } => EventKind::EndgameDetected,
            OrchestratorEvent::StateSaved { .. } => EventKind::StateSaved,
            OrchestratorEvent::StateLoaded { .. } => EventKind::StateLoaded,
            OrchestratorEvent::ErrorOccurred { .. } => EventKind::ErrorOccurred,
            OrchestratorEvent::PerformanceMeasured { .. } => EventKind::PerformanceMeasured,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordedEvent {
    pub event: OrchestratorEvent,
    pub timestamp: DateTime<Utc>,
}

pub type Listener = Box<dyn Fn(&OrchestratorEvent) + Send + Sync>;

/// Opaque subscription handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

pub struct EventBus {
    listeners: HashMap<EventKind, Vec<(ListenerHandle, Listener)>>,
    history: VecDeque<RecordedEvent>,
    capacity: usize,
    next_handle: u64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            listeners: HashMap::new(),
            history: VecDeque::with_capacity(capacity),
            capacity,
            next_handle: 1,
        }
    }

    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) -> ListenerHandle {
        let handle = ListenerHandle(self.next_handle);
        self.next_handle += 1;
        self.listeners.entry(kind).or_default().push((handle, listener));
        handle
    }

    /// Subscribes and first replays up to `replay` buffered events of `kind`, oldest first.
    pub fn subscribe_with_replay(&mut self, kind: EventKind, listener: Listener, replay: usize) -> ListenerHandle {
        let matching: Vec<&RecordedEvent> = self.history.iter().filter(|r| r.event.kind() == kind).collect();
        let skip = matching.len().saturating_sub(replay);
        for recorded in &matching[skip..] {
            listener(&recorded.event);
        }
        self.subscribe(kind, listener)
    }

    pub fn unsubscribe(&mut self, handle: ListenerHandle) -> bool {
        for listeners in self.listeners.values_mut() {
            if let Some(pos) = listeners.iter().position(|(h, _)| *h == handle) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Records `event` and calls its listeners. Returns how many listeners panicked.
    pub fn emit(&mut self, event: OrchestratorEvent) -> usize {
        let mut failures = 0;
        if let Some(listeners) = self.listeners.get(&event.kind()) {
            for (_, listener) in listeners {
                if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                    failures += 1;
                }
            }
        }

        if self.capacity > 0 {
            if self.history.len() == self.capacity {
                self.history.pop_front();
            }
            self.history.push_back(RecordedEvent {
                event,
                timestamp: Utc::now(),
            });
        }
        failures
    }

    /// Buffered events, optionally only of `kind`
    pub fn history(&self, kind: Option<EventKind>) -> Vec<RecordedEvent> {
        self.history
            .iter()
            .filter(|r| kind.map_or(true, |k| r.event.kind() == k))
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
        self.history.clear();
    }
}
