//! The move history state machine

use shakmaty::Color;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::replay::{ReplayOptions, ScheduledTask};
use super::types::*;
use crate::error::{Error, Result};
use crate::rules::ChessMove;

/// Append-only log with a movable cursor.
///
/// `current_index` is -1 at the start position and otherwise points at the
/// last applied entry.
#[derive(Debug)]
pub struct MoveHistoryManager {
    entries: Vec<MoveHistoryEntry>,
    current_index: isize,
    options: HistoryOptions,
    replay_timer: ScheduledTask,
    replay_ticks: Option<mpsc::UnboundedReceiver<()>>,
    replaying: bool,
}

impl Default for MoveHistoryManager {
    fn default() -> Self {
        Self::new(HistoryOptions::default())
    }
}

impl MoveHistoryManager {
    pub fn new(options: HistoryOptions) -> Self {
        Self {
            entries: Vec::new(),
            current_index: -1,
            options,
            replay_timer: ScheduledTask::new(),
            replay_ticks: None,
            replaying: false,
        }
    }

    fn last_index(&self) -> isize {
        self.entries.len() as isize - 1
    }

    /// Appends a move at the cursor, discarding any entries after it first.
    pub fn add_move(
        &mut self,
        mv: ChessMove,
        fen_before: impl Into<String>,
        analysis: Option<MoveAnalysis>,
        time_spent_ms: Option<u64>,
        comments: Vec<String>,
    ) {
        if self.current_index < self.last_index() {
            let keep = (self.current_index + 1) as usize;
            debug!(dropped = self.entries.len() - keep, "truncating redo branch");
            self.entries.truncate(keep);
        }

        self.entries.push(MoveHistoryEntry {
            mv,
            fen_before: fen_before.into(),
            analysis,
            time_spent_ms,
            comments,
        });
        self.current_index = self.last_index();

        let cap = self.options.max_entries;
        if cap > 0 && self.entries.len() > cap {
            let overflow = self.entries.len() - cap;
            self.entries.drain(..overflow);
            self.current_index -= overflow as isize;
        }
    }

    /// Removes the last entry. The cursor stays in range.
    pub fn undo(&mut self) -> Option<MoveHistoryEntry> {
        let removed = self.entries.pop()?;
        self.current_index = self.current_index.min(self.last_index());
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.stop_replay();
        self.entries.clear();
        self.current_index = -1;
    }

    /// Replaces the log with `entries`, cursor at the end.
    pub fn load_moves(&mut self, entries: Vec<MoveHistoryEntry>) {
        self.stop_replay();
        self.entries = entries;
        let cap = self.options.max_entries;
        if cap > 0 && self.entries.len() > cap {
            let overflow = self.entries.len() - cap;
            self.entries.drain(..overflow);
        }
        self.current_index = self.last_index();
    }

    pub fn get_history(&self) -> &[MoveHistoryEntry] {
        &self.entries
    }

    pub fn get_total_moves(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_index(&self) -> isize {
        self.current_index
    }

    pub fn options(&self) -> &HistoryOptions {
        &self.options
    }

    pub fn get_move_at(&self, index: usize) -> Option<&MoveHistoryEntry> {
        self.entries.get(index)
    }

    pub fn current_entry(&self) -> Option<&MoveHistoryEntry> {
        usize::try_from(self.current_index)
            .ok()
            .and_then(|i| self.entries.get(i))
    }

    pub fn is_at_start(&self) -> bool {
        self.current_index == -1
    }

    pub fn is_at_end(&self) -> bool {
        self.current_index == self.last_index()
    }

    /// Position shown at the cursor, if any move was ever logged
    pub fn fen_at_cursor(&self) -> Option<&str> {
        match self.current_entry() {
            Some(entry) => Some(entry.mv.fen_after.as_str()),
            None => self.entries.first().map(|e| e.fen_before.as_str()),
        }
    }

    /// Moves from the first entry up to and including the cursor
    pub fn moves_to_cursor(&self) -> Vec<ChessMove> {
        let end = (self.current_index + 1) as usize;
        self.entries[..end].iter().map(|e| e.mv.clone()).collect()
    }

    pub fn moves_for_color(&self, color: Color) -> Vec<&MoveHistoryEntry> {
        self.entries.iter().filter(|e| e.mv.color == color).collect()
    }

    pub fn go_to_start(&mut self) {
        self.current_index = -1;
    }

    pub fn go_to_end(&mut self) {
        self.current_index = self.last_index();
    }

    /// Moves the cursor to `index`; out of range leaves it where it was.
    pub fn go_to_move(&mut self, index: isize) -> bool {
        if index < -1 || index > self.last_index() {
            return false;
        }
        self.current_index = index;
        true
    }

    pub fn go_forward(&mut self) -> bool {
        self.go_to_move(self.current_index + 1)
    }

    pub fn go_backward(&mut self) -> bool {
        if self.current_index <= -1 {
            return false;
        }
        self.go_to_move(self.current_index - 1)
    }

    pub fn add_comment(&mut self, index: usize, comment: impl Into<String>) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.comments.push(comment.into());
                true
            }
            None => false,
        }
    }

    pub fn set_analysis(&mut self, index: usize, analysis: MoveAnalysis) -> bool {
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.analysis = Some(analysis);
                true
            }
            None => false,
        }
    }

    pub fn statistics(&self) -> HistoryStatistics {
        let mut stats = HistoryStatistics {
            total_moves: self.entries.len(),
            ..HistoryStatistics::default()
        };
        let mut timed = 0u64;
        let mut total_time = 0u64;

        for entry in &self.entries {
            let mv = &entry.mv;
            match mv.color {
                Color::White => stats.white_moves += 1,
                Color::Black => stats.black_moves += 1,
            }
            if mv.is_capture() {
                stats.captures += 1;
            }
            if mv.is_check || mv.is_checkmate {
                stats.checks += 1;
            }
            if mv.is_castle() {
                stats.castles += 1;
            }
            if mv.promotion.is_some() {
                stats.promotions += 1;
            }
            if let Some(analysis) = &entry.analysis {
                stats.blunders += analysis.is_blunder as usize;
                stats.mistakes += analysis.is_mistake as usize;
                stats.inaccuracies += analysis.is_inaccuracy as usize;
                stats.brilliant += analysis.is_brilliant as usize;
            }
            if let Some(ms) = entry.time_spent_ms {
                timed += 1;
                total_time += ms;
            }
        }

        if timed > 0 {
            stats.average_time_ms = Some(total_time as f64 / timed as f64);
        }
        stats
    }

    pub fn to_snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            history: self.entries.clone(),
            current_index: self.current_index,
            options: self.options.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_snapshot())?)
    }

    /// Restores from `to_json` output. Malformed input leaves the log untouched.
    pub fn restore_from_json(&mut self, json: &str) -> Result<()> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.get("history").is_some_and(|h| h.is_array()) {
            return Err(Error::Serialization("history must be an array".into()));
        }
        let snapshot: HistorySnapshot = serde_json::from_value(value)?;
        self.restore(snapshot)
    }

    pub fn restore(&mut self, snapshot: HistorySnapshot) -> Result<()> {
        let last = snapshot.history.len() as isize - 1;
        if snapshot.current_index < -1 || snapshot.current_index > last {
            return Err(Error::Serialization(format!(
                "current index {} out of range for {} entries",
                snapshot.current_index,
                snapshot.history.len()
            )));
        }
        self.stop_replay();
        self.entries = snapshot.history;
        self.current_index = snapshot.current_index;
        self.options = snapshot.options;
        Ok(())
    }

    /// Rewinds to the start and, with `auto_play`, arms the step timer.
    pub fn start_replay(&mut self, options: ReplayOptions) {
        self.stop_replay();
        self.current_index = -1;
        self.replaying = true;

        if options.auto_play {
            let (tx, rx) = mpsc::unbounded_channel();
            if self.replay_timer.arm(options.interval(), tx) {
                self.replay_ticks = Some(rx);
            }
        }
        info!(
            total = self.entries.len(),
            speed = options.clamped_speed(),
            auto_play = options.auto_play,
            "replay started"
        );
    }

    pub fn stop_replay(&mut self) {
        self.replay_timer.disarm();
        self.replay_ticks = None;
        if self.replaying {
            debug!(index = self.current_index, "replay stopped");
        }
        self.replaying = false;
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    /// Advances the replay by one move now. Stops and returns None past the end.
    pub fn replay_step(&mut self) -> Option<isize> {
        if !self.replaying {
            return None;
        }
        if self.go_forward() {
            Some(self.current_index)
        } else {
            self.stop_replay();
            None
        }
    }

    /// Waits for the next autoplay tick and applies it.
    ///
    /// Returns None immediately when no autoplay is armed.
    pub async fn next_replay_step(&mut self) -> Option<isize> {
        let ticks = self.replay_ticks.as_mut()?;
        ticks.recv().await?;
        self.replay_step()
    }
}
