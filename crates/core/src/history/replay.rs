//! Cancellable single-timer task driving replay autoplay

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

pub const MIN_PLAYBACK_SPEED: f64 = 0.1;
pub const MAX_PLAYBACK_SPEED: f64 = 10.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayOptions {
    pub auto_play: bool,
    /// Moves per second, clamped to [0.1, 10]
    pub playback_speed: f64,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            auto_play: true,
            playback_speed: 1.0,
        }
    }
}

impl ReplayOptions {
    pub fn clamped_speed(&self) -> f64 {
        if self.playback_speed.is_nan() {
            return 1.0;
        }
        self.playback_speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED)
    }

    /// Delay between two replay steps
    pub fn interval(&self) -> Duration {
        Duration::from_millis((1000.0 / self.clamped_speed()).round() as u64)
    }
}

/// At most one pending periodic timer. Arming replaces the previous one.
#[derive(Debug, Default)]
pub struct ScheduledTask {
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends a tick on `ticks` every `period`, first one after a full period.
    ///
    /// Returns false when called outside a tokio runtime.
    pub fn arm(&mut self, period: Duration, ticks: mpsc::UnboundedSender<()>) -> bool {
        self.disarm();
        let Ok(runtime) = Handle::try_current() else {
            warn!("no async runtime, replay timer not armed");
            return false;
        };
        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if ticks.send(()).is_err() {
                    break;
                }
            }
        });
        debug!(period_ms = period.as_millis() as u64, "replay timer armed");
        self.handle = Some(handle);
        true
    }

    pub fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("replay timer disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.disarm();
    }
}
