//! Playback position accounting.
//!
//! Position is an accumulated offset plus the time since the transport last
//! started emitting audio.

use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    position_secs: f64,
    epoch: Option<Instant>,
}

impl PlaybackClock {
    /// Begin counting from `offset_secs` at `now`.
    pub fn start(&mut self, offset_secs: f64, now: Instant) {
        self.position_secs = offset_secs.max(0.0);
        self.epoch = Some(now);
    }

    /// Current elapsed position.
    pub fn elapsed(&self, now: Instant) -> f64 {
        let running = self
            .epoch
            .map(|epoch| now.saturating_duration_since(epoch).as_secs_f64())
            .unwrap_or(0.0);
        self.position_secs + running
    }

    /// Fold the running time into the stored position and stop counting.
    pub fn freeze(&mut self, now: Instant) {
        self.position_secs = self.elapsed(now);
        self.epoch = None;
    }

    /// Continue counting from the frozen position.
    pub fn resume(&mut self, now: Instant) {
        if self.epoch.is_none() {
            self.epoch = Some(now);
        }
    }

    pub fn reset(&mut self) {
        self.position_secs = 0.0;
        self.epoch = None;
    }

    pub fn is_running(&self) -> bool {
        self.epoch.is_some()
    }
}
