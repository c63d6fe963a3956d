//! In-process event bus for session notifications.
//!
//! Front ends subscribe to render "now playing", queue and leave updates.

use jukebox_types::{LeaveReason, SessionEvent, TrackDescriptor};
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a new event bus with a bounded broadcast channel.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// A stream started or restarted for `track`.
    pub fn now_playing(&self, guild_id: u64, track: &TrackDescriptor, position_secs: f64) {
        let _ = self.sender.send(SessionEvent::NowPlaying {
            guild_id,
            title: track.title.clone(),
            position_secs,
            duration_secs: track.duration_secs,
            requester: track.requester,
            thumbnail_uri: track.thumbnail_uri.clone(),
        });
    }

    pub fn queue_changed(&self, guild_id: u64, queue_len: usize) {
        let _ = self
            .sender
            .send(SessionEvent::QueueChanged { guild_id, queue_len });
    }

    /// The session disconnected; `text_channel` is the last place a command
    /// came from.
    pub fn left_channel(
        &self,
        guild_id: u64,
        channel: String,
        reason: LeaveReason,
        text_channel: Option<String>,
    ) {
        let _ = self.sender.send(SessionEvent::LeftChannel {
            guild_id,
            channel,
            reason,
            text_channel,
        });
    }
}
