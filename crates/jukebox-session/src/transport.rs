//! Voice transport abstraction.
//!
//! A transport connects to voice channels; a connection plays one stream at
//! a time and reports the end of every stream through a `StreamCompletion`.

use std::sync::Arc;

use async_trait::async_trait;
use jukebox_types::ChannelRef;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{PlaybackError, TransportError};

/// Identifier assigned to each stream start within a session.
pub type StreamId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    pub start_offset_secs: f64,
    pub volume: u8,
}

/// Completion posted back into the session event loop.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub stream_id: StreamId,
    pub error: Option<PlaybackError>,
}

/// One-shot completion handle for a single stream start.
///
/// Consuming it with `complete` reports the outcome. Dropping it unreported
/// counts as a natural end, so every stream yields exactly one event.
#[derive(Debug)]
pub struct StreamCompletion {
    stream_id: StreamId,
    sender: Option<UnboundedSender<StreamEvent>>,
}

impl StreamCompletion {
    pub fn new(stream_id: StreamId, sender: UnboundedSender<StreamEvent>) -> Self {
        Self {
            stream_id,
            sender: Some(sender),
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Report the end of the stream. Never blocks.
    pub fn complete(mut self, error: Option<PlaybackError>) {
        self.send(error);
    }

    fn send(&mut self, error: Option<PlaybackError>) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(StreamEvent {
                stream_id: self.stream_id,
                error,
            });
        }
    }
}

impl Drop for StreamCompletion {
    fn drop(&mut self) {
        self.send(None);
    }
}

#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Open a connection to a voice channel.
    async fn connect(&self, channel: &ChannelRef)
    -> Result<Arc<dyn VoiceConnection>, TransportError>;

    /// Number of non-bot occupants in the channel.
    async fn human_members(&self, channel: &ChannelRef) -> usize;
}

#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn channel(&self) -> ChannelRef;

    async fn move_to(&self, channel: &ChannelRef) -> Result<(), TransportError>;

    /// Start a stream. On success the connection owns `completion` and must
    /// report through it once the stream ends, errors, or is stopped.
    async fn play(
        &self,
        uri: &str,
        options: PlayOptions,
        completion: StreamCompletion,
    ) -> Result<(), TransportError>;

    /// Stop the current stream. Idempotent.
    async fn stop(&self);

    fn pause(&self);

    fn resume(&self);

    fn is_playing(&self) -> bool;

    fn is_paused(&self) -> bool;

    fn is_connected(&self) -> bool;

    async fn disconnect(&self);
}
