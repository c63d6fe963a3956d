//! Playback session state machine.
//!
//! One session per guild. It owns the queue, history, current track and
//! playback clock, and drives a `VoiceConnection` through start, seek,
//! pause/resume, recovery and leave. State lives behind a `std::sync::Mutex`
//! that is never held across an await; operations that wait (connect,
//! resolve, transport start/stop, settle and recovery delays) are serialised
//! by an async operation gate instead. Stream completions arrive as
//! `StreamEvent`s and go through the same gate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use jukebox_types::{ChannelRef, LeaveReason, RequesterId, SessionSnapshot, TrackDescriptor};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::clock::PlaybackClock;
use crate::config::SessionSettings;
use crate::error::SessionError;
use crate::events::EventBus;
use crate::idle::IdleNotifier;
use crate::queue::PlaybackQueue;
use crate::resolver::MediaResolver;
use crate::transport::{
    PlayOptions, StreamCompletion, StreamEvent, StreamId, VoiceConnection, VoiceTransport,
};

/// Collaborators shared by every session of a registry.
#[derive(Clone)]
pub struct SessionDeps {
    pub transport: Arc<dyn VoiceTransport>,
    pub resolver: Arc<dyn MediaResolver>,
    pub events: EventBus,
    pub idle: IdleNotifier,
    pub settings: SessionSettings,
}

/// A user's request to play something.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub query: String,
    pub requester: RequesterId,
    /// Voice channel the requester is in, if any.
    pub voice_channel: Option<ChannelRef>,
    /// Where the request was typed; leave notifications go here.
    pub text_channel: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    Started(TrackDescriptor),
    Queued {
        track: TrackDescriptor,
        position: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipOutcome {
    /// The queue head is now playing.
    Started(TrackDescriptor),
    /// The queue was empty; playback stopped.
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeekOutcome {
    Moved { position_secs: f64 },
    /// The target was past the end of the track.
    Skipped(SkipOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Joined(ChannelRef),
    Moved(ChannelRef),
    AlreadyThere(ChannelRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartKind {
    /// A new track replaces `current`, which moves to history.
    Fresh,
    /// Seek or recovery restart of `current`.
    Restart,
}

struct SessionState {
    queue: PlaybackQueue,
    current: Option<TrackDescriptor>,
    is_playing: bool,
    clock: PlaybackClock,
    is_seeking: bool,
    volume: u8,
    connection: Option<Arc<dyn VoiceConnection>>,
    /// Stream whose completion still matters.
    active_stream: Option<StreamId>,
    /// A restart of `current` is scheduled after a recoverable failure.
    recovering: bool,
    last_text_channel: Option<String>,
}

impl SessionState {
    fn live_connection(&self) -> Option<Arc<dyn VoiceConnection>> {
        self.connection
            .as_ref()
            .filter(|conn| conn.is_connected())
            .cloned()
    }

    /// Move `current` to history and go idle.
    fn finish_current(&mut self) -> Option<TrackDescriptor> {
        let finished = self.current.take();
        if let Some(track) = finished.clone() {
            self.queue.push_history(track);
        }
        self.is_playing = false;
        self.clock.reset();
        self.active_stream = None;
        self.recovering = false;
        finished
    }

    fn clear_playback(&mut self) {
        self.current = None;
        self.is_playing = false;
        self.clock.reset();
        self.active_stream = None;
        self.recovering = false;
    }

    /// Paused by the user while the transport has no stream to pause.
    fn paused_in_recovery(&self) -> bool {
        self.recovering && !self.is_playing && self.current.is_some()
    }
}

pub struct PlaybackSession {
    id: String,
    guild_id: u64,
    deps: SessionDeps,
    state: Mutex<SessionState>,
    op_gate: tokio::sync::Mutex<()>,
    stream_tx: mpsc::UnboundedSender<StreamEvent>,
    next_stream_id: AtomicU64,
}

impl PlaybackSession {
    /// Create a session and start its completion loop.
    pub fn spawn(guild_id: u64, deps: SessionDeps) -> Arc<Self> {
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let state = SessionState {
            queue: PlaybackQueue::new(deps.settings.history_limit),
            current: None,
            is_playing: false,
            clock: PlaybackClock::default(),
            is_seeking: false,
            volume: deps.settings.default_volume.min(100),
            connection: None,
            active_stream: None,
            recovering: false,
            last_text_channel: None,
        };
        let session = Arc::new(Self {
            id: format!("sess:{}", uuid::Uuid::new_v4()),
            guild_id,
            deps,
            state: Mutex::new(state),
            op_gate: tokio::sync::Mutex::new(()),
            stream_tx,
            next_stream_id: AtomicU64::new(0),
        });
        tokio::spawn(run_stream_events(Arc::downgrade(&session), stream_rx));
        tracing::info!(session_id = %session.id, guild_id, "session created");
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn guild_id(&self) -> u64 {
        self.guild_id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.deps.settings
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Resolve a query, then start it or queue it behind the current track.
    pub async fn play(&self, request: PlayRequest) -> Result<PlayOutcome, SessionError> {
        let channel = request.voice_channel.ok_or(SessionError::NoVoiceChannel)?;
        if request.text_channel.is_some() {
            self.lock_state().last_text_channel = request.text_channel.clone();
        }
        let track = self
            .deps
            .resolver
            .resolve(&request.query)
            .await
            .map_err(SessionError::from)?
            .into_descriptor(request.requester);

        let _gate = self.op_gate.lock().await;
        let busy = {
            let state = self.lock_state();
            let paused = state
                .connection
                .as_ref()
                .is_some_and(|conn| conn.is_paused());
            state.is_playing || paused || state.recovering
        };
        if busy {
            let position = self.lock_state().queue.enqueue(track.clone());
            tracing::info!(
                session_id = %self.id,
                title = %track.title,
                position,
                "track queued"
            );
            self.deps.events.queue_changed(self.guild_id, position);
            return Ok(PlayOutcome::Queued { track, position });
        }
        self.start_locked(track.clone(), Some(&channel), 0.0, StartKind::Fresh)
            .await?;
        Ok(PlayOutcome::Started(track))
    }

    /// Append to the queue without touching the transport.
    pub fn enqueue(&self, track: TrackDescriptor) -> usize {
        let position = self.lock_state().queue.enqueue(track);
        self.deps.events.queue_changed(self.guild_id, position);
        position
    }

    /// Start `track` on `channel` at an offset, replacing `current`.
    pub async fn start_track(
        &self,
        track: TrackDescriptor,
        channel: &ChannelRef,
        start_offset_secs: f64,
    ) -> Result<(), SessionError> {
        let _gate = self.op_gate.lock().await;
        self.start_locked(track, Some(channel), start_offset_secs, StartKind::Fresh)
            .await
    }

    /// Caller must hold the operation gate.
    async fn start_locked(
        &self,
        track: TrackDescriptor,
        channel: Option<&ChannelRef>,
        start_offset_secs: f64,
        kind: StartKind,
    ) -> Result<(), SessionError> {
        let connection = match channel {
            Some(channel) => self.ensure_connection(channel).await?,
            None => {
                let existing = self.lock_state().live_connection();
                existing.ok_or(SessionError::NotConnected)?
            }
        };
        if track.stream_reference.trim().is_empty() {
            return Err(SessionError::CorruptTrack);
        }
        let uri = self
            .deps
            .resolver
            .stream_uri(&track.stream_reference)
            .await
            .map_err(|err| {
                tracing::warn!(
                    session_id = %self.id,
                    title = %track.title,
                    error = %err,
                    "stream uri unavailable"
                );
                SessionError::StreamUnavailable(track.title.clone())
            })?;

        self.launch(&connection, &uri, start_offset_secs).await?;

        {
            let mut state = self.lock_state();
            if kind == StartKind::Fresh {
                if let Some(previous) = state.current.take() {
                    state.queue.push_history(previous);
                }
            }
            state.current = Some(track.clone());
            state.is_playing = true;
            state.clock.start(start_offset_secs, Instant::now());
        }
        tracing::info!(
            session_id = %self.id,
            title = %track.title,
            offset_secs = start_offset_secs,
            restart = kind == StartKind::Restart,
            "stream started"
        );
        self.deps
            .events
            .now_playing(self.guild_id, &track, start_offset_secs);
        Ok(())
    }

    async fn ensure_connection(
        &self,
        channel: &ChannelRef,
    ) -> Result<Arc<dyn VoiceConnection>, SessionError> {
        let existing = self.lock_state().live_connection();
        if let Some(connection) = existing {
            if connection.channel().channel_id != channel.channel_id {
                connection
                    .move_to(channel)
                    .await
                    .map_err(|err| SessionError::Connect(err.to_string()))?;
                tracing::info!(session_id = %self.id, channel = %channel.name, "moved voice channel");
            }
            return Ok(connection);
        }
        let connection = self.deps.transport.connect(channel).await.map_err(|err| {
            tracing::warn!(session_id = %self.id, channel = %channel.name, error = %err, "voice connect failed");
            SessionError::Connect(err.to_string())
        })?;
        tracing::info!(session_id = %self.id, channel = %channel.name, "voice connected");
        self.lock_state().connection = Some(connection.clone());
        Ok(connection)
    }

    /// Stop whatever is playing and start `uri` under a new stream id.
    async fn launch(
        &self,
        connection: &Arc<dyn VoiceConnection>,
        uri: &str,
        start_offset_secs: f64,
    ) -> Result<(), SessionError> {
        let stream_id = self.next_stream_id.fetch_add(1, Ordering::Relaxed) + 1;
        let volume = {
            let mut state = self.lock_state();
            state.active_stream = Some(stream_id);
            state.recovering = false;
            state.volume
        };
        connection.stop().await;

        let completion = StreamCompletion::new(stream_id, self.stream_tx.clone());
        let options = PlayOptions {
            start_offset_secs,
            volume,
        };
        if let Err(err) = connection.play(uri, options, completion).await {
            tracing::warn!(session_id = %self.id, stream_id, error = %err, "stream start failed");
            let mut state = self.lock_state();
            if state.active_stream == Some(stream_id) {
                state.active_stream = None;
            }
            state.is_playing = false;
            state.clock.freeze(Instant::now());
            return Err(SessionError::StartFailed(err.to_string()));
        }
        Ok(())
    }

    /// Handle the end of a stream. Stale completions are ignored.
    async fn on_stream_finished(self: &Arc<Self>, event: StreamEvent) {
        let _gate = self.op_gate.lock().await;
        let next = {
            let mut state = self.lock_state();
            if state.active_stream != Some(event.stream_id) {
                tracing::debug!(
                    session_id = %self.id,
                    stream_id = event.stream_id,
                    "ignoring stale completion"
                );
                return;
            }
            // Seek clears `active_stream` before stopping, so its own stop
            // is filtered above.
            let recoverable = event
                .error
                .as_ref()
                .is_some_and(|err| err.is_recoverable());
            if recoverable && state.current.is_some() && state.live_connection().is_some() {
                state.clock.freeze(Instant::now());
                state.recovering = true;
                Completion::Recover
            } else {
                let finished = state.finish_current();
                Completion::Finished {
                    title: finished.map(|track| track.title),
                    queue_len: state.queue.len(),
                }
            }
        };

        match next {
            Completion::Recover => {
                tracing::warn!(
                    session_id = %self.id,
                    stream_id = event.stream_id,
                    error = ?event.error,
                    "recoverable playback error; scheduling restart"
                );
                let session = Arc::clone(self);
                let failed_stream = event.stream_id;
                tokio::spawn(async move { session.recover(failed_stream).await });
            }
            Completion::Finished { title, queue_len } => {
                match &event.error {
                    Some(err) => tracing::warn!(
                        session_id = %self.id,
                        title = ?title,
                        error = %err,
                        "track ended with error"
                    ),
                    None => tracing::info!(session_id = %self.id, title = ?title, "track ended"),
                }
                self.deps.events.queue_changed(self.guild_id, queue_len);
                self.deps.idle.request(self.guild_id);
                if self.deps.settings.auto_advance && queue_len > 0 {
                    let session = Arc::clone(self);
                    tokio::spawn(async move {
                        if let Err(err) = session.skip().await {
                            tracing::warn!(session_id = %session.id, error = %err, "auto-advance failed");
                        }
                    });
                }
            }
        }
    }

    /// One restart attempt after a recoverable failure of `failed_stream`.
    async fn recover(&self, failed_stream: StreamId) {
        tokio::time::sleep(self.deps.settings.recovery_delay).await;
        let _gate = self.op_gate.lock().await;

        let (track, connection, position, paused) = {
            let mut state = self.lock_state();
            if state.active_stream != Some(failed_stream) {
                tracing::debug!(session_id = %self.id, "recovery superseded");
                return;
            }
            let paused = state.paused_in_recovery();
            state.recovering = false;
            let connection = state.live_connection();
            match (state.current.clone(), connection) {
                (Some(track), Some(connection)) => {
                    let position = state.clock.elapsed(Instant::now());
                    (track, connection, position, paused)
                }
                _ => {
                    tracing::info!(session_id = %self.id, "recovery abandoned");
                    state.clear_playback();
                    return;
                }
            }
        };

        tracing::info!(
            session_id = %self.id,
            title = %track.title,
            position_secs = position,
            "recovering stream"
        );
        match self.restart(&track, &connection, position).await {
            Ok(()) if paused => {
                {
                    let mut state = self.lock_state();
                    state.is_playing = false;
                    state.clock.freeze(Instant::now());
                }
                connection.pause();
                tracing::info!(
                    session_id = %self.id,
                    title = %track.title,
                    "stream recovered; kept paused"
                );
            }
            Ok(()) => {
                tracing::info!(session_id = %self.id, title = %track.title, "stream recovered");
            }
            Err(err) => {
                tracing::warn!(session_id = %self.id, error = %err, "stream recovery failed");
                self.lock_state().clear_playback();
            }
        }
    }

    /// Restart `current` at `position_secs` with a freshly resolved URI.
    async fn restart(
        &self,
        track: &TrackDescriptor,
        connection: &Arc<dyn VoiceConnection>,
        position_secs: f64,
    ) -> Result<(), SessionError> {
        if track.stream_reference.trim().is_empty() {
            return Err(SessionError::CorruptTrack);
        }
        let uri = self
            .deps
            .resolver
            .stream_uri(&track.stream_reference)
            .await
            .map_err(|_| SessionError::StreamUnavailable(track.title.clone()))?;

        let still_current = self
            .lock_state()
            .current
            .as_ref()
            .is_some_and(|current| current.stream_reference == track.stream_reference);
        if !still_current {
            return Err(SessionError::NothingPlaying);
        }

        self.launch(connection, &uri, position_secs).await?;
        {
            let mut state = self.lock_state();
            state.is_playing = true;
            state.clock.start(position_secs, Instant::now());
        }
        self.deps
            .events
            .now_playing(self.guild_id, track, position_secs);
        Ok(())
    }

    /// Move the position by `delta_secs`. Past the end this is a skip.
    pub async fn seek(&self, delta_secs: i64) -> Result<SeekOutcome, SessionError> {
        let _gate = self.op_gate.lock().await;
        let (track, connection, target) = {
            let state = self.lock_state();
            let connection = state.live_connection().ok_or(SessionError::NotConnected)?;
            let track = state.current.clone().ok_or(SessionError::NothingPlaying)?;
            if track.stream_reference.trim().is_empty() {
                return Err(SessionError::CorruptTrack);
            }
            if !state.is_playing {
                return Err(SessionError::Paused);
            }
            let elapsed = state.clock.elapsed(Instant::now());
            let target = (elapsed + delta_secs as f64).max(0.0);
            (track, connection, target)
        };

        if delta_secs > 0 && track.has_duration() && target >= track.duration_secs as f64 {
            tracing::info!(
                session_id = %self.id,
                title = %track.title,
                target_secs = target,
                "seek past end; skipping"
            );
            return self.skip_locked().await.map(SeekOutcome::Skipped);
        }

        let _seeking = SeekingGuard::engage(self);
        {
            let mut state = self.lock_state();
            state.active_stream = None;
            state.is_playing = false;
            state.clock.freeze(Instant::now());
        }
        connection.stop().await;
        tokio::time::sleep(self.deps.settings.seek_settle).await;

        match self.restart(&track, &connection, target).await {
            Ok(()) => {
                tracing::info!(session_id = %self.id, position_secs = target, "seeked");
                Ok(SeekOutcome::Moved {
                    position_secs: target,
                })
            }
            Err(err) => {
                tracing::warn!(session_id = %self.id, error = %err, "seek failed");
                Err(SessionError::SeekFailed(err.to_string()))
            }
        }
    }

    pub async fn forward(&self, secs: u64) -> Result<SeekOutcome, SessionError> {
        self.seek(i64::try_from(secs).unwrap_or(i64::MAX)).await
    }

    pub async fn backward(&self, secs: u64) -> Result<SeekOutcome, SessionError> {
        self.seek(-i64::try_from(secs).unwrap_or(i64::MAX)).await
    }

    /// Start the queue head, or stop if the queue is empty.
    pub async fn skip(&self) -> Result<SkipOutcome, SessionError> {
        let _gate = self.op_gate.lock().await;
        self.skip_locked().await
    }

    async fn skip_locked(&self) -> Result<SkipOutcome, SessionError> {
        let (next, connection, has_current) = {
            let mut state = self.lock_state();
            (
                state.queue.dequeue_next(),
                state.live_connection(),
                state.current.is_some(),
            )
        };
        match next {
            Some(track) => {
                let result = self
                    .start_locked(track.clone(), None, 0.0, StartKind::Fresh)
                    .await;
                let queue_len = {
                    let mut state = self.lock_state();
                    if result.is_err() {
                        state.queue.requeue_front(track.clone());
                    }
                    state.queue.len()
                };
                self.deps.events.queue_changed(self.guild_id, queue_len);
                result.map(|()| SkipOutcome::Started(track))
            }
            None if has_current => {
                {
                    let mut state = self.lock_state();
                    state.active_stream = None;
                    state.finish_current();
                }
                if let Some(connection) = connection {
                    connection.stop().await;
                }
                tracing::info!(session_id = %self.id, "skipped with empty queue; stopped");
                self.deps.events.queue_changed(self.guild_id, 0);
                Ok(SkipOutcome::Stopped)
            }
            None => Err(SessionError::NothingPlaying),
        }
    }

    /// Play the most recent history entry.
    ///
    /// Without a voice channel the existing connection is reused.
    pub async fn previous(
        &self,
        voice_channel: Option<&ChannelRef>,
    ) -> Result<TrackDescriptor, SessionError> {
        let _gate = self.op_gate.lock().await;
        let track = self
            .lock_state()
            .queue
            .pop_history()
            .ok_or(SessionError::NoHistory)?;
        match self
            .start_locked(track.clone(), voice_channel, 0.0, StartKind::Fresh)
            .await
        {
            Ok(()) => Ok(track),
            Err(err) => {
                self.lock_state().queue.push_history(track);
                Err(err)
            }
        }
    }

    /// Stop playback and clear the queue. `current` is not recorded.
    pub async fn stop(&self) -> Result<usize, SessionError> {
        let _gate = self.op_gate.lock().await;
        let (connection, cleared) = {
            let mut state = self.lock_state();
            let connection = state.live_connection().ok_or(SessionError::NotConnected)?;
            state.clear_playback();
            (connection, state.queue.clear())
        };
        connection.stop().await;
        tracing::info!(session_id = %self.id, cleared, "playback stopped");
        self.deps.events.queue_changed(self.guild_id, 0);
        Ok(cleared)
    }

    pub async fn pause(&self) -> bool {
        let _gate = self.op_gate.lock().await;
        let connection = {
            let mut state = self.lock_state();
            let Some(connection) = state.live_connection() else {
                return false;
            };
            if !state.is_playing {
                return false;
            }
            state.clock.freeze(Instant::now());
            state.is_playing = false;
            if state.recovering {
                tracing::info!(session_id = %self.id, "paused during recovery");
                return true;
            }
            connection
        };
        connection.pause();
        tracing::info!(session_id = %self.id, "paused");
        true
    }

    pub async fn resume(&self) -> bool {
        let _gate = self.op_gate.lock().await;
        let connection = {
            let mut state = self.lock_state();
            let Some(connection) = state.live_connection() else {
                return false;
            };
            if state.paused_in_recovery() {
                // The recovery restart starts the clock.
                state.is_playing = true;
                tracing::info!(session_id = %self.id, "resumed during recovery");
                return true;
            }
            if !connection.is_paused() {
                return false;
            }
            state.clock.resume(Instant::now());
            state.is_playing = true;
            connection
        };
        connection.resume();
        tracing::info!(session_id = %self.id, "resumed");
        true
    }

    /// Connect to `channel`, or move there from another channel.
    pub async fn join(&self, channel: &ChannelRef) -> Result<JoinOutcome, SessionError> {
        let _gate = self.op_gate.lock().await;
        let before = self.connected_channel();
        self.ensure_connection(channel).await?;
        Ok(match before {
            None => JoinOutcome::Joined(channel.clone()),
            Some(previous) if previous.channel_id == channel.channel_id => {
                JoinOutcome::AlreadyThere(channel.clone())
            }
            Some(_) => JoinOutcome::Moved(channel.clone()),
        })
    }

    /// Disconnect and clear playback and queue.
    ///
    /// Returns `false` without side effects when not connected.
    pub async fn leave(&self, reason: LeaveReason) -> bool {
        let _gate = self.op_gate.lock().await;
        let (connection, text_channel) = {
            let mut state = self.lock_state();
            let Some(connection) = state.live_connection() else {
                return false;
            };
            state.connection = None;
            state.clear_playback();
            state.queue.clear();
            (connection, state.last_text_channel.clone())
        };
        let channel = connection.channel();
        connection.stop().await;
        connection.disconnect().await;
        tracing::info!(
            session_id = %self.id,
            channel = %channel.name,
            reason = reason.as_str(),
            "left voice channel"
        );
        self.deps
            .events
            .left_channel(self.guild_id, channel.name, reason, text_channel);
        true
    }

    /// Set the volume used by future stream starts. Returns `(old, new)`.
    pub fn set_volume(&self, level: u8) -> (u8, u8) {
        let mut state = self.lock_state();
        let old = state.volume;
        state.volume = level.min(100);
        (old, state.volume)
    }

    pub fn clear_queue(&self) -> usize {
        let cleared = self.lock_state().queue.clear();
        self.deps.events.queue_changed(self.guild_id, 0);
        cleared
    }

    /// Remove a queued track by 1-based position.
    pub fn remove(&self, position: usize) -> Option<TrackDescriptor> {
        let (removed, queue_len) = {
            let mut state = self.lock_state();
            let removed = position
                .checked_sub(1)
                .and_then(|index| state.queue.remove(index));
            (removed, state.queue.len())
        };
        if removed.is_some() {
            self.deps.events.queue_changed(self.guild_id, queue_len);
        }
        removed
    }

    pub fn remember_text_channel(&self, text_channel: impl Into<String>) {
        self.lock_state().last_text_channel = Some(text_channel.into());
    }

    pub fn connected_channel(&self) -> Option<ChannelRef> {
        self.lock_state()
            .live_connection()
            .map(|connection| connection.channel())
    }

    pub fn history(&self) -> Vec<TrackDescriptor> {
        self.lock_state().queue.history()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        let connection = state.live_connection();
        SessionSnapshot {
            current: state.current.clone(),
            queue: state.queue.items(),
            is_playing: state.is_playing,
            is_paused: state.paused_in_recovery()
                || connection.as_ref().is_some_and(|conn| conn.is_paused()),
            position_secs: if state.current.is_some() {
                state.clock.elapsed(Instant::now())
            } else {
                0.0
            },
            volume: state.volume,
            history_len: state.queue.history_len(),
            channel: connection.map(|conn| conn.channel().name),
        }
    }

    /// True while a seek restart is in flight.
    pub fn is_seeking(&self) -> bool {
        self.lock_state().is_seeking
    }
}

enum Completion {
    Recover,
    Finished {
        title: Option<String>,
        queue_len: usize,
    },
}

/// Holds `is_seeking` for the lifetime of a seek restart.
struct SeekingGuard<'a> {
    session: &'a PlaybackSession,
}

impl<'a> SeekingGuard<'a> {
    fn engage(session: &'a PlaybackSession) -> Self {
        session.lock_state().is_seeking = true;
        Self { session }
    }
}

impl Drop for SeekingGuard<'_> {
    fn drop(&mut self) {
        self.session.lock_state().is_seeking = false;
    }
}

async fn run_stream_events(
    session: Weak<PlaybackSession>,
    mut rx: mpsc::UnboundedReceiver<StreamEvent>,
) {
    while let Some(event) = rx.recv().await {
        let Some(session) = session.upgrade() else {
            break;
        };
        session.on_stream_finished(event).await;
    }
}
