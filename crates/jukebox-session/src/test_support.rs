//! Scripted collaborators for session tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jukebox_types::{ChannelRef, RequesterId, TrackDescriptor};
use tokio::sync::mpsc;

use crate::config::SessionSettings;
use crate::error::{PlaybackError, ResolveError, TransportError};
use crate::events::EventBus;
use crate::idle::{IdleCheck, IdleMonitor, idle_channel};
use crate::registry::SessionRegistry;
use crate::resolver::{MediaResolver, ResolvedTrack};
use crate::session::{PlayRequest, PlaybackSession, SessionDeps};
use crate::transport::{PlayOptions, StreamCompletion, VoiceConnection, VoiceTransport};

/// Let spawned tasks drain their channels.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub struct ScriptedConnection {
    channel: Mutex<ChannelRef>,
    connected: AtomicBool,
    playing: AtomicBool,
    paused: AtomicBool,
    plays: Mutex<Vec<(String, PlayOptions)>>,
    completion: Mutex<Option<StreamCompletion>>,
    fail_plays: AtomicUsize,
    stops: AtomicUsize,
    moves: AtomicUsize,
}

impl ScriptedConnection {
    fn new(channel: ChannelRef) -> Self {
        Self {
            channel: Mutex::new(channel),
            connected: AtomicBool::new(true),
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            plays: Mutex::new(Vec::new()),
            completion: Mutex::new(None),
            fail_plays: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            moves: AtomicUsize::new(0),
        }
    }

    pub fn plays(&self) -> Vec<(String, PlayOptions)> {
        self.plays.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn moves(&self) -> usize {
        self.moves.load(Ordering::SeqCst)
    }

    pub fn fail_next_plays(&self, count: usize) {
        self.fail_plays.store(count, Ordering::SeqCst);
    }

    /// End the current stream as the transport would.
    pub fn finish(&self, error: Option<PlaybackError>) {
        self.playing.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        if let Some(completion) = self.completion.lock().unwrap().take() {
            completion.complete(error);
        }
    }

    /// Detach the current completion so later stops do not report it.
    pub fn take_completion(&self) -> Option<StreamCompletion> {
        self.completion.lock().unwrap().take()
    }

    /// Simulate the voice link dropping underneath the session.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceConnection for ScriptedConnection {
    fn channel(&self) -> ChannelRef {
        self.channel.lock().unwrap().clone()
    }

    async fn move_to(&self, channel: &ChannelRef) -> Result<(), TransportError> {
        *self.channel.lock().unwrap() = channel.clone();
        self.moves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn play(
        &self,
        uri: &str,
        options: PlayOptions,
        completion: StreamCompletion,
    ) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        let pending = self.fail_plays.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_plays.store(pending - 1, Ordering::SeqCst);
            return Err(TransportError::Play("scripted failure".into()));
        }
        self.plays.lock().unwrap().push((uri.to_string(), options));
        *self.completion.lock().unwrap() = Some(completion);
        self.playing.store(true, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.finish(None);
    }

    fn pause(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            self.paused.store(true, Ordering::SeqCst);
        }
    }

    fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            self.playing.store(true, Ordering::SeqCst);
        }
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.finish(None);
        self.connected.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct ScriptedTransport {
    occupancy: AtomicUsize,
    fail_connect: AtomicBool,
    connections: Mutex<Vec<Arc<ScriptedConnection>>>,
}

impl ScriptedTransport {
    pub fn new(occupancy: usize) -> Self {
        Self {
            occupancy: AtomicUsize::new(occupancy),
            ..Self::default()
        }
    }

    pub fn set_occupancy(&self, humans: usize) {
        self.occupancy.store(humans, Ordering::SeqCst);
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn connections(&self) -> Vec<Arc<ScriptedConnection>> {
        self.connections.lock().unwrap().clone()
    }

    pub fn last_connection(&self) -> Arc<ScriptedConnection> {
        self.connections
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no connection opened")
    }
}

#[async_trait]
impl VoiceTransport for ScriptedTransport {
    async fn connect(
        &self,
        channel: &ChannelRef,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("scripted refusal".into()));
        }
        let connection = Arc::new(ScriptedConnection::new(channel.clone()));
        self.connections.lock().unwrap().push(connection.clone());
        Ok(connection)
    }

    async fn human_members(&self, _channel: &ChannelRef) -> usize {
        self.occupancy.load(Ordering::SeqCst)
    }
}

/// Resolves any query to a track named after it, except `missing`.
#[derive(Default)]
pub struct ScriptedResolver {
    durations: Mutex<HashMap<String, u64>>,
    fail_stream_uri: AtomicBool,
    stream_uri_calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn set_duration(&self, title: &str, secs: u64) {
        self.durations
            .lock()
            .unwrap()
            .insert(title.to_string(), secs);
    }

    pub fn fail_stream_uri(&self, fail: bool) {
        self.fail_stream_uri.store(fail, Ordering::SeqCst);
    }

    pub fn stream_uri_calls(&self) -> usize {
        self.stream_uri_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaResolver for ScriptedResolver {
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack, ResolveError> {
        if query == "missing" {
            return Err(ResolveError::NotFound(query.to_string()));
        }
        let duration_secs = self
            .durations
            .lock()
            .unwrap()
            .get(query)
            .copied()
            .unwrap_or(180);
        Ok(ResolvedTrack {
            title: query.to_string(),
            stream_reference: query.to_string(),
            duration_secs,
            thumbnail_uri: None,
        })
    }

    async fn stream_uri(&self, stream_reference: &str) -> Result<String, ResolveError> {
        self.stream_uri_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stream_uri.load(Ordering::SeqCst) {
            return Err(ResolveError::StreamUnavailable(stream_reference.to_string()));
        }
        Ok(format!("scripted://{stream_reference}"))
    }
}

pub struct Fixture {
    pub registry: Arc<SessionRegistry>,
    pub transport: Arc<ScriptedTransport>,
    pub resolver: Arc<ScriptedResolver>,
    pub events: EventBus,
    pub channel: ChannelRef,
    idle_rx: Mutex<Option<mpsc::UnboundedReceiver<IdleCheck>>>,
}

impl Fixture {
    /// Registry without an idle monitor; idle checks are collected instead.
    pub fn new(settings: SessionSettings) -> Self {
        Self::build(settings, false)
    }

    pub fn with_idle_monitor(settings: SessionSettings) -> Self {
        Self::build(settings, true)
    }

    fn build(settings: SessionSettings, monitor: bool) -> Self {
        let transport = Arc::new(ScriptedTransport::new(1));
        let resolver = Arc::new(ScriptedResolver::default());
        let events = EventBus::new();
        let (idle, idle_rx) = idle_channel();
        let grace = settings.idle_grace;
        let deps = SessionDeps {
            transport: transport.clone(),
            resolver: resolver.clone(),
            events: events.clone(),
            idle,
            settings,
        };
        let registry = Arc::new(SessionRegistry::new(deps));
        let idle_rx = if monitor {
            IdleMonitor::spawn(Arc::downgrade(&registry), idle_rx, grace);
            None
        } else {
            Some(idle_rx)
        };
        Self {
            registry,
            transport,
            resolver,
            events,
            channel: ChannelRef {
                guild_id: 7,
                channel_id: 70,
                name: "General".into(),
            },
            idle_rx: Mutex::new(idle_rx),
        }
    }

    pub fn session(&self) -> Arc<PlaybackSession> {
        self.registry.get_or_create(self.channel.guild_id)
    }

    pub fn request(&self, query: &str) -> PlayRequest {
        PlayRequest {
            query: query.to_string(),
            requester: RequesterId(42),
            voice_channel: Some(self.channel.clone()),
            text_channel: Some("#music".into()),
        }
    }

    pub fn track(&self, title: &str, duration_secs: u64) -> TrackDescriptor {
        TrackDescriptor {
            title: title.to_string(),
            stream_reference: title.to_string(),
            duration_secs,
            thumbnail_uri: None,
            requester: RequesterId(42),
        }
    }

    /// Guilds that asked for an idle check since the last call.
    pub fn idle_requests(&self) -> Vec<u64> {
        let mut guard = self.idle_rx.lock().unwrap();
        let Some(rx) = guard.as_mut() else {
            return Vec::new();
        };
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|check| check.guild_id)
            .collect()
    }
}
