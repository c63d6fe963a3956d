//! Simulated voice transport.
//!
//! Each connection runs a worker thread that "plays" a stream by waiting out
//! its remaining duration. Stream URIs take the form
//! `loopback://<name>?duration=<secs>&fail_after=<secs>&error=<message>`:
//! without `duration` a stream plays until stopped, and `fail_after` ends it
//! early with `error` (default "network error").

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use jukebox_types::ChannelRef;

use crate::error::{PlaybackError, TransportError};
use crate::transport::{PlayOptions, StreamCompletion, VoiceConnection, VoiceTransport};

const SCHEME: &str = "loopback://";

/// Parsed loopback stream URI.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopbackStream {
    pub name: String,
    pub duration: Option<Duration>,
    pub fail_after: Option<Duration>,
    pub error: String,
}

impl LoopbackStream {
    pub fn parse(uri: &str) -> Result<Self, TransportError> {
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| TransportError::Play(format!("unsupported uri {uri}")))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));
        let mut stream = LoopbackStream {
            name: name.to_string(),
            duration: None,
            fail_after: None,
            error: "network error".to_string(),
        };
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "duration" => stream.duration = Some(parse_secs(key, value)?),
                "fail_after" => stream.fail_after = Some(parse_secs(key, value)?),
                "error" => stream.error = value.replace('+', " "),
                _ => {}
            }
        }
        Ok(stream)
    }

    /// Time until the stream ends when started at `offset_secs`, and the
    /// error it ends with.
    fn plan(&self, offset_secs: f64) -> (Option<Duration>, Option<PlaybackError>) {
        let offset = Duration::from_secs_f64(offset_secs.max(0.0));
        let natural = self.duration.map(|d| d.saturating_sub(offset));
        match (self.fail_after, natural) {
            (Some(fail), Some(natural)) if fail < natural => {
                (Some(fail), Some(PlaybackError::from_message(self.error.clone())))
            }
            (Some(fail), None) => (Some(fail), Some(PlaybackError::from_message(self.error.clone()))),
            _ => (natural, None),
        }
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, TransportError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| TransportError::Play(format!("invalid {key}: {value}")))
}

/// Commands accepted by a connection's worker thread.
enum LoopbackCommand {
    Play {
        stream: LoopbackStream,
        options: PlayOptions,
        completion: StreamCompletion,
    },
    Stop,
    Pause,
    Resume,
    Disconnect,
}

#[derive(Default)]
struct Flags {
    connected: AtomicBool,
    playing: AtomicBool,
    paused: AtomicBool,
    /// Stream the playing/paused flags describe.
    stream_id: AtomicU64,
}

struct ActiveStream {
    name: String,
    completion: StreamCompletion,
    /// Time left when last resumed; `None` plays until stopped.
    remaining: Option<Duration>,
    resumed_at: Instant,
    paused: bool,
    error: Option<PlaybackError>,
}

impl ActiveStream {
    fn time_left(&self) -> Option<Duration> {
        if self.paused {
            return None;
        }
        self.remaining
            .map(|left| left.saturating_sub(self.resumed_at.elapsed()))
    }
}

fn run_worker(channel_name: String, cmd_rx: Receiver<LoopbackCommand>, flags: Arc<Flags>) {
    let mut active: Option<ActiveStream> = None;
    loop {
        let cmd = match active.as_ref().and_then(ActiveStream::time_left) {
            Some(left) => match cmd_rx.recv_timeout(left) {
                Ok(cmd) => cmd,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(stream) = active.take() {
                        let latest = flags.stream_id.load(Ordering::SeqCst);
                        if latest == stream.completion.stream_id() {
                            flags.playing.store(false, Ordering::SeqCst);
                            flags.paused.store(false, Ordering::SeqCst);
                        }
                        tracing::debug!(channel = %channel_name, stream = %stream.name, error = ?stream.error, "loopback stream ended");
                        stream.completion.complete(stream.error);
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match cmd_rx.recv() {
                Ok(cmd) => cmd,
                Err(_) => break,
            },
        };

        match cmd {
            LoopbackCommand::Play {
                stream,
                options,
                completion,
            } => {
                if let Some(previous) = active.take() {
                    previous.completion.complete(None);
                }
                let (remaining, error) = stream.plan(options.start_offset_secs);
                tracing::debug!(
                    channel = %channel_name,
                    stream = %stream.name,
                    offset_secs = options.start_offset_secs,
                    volume = options.volume,
                    "loopback stream started"
                );
                active = Some(ActiveStream {
                    name: stream.name,
                    completion,
                    remaining,
                    resumed_at: Instant::now(),
                    paused: false,
                    error,
                });
            }
            LoopbackCommand::Stop => {
                if let Some(stream) = active.take() {
                    stream.completion.complete(None);
                }
            }
            LoopbackCommand::Pause => {
                if let Some(stream) = active.as_mut().filter(|s| !s.paused) {
                    stream.remaining = stream.time_left();
                    stream.paused = true;
                }
            }
            LoopbackCommand::Resume => {
                if let Some(stream) = active.as_mut().filter(|s| s.paused) {
                    stream.paused = false;
                    stream.resumed_at = Instant::now();
                }
            }
            LoopbackCommand::Disconnect => break,
        }
    }
    if let Some(stream) = active.take() {
        stream.completion.complete(None);
    }
    flags.playing.store(false, Ordering::SeqCst);
    flags.paused.store(false, Ordering::SeqCst);
    flags.connected.store(false, Ordering::SeqCst);
    tracing::debug!(channel = %channel_name, "loopback worker stopped");
}

pub struct LoopbackConnection {
    channel: Mutex<ChannelRef>,
    cmd_tx: Sender<LoopbackCommand>,
    flags: Arc<Flags>,
}

impl LoopbackConnection {
    fn open(channel: ChannelRef) -> Self {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let flags = Arc::new(Flags::default());
        flags.connected.store(true, Ordering::SeqCst);
        let worker_flags = flags.clone();
        let name = channel.name.clone();
        std::thread::spawn(move || run_worker(name, cmd_rx, worker_flags));
        Self {
            channel: Mutex::new(channel),
            cmd_tx,
            flags,
        }
    }

    fn send(&self, cmd: LoopbackCommand) -> Result<(), TransportError> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| TransportError::Disconnected)
    }
}

#[async_trait]
impl VoiceConnection for LoopbackConnection {
    fn channel(&self) -> ChannelRef {
        self.channel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn move_to(&self, channel: &ChannelRef) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        *self.channel.lock().unwrap_or_else(|e| e.into_inner()) = channel.clone();
        Ok(())
    }

    async fn play(
        &self,
        uri: &str,
        options: PlayOptions,
        completion: StreamCompletion,
    ) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        let stream = LoopbackStream::parse(uri)?;
        // Flags go first; the worker may end a zero-length stream before
        // `send` returns.
        self.flags
            .stream_id
            .store(completion.stream_id(), Ordering::SeqCst);
        self.flags.playing.store(true, Ordering::SeqCst);
        self.flags.paused.store(false, Ordering::SeqCst);
        let sent = self.send(LoopbackCommand::Play {
            stream,
            options,
            completion,
        });
        if sent.is_err() {
            self.flags.playing.store(false, Ordering::SeqCst);
        }
        sent
    }

    async fn stop(&self) {
        let _ = self.send(LoopbackCommand::Stop);
        self.flags.playing.store(false, Ordering::SeqCst);
        self.flags.paused.store(false, Ordering::SeqCst);
    }

    fn pause(&self) {
        if self.flags.playing.swap(false, Ordering::SeqCst) {
            self.flags.paused.store(true, Ordering::SeqCst);
            let _ = self.send(LoopbackCommand::Pause);
        }
    }

    fn resume(&self) {
        if self.flags.paused.swap(false, Ordering::SeqCst) {
            self.flags.playing.store(true, Ordering::SeqCst);
            let _ = self.send(LoopbackCommand::Resume);
        }
    }

    fn is_playing(&self) -> bool {
        self.flags.playing.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    fn is_connected(&self) -> bool {
        self.flags.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) {
        self.flags.connected.store(false, Ordering::SeqCst);
        let _ = self.send(LoopbackCommand::Disconnect);
    }
}

/// In-process transport with settable channel occupancy.
pub struct LoopbackTransport {
    default_occupancy: usize,
    occupancy: Mutex<HashMap<u64, usize>>,
}

impl LoopbackTransport {
    pub fn new(default_occupancy: usize) -> Self {
        Self {
            default_occupancy,
            occupancy: Mutex::new(HashMap::new()),
        }
    }

    /// Set the number of human occupants of a voice channel.
    pub fn set_occupancy(&self, channel_id: u64, humans: usize) {
        self.occupancy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel_id, humans);
    }
}

#[async_trait]
impl VoiceTransport for LoopbackTransport {
    async fn connect(
        &self,
        channel: &ChannelRef,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
        tracing::debug!(channel = %channel.name, "loopback connect");
        Ok(Arc::new(LoopbackConnection::open(channel.clone())))
    }

    async fn human_members(&self, channel: &ChannelRef) -> usize {
        self.occupancy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&channel.channel_id)
            .copied()
            .unwrap_or(self.default_occupancy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StreamEvent;
    use tokio::sync::mpsc;

    fn channel() -> ChannelRef {
        ChannelRef {
            guild_id: 1,
            channel_id: 2,
            name: "General".into(),
        }
    }

    fn options(offset: f64) -> PlayOptions {
        PlayOptions {
            start_offset_secs: offset,
            volume: 50,
        }
    }

    #[test]
    fn parses_stream_parameters() {
        let stream =
            LoopbackStream::parse("loopback://intro?duration=30&fail_after=2.5&error=http+error+403")
                .unwrap();
        assert_eq!(stream.name, "intro");
        assert_eq!(stream.duration, Some(Duration::from_secs(30)));
        assert_eq!(stream.fail_after, Some(Duration::from_millis(2500)));
        assert_eq!(stream.error, "http error 403");
    }

    #[test]
    fn rejects_foreign_scheme_and_bad_numbers() {
        assert!(LoopbackStream::parse("https://example.com/a.mp3").is_err());
        assert!(LoopbackStream::parse("loopback://a?duration=abc").is_err());
    }

    #[test]
    fn plan_accounts_for_offset_and_failure() {
        let stream = LoopbackStream::parse("loopback://a?duration=10").unwrap();
        assert_eq!(stream.plan(4.0), (Some(Duration::from_secs(6)), None));

        let failing = LoopbackStream::parse("loopback://a?duration=10&fail_after=1").unwrap();
        let (left, error) = failing.plan(0.0);
        assert_eq!(left, Some(Duration::from_secs(1)));
        assert!(error.unwrap().is_recoverable());

        let live = LoopbackStream::parse("loopback://radio").unwrap();
        assert_eq!(live.plan(100.0), (None, None));
    }

    #[tokio::test]
    async fn short_stream_reports_natural_completion() {
        let transport = LoopbackTransport::new(1);
        let connection = transport.connect(&channel()).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection
            .play(
                "loopback://blip?duration=0.05",
                options(0.0),
                StreamCompletion::new(1, tx),
            )
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event, StreamEvent { stream_id: 1, error: None });
        connection.disconnect().await;
    }

    #[tokio::test]
    async fn zero_length_stream_ends_not_playing() {
        let transport = LoopbackTransport::new(1);
        let connection = transport.connect(&channel()).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection
            .play(
                "loopback://blip?duration=0",
                options(0.0),
                StreamCompletion::new(1, tx),
            )
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().stream_id, 1);
        assert!(!connection.is_playing());
        assert!(!connection.is_paused());
        connection.disconnect().await;
    }

    #[tokio::test]
    async fn play_right_after_stop_stays_playing() {
        let transport = LoopbackTransport::new(1);
        let connection = transport.connect(&channel()).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection
            .play("loopback://one", options(0.0), StreamCompletion::new(1, tx.clone()))
            .await
            .unwrap();
        connection.stop().await;
        connection
            .play("loopback://two", options(0.0), StreamCompletion::new(2, tx))
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().stream_id, 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(connection.is_playing());
        connection.disconnect().await;
    }

    #[tokio::test]
    async fn stop_reports_completion_once() {
        let transport = LoopbackTransport::new(1);
        let connection = transport.connect(&channel()).await.unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        connection
            .play("loopback://radio", options(0.0), StreamCompletion::new(5, tx))
            .await
            .unwrap();
        assert!(connection.is_playing());
        connection.stop().await;

        assert_eq!(rx.recv().await.unwrap().stream_id, 5);
        assert!(rx.recv().await.is_none());
        assert!(!connection.is_playing());
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_flags() {
        let transport = LoopbackTransport::new(1);
        let connection = transport.connect(&channel()).await.unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        connection
            .play("loopback://radio", options(0.0), StreamCompletion::new(1, tx))
            .await
            .unwrap();
        connection.pause();
        assert!(connection.is_paused());
        assert!(!connection.is_playing());
        connection.resume();
        assert!(connection.is_playing());
    }

    #[tokio::test]
    async fn disconnected_connection_rejects_play() {
        let transport = LoopbackTransport::new(1);
        let connection = transport.connect(&channel()).await.unwrap();
        connection.disconnect().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = connection
            .play("loopback://radio", options(0.0), StreamCompletion::new(1, tx))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Disconnected);
    }

    #[tokio::test]
    async fn occupancy_defaults_until_set() {
        let transport = LoopbackTransport::new(3);
        assert_eq!(transport.human_members(&channel()).await, 3);
        transport.set_occupancy(2, 0);
        assert_eq!(transport.human_members(&channel()).await, 0);
    }
}
