//! Console command layer.
//!
//! Parses text commands on behalf of one configured user and renders
//! session results as short reply lines.

use std::str::FromStr;
use std::sync::Arc;

use jukebox_types::{LeaveReason, SessionSnapshot, TrackDescriptor, format_clock};
use thiserror::Error;

use crate::config::ConsoleSettings;
use crate::loopback::LoopbackTransport;
use crate::registry::SessionRegistry;
use crate::session::{JoinOutcome, PlayOutcome, PlayRequest, SeekOutcome, SkipOutcome};

pub const HELP: &str = "commands: join, leave, play <query>, skip, back, pause, resume, \
forward [secs], backward [secs], volume <0-100>, queue, np, remove <n>, clear, stop, \
empty, occupy [n], help, quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join,
    Leave,
    Play(String),
    Skip,
    Back,
    Pause,
    Resume,
    Forward(Option<u64>),
    Backward(Option<u64>),
    Volume(i64),
    Queue,
    NowPlaying,
    Remove(usize),
    Clear,
    Stop,
    /// Simulate every human leaving the voice channel.
    Empty,
    /// Simulate humans joining the voice channel.
    Occupy(usize),
    Help,
    Quit,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`; try `help`")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("`{0}` is not a number")]
    InvalidNumber(String),
}

fn number<T: FromStr>(value: &str) -> Result<T, CommandError> {
    value
        .parse()
        .map_err(|_| CommandError::InvalidNumber(value.to_string()))
}

fn optional_number<T: FromStr>(value: &str) -> Result<Option<T>, CommandError> {
    if value.is_empty() {
        Ok(None)
    } else {
        number(value).map(Some)
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandError::Empty);
        }
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map(|(word, rest)| (word, rest.trim()))
            .unwrap_or((line, ""));
        let command = match word.to_ascii_lowercase().as_str() {
            "join" => Command::Join,
            "leave" => Command::Leave,
            "play" | "p" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument("play"));
                }
                Command::Play(rest.to_string())
            }
            "skip" | "next" => Command::Skip,
            "back" | "previous" | "prev" => Command::Back,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "forward" | "ff" => Command::Forward(optional_number(rest)?),
            "backward" | "rewind" | "rw" => Command::Backward(optional_number(rest)?),
            "volume" | "vol" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument("volume"));
                }
                Command::Volume(number(rest)?)
            }
            "queue" | "q" => Command::Queue,
            "np" | "nowplaying" => Command::NowPlaying,
            "remove" | "rm" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingArgument("remove"));
                }
                Command::Remove(number(rest)?)
            }
            "clear" => Command::Clear,
            "stop" => Command::Stop,
            "empty" => Command::Empty,
            "occupy" => Command::Occupy(optional_number(rest)?.unwrap_or(1)),
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

impl Reply {
    fn text(message: impl Into<String>) -> Self {
        Reply::Text(message.into())
    }
}

/// Runs commands as the configured console user.
pub struct Console {
    registry: Arc<SessionRegistry>,
    transport: Arc<LoopbackTransport>,
    settings: ConsoleSettings,
}

impl Console {
    pub fn new(
        registry: Arc<SessionRegistry>,
        transport: Arc<LoopbackTransport>,
        settings: ConsoleSettings,
    ) -> Self {
        transport.set_occupancy(settings.voice_channel.channel_id, settings.occupants);
        Self {
            registry,
            transport,
            settings,
        }
    }

    fn guild_id(&self) -> u64 {
        self.settings.voice_channel.guild_id
    }

    pub async fn execute(&self, command: Command) -> Reply {
        let session = self.registry.get_or_create(self.guild_id());
        session.remember_text_channel(self.settings.text_channel.clone());
        match command {
            Command::Join => match session.join(&self.settings.voice_channel).await {
                Ok(JoinOutcome::Joined(channel)) => Reply::text(format!("Joined {}", channel.name)),
                Ok(JoinOutcome::Moved(channel)) => Reply::text(format!("Moved to {}", channel.name)),
                Ok(JoinOutcome::AlreadyThere(_)) => {
                    Reply::text("I'm already in your voice channel!")
                }
                Err(err) => Reply::text(err.to_string()),
            },
            Command::Leave => {
                if self
                    .registry
                    .leave(self.guild_id(), LeaveReason::Requested)
                    .await
                {
                    Reply::text("Left the voice channel")
                } else {
                    Reply::text("I'm not connected to any voice channel!")
                }
            }
            Command::Play(query) => {
                let request = PlayRequest {
                    query,
                    requester: self.settings.requester,
                    voice_channel: Some(self.settings.voice_channel.clone()),
                    text_channel: Some(self.settings.text_channel.clone()),
                };
                match session.play(request).await {
                    Ok(PlayOutcome::Started(track)) => {
                        Reply::text(format!("Now streaming: {}", describe(&track)))
                    }
                    Ok(PlayOutcome::Queued { track, position }) => Reply::text(format!(
                        "Added to queue: {} (position {position})",
                        track.title
                    )),
                    Err(err) => Reply::text(err.to_string()),
                }
            }
            Command::Skip => match session.skip().await {
                Ok(SkipOutcome::Started(track)) => {
                    Reply::text(format!("Skipped! Now playing: {}", track.title))
                }
                Ok(SkipOutcome::Stopped) => Reply::text("Skipped! No more songs in queue."),
                Err(err) => Reply::text(err.to_string()),
            },
            Command::Back => match session.previous(Some(&self.settings.voice_channel)).await {
                Ok(track) => Reply::text(format!("Playing previous song: {}", track.title)),
                Err(err) => Reply::text(err.to_string()),
            },
            Command::Pause => {
                if session.pause().await {
                    Reply::text("Music paused!")
                } else {
                    Reply::text("No song is currently playing!")
                }
            }
            Command::Resume => {
                if session.resume().await {
                    Reply::text("Music resumed!")
                } else {
                    Reply::text("Playback is not paused!")
                }
            }
            Command::Forward(secs) => {
                let secs = secs.unwrap_or(session.settings().seek_step_secs);
                render_seek(session.forward(secs).await)
            }
            Command::Backward(secs) => {
                let secs = secs.unwrap_or(session.settings().seek_step_secs);
                render_seek(session.backward(secs).await)
            }
            Command::Volume(level) => {
                let Ok(level) = u8::try_from(level) else {
                    return Reply::text("Volume must be between 0 and 100!");
                };
                if level > 100 {
                    return Reply::text("Volume must be between 0 and 100!");
                }
                let (old, new) = session.set_volume(level);
                let mut message = format!("Volume changed: {old}% -> {new}%");
                if !session.snapshot().is_playing {
                    message.push_str(" (applies to the next song played)");
                }
                Reply::text(message)
            }
            Command::Queue => Reply::Text(render_queue(&session.snapshot())),
            Command::NowPlaying => Reply::Text(render_now_playing(&session.snapshot())),
            Command::Remove(position) => match session.remove(position) {
                Some(track) => Reply::text(format!("Removed {} from the queue", track.title)),
                None => Reply::text(format!("No song at position {position}")),
            },
            Command::Clear => match session.clear_queue() {
                0 => Reply::text("Queue is already empty!"),
                cleared => Reply::text(format!("Cleared {cleared} song(s) from queue!")),
            },
            Command::Stop => match session.stop().await {
                Ok(_) => Reply::text("Stopped playback and cleared the queue!"),
                Err(err) => Reply::text(err.to_string()),
            },
            Command::Empty => {
                self.transport
                    .set_occupancy(self.settings.voice_channel.channel_id, 0);
                if self.registry.on_occupancy_changed(self.guild_id()).await {
                    Reply::text("Left voice channel (no users remaining)")
                } else {
                    Reply::text("Voice channel is now empty")
                }
            }
            Command::Occupy(humans) => {
                self.transport
                    .set_occupancy(self.settings.voice_channel.channel_id, humans);
                Reply::text(format!("Voice channel now has {humans} listener(s)"))
            }
            Command::Help => Reply::text(HELP),
            Command::Quit => Reply::Quit,
        }
    }
}

fn describe(track: &TrackDescriptor) -> String {
    if track.has_duration() {
        format!(
            "{} [{}]",
            track.title,
            format_clock(track.duration_secs as f64)
        )
    } else {
        format!("{} [live]", track.title)
    }
}

fn render_seek(result: Result<SeekOutcome, crate::error::SessionError>) -> Reply {
    match result {
        Ok(SeekOutcome::Moved { position_secs }) => {
            Reply::text(format!("Seeked to {}", format_clock(position_secs)))
        }
        Ok(SeekOutcome::Skipped(SkipOutcome::Started(track))) => {
            Reply::text(format!("Reached the end. Now playing: {}", track.title))
        }
        Ok(SeekOutcome::Skipped(SkipOutcome::Stopped)) => {
            Reply::text("Reached the end. No more songs in queue.")
        }
        Err(err) => Reply::text(err.to_string()),
    }
}

fn render_now_playing(snapshot: &SessionSnapshot) -> String {
    let Some(track) = snapshot.current.as_ref() else {
        return "No song is currently playing!".to_string();
    };
    let status = if snapshot.is_paused { "Paused" } else { "Now playing" };
    let position = format_clock(snapshot.position_secs);
    let total = if track.has_duration() {
        format_clock(track.duration_secs as f64)
    } else {
        "live".to_string()
    };
    format!(
        "{status}: {} [{position} / {total}] requested by {}",
        track.title, track.requester
    )
}

fn render_queue(snapshot: &SessionSnapshot) -> String {
    let mut lines = Vec::new();
    if snapshot.current.is_some() {
        lines.push(render_now_playing(snapshot));
    }
    if snapshot.queue.is_empty() {
        lines.push("Queue is empty! Add some songs with `play`".to_string());
    } else {
        lines.push("Up next:".to_string());
        for (index, track) in snapshot.queue.iter().enumerate() {
            lines.push(format!(
                "{}. {} requested by {}",
                index + 1,
                describe(track),
                track.requester
            ));
        }
    }
    lines.join("\n")
}
