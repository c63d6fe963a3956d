use serde::{Deserialize, Serialize};

/// Opaque identity of the user who requested a track.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RequesterId(pub u64);

impl std::fmt::Display for RequesterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<@{}>", self.0)
    }
}

/// Voice channel reference handed to the transport.
///
/// Sessions are keyed by `guild_id`; a guild holds at most one voice
/// connection, which may move between its channels.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChannelRef {
    /// Guild (server) that owns the channel.
    pub guild_id: u64,
    /// Voice channel id.
    pub channel_id: u64,
    /// Display name used in notifications.
    pub name: String,
}

/// Immutable description of a playable item.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackDescriptor {
    /// Display title.
    pub title: String,
    /// Resolver-specific handle from which a playable URI is derived.
    ///
    /// This is not a media URI; URIs expire and are re-derived on every start.
    pub stream_reference: String,
    /// Duration in seconds. `0` means unknown or live.
    pub duration_secs: u64,
    /// Optional artwork URI.
    pub thumbnail_uri: Option<String>,
    /// User who asked for the track.
    pub requester: RequesterId,
}

impl TrackDescriptor {
    /// Returns `true` when the duration is known.
    pub fn has_duration(&self) -> bool {
        self.duration_secs > 0
    }
}

/// Why a session left its voice channel.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    /// The last human occupant left while connected.
    AllOccupantsLeft,
    /// A track ended and nobody came back during the grace window.
    ChannelRemainedEmpty,
    /// A user asked the session to leave.
    Requested,
}

impl LeaveReason {
    /// Short human-readable reason used in notifications.
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveReason::AllOccupantsLeft => "all occupants left",
            LeaveReason::ChannelRemainedEmpty => "channel remained empty",
            LeaveReason::Requested => "requested",
        }
    }
}

/// Read-only view of a session for rendering.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    /// Track associated with the transport, playing or paused.
    pub current: Option<TrackDescriptor>,
    /// Upcoming tracks in play order.
    pub queue: Vec<TrackDescriptor>,
    /// `true` while audio is being emitted for `current`.
    pub is_playing: bool,
    /// `true` while the transport holds `current` paused.
    pub is_paused: bool,
    /// Elapsed position of `current` in seconds.
    pub position_secs: f64,
    /// Volume (0-100) applied to the next stream start.
    pub volume: u8,
    /// Number of tracks available for "go back".
    pub history_len: usize,
    /// Name of the connected voice channel, if any.
    pub channel: Option<String>,
}

/// Notifications published by sessions for UI collaborators.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    NowPlaying {
        guild_id: u64,
        title: String,
        position_secs: f64,
        duration_secs: u64,
        requester: RequesterId,
        thumbnail_uri: Option<String>,
    },
    QueueChanged {
        guild_id: u64,
        queue_len: usize,
    },
    LeftChannel {
        guild_id: u64,
        channel: String,
        reason: LeaveReason,
        text_channel: Option<String>,
    },
}

/// Format seconds as `M:SS`, or `H:MM:SS` past one hour.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
