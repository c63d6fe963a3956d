//! Error taxonomy for sessions and their collaborators.
//!
//! `SessionError` is what callers see; its `Display` is the short message
//! rendered back to the user.

use thiserror::Error;

/// Substrings that mark a playback failure as transient.
const RECOVERABLE_KEYWORDS: &[&str] = &[
    "403",
    "forbidden",
    "connection reset",
    "timeout",
    "network",
    "http error",
    "server returned",
];

/// Failures reported by the voice transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("voice connection failed: {0}")]
    Connect(String),
    #[error("voice connection is closed")]
    Disconnected,
    #[error("audio stream rejected: {0}")]
    Play(String),
}

/// Failures reported by the media resolver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no results for {0}")]
    NotFound(String),
    #[error("stream uri unavailable for {0}")]
    StreamUnavailable(String),
    #[error("resolver backend failed: {0}")]
    Backend(String),
}

/// Error attached to a stream completion.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("network error: {0}")]
    Network(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{0}")]
    Other(String),
}

impl PlaybackError {
    /// Build an error from a raw transport message.
    pub fn from_message(message: impl Into<String>) -> Self {
        PlaybackError::Other(message.into())
    }

    /// Transient failures get one restart attempt from the elapsed position.
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlaybackError::Network(_)
            | PlaybackError::Forbidden(_)
            | PlaybackError::Timeout(_)
            | PlaybackError::Http(_) => true,
            PlaybackError::Decode(message) | PlaybackError::Other(message) => {
                let lowered = message.to_ascii_lowercase();
                RECOVERABLE_KEYWORDS
                    .iter()
                    .any(|keyword| lowered.contains(keyword))
            }
        }
    }
}

/// Caller-visible session failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("You must be in a voice channel to play music!")]
    NoVoiceChannel,
    #[error("Not connected to a voice channel!")]
    NotConnected,
    #[error("No song is currently playing!")]
    NothingPlaying,
    #[error("Music is paused. Resume or play a new song.")]
    Paused,
    #[error("No previous song to play!")]
    NoHistory,
    #[error("No results found for your search: {0}")]
    TrackNotFound(String),
    #[error("Failed to get streaming URL: {0}")]
    StreamUnavailable(String),
    #[error("Failed to connect to voice channel: {0}")]
    Connect(String),
    #[error("Failed to start audio stream: {0}")]
    StartFailed(String),
    #[error("Failed to seek: {0}")]
    SeekFailed(String),
    #[error("Current song data is corrupted. Please play a new song.")]
    CorruptTrack,
}

impl From<ResolveError> for SessionError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(query) => SessionError::TrackNotFound(query),
            ResolveError::StreamUnavailable(reference) => {
                SessionError::StreamUnavailable(reference)
            }
            ResolveError::Backend(reason) => SessionError::StreamUnavailable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_transient_errors_are_recoverable() {
        assert!(PlaybackError::Network("reset".into()).is_recoverable());
        assert!(PlaybackError::Forbidden("expired".into()).is_recoverable());
        assert!(PlaybackError::Timeout("read".into()).is_recoverable());
        assert!(PlaybackError::Http("502".into()).is_recoverable());
    }

    #[test]
    fn untyped_errors_are_classified_by_keyword() {
        assert!(PlaybackError::from_message("Server returned 403 Forbidden").is_recoverable());
        assert!(PlaybackError::from_message("Connection reset by peer").is_recoverable());
        assert!(!PlaybackError::from_message("invalid data found when processing input").is_recoverable());
        assert!(!PlaybackError::Decode("corrupt frame".into()).is_recoverable());
    }

    #[test]
    fn resolve_not_found_maps_to_track_not_found() {
        let err: SessionError = ResolveError::NotFound("lofi".into()).into();
        assert_eq!(err, SessionError::TrackNotFound("lofi".into()));
        assert_eq!(err.to_string(), "No results found for your search: lofi");
    }
}
