//! Voice-channel playback sessions.
//!
//! A `SessionRegistry` holds one `PlaybackSession` per guild. Sessions talk
//! to the outside world through the `VoiceTransport` and `MediaResolver`
//! traits and publish notifications on an `EventBus`.

pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod idle;
pub mod loopback;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use error::{PlaybackError, ResolveError, SessionError, TransportError};
pub use registry::SessionRegistry;
pub use session::{PlayOutcome, PlayRequest, PlaybackSession, SeekOutcome, SkipOutcome};
