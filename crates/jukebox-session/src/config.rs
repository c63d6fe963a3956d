//! Configuration loading and parsing.
//!
//! Defines the jukebox config schema and resolves defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use jukebox_types::{ChannelRef, RequesterId};
use serde::Deserialize;

use crate::queue::DEFAULT_HISTORY_LIMIT;

/// Top-level configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct JukeboxConfig {
    /// Session tuning.
    pub session: Option<SessionConfig>,
    /// Console driver identity.
    pub console: Option<ConsoleConfig>,
    /// Tracks served by the catalog resolver.
    pub catalog: Option<Vec<CatalogEntry>>,
}

/// Session tuning from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    /// Tracks kept for "go back" (default: 10).
    pub history_limit: Option<usize>,
    /// Volume applied to new sessions, 0-100 (default: 50).
    pub default_volume: Option<u8>,
    /// Delay before a failed stream is restarted (default: 1000).
    pub recovery_delay_ms: Option<u64>,
    /// Pause between stopping and restarting a stream on seek (default: 100).
    pub seek_settle_ms: Option<u64>,
    /// Grace window before leaving an empty channel (default: 30).
    pub idle_grace_secs: Option<u64>,
    /// Start the queue head when a track ends naturally (default: false).
    pub auto_advance: Option<bool>,
    /// Step used by forward/backward without an argument (default: 10).
    pub seek_step_secs: Option<u64>,
}

/// Console driver identity from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct ConsoleConfig {
    pub guild_id: Option<u64>,
    pub channel_id: Option<u64>,
    /// Voice channel display name.
    pub channel_name: Option<String>,
    /// Text channel named in leave notifications.
    pub text_channel: Option<String>,
    pub user_id: Option<u64>,
    /// Simulated human occupants at startup (default: 1).
    pub occupants: Option<usize>,
}

/// Catalog entry from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    /// Resolver handle stored on the track.
    pub stream_reference: String,
    /// Playable URI handed to the transport.
    pub uri: String,
    pub duration_secs: Option<u64>,
    pub thumbnail_uri: Option<String>,
}

/// Resolved session settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub history_limit: usize,
    pub default_volume: u8,
    pub recovery_delay: Duration,
    pub seek_settle: Duration,
    pub idle_grace: Duration,
    pub auto_advance: bool,
    pub seek_step_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            default_volume: 50,
            recovery_delay: Duration::from_millis(1000),
            seek_settle: Duration::from_millis(100),
            idle_grace: Duration::from_secs(30),
            auto_advance: false,
            seek_step_secs: 10,
        }
    }
}

/// Resolved console identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleSettings {
    pub voice_channel: ChannelRef,
    pub text_channel: String,
    pub requester: RequesterId,
    pub occupants: usize,
}

impl JukeboxConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg = toml::from_str::<JukeboxConfig>(&raw)
            .with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

/// Resolve session settings, applying defaults for missing keys.
pub fn session_settings_from_config(cfg: &JukeboxConfig) -> Result<SessionSettings> {
    let defaults = SessionSettings::default();
    let Some(section) = cfg.session.as_ref() else {
        return Ok(defaults);
    };
    let default_volume = section.default_volume.unwrap_or(defaults.default_volume);
    if default_volume > 100 {
        anyhow::bail!("session.default_volume must be between 0 and 100, got {default_volume}");
    }
    let history_limit = section.history_limit.unwrap_or(defaults.history_limit);
    if history_limit == 0 {
        anyhow::bail!("session.history_limit must be at least 1");
    }
    Ok(SessionSettings {
        history_limit,
        default_volume,
        recovery_delay: section
            .recovery_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.recovery_delay),
        seek_settle: section
            .seek_settle_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.seek_settle),
        idle_grace: section
            .idle_grace_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.idle_grace),
        auto_advance: section.auto_advance.unwrap_or(defaults.auto_advance),
        seek_step_secs: section.seek_step_secs.unwrap_or(defaults.seek_step_secs),
    })
}

/// Resolve the console identity.
pub fn console_settings_from_config(cfg: &JukeboxConfig) -> ConsoleSettings {
    let console = cfg.console.as_ref();
    let guild_id = console.and_then(|c| c.guild_id).unwrap_or(1);
    let channel_id = console.and_then(|c| c.channel_id).unwrap_or(1);
    let name = console
        .and_then(|c| c.channel_name.clone())
        .unwrap_or_else(|| "General".to_string());
    ConsoleSettings {
        voice_channel: ChannelRef {
            guild_id,
            channel_id,
            name,
        },
        text_channel: console
            .and_then(|c| c.text_channel.clone())
            .unwrap_or_else(|| "#music".to_string()),
        requester: RequesterId(console.and_then(|c| c.user_id).unwrap_or(1)),
        occupants: console.and_then(|c| c.occupants).unwrap_or(1),
    }
}

/// Catalog entries, empty when the table is absent.
pub fn catalog_from_config(cfg: &JukeboxConfig) -> Vec<CatalogEntry> {
    cfg.catalog.clone().unwrap_or_default()
}
