//! In-memory playback session registry.
//!
//! Maps guilds to their playback session and drives the immediate
//! idle-leave path when occupancy drops to zero.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use jukebox_types::LeaveReason;

use crate::config::SessionSettings;
use crate::events::EventBus;
use crate::idle::{IdleMonitor, idle_channel};
use crate::resolver::MediaResolver;
use crate::session::{PlaybackSession, SessionDeps};
use crate::transport::VoiceTransport;

pub struct SessionRegistry {
    deps: SessionDeps,
    sessions: Mutex<HashMap<u64, Arc<PlaybackSession>>>,
}

impl SessionRegistry {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            deps,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Build a registry with its idle monitor running.
    pub fn start(
        transport: Arc<dyn VoiceTransport>,
        resolver: Arc<dyn MediaResolver>,
        events: EventBus,
        settings: SessionSettings,
    ) -> Arc<Self> {
        let (idle, idle_rx) = idle_channel();
        let grace = settings.idle_grace;
        let registry = Arc::new(Self::new(SessionDeps {
            transport,
            resolver,
            events,
            idle,
            settings,
        }));
        IdleMonitor::spawn(Arc::downgrade(&registry), idle_rx, grace);
        registry
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<u64, Arc<PlaybackSession>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn events(&self) -> &EventBus {
        &self.deps.events
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.deps.settings
    }

    pub fn get_or_create(&self, guild_id: u64) -> Arc<PlaybackSession> {
        self.lock_sessions()
            .entry(guild_id)
            .or_insert_with(|| PlaybackSession::spawn(guild_id, self.deps.clone()))
            .clone()
    }

    pub fn get(&self, guild_id: u64) -> Option<Arc<PlaybackSession>> {
        self.lock_sessions().get(&guild_id).cloned()
    }

    pub fn guilds(&self) -> Vec<u64> {
        let mut guilds: Vec<u64> = self.lock_sessions().keys().copied().collect();
        guilds.sort_unstable();
        guilds
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_sessions().is_empty()
    }

    /// Leave the guild's channel and drop its session.
    ///
    /// No-op returning `false` when the guild has no connected session.
    pub async fn leave(&self, guild_id: u64, reason: LeaveReason) -> bool {
        let Some(session) = self.get(guild_id) else {
            return false;
        };
        let left = session.leave(reason).await;
        if left {
            let mut sessions = self.lock_sessions();
            let unchanged = sessions
                .get(&guild_id)
                .is_some_and(|entry| Arc::ptr_eq(entry, &session));
            // A command may have reconnected the session while it was leaving.
            if unchanged && session.connected_channel().is_none() {
                sessions.remove(&guild_id);
                tracing::info!(session_id = %session.id(), guild_id, "session removed");
            }
        }
        left
    }

    /// Human occupants of the guild's connected channel, if connected.
    pub async fn human_members(&self, guild_id: u64) -> Option<usize> {
        let channel = self.get(guild_id)?.connected_channel()?;
        Some(self.deps.transport.human_members(&channel).await)
    }

    /// React to a voice-state change in the guild. Leaves immediately when
    /// the last human has gone.
    pub async fn on_occupancy_changed(&self, guild_id: u64) -> bool {
        match self.human_members(guild_id).await {
            Some(0) => {
                tracing::info!(guild_id, "last occupant left; leaving now");
                self.leave(guild_id, LeaveReason::AllOccupantsLeft).await
            }
            _ => false,
        }
    }
}
