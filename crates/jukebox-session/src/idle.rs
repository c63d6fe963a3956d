//! Deferred idle-leave scheduling.
//!
//! Sessions post an `IdleCheck` when a track ends on its own. The monitor
//! checks occupancy, waits out a grace window, re-checks and leaves a channel
//! that is still empty.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use jukebox_types::LeaveReason;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::registry::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleCheck {
    pub guild_id: u64,
}

/// Sending half handed to sessions.
#[derive(Debug, Clone)]
pub struct IdleNotifier {
    tx: mpsc::UnboundedSender<IdleCheck>,
}

impl IdleNotifier {
    pub fn request(&self, guild_id: u64) {
        let _ = self.tx.send(IdleCheck { guild_id });
    }
}

pub fn idle_channel() -> (IdleNotifier, mpsc::UnboundedReceiver<IdleCheck>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IdleNotifier { tx }, rx)
}

pub struct IdleMonitor;

impl IdleMonitor {
    /// Run the monitor until every notifier is dropped or the registry goes
    /// away. Checks for a guild that already has one pending are coalesced.
    pub fn spawn(
        registry: Weak<SessionRegistry>,
        mut rx: mpsc::UnboundedReceiver<IdleCheck>,
        grace: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let pending: Arc<Mutex<HashSet<u64>>> = Arc::new(Mutex::new(HashSet::new()));
            while let Some(check) = rx.recv().await {
                if registry.strong_count() == 0 {
                    break;
                }
                let inserted = pending
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(check.guild_id);
                if !inserted {
                    tracing::debug!(guild_id = check.guild_id, "idle check already pending");
                    continue;
                }
                let registry = registry.clone();
                let pending = pending.clone();
                tokio::spawn(async move {
                    run_check(&registry, check.guild_id, grace).await;
                    pending
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .remove(&check.guild_id);
                });
            }
            tracing::debug!("idle monitor stopped");
        })
    }
}

async fn run_check(registry: &Weak<SessionRegistry>, guild_id: u64, grace: Duration) {
    let Some(humans) = occupancy(registry, guild_id).await else {
        return;
    };
    if humans > 0 {
        return;
    }
    tracing::info!(
        guild_id,
        grace_secs = grace.as_secs(),
        "voice channel empty; leaving after grace window"
    );
    tokio::time::sleep(grace).await;

    match occupancy(registry, guild_id).await {
        Some(0) => {
            if let Some(registry) = registry.upgrade() {
                registry
                    .leave(guild_id, LeaveReason::ChannelRemainedEmpty)
                    .await;
            }
        }
        Some(humans) => {
            tracing::info!(guild_id, humans, "occupants returned; staying");
        }
        None => {}
    }
}

async fn occupancy(registry: &Weak<SessionRegistry>, guild_id: u64) -> Option<usize> {
    let registry = registry.upgrade()?;
    registry.human_members(guild_id).await
}
