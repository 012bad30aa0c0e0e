//! Per-guild state registry.
//!
//! Entries are created on first use and never removed; ending a session
//! resets fields instead. Each entry sits behind its own async mutex, held
//! for the whole of a transition, so commands for one guild are serialized
//! while different guilds proceed independently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::ids::GuildId;
use crate::session::{ScrumTeams, SessionKind};
use crate::vote::ActiveVote;

/// Everything the core remembers about one guild.
#[derive(Debug, Default)]
pub struct GuildState {
    pub kind: SessionKind,
    /// Team-selection record of the latest scrum debate. Kept after the
    /// debate ends until the guild is reset.
    pub scrum: Option<ScrumTeams>,
    pub vote: Option<ActiveVote>,
}

#[derive(Default)]
pub struct Registry {
    guilds: DashMap<GuildId, Arc<Mutex<GuildState>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, guild: GuildId) -> Arc<Mutex<GuildState>> {
        self.guilds.entry(guild).or_default().clone()
    }

    /// Wait for exclusive access to `guild`'s state.
    pub async fn lock(&self, guild: GuildId) -> OwnedMutexGuard<GuildState> {
        self.entry(guild).lock_owned().await
    }

    /// Number of guilds seen so far.
    pub fn len(&self) -> usize {
        self.guilds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guilds.is_empty()
    }
}
