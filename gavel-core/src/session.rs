//! Debate-session state machine.
//!
//! A guild is in exactly one [`SessionKind`] at a time. Each transition runs
//! under the guild's lock and issues its platform writes in a fixed order:
//! role membership first, then channel overwrites, then the administrator
//! re-grant. The new kind is committed only after every write succeeded; on
//! the first failure the call returns and the committed state is untouched.
//!
//! Starting a session while a different kind is active is rejected. The
//! `End*` calls for Star, Refute and Intermission also run from `Idle`, so an
//! operator can clean up a channel left half-locked by an interrupted
//! transition.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::emoji::{self, Emoji};
use crate::error::{Result, SessionError};
use crate::gateway::{Gateway, Notice, Overwrite, ReactionEvent, Subject, color};
use crate::ids::{ChannelId, GuildId, MemberId, MessageId, RoleId, Scope};
use crate::registry::{GuildState, Registry};
use crate::roles::{RoleName, RoleReconciler};
use crate::vote::{self, ActiveVote, Ballot, Tally};

/// One of the two scrum teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    pub fn role(self) -> RoleName {
        match self {
            Side::A => RoleName::SideA,
            Side::B => RoleName::SideB,
        }
    }

    pub fn emoji(self) -> Emoji {
        match self {
            Side::A => Emoji::Blue,
            Side::B => Emoji::Red,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.role().as_str())
    }
}

/// The debate mode a guild is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionKind {
    #[default]
    Idle,
    Starred {
        channel: ChannelId,
        participant: MemberId,
    },
    Refuting {
        channel: ChannelId,
        participant_a: MemberId,
        participant_b: MemberId,
    },
    ScrumSetup {
        channel: ChannelId,
        side_a_role: RoleId,
        side_b_role: RoleId,
    },
    ScrumActive {
        channel: ChannelId,
        side_a_role: RoleId,
        side_b_role: RoleId,
        speaking_side: Side,
    },
    Intermission {
        channel: ChannelId,
    },
}

impl SessionKind {
    pub fn label(&self) -> &'static str {
        match self {
            SessionKind::Idle => "no session",
            SessionKind::Starred { .. } => "star session",
            SessionKind::Refuting { .. } => "rebuttal",
            SessionKind::ScrumSetup { .. } => "scrum debate team selection",
            SessionKind::ScrumActive { .. } => "scrum debate",
            SessionKind::Intermission { .. } => "intermission",
        }
    }

    pub fn channel(&self) -> Option<ChannelId> {
        match *self {
            SessionKind::Idle => None,
            SessionKind::Starred { channel, .. }
            | SessionKind::Refuting { channel, .. }
            | SessionKind::ScrumSetup { channel, .. }
            | SessionKind::ScrumActive { channel, .. }
            | SessionKind::Intermission { channel } => Some(channel),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionKind::Idle)
    }
}

/// The team-selection message of a scrum debate and its two roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrumTeams {
    pub setup_message: MessageId,
    pub channel: ChannelId,
    pub side_a_role: RoleId,
    pub side_b_role: RoleId,
    pub active: bool,
}

impl ScrumTeams {
    fn role(&self, side: Side) -> RoleId {
        match side {
            Side::A => self.side_a_role,
            Side::B => self.side_b_role,
        }
    }
}

/// Read-only view of a guild for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub kind: SessionKind,
    pub scrum: Option<ScrumTeams>,
    pub vote: Option<ActiveVote>,
}

fn busy(kind: &SessionKind) -> SessionError {
    SessionError::precondition(format!(
        "A {} is already in progress. End it first.",
        kind.label()
    ))
}

/// Where an `End*` call should act: the session's own channel when that
/// session is active, the invoking channel when cleaning up from idle.
fn cleanup_channel(kind: &SessionKind, scope: Scope) -> ChannelId {
    kind.channel().unwrap_or(scope.channel)
}

pub struct SessionManager {
    gateway: Arc<dyn Gateway>,
    roles: RoleReconciler,
    registry: Registry,
}

impl SessionManager {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            roles: RoleReconciler::new(),
            registry: Registry::new(),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    fn gw(&self) -> &dyn Gateway {
        self.gateway.as_ref()
    }

    pub async fn snapshot(&self, guild: GuildId) -> Snapshot {
        let state = self.registry.lock(guild).await;
        Snapshot {
            kind: state.kind,
            scrum: state.scrum,
            vote: state.vote.clone(),
        }
    }

    /// Forget everything about `guild` without touching the platform.
    pub async fn reset(&self, guild: GuildId) {
        let mut state = self.registry.lock(guild).await;
        if let Some(vote) = &state.vote {
            tracing::warn!(%guild, message = %vote.message, "Discarding unresolved vote");
        }
        *state = GuildState::default();
        tracing::info!(%guild, "Reset session state");
    }

    // ─── Channel overwrite helpers ──────────────────────────────────────

    async fn overwrite_everyone(&self, scope: Scope, overwrite: Overwrite) -> Result<()> {
        tracing::debug!(guild = %scope.guild, channel = %scope.channel, ?overwrite, "Overwrite @everyone");
        self.gw()
            .set_channel_overwrite(scope.guild, scope.channel, Subject::Everyone, overwrite)
            .await?;
        Ok(())
    }

    async fn overwrite_role(
        &self,
        scope: Scope,
        name: RoleName,
        role: RoleId,
        overwrite: Overwrite,
    ) -> Result<()> {
        tracing::debug!(guild = %scope.guild, channel = %scope.channel, role = %name, ?overwrite, "Overwrite role");
        self.gw()
            .set_channel_overwrite(scope.guild, scope.channel, Subject::Role(role), overwrite)
            .await
            .map_err(|e| self.roles.stale(scope.guild, name, e))
    }

    async fn clear_role_overwrite(&self, scope: Scope, name: RoleName, role: RoleId) -> Result<()> {
        self.gw()
            .clear_channel_overwrite(scope.guild, scope.channel, Subject::Role(role))
            .await
            .map_err(|e| self.roles.stale(scope.guild, name, e))
    }

    /// Empty a team role. A team role deleted by hand has no members left
    /// to remove.
    async fn clear_team(&self, guild: GuildId, side: Side, role: RoleId) -> Result<()> {
        match self
            .roles
            .reset_membership(self.gw(), guild, side.role(), role, &BTreeSet::new())
            .await
        {
            Err(SessionError::NotFound(detail)) => {
                tracing::warn!(%guild, %side, %detail, "Team role already gone");
                Ok(())
            }
            other => other,
        }
    }

    /// Current ids of both team roles, recreating any that was deleted.
    async fn team_roles(&self, guild: GuildId) -> Result<(RoleId, RoleId)> {
        let side_a_role = self.roles.ensure(self.gw(), guild, RoleName::SideA).await?;
        let side_b_role = self.roles.ensure(self.gw(), guild, RoleName::SideB).await?;
        Ok((side_a_role, side_b_role))
    }

    fn commit_team_roles(state: &mut GuildState, side_a_role: RoleId, side_b_role: RoleId) {
        if let Some(teams) = state.scrum.as_mut() {
            teams.side_a_role = side_a_role;
            teams.side_b_role = side_b_role;
        }
    }

    /// Keep administrators able to speak while the channel is locked.
    async fn regrant_admins(&self, scope: Scope, overwrite: Overwrite) -> Result<()> {
        match self.gw().find_administrator_role(scope.guild).await? {
            Some(admin) => {
                self.gw()
                    .set_channel_overwrite(scope.guild, scope.channel, Subject::Role(admin), overwrite)
                    .await?;
            }
            None => tracing::debug!(guild = %scope.guild, "No administrator role to re-grant"),
        }
        Ok(())
    }

    /// Store a freshly opened vote, replacing any unresolved one.
    fn store_vote(state: &mut GuildState, guild: GuildId, vote: ActiveVote) {
        if let Some(previous) = state.vote.replace(vote) {
            tracing::warn!(%guild, message = %previous.message, "Replaced unresolved vote");
        }
    }

    // ─── Star ───────────────────────────────────────────────────────────

    /// Make `participant` the only non-administrator allowed to speak.
    pub async fn start_star(&self, scope: Scope, participant: MemberId) -> Result<()> {
        let mut state = self.registry.lock(scope.guild).await;
        match state.kind {
            SessionKind::Idle => {}
            SessionKind::Starred { channel, .. } if channel == scope.channel => {}
            ref other => return Err(busy(other)),
        }

        let name = RoleName::StarredSpeaker;
        let role = self.roles.ensure(self.gw(), scope.guild, name).await?;
        self.roles
            .reset_membership(self.gw(), scope.guild, name, role, &BTreeSet::from([participant]))
            .await?;
        self.overwrite_everyone(scope, Overwrite::send(false)).await?;
        self.overwrite_role(scope, name, role, Overwrite::send(true)).await?;
        self.regrant_admins(scope, Overwrite::send(true)).await?;

        state.kind = SessionKind::Starred {
            channel: scope.channel,
            participant,
        };
        tracing::info!(guild = %scope.guild, channel = %scope.channel, %participant, "Star session started");
        Ok(())
    }

    pub async fn end_star(&self, scope: Scope) -> Result<()> {
        let mut state = self.registry.lock(scope.guild).await;
        if !matches!(state.kind, SessionKind::Idle | SessionKind::Starred { .. }) {
            return Err(busy(&state.kind));
        }
        let scope = Scope {
            channel: cleanup_channel(&state.kind, scope),
            ..scope
        };

        let name = RoleName::StarredSpeaker;
        let role = self
            .roles
            .lookup(self.gw(), scope.guild, name)
            .await?
            .ok_or_else(|| SessionError::precondition("No starred role found!"))?;
        self.roles
            .reset_membership(self.gw(), scope.guild, name, role, &BTreeSet::new())
            .await?;
        self.overwrite_everyone(scope, Overwrite::send(true)).await?;
        self.clear_role_overwrite(scope, name, role).await?;

        state.kind = SessionKind::Idle;
        tracing::info!(guild = %scope.guild, channel = %scope.channel, "Star session ended");
        Ok(())
    }

    // ─── Refute ─────────────────────────────────────────────────────────

    /// Restrict the channel to two refuters and administrators.
    pub async fn start_refute(&self, scope: Scope, a: MemberId, b: MemberId) -> Result<()> {
        if a == b {
            return Err(SessionError::precondition(
                "A rebuttal needs two different members!",
            ));
        }
        let mut state = self.registry.lock(scope.guild).await;
        match state.kind {
            SessionKind::Idle => {}
            SessionKind::Refuting { channel, .. } if channel == scope.channel => {}
            ref other => return Err(busy(other)),
        }

        let name = RoleName::Refuter;
        let role = self.roles.ensure(self.gw(), scope.guild, name).await?;
        self.roles
            .reset_membership(self.gw(), scope.guild, name, role, &BTreeSet::from([a, b]))
            .await?;
        self.overwrite_everyone(scope, Overwrite::send_visible(false)).await?;
        self.overwrite_role(scope, name, role, Overwrite::send_visible(true)).await?;
        self.regrant_admins(scope, Overwrite::send_visible(true)).await?;

        state.kind = SessionKind::Refuting {
            channel: scope.channel,
            participant_a: a,
            participant_b: b,
        };
        tracing::info!(guild = %scope.guild, channel = %scope.channel, %a, %b, "Rebuttal started");
        Ok(())
    }

    /// Unlock the channel and open a vote between the two refuters.
    ///
    /// An active rebuttal votes on its own pair; from `Idle` the Refuter
    /// role must hold exactly two members.
    pub async fn end_refute(&self, scope: Scope) -> Result<ActiveVote> {
        let mut state = self.registry.lock(scope.guild).await;
        if !matches!(state.kind, SessionKind::Idle | SessionKind::Refuting { .. }) {
            return Err(busy(&state.kind));
        }
        let scope = Scope {
            channel: cleanup_channel(&state.kind, scope),
            ..scope
        };

        let name = RoleName::Refuter;
        let role = self.roles.lookup(self.gw(), scope.guild, name).await?;
        let (participant_a, participant_b) = match state.kind {
            // The session remembers its pair; a retry after a failed vote
            // post finds the role already emptied.
            SessionKind::Refuting {
                participant_a,
                participant_b,
                ..
            } => {
                let holders = match role {
                    Some(role) => self.roles.holders(self.gw(), scope.guild, name, role).await?,
                    None => BTreeSet::new(),
                };
                if !holders.is_subset(&BTreeSet::from([participant_a, participant_b])) {
                    tracing::warn!(guild = %scope.guild, holders = holders.len(), "Refusing to end rebuttal");
                    return Err(SessionError::precondition("Could not find exactly 2 refuters!"));
                }
                (participant_a, participant_b)
            }
            _ => {
                let role = role.ok_or_else(|| SessionError::precondition("No refuter role found!"))?;
                let holders = self.roles.holders(self.gw(), scope.guild, name, role).await?;
                let mut members = holders.iter().copied();
                match (members.next(), members.next(), members.next()) {
                    (Some(a), Some(b), None) => (a, b),
                    _ => {
                        tracing::warn!(guild = %scope.guild, holders = holders.len(), "Refusing to end rebuttal");
                        return Err(SessionError::precondition("Could not find exactly 2 refuters!"));
                    }
                }
            }
        };

        if let Some(role) = role {
            self.roles
                .reset_membership(self.gw(), scope.guild, name, role, &BTreeSet::new())
                .await?;
        }
        self.overwrite_everyone(scope, Overwrite::send_visible(true)).await?;
        if let Some(role) = role {
            self.clear_role_overwrite(scope, name, role).await?;
        }
        let vote = vote::open(
            self.gw(),
            scope.channel,
            Ballot::Refute {
                participant_a,
                participant_b,
            },
        )
        .await?;

        Self::store_vote(&mut state, scope.guild, vote.clone());
        state.kind = SessionKind::Idle;
        tracing::info!(guild = %scope.guild, channel = %scope.channel, "Rebuttal ended");
        Ok(vote)
    }

    // ─── Scrum debate ───────────────────────────────────────────────────

    /// Post the team-selection prompt. Channel permissions are untouched
    /// until [`begin_scrum`](Self::begin_scrum).
    pub async fn start_scrum(&self, scope: Scope) -> Result<MessageId> {
        let mut state = self.registry.lock(scope.guild).await;
        match state.kind {
            SessionKind::Idle => {}
            SessionKind::ScrumSetup { channel, .. } if channel == scope.channel => {}
            ref other => return Err(busy(other)),
        }

        let side_a_role = self.roles.ensure(self.gw(), scope.guild, RoleName::SideA).await?;
        let side_b_role = self.roles.ensure(self.gw(), scope.guild, RoleName::SideB).await?;
        let prompt = Notice::embed(
            "🗣️ SCRUM DEBATE TEAM SELECTION",
            format!(
                "React to join your side:\n\n\
                 {} - Side A\n{} - Side B\n\n\
                 The debate will begin once an administrator starts it.",
                Emoji::Blue,
                Emoji::Red,
            ),
            color::GOLD,
        );
        let setup_message = self.gw().send_message(scope.channel, &prompt).await?;
        for team in emoji::TEAMS {
            self.gw()
                .add_reaction(scope.channel, setup_message, team.as_str())
                .await?;
        }

        state.scrum = Some(ScrumTeams {
            setup_message,
            channel: scope.channel,
            side_a_role,
            side_b_role,
            active: false,
        });
        state.kind = SessionKind::ScrumSetup {
            channel: scope.channel,
            side_a_role,
            side_b_role,
        };
        tracing::info!(guild = %scope.guild, channel = %scope.channel, %setup_message, "Scrum debate set up");
        Ok(setup_message)
    }

    /// Give Side A the floor and mute Side B.
    pub async fn begin_scrum(&self, scope: Scope) -> Result<()> {
        let mut state = self.registry.lock(scope.guild).await;
        let channel = match state.kind {
            SessionKind::ScrumSetup { channel, .. } => channel,
            SessionKind::ScrumActive { .. } => {
                return Err(SessionError::precondition(
                    "The Scrum Debate has already started!",
                ));
            }
            _ => {
                return Err(SessionError::precondition(
                    "No Scrum Debate has been set up! Open team selection first.",
                ));
            }
        };
        let scope = Scope { channel, ..scope };
        let (side_a_role, side_b_role) = self.team_roles(scope.guild).await?;

        self.overwrite_role(scope, RoleName::SideA, side_a_role, Overwrite::send_visible(true))
            .await?;
        self.overwrite_role(scope, RoleName::SideB, side_b_role, Overwrite::send_visible(false))
            .await?;

        Self::commit_team_roles(&mut state, side_a_role, side_b_role);
        if let Some(teams) = state.scrum.as_mut() {
            teams.active = true;
        }
        state.kind = SessionKind::ScrumActive {
            channel,
            side_a_role,
            side_b_role,
            speaking_side: Side::A,
        };
        tracing::info!(guild = %scope.guild, %channel, "Scrum debate started");
        Ok(())
    }

    /// Hand the floor to the other team. Returns the side now speaking.
    pub async fn swap_scrum_side(&self, scope: Scope) -> Result<Side> {
        let mut state = self.registry.lock(scope.guild).await;
        let SessionKind::ScrumActive {
            channel,
            speaking_side,
            ..
        } = state.kind
        else {
            return Err(SessionError::precondition("No active Scrum Debate found!"));
        };
        let scope = Scope { channel, ..scope };
        let (side_a_role, side_b_role) = self.team_roles(scope.guild).await?;
        let role_of = |side: Side| match side {
            Side::A => side_a_role,
            Side::B => side_b_role,
        };

        let next = speaking_side.other();
        self.overwrite_role(
            scope,
            speaking_side.role(),
            role_of(speaking_side),
            Overwrite::send_visible(false),
        )
        .await?;
        self.overwrite_role(scope, next.role(), role_of(next), Overwrite::send_visible(true))
            .await?;

        Self::commit_team_roles(&mut state, side_a_role, side_b_role);
        state.kind = SessionKind::ScrumActive {
            channel,
            side_a_role,
            side_b_role,
            speaking_side: next,
        };
        tracing::info!(guild = %scope.guild, %channel, side = %next, "Scrum sides swapped");
        Ok(next)
    }

    /// Clear both teams and open a vote between them.
    pub async fn end_scrum(&self, scope: Scope) -> Result<ActiveVote> {
        let mut state = self.registry.lock(scope.guild).await;
        let SessionKind::ScrumActive {
            channel,
            side_a_role,
            side_b_role,
            ..
        } = state.kind
        else {
            return Err(SessionError::precondition("No active Scrum Debate found!"));
        };
        let scope = Scope { channel, ..scope };

        for (side, role) in [(Side::A, side_a_role), (Side::B, side_b_role)] {
            self.clear_role_overwrite(scope, side.role(), role).await?;
        }
        for (side, role) in [(Side::A, side_a_role), (Side::B, side_b_role)] {
            self.clear_team(scope.guild, side, role).await?;
        }
        let vote = vote::open(
            self.gw(),
            channel,
            Ballot::Scrum {
                side_a_role,
                side_b_role,
            },
        )
        .await?;

        Self::store_vote(&mut state, scope.guild, vote.clone());
        if let Some(teams) = state.scrum.as_mut() {
            teams.active = false;
        }
        state.kind = SessionKind::Idle;
        tracing::info!(guild = %scope.guild, %channel, "Scrum debate ended");
        Ok(vote)
    }

    /// Team selection: reacting with a team's emoji on the setup message
    /// joins that team and leaves the other; removing it leaves the team.
    pub async fn on_reaction(&self, event: &ReactionEvent) -> Result<()> {
        let state = self.registry.lock(event.guild).await;
        let Some(teams) = state.scrum else {
            return Ok(());
        };
        if teams.setup_message != event.message {
            return Ok(());
        }
        if !matches!(
            state.kind,
            SessionKind::ScrumSetup { .. } | SessionKind::ScrumActive { .. }
        ) {
            tracing::debug!(guild = %event.guild, "Ignoring reaction on a finished scrum debate");
            return Ok(());
        }
        let Some(side) = Emoji::parse(&event.emoji).and_then(Emoji::team) else {
            return Ok(());
        };

        let guild = event.guild;
        let member = event.member;
        if event.added {
            self.gw()
                .add_member_role(guild, member, teams.role(side))
                .await
                .map_err(|e| self.roles.stale(guild, side.role(), e))?;
            let other = side.other();
            self.gw()
                .remove_member_role(guild, member, teams.role(other))
                .await
                .map_err(|e| self.roles.stale(guild, other.role(), e))?;
            tracing::info!(%guild, %member, %side, "Member joined team");
        } else {
            self.gw()
                .remove_member_role(guild, member, teams.role(side))
                .await
                .map_err(|e| self.roles.stale(guild, side.role(), e))?;
            tracing::info!(%guild, %member, %side, "Member left team");
        }
        Ok(())
    }

    // ─── Intermission ───────────────────────────────────────────────────

    /// Lock the channel for everyone except administrators.
    pub async fn start_intermission(&self, scope: Scope) -> Result<()> {
        let mut state = self.registry.lock(scope.guild).await;
        match state.kind {
            SessionKind::Idle => {}
            SessionKind::Intermission { channel } if channel == scope.channel => {}
            ref other => return Err(busy(other)),
        }

        self.overwrite_everyone(scope, Overwrite::send_visible(false)).await?;
        self.regrant_admins(scope, Overwrite::send_visible(true)).await?;

        state.kind = SessionKind::Intermission {
            channel: scope.channel,
        };
        tracing::info!(guild = %scope.guild, channel = %scope.channel, "Intermission started");
        Ok(())
    }

    pub async fn end_intermission(&self, scope: Scope) -> Result<()> {
        let mut state = self.registry.lock(scope.guild).await;
        if !matches!(state.kind, SessionKind::Idle | SessionKind::Intermission { .. }) {
            return Err(busy(&state.kind));
        }
        let scope = Scope {
            channel: cleanup_channel(&state.kind, scope),
            ..scope
        };

        self.overwrite_everyone(scope, Overwrite::send_visible(true)).await?;

        state.kind = SessionKind::Idle;
        tracing::info!(guild = %scope.guild, channel = %scope.channel, "Intermission ended");
        Ok(())
    }

    // ─── Votes ──────────────────────────────────────────────────────────

    /// Count and consume the guild's pending vote.
    pub async fn resolve_vote(&self, guild: GuildId) -> Result<Tally> {
        let mut state = self.registry.lock(guild).await;
        vote::resolve(self.gw(), &mut state.vote).await
    }
}
