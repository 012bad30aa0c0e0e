//! In-process gateway: a small simulated guild.
//!
//! Keeps roles, member role assignments, channel overwrites, messages and
//! reactions in memory, records every write in a journal, and can be told
//! to fail specific operations. Used by the test suites of every crate.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::gateway::{
    FetchedMessage, Gateway, GatewayError, Notice, Overwrite, ReactionCount, Subject,
};
use crate::ids::{ChannelId, GuildId, MemberId, MessageId, RoleId};

/// Which gateway operation a failure is injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FindRole,
    CreateRole,
    AddMemberRole,
    RemoveMemberRole,
    ListRoleMembers,
    SetOverwrite,
    ClearOverwrite,
    FindAdminRole,
    SendMessage,
    EditMessage,
    AddReaction,
    FetchMessage,
}

/// A platform write, in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateRole { guild: GuildId, name: String },
    AddMemberRole { member: MemberId, role: RoleId },
    RemoveMemberRole { member: MemberId, role: RoleId },
    SetOverwrite { channel: ChannelId, subject: Subject, overwrite: Overwrite },
    ClearOverwrite { channel: ChannelId, subject: Subject },
    SendMessage { channel: ChannelId, message: MessageId },
    EditMessage { message: MessageId },
    AddReaction { message: MessageId, emoji: String },
}

#[derive(Debug, Clone)]
struct Role {
    name: String,
    color: u32,
    administrator: bool,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    channel: ChannelId,
    notice: Notice,
    reactions: Vec<(String, BTreeSet<MemberId>)>,
}

#[derive(Default)]
struct World {
    next_id: u64,
    roles: HashMap<GuildId, BTreeMap<RoleId, Role>>,
    members: HashMap<GuildId, BTreeMap<MemberId, BTreeSet<RoleId>>>,
    overwrites: HashMap<(ChannelId, Subject), Overwrite>,
    messages: BTreeMap<MessageId, StoredMessage>,
    failures: HashMap<Op, GatewayError>,
    journal: Vec<Call>,
}

impl World {
    fn mint(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, op: Op) -> Result<(), GatewayError> {
        match self.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn role_exists(&self, guild: GuildId, role: RoleId) -> bool {
        self.roles
            .get(&guild)
            .is_some_and(|roles| roles.contains_key(&role))
    }
}

/// Simulated platform. Identity of the bot itself is [`MemoryGateway::BOT`].
pub struct MemoryGateway {
    world: Mutex<World>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    /// The bot's own member id; reactions added through the gateway use it.
    pub const BOT: MemberId = MemberId(1);

    pub fn new() -> Self {
        Self {
            world: Mutex::new(World {
                next_id: 1000,
                ..World::default()
            }),
        }
    }

    /// Register a member in a guild.
    pub fn add_member(&self, guild: GuildId, member: MemberId) {
        self.world
            .lock()
            .members
            .entry(guild)
            .or_default()
            .entry(member)
            .or_default();
    }

    /// Create a role with the administrator permission.
    pub fn add_admin_role(&self, guild: GuildId, name: &str) -> RoleId {
        self.seed_role(guild, name, true)
    }

    /// Create a plain role as if a moderator made it by hand.
    pub fn add_role(&self, guild: GuildId, name: &str) -> RoleId {
        self.seed_role(guild, name, false)
    }

    fn seed_role(&self, guild: GuildId, name: &str, administrator: bool) -> RoleId {
        let mut world = self.world.lock();
        let id = RoleId(world.mint());
        world.roles.entry(guild).or_default().insert(
            id,
            Role {
                name: name.to_string(),
                color: 0,
                administrator,
            },
        );
        id
    }

    /// Delete a role as if a moderator removed it by hand.
    pub fn delete_role(&self, guild: GuildId, role: RoleId) {
        let mut world = self.world.lock();
        if let Some(roles) = world.roles.get_mut(&guild) {
            roles.remove(&role);
        }
        if let Some(members) = world.members.get_mut(&guild) {
            for held in members.values_mut() {
                held.remove(&role);
            }
        }
        world.overwrites.retain(|(_, subject), _| *subject != Subject::Role(role));
    }

    /// Assign a role directly, bypassing the journal (an outside actor).
    pub fn grant(&self, guild: GuildId, member: MemberId, role: RoleId) {
        self.world
            .lock()
            .members
            .entry(guild)
            .or_default()
            .entry(member)
            .or_default()
            .insert(role);
    }

    pub fn delete_message(&self, message: MessageId) {
        self.world.lock().messages.remove(&message);
    }

    /// React to a message as `member`.
    pub fn react(&self, message: MessageId, emoji: &str, member: MemberId) {
        let mut world = self.world.lock();
        if let Some(stored) = world.messages.get_mut(&message) {
            match stored.reactions.iter_mut().find(|(e, _)| e == emoji) {
                Some((_, reactors)) => {
                    reactors.insert(member);
                }
                None => stored
                    .reactions
                    .push((emoji.to_string(), BTreeSet::from([member]))),
            }
        }
    }

    pub fn unreact(&self, message: MessageId, emoji: &str, member: MemberId) {
        let mut world = self.world.lock();
        if let Some(stored) = world.messages.get_mut(&message) {
            if let Some((_, reactors)) = stored.reactions.iter_mut().find(|(e, _)| e == emoji) {
                reactors.remove(&member);
            }
            stored.reactions.retain(|(_, reactors)| !reactors.is_empty());
        }
    }

    /// Make every subsequent call of `op` fail with `err` until [`heal`](Self::heal).
    pub fn fail(&self, op: Op, err: GatewayError) {
        self.world.lock().failures.insert(op, err);
    }

    pub fn heal(&self) {
        self.world.lock().failures.clear();
    }

    pub fn role_named(&self, guild: GuildId, name: &str) -> Option<RoleId> {
        self.world.lock().roles.get(&guild).and_then(|roles| {
            roles
                .iter()
                .find(|(_, role)| role.name == name)
                .map(|(id, _)| *id)
        })
    }

    pub fn role_color(&self, guild: GuildId, role: RoleId) -> Option<u32> {
        self.world
            .lock()
            .roles
            .get(&guild)
            .and_then(|roles| roles.get(&role))
            .map(|role| role.color)
    }

    pub fn holders(&self, guild: GuildId, role: RoleId) -> BTreeSet<MemberId> {
        self.world
            .lock()
            .members
            .get(&guild)
            .map(|members| {
                members
                    .iter()
                    .filter(|(_, held)| held.contains(&role))
                    .map(|(member, _)| *member)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn overwrite(&self, channel: ChannelId, subject: Subject) -> Option<Overwrite> {
        self.world.lock().overwrites.get(&(channel, subject)).copied()
    }

    /// Messages posted to `channel`, oldest first.
    pub fn messages_in(&self, channel: ChannelId) -> Vec<(MessageId, Notice)> {
        self.world
            .lock()
            .messages
            .iter()
            .filter(|(_, stored)| stored.channel == channel)
            .map(|(id, stored)| (*id, stored.notice.clone()))
            .collect()
    }

    pub fn message(&self, message: MessageId) -> Option<Notice> {
        self.world
            .lock()
            .messages
            .get(&message)
            .map(|stored| stored.notice.clone())
    }

    pub fn reactors(&self, message: MessageId, emoji: &str) -> BTreeSet<MemberId> {
        self.world
            .lock()
            .messages
            .get(&message)
            .and_then(|stored| stored.reactions.iter().find(|(e, _)| e == emoji))
            .map(|(_, reactors)| reactors.clone())
            .unwrap_or_default()
    }

    pub fn journal(&self) -> Vec<Call> {
        self.world.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.world.lock().journal.clear();
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn find_role_by_name(
        &self,
        guild: GuildId,
        name: &str,
    ) -> Result<Option<RoleId>, GatewayError> {
        self.world.lock().check(Op::FindRole)?;
        Ok(self.role_named(guild, name))
    }

    async fn create_role(
        &self,
        guild: GuildId,
        name: &str,
        color: u32,
    ) -> Result<RoleId, GatewayError> {
        let mut world = self.world.lock();
        world.check(Op::CreateRole)?;
        let id = RoleId(world.mint());
        world.roles.entry(guild).or_default().insert(
            id,
            Role {
                name: name.to_string(),
                color,
                administrator: false,
            },
        );
        world.journal.push(Call::CreateRole {
            guild,
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn add_member_role(
        &self,
        guild: GuildId,
        member: MemberId,
        role: RoleId,
    ) -> Result<(), GatewayError> {
        let mut world = self.world.lock();
        world.check(Op::AddMemberRole)?;
        if !world.role_exists(guild, role) {
            return Err(GatewayError::NotFound(format!("role {role}")));
        }
        world
            .members
            .entry(guild)
            .or_default()
            .entry(member)
            .or_default()
            .insert(role);
        world.journal.push(Call::AddMemberRole { member, role });
        Ok(())
    }

    async fn remove_member_role(
        &self,
        guild: GuildId,
        member: MemberId,
        role: RoleId,
    ) -> Result<(), GatewayError> {
        let mut world = self.world.lock();
        world.check(Op::RemoveMemberRole)?;
        if !world.role_exists(guild, role) {
            return Err(GatewayError::NotFound(format!("role {role}")));
        }
        if let Some(held) = world
            .members
            .get_mut(&guild)
            .and_then(|members| members.get_mut(&member))
        {
            held.remove(&role);
        }
        world.journal.push(Call::RemoveMemberRole { member, role });
        Ok(())
    }

    async fn list_role_members(
        &self,
        guild: GuildId,
        role: RoleId,
    ) -> Result<BTreeSet<MemberId>, GatewayError> {
        {
            let world = self.world.lock();
            world.check(Op::ListRoleMembers)?;
            if !world.role_exists(guild, role) {
                return Err(GatewayError::NotFound(format!("role {role}")));
            }
        }
        Ok(self.holders(guild, role))
    }

    async fn set_channel_overwrite(
        &self,
        guild: GuildId,
        channel: ChannelId,
        subject: Subject,
        overwrite: Overwrite,
    ) -> Result<(), GatewayError> {
        let mut world = self.world.lock();
        world.check(Op::SetOverwrite)?;
        if let Subject::Role(role) = subject {
            if !world.role_exists(guild, role) {
                return Err(GatewayError::NotFound(format!("role {role}")));
            }
        }
        world.overwrites.insert((channel, subject), overwrite);
        world.journal.push(Call::SetOverwrite {
            channel,
            subject,
            overwrite,
        });
        Ok(())
    }

    async fn clear_channel_overwrite(
        &self,
        _guild: GuildId,
        channel: ChannelId,
        subject: Subject,
    ) -> Result<(), GatewayError> {
        let mut world = self.world.lock();
        world.check(Op::ClearOverwrite)?;
        world.overwrites.remove(&(channel, subject));
        world.journal.push(Call::ClearOverwrite { channel, subject });
        Ok(())
    }

    async fn find_administrator_role(
        &self,
        guild: GuildId,
    ) -> Result<Option<RoleId>, GatewayError> {
        let world = self.world.lock();
        world.check(Op::FindAdminRole)?;
        Ok(world.roles.get(&guild).and_then(|roles| {
            roles
                .iter()
                .find(|(_, role)| role.administrator)
                .map(|(id, _)| *id)
        }))
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        notice: &Notice,
    ) -> Result<MessageId, GatewayError> {
        let mut world = self.world.lock();
        world.check(Op::SendMessage)?;
        let id = MessageId(world.mint());
        world.messages.insert(
            id,
            StoredMessage {
                channel,
                notice: notice.clone(),
                reactions: Vec::new(),
            },
        );
        world.journal.push(Call::SendMessage {
            channel,
            message: id,
        });
        Ok(id)
    }

    async fn edit_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
        notice: &Notice,
    ) -> Result<(), GatewayError> {
        let mut world = self.world.lock();
        world.check(Op::EditMessage)?;
        let stored = world
            .messages
            .get_mut(&message)
            .ok_or_else(|| GatewayError::NotFound(format!("message {message}")))?;
        stored.notice = notice.clone();
        world.journal.push(Call::EditMessage { message });
        Ok(())
    }

    async fn add_reaction(
        &self,
        _channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), GatewayError> {
        {
            let mut world = self.world.lock();
            world.check(Op::AddReaction)?;
            if !world.messages.contains_key(&message) {
                return Err(GatewayError::NotFound(format!("message {message}")));
            }
            world.journal.push(Call::AddReaction {
                message,
                emoji: emoji.to_string(),
            });
        }
        self.react(message, emoji, Self::BOT);
        Ok(())
    }

    async fn fetch_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
    ) -> Result<FetchedMessage, GatewayError> {
        let world = self.world.lock();
        world.check(Op::FetchMessage)?;
        let stored = world
            .messages
            .get(&message)
            .ok_or_else(|| GatewayError::NotFound(format!("message {message}")))?;
        Ok(FetchedMessage {
            id: message,
            reactions: stored
                .reactions
                .iter()
                .map(|(emoji, reactors)| ReactionCount {
                    emoji: emoji.clone(),
                    count: reactors.len() as u64,
                    me: reactors.contains(&Self::BOT),
                })
                .collect(),
        })
    }
}
