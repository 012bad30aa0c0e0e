//! The chat-platform capability surface the core depends on.
//!
//! The bot crate implements [`Gateway`] over the real platform client;
//! [`crate::memory::MemoryGateway`] implements it in-process. Every method
//! is a suspension point that may fail independently of the others.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::ids::{ChannelId, GuildId, MemberId, MessageId, RoleId};

/// Failures reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The bot lacks the platform permission for this action.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// The referenced role, member, channel or message does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Other(String),
}

/// Who a channel permission overwrite applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    /// The guild's default role.
    Everyone,
    Role(RoleId),
}

/// A channel permission overwrite. `None` leaves the permission inherited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overwrite {
    pub send_messages: Option<bool>,
    pub view_channel: Option<bool>,
}

impl Overwrite {
    /// Only touches send permission.
    pub fn send(allowed: bool) -> Self {
        Self {
            send_messages: Some(allowed),
            view_channel: None,
        }
    }

    /// Sets send permission and keeps the channel visible.
    pub fn send_visible(allowed: bool) -> Self {
        Self {
            send_messages: Some(allowed),
            view_channel: Some(true),
        }
    }
}

/// Embed colors, matching the platform's stock palette.
pub mod color {
    pub const YELLOW: u32 = 0xFEE75C;
    pub const GOLD: u32 = 0xF1C40F;
    pub const RED: u32 = 0xE74C3C;
    pub const BLUE: u32 = 0x3498DB;
    pub const GREEN: u32 = 0x2ECC71;
}

/// A platform-neutral message. The gateway decides how to render it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notice {
    /// Plain text content shown above any embed.
    pub content: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    /// Name/value pairs, rendered one per line.
    pub fields: Vec<(String, String)>,
    pub image_url: Option<String>,
}

impl Notice {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn embed(title: impl Into<String>, description: impl Into<String>, color: u32) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
            color: Some(color),
            ..Self::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Whether this notice carries embed parts.
    pub fn is_embed(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || !self.fields.is_empty()
            || self.image_url.is_some()
    }
}

/// One reaction bucket on a fetched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionCount {
    pub emoji: String,
    /// Everyone who reacted, the bot included.
    pub count: u64,
    /// Whether the bot itself is among the reactors.
    pub me: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub id: MessageId,
    pub reactions: Vec<ReactionCount>,
}

/// A reaction added to or removed from a message by a guild member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub message: MessageId,
    pub emoji: String,
    pub member: MemberId,
    pub added: bool,
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn find_role_by_name(
        &self,
        guild: GuildId,
        name: &str,
    ) -> Result<Option<RoleId>, GatewayError>;

    async fn create_role(
        &self,
        guild: GuildId,
        name: &str,
        color: u32,
    ) -> Result<RoleId, GatewayError>;

    async fn add_member_role(
        &self,
        guild: GuildId,
        member: MemberId,
        role: RoleId,
    ) -> Result<(), GatewayError>;

    async fn remove_member_role(
        &self,
        guild: GuildId,
        member: MemberId,
        role: RoleId,
    ) -> Result<(), GatewayError>;

    async fn list_role_members(
        &self,
        guild: GuildId,
        role: RoleId,
    ) -> Result<BTreeSet<MemberId>, GatewayError>;

    /// Replace the overwrite for `subject` on `channel`.
    async fn set_channel_overwrite(
        &self,
        guild: GuildId,
        channel: ChannelId,
        subject: Subject,
        overwrite: Overwrite,
    ) -> Result<(), GatewayError>;

    async fn clear_channel_overwrite(
        &self,
        guild: GuildId,
        channel: ChannelId,
        subject: Subject,
    ) -> Result<(), GatewayError>;

    /// Some role carrying the administrator permission, if any exists.
    async fn find_administrator_role(&self, guild: GuildId)
    -> Result<Option<RoleId>, GatewayError>;

    async fn send_message(
        &self,
        channel: ChannelId,
        notice: &Notice,
    ) -> Result<MessageId, GatewayError>;

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        notice: &Notice,
    ) -> Result<(), GatewayError>;

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), GatewayError>;

    async fn fetch_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<FetchedMessage, GatewayError>;
}
