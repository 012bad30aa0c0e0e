//! [`Gateway`] and [`ChannelTopics`] over Discord's REST API.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use gavel_core::gateway::{FetchedMessage, Overwrite, ReactionCount, Subject};
use gavel_core::{ChannelId, Gateway, GatewayError, GuildId, MemberId, MessageId, Notice, RoleId};
use serenity::all as dc;

use crate::topic::ChannelTopics;

/// Audit-log reason attached to every change the bot makes.
const REASON: &str = "Trial moderation";

/// Discord's page size for the member listing.
const MEMBER_PAGE: u64 = 1000;

pub struct SerenityGateway {
    http: Arc<dc::Http>,
}

impl SerenityGateway {
    pub fn new(http: Arc<dc::Http>) -> Self {
        Self { http }
    }

    async fn roles(
        &self,
        guild: GuildId,
    ) -> Result<std::collections::HashMap<dc::RoleId, dc::Role>, GatewayError> {
        to_guild(guild).roles(&self.http).await.map_err(classify)
    }
}

// ─── Conversions ────────────────────────────────────────────────────────

fn to_guild(id: GuildId) -> dc::GuildId {
    dc::GuildId::new(id.get())
}

fn to_channel(id: ChannelId) -> dc::ChannelId {
    dc::ChannelId::new(id.get())
}

fn to_role(id: RoleId) -> dc::RoleId {
    dc::RoleId::new(id.get())
}

fn to_user(id: MemberId) -> dc::UserId {
    dc::UserId::new(id.get())
}

fn to_message(id: MessageId) -> dc::MessageId {
    dc::MessageId::new(id.get())
}

/// Map a serenity error onto the core taxonomy by HTTP status.
pub fn classify(err: serenity::Error) -> GatewayError {
    let status = match &err {
        serenity::Error::Http(http) => http.status_code().map(|s| s.as_u16()),
        _ => None,
    };
    match status {
        Some(403) => GatewayError::Forbidden(err.to_string()),
        Some(404) => GatewayError::NotFound(err.to_string()),
        _ => GatewayError::Other(err.to_string()),
    }
}

/// Split an overwrite into Discord's (allow, deny) bitsets.
pub fn permission_bits(overwrite: Overwrite) -> (dc::Permissions, dc::Permissions) {
    let mut allow = dc::Permissions::empty();
    let mut deny = dc::Permissions::empty();
    for (setting, bit) in [
        (overwrite.send_messages, dc::Permissions::SEND_MESSAGES),
        (overwrite.view_channel, dc::Permissions::VIEW_CHANNEL),
    ] {
        match setting {
            Some(true) => allow |= bit,
            Some(false) => deny |= bit,
            None => {}
        }
    }
    (allow, deny)
}

/// The @everyone role shares the guild's id.
fn overwrite_target(guild: GuildId, subject: Subject) -> dc::PermissionOverwriteType {
    match subject {
        Subject::Everyone => dc::PermissionOverwriteType::Role(dc::RoleId::new(guild.get())),
        Subject::Role(role) => dc::PermissionOverwriteType::Role(to_role(role)),
    }
}

fn embed(notice: &Notice) -> Option<dc::CreateEmbed> {
    if !notice.is_embed() {
        return None;
    }
    let mut embed = dc::CreateEmbed::new();
    if let Some(title) = &notice.title {
        embed = embed.title(title);
    }
    if let Some(description) = &notice.description {
        embed = embed.description(description);
    }
    if let Some(color) = notice.color {
        embed = embed.colour(color);
    }
    for (name, value) in &notice.fields {
        embed = embed.field(name, value, false);
    }
    if let Some(url) = &notice.image_url {
        embed = embed.image(url);
    }
    Some(embed)
}

fn create_message(notice: &Notice) -> dc::CreateMessage {
    let mut message = dc::CreateMessage::new();
    if let Some(content) = &notice.content {
        message = message.content(content);
    }
    if let Some(embed) = embed(notice) {
        message = message.embed(embed);
    }
    message
}

/// Edits replace both parts, so a progress line disappears when the outcome
/// is an embed and vice versa.
fn edit_message(notice: &Notice) -> dc::EditMessage {
    let message = dc::EditMessage::new().content(notice.content.clone().unwrap_or_default());
    match embed(notice) {
        Some(embed) => message.embed(embed),
        None => message.embeds(Vec::new()),
    }
}

fn emoji_text(reaction: &dc::ReactionType) -> String {
    match reaction {
        dc::ReactionType::Unicode(text) => text.clone(),
        other => other.to_string(),
    }
}

// ─── Gateway ────────────────────────────────────────────────────────────

#[async_trait]
impl Gateway for SerenityGateway {
    async fn find_role_by_name(
        &self,
        guild: GuildId,
        name: &str,
    ) -> Result<Option<RoleId>, GatewayError> {
        let roles = self.roles(guild).await?;
        Ok(roles
            .values()
            .filter(|role| role.name == name)
            .map(|role| RoleId(role.id.get()))
            .min())
    }

    async fn create_role(
        &self,
        guild: GuildId,
        name: &str,
        color: u32,
    ) -> Result<RoleId, GatewayError> {
        let builder = dc::EditRole::new()
            .name(name)
            .colour(color)
            .audit_log_reason(REASON);
        let role = to_guild(guild)
            .create_role(&self.http, builder)
            .await
            .map_err(classify)?;
        Ok(RoleId(role.id.get()))
    }

    async fn add_member_role(
        &self,
        guild: GuildId,
        member: MemberId,
        role: RoleId,
    ) -> Result<(), GatewayError> {
        self.http
            .add_member_role(to_guild(guild), to_user(member), to_role(role), Some(REASON))
            .await
            .map_err(classify)
    }

    async fn remove_member_role(
        &self,
        guild: GuildId,
        member: MemberId,
        role: RoleId,
    ) -> Result<(), GatewayError> {
        self.http
            .remove_member_role(to_guild(guild), to_user(member), to_role(role), Some(REASON))
            .await
            .map_err(classify)
    }

    async fn list_role_members(
        &self,
        guild: GuildId,
        role: RoleId,
    ) -> Result<BTreeSet<MemberId>, GatewayError> {
        let target = to_role(role);
        if !self.roles(guild).await?.contains_key(&target) {
            return Err(GatewayError::NotFound(format!("role {role}")));
        }
        let mut holders = BTreeSet::new();
        let mut after: Option<dc::UserId> = None;
        loop {
            let page = to_guild(guild)
                .members(&self.http, Some(MEMBER_PAGE), after)
                .await
                .map_err(classify)?;
            holders.extend(
                page.iter()
                    .filter(|member| member.roles.contains(&target))
                    .map(|member| MemberId(member.user.id.get())),
            );
            match page.last() {
                Some(last) if page.len() as u64 == MEMBER_PAGE => after = Some(last.user.id),
                _ => break,
            }
        }
        Ok(holders)
    }

    async fn set_channel_overwrite(
        &self,
        guild: GuildId,
        channel: ChannelId,
        subject: Subject,
        overwrite: Overwrite,
    ) -> Result<(), GatewayError> {
        let (allow, deny) = permission_bits(overwrite);
        let target = dc::PermissionOverwrite {
            allow,
            deny,
            kind: overwrite_target(guild, subject),
        };
        to_channel(channel)
            .create_permission(&self.http, target)
            .await
            .map_err(classify)
    }

    async fn clear_channel_overwrite(
        &self,
        guild: GuildId,
        channel: ChannelId,
        subject: Subject,
    ) -> Result<(), GatewayError> {
        match to_channel(channel)
            .delete_permission(&self.http, overwrite_target(guild, subject))
            .await
            .map_err(classify)
        {
            // Already gone.
            Err(GatewayError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    async fn find_administrator_role(
        &self,
        guild: GuildId,
    ) -> Result<Option<RoleId>, GatewayError> {
        let everyone = dc::RoleId::new(guild.get());
        let roles = self.roles(guild).await?;
        Ok(roles
            .values()
            .filter(|role| role.id != everyone && role.permissions.administrator())
            .min_by_key(|role| (role.position, role.id))
            .map(|role| RoleId(role.id.get())))
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        notice: &Notice,
    ) -> Result<MessageId, GatewayError> {
        let message = to_channel(channel)
            .send_message(&self.http, create_message(notice))
            .await
            .map_err(classify)?;
        Ok(MessageId(message.id.get()))
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        notice: &Notice,
    ) -> Result<(), GatewayError> {
        to_channel(channel)
            .edit_message(&self.http, to_message(message), edit_message(notice))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), GatewayError> {
        to_channel(channel)
            .create_reaction(
                &self.http,
                to_message(message),
                dc::ReactionType::Unicode(emoji.to_string()),
            )
            .await
            .map_err(classify)
    }

    async fn fetch_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<FetchedMessage, GatewayError> {
        let fetched = to_channel(channel)
            .message(&self.http, to_message(message))
            .await
            .map_err(classify)?;
        Ok(FetchedMessage {
            id: message,
            reactions: fetched
                .reactions
                .iter()
                .map(|reaction| ReactionCount {
                    emoji: emoji_text(&reaction.reaction_type),
                    count: reaction.count,
                    me: reaction.me,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl ChannelTopics for SerenityGateway {
    async fn topic(&self, channel: ChannelId) -> Result<Option<String>, GatewayError> {
        let channel = to_channel(channel)
            .to_channel(&self.http)
            .await
            .map_err(classify)?;
        Ok(channel.guild().and_then(|guild_channel| guild_channel.topic))
    }

    async fn set_topic(&self, channel: ChannelId, topic: &str) -> Result<(), GatewayError> {
        to_channel(channel)
            .edit(
                &self.http,
                dc::EditChannel::new().topic(topic).audit_log_reason(REASON),
            )
            .await
            .map_err(classify)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_bits_leave_unset_permissions_inherited() {
        let (allow, deny) = permission_bits(Overwrite::send(false));
        assert!(allow.is_empty());
        assert_eq!(deny, dc::Permissions::SEND_MESSAGES);

        let (allow, deny) = permission_bits(Overwrite::send_visible(true));
        assert_eq!(
            allow,
            dc::Permissions::SEND_MESSAGES | dc::Permissions::VIEW_CHANNEL
        );
        assert!(deny.is_empty());

        let (allow, deny) = permission_bits(Overwrite::send_visible(false));
        assert_eq!(allow, dc::Permissions::VIEW_CHANNEL);
        assert_eq!(deny, dc::Permissions::SEND_MESSAGES);
    }

    #[test]
    fn everyone_overwrite_targets_the_guild_role() {
        assert_eq!(
            overwrite_target(GuildId(77), Subject::Everyone),
            dc::PermissionOverwriteType::Role(dc::RoleId::new(77))
        );
        assert_eq!(
            overwrite_target(GuildId(77), Subject::Role(RoleId(5))),
            dc::PermissionOverwriteType::Role(dc::RoleId::new(5))
        );
    }

    #[test]
    fn unicode_reactions_keep_their_text() {
        assert_eq!(
            emoji_text(&dc::ReactionType::Unicode("🔵".into())),
            "🔵"
        );
    }
}
