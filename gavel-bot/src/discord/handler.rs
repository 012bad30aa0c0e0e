//! Discord gateway events → [`Bot`].

use std::sync::Arc;

use gavel_core::{ChannelId, GuildId, MemberId, MessageId, ReactionEvent, Scope};
use serenity::all as dc;
use serenity::async_trait;

use super::gateway::classify;
use crate::bot::{Bot, Invocation};
use crate::commands;

pub struct Handler {
    bot: Arc<Bot>,
}

impl Handler {
    pub fn new(bot: Arc<Bot>) -> Self {
        Self { bot }
    }

    /// Guild owner, or any held role (including @everyone) grants
    /// administrator.
    async fn is_administrator(
        &self,
        ctx: &dc::Context,
        msg: &dc::Message,
        guild: dc::GuildId,
    ) -> Result<bool, serenity::Error> {
        let cached = ctx
            .cache
            .guild(guild)
            .map(|g| (g.owner_id, g.roles.clone()));
        let (owner, roles) = match cached {
            Some(found) => found,
            None => {
                let partial = guild.to_partial_guild(&ctx.http).await?;
                (partial.owner_id, partial.roles)
            }
        };
        let held = match &msg.member {
            Some(member) => member.roles.clone(),
            None => guild.member(&ctx.http, msg.author.id).await?.roles,
        };
        let everyone = dc::RoleId::new(guild.get());
        let permissions = std::iter::once(everyone)
            .chain(held)
            .filter_map(|id| roles.get(&id).map(|role| role.permissions));
        Ok(grants_administrator(owner == msg.author.id, permissions))
    }

    async fn forward_reaction(&self, ctx: &dc::Context, reaction: &dc::Reaction, added: bool) {
        let (Some(guild), Some(user)) = (reaction.guild_id, reaction.user_id) else {
            return;
        };
        if user == ctx.cache.current_user().id {
            return;
        }
        let event = ReactionEvent {
            guild: GuildId(guild.get()),
            channel: ChannelId(reaction.channel_id.get()),
            message: MessageId(reaction.message_id.get()),
            emoji: match &reaction.emoji {
                dc::ReactionType::Unicode(text) => text.clone(),
                other => other.to_string(),
            },
            member: MemberId(user.get()),
            added,
        };
        self.bot.on_reaction(&event).await;
    }
}

pub fn grants_administrator(
    is_owner: bool,
    permissions: impl IntoIterator<Item = dc::Permissions>,
) -> bool {
    is_owner || permissions.into_iter().any(|p| p.administrator())
}

#[async_trait]
impl dc::EventHandler for Handler {
    async fn ready(&self, _ctx: dc::Context, ready: dc::Ready) {
        tracing::info!(
            user = %ready.user.name,
            guilds = ready.guilds.len(),
            "Connected to Discord"
        );
    }

    async fn message(&self, ctx: dc::Context, msg: dc::Message) {
        if msg.author.bot {
            return;
        }
        let Some(guild) = msg.guild_id else {
            return;
        };
        let Some(parsed) = commands::parse(self.bot.prefix(), &msg.content) else {
            return;
        };

        let needs_admin = matches!(&parsed, Ok(command) if command.requires_admin());
        let is_admin = if needs_admin {
            match self.is_administrator(&ctx, &msg, guild).await {
                Ok(is_admin) => is_admin,
                Err(e) => {
                    tracing::warn!(%guild, author = %msg.author.id, "Permission lookup failed: {}", classify(e));
                    false
                }
            }
        } else {
            false
        };

        let invocation = Invocation {
            scope: Scope::new(guild.get(), msg.channel_id.get()),
            author: MemberId(msg.author.id.get()),
            is_admin,
            attachment: msg.attachments.first().map(|a| a.url.clone()),
        };
        self.bot.dispatch(&invocation, parsed).await;
    }

    async fn reaction_add(&self, ctx: dc::Context, reaction: dc::Reaction) {
        self.forward_reaction(&ctx, &reaction, true).await;
    }

    async fn reaction_remove(&self, ctx: dc::Context, reaction: dc::Reaction) {
        self.forward_reaction(&ctx, &reaction, false).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_always_administrator() {
        assert!(grants_administrator(true, []));
    }

    #[test]
    fn any_administrator_role_counts() {
        let plain = dc::Permissions::SEND_MESSAGES | dc::Permissions::VIEW_CHANNEL;
        assert!(!grants_administrator(false, [plain]));
        assert!(grants_administrator(
            false,
            [plain, dc::Permissions::ADMINISTRATOR]
        ));
    }
}
