//! Command dispatch.
//!
//! Platform-agnostic: replies go through the core [`Gateway`], channel
//! descriptions through [`ChannelTopics`]. The Discord event handler only
//! decodes events and hands them over.

use std::sync::Arc;
use std::time::Instant;

use gavel_catalog::Catalog;
use gavel_core::{
    ChannelId, Gateway, MemberId, MessageId, Notice, ReactionEvent, Scope, SessionError,
    SessionManager,
};

use crate::commands::{Command, ParseError};
use crate::render;
use crate::topic::{self, ChannelTopics};

/// Who sent a command, and where.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub scope: Scope,
    pub author: MemberId,
    /// Whether the author holds the administrator permission. Only
    /// computed for commands that need it.
    pub is_admin: bool,
    /// URL of the first attachment on the command message.
    pub attachment: Option<String>,
}

pub struct Bot {
    sessions: SessionManager,
    topics: Arc<dyn ChannelTopics>,
    catalog: Catalog,
    prefix: String,
}

impl Bot {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        topics: Arc<dyn ChannelTopics>,
        catalog: Catalog,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            sessions: SessionManager::new(gateway),
            topics,
            catalog,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn gw(&self) -> &dyn Gateway {
        self.sessions.gateway().as_ref()
    }

    // ─── Replies ────────────────────────────────────────────────────────

    async fn say(&self, channel: ChannelId, notice: Notice) -> Option<MessageId> {
        match self.gw().send_message(channel, &notice).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(%channel, "Failed to send reply: {e}");
                None
            }
        }
    }

    async fn reply(&self, channel: ChannelId, outcome: Result<Notice, SessionError>) {
        let notice = outcome.unwrap_or_else(|e| render::failure(&e));
        self.say(channel, notice).await;
    }

    /// Replace a progress message with the outcome, or post the outcome if
    /// the progress message could not be sent or edited.
    async fn finish(
        &self,
        channel: ChannelId,
        progress: Option<MessageId>,
        outcome: Result<Notice, SessionError>,
    ) {
        if let Err(e) = &outcome {
            tracing::warn!(%channel, "Command failed: {e}");
        }
        let notice = outcome.unwrap_or_else(|e| render::failure(&e));
        if let Some(message) = progress {
            match self.gw().edit_message(channel, message, &notice).await {
                Ok(()) => return,
                Err(e) => tracing::warn!(%channel, %message, "Failed to edit progress message: {e}"),
            }
        }
        self.say(channel, notice).await;
    }

    /// Run a session transition behind a "🔄 ..." message that is edited in
    /// place with its outcome.
    async fn with_progress<F>(&self, channel: ChannelId, text: &str, op: F)
    where
        F: Future<Output = Result<Notice, SessionError>>,
    {
        let progress = self.say(channel, render::progress(text)).await;
        let outcome = op.await;
        self.finish(channel, progress, outcome).await;
    }

    // ─── Events ─────────────────────────────────────────────────────────

    pub async fn dispatch(&self, inv: &Invocation, parsed: Result<Command, ParseError>) {
        let channel = inv.scope.channel;
        let command = match parsed {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(guild = %inv.scope.guild, %channel, "Bad command: {e}");
                self.say(channel, render::parse_error(&e, &self.prefix)).await;
                return;
            }
        };
        if command.requires_admin() && !inv.is_admin {
            tracing::warn!(
                guild = %inv.scope.guild,
                author = %inv.author,
                command = command.name(),
                "Rejected command from non-administrator"
            );
            self.say(channel, render::not_admin()).await;
            return;
        }
        tracing::info!(
            guild = %inv.scope.guild,
            %channel,
            author = %inv.author,
            command = command.name(),
            "Running command"
        );
        self.run(inv, command).await;
    }

    async fn run(&self, inv: &Invocation, command: Command) {
        let scope = inv.scope;
        let channel = scope.channel;
        let sessions = &self.sessions;
        match command {
            Command::Star(member) => {
                self.with_progress(channel, "Starting star process...", async {
                    sessions.start_star(scope, member).await?;
                    Ok(render::starred(member))
                })
                .await
            }
            Command::Unstar => {
                self.with_progress(channel, "Removing star status...", async {
                    sessions.end_star(scope).await?;
                    Ok(render::unstarred())
                })
                .await
            }
            Command::Refute(a, b) => {
                self.with_progress(channel, "Setting up rebuttal...", async {
                    sessions.start_refute(scope, a, b).await?;
                    Ok(render::rebuttal_started(a, b))
                })
                .await
            }
            Command::EndRefute => {
                self.with_progress(channel, "Ending rebuttal...", async {
                    sessions.end_refute(scope).await?;
                    Ok(render::rebuttal_ended())
                })
                .await
            }
            Command::ScrumDebate => {
                self.with_progress(channel, "Setting up Scrum Debate...", async {
                    sessions.start_scrum(scope).await?;
                    Ok(render::scrum_opened(&self.prefix))
                })
                .await
            }
            Command::StartScrum => {
                let outcome = sessions.begin_scrum(scope).await;
                self.reply(channel, outcome.map(|()| render::scrum_started(&self.prefix)))
                    .await
            }
            Command::Swap => {
                let outcome = sessions.swap_scrum_side(scope).await;
                self.reply(channel, outcome.map(render::sides_swapped)).await
            }
            Command::EndScrum => {
                self.with_progress(channel, "Ending Scrum Debate...", async {
                    sessions.end_scrum(scope).await?;
                    Ok(render::scrum_ended())
                })
                .await
            }
            Command::EndVote => {
                let outcome = sessions.resolve_vote(scope.guild).await;
                self.reply(channel, outcome.map(|tally| render::tally(&tally)))
                    .await
            }
            Command::Intermission => {
                self.with_progress(channel, "Starting intermission...", async {
                    sessions.start_intermission(scope).await?;
                    Ok(render::intermission())
                })
                .await
            }
            Command::Resume => {
                self.with_progress(channel, "Ending intermission...", async {
                    sessions.end_intermission(scope).await?;
                    Ok(render::resumed())
                })
                .await
            }
            Command::Topic(text) => {
                let outcome = self.set_forced_topic(channel, &text).await;
                self.reply(channel, outcome).await
            }
            Command::ClearTopic => {
                let outcome = self.clear_forced_topic(channel).await;
                self.reply(channel, outcome).await
            }
            Command::AddBullet { name, description } => {
                let notice = match self.catalog.add(
                    scope.guild,
                    &name,
                    &description,
                    inv.attachment.clone(),
                ) {
                    Ok(bullet) => render::bullet(&bullet),
                    Err(e) => catalog_failure(e),
                };
                self.say(channel, notice).await;
            }
            Command::RemoveBullet(identifier) => {
                let notice = match self.catalog.get(scope.guild, &identifier) {
                    Ok(Some(bullet)) => match self.catalog.remove(scope.guild, bullet.id) {
                        Ok(true) => render::done(format!(
                            "Removed truth bullet #{}: {}",
                            bullet.id, bullet.name
                        )),
                        Ok(false) => Notice::text("❌ Failed to remove truth bullet!"),
                        Err(e) => catalog_failure(e),
                    },
                    Ok(None) => Notice::text("❌ Truth bullet not found!"),
                    Err(e) => catalog_failure(e),
                };
                self.say(channel, notice).await;
            }
            Command::Bullet(identifier) => {
                let notice = match self.catalog.get(scope.guild, &identifier) {
                    Ok(Some(bullet)) => render::bullet(&bullet),
                    Ok(None) => Notice::text("❌ Truth bullet not found!"),
                    Err(e) => catalog_failure(e),
                };
                self.say(channel, notice).await;
            }
            Command::Bullets => match self.catalog.list(scope.guild) {
                Ok(bullets) if bullets.is_empty() => {
                    self.say(channel, Notice::text("No truth bullets found!")).await;
                }
                Ok(bullets) => {
                    for page in render::bullet_list(&bullets) {
                        self.say(channel, page).await;
                    }
                }
                Err(e) => {
                    self.say(channel, catalog_failure(e)).await;
                }
            },
            Command::Ping => {
                let started = Instant::now();
                if let Some(message) = self.say(channel, Notice::text("Pong!")).await {
                    let latency = started.elapsed().as_millis();
                    let notice = Notice::text(format!("Pong! Latency: {latency}ms"));
                    if let Err(e) = self.gw().edit_message(channel, message, &notice).await {
                        tracing::warn!(%channel, "Failed to edit ping reply: {e}");
                    }
                }
            }
            Command::Help => {
                self.say(channel, render::help(&self.prefix)).await;
            }
            Command::Status => {
                let snapshot = sessions.snapshot(scope.guild).await;
                self.say(channel, render::status(&snapshot)).await;
            }
            Command::Reset => {
                sessions.reset(scope.guild).await;
                self.say(
                    channel,
                    render::done(
                        "Session state for this server has been reset. \
                         Channel permissions were left as they are.",
                    ),
                )
                .await;
            }
        }
    }

    /// Team selection. Reactions by the bot itself must be filtered out by
    /// the caller.
    pub async fn on_reaction(&self, event: &ReactionEvent) {
        if let Err(e) = self.sessions.on_reaction(event).await {
            tracing::warn!(
                guild = %event.guild,
                member = %event.member,
                message = %event.message,
                "Team selection failed: {e}"
            );
        }
    }

    // ─── Topic ──────────────────────────────────────────────────────────

    async fn set_forced_topic(&self, channel: ChannelId, text: &str) -> Result<Notice, SessionError> {
        let current = self.topics.topic(channel).await?.unwrap_or_default();
        let updated = topic::with_forced_topic(&current, text);
        if updated.chars().count() > topic::MAX_TOPIC_CHARS {
            return Err(SessionError::precondition(format!(
                "That topic is too long. Channel descriptions are limited to {} characters.",
                topic::MAX_TOPIC_CHARS
            )));
        }
        self.topics.set_topic(channel, &updated).await?;
        tracing::info!(%channel, "Forced topic set");
        Ok(render::done(format!("Forced topic set to: {text}")))
    }

    async fn clear_forced_topic(&self, channel: ChannelId) -> Result<Notice, SessionError> {
        let current = self.topics.topic(channel).await?.unwrap_or_default();
        let Some(updated) = topic::without_forced_topic(&current) else {
            return Err(SessionError::precondition(
                "No forced topic found in channel description!",
            ));
        };
        self.topics.set_topic(channel, &updated).await?;
        tracing::info!(%channel, "Forced topic cleared");
        Ok(render::done("Forced topic has been cleared!"))
    }
}

fn catalog_failure(err: gavel_catalog::CatalogError) -> Notice {
    tracing::error!("Truth bullet catalog error: {err}");
    Notice::text(format!("❌ {err}"))
}
