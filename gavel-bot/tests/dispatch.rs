//! Command dispatch tests against the in-memory gateway.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use gavel_bot::bot::{Bot, Invocation};
use gavel_bot::commands;
use gavel_bot::topic::ChannelTopics;
use gavel_catalog::Catalog;
use gavel_core::emoji::Emoji;
use gavel_core::gateway::Subject;
use gavel_core::memory::{MemoryGateway, Op};
use gavel_core::{
    ChannelId, GatewayError, GuildId, MemberId, Notice, ReactionEvent, Scope, SessionKind,
};
use parking_lot::Mutex;

const GUILD: GuildId = GuildId(42);
const CHANNEL: ChannelId = ChannelId(7);
const ADMIN: MemberId = MemberId(10);
const ALICE: MemberId = MemberId(100);
const BOB: MemberId = MemberId(200);

#[derive(Default)]
struct MemoryTopics {
    topics: Mutex<HashMap<ChannelId, String>>,
}

#[async_trait]
impl ChannelTopics for MemoryTopics {
    async fn topic(&self, channel: ChannelId) -> Result<Option<String>, GatewayError> {
        Ok(self.topics.lock().get(&channel).cloned())
    }

    async fn set_topic(&self, channel: ChannelId, topic: &str) -> Result<(), GatewayError> {
        self.topics.lock().insert(channel, topic.to_string());
        Ok(())
    }
}

struct Harness {
    gw: Arc<MemoryGateway>,
    topics: Arc<MemoryTopics>,
    bot: Bot,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let gw = Arc::new(MemoryGateway::new());
        let topics = Arc::new(MemoryTopics::default());
        let catalog = Catalog::open(dir.path()).unwrap();
        let bot = Bot::new(gw.clone(), topics.clone(), catalog, "!");
        Self {
            gw,
            topics,
            bot,
            _dir: dir,
        }
    }

    async fn send_as(&self, author: MemberId, is_admin: bool, content: &str, attachment: Option<&str>) {
        let parsed = commands::parse(self.bot.prefix(), content).expect("a command");
        let invocation = Invocation {
            scope: Scope {
                guild: GUILD,
                channel: CHANNEL,
            },
            author,
            is_admin,
            attachment: attachment.map(str::to_string),
        };
        self.bot.dispatch(&invocation, parsed).await;
    }

    async fn admin(&self, content: &str) {
        self.send_as(ADMIN, true, content, None).await;
    }

    fn last(&self) -> Notice {
        self.gw
            .messages_in(CHANNEL)
            .pop()
            .map(|(_, notice)| notice)
            .expect("a reply")
    }

    fn replies(&self) -> Vec<Notice> {
        self.gw
            .messages_in(CHANNEL)
            .into_iter()
            .map(|(_, notice)| notice)
            .collect()
    }
}

#[tokio::test]
async fn non_admins_are_turned_away() {
    let h = Harness::new();
    h.send_as(ALICE, false, "!star <@100>", None).await;

    assert_eq!(
        h.last().content.as_deref(),
        Some("You don't have permission to use this command. Administrator permission is required.")
    );
    assert_eq!(h.gw.role_named(GUILD, "Starred Speaker"), None);
    assert_eq!(h.bot.sessions().snapshot(GUILD).await.kind, SessionKind::Idle);
}

#[tokio::test]
async fn read_only_commands_need_no_permission() {
    let h = Harness::new();
    h.send_as(ALICE, false, "!status", None).await;
    assert_eq!(h.last().title.as_deref(), Some("📋 SESSION STATUS"));

    h.send_as(ALICE, false, "!help", None).await;
    assert_eq!(h.last().title.as_deref(), Some("📖 COMMANDS"));
}

#[tokio::test]
async fn unknown_commands_point_at_help() {
    let h = Harness::new();
    h.send_as(ALICE, false, "!dance", None).await;
    assert_eq!(
        h.last().content.as_deref(),
        Some("Command not found. Use !help to see available commands.")
    );
}

#[tokio::test]
async fn progress_message_is_edited_with_the_outcome() {
    let h = Harness::new();
    h.admin("!star <@100>").await;

    let replies = h.replies();
    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0].content.as_deref(),
        Some("✅ <@100> has been starred! Only they and administrators can speak now.")
    );
    assert!(matches!(
        h.bot.sessions().snapshot(GUILD).await.kind,
        SessionKind::Starred { .. }
    ));
}

#[tokio::test]
async fn failures_replace_the_progress_message() {
    let h = Harness::new();
    h.admin("!star <@100>").await;
    h.admin("!intermission").await;

    let replies = h.replies();
    assert_eq!(replies.len(), 2);
    assert_eq!(
        replies[1].content.as_deref(),
        Some("❌ A star session is already in progress. End it first.")
    );
}

#[tokio::test]
async fn progress_is_posted_fresh_when_the_edit_fails() {
    let h = Harness::new();
    h.gw.fail(Op::EditMessage, GatewayError::Other("gateway hiccup".into()));
    h.admin("!intermission").await;

    let replies = h.replies();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].content.as_deref(), Some("🔄 Starting intermission..."));
    assert_eq!(replies[1].title.as_deref(), Some("⏸️ INTERMISSION"));
}

#[tokio::test]
async fn rebuttal_through_to_results() {
    let h = Harness::new();
    h.admin("!refute <@100> <@!200>").await;
    assert_eq!(h.last().title.as_deref(), Some("⚔️ REBUTTAL IN PROGRESS"));

    h.admin("!endrefute").await;
    let vote = h.bot.sessions().snapshot(GUILD).await.vote.expect("a vote");
    for voter in [1001, 1002, 1003] {
        h.gw.react(vote.message, Emoji::Two.as_str(), MemberId(voter));
    }
    h.gw.react(vote.message, Emoji::One.as_str(), MemberId(1004));

    h.admin("!endvote").await;
    let result = h.last();
    assert_eq!(result.title.as_deref(), Some("🏆 REBUTTAL RESULTS"));
    assert_eq!(
        result.description.as_deref(),
        Some("**Winner: <@200>**\n\n<@100>: 1 votes\n<@200>: 3 votes")
    );

    h.admin("!endvote").await;
    assert_eq!(h.last().content.as_deref(), Some("❌ No active vote found!"));
}

#[tokio::test]
async fn scrum_debate_flow() {
    let h = Harness::new();
    h.admin("!scrumdebate").await;
    let setup = h.bot.sessions().snapshot(GUILD).await.scrum.expect("teams").setup_message;

    h.bot
        .on_reaction(&ReactionEvent {
            guild: GUILD,
            channel: CHANNEL,
            message: setup,
            emoji: Emoji::Red.as_str().to_string(),
            member: ALICE,
            added: true,
        })
        .await;
    let side_b = h.gw.role_named(GUILD, "Side B").unwrap();
    assert!(h.gw.holders(GUILD, side_b).contains(&ALICE));

    h.admin("!startscrum").await;
    assert_eq!(h.last().title.as_deref(), Some("🗣️ SCRUM DEBATE STARTED"));

    h.admin("!swap").await;
    let swapped = h.last();
    assert_eq!(swapped.title.as_deref(), Some("🔄 SIDES SWAPPED"));
    assert_eq!(
        swapped.description.as_deref(),
        Some("Side B can now speak. Side A is muted.")
    );

    h.admin("!endscrum").await;
    assert!(h.gw.holders(GUILD, side_b).is_empty());

    h.admin("!endvote").await;
    assert_eq!(h.last().title.as_deref(), Some("🤝 SCRUM DEBATE RESULTS - TIE"));
}

#[tokio::test]
async fn forced_topic_set_replace_and_clear() {
    let h = Harness::new();
    h.topics
        .set_topic(CHANNEL, "Class trial room")
        .await
        .unwrap();

    h.admin("!topic Who broke the window?").await;
    assert_eq!(
        h.last().content.as_deref(),
        Some("✅ Forced topic set to: Who broke the window?")
    );
    h.admin("!topic The motive").await;
    assert_eq!(
        h.topics.topic(CHANNEL).await.unwrap().as_deref(),
        Some("Class trial room\n\n【FORCED TOPIC】\nThe motive")
    );

    h.admin("!cleartopic").await;
    assert_eq!(
        h.topics.topic(CHANNEL).await.unwrap().as_deref(),
        Some("Class trial room")
    );

    h.admin("!cleartopic").await;
    assert_eq!(
        h.last().content.as_deref(),
        Some("❌ No forced topic found in channel description!")
    );
}

#[tokio::test]
async fn overlong_topics_are_refused() {
    let h = Harness::new();
    h.admin(&format!("!topic {}", "x".repeat(1100))).await;
    assert!(h.last().content.unwrap().starts_with("❌ That topic is too long."));
    assert_eq!(h.topics.topic(CHANNEL).await.unwrap(), None);
}

#[tokio::test]
async fn truth_bullet_commands() {
    let h = Harness::new();
    h.send_as(
        ADMIN,
        true,
        "!addbullet Knife Found under the sink",
        Some("https://cdn.example/knife.png"),
    )
    .await;
    let added = h.last();
    assert_eq!(added.title.as_deref(), Some("Truth Bullet #1: Knife"));
    assert_eq!(added.image_url.as_deref(), Some("https://cdn.example/knife.png"));

    h.send_as(ALICE, false, "!bullet knife", None).await;
    assert_eq!(h.last().description.as_deref(), Some("Found under the sink"));

    h.send_as(ALICE, false, "!bullets", None).await;
    let listing = h.last();
    assert_eq!(listing.title.as_deref(), Some("Truth Bullets"));
    assert_eq!(listing.fields.len(), 1);

    h.send_as(ALICE, false, "!removebullet 1", None).await;
    assert!(h.last().content.unwrap().starts_with("You don't have permission"));

    h.admin("!removebullet 1").await;
    assert_eq!(h.last().content.as_deref(), Some("✅ Removed truth bullet #1: Knife"));

    h.send_as(ALICE, false, "!bullets", None).await;
    assert_eq!(h.last().content.as_deref(), Some("No truth bullets found!"));

    h.send_as(ALICE, false, "!bullet 1", None).await;
    assert_eq!(h.last().content.as_deref(), Some("❌ Truth bullet not found!"));
}

#[tokio::test]
async fn reset_clears_state_without_touching_permissions() {
    let h = Harness::new();
    h.admin("!star <@100>").await;
    h.gw.clear_journal();

    h.admin("!reset").await;

    assert_eq!(h.bot.sessions().snapshot(GUILD).await.kind, SessionKind::Idle);
    assert!(h.gw.overwrite(CHANNEL, Subject::Everyone).is_some());
    assert_eq!(h.gw.journal().len(), 1, "only the confirmation was sent");
}

#[tokio::test]
async fn ping_reports_latency() {
    let h = Harness::new();
    h.send_as(BOB, false, "!ping", None).await;
    let reply = h.last().content.unwrap();
    assert!(reply.starts_with("Pong! Latency: "), "{reply}");
    assert!(reply.ends_with("ms"));
}
