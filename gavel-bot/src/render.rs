//! User-facing messages.
//!
//! Everything here builds [`Notice`]s; the Discord adapter turns them into
//! embeds. Kept free of I/O so the wording is testable.

use gavel_catalog::TruthBullet;
use gavel_core::gateway::color;
use gavel_core::session::ScrumTeams;
use gavel_core::{Ballot, MemberId, Notice, SessionError, SessionKind, Side, Snapshot, Tally, Winner};

use crate::commands::ParseError;

/// Longest description shown in the bullet listing before truncation.
const PREVIEW_CHARS: usize = 100;

/// Discord allows at most this many fields per embed.
const FIELDS_PER_EMBED: usize = 25;

pub fn not_admin() -> Notice {
    Notice::text(
        "You don't have permission to use this command. Administrator permission is required.",
    )
}

pub fn parse_error(err: &ParseError, prefix: &str) -> Notice {
    match err {
        ParseError::Unknown(_) => Notice::text(format!(
            "Command not found. Use {prefix}help to see available commands."
        )),
        ParseError::Usage(usage) => Notice::text(format!("❌ Usage: {prefix}{usage}")),
    }
}

pub fn failure(err: &SessionError) -> Notice {
    Notice::text(format!("❌ {err}"))
}

pub fn progress(text: &str) -> Notice {
    Notice::text(format!("🔄 {text}"))
}

pub fn done(text: impl AsRef<str>) -> Notice {
    Notice::text(format!("✅ {}", text.as_ref()))
}

// ─── Sessions ───────────────────────────────────────────────────────────

pub fn starred(member: MemberId) -> Notice {
    done(format!(
        "{} has been starred! Only they and administrators can speak now.",
        member.mention()
    ))
}

pub fn unstarred() -> Notice {
    done("Channel has been unstarred! Everyone can speak again.")
}

pub fn rebuttal_started(a: MemberId, b: MemberId) -> Notice {
    Notice::embed(
        "⚔️ REBUTTAL IN PROGRESS",
        format!(
            "A rebuttal has started between {} and {}.\n\
             Only they and administrators can speak during this time.",
            a.mention(),
            b.mention()
        ),
        color::RED,
    )
}

pub fn rebuttal_ended() -> Notice {
    done("The rebuttal has ended. Cast your votes on the poll below!")
}

pub fn scrum_opened(prefix: &str) -> Notice {
    done(format!(
        "Team selection is open. React on the message below to pick a side, \
         then use {prefix}startscrum to begin."
    ))
}

pub fn scrum_started(prefix: &str) -> Notice {
    Notice::embed(
        "🗣️ SCRUM DEBATE STARTED",
        format!("Side A can now speak. Side B is muted.\nUse {prefix}swap to switch sides."),
        color::BLUE,
    )
}

pub fn sides_swapped(speaking: Side) -> Notice {
    let (description, color) = match speaking {
        Side::A => ("Side A can now speak. Side B is muted.", color::BLUE),
        Side::B => ("Side B can now speak. Side A is muted.", color::RED),
    };
    Notice::embed("🔄 SIDES SWAPPED", description, color)
}

pub fn scrum_ended() -> Notice {
    done("The Scrum Debate has ended. Cast your votes on the poll below!")
}

pub fn intermission() -> Notice {
    Notice::embed(
        "⏸️ INTERMISSION",
        "The trial is currently in intermission.\nOnly administrators can speak during this time.",
        color::BLUE,
    )
}

pub fn resumed() -> Notice {
    Notice::embed(
        "▶️ TRIAL RESUMED",
        "The intermission has ended.\nEveryone can speak again.",
        color::GREEN,
    )
}

// ─── Votes ──────────────────────────────────────────────────────────────

pub fn tally(tally: &Tally) -> Notice {
    match tally.ballot {
        Ballot::Refute {
            participant_a,
            participant_b,
        } => {
            let counts = format!(
                "{}: {} votes\n{}: {} votes",
                participant_a.mention(),
                tally.votes_a,
                participant_b.mention(),
                tally.votes_b
            );
            match tally.winner {
                Some(Winner::Participant(winner)) => Notice::embed(
                    "🏆 REBUTTAL RESULTS",
                    format!("**Winner: {}**\n\n{counts}", winner.mention()),
                    color::GOLD,
                ),
                _ => Notice::embed(
                    "🤝 REBUTTAL RESULTS - TIE",
                    format!("The vote ended in a tie!\n\n{counts}"),
                    color::BLUE,
                ),
            }
        }
        Ballot::Scrum { .. } => {
            let counts = format!(
                "Side A 🔵: {} votes\nSide B 🔴: {} votes",
                tally.votes_a, tally.votes_b
            );
            match tally.winner {
                Some(Winner::Side(side)) => {
                    let (winner, color) = match side {
                        Side::A => ("Side A 🔵", color::BLUE),
                        Side::B => ("Side B 🔴", color::RED),
                    };
                    Notice::embed(
                        "🏆 SCRUM DEBATE RESULTS",
                        format!("**Winner: {winner}**\n\n{counts}"),
                        color,
                    )
                }
                _ => Notice::embed(
                    "🤝 SCRUM DEBATE RESULTS - TIE",
                    format!("The vote ended in a tie!\n\n{counts}"),
                    color::GOLD,
                ),
            }
        }
    }
}

// ─── Truth bullets ──────────────────────────────────────────────────────

pub fn bullet(bullet: &TruthBullet) -> Notice {
    let notice = Notice::embed(
        format!("Truth Bullet #{}: {}", bullet.id, bullet.name),
        bullet.description.clone(),
        color::GOLD,
    );
    match &bullet.image_url {
        Some(url) => notice.image(url.clone()),
        None => notice,
    }
}

fn preview(description: &str) -> String {
    if description.chars().count() > PREVIEW_CHARS {
        let cut: String = description.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        description.to_string()
    }
}

/// The catalog listing, split across as many embeds as needed.
pub fn bullet_list(bullets: &[TruthBullet]) -> Vec<Notice> {
    bullets
        .chunks(FIELDS_PER_EMBED)
        .enumerate()
        .map(|(page, chunk)| {
            let title = if page == 0 {
                "Truth Bullets".to_string()
            } else {
                format!("Truth Bullets (continued, page {})", page + 1)
            };
            let mut notice = Notice {
                title: Some(title),
                color: Some(color::GOLD),
                ..Notice::default()
            };
            for b in chunk {
                notice = notice.field(format!("#{}: {}", b.id, b.name), preview(&b.description));
            }
            notice
        })
        .collect()
}

// ─── Info ───────────────────────────────────────────────────────────────

fn describe(kind: &SessionKind) -> String {
    match *kind {
        SessionKind::Idle => "No session is running.".to_string(),
        SessionKind::Starred {
            channel,
            participant,
        } => format!("⭐ {} holds the floor in <#{channel}>.", participant.mention()),
        SessionKind::Refuting {
            channel,
            participant_a,
            participant_b,
        } => format!(
            "⚔️ Rebuttal between {} and {} in <#{channel}>.",
            participant_a.mention(),
            participant_b.mention()
        ),
        SessionKind::ScrumSetup { channel, .. } => {
            format!("🗣️ Scrum Debate team selection is open in <#{channel}>.")
        }
        SessionKind::ScrumActive {
            channel,
            speaking_side,
            ..
        } => format!("🗣️ Scrum Debate in <#{channel}>. {speaking_side} has the floor."),
        SessionKind::Intermission { channel } => format!("⏸️ Intermission in <#{channel}>."),
    }
}

pub fn status(snapshot: &Snapshot) -> Notice {
    let mut notice = Notice::embed("📋 SESSION STATUS", describe(&snapshot.kind), color::BLUE);
    if let Some(ScrumTeams {
        side_a_role,
        side_b_role,
        ..
    }) = snapshot.scrum
    {
        notice = notice.field("Teams", format!("<@&{side_a_role}> vs <@&{side_b_role}>"));
    }
    let vote = match &snapshot.vote {
        Some(vote) => {
            let what = match vote.ballot {
                Ballot::Refute { .. } => "Rebuttal",
                Ballot::Scrum { .. } => "Scrum Debate",
            };
            format!(
                "{what} vote open since {} in <#{}>.",
                vote.opened_at.format("%Y-%m-%d %H:%M UTC"),
                vote.channel
            )
        }
        None => "None".to_string(),
    };
    notice.field("Pending vote", vote)
}

fn lines(prefix: &str, entries: &[(&str, &str)]) -> String {
    entries
        .iter()
        .map(|(usage, what)| format!("`{prefix}{usage}` {what}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn help(prefix: &str) -> Notice {
    Notice::embed(
        "📖 COMMANDS",
        "Commands marked (admin) need the Administrator permission.",
        color::BLUE,
    )
    .field(
        "Speaking sessions (admin)",
        lines(prefix, &[
            ("star @member", "Only this member and admins can speak."),
            ("unstar", "Reopen the channel."),
            ("refute @member1 @member2", "Start a rebuttal between two members."),
            ("endrefute", "End the rebuttal and open a vote."),
            ("intermission", "Only admins can speak."),
            ("resume", "End the intermission."),
        ]),
    )
    .field(
        "Scrum Debate (admin)",
        lines(prefix, &[
            ("scrumdebate", "Open team selection."),
            ("startscrum", "Start the debate, Side A first."),
            ("swap", "Give the floor to the other side."),
            ("endscrum", "End the debate and open a vote."),
        ]),
    )
    .field(
        "Votes and topic (admin)",
        lines(prefix, &[
            ("endvote", "Count the open vote and announce the result."),
            ("topic <text>", "Set the forced topic in the channel description."),
            ("cleartopic", "Remove the forced topic."),
            ("reset", "Forget this server's session state."),
        ]),
    )
    .field(
        "Truth bullets",
        lines(prefix, &[
            ("addbullet <name> <description>", "(admin) Add one; attach an image to include it."),
            ("removebullet <id_or_name>", "(admin) Remove one."),
            ("bullet <id_or_name>", "Show one."),
            ("bullets", "List all."),
        ]),
    )
    .field(
        "Other",
        lines(prefix, &[
            ("status", "Show the current session and vote."),
            ("ping", "Check the bot's latency."),
            ("help", "Show this message."),
        ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use gavel_core::RoleId;

    fn refute_tally(votes_a: u64, votes_b: u64, winner: Option<Winner>) -> Tally {
        Tally {
            ballot: Ballot::Refute {
                participant_a: MemberId(1),
                participant_b: MemberId(2),
            },
            votes_a,
            votes_b,
            winner,
        }
    }

    #[test]
    fn rebuttal_winner_and_tie() {
        let won = tally(&refute_tally(2, 5, Some(Winner::Participant(MemberId(2)))));
        assert_eq!(won.title.as_deref(), Some("🏆 REBUTTAL RESULTS"));
        assert_eq!(
            won.description.as_deref(),
            Some("**Winner: <@2>**\n\n<@1>: 2 votes\n<@2>: 5 votes")
        );
        assert_eq!(won.color, Some(color::GOLD));

        let tie = tally(&refute_tally(4, 4, None));
        assert_eq!(tie.title.as_deref(), Some("🤝 REBUTTAL RESULTS - TIE"));
        assert_eq!(tie.color, Some(color::BLUE));
    }

    #[test]
    fn scrum_winner_takes_its_color() {
        let notice = tally(&Tally {
            ballot: Ballot::Scrum {
                side_a_role: RoleId(10),
                side_b_role: RoleId(11),
            },
            votes_a: 1,
            votes_b: 3,
            winner: Some(Winner::Side(Side::B)),
        });
        assert_eq!(notice.title.as_deref(), Some("🏆 SCRUM DEBATE RESULTS"));
        assert!(notice.description.unwrap().starts_with("**Winner: Side B 🔴**"));
        assert_eq!(notice.color, Some(color::RED));
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "é".repeat(150);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS + 3);
        assert!(preview(&long).ends_with("..."));
        let exact = "x".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&exact), exact);
    }

    #[test]
    fn listing_pages_every_25_bullets() {
        let bullets: Vec<TruthBullet> = (1..=30)
            .map(|id| TruthBullet {
                id,
                name: format!("Clue {id}"),
                description: "short".into(),
                image_url: None,
            })
            .collect();
        let pages = bullet_list(&bullets);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].fields.len(), 25);
        assert_eq!(pages[1].fields.len(), 5);
        assert_eq!(pages[0].fields[0], ("#1: Clue 1".to_string(), "short".to_string()));
    }

    #[test]
    fn bullet_embed_carries_image() {
        let notice = bullet(&TruthBullet {
            id: 3,
            name: "Knife".into(),
            description: "Sharp".into(),
            image_url: Some("https://cdn.example/knife.png".into()),
        });
        assert_eq!(notice.title.as_deref(), Some("Truth Bullet #3: Knife"));
        assert_eq!(notice.image_url.as_deref(), Some("https://cdn.example/knife.png"));
    }

    #[test]
    fn parse_errors_mention_the_prefix() {
        assert_eq!(
            parse_error(&ParseError::Unknown("dance".into()), "!").content.as_deref(),
            Some("Command not found. Use !help to see available commands.")
        );
        assert_eq!(
            parse_error(&ParseError::Usage("star @member"), "?").content.as_deref(),
            Some("❌ Usage: ?star @member")
        );
    }
}
