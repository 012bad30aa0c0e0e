//! Post-session reaction polls.
//!
//! A vote is opened when a Refute or Scrum session ends and stays open until
//! an administrator resolves it. Counts come from the live reaction state of
//! the prompt message; the bot's own seed reaction is never counted.

use chrono::{DateTime, Utc};

use crate::emoji::{self, Emoji};
use crate::error::{Result, SessionError};
use crate::gateway::{FetchedMessage, Gateway, GatewayError, Notice, color};
use crate::ids::{ChannelId, MemberId, MessageId, RoleId};
use crate::session::Side;

/// Who is being voted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ballot {
    Refute {
        participant_a: MemberId,
        participant_b: MemberId,
    },
    Scrum {
        side_a_role: RoleId,
        side_b_role: RoleId,
    },
}

impl Ballot {
    /// The two options, option A first.
    pub fn emojis(&self) -> [Emoji; 2] {
        match self {
            Ballot::Refute { .. } => emoji::NUMBERED,
            Ballot::Scrum { .. } => emoji::TEAMS,
        }
    }

    fn prompt(&self) -> Notice {
        match self {
            Ballot::Refute {
                participant_a,
                participant_b,
            } => Notice::embed(
                "🗳️ REBUTTAL VOTE",
                format!(
                    "The rebuttal has concluded! Vote for who made the better argument:\n\n\
                     {} {}\n{} {}\n\n\
                     React with the corresponding number to vote!",
                    Emoji::One,
                    participant_a.mention(),
                    Emoji::Two,
                    participant_b.mention(),
                ),
                color::BLUE,
            ),
            Ballot::Scrum { .. } => Notice::embed(
                "🗳️ SCRUM DEBATE VOTE",
                format!(
                    "The Scrum Debate has concluded! Vote for which side made the better argument:\n\n\
                     {} - Side A\n{} - Side B\n\n\
                     React to cast your vote!",
                    Emoji::Blue,
                    Emoji::Red,
                ),
                color::GOLD,
            ),
        }
    }
}

/// A vote waiting to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveVote {
    pub message: MessageId,
    pub channel: ChannelId,
    pub ballot: Ballot,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Participant(MemberId),
    Side(Side),
}

/// The outcome of a resolved vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub ballot: Ballot,
    pub votes_a: u64,
    pub votes_b: u64,
    /// `None` on a tie.
    pub winner: Option<Winner>,
}

impl Tally {
    pub fn from_message(ballot: Ballot, message: &FetchedMessage) -> Self {
        let [option_a, option_b] = ballot.emojis();
        let votes_a = count_votes(message, option_a);
        let votes_b = count_votes(message, option_b);
        let winner = if votes_a > votes_b {
            Some(match ballot {
                Ballot::Refute { participant_a, .. } => Winner::Participant(participant_a),
                Ballot::Scrum { .. } => Winner::Side(Side::A),
            })
        } else if votes_b > votes_a {
            Some(match ballot {
                Ballot::Refute { participant_b, .. } => Winner::Participant(participant_b),
                Ballot::Scrum { .. } => Winner::Side(Side::B),
            })
        } else {
            None
        };
        Self {
            ballot,
            votes_a,
            votes_b,
            winner,
        }
    }
}

/// Reactions for `choice`, not counting the bot's own seed.
pub fn count_votes(message: &FetchedMessage, choice: Emoji) -> u64 {
    message
        .reactions
        .iter()
        .filter(|reaction| Emoji::parse(&reaction.emoji) == Some(choice))
        .map(|reaction| reaction.count.saturating_sub(u64::from(reaction.me)))
        .sum()
}

/// Post the vote prompt for `ballot` and seed both options.
pub async fn open(gateway: &dyn Gateway, channel: ChannelId, ballot: Ballot) -> Result<ActiveVote> {
    let message = gateway.send_message(channel, &ballot.prompt()).await?;
    for option in ballot.emojis() {
        gateway.add_reaction(channel, message, option.as_str()).await?;
    }
    tracing::info!(%channel, %message, ?ballot, "Opened vote");
    Ok(ActiveVote {
        message,
        channel,
        ballot,
        opened_at: Utc::now(),
    })
}

/// Count the pending vote in `slot` and consume it.
///
/// The vote is left in place when its message cannot be read, so an
/// administrator can retry once the platform recovers.
pub async fn resolve(gateway: &dyn Gateway, slot: &mut Option<ActiveVote>) -> Result<Tally> {
    let vote = slot
        .as_ref()
        .ok_or_else(|| SessionError::precondition("No active vote found!"))?;
    let message = gateway
        .fetch_message(vote.channel, vote.message)
        .await
        .map_err(|e| match e {
            GatewayError::NotFound(_) => {
                SessionError::NotFound("Could not find the vote message!".to_string())
            }
            other => other.into(),
        })?;
    let tally = Tally::from_message(vote.ballot, &message);
    tracing::info!(
        message = %vote.message,
        votes_a = tally.votes_a,
        votes_b = tally.votes_b,
        tie = tally.winner.is_none(),
        "Resolved vote"
    );
    *slot = None;
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ReactionCount;

    fn message(reactions: &[(&str, u64, bool)]) -> FetchedMessage {
        FetchedMessage {
            id: MessageId(1),
            reactions: reactions
                .iter()
                .map(|(emoji, count, me)| ReactionCount {
                    emoji: emoji.to_string(),
                    count: *count,
                    me: *me,
                })
                .collect(),
        }
    }

    const REFUTE: Ballot = Ballot::Refute {
        participant_a: MemberId(100),
        participant_b: MemberId(200),
    };

    const SCRUM: Ballot = Ballot::Scrum {
        side_a_role: RoleId(7),
        side_b_role: RoleId(8),
    };

    #[test]
    fn equal_counts_are_a_tie() {
        let msg = message(&[(Emoji::One.as_str(), 5, true), (Emoji::Two.as_str(), 5, true)]);
        let tally = Tally::from_message(REFUTE, &msg);
        assert_eq!((tally.votes_a, tally.votes_b), (4, 4));
        assert_eq!(tally.winner, None);
    }

    #[test]
    fn more_votes_wins() {
        let msg = message(&[(Emoji::One.as_str(), 3, true), (Emoji::Two.as_str(), 6, true)]);
        let tally = Tally::from_message(REFUTE, &msg);
        assert_eq!((tally.votes_a, tally.votes_b), (2, 5));
        assert_eq!(tally.winner, Some(Winner::Participant(MemberId(200))));
    }

    #[test]
    fn removed_seed_is_not_subtracted() {
        let msg = message(&[(Emoji::Blue.as_str(), 2, false), (Emoji::Red.as_str(), 2, true)]);
        let tally = Tally::from_message(SCRUM, &msg);
        assert_eq!((tally.votes_a, tally.votes_b), (2, 1));
        assert_eq!(tally.winner, Some(Winner::Side(Side::A)));
    }

    #[test]
    fn unrelated_reactions_are_ignored() {
        let msg = message(&[
            ("👍", 9, false),
            (Emoji::One.as_str(), 4, true),
            (Emoji::Red.as_str(), 1, true),
            (Emoji::Blue.as_str(), 3, true),
        ]);
        let tally = Tally::from_message(SCRUM, &msg);
        assert_eq!((tally.votes_a, tally.votes_b), (2, 0));
    }

    #[test]
    fn missing_options_count_as_zero() {
        let tally = Tally::from_message(SCRUM, &message(&[]));
        assert_eq!((tally.votes_a, tally.votes_b), (0, 0));
        assert_eq!(tally.winner, None);
    }
}
