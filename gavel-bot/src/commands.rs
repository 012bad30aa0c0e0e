//! Prefix command parsing.
//!
//! Commands are `<prefix><name> [args]`, with the name matched
//! case-insensitively. Members are given as mentions (`<@id>`, `<@!id>`) or
//! raw ids.

use gavel_core::MemberId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Star(MemberId),
    Unstar,
    Refute(MemberId, MemberId),
    EndRefute,
    ScrumDebate,
    StartScrum,
    Swap,
    EndScrum,
    EndVote,
    Intermission,
    Resume,
    Topic(String),
    ClearTopic,
    AddBullet { name: String, description: String },
    RemoveBullet(String),
    Bullet(String),
    Bullets,
    Ping,
    Help,
    Status,
    Reset,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Star(_) => "star",
            Command::Unstar => "unstar",
            Command::Refute(..) => "refute",
            Command::EndRefute => "endrefute",
            Command::ScrumDebate => "scrumdebate",
            Command::StartScrum => "startscrum",
            Command::Swap => "swap",
            Command::EndScrum => "endscrum",
            Command::EndVote => "endvote",
            Command::Intermission => "intermission",
            Command::Resume => "resume",
            Command::Topic(_) => "topic",
            Command::ClearTopic => "cleartopic",
            Command::AddBullet { .. } => "addbullet",
            Command::RemoveBullet(_) => "removebullet",
            Command::Bullet(_) => "bullet",
            Command::Bullets => "bullets",
            Command::Ping => "ping",
            Command::Help => "help",
            Command::Status => "status",
            Command::Reset => "reset",
        }
    }

    /// Everything that changes the guild needs the administrator permission.
    pub fn requires_admin(&self) -> bool {
        !matches!(
            self,
            Command::Bullet(_) | Command::Bullets | Command::Ping | Command::Help | Command::Status
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command `{0}`")]
    Unknown(String),

    /// Holds the expected usage, without the prefix.
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse `content` as a command. `None` when it is not addressed to the bot.
pub fn parse(prefix: &str, content: &str) -> Option<Result<Command, ParseError>> {
    let body = content.trim().strip_prefix(prefix)?;
    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    if name.is_empty() {
        return None;
    }
    Some(parse_command(&name.to_lowercase(), rest))
}

fn parse_command(name: &str, rest: &str) -> Result<Command, ParseError> {
    let args: Vec<&str> = rest.split_whitespace().collect();
    let command = match name {
        "star" => match args.as_slice() {
            [member] => Command::Star(member_arg(member, "star @member")?),
            _ => return Err(ParseError::Usage("star @member")),
        },
        "unstar" => Command::Unstar,
        "refute" => match args.as_slice() {
            [a, b] => Command::Refute(
                member_arg(a, "refute @member1 @member2")?,
                member_arg(b, "refute @member1 @member2")?,
            ),
            _ => return Err(ParseError::Usage("refute @member1 @member2")),
        },
        "endrefute" => Command::EndRefute,
        "scrumdebate" => Command::ScrumDebate,
        "startscrum" => Command::StartScrum,
        "swap" => Command::Swap,
        "endscrum" => Command::EndScrum,
        "endvote" => Command::EndVote,
        "intermission" => Command::Intermission,
        "resume" => Command::Resume,
        "topic" if rest.is_empty() => return Err(ParseError::Usage("topic <topic description>")),
        "topic" => Command::Topic(rest.to_string()),
        "cleartopic" => Command::ClearTopic,
        "addbullet" => {
            let (name, description) =
                split_name(rest).ok_or(ParseError::Usage("addbullet <name> <description>"))?;
            Command::AddBullet {
                name: name.to_string(),
                description: description.to_string(),
            }
        }
        "removebullet" => {
            Command::RemoveBullet(identifier(rest).ok_or(ParseError::Usage("removebullet <id_or_name>"))?)
        }
        "bullet" => Command::Bullet(identifier(rest).ok_or(ParseError::Usage("bullet <id_or_name>"))?),
        "bullets" => Command::Bullets,
        "ping" => Command::Ping,
        "help" => Command::Help,
        "status" => Command::Status,
        "reset" => Command::Reset,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(command)
}

/// A member mention (`<@id>` / `<@!id>`) or a bare id.
pub fn parse_member(token: &str) -> Option<MemberId> {
    let raw = match token.strip_prefix("<@").and_then(|t| t.strip_suffix('>')) {
        Some(inner) => inner.strip_prefix('!').unwrap_or(inner),
        None => token,
    };
    raw.parse::<u64>().ok().filter(|id| *id != 0).map(MemberId)
}

fn member_arg(token: &str, usage: &'static str) -> Result<MemberId, ParseError> {
    parse_member(token).ok_or(ParseError::Usage(usage))
}

/// Split `"name" rest` or `name rest`; both parts must be non-empty.
fn split_name(rest: &str) -> Option<(&str, &str)> {
    let (name, tail) = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split_once('"')?,
        None => rest.split_once(char::is_whitespace)?,
    };
    let (name, tail) = (name.trim(), tail.trim());
    (!name.is_empty() && !tail.is_empty()).then_some((name, tail))
}

fn identifier(rest: &str) -> Option<String> {
    let id = rest.trim().trim_matches('"').trim();
    (!id.is_empty()).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(content: &str) -> Result<Command, ParseError> {
        parse("!", content).expect("addressed to the bot")
    }

    #[test]
    fn ignores_unprefixed_messages() {
        assert_eq!(parse("!", "hello there"), None);
        assert_eq!(parse("!", "!"), None);
        assert_eq!(parse("!", "! star"), None);
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(cmd("!UnStar"), Ok(Command::Unstar));
        assert_eq!(cmd("  !ENDVOTE  "), Ok(Command::EndVote));
    }

    #[test]
    fn mentions_and_raw_ids() {
        assert_eq!(parse_member("<@123>"), Some(MemberId(123)));
        assert_eq!(parse_member("<@!456>"), Some(MemberId(456)));
        assert_eq!(parse_member("789"), Some(MemberId(789)));
        assert_eq!(parse_member("<@&123>"), None);
        assert_eq!(parse_member("@bob"), None);
        assert_eq!(parse_member("0"), None);
    }

    #[test]
    fn member_commands() {
        assert_eq!(cmd("!star <@42>"), Ok(Command::Star(MemberId(42))));
        assert_eq!(
            cmd("!refute <@1> <@!2>"),
            Ok(Command::Refute(MemberId(1), MemberId(2)))
        );
        assert_eq!(cmd("!star"), Err(ParseError::Usage("star @member")));
        assert_eq!(
            cmd("!refute <@1>"),
            Err(ParseError::Usage("refute @member1 @member2"))
        );
        assert_eq!(
            cmd("!refute <@1> someone"),
            Err(ParseError::Usage("refute @member1 @member2"))
        );
    }

    #[test]
    fn topic_keeps_the_whole_tail() {
        assert_eq!(
            cmd("!topic Who  broke the window?"),
            Ok(Command::Topic("Who  broke the window?".into()))
        );
        assert!(matches!(cmd("!topic"), Err(ParseError::Usage(_))));
    }

    #[test]
    fn addbullet_splits_name_from_description() {
        assert_eq!(
            cmd("!addbullet Knife Found under the sink."),
            Ok(Command::AddBullet {
                name: "Knife".into(),
                description: "Found under the sink.".into()
            })
        );
        assert_eq!(
            cmd("!addbullet \"Broken Window\" Glass on the inside"),
            Ok(Command::AddBullet {
                name: "Broken Window".into(),
                description: "Glass on the inside".into()
            })
        );
        assert!(matches!(cmd("!addbullet Knife"), Err(ParseError::Usage(_))));
        assert!(matches!(cmd("!addbullet \"Knife"), Err(ParseError::Usage(_))));
    }

    #[test]
    fn bullet_identifiers() {
        assert_eq!(cmd("!bullet 3"), Ok(Command::Bullet("3".into())));
        assert_eq!(
            cmd("!removebullet \"Broken Window\""),
            Ok(Command::RemoveBullet("Broken Window".into()))
        );
        assert!(matches!(cmd("!bullet"), Err(ParseError::Usage(_))));
    }

    #[test]
    fn unknown_commands() {
        assert_eq!(cmd("!dance"), Err(ParseError::Unknown("dance".into())));
    }

    #[test]
    fn custom_prefix() {
        assert_eq!(parse("?", "?swap"), Some(Ok(Command::Swap)));
        assert_eq!(parse("?", "!swap"), None);
    }

    #[test]
    fn read_only_commands_skip_the_admin_check() {
        assert!(!Command::Bullets.requires_admin());
        assert!(!Command::Bullet("1".into()).requires_admin());
        assert!(!Command::Status.requires_admin());
        assert!(Command::Reset.requires_admin());
        assert!(Command::AddBullet {
            name: "a".into(),
            description: "b".into()
        }
        .requires_admin());
    }
}
