//! The fixed emoji sets used for votes and team selection.

use crate::session::Side;

/// Every emoji the core reacts with or listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emoji {
    /// 1️⃣: first refuter.
    One,
    /// 2️⃣: second refuter.
    Two,
    /// 🔵: Side A.
    Blue,
    /// 🔴: Side B.
    Red,
}

impl Emoji {
    pub fn as_str(self) -> &'static str {
        match self {
            Emoji::One => "1\u{FE0F}\u{20E3}",
            Emoji::Two => "2\u{FE0F}\u{20E3}",
            Emoji::Blue => "\u{1F535}",
            Emoji::Red => "\u{1F534}",
        }
    }

    /// Parse a unicode emoji as delivered by the platform. Keycaps are
    /// accepted with or without the variation selector.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "1\u{FE0F}\u{20E3}" | "1\u{20E3}" => Some(Emoji::One),
            "2\u{FE0F}\u{20E3}" | "2\u{20E3}" => Some(Emoji::Two),
            "\u{1F535}" => Some(Emoji::Blue),
            "\u{1F534}" => Some(Emoji::Red),
            _ => None,
        }
    }

    /// The team a team-selection reaction stands for.
    pub fn team(self) -> Option<Side> {
        match self {
            Emoji::Blue => Some(Side::A),
            Emoji::Red => Some(Side::B),
            Emoji::One | Emoji::Two => None,
        }
    }
}

impl std::fmt::Display for Emoji {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two team emojis, Side A first.
pub const TEAMS: [Emoji; 2] = [Emoji::Blue, Emoji::Red];

/// The two refuter emojis, first refuter first.
pub const NUMBERED: [Emoji; 2] = [Emoji::One, Emoji::Two];
