//! Opaque platform identifiers.
//!
//! The core never interprets these beyond equality and ordering; the bot
//! crate converts them to and from the platform's own id types.

use std::fmt;

macro_rules! platform_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

platform_id!(
    /// A guild (community). All state is keyed by it.
    GuildId
);
platform_id!(ChannelId);
platform_id!(RoleId);
platform_id!(
    /// A guild member, identified by their user id.
    MemberId
);
platform_id!(MessageId);

impl MemberId {
    /// Platform mention markup for this member.
    pub fn mention(self) -> String {
        format!("<@{}>", self.0)
    }
}

/// The guild and channel a command was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub guild: GuildId,
    pub channel: ChannelId,
}

impl Scope {
    pub fn new(guild: impl Into<GuildId>, channel: impl Into<ChannelId>) -> Self {
        Self {
            guild: guild.into(),
            channel: channel.into(),
        }
    }
}
