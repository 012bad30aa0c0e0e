//! Forced-topic section of a channel description.
//!
//! The bot owns everything from [`MARKER`] to the end of the topic; text
//! before the marker is left alone.

use async_trait::async_trait;
use gavel_core::{ChannelId, GatewayError};

pub const MARKER: &str = "【FORCED TOPIC】";

/// Discord's limit on a channel topic, in characters.
pub const MAX_TOPIC_CHARS: usize = 1024;

/// Read and write a channel's description.
#[async_trait]
pub trait ChannelTopics: Send + Sync {
    async fn topic(&self, channel: ChannelId) -> Result<Option<String>, GatewayError>;

    async fn set_topic(&self, channel: ChannelId, topic: &str) -> Result<(), GatewayError>;
}

/// `current` with its forced-topic section added or replaced by `forced`.
pub fn with_forced_topic(current: &str, forced: &str) -> String {
    let base = match current.split_once(MARKER) {
        Some((before, _)) => before.trim(),
        None => current,
    };
    if base.is_empty() {
        format!("{MARKER}\n{forced}")
    } else {
        format!("{base}\n\n{MARKER}\n{forced}")
    }
}

/// `current` without its forced-topic section, or `None` if it has none.
pub fn without_forced_topic(current: &str) -> Option<String> {
    current
        .split_once(MARKER)
        .map(|(before, _)| before.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_section_to_empty_topic() {
        assert_eq!(with_forced_topic("", "Motive"), "【FORCED TOPIC】\nMotive");
    }

    #[test]
    fn appends_after_existing_description() {
        assert_eq!(
            with_forced_topic("Class trial room", "Motive"),
            "Class trial room\n\n【FORCED TOPIC】\nMotive"
        );
    }

    #[test]
    fn replaces_previous_section() {
        let once = with_forced_topic("Class trial room", "Motive");
        assert_eq!(
            with_forced_topic(&once, "Weapon"),
            "Class trial room\n\n【FORCED TOPIC】\nWeapon"
        );
        assert_eq!(
            with_forced_topic("【FORCED TOPIC】\nMotive", "Weapon"),
            "【FORCED TOPIC】\nWeapon"
        );
    }

    #[test]
    fn clearing_keeps_the_base() {
        assert_eq!(
            without_forced_topic("Class trial room\n\n【FORCED TOPIC】\nMotive").as_deref(),
            Some("Class trial room")
        );
        assert_eq!(without_forced_topic("【FORCED TOPIC】\nMotive").as_deref(), Some(""));
        assert_eq!(without_forced_topic("Class trial room"), None);
    }
}
