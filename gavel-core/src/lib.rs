//! gavel-core: debate-session state machine for the gavel moderation bot.
//!
//! Every guild is in exactly one session kind at a time. Transitions are
//! applied to the chat platform through the [`gateway::Gateway`] capability
//! and only committed once all of their platform writes have succeeded.
//!
//! - `session`: Star / Refute / Scrum / Intermission transitions
//! - `vote`: post-session reaction polls and their tally
//! - `roles`: create-if-absent roles and exact membership reconciliation
//! - `registry`: per-guild state behind a per-guild lock
//! - `gateway`: the platform capability surface the core depends on
//! - `memory`: an in-process gateway used by tests

pub mod emoji;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod memory;
pub mod registry;
pub mod roles;
pub mod session;
pub mod vote;

pub use error::SessionError;
pub use gateway::{Gateway, GatewayError, Notice, ReactionEvent};
pub use ids::{ChannelId, GuildId, MemberId, MessageId, RoleId, Scope};
pub use registry::Registry;
pub use session::{SessionKind, SessionManager, Side, Snapshot};
pub use vote::{ActiveVote, Ballot, Tally, Winner};
