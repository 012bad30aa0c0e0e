//! gavel-bot: Discord front end for the gavel debate moderator.
//!
//! Parses prefix commands, checks the invoker's permission, runs the
//! matching session transition or catalog operation and reports the
//! outcome in the channel.

pub mod bot;
pub mod commands;
pub mod config;
pub mod discord;
pub mod render;
pub mod topic;
