//! Discord adapter: REST gateway and event handler.

mod gateway;
mod handler;

pub use gateway::SerenityGateway;
pub use handler::Handler;

use serenity::all::GatewayIntents;

/// Guild messages and their content for commands, members for role
/// listings, reactions for votes and team selection.
pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
}
