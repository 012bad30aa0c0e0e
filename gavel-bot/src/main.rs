//! gavel-bot: moderates class-trial style debates in Discord channels.
//!
//! Commands (prefix `!` by default):
//!
//!   star / unstar               Give one member the floor
//!   refute / endrefute          Two-member rebuttal, then a vote
//!   scrumdebate / startscrum    Team debate with swap / endscrum
//!   endvote                     Announce the vote result
//!   intermission / resume       Admin-only speaking
//!   topic / cleartopic          Forced topic in the channel description
//!   addbullet / bullet(s)       Truth-bullet evidence catalog
//!
//! Requires DISCORD_TOKEN (a `.env` file is honored).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serenity::all::{Client, Http};

use gavel_bot::bot::Bot;
use gavel_bot::config::{self, FileConfig, Settings};
use gavel_bot::discord::{self, Handler, SerenityGateway};
use gavel_catalog::Catalog;

#[derive(Parser)]
#[command(name = "gavel-bot", about = "Discord moderation bot for class-trial debates")]
struct Args {
    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    token: String,

    /// Command prefix [default: !]
    #[arg(long, env = "GAVEL_PREFIX")]
    prefix: Option<String>,

    /// Directory for truth-bullet catalogs [default: data]
    #[arg(long, env = "GAVEL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file [default: ~/.config/gavel/bot.toml]
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing, so `.env` values feed the env fallbacks.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gavel_bot=info,gavel_core=info,gavel_catalog=info".into()),
        )
        .init();

    if let Ok(path) = &dotenv {
        tracing::debug!("Loaded {}", path.display());
    }

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(config::default_path);
    let settings = Settings::resolve(
        args.token,
        args.prefix,
        args.data_dir,
        FileConfig::load(&config_path),
    );

    let catalog = Catalog::open(&settings.data_dir).with_context(|| {
        format!("opening catalog directory {}", settings.data_dir.display())
    })?;

    let http = Arc::new(Http::new(&settings.token));
    let gateway = Arc::new(SerenityGateway::new(http));
    let bot = Arc::new(Bot::new(
        gateway.clone(),
        gateway,
        catalog,
        settings.prefix.clone(),
    ));

    tracing::info!(
        prefix = %settings.prefix,
        data_dir = %settings.data_dir.display(),
        "Starting gavel-bot"
    );

    let mut client = Client::builder(&settings.token, discord::intents())
        .event_handler(Handler::new(bot))
        .await
        .context("building Discord client")?;

    let shards = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
            shards.shutdown_all().await;
        }
    });

    tracing::info!("Bot running. Ctrl+C to stop.");
    client.start().await.context("Discord client stopped")?;
    Ok(())
}
