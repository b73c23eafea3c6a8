//! # okbot
//!
//! A Discord bot that answers `/ask` questions and plays `YouTube` audio in
//! voice channels.

mod commands;
mod config;
mod handler;
mod services;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use dashmap::DashMap;
use okbot_cache::TrackIndex;
use okbot_extractor::Extractor;
use okbot_llm::AskClient;
use okbot_player::{PlayerConfig, SessionRegistry};
use serenity::all::GatewayIntents;
use serenity::Client;
use songbird::{SerenityInit, Songbird};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::handler::Handler;
use crate::services::{Announcer, SongbirdGateway};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "okbot=debug,okbot_app=debug,okbot_player=debug,okbot_extractor=info,okbot_cache=info,songbird=warn,serenity=warn"
                    .into()
            }),
        )
        .init();

    info!("Starting okbot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let index = TrackIndex::open(&config.data_dir)?;
    if let Some(library) = &config.legacy_library {
        match index.import_legacy_library(library) {
            Ok(count) => info!("Imported {count} songs from {}", library.display()),
            Err(e) => warn!("Could not import {}: {e}", library.display()),
        }
    }
    let stats = index.stats();
    info!(
        "Track index holds {} songs ({:.1} MB)",
        stats.track_count,
        stats.total_size_mb()
    );

    let extractor = Extractor::new(index)
        .with_songs_dir(config.songs_dir())
        .with_yt_dlp_path(&config.yt_dlp);

    let ask = config.openai_key.as_ref().map(|key| {
        let mut client = AskClient::new(key);
        if let Some(model) = &config.openai_model {
            client = client.with_model(model);
        }
        if let Some(base_url) = &config.openai_base_url {
            client = client.with_base_url(base_url);
        }
        info!("/ask enabled with model {}", client.model());
        client
    });
    if ask.is_none() {
        warn!("OPEN_AI_KEY is not set, /ask is disabled");
    }

    let songbird = Songbird::serenity();
    let mut player_config = PlayerConfig::default();
    if let Some(timeout) = config.stream_timeout {
        player_config = player_config.with_stream_timeout(timeout);
    }
    let (registry, events) = SessionRegistry::new(
        Arc::new(extractor),
        Arc::new(SongbirdGateway::new(Arc::clone(&songbird))),
        player_config,
    );
    let registry = Arc::new(registry);

    let announce_channels = Arc::new(DashMap::new());
    let handler = Handler::new(
        Arc::clone(&registry),
        ask,
        Arc::clone(&announce_channels),
        config.dev_guild,
    );

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await
        .context("Failed to create Discord client")?;

    Announcer::new(Arc::clone(&client.http), announce_channels).spawn(events);

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Shutting down");
        registry.shutdown().await;
        shard_manager.shutdown_all().await;
    });

    info!("Bot is now running. Press CTRL+C to exit.");
    client.start().await.context("Discord client stopped")?;
    Ok(())
}
