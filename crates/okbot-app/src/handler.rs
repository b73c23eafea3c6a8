//! Discord gateway event handler and command routing.

use std::sync::Arc;

use okbot_core::{ChannelKey, GuildKey};
use okbot_llm::AskClient;
use okbot_player::SessionRegistry;
use serenity::all::{
    Command, CommandInteraction, Context, CreateInteractionResponse,
    CreateInteractionResponseMessage, EditInteractionResponse, EventHandler, GuildId, Interaction,
    Ready,
};
use serenity::async_trait;
use tracing::{debug, error, info, warn};

use crate::commands::{self, BotCommand};
use crate::services::announcer::AnnounceChannels;

pub struct Handler {
    registry: Arc<SessionRegistry>,
    ask: Option<AskClient>,
    announce_channels: AnnounceChannels,
    dev_guild: Option<GuildId>,
}

impl Handler {
    pub fn new(
        registry: Arc<SessionRegistry>,
        ask: Option<AskClient>,
        announce_channels: AnnounceChannels,
        dev_guild: Option<u64>,
    ) -> Self {
        Self {
            registry,
            ask,
            announce_channels,
            dev_guild: dev_guild.map(GuildId::new),
        }
    }

    async fn dispatch(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(kind) = BotCommand::from_name(&command.data.name) else {
            warn!("Unknown command /{}", command.data.name);
            return;
        };
        debug!("/{} from {}", kind.name(), command.user.name);

        match kind {
            BotCommand::Ping => reply(ctx, command, "Pong!").await,
            BotCommand::Ask => self.ask(ctx, command).await,
            BotCommand::Youtube => self.youtube(ctx, command).await,
            _ => {
                let Some(guild) = command.guild_id.map(|g| GuildKey(g.get())) else {
                    reply(ctx, command, "Music commands only work in a server.").await;
                    return;
                };
                self.control(ctx, command, kind, guild).await;
            }
        }
    }

    async fn ask(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(client) = &self.ask else {
            reply(ctx, command, "/ask is not configured on this bot.").await;
            return;
        };
        let Some(question) = string_option(command, BotCommand::Ask) else {
            reply(ctx, command, "Please provide a question.").await;
            return;
        };

        if let Err(e) = command.defer(&ctx.http).await {
            error!("Failed to defer /ask: {e}");
            return;
        }

        let text = match client.ask(&question).await {
            Ok(answer) if answer.trim().is_empty() => "I have no answer to that.".to_string(),
            Ok(answer) => commands::truncate(&answer),
            Err(e) => {
                warn!("/ask failed: {e}");
                commands::error_reply(&e)
            }
        };
        edit(ctx, command, text).await;
    }

    async fn youtube(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(guild_id) = command.guild_id else {
            reply(ctx, command, "Music commands only work in a server.").await;
            return;
        };
        let Some(url) = string_option(command, BotCommand::Youtube) else {
            reply(ctx, command, "Please provide a YouTube URL.").await;
            return;
        };
        let Some(channel) = voice_channel_of(ctx, guild_id, command) else {
            reply(ctx, command, "You need to be in a voice channel to use this command!").await;
            return;
        };

        // Downloading can take longer than Discord's three-second reply window.
        if let Err(e) = command.defer(&ctx.http).await {
            error!("Failed to defer /youtube: {e}");
            return;
        }

        let guild = GuildKey(guild_id.get());
        self.announce_channels.insert(guild, command.channel_id);

        let text = match self.registry.enqueue(guild, Some(channel), &url).await {
            Ok(outcome) => commands::enqueue_reply(&outcome),
            Err(e) => {
                warn!("[{guild}] /youtube {url} failed: {e}");
                commands::error_reply(&e)
            }
        };
        edit(ctx, command, text).await;
    }

    async fn control(&self, ctx: &Context, command: &CommandInteraction, kind: BotCommand, guild: GuildKey) {
        let text = match kind {
            BotCommand::Queue => commands::queue_reply(&self.registry.list(guild)),
            BotCommand::Skip => commands::control_reply(kind, &self.registry.skip(guild)),
            BotCommand::Stop => commands::control_reply(kind, &self.registry.stop(guild)),
            BotCommand::Resume => commands::control_reply(kind, &self.registry.resume(guild)),
            BotCommand::Disconnect => {
                let result = self.registry.disconnect(guild).await;
                if result.is_ok() {
                    self.announce_channels.remove(&guild);
                }
                commands::control_reply(kind, &result)
            }
            BotCommand::Ping | BotCommand::Ask | BotCommand::Youtube => return,
        };
        reply(ctx, command, text).await;
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Connected as {}", ready.user.name);

        let definitions = commands::definitions();
        let registered = match self.dev_guild {
            Some(guild) => guild.set_commands(&ctx.http, definitions).await,
            None => Command::set_global_commands(&ctx.http, definitions).await,
        };

        match registered {
            Ok(commands) => info!("Registered {} slash commands", commands.len()),
            Err(e) => error!("Failed to register slash commands: {e}"),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            self.dispatch(&ctx, &command).await;
        }
    }
}

/// The trimmed, non-empty value of `kind`'s required option.
fn string_option(command: &CommandInteraction, kind: BotCommand) -> Option<String> {
    let name = kind.option()?;
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// The voice channel the invoking user is sitting in, from the gateway cache.
fn voice_channel_of(ctx: &Context, guild_id: GuildId, command: &CommandInteraction) -> Option<ChannelKey> {
    let guild = ctx.cache.guild(guild_id)?;
    guild
        .voice_states
        .get(&command.user.id)
        .and_then(|state| state.channel_id)
        .map(|channel| ChannelKey(channel.get()))
}

async fn reply(ctx: &Context, command: &CommandInteraction, text: impl Into<String>) {
    let message = CreateInteractionResponseMessage::new().content(text);
    if let Err(e) = command
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await
    {
        error!("Failed to respond to /{}: {e}", command.data.name);
    }
}

async fn edit(ctx: &Context, command: &CommandInteraction, text: String) {
    if let Err(e) = command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(text))
        .await
    {
        error!("Failed to edit reply to /{}: {e}", command.data.name);
    }
}
