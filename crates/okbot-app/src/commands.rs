//! Slash command definitions and reply text.

use std::fmt::Write;

use okbot_core::{Error, Result};
use okbot_player::{Enqueued, PlaybackStatus, QueueSnapshot};
use serenity::all::{CommandOptionType, CreateCommand, CreateCommandOption};

/// Discord rejects messages longer than this many characters.
pub const MESSAGE_LIMIT: usize = 2000;

/// Pending tracks shown by `/queue` before summarising the rest.
const QUEUE_PREVIEW: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Ping,
    Ask,
    Youtube,
    Queue,
    Skip,
    Stop,
    Resume,
    Disconnect,
}

impl BotCommand {
    pub const ALL: [Self; 8] = [
        Self::Ping,
        Self::Ask,
        Self::Youtube,
        Self::Queue,
        Self::Skip,
        Self::Stop,
        Self::Resume,
        Self::Disconnect,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Ask => "ask",
            Self::Youtube => "youtube",
            Self::Queue => "queue",
            Self::Skip => "skip",
            Self::Stop => "stop",
            Self::Resume => "resume",
            Self::Disconnect => "disconnect",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            Self::Ping => "Replies with Pong!",
            Self::Ask => "Ask a question",
            Self::Youtube => "Play a YouTube song",
            Self::Queue => "Show what is playing and what is next",
            Self::Skip => "Skip the current song",
            Self::Stop => "Pause playback (resume restarts the song)",
            Self::Resume => "Resume the paused song",
            Self::Disconnect => "Disconnects the bot from the voice channel",
        }
    }

    /// Name of the required string option, for commands that take one.
    pub const fn option(self) -> Option<&'static str> {
        match self {
            Self::Ask => Some("question"),
            Self::Youtube => Some("url"),
            _ => None,
        }
    }

    pub fn definition(self) -> CreateCommand {
        let command = CreateCommand::new(self.name()).description(self.description());
        let Some(option) = self.option() else {
            return command;
        };
        let description = match self {
            Self::Ask => "The question you want to ask",
            _ => "The url of the video you want to hear",
        };
        command.add_option(
            CreateCommandOption::new(CommandOptionType::String, option, description).required(true),
        )
    }
}

/// Every command, ready to register.
pub fn definitions() -> Vec<CreateCommand> {
    BotCommand::ALL.into_iter().map(BotCommand::definition).collect()
}

/// Cut `text` to fit in one message, on a character boundary.
pub fn truncate(text: &str) -> String {
    if text.chars().count() <= MESSAGE_LIMIT {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MESSAGE_LIMIT - 1).collect();
    cut.push('…');
    cut
}

pub fn enqueue_reply(outcome: &Enqueued) -> String {
    match outcome {
        Enqueued::NowPlaying(track) => format!("Now playing <{}>", track.locator),
        Enqueued::Queued { track, position } => {
            format!("Queued <{}> (position {position})", track.locator)
        }
    }
}

pub fn queue_reply(snapshot: &QueueSnapshot) -> String {
    if snapshot.is_empty() {
        return "The queue is empty.".to_string();
    }

    let mut out = String::new();
    if let Some(current) = &snapshot.current {
        let label = match snapshot.status {
            PlaybackStatus::Paused => "Paused",
            _ => "Now playing",
        };
        let _ = writeln!(out, "{label}: <{}>", current.locator);
    }

    if snapshot.pending.is_empty() {
        out.push_str("Nothing queued after this.");
    } else {
        out.push_str("Up next:");
        for (i, track) in snapshot.pending.iter().take(QUEUE_PREVIEW).enumerate() {
            let _ = write!(out, "\n{}. <{}>", i + 1, track.locator);
        }
        let hidden = snapshot.pending.len().saturating_sub(QUEUE_PREVIEW);
        if hidden > 0 {
            let _ = write!(out, "\n…and {hidden} more");
        }
    }

    truncate(&out)
}

/// Reply for skip, stop, resume and disconnect.
pub fn control_reply(command: BotCommand, result: &Result<()>) -> String {
    match result {
        Ok(()) => match command {
            BotCommand::Skip => "Skipped.".to_string(),
            BotCommand::Stop => "Paused. Use /resume to start the song again.".to_string(),
            BotCommand::Resume => "Resumed.".to_string(),
            BotCommand::Disconnect => "Disconnected from the voice channel.".to_string(),
            other => format!("Done: /{}", other.name()),
        },
        Err(e) => error_reply(e),
    }
}

pub fn error_reply(err: &Error) -> String {
    let text = match err {
        Error::InvalidState(state) => {
            let mut text = state.to_string();
            if let Some(first) = text.get_mut(..1) {
                first.make_ascii_uppercase();
            }
            format!("{text}.")
        }
        Error::NoVoiceChannel => "You need to be in a voice channel to use this command!".to_string(),
        Error::Resolution(reason) => format!("Error processing YouTube video: {reason}"),
        Error::TransportJoin(reason) => format!("Error joining voice channel: {reason}"),
        other => format!("Something went wrong: {other}"),
    };
    truncate(&text)
}
