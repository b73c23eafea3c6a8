//! Bot configuration read from the environment (and `.env`).

use std::path::PathBuf;
use std::time::Duration;

use okbot_core::{Error, Result};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    /// `/ask` is disabled without a key.
    pub openai_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    /// Holds the track index and downloaded audio.
    pub data_dir: PathBuf,
    pub yt_dlp: PathBuf,
    /// A `songs.json` library from older versions to import on startup.
    pub legacy_library: Option<PathBuf>,
    pub stream_timeout: Option<Duration>,
    /// Register commands on this guild only (instant updates while developing).
    pub dev_guild: Option<u64>,
}

impl Config {
    /// Load from the process environment after reading `.env`, if present.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let discord_token = get("DISCORD_BOT_KEY")
            .ok_or_else(|| Error::Config("DISCORD_BOT_KEY is not set".to_string()))?;

        let data_dir = match get("OKBOT_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => directories::ProjectDirs::from("", "", "okbot")
                .map(|d| d.cache_dir().to_path_buf())
                .ok_or_else(|| {
                    Error::Config("cannot determine a data directory, set OKBOT_DATA_DIR".into())
                })?,
        };

        let stream_timeout = get("OKBOT_STREAM_TIMEOUT_SECS")
            .map(|v| parse_number("OKBOT_STREAM_TIMEOUT_SECS", &v))
            .transpose()?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let dev_guild = get("OKBOT_DEV_GUILD")
            .map(|v| parse_number("OKBOT_DEV_GUILD", &v))
            .transpose()?;

        Ok(Self {
            discord_token,
            openai_key: get("OPEN_AI_KEY"),
            openai_model: get("OPENAI_MODEL"),
            openai_base_url: get("OPENAI_BASE_URL"),
            data_dir,
            yt_dlp: get("OKBOT_YT_DLP").map_or_else(|| PathBuf::from("yt-dlp"), PathBuf::from),
            legacy_library: get("OKBOT_LEGACY_LIBRARY").map(PathBuf::from),
            stream_timeout,
            dev_guild,
        })
    }

    pub fn songs_dir(&self) -> PathBuf {
        self.data_dir.join("songs")
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a whole number, got {value:?}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_minimal_config() {
        let config = config(&[("DISCORD_BOT_KEY", "token"), ("OKBOT_DATA_DIR", "/tmp/okbot")]).unwrap();
        assert_eq!(config.discord_token, "token");
        assert!(config.openai_key.is_none());
        assert_eq!(config.yt_dlp, PathBuf::from("yt-dlp"));
        assert_eq!(config.songs_dir(), PathBuf::from("/tmp/okbot/songs"));
        assert!(config.stream_timeout.is_none());
        assert!(config.dev_guild.is_none());
    }

    #[test]
    fn test_token_required() {
        assert!(matches!(config(&[]), Err(Error::Config(_))));
        assert!(matches!(
            config(&[("DISCORD_BOT_KEY", "  ")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_optional_values() {
        let config = config(&[
            ("DISCORD_BOT_KEY", "token"),
            ("OKBOT_DATA_DIR", "/data"),
            ("OPEN_AI_KEY", "sk-1"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("OKBOT_YT_DLP", "/usr/local/bin/yt-dlp"),
            ("OKBOT_LEGACY_LIBRARY", "/old/songs.json"),
            ("OKBOT_STREAM_TIMEOUT_SECS", "900"),
            ("OKBOT_DEV_GUILD", "1234"),
        ])
        .unwrap();
        assert_eq!(config.openai_key.as_deref(), Some("sk-1"));
        assert_eq!(config.openai_model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.yt_dlp, PathBuf::from("/usr/local/bin/yt-dlp"));
        assert_eq!(config.legacy_library, Some(PathBuf::from("/old/songs.json")));
        assert_eq!(config.stream_timeout, Some(Duration::from_secs(900)));
        assert_eq!(config.dev_guild, Some(1234));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = config(&[
            ("DISCORD_BOT_KEY", "token"),
            ("OKBOT_DATA_DIR", "/data"),
            ("OKBOT_STREAM_TIMEOUT_SECS", "0"),
        ])
        .unwrap();
        assert!(config.stream_timeout.is_none());
    }

    #[test]
    fn test_malformed_numbers() {
        let err = config(&[
            ("DISCORD_BOT_KEY", "token"),
            ("OKBOT_DATA_DIR", "/data"),
            ("OKBOT_STREAM_TIMEOUT_SECS", "ten"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("OKBOT_STREAM_TIMEOUT_SECS"));

        assert!(config(&[
            ("DISCORD_BOT_KEY", "token"),
            ("OKBOT_DATA_DIR", "/data"),
            ("OKBOT_DEV_GUILD", "-1"),
        ])
        .is_err());
    }
}
