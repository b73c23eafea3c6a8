//! # okbot-extractor
//!
//! `YouTube` audio acquisition for okbot using yt-dlp.
//!
//! Features:
//! - Persisted video ID → file index so repeated requests never re-download
//! - Concurrent requests for the same video share a single download
//! - Downloads run as async subprocesses and never block the runtime

pub mod locator;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use okbot_cache::TrackIndex;
use okbot_core::{Error, Result, Track, TrackResolver};
use tokio::process::Command;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

pub use locator::video_id;

/// Audio format yt-dlp converts downloads into. Opus is what Discord voice
/// speaks natively.
const DEFAULT_AUDIO_FORMAT: &str = "opus";

/// Resolves `YouTube` URLs to local audio files, downloading with yt-dlp on a
/// cache miss.
pub struct Extractor {
    yt_dlp_path: PathBuf,
    songs_dir: PathBuf,
    audio_format: String,
    index: TrackIndex,
    in_flight: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl Extractor {
    /// Create an extractor storing audio in the default project cache directory.
    pub fn new(index: TrackIndex) -> Self {
        let songs_dir = directories::ProjectDirs::from("", "", "okbot")
            .map(|d| d.cache_dir().join("songs"))
            .unwrap_or_else(|| PathBuf::from("songs"));

        Self {
            yt_dlp_path: PathBuf::from("yt-dlp"),
            songs_dir,
            audio_format: DEFAULT_AUDIO_FORMAT.to_string(),
            index,
            in_flight: DashMap::new(),
        }
    }

    /// Set the directory downloads are written to.
    #[must_use]
    pub fn with_songs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.songs_dir = dir.into();
        self
    }

    /// Set the yt-dlp executable (a bare name is looked up on `PATH`).
    #[must_use]
    pub fn with_yt_dlp_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.yt_dlp_path = path.into();
        self
    }

    /// Set the audio format yt-dlp extracts to.
    #[must_use]
    pub fn with_audio_format(mut self, format: impl Into<String>) -> Self {
        self.audio_format = format.into();
        self
    }

    /// Directory downloads are written to.
    pub fn songs_dir(&self) -> &Path {
        &self.songs_dir
    }

    /// The index backing this extractor.
    pub const fn index(&self) -> &TrackIndex {
        &self.index
    }

    /// Check if a usable download exists for a video ID.
    pub fn is_cached(&self, video_id: &str) -> bool {
        self.cached_path(video_id).is_some()
    }

    /// Index lookup that also drops entries whose file has disappeared.
    fn cached_path(&self, video_id: &str) -> Option<PathBuf> {
        let cached = self.index.get(video_id)?;
        let usable = std::fs::metadata(&cached.file_path).is_ok_and(|m| m.len() > 0);
        if usable {
            return Some(cached.file_path);
        }

        warn!(
            "Cached file for {video_id} is gone ({}), dropping index entry",
            cached.file_path.display()
        );
        if let Err(e) = self.index.remove(video_id) {
            warn!("Failed to drop stale index entry: {e}");
        }
        None
    }

    fn output_path(&self, video_id: &str) -> PathBuf {
        self.songs_dir
            .join(format!("{video_id}.{}", self.audio_format))
    }

    /// Resolve a locator to a local track, downloading if needed.
    pub async fn extract(&self, locator: &str) -> Result<Track> {
        let video_id = video_id(locator)
            .ok_or_else(|| Error::Resolution("invalid YouTube URL".to_string()))?;

        if let Some(path) = self.cached_path(&video_id) {
            info!("Cache hit for {video_id}");
            return Ok(Track::new(video_id, locator, path));
        }

        // One download per video ID at a time; latecomers wait and then hit the index.
        let lock = self.in_flight.entry(video_id.clone()).or_default().clone();
        let _guard = lock.lock().await;

        if let Some(path) = self.cached_path(&video_id) {
            debug!("{video_id} was downloaded while waiting");
            return Ok(Track::new(video_id, locator, path));
        }

        let result = self.download(&video_id).await;
        if let Ok(path) = &result {
            if let Err(e) = self.index.insert(&video_id, locator, path) {
                // The file is still playable, it just won't be found next time.
                warn!("Failed to index {video_id}: {e}");
            }
        }
        // Only after indexing, so a newcomer either waits on this lock or hits the index.
        self.in_flight.remove(&video_id);

        Ok(Track::new(video_id, locator, result?))
    }

    async fn download(&self, video_id: &str) -> Result<PathBuf> {
        info!("Cache miss - downloading {video_id}");

        tokio::fs::create_dir_all(&self.songs_dir)
            .await
            .map_err(|e| Error::Resolution(format!("Failed to create songs directory: {e}")))?;

        let template = self.songs_dir.join("%(id)s.%(ext)s");
        let url = format!("https://www.youtube.com/watch?v={video_id}");

        debug!("Running {}", self.yt_dlp_path.display());

        let output = Command::new(&self.yt_dlp_path)
            .arg("-x")
            .args(["--audio-format", self.audio_format.as_str()])
            .args(["--no-playlist", "--no-warnings", "--no-progress"])
            .arg("-o")
            .arg(&template)
            .arg(&url)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Resolution(format!("Failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp stderr: {}", stderr);
            return Err(Error::Resolution(format!(
                "yt-dlp failed: {}",
                stderr.lines().next().unwrap_or("Unknown error")
            )));
        }

        let path = self.output_path(video_id);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.len() > 0 => {
                info!("Downloaded {} bytes to {}", meta.len(), path.display());
                Ok(path)
            }
            _ => Err(Error::Resolution(format!(
                "yt-dlp finished but {} is missing",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl TrackResolver for Extractor {
    async fn resolve(&self, locator: &str) -> Result<Track> {
        self.extract(locator).await
    }
}
