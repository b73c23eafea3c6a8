//! # okbot-cache
//!
//! Persisted index from `YouTube` video IDs to downloaded audio files.
//!
//! The index lets the resolver skip yt-dlp entirely for songs that were
//! already fetched, across restarts. It can also import the JSON song library
//! written by earlier versions of the bot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use okbot_core::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use tracing::{debug, info, warn};

const DB_FILE: &str = "tracks.db";

/// A cached download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTrack {
    pub video_id: String,
    pub locator: String,
    pub file_path: PathBuf,
    pub size_bytes: u64,
    pub cached_at: DateTime<Utc>,
}

/// `SQLite` index of downloaded tracks.
#[derive(Clone)]
pub struct TrackIndex {
    db: Arc<Mutex<Connection>>,
    location: Option<PathBuf>,
}

impl TrackIndex {
    /// Open the index in the default project cache directory.
    pub fn new() -> Result<Self> {
        let project_dirs = ProjectDirs::from("", "", "okbot")
            .ok_or_else(|| Error::Cache("Failed to determine cache directory".to_string()))?;

        Self::open(project_dirs.cache_dir())
    }

    /// Open (or create) the index inside `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::Cache(format!("Failed to create cache directory: {e}")))?;

        let db_path = dir.join(DB_FILE);
        let db = Connection::open(&db_path)
            .map_err(|e| Error::Cache(format!("Failed to open database: {e}")))?;

        let index = Self::from_connection(db, Some(db_path))?;
        info!("Track index opened at {}", dir.display());
        Ok(index)
    }

    /// An index that lives only as long as the process.
    pub fn in_memory() -> Result<Self> {
        let db = Connection::open_in_memory()
            .map_err(|e| Error::Cache(format!("Failed to open database: {e}")))?;
        Self::from_connection(db, None)
    }

    fn from_connection(db: Connection, location: Option<PathBuf>) -> Result<Self> {
        db.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS tracks (
                video_id TEXT PRIMARY KEY,
                locator TEXT NOT NULL,
                file_path TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                cached_at TEXT NOT NULL,
                last_accessed TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| Error::Cache(format!("Failed to initialize database: {e}")))?;

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            location,
        })
    }

    /// Path of the database file, if it is on disk.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Look up a cached download and bump its access time.
    pub fn get(&self, video_id: &str) -> Option<CachedTrack> {
        let db = self.db.lock();
        let row = db
            .query_row(
                "SELECT video_id, locator, file_path, size_bytes, cached_at FROM tracks WHERE video_id = ?",
                [video_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional();

        let (video_id, locator, file_path, size_bytes, cached_at) = match row {
            Ok(Some(row)) => row,
            Ok(None) => return None,
            Err(e) => {
                warn!("Track index lookup failed: {e}");
                return None;
            }
        };

        if let Err(e) = db.execute(
            "UPDATE tracks SET last_accessed = ? WHERE video_id = ?",
            rusqlite::params![Utc::now().to_rfc3339(), video_id],
        ) {
            debug!("Failed to bump access time for {video_id}: {e}");
        }

        let cached_at = DateTime::parse_from_rfc3339(&cached_at)
            .map_or_else(|_| Utc::now(), |t| t.with_timezone(&Utc));

        Some(CachedTrack {
            video_id,
            locator,
            file_path: PathBuf::from(file_path),
            size_bytes: size_bytes as u64,
            cached_at,
        })
    }

    /// Record a finished download, replacing any previous entry.
    pub fn insert(&self, video_id: &str, locator: &str, file_path: &Path) -> Result<()> {
        let size_bytes = std::fs::metadata(file_path).map_or(0, |m| m.len());
        let now = Utc::now().to_rfc3339();

        let db = self.db.lock();
        db.execute(
            "INSERT OR REPLACE INTO tracks (video_id, locator, file_path, size_bytes, cached_at, last_accessed)
             VALUES (?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                video_id,
                locator,
                file_path.to_string_lossy(),
                size_bytes as i64,
                now,
                now
            ],
        )
        .map_err(|e| Error::Cache(format!("Failed to store track: {e}")))?;

        debug!("Indexed {video_id} -> {}", file_path.display());
        Ok(())
    }

    /// Forget a cached download (the file itself is left alone).
    pub fn remove(&self, video_id: &str) -> Result<bool> {
        let db = self.db.lock();
        let removed = db
            .execute("DELETE FROM tracks WHERE video_id = ?", [video_id])
            .map_err(|e| Error::Cache(format!("Failed to remove track: {e}")))?;
        Ok(removed > 0)
    }

    /// Import a legacy `songs.json` library.
    ///
    /// Entries whose file is missing are skipped. Returns how many entries
    /// were added; entries already in the index are left untouched.
    pub fn import_legacy_library(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let library: LegacyLibrary = serde_json::from_slice(&raw)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut imported = 0;
        for (key, song) in library.songs {
            let video_id = if song.id.is_empty() { key } else { song.id };
            if self.contains(&video_id) {
                continue;
            }

            let file = base.join(&song.filename);
            if !file.exists() {
                debug!("Skipping legacy entry {video_id}: {} missing", file.display());
                continue;
            }

            let locator = format!("https://www.youtube.com/watch?v={video_id}");
            self.insert(&video_id, &locator, &file)?;
            imported += 1;
        }

        info!("Imported {imported} tracks from {}", path.display());
        Ok(imported)
    }

    fn contains(&self, video_id: &str) -> bool {
        let db = self.db.lock();
        db.query_row(
            "SELECT 1 FROM tracks WHERE video_id = ? LIMIT 1",
            [video_id],
            |_| Ok(()),
        )
        .is_ok()
    }

    /// Get index statistics.
    pub fn stats(&self) -> IndexStats {
        let db = self.db.lock();

        let track_count: i64 = db
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))
            .unwrap_or(0);

        let total_size: i64 = db
            .query_row(
                "SELECT COALESCE(SUM(size_bytes), 0) FROM tracks",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        IndexStats {
            track_count: track_count as usize,
            total_size_bytes: total_size as u64,
        }
    }

    /// Clear the index.
    pub fn clear(&self) -> Result<()> {
        let db = self.db.lock();
        db.execute("DELETE FROM tracks", [])
            .map_err(|e| Error::Cache(format!("Failed to clear index: {e}")))?;

        info!("Track index cleared");
        Ok(())
    }
}

/// Index statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of indexed downloads.
    pub track_count: usize,
    /// Total size of indexed audio in bytes.
    pub total_size_bytes: u64,
}

impl IndexStats {
    /// Get the total size in megabytes.
    pub fn total_size_mb(&self) -> f64 {
        self.total_size_bytes as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Debug, Deserialize)]
struct LegacyLibrary {
    #[serde(default)]
    songs: HashMap<String, LegacySong>,
}

#[derive(Debug, Deserialize)]
struct LegacySong {
    #[serde(default)]
    id: String,
    filename: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abc.opus");
        std::fs::write(&file, b"OggS-fake").unwrap();

        let index = TrackIndex::in_memory().unwrap();
        assert!(index.get("abc").is_none());

        index.insert("abc", "https://youtu.be/abc", &file).unwrap();
        let cached = index.get("abc").unwrap();
        assert_eq!(cached.locator, "https://youtu.be/abc");
        assert_eq!(cached.file_path, file);
        assert_eq!(cached.size_bytes, 9);
    }

    #[test]
    fn test_index_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("abc.opus");
        std::fs::write(&file, b"data").unwrap();

        {
            let index = TrackIndex::open(dir.path()).unwrap();
            index.insert("abc", "https://youtu.be/abc", &file).unwrap();
        }

        let reopened = TrackIndex::open(dir.path()).unwrap();
        assert_eq!(reopened.get("abc").unwrap().file_path, file);
        assert_eq!(reopened.stats().track_count, 1);
        assert!(reopened.location().is_some());
    }

    #[test]
    fn test_remove_and_clear() {
        let index = TrackIndex::in_memory().unwrap();
        index.insert("a", "https://youtu.be/a", Path::new("a.opus")).unwrap();
        index.insert("b", "https://youtu.be/b", Path::new("b.opus")).unwrap();

        assert!(index.remove("a").unwrap());
        assert!(!index.remove("a").unwrap());
        assert_eq!(index.stats().track_count, 1);

        index.clear().unwrap();
        assert_eq!(index.stats().track_count, 0);
    }

    #[test]
    fn test_import_legacy_library() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("songs")).unwrap();
        std::fs::write(dir.path().join("songs/present.opus"), b"x").unwrap();

        let library = r#"{
            "songs": {
                "present": { "id": "present", "filename": "songs/present.opus" },
                "missing": { "id": "missing", "filename": "songs/missing.opus" }
            }
        }"#;
        let library_path = dir.path().join("songs.json");
        std::fs::write(&library_path, library).unwrap();

        let index = TrackIndex::in_memory().unwrap();
        assert_eq!(index.import_legacy_library(&library_path).unwrap(), 1);
        assert!(index.get("present").is_some());
        assert!(index.get("missing").is_none());

        // Second import adds nothing new.
        assert_eq!(index.import_legacy_library(&library_path).unwrap(), 0);
    }

    #[test]
    fn test_import_missing_library_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let index = TrackIndex::in_memory().unwrap();
        assert_eq!(
            index
                .import_legacy_library(dir.path().join("songs.json"))
                .unwrap(),
            0
        );
    }
}
