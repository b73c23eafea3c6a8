//! Playback queue and per-session playback state.
//!
//! Every field the playback loop and the command handlers race on lives in
//! one [`QueueState`] behind one mutex, so a command observes and changes
//! "what is playing" atomically.

use std::collections::VecDeque;

use okbot_core::Track;
use parking_lot::{Mutex, MutexGuard};

/// Derived view of a session's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    /// No current track.
    #[default]
    Idle,
    /// The current track is streaming.
    Playing,
    /// The current track is held for resume.
    Paused,
    /// A skip was requested and the loop has not settled yet.
    Stopping,
}

/// Raw session state. Only touched with the [`PlaybackQueue`] lock held.
///
/// The session's transitions go through the setters below, which keep
/// `playing` and `paused` exclusive and never set either without a current
/// track.
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub(crate) tracks: VecDeque<Track>,
    pub(crate) current: Option<Track>,
    pub(crate) playing: bool,
    pub(crate) paused: bool,
    /// A playback loop task exists for this session.
    pub(crate) loop_active: bool,
    /// The session was disconnected and must not accept tracks again.
    pub(crate) closed: bool,
}

impl QueueState {
    pub(crate) fn add(&mut self, track: Track) {
        self.tracks.push_back(track);
    }

    #[allow(clippy::should_implement_trait)]
    pub(crate) fn next(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    pub(crate) fn clear(&mut self) {
        self.tracks.clear();
    }

    pub(crate) fn set_current(&mut self, track: Option<Track>) {
        if track.is_none() {
            self.playing = false;
            self.paused = false;
        }
        self.current = track;
    }

    pub(crate) fn set_playing(&mut self, playing: bool) -> bool {
        if playing && self.current.is_none() {
            return false;
        }
        self.playing = playing;
        if playing {
            self.paused = false;
        }
        true
    }

    pub(crate) fn set_paused(&mut self, paused: bool) -> bool {
        if paused && self.current.is_none() {
            return false;
        }
        self.paused = paused;
        if paused {
            self.playing = false;
        }
        true
    }

    pub(crate) fn status(&self) -> PlaybackStatus {
        match (&self.current, self.playing, self.paused) {
            (None, _, _) => PlaybackStatus::Idle,
            (Some(_), true, _) => PlaybackStatus::Playing,
            (Some(_), false, true) => PlaybackStatus::Paused,
            (Some(_), false, false) => PlaybackStatus::Stopping,
        }
    }

    pub(crate) fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current.clone(),
            pending: self.tracks.iter().cloned().collect(),
            status: self.status(),
        }
    }
}

/// Point-in-time copy of a queue, safe to format without holding any lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub pending: Vec<Track>,
    pub status: PlaybackStatus,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }
}

/// Ordered collection of pending tracks plus the current-track slot.
///
/// All methods are safe to call from any thread.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    state: Mutex<QueueState>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock()
    }

    /// Append a track at the tail.
    pub fn add(&self, track: Track) {
        self.lock().add(track);
    }

    /// Remove and return the head of the queue.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Option<Track> {
        self.lock().next()
    }

    /// Pending tracks, head first.
    pub fn list(&self) -> Vec<Track> {
        self.lock().tracks.iter().cloned().collect()
    }

    /// Drop every pending track. The current track is untouched.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tracks.is_empty()
    }

    /// Replace the current track. Clearing it also clears the playing and
    /// paused flags.
    pub fn set_current(&self, track: Option<Track>) {
        self.lock().set_current(track);
    }

    pub fn current(&self) -> Option<Track> {
        self.lock().current.clone()
    }

    /// Set the playing flag. Returns `false` (and changes nothing) when
    /// asked to play without a current track.
    pub fn set_playing(&self, playing: bool) -> bool {
        self.lock().set_playing(playing)
    }

    /// Set the paused flag. Pausing requires a current track and clears
    /// the playing flag.
    pub fn set_paused(&self, paused: bool) -> bool {
        self.lock().set_paused(paused)
    }

    pub fn is_playing(&self) -> bool {
        self.lock().playing
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    pub fn status(&self) -> PlaybackStatus {
        self.lock().status()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.lock().snapshot()
    }
}
