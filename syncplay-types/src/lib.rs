//! # syncplay-types
//!
//! Shared type definitions for the syncplay client.
//! This crate contains the data structures passed between syncplay-net,
//! syncplay-core and the `syncplay` binary.

use serde::{Deserialize, Serialize};

/// A PLAY request pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayCommand {
    /// Media file name, relative to the configured media root. May contain
    /// `/`-separated directory segments.
    pub filename: String,
    /// Server-side timestamp in nanoseconds. Carried for diagnostics only;
    /// scheduling uses the local calibration delay.
    pub server_start_time_ns: i64,
    /// Position to seek to before the delayed start.
    pub start_position_ms: u32,
}

impl PlayCommand {
    pub fn new(filename: impl Into<String>, server_start_time_ns: i64) -> Self {
        Self {
            filename: filename.into(),
            server_start_time_ns,
            start_position_ms: 0,
        }
    }

    pub fn with_start_position(mut self, start_position_ms: u32) -> Self {
        self.start_position_ms = start_position_ms;
        self
    }
}

/// One command decoded from the server stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Play(PlayCommand),
    Stop,
    /// A well-formed record whose `cmd` is not recognised. Never acted on.
    Unknown { raw: String },
}

impl Command {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Play(_) => "PLAY",
            Command::Stop => "STOP",
            Command::Unknown { .. } => "UNKNOWN",
        }
    }

    /// Whether the command should reach the playback scheduler.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Command::Unknown { .. })
    }
}

/// Lifecycle of the server connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        write!(f, "{}", s)
    }
}

/// What the playback scheduler is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    /// Media is loaded and paused; a delayed start is armed.
    Scheduled,
    Playing,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Scheduled => "scheduled",
            PlaybackState::Playing => "playing",
        };
        write!(f, "{}", s)
    }
}

/// State reported by the media engine itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineState {
    #[default]
    Idle,
    Buffering,
    Ready,
    Ended,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EngineState::Idle => "IDLE",
            EngineState::Buffering => "BUFFERING",
            EngineState::Ready => "READY",
            EngineState::Ended => "ENDED",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_command_defaults_to_start_of_track() {
        let cmd = PlayCommand::new("a.mp3", 123);
        assert_eq!(cmd.start_position_ms, 0);
        assert_eq!(cmd.with_start_position(500).start_position_ms, 500);
    }

    #[test]
    fn unknown_is_not_actionable() {
        assert!(Command::Stop.is_actionable());
        assert!(Command::Play(PlayCommand::new("a.mp3", 0)).is_actionable());
        assert!(!Command::Unknown { raw: "{}".into() }.is_actionable());
    }

    #[test]
    fn engine_state_display_matches_debug_stream() {
        assert_eq!(EngineState::Ready.to_string(), "READY");
        assert_eq!(EngineState::Buffering.to_string(), "BUFFERING");
    }
}
