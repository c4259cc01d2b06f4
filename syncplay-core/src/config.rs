use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::scheduler::SchedulerConfig;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

pub const DEFAULT_PORT: u16 = 12345;
const MAX_CALIBRATION_MS: u64 = 60_000;

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    playback: PlaybackConfig,
    #[serde(default)]
    diagnostics: DiagnosticsConfig,
}

#[derive(Deserialize, Default)]
struct ServerConfig {
    host: Option<String>,
    port: Option<u16>,
    connect_timeout_ms: Option<u64>,
    auto_reconnect: Option<bool>,
    reconnect_delay_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct PlaybackConfig {
    calibration_ms: Option<u64>,
    media_root: Option<PathBuf>,
    initial_volume: Option<f32>,
}

#[derive(Deserialize, Default)]
struct DiagnosticsConfig {
    debug: Option<bool>,
}

pub struct Config {
    server: ServerConfig,
    playback: PlaybackConfig,
    diagnostics: DiagnosticsConfig,
}

impl Config {
    /// Embedded defaults merged with the user's config file, if any.
    pub fn load() -> Self {
        let mut config = Self::embedded();
        if let Some(path) = user_config_path() {
            if path.exists() {
                config.merge_file(&path);
            }
        }
        config
    }

    /// Embedded defaults merged with a user document.
    pub fn from_toml_str(user: &str) -> Result<Self, toml::de::Error> {
        let mut config = Self::embedded();
        config.merge(toml::from_str(user)?);
        Ok(config)
    }

    /// Merge a config file given on the command line. Problems are logged
    /// and the file is skipped.
    pub fn merge_file(&mut self, path: &Path) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                Ok(user) => {
                    log::info!(target: "config", "loaded {}", path.display());
                    self.merge(user);
                }
                Err(e) => {
                    log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                }
            },
            Err(e) => {
                log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
            }
        }
    }

    fn embedded() -> Self {
        let base = match toml::from_str::<ConfigFile>(DEFAULT_CONFIG) {
            Ok(base) => base,
            Err(e) => {
                log::warn!(target: "config", "embedded config.toml is invalid: {}", e);
                ConfigFile::default()
            }
        };
        Config {
            server: base.server,
            playback: base.playback,
            diagnostics: base.diagnostics,
        }
    }

    fn merge(&mut self, user: ConfigFile) {
        merge_server(&mut self.server, user.server);
        merge_playback(&mut self.playback, user.playback);
        merge_diagnostics(&mut self.diagnostics, user.diagnostics);
    }

    /// Server host name. Empty means "not configured".
    pub fn host(&self) -> &str {
        self.server.host.as_deref().unwrap_or("").trim()
    }

    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(DEFAULT_PORT)
    }

    /// Connect timeout (clamped to 100ms..60s).
    pub fn connect_timeout(&self) -> Duration {
        let ms = self
            .server
            .connect_timeout_ms
            .unwrap_or(5_000)
            .clamp(100, 60_000);
        Duration::from_millis(ms)
    }

    pub fn auto_reconnect(&self) -> bool {
        self.server.auto_reconnect.unwrap_or(false)
    }

    /// Wait before a reconnect attempt (at least 100ms).
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.server.reconnect_delay_ms.unwrap_or(3_000).max(100))
    }

    /// Calibration delay (clamped to 0..60s).
    pub fn calibration_delay(&self) -> Duration {
        let ms = self
            .playback
            .calibration_ms
            .unwrap_or(0)
            .min(MAX_CALIBRATION_MS);
        Duration::from_millis(ms)
    }

    pub fn media_root(&self) -> Option<&Path> {
        self.playback.media_root.as_deref()
    }

    /// Initial engine volume (clamped to 0.0..=1.0).
    pub fn initial_volume(&self) -> f32 {
        let volume = self.playback.initial_volume.unwrap_or(1.0);
        if volume.is_nan() {
            return 1.0;
        }
        volume.clamp(0.0, 1.0)
    }

    pub fn debug(&self) -> bool {
        self.diagnostics.debug.unwrap_or(false)
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.server.host = Some(host.into());
    }

    pub fn set_port(&mut self, port: u16) {
        self.server.port = Some(port);
    }

    pub fn set_calibration_ms(&mut self, ms: u64) {
        self.playback.calibration_ms = Some(ms);
    }

    pub fn set_media_root(&mut self, root: impl Into<PathBuf>) {
        self.playback.media_root = Some(root.into());
    }

    pub fn set_auto_reconnect(&mut self, enabled: bool) {
        self.server.auto_reconnect = Some(enabled);
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            calibration_delay: self.calibration_delay(),
            media_root: self.playback.media_root.clone(),
            initial_volume: self.initial_volume(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::embedded()
    }
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("syncplay").join("config.toml"))
}

fn merge_server(base: &mut ServerConfig, user: ServerConfig) {
    if user.host.is_some() {
        base.host = user.host;
    }
    if user.port.is_some() {
        base.port = user.port;
    }
    if user.connect_timeout_ms.is_some() {
        base.connect_timeout_ms = user.connect_timeout_ms;
    }
    if user.auto_reconnect.is_some() {
        base.auto_reconnect = user.auto_reconnect;
    }
    if user.reconnect_delay_ms.is_some() {
        base.reconnect_delay_ms = user.reconnect_delay_ms;
    }
}

fn merge_playback(base: &mut PlaybackConfig, user: PlaybackConfig) {
    if user.calibration_ms.is_some() {
        base.calibration_ms = user.calibration_ms;
    }
    if user.media_root.is_some() {
        base.media_root = user.media_root;
    }
    if user.initial_volume.is_some() {
        base.initial_volume = user.initial_volume;
    }
}

fn merge_diagnostics(base: &mut DiagnosticsConfig, user: DiagnosticsConfig) {
    if user.debug.is_some() {
        base.debug = user.debug;
    }
}
