//! Notifications from the playback scheduler.

/// Observer for playback progress.
///
/// Every method is called from the scheduler thread. Implementations that
/// drive a UI should forward to that UI's own thread and return at once.
pub trait PlayerListener: Send + Sync {
    /// Media is loaded and paused; playback starts in `delay_ms`.
    fn on_preparing_to_play(&self, filename: &str, delay_ms: u64);

    fn on_playback_started(&self, filename: &str);

    /// A STOP was handled.
    fn on_playback_stopped(&self);

    /// The engine reached the end of the track.
    fn on_playback_ended(&self);

    fn on_playback_error(&self, message: &str);

    fn on_debug_info(&self, message: &str);

    /// The engine finished loading. Manual transport controls should stay
    /// locked until playback starts.
    fn on_engine_ready(&self);
}
