//! Media engine trait: the narrow transport surface the scheduler drives.
//!
//! `MediaEngine` captures what the scheduler needs from an audio player
//! (load, seek, play, pause, stop) independently of how decoding and output
//! are done. Engines report asynchronous events through the
//! [`EngineEventSender`] handed to them by [`MediaEngine::attach`].

use std::fmt;
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;

use syncplay_types::EngineState;

use crate::resolver::MediaResource;
use crate::scheduler::SchedulerMsg;

/// Result type for engine operations.
pub type EngineResult<T = ()> = Result<T, EngineError>;

/// Error from an engine operation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError(pub String);

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError(e.to_string())
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError(s)
    }
}

/// Something the engine reports on its own.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StateChanged(EngineState),
    Error(String),
    PlaybackEnded,
}

/// Handle an engine uses to report events back to the scheduler.
///
/// Sends never block. Events sent after the scheduler has shut down are
/// dropped.
#[derive(Clone)]
pub struct EngineEventSender {
    tx: Sender<SchedulerMsg>,
}

impl EngineEventSender {
    pub(crate) fn new(tx: Sender<SchedulerMsg>) -> Self {
        Self { tx }
    }

    pub fn send(&self, event: EngineEvent) {
        if self.tx.send(SchedulerMsg::Engine(event)).is_err() {
            log::debug!(target: "playback", "engine event dropped: scheduler gone");
        }
    }

    pub fn state_changed(&self, state: EngineState) {
        self.send(EngineEvent::StateChanged(state));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(EngineEvent::Error(message.into()));
    }

    pub fn playback_ended(&self) {
        self.send(EngineEvent::PlaybackEnded);
    }
}

/// Transport-level audio engine.
///
/// All methods are called from the scheduler thread.
pub trait MediaEngine: Send {
    /// Receive the event channel. Called once before any other method.
    fn attach(&mut self, _events: EngineEventSender) {}

    /// Load a resource, replacing whatever was loaded.
    fn load(&mut self, resource: &MediaResource) -> EngineResult;

    fn seek(&mut self, position_ms: u32) -> EngineResult;

    fn play(&mut self) -> EngineResult;

    fn pause(&mut self) -> EngineResult;

    fn stop(&mut self) -> EngineResult;

    /// Drop the loaded media so nothing can resume.
    fn clear_media(&mut self) -> EngineResult;

    fn state(&self) -> EngineState;

    fn volume(&self) -> f32;

    fn set_volume(&mut self, volume: f32) -> EngineResult;
}

// ─── Test Engine ────────────────────────────────────────────────────

/// An operation recorded by `TestEngine` for assertion in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOp {
    Load(String),
    Seek(u32),
    Play,
    Pause,
    Stop,
    ClearMedia,
    SetVolume(f32),
}

#[derive(Default)]
struct TestEngineInner {
    ops: Vec<EngineOp>,
    state: EngineState,
    volume: f32,
    fail_next_load: Option<String>,
    fail_next_play: Option<String>,
    events: Option<EngineEventSender>,
}

/// A test engine that records all operations for assertions.
///
/// Loads report `Buffering` then `Ready` like a real player would. Uses a
/// `Mutex` so an `Arc<TestEngine>` can be shared between the scheduler
/// thread and the test.
pub struct TestEngine {
    inner: Mutex<TestEngineInner>,
}

impl TestEngine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TestEngineInner {
                volume: 1.0,
                ..Default::default()
            }),
        }
    }

    /// Return all recorded operations.
    pub fn operations(&self) -> Vec<EngineOp> {
        self.inner.lock().unwrap().ops.clone()
    }

    /// Clear recorded operations.
    pub fn clear(&self) {
        self.inner.lock().unwrap().ops.clear();
    }

    /// Count operations matching a predicate.
    pub fn count<F: Fn(&EngineOp) -> bool>(&self, f: F) -> usize {
        self.inner.lock().unwrap().ops.iter().filter(|op| f(op)).count()
    }

    /// Number of `play()` calls so far.
    pub fn play_count(&self) -> usize {
        self.count(|op| *op == EngineOp::Play)
    }

    /// Names of every loaded resource, in order.
    pub fn loaded(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .ops
            .iter()
            .filter_map(|op| match op {
                EngineOp::Load(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Make the next `load()` fail with `message`.
    pub fn fail_next_load(&self, message: &str) {
        self.inner.lock().unwrap().fail_next_load = Some(message.to_string());
    }

    /// Make the next `play()` fail with `message`.
    pub fn fail_next_play(&self, message: &str) {
        self.inner.lock().unwrap().fail_next_play = Some(message.to_string());
    }

    /// Simulate the engine reaching the end of the track.
    pub fn finish_track(&self) {
        let events = {
            let mut inner = self.inner.lock().unwrap();
            inner.state = EngineState::Ended;
            inner.events.clone()
        };
        if let Some(events) = events {
            events.state_changed(EngineState::Ended);
            events.playback_ended();
        }
    }

    /// Simulate an asynchronous decoder/output failure.
    pub fn raise_error(&self, message: &str) {
        let events = self.inner.lock().unwrap().events.clone();
        if let Some(events) = events {
            events.error(message);
        }
    }

    fn record(&self, op: EngineOp) {
        self.inner.lock().unwrap().ops.push(op);
    }

    fn attach_events(&self, events: EngineEventSender) {
        self.inner.lock().unwrap().events = Some(events);
    }

    fn load_resource(&self, resource: &MediaResource) -> EngineResult {
        let (events, failure) = {
            let mut inner = self.inner.lock().unwrap();
            inner.ops.push(EngineOp::Load(resource.name().to_string()));
            let failure = inner.fail_next_load.take();
            if failure.is_none() {
                inner.state = EngineState::Ready;
            }
            (inner.events.clone(), failure)
        };
        if let Some(message) = failure {
            return Err(EngineError(message));
        }
        if let Some(events) = events {
            events.state_changed(EngineState::Buffering);
            events.state_changed(EngineState::Ready);
        }
        Ok(())
    }

    fn start(&self) -> EngineResult {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(EngineOp::Play);
        match inner.fail_next_play.take() {
            Some(message) => Err(EngineError(message)),
            None => Ok(()),
        }
    }

    fn halt(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(EngineOp::Stop);
        inner.state = EngineState::Idle;
    }

    fn current_state(&self) -> EngineState {
        self.inner.lock().unwrap().state
    }

    fn current_volume(&self) -> f32 {
        self.inner.lock().unwrap().volume
    }

    fn store_volume(&self, volume: f32) {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(EngineOp::SetVolume(volume));
        inner.volume = volume;
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps `Arc<TestEngine>` to implement `MediaEngine` so the scheduler can
/// own a `Box<dyn MediaEngine>` while tests retain an `Arc` for assertions.
pub struct SharedTestEngine(pub Arc<TestEngine>);

impl MediaEngine for SharedTestEngine {
    fn attach(&mut self, events: EngineEventSender) {
        self.0.attach_events(events);
    }
    fn load(&mut self, resource: &MediaResource) -> EngineResult {
        self.0.load_resource(resource)
    }
    fn seek(&mut self, position_ms: u32) -> EngineResult {
        self.0.record(EngineOp::Seek(position_ms));
        Ok(())
    }
    fn play(&mut self) -> EngineResult {
        self.0.start()
    }
    fn pause(&mut self) -> EngineResult {
        self.0.record(EngineOp::Pause);
        Ok(())
    }
    fn stop(&mut self) -> EngineResult {
        self.0.halt();
        Ok(())
    }
    fn clear_media(&mut self) -> EngineResult {
        self.0.record(EngineOp::ClearMedia);
        Ok(())
    }
    fn state(&self) -> EngineState {
        self.0.current_state()
    }
    fn volume(&self) -> f32 {
        self.0.current_volume()
    }
    fn set_volume(&mut self, volume: f32) -> EngineResult {
        self.0.store_volume(volume);
        Ok(())
    }
}
