#![allow(dead_code)]
//! Test harness utilities for syncplay-core integration tests.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tempfile::TempDir;

use syncplay_core::engine::{SharedTestEngine, TestEngine};
use syncplay_core::listener::PlayerListener;
use syncplay_core::resolver::FsResolver;
use syncplay_core::scheduler::{PlaybackScheduler, SchedulerConfig};

/// Everything a [`PlayerListener`] can observe, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Preparing(String, u64),
    Started(String),
    Stopped,
    Ended,
    Error(String),
    Debug(String),
    EngineReady,
}

pub struct RecordingPlayer {
    tx: Sender<PlayerEvent>,
    gate: Arc<Gate>,
}

/// Parks the scheduler thread inside its next listener callback so a test
/// can queue messages behind the command being handled.
pub struct Gate {
    armed: AtomicBool,
    entered_tx: Sender<()>,
    entered_rx: Receiver<()>,
    release_tx: Sender<()>,
    release_rx: Receiver<()>,
}

impl Gate {
    fn new() -> Self {
        let (entered_tx, entered_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        Self {
            armed: AtomicBool::new(false),
            entered_tx,
            entered_rx,
            release_tx,
            release_rx,
        }
    }

    /// Hold the next callback until `open` is called.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Block until the scheduler thread is parked.
    pub fn wait_parked(&self, timeout: Duration) {
        self.entered_rx
            .recv_timeout(timeout)
            .expect("scheduler never reached the gate");
    }

    pub fn open(&self) {
        self.release_tx.send(()).unwrap();
    }

    fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            let _ = self.entered_tx.send(());
            let _ = self.release_rx.recv();
        }
    }
}

impl PlayerListener for RecordingPlayer {
    fn on_preparing_to_play(&self, filename: &str, delay_ms: u64) {
        let _ = self.tx.send(PlayerEvent::Preparing(filename.to_string(), delay_ms));
    }

    fn on_playback_started(&self, filename: &str) {
        let _ = self.tx.send(PlayerEvent::Started(filename.to_string()));
    }

    fn on_playback_stopped(&self) {
        let _ = self.tx.send(PlayerEvent::Stopped);
    }

    fn on_playback_ended(&self) {
        let _ = self.tx.send(PlayerEvent::Ended);
    }

    fn on_playback_error(&self, message: &str) {
        let _ = self.tx.send(PlayerEvent::Error(message.to_string()));
    }

    fn on_debug_info(&self, message: &str) {
        self.gate.pass();
        let _ = self.tx.send(PlayerEvent::Debug(message.to_string()));
    }

    fn on_engine_ready(&self) {
        let _ = self.tx.send(PlayerEvent::EngineReady);
    }
}

/// A media root with a few files in it.
pub fn media_root(files: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for file in files {
        touch(dir.path(), file);
    }
    dir
}

pub fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"not really audio").unwrap();
}

/// A running scheduler wired to a recording engine and listener.
pub struct Harness {
    pub scheduler: PlaybackScheduler,
    pub engine: Arc<TestEngine>,
    pub events: Receiver<PlayerEvent>,
    pub gate: Arc<Gate>,
    pub root: TempDir,
}

impl Harness {
    pub fn new(delay_ms: u64, files: &[&str]) -> Self {
        Self::with_volume(delay_ms, files, 1.0)
    }

    pub fn with_volume(delay_ms: u64, files: &[&str], initial_volume: f32) -> Self {
        let root = media_root(files);
        let engine = Arc::new(TestEngine::new());
        let (tx, events) = unbounded();
        let gate = Arc::new(Gate::new());
        let config = SchedulerConfig {
            calibration_delay: Duration::from_millis(delay_ms),
            media_root: Some(root.path().to_path_buf()),
            initial_volume,
        };
        let scheduler = PlaybackScheduler::spawn(
            config,
            Box::new(SharedTestEngine(engine.clone())),
            Box::new(FsResolver::new()),
            Arc::new(RecordingPlayer {
                tx,
                gate: gate.clone(),
            }),
        )
        .unwrap();
        Self {
            scheduler,
            engine,
            events,
            gate,
            root,
        }
    }

    /// Every event within `window`, debug lines excluded.
    pub fn collect_for(&self, window: Duration) -> Vec<PlayerEvent> {
        collect_all(&self.events, window)
            .into_iter()
            .filter(|e| !matches!(e, PlayerEvent::Debug(_)))
            .collect()
    }

    /// Wait for the first event matching `pred`, skipping the rest.
    pub fn wait_for<F: Fn(&PlayerEvent) -> bool>(
        &self,
        timeout: Duration,
        pred: F,
    ) -> Option<PlayerEvent> {
        let deadline = Instant::now() + timeout;
        while let Ok(event) = self.events.recv_deadline(deadline) {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Events up to and including the first match, debug lines excluded.
    pub fn events_until<F: Fn(&PlayerEvent) -> bool>(
        &self,
        timeout: Duration,
        pred: F,
    ) -> Vec<PlayerEvent> {
        let deadline = Instant::now() + timeout;
        let mut seen = Vec::new();
        while let Ok(event) = self.events.recv_deadline(deadline) {
            let done = pred(&event);
            if !matches!(event, PlayerEvent::Debug(_)) {
                seen.push(event);
            }
            if done {
                return seen;
            }
        }
        panic!("timed out waiting for event, saw {:?}", seen);
    }
}

pub fn collect_all(rx: &Receiver<PlayerEvent>, window: Duration) -> Vec<PlayerEvent> {
    let deadline = Instant::now() + window;
    let mut events = Vec::new();
    while let Ok(event) = rx.recv_deadline(deadline) {
        events.push(event);
    }
    events
}

pub fn started(events: &[PlayerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::Started(f) => Some(f.clone()),
            _ => None,
        })
        .collect()
}

pub fn count(events: &[PlayerEvent], wanted: &PlayerEvent) -> usize {
    events.iter().filter(|e| *e == wanted).count()
}
