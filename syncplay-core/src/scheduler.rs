//! PlaybackScheduler: turns PLAY/STOP commands into engine calls.
//!
//! All scheduler state lives on one dedicated thread. Commands and engine
//! events arrive over a single channel, and the delayed start is a timer
//! channel selected alongside it, so "cancel the old start, arm the new one"
//! can never interleave with another command or with the timer firing.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

use syncplay_types::{Command, EngineState, PlayCommand, PlaybackState};

use crate::engine::{EngineEvent, EngineEventSender, EngineResult, MediaEngine};
use crate::listener::PlayerListener;
use crate::resolver::{MediaResource, ResourceResolver};

/// Settings the scheduler is built with.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed wait between accepting a PLAY and starting the engine.
    pub calibration_delay: Duration,
    pub media_root: Option<PathBuf>,
    pub initial_volume: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            calibration_delay: Duration::ZERO,
            media_root: None,
            initial_volume: 1.0,
        }
    }
}

/// Messages processed by the scheduler thread, in arrival order.
#[derive(Debug)]
pub(crate) enum SchedulerMsg {
    Play(PlayCommand),
    Stop,
    Engine(EngineEvent),
    Shutdown,
}

/// Snapshot of what the scheduler is doing, readable from any thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub state: PlaybackState,
    /// File the engine was last told to load. Diagnostic only.
    pub current_track: Option<String>,
}

/// Cloneable sending side of a [`PlaybackScheduler`].
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: Sender<SchedulerMsg>,
}

impl SchedulerHandle {
    /// Queue a PLAY. Supersedes any pending start once processed.
    pub fn on_play(&self, command: PlayCommand) {
        self.send(SchedulerMsg::Play(command));
    }

    /// Queue a STOP.
    pub fn on_stop(&self) {
        self.send(SchedulerMsg::Stop);
    }

    /// Route a decoded command. `Unknown` is logged and dropped.
    pub fn handle_command(&self, command: Command) {
        match command {
            Command::Play(play) => self.on_play(play),
            Command::Stop => self.on_stop(),
            Command::Unknown { raw } => {
                debug!(target: "playback", "Unknown command ignored: {}", raw);
            }
        }
    }

    /// Event sender for an engine hosted outside the scheduler.
    pub fn engine_events(&self) -> EngineEventSender {
        EngineEventSender::new(self.tx.clone())
    }

    /// Fire-and-forget: log if the scheduler thread is gone.
    fn send(&self, msg: SchedulerMsg) {
        if self.tx.send(msg).is_err() {
            warn!(target: "playback", "command dropped: scheduler thread stopped");
        }
    }
}

/// Owner of the scheduler thread.
pub struct PlaybackScheduler {
    handle: SchedulerHandle,
    status: Arc<Mutex<SchedulerStatus>>,
    join_handle: Option<JoinHandle<()>>,
}

impl PlaybackScheduler {
    /// Start the scheduler thread. The engine receives its event sender and
    /// initial volume before any command is processed.
    pub fn spawn(
        config: SchedulerConfig,
        engine: Box<dyn MediaEngine>,
        resolver: Box<dyn ResourceResolver>,
        listener: Arc<dyn PlayerListener>,
    ) -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = SchedulerHandle { tx };
        let status = Arc::new(Mutex::new(SchedulerStatus::default()));

        let mut thread_state = SchedulerThread {
            config,
            engine,
            resolver,
            listener,
            rx,
            status: status.clone(),
            pending: None,
            state: PlaybackState::Idle,
        };
        thread_state
            .engine
            .attach(EngineEventSender::new(handle.tx.clone()));

        let join_handle = thread::Builder::new()
            .name("playback-scheduler".into())
            .spawn(move || thread_state.run())?;

        Ok(Self {
            handle,
            status,
            join_handle: Some(join_handle),
        })
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn on_play(&self, command: PlayCommand) {
        self.handle.on_play(command);
    }

    pub fn on_stop(&self) {
        self.handle.on_stop();
    }

    pub fn handle_command(&self, command: Command) {
        self.handle.handle_command(command);
    }

    pub fn engine_events(&self) -> EngineEventSender {
        self.handle.engine_events()
    }

    pub fn status(&self) -> SchedulerStatus {
        lock_status(&self.status).clone()
    }

    pub fn state(&self) -> PlaybackState {
        lock_status(&self.status).state
    }

    pub fn current_track(&self) -> Option<String> {
        lock_status(&self.status).current_track.clone()
    }

    /// Cancel any pending start, stop the engine and join the thread.
    pub fn release(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(join_handle) = self.join_handle.take() {
            self.handle.send(SchedulerMsg::Shutdown);
            if join_handle.join().is_err() {
                warn!(target: "playback", "scheduler thread panicked");
            }
        }
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock_status(status: &Mutex<SchedulerStatus>) -> MutexGuard<'_, SchedulerStatus> {
    status.lock().unwrap_or_else(|e| e.into_inner())
}

/// The single armed delayed start.
struct PendingStart {
    filename: String,
    deadline: Instant,
}

struct SchedulerThread {
    config: SchedulerConfig,
    engine: Box<dyn MediaEngine>,
    resolver: Box<dyn ResourceResolver>,
    listener: Arc<dyn PlayerListener>,
    rx: Receiver<SchedulerMsg>,
    status: Arc<Mutex<SchedulerStatus>>,
    pending: Option<PendingStart>,
    state: PlaybackState,
}

impl SchedulerThread {
    fn run(mut self) {
        if let Err(e) = self.engine.set_volume(self.config.initial_volume) {
            warn!(target: "playback", "could not set initial volume: {}", e);
        }

        loop {
            let timer = match &self.pending {
                Some(pending) => crossbeam_channel::at(pending.deadline),
                None => crossbeam_channel::never(),
            };

            // A message already queued when the deadline passes is handled
            // before the start fires.
            crossbeam_channel::select_biased! {
                recv(self.rx) -> msg => {
                    match msg {
                        Ok(SchedulerMsg::Shutdown) | Err(_) => break,
                        Ok(msg) => self.handle_msg(msg),
                    }
                }
                recv(timer) -> _ => self.fire_pending(),
            }
        }

        self.release_engine();
        debug!(target: "playback", "scheduler thread exiting");
    }

    fn handle_msg(&mut self, msg: SchedulerMsg) {
        match msg {
            SchedulerMsg::Play(command) => self.handle_play(command),
            SchedulerMsg::Stop => self.handle_stop(),
            SchedulerMsg::Engine(event) => self.handle_engine_event(event),
            SchedulerMsg::Shutdown => {}
        }
    }

    fn handle_play(&mut self, command: PlayCommand) {
        self.listener.on_debug_info(&format!(
            "Command details: filename={}, startTime={}, startPosMs={}",
            command.filename, command.server_start_time_ns, command.start_position_ms
        ));

        // A failed lookup leaves any earlier scheduled or playing track alone.
        let resource = match self
            .resolver
            .resolve(&command.filename, self.config.media_root.as_deref())
        {
            Ok(resource) => resource,
            Err(e) => {
                warn!(target: "playback", "{}", e);
                self.listener.on_playback_error(&e.to_string());
                return;
            }
        };
        self.listener
            .on_debug_info(&format!("File found at: {}", resource.path().display()));

        if let Some(old) = self.pending.take() {
            debug!(target: "playback", "Cancelled pending start of {}", old.filename);
        }
        self.set_current_track(Some(command.filename.clone()));

        if let Err(e) = self.prepare(&resource, command.start_position_ms) {
            self.fail(&format!("Error processing play command: {}", e));
            return;
        }

        let delay = self.config.calibration_delay;
        self.pending = Some(PendingStart {
            filename: command.filename.clone(),
            deadline: Instant::now() + delay,
        });
        self.set_state(PlaybackState::Scheduled);
        info!(
            target: "playback",
            "Scheduled {} to start in {}ms",
            command.filename,
            delay.as_millis()
        );
        self.listener
            .on_preparing_to_play(&command.filename, delay.as_millis() as u64);
    }

    /// Reset the engine and leave the new media loaded but paused.
    fn prepare(&mut self, resource: &MediaResource, start_position_ms: u32) -> EngineResult {
        self.engine.stop()?;
        self.engine.clear_media()?;
        self.engine.load(resource)?;
        if start_position_ms > 0 {
            self.listener
                .on_debug_info(&format!("Seeking to position: {}ms", start_position_ms));
            self.engine.seek(start_position_ms)?;
        }
        self.engine.pause()
    }

    fn fire_pending(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        match self.engine.play() {
            Ok(()) => {
                self.set_state(PlaybackState::Playing);
                info!(target: "playback", "Playback started: {}", pending.filename);
                self.listener.on_playback_started(&pending.filename);
            }
            Err(e) => self.fail(&format!("Playback error: {}", e)),
        }
    }

    fn handle_stop(&mut self) {
        if let Some(old) = self.pending.take() {
            debug!(target: "playback", "Cancelled pending start of {}", old.filename);
        }
        self.reset_engine();
        self.set_current_track(None);
        self.set_state(PlaybackState::Idle);
        info!(target: "playback", "Playback stopped");
        self.listener.on_playback_stopped();
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::StateChanged(engine_state) => {
                self.listener
                    .on_debug_info(&format!("Player state changed to: {}", engine_state));
                if engine_state == EngineState::Ready {
                    self.listener.on_debug_info(&format!(
                        "Player ready to play, volume: {:.2}",
                        self.engine.volume()
                    ));
                    self.listener.on_engine_ready();
                }
            }
            EngineEvent::Error(message) => {
                self.listener
                    .on_debug_info(&format!("Player error: {}", message));
                self.fail(&format!("Playback error: {}", message));
            }
            EngineEvent::PlaybackEnded => {
                if self.state == PlaybackState::Playing {
                    self.set_current_track(None);
                    self.set_state(PlaybackState::Idle);
                    info!(target: "playback", "Playback ended");
                    self.listener.on_playback_ended();
                } else {
                    // Stale end from media replaced by a newer PLAY.
                    debug!(
                        target: "playback",
                        "Ignoring end of track while {}",
                        self.state
                    );
                }
            }
        }
    }

    /// Drop to Idle and report `message`.
    fn fail(&mut self, message: &str) {
        self.pending = None;
        self.set_current_track(None);
        self.set_state(PlaybackState::Idle);
        warn!(target: "playback", "{}", message);
        self.listener.on_playback_error(message);
    }

    fn reset_engine(&mut self) {
        if let Err(e) = self.engine.stop() {
            warn!(target: "playback", "engine stop failed: {}", e);
        }
        if let Err(e) = self.engine.clear_media() {
            warn!(target: "playback", "engine clear failed: {}", e);
        }
    }

    fn release_engine(&mut self) {
        self.pending = None;
        self.reset_engine();
        self.set_current_track(None);
        self.set_state(PlaybackState::Idle);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!(target: "playback", "Playback state {} -> {}", self.state, state);
        }
        self.state = state;
        lock_status(&self.status).state = state;
    }

    fn set_current_track(&mut self, track: Option<String>) {
        lock_status(&self.status).current_track = track;
    }
}
