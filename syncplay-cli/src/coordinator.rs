//! Wires the connection to the scheduler and reports status.
//!
//! Commands go straight from the reader thread to the scheduler. Everything
//! else (lost connections, player progress, console input) is funnelled into
//! one channel and handled on the main thread.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

use syncplay_core::engine::MediaEngine;
use syncplay_core::listener::PlayerListener;
use syncplay_core::resolver::FsResolver;
use syncplay_core::scheduler::{PlaybackScheduler, SchedulerHandle};
use syncplay_core::Config;
use syncplay_net::{ClientOptions, SyncClient, SyncListener};
use syncplay_types::{Command, PlaybackState};

use crate::console::Control;

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Preparing { filename: String, delay_ms: u64 },
    Started(String),
    Stopped,
    Ended,
    Error(String),
    EngineReady,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    ConnectionLost(String),
    Player(PlayerEvent),
    Control(Control),
}

/// Connection-side listener: commands to the scheduler, diagnostics to the log.
struct NetBridge {
    scheduler: SchedulerHandle,
    events: Sender<AppEvent>,
}

impl SyncListener for NetBridge {
    fn on_command_received(&self, command: Command) {
        if let Command::Play(play) = &command {
            info!(target: "sync", "Received PLAY {} (startTime={})", play.filename, play.server_start_time_ns);
        } else {
            info!(target: "sync", "Received {}", command.kind());
        }
        self.scheduler.handle_command(command);
    }

    fn on_connection_lost(&self, reason: &str) {
        let _ = self.events.send(AppEvent::ConnectionLost(reason.to_string()));
    }

    fn on_raw_message(&self, text: &str) {
        debug!(target: "sync", "{}", text);
    }
}

struct PlayerBridge {
    events: Sender<AppEvent>,
}

impl PlayerBridge {
    fn send(&self, event: PlayerEvent) {
        let _ = self.events.send(AppEvent::Player(event));
    }
}

impl PlayerListener for PlayerBridge {
    fn on_preparing_to_play(&self, filename: &str, delay_ms: u64) {
        self.send(PlayerEvent::Preparing {
            filename: filename.to_string(),
            delay_ms,
        });
    }

    fn on_playback_started(&self, filename: &str) {
        self.send(PlayerEvent::Started(filename.to_string()));
    }

    fn on_playback_stopped(&self) {
        self.send(PlayerEvent::Stopped);
    }

    fn on_playback_ended(&self) {
        self.send(PlayerEvent::Ended);
    }

    fn on_playback_error(&self, message: &str) {
        self.send(PlayerEvent::Error(message.to_string()));
    }

    fn on_debug_info(&self, message: &str) {
        debug!(target: "playback", "{}", message);
    }

    fn on_engine_ready(&self) {
        self.send(PlayerEvent::EngineReady);
    }
}

enum Flow {
    Continue,
    Quit,
    Lost(String),
}

pub struct Coordinator {
    config: Config,
    client: SyncClient,
    scheduler: PlaybackScheduler,
    events: Receiver<AppEvent>,
    controls_locked: bool,
    reconnect_at: Option<Instant>,
    last_status: String,
}

/// Build the scheduler and client. The returned sender feeds console input.
pub fn build(config: Config, engine: Box<dyn MediaEngine>) -> io::Result<(Coordinator, Sender<AppEvent>)> {
    let (tx, rx) = crossbeam_channel::unbounded();

    let scheduler = PlaybackScheduler::spawn(
        config.scheduler_config(),
        engine,
        Box::new(FsResolver::new()),
        Arc::new(PlayerBridge { events: tx.clone() }),
    )?;

    let options = ClientOptions {
        connect_timeout: config.connect_timeout(),
        ..ClientOptions::default()
    };
    let client = SyncClient::new(
        options,
        Arc::new(NetBridge {
            scheduler: scheduler.handle(),
            events: tx.clone(),
        }),
    );

    let coordinator = Coordinator {
        config,
        client,
        scheduler,
        events: rx,
        controls_locked: false,
        reconnect_at: None,
        last_status: String::new(),
    };
    Ok((coordinator, tx))
}

impl Coordinator {
    /// Connect and process events until `quit`, or until the connection is
    /// lost with auto-reconnect off.
    pub fn run(&mut self) -> io::Result<()> {
        if !self.connect() && self.reconnect_at.is_none() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "could not connect to server",
            ));
        }

        let result = loop {
            let timer = match self.reconnect_at {
                Some(at) => crossbeam_channel::at(at),
                None => crossbeam_channel::never(),
            };

            let flow = crossbeam_channel::select! {
                recv(self.events) -> event => match event {
                    Ok(event) => self.handle(event),
                    Err(_) => Flow::Quit,
                },
                recv(timer) -> _ => {
                    self.reconnect_at = None;
                    self.connect();
                    Flow::Continue
                }
            };

            match flow {
                Flow::Continue => {}
                Flow::Quit => break Ok(()),
                Flow::Lost(reason) => {
                    break Err(io::Error::new(io::ErrorKind::ConnectionAborted, reason))
                }
            }
        };

        self.client.disconnect();
        self.scheduler.on_stop();
        result
    }

    fn connect(&mut self) -> bool {
        let host = self.config.host().to_string();
        if host.is_empty() {
            self.status("Error: invalid settings, no server host configured".to_string());
            return false;
        }
        let port = self.config.port();

        self.status(format!("Connecting to {}:{}", host, port));
        if self.client.connect(&host, port) {
            self.status("Connected".to_string());
            self.status("Waiting for commands".to_string());
            true
        } else {
            self.status(format!("Disconnected: could not reach {}:{}", host, port));
            if self.config.auto_reconnect() {
                self.schedule_reconnect();
            }
            false
        }
    }

    fn schedule_reconnect(&mut self) {
        let delay = self.config.reconnect_delay();
        info!(target: "sync", "Reconnecting in {}ms", delay.as_millis());
        self.reconnect_at = Some(Instant::now() + delay);
    }

    fn handle(&mut self, event: AppEvent) -> Flow {
        match event {
            AppEvent::ConnectionLost(reason) => {
                self.status(format!("Connection lost: {}", reason));
                if self.config.auto_reconnect() {
                    self.schedule_reconnect();
                    Flow::Continue
                } else {
                    Flow::Lost(reason)
                }
            }
            AppEvent::Player(event) => {
                self.handle_player(event);
                Flow::Continue
            }
            AppEvent::Control(control) => self.handle_control(control),
        }
    }

    fn handle_player(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Preparing { filename, delay_ms } => {
                self.status(format!("Preparing to play {} in {} ms", filename, delay_ms));
            }
            PlayerEvent::EngineReady => {
                // A zero delay can start playback before the ready event lands.
                if self.scheduler.state() == PlaybackState::Scheduled {
                    self.controls_locked = true;
                    debug!(target: "playback", "Transport controls locked until playback starts");
                }
            }
            PlayerEvent::Started(filename) => {
                self.controls_locked = false;
                self.status(format!("Playing: {}", filename));
            }
            PlayerEvent::Stopped | PlayerEvent::Ended => {
                self.controls_locked = false;
                self.status("Waiting for commands".to_string());
            }
            PlayerEvent::Error(message) => {
                self.controls_locked = false;
                self.status(format!("Error: {}", message));
            }
        }
    }

    fn handle_control(&mut self, control: Control) -> Flow {
        match control {
            Control::Status => self.print_status(),
            Control::Connect => {
                self.reconnect_at = None;
                self.connect();
            }
            Control::Disconnect => {
                self.reconnect_at = None;
                self.client.disconnect();
                self.status("Disconnected".to_string());
            }
            Control::Stop => {
                if self.controls_locked {
                    self.status("Controls locked until playback starts".to_string());
                } else {
                    self.scheduler.on_stop();
                }
            }
            Control::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    fn print_status(&self) {
        let connection = match self.client.peer() {
            Some(peer) => format!("{} ({})", self.client.state(), peer),
            None => self.client.state().to_string(),
        };
        let status = self.scheduler.status();
        let playback = match &status.current_track {
            Some(track) => format!("{} ({})", status.state, track),
            None => status.state.to_string(),
        };
        println!("connection: {}", connection);
        println!("playback:   {}", playback);
        println!(
            "controls:   {}",
            if self.controls_locked { "locked" } else { "unlocked" }
        );
        if self.reconnect_at.is_some() {
            println!("reconnect:  pending");
        }
    }

    fn status(&mut self, line: String) {
        println!("{}", line);
        if line.starts_with("Error") {
            warn!("{}", line);
        } else {
            info!("{}", line);
        }
        self.last_status = line;
    }
}
