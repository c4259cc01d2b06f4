#![allow(dead_code)]
//! Test harness utilities for syncplay-net integration tests.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};

use syncplay_net::framing::write_record;
use syncplay_net::protocol::encode_command;
use syncplay_net::SyncListener;
use syncplay_types::Command;

/// Everything a [`SyncListener`] can observe, in arrival order.
#[derive(Debug, Clone)]
pub enum Event {
    Command(Command),
    Lost(String),
    Raw(String),
}

/// Listener that forwards every callback into a channel.
pub struct RecordingListener {
    tx: Sender<Event>,
}

impl SyncListener for RecordingListener {
    fn on_command_received(&self, command: Command) {
        let _ = self.tx.send(Event::Command(command));
    }

    fn on_connection_lost(&self, reason: &str) {
        let _ = self.tx.send(Event::Lost(reason.to_string()));
    }

    fn on_raw_message(&self, text: &str) {
        let _ = self.tx.send(Event::Raw(text.to_string()));
    }
}

pub fn recording_listener() -> (Arc<RecordingListener>, Receiver<Event>) {
    let (tx, rx) = unbounded();
    (Arc::new(RecordingListener { tx }), rx)
}

/// Wait for the next non-raw event, or None on timeout.
pub fn next_event(rx: &Receiver<Event>, timeout: Duration) -> Option<Event> {
    let deadline = Instant::now() + timeout;
    loop {
        match rx.recv_deadline(deadline) {
            Ok(Event::Raw(_)) => continue,
            Ok(event) => return Some(event),
            Err(_) => return None,
        }
    }
}

/// Wait for the next command, failing the test on anything else.
pub fn expect_command(rx: &Receiver<Event>, timeout: Duration) -> Command {
    match next_event(rx, timeout) {
        Some(Event::Command(cmd)) => cmd,
        other => panic!("Expected a command, got {:?}", other),
    }
}

/// Wait for a connection-lost event, failing the test on anything else.
pub fn expect_lost(rx: &Receiver<Event>, timeout: Duration) -> String {
    match next_event(rx, timeout) {
        Some(Event::Lost(reason)) => reason,
        other => panic!("Expected connection lost, got {:?}", other),
    }
}

/// Collect every event that arrives within `window`.
pub fn collect_for(rx: &Receiver<Event>, window: Duration) -> Vec<Event> {
    let deadline = Instant::now() + window;
    let mut events = Vec::new();
    while let Ok(event) = rx.recv_deadline(deadline) {
        events.push(event);
    }
    events
}

pub fn count_lost(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::Lost(_)))
        .count()
}

pub fn raw_texts(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Raw(text) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// A loopback command server for one client at a time.
pub struct TestServer {
    listener: TcpListener,
}

impl TestServer {
    pub fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        Self { listener }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    /// Accept the pending client connection.
    pub fn accept(&self) -> ServerConn {
        let (stream, _) = self.listener.accept().unwrap();
        stream.set_nodelay(true).unwrap();
        ServerConn { stream }
    }
}

/// Server side of an accepted connection.
pub struct ServerConn {
    pub stream: TcpStream,
}

impl ServerConn {
    pub fn send(&mut self, command: &Command) {
        write_record(&mut self.stream, &encode_command(command)).unwrap();
    }

    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).unwrap();
        self.stream.flush().unwrap();
    }

    /// Write `bytes` in pieces of `chunk` bytes with a pause between them,
    /// so the client observes separate reads.
    pub fn send_fragmented(&mut self, bytes: &[u8], chunk: usize) {
        for piece in bytes.chunks(chunk) {
            self.send_raw(piece);
            std::thread::sleep(Duration::from_millis(15));
        }
    }
}
