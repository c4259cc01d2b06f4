//! Connection to the syncplay command server.
//!
//! `SyncClient` owns the socket. A background reader thread feeds raw bytes
//! through the [`LineDecoder`], parses each record and reports commands and
//! lifecycle events to a [`SyncListener`].

use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use syncplay_types::{Command, ConnectionState};

use crate::framing::{FrameError, LineDecoder, DEFAULT_MAX_RECORD_LEN};
use crate::protocol::parse_command;

const READ_CHUNK: usize = 4096;

/// Receives everything the connection produces.
///
/// Called from the reader thread; implementations should hand work off
/// rather than block.
pub trait SyncListener: Send + Sync {
    /// A PLAY or STOP arrived.
    fn on_command_received(&self, command: Command);

    /// The session ended without `disconnect()` being called.
    fn on_connection_lost(&self, reason: &str);

    /// Diagnostic trace of raw records and lifecycle notes.
    fn on_raw_message(&self, text: &str);
}

/// Tuning knobs for a [`SyncClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub connect_timeout: Duration,
    /// How long a blocking read waits before re-checking for shutdown.
    pub read_poll_interval: Duration,
    pub max_record_len: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_poll_interval: Duration::from_millis(250),
            max_record_len: DEFAULT_MAX_RECORD_LEN,
        }
    }
}

/// State shared between one session's owner and its reader thread.
///
/// `ended` is flipped exactly once, by whichever side tears the session
/// down first. Only that side touches the connection state afterwards.
struct SessionLink {
    ended: AtomicBool,
}

impl SessionLink {
    fn new() -> Self {
        Self {
            ended: AtomicBool::new(false),
        }
    }

    /// Returns true for the first caller only.
    fn end(&self) -> bool {
        !self.ended.swap(true, Ordering::SeqCst)
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

struct Session {
    stream: TcpStream,
    peer: SocketAddr,
    link: Arc<SessionLink>,
    reader: Option<JoinHandle<()>>,
}

/// A client that listens for commands from the server.
pub struct SyncClient {
    options: ClientOptions,
    listener: Arc<dyn SyncListener>,
    state: Arc<Mutex<ConnectionState>>,
    session: Option<Session>,
}

impl SyncClient {
    pub fn new(options: ClientOptions, listener: Arc<dyn SyncListener>) -> Self {
        Self {
            options,
            listener,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            session: None,
        }
    }

    /// Connect and start the reader thread.
    ///
    /// Any existing session is torn down first. Failures (DNS, refused,
    /// timeout) are reported through the return value and a raw message.
    pub fn connect(&mut self, host: &str, port: u16) -> bool {
        self.disconnect();

        self.listener
            .on_raw_message(&format!("Connecting to {}:{}...", host, port));
        info!(target: "sync", "Connecting to {}:{}", host, port);
        set_state(&self.state, ConnectionState::Connecting);

        match self.open_session(host, port) {
            Ok(session) => {
                info!(target: "sync", "Connected to {}", session.peer);
                self.session = Some(session);
                true
            }
            Err(e) => {
                warn!(target: "sync", "Connection to {}:{} failed: {}", host, port, e);
                set_state(&self.state, ConnectionState::Disconnected);
                self.listener
                    .on_raw_message(&format!("Connection failed: {}", e));
                false
            }
        }
    }

    fn open_session(&self, host: &str, port: u16) -> io::Result<Session> {
        let stream = connect_any(host, port, self.options.connect_timeout)?;
        stream.set_read_timeout(Some(self.options.read_poll_interval))?;
        let peer = stream.peer_addr()?;
        let read_stream = stream.try_clone()?;
        let link = Arc::new(SessionLink::new());

        // Connected before the reader starts, so a peer that closes at once
        // still produces Connected -> Disconnected.
        set_state(&self.state, ConnectionState::Connected);
        self.listener.on_raw_message("Connection established");

        let reader = ReaderSession {
            stream: read_stream,
            decoder: LineDecoder::with_max_len(self.options.max_record_len),
            link: link.clone(),
            state: self.state.clone(),
            listener: self.listener.clone(),
        };
        let spawned = thread::Builder::new()
            .name("sync-reader".into())
            .spawn(move || reader.run());

        match spawned {
            Ok(handle) => Ok(Session {
                stream,
                peer,
                link,
                reader: Some(handle),
            }),
            Err(e) => {
                link.end();
                let _ = stream.shutdown(Shutdown::Both);
                Err(e)
            }
        }
    }

    /// Close the socket and stop the reader. Safe to call at any time.
    ///
    /// Never produces `on_connection_lost`.
    pub fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            set_state(&self.state, ConnectionState::Disconnected);
            return;
        };

        if session.link.end() {
            info!(target: "sync", "Disconnecting from {}", session.peer);
            set_state(&self.state, ConnectionState::Disconnected);
        }
        let _ = session.stream.shutdown(Shutdown::Both);

        if let Some(handle) = session.reader.take() {
            // A listener may call back into disconnect from the reader thread.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    /// True only while a session is live and its socket still has a peer.
    pub fn is_connected(&self) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }
        match &self.session {
            Some(session) => !session.link.is_ended() && session.stream.peer_addr().is_ok(),
            None => false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *lock_state(&self.state)
    }

    /// Address of the server for the current session.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.session
            .as_ref()
            .filter(|s| !s.link.is_ended())
            .map(|s| s.peer)
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn lock_state(state: &Mutex<ConnectionState>) -> MutexGuard<'_, ConnectionState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

fn set_state(state: &Mutex<ConnectionState>, new_state: ConnectionState) {
    let mut guard = lock_state(state);
    if *guard != new_state {
        debug!(target: "sync", "Connection state {} -> {}", *guard, new_state);
        *guard = new_state;
    }
}

/// Try every resolved address in turn with a bounded timeout.
fn connect_any(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(target: "sync", "Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {}", host),
        )
    }))
}

/// Reader-thread half of a session.
struct ReaderSession {
    stream: TcpStream,
    decoder: LineDecoder,
    link: Arc<SessionLink>,
    state: Arc<Mutex<ConnectionState>>,
    listener: Arc<dyn SyncListener>,
}

impl ReaderSession {
    fn run(mut self) {
        self.listener.on_raw_message("Socket listening started");

        let failure = self.read_loop();

        self.decoder.clear();
        self.listener.on_raw_message("Listening loop ended");

        if let Some(reason) = failure {
            if self.link.end() {
                warn!(target: "sync", "Connection lost: {}", reason);
                set_state(&self.state, ConnectionState::Disconnected);
                let _ = self.stream.shutdown(Shutdown::Both);
                self.listener.on_connection_lost(&reason);
            }
        }

        debug!(target: "sync", "Reader thread exiting");
    }

    /// Returns the failure reason, or None when the owner asked us to stop.
    fn read_loop(&mut self) -> Option<String> {
        let mut buf = [0u8; READ_CHUNK];

        loop {
            if self.link.is_ended() {
                return None;
            }

            match self.stream.read(&mut buf) {
                Ok(0) => {
                    if self.link.is_ended() {
                        return None;
                    }
                    return Some("connection closed by server".to_string());
                }
                Ok(n) => {
                    if let Err(e) = self.handle_chunk(&buf[..n]) {
                        return Some(e.to_string());
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    if self.link.is_ended() {
                        return None;
                    }
                    self.listener
                        .on_raw_message(&format!("Read error: {}", e));
                    return Some(e.to_string());
                }
            }
        }
    }

    fn handle_chunk(&mut self, chunk: &[u8]) -> Result<(), FrameError> {
        self.listener.on_raw_message(&format!(
            "Received raw: {}",
            String::from_utf8_lossy(chunk).replace('\n', "\\n")
        ));

        for record in self.decoder.feed(chunk)? {
            self.handle_record(&record);
        }
        Ok(())
    }

    fn handle_record(&self, record: &str) {
        self.listener
            .on_raw_message(&format!("Processing JSON: {}", record));

        match parse_command(record) {
            Ok(command) if !command.is_actionable() => {
                debug!(target: "sync", "Ignoring unknown command: {}", record);
                self.listener
                    .on_raw_message(&format!("Unknown command ignored: {}", record));
            }
            Ok(command) => {
                debug!(target: "sync", "Received {} command", command.kind());
                self.listener.on_command_received(command);
            }
            Err(e) => {
                warn!(target: "sync", "Discarding record: {}", e);
                self.listener
                    .on_raw_message(&format!("JSON parse error: {}", e.reason));
            }
        }
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        // Unwinding out of a listener callback still releases the session.
        if self.link.end() {
            set_state(&self.state, ConnectionState::Disconnected);
            let _ = self.stream.shutdown(Shutdown::Both);
        }
    }
}
