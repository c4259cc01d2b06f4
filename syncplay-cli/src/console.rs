//! Line commands typed on stdin.

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use crate::coordinator::AppEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Status,
    Connect,
    Disconnect,
    Stop,
    Quit,
}

impl Control {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "status" | "s" => Some(Control::Status),
            "connect" | "c" => Some(Control::Connect),
            "disconnect" | "d" => Some(Control::Disconnect),
            "stop" => Some(Control::Stop),
            "quit" | "q" | "exit" => Some(Control::Quit),
            _ => None,
        }
    }
}

/// Read stdin on its own thread until EOF or the receiver goes away.
pub fn spawn_reader(tx: Sender<AppEvent>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-control".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::warn!("stdin read failed: {}", e);
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match Control::parse(&line) {
                    Some(control) => {
                        if tx.send(AppEvent::Control(control)).is_err() {
                            break;
                        }
                    }
                    None => eprintln!("unknown command: {} (status, connect, disconnect, stop, quit)", line.trim()),
                }
            }
            log::debug!("stdin closed");
        })
}
