//! Command protocol for the server stream.
//!
//! Each record is one JSON object. Recognised shapes:
//!
//! ```text
//! {"cmd":"PLAY","filename":"<string>","startTime":<i64 ns>,"startPosMs":<i32, optional>}
//! {"cmd":"STOP"}
//! ```
//!
//! Any other `cmd` value decodes to [`Command::Unknown`].

use std::fmt;

use serde_json::{Map, Value};

use syncplay_types::{Command, PlayCommand};

pub const CMD_FIELD: &str = "cmd";
pub const CMD_PLAY: &str = "PLAY";
pub const CMD_STOP: &str = "STOP";
pub const FILENAME_FIELD: &str = "filename";
pub const START_TIME_FIELD: &str = "startTime";
pub const START_POS_FIELD: &str = "startPosMs";

/// A record that could not be turned into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub record: String,
    pub reason: String,
}

impl ParseError {
    fn new(record: &str, reason: impl Into<String>) -> Self {
        Self {
            record: record.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in record {:?}", self.reason, self.record)
    }
}

impl std::error::Error for ParseError {}

/// Decode one record.
pub fn parse_command(record: &str) -> Result<Command, ParseError> {
    let value: Value = serde_json::from_str(record)
        .map_err(|e| ParseError::new(record, format!("invalid JSON: {}", e)))?;

    let obj = match value {
        Value::Object(obj) => obj,
        other => {
            return Err(ParseError::new(
                record,
                format!("expected a JSON object, got {}", json_kind(&other)),
            ))
        }
    };

    match obj.get(CMD_FIELD).and_then(Value::as_str) {
        Some(CMD_PLAY) => parse_play(record, &obj).map(Command::Play),
        Some(CMD_STOP) => Ok(Command::Stop),
        _ => Ok(Command::Unknown {
            raw: record.to_string(),
        }),
    }
}

fn parse_play(record: &str, obj: &Map<String, Value>) -> Result<PlayCommand, ParseError> {
    let filename = match obj.get(FILENAME_FIELD) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) => return Err(ParseError::new(record, "PLAY with empty filename")),
        Some(_) => return Err(ParseError::new(record, "PLAY filename is not a string")),
        None => return Err(ParseError::new(record, "PLAY without filename")),
    };

    let server_start_time_ns = match obj.get(START_TIME_FIELD) {
        Some(v) => v
            .as_i64()
            .ok_or_else(|| ParseError::new(record, "PLAY startTime is not an integer"))?,
        None => return Err(ParseError::new(record, "PLAY without startTime")),
    };

    let start_position_ms = match obj.get(START_POS_FIELD) {
        None => 0,
        Some(v) => {
            let pos = v
                .as_i64()
                .ok_or_else(|| ParseError::new(record, "PLAY startPosMs is not an integer"))?;
            if pos < 0 || pos > i64::from(i32::MAX) {
                return Err(ParseError::new(
                    record,
                    format!("PLAY startPosMs out of range: {}", pos),
                ));
            }
            pos as u32
        }
    };

    Ok(PlayCommand {
        filename,
        server_start_time_ns,
        start_position_ms,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Encode a command as one record (without the terminator).
///
/// `Unknown` is written back verbatim. `startPosMs` is omitted when zero.
pub fn encode_command(command: &Command) -> String {
    match command {
        Command::Play(play) => {
            let mut obj = Map::new();
            obj.insert(CMD_FIELD.into(), Value::from(CMD_PLAY));
            obj.insert(FILENAME_FIELD.into(), Value::from(play.filename.as_str()));
            obj.insert(START_TIME_FIELD.into(), Value::from(play.server_start_time_ns));
            if play.start_position_ms > 0 {
                obj.insert(START_POS_FIELD.into(), Value::from(play.start_position_ms));
            }
            Value::Object(obj).to_string()
        }
        Command::Stop => {
            let mut obj = Map::new();
            obj.insert(CMD_FIELD.into(), Value::from(CMD_STOP));
            Value::Object(obj).to_string()
        }
        Command::Unknown { raw } => raw.clone(),
    }
}
