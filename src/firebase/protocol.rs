//! Firebase streaming (`text/event-stream`) framing.
//!
//! Each event on the wire looks like:
//!
//! ```text
//! event: put
//! data: {"path":"/","data":{"team_1_score":1}}
//! <blank>
//! ```
//!
//! Bytes arrive in arbitrary chunks, so [`LineBuffer`] keeps the unfinished
//! tail between reads and only hands out a frame once both of its lines are
//! complete. Anything that is not a well-formed `put` (keep-alives, `patch`,
//! `cancel`, `auth_revoked`, garbage) is reported as [`Frame::Discarded`].

use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::warn;

const PUT_EVENT: &str = "event: put";
const DATA_PREFIX: &str = "data: ";

/// Upper bound for a single unterminated line.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Payload of a `put` event: the new value at `path`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PutEvent {
    pub path: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Put(PutEvent),
    /// Frame consumed without effect; the string says why (for trace logs).
    Discarded(String),
}

#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: Vec<u8>,
    lines: VecDeque<String>,
    /// Dropping the rest of an oversized line until its newline shows up.
    skipping: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk, splitting out every completed line.
    pub fn push(&mut self, chunk: &[u8]) {
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            if self.skipping {
                self.skipping = false;
            } else {
                self.partial.extend_from_slice(&rest[..pos]);
                if self.partial.last() == Some(&b'\r') {
                    self.partial.pop();
                }
                self.lines
                    .push_back(String::from_utf8_lossy(&self.partial).into_owned());
            }
            self.partial.clear();
            rest = &rest[pos + 1..];
        }

        if self.skipping {
            return;
        }
        self.partial.extend_from_slice(rest);
        if self.partial.len() > MAX_LINE_BYTES {
            warn!(
                "Dropping oversized stream line ({} bytes buffered)",
                self.partial.len()
            );
            self.partial.clear();
            self.skipping = true;
        }
    }

    pub fn clear(&mut self) {
        self.partial.clear();
        self.lines.clear();
        self.skipping = false;
    }

    /// Take the next complete frame, or `None` if more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        // Keep-alive blank lines between events.
        while self.lines.front().is_some_and(|l| l.trim().is_empty()) {
            self.lines.pop_front();
        }

        let starts_event = self.lines.front()?.starts_with("event:");
        if !starts_event {
            let stray = self.lines.pop_front()?;
            return Some(Frame::Discarded(format!("stray line {:?}", stray)));
        }
        if self.lines.len() < 2 {
            return None;
        }

        let event = self.lines.pop_front()?;
        let event = event.trim();
        if event != PUT_EVENT {
            if self.lines.front().is_some_and(|l| l.starts_with("data:")) {
                self.lines.pop_front();
            }
            return Some(Frame::Discarded(event.to_string()));
        }

        // A put cut short by the next event leaves that event in place.
        if self.lines.front().is_some_and(|l| l.starts_with("event:")) {
            return Some(Frame::Discarded("put without data line".to_string()));
        }
        let data = self.lines.pop_front()?;
        let Some(json) = data.trim().strip_prefix(DATA_PREFIX) else {
            return Some(Frame::Discarded(format!("put with bad data line: {:?}", data)));
        };
        match serde_json::from_str::<PutEvent>(json) {
            Ok(put) => Some(Frame::Put(put)),
            Err(e) => Some(Frame::Discarded(format!("bad put payload: {}", e))),
        }
    }
}
