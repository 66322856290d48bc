use futures_util::FutureExt;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::StreamError;
use crate::firebase::{redacted, ByteStream, Frame, LineBuffer, RemoteStore};
use crate::timer::Timer;

/// Chunks pulled per poll once a stream has proven ready.
const MAX_READY_CHUNKS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Table,
    Game,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Table => f.write_str("table"),
            StreamKind::Game => f.write_str("game"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
}

/// One subscription slot: at most one live stream, the buffer of bytes read
/// from it, and the timer measuring how long ago it was (re)opened.
pub struct Connection {
    kind: StreamKind,
    url: Option<Url>,
    stream: Option<Box<dyn ByteStream>>,
    buffer: LineBuffer,
    timer: Timer,
    attempts: u64,
}

impl Connection {
    pub fn new(kind: StreamKind) -> Self {
        Connection {
            kind,
            url: None,
            stream: None,
            buffer: LineBuffer::new(),
            timer: Timer::new(),
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.stream.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Target of the most recent open attempt.
    #[cfg(test)]
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Number of open attempts so far, successful or not.
    #[cfg(test)]
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn past(&self, threshold: Duration) -> bool {
        self.timer.past(threshold)
    }

    /// Close whatever is open, then subscribe to `url`. The timer restarts
    /// even when the subscription fails so retries are paced by it.
    pub async fn reopen(&mut self, remote: &dyn RemoteStore, url: Url) {
        self.close();
        self.timer.reset();
        self.attempts += 1;
        match remote.subscribe(&url).await {
            Ok(stream) => {
                info!("[{}] Listening on {}", self.kind, redacted(&url));
                self.stream = Some(stream);
            }
            Err(e) => warn!("[{}] Attempt {}: {}", self.kind, self.attempts, e),
        }
        self.url = Some(url);
    }

    /// Drop the stream and anything buffered from it. Safe to repeat.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("[{}] Closed", self.kind);
        }
        self.buffer.clear();
    }

    /// Wait for the next chunk. Never resolves while closed.
    pub async fn recv(&mut self) -> Option<Result<Vec<u8>, StreamError>> {
        match self.stream.as_mut() {
            Some(stream) => stream.next_chunk().await,
            None => std::future::pending().await,
        }
    }

    /// Buffer a received chunk. End of stream or a read error closes the
    /// stream but keeps complete frames already buffered.
    pub fn ingest(&mut self, chunk: Option<Result<Vec<u8>, StreamError>>) -> bool {
        match chunk {
            Some(Ok(bytes)) => {
                self.buffer.push(&bytes);
                true
            }
            Some(Err(e)) => {
                warn!("[{}] {}", self.kind, e);
                self.stream = None;
                false
            }
            None => {
                let target = self.url.as_ref().map(redacted).unwrap_or_default();
                info!("[{}] Stream {} ended by server", self.kind, target);
                self.stream = None;
                false
            }
        }
    }

    /// Pull chunks that are available without waiting.
    pub fn drain_ready(&mut self) {
        for _ in 0..MAX_READY_CHUNKS {
            let Some(stream) = self.stream.as_mut() else {
                return;
            };
            match stream.next_chunk().now_or_never() {
                Some(chunk) => {
                    if !self.ingest(chunk) {
                        return;
                    }
                }
                None => return,
            }
        }
    }

    pub fn next_frame(&mut self) -> Option<Frame> {
        self.buffer.next_frame()
    }
}
