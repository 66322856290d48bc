use thiserror::Error;

/// Failures at the remote event-stream seam. None of these are fatal; the
/// dispatcher treats each one as "connection absent" and retries later.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("subscription to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("subscription to {url} timed out")]
    Timeout { url: String },

    #[error("subscription to {url} rejected with status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("stream body read failed: {0}")]
    Body(#[from] reqwest::Error),
}

/// Failures talking to the peripheral bridge.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("bridge at {addr} unreachable: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bridge connect to {0} timed out")]
    ConnectTimeout(String),

    #[error("bridge write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("bridge read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("malformed bridge message: {0}")]
    Malformed(String),
}
