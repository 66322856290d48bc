use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use crate::error::StreamError;

/// Body of an open event-stream subscription.
#[async_trait]
pub trait ByteStream: Send {
    /// Next chunk of the body; `None` once the server has ended it.
    ///
    /// Must be cancel-safe: the dispatcher races this against a timeout and
    /// against the other subscription.
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, StreamError>>;
}

/// Trait every backing store for the scoreboard must implement.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open `url` as a long-lived event stream.
    async fn subscribe(&self, url: &Url) -> Result<Box<dyn ByteStream>, StreamError>;

    /// Record a server-timestamped hit at `url`; returns the response body.
    async fn record_hit(&self, url: &Url) -> Result<String>;
}
