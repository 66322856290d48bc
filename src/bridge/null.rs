use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use super::LocalChannel;
use crate::error::ChannelError;

/// A bridge that can run off the board, for development.
pub struct NullChannel;

#[async_trait]
impl LocalChannel for NullChannel {
    async fn begin(&mut self) -> bool {
        true
    }

    async fn send_message(&mut self, text: &str) -> Result<(), ChannelError> {
        info!("SENDING {}", text);
        Ok(())
    }

    async fn read_message(&mut self, _timeout: Duration) -> Result<Option<String>, ChannelError> {
        Ok(None)
    }

    async fn close(&mut self) {}

    fn name(&self) -> &str {
        "null"
    }
}
