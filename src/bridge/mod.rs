//! Local channel to the scoreboard microcontroller.
//!
//! On a Yún the Linux side talks to the sketch through the bridge daemon's
//! mailbox. Off-device there is no bridge, so [`NullChannel`] stands in and
//! only logs what it would have sent.

pub mod null;
pub mod yun;

pub use null::NullChannel;
pub use yun::BridgeChannel;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::config::ChannelMode;
use crate::error::ChannelError;
use crate::session::{DeviceIdentity, ScorePair};

/// Capability set of a peripheral transport.
#[async_trait]
pub trait LocalChannel: Send {
    /// (Re)establish the transport. Cheap when already established.
    async fn begin(&mut self) -> bool;

    /// Best-effort write of one mailbox message; nothing is acknowledged.
    async fn send_message(&mut self, text: &str) -> Result<(), ChannelError>;

    /// Wait up to `timeout` for one queued message. `Ok(None)` when nothing
    /// arrived in time.
    async fn read_message(&mut self, timeout: Duration) -> Result<Option<String>, ChannelError>;

    async fn close(&mut self);

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// Messages the sketch understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Mac(DeviceIdentity),
    Eip(String),
    Score(ScorePair),
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Mac(device) => write!(f, "mac:{}", device),
            Message::Eip(ip) => write!(f, "eip:{}", ip),
            Message::Score(score) => write!(f, "sco:{} {}", score.team_1, score.team_2),
        }
    }
}

/// Pick the transport for this host. `Auto` uses the bridge only if its
/// socket accepts a connection right now.
pub async fn select_channel(
    mode: ChannelMode,
    bridge_addr: &str,
    connect_timeout: Duration,
) -> Box<dyn LocalChannel> {
    let use_bridge = match mode {
        ChannelMode::Bridge => true,
        ChannelMode::Null => false,
        ChannelMode::Auto => BridgeChannel::probe(bridge_addr, connect_timeout).await,
    };

    if use_bridge {
        info!("Using Yun bridge at {}", bridge_addr);
        Box::new(BridgeChannel::new(bridge_addr, connect_timeout))
    } else {
        info!("No bridge available, mailbox messages will only be logged");
        Box::new(NullChannel)
    }
}
