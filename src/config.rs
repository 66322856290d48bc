use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Which peripheral transport to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChannelMode {
    /// Use the Yun bridge if its socket answers at startup
    Auto,
    /// Always use the Yun bridge
    Bridge,
    /// Log mailbox messages instead of sending them
    Null,
}

/// Scoreboard bridge between a Firebase game database and a Yun board
#[derive(Parser, Debug, Clone)]
#[command(name = "scoreboard-bridge", version, about)]
pub struct Config {
    /// Firebase database base URL
    #[arg(long, env = "FIREBASE_URL")]
    pub firebase_url: String,

    /// Firebase auth token appended to every request
    #[arg(long, env = "FIREBASE_AUTH", hide_env_values = true)]
    pub firebase_auth: Option<String>,

    /// Board id to report instead of the hardware address
    #[arg(long, env = "DEVICE_ID")]
    pub device_id: Option<String>,

    /// Force-reconnect the table stream after this many seconds
    #[arg(long, env = "TABLE_INTERVAL_SECS", default_value = "60")]
    pub table_interval_secs: u64,

    /// Force-reconnect the game stream after this many seconds
    #[arg(long, env = "GAME_INTERVAL_SECS", default_value = "5")]
    pub game_interval_secs: u64,

    /// Resend board configuration every this many seconds
    #[arg(long, env = "CONFIG_INTERVAL_SECS", default_value = "10")]
    pub config_interval_secs: u64,

    /// Readiness wait for the streams and the mailbox, in milliseconds
    #[arg(long, env = "POLL_TIMEOUT_MS", default_value = "100")]
    pub poll_timeout_ms: u64,

    /// Sleep at the end of every loop iteration, in milliseconds
    #[arg(long, env = "LOOP_DELAY_MS", default_value = "100")]
    pub loop_delay_ms: u64,

    /// Stream subscription connect timeout in seconds
    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value = "3")]
    pub connect_timeout_secs: u64,

    /// Button hit request timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value = "10")]
    pub http_timeout_secs: u64,

    /// Yun bridge daemon socket
    #[arg(long, env = "BRIDGE_ADDR", default_value = "127.0.0.1:5700")]
    pub bridge_addr: String,

    /// Peripheral transport
    #[arg(long, env = "CHANNEL", value_enum, default_value = "auto")]
    pub channel: ChannelMode,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.firebase_url)
            .map_err(|e| anyhow::anyhow!("FIREBASE_URL '{}' is invalid: {}", self.firebase_url, e))?;
        for (name, value) in [
            ("table_interval_secs", self.table_interval_secs),
            ("game_interval_secs", self.game_interval_secs),
            ("config_interval_secs", self.config_interval_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("http_timeout_secs", self.http_timeout_secs),
        ] {
            if value == 0 {
                anyhow::bail!("{} must be positive", name);
            }
        }
        if !(1..1000).contains(&self.poll_timeout_ms) {
            anyhow::bail!("poll_timeout_ms must be between 1 and 999");
        }
        if self.loop_delay_ms >= 1000 {
            anyhow::bail!("loop_delay_ms must be below 1000");
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
