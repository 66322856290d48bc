use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use super::LocalChannel;
use crate::error::ChannelError;

/// Mailbox channel through the Yún bridge daemon's JSON socket.
///
/// Writes go over one held connection, drained of anything the daemon
/// pushes to it on every `begin`. The stock bridge client has no
/// receive call, so reads open a short-lived probe connection, wait for the
/// daemon to push one `{"data": ...}` object, and close it again.
pub struct BridgeChannel {
    addr: String,
    connect_timeout: Duration,
    writer: Option<TcpStream>,
}

impl BridgeChannel {
    pub fn new(addr: &str, connect_timeout: Duration) -> Self {
        BridgeChannel {
            addr: addr.to_string(),
            connect_timeout,
            writer: None,
        }
    }

    /// Whether a bridge daemon is accepting connections at `addr`.
    pub async fn probe(addr: &str, connect_timeout: Duration) -> bool {
        connect(addr, connect_timeout).await.is_ok()
    }
}

#[async_trait]
impl LocalChannel for BridgeChannel {
    async fn begin(&mut self) -> bool {
        if let Some(stream) = self.writer.as_ref() {
            if drain_unsolicited(stream) {
                return true;
            }
            debug!("Bridge at {} closed the connection", self.addr);
            self.writer = None;
        }
        match connect(&self.addr, self.connect_timeout).await {
            Ok(stream) => {
                debug!("Bridge connected at {}", self.addr);
                self.writer = Some(stream);
                true
            }
            Err(e) => {
                debug!("{}", e);
                false
            }
        }
    }

    async fn send_message(&mut self, text: &str) -> Result<(), ChannelError> {
        let Some(stream) = self.writer.as_mut() else {
            return Err(ChannelError::Write(std::io::ErrorKind::NotConnected.into()));
        };
        let payload = encode_raw(text);
        if let Err(e) = stream.write_all(payload.as_bytes()).await {
            // Reconnect on the next begin().
            self.writer = None;
            return Err(ChannelError::Write(e));
        }
        Ok(())
    }

    async fn read_message(&mut self, timeout: Duration) -> Result<Option<String>, ChannelError> {
        let probe = async {
            // An unreachable daemon means no message, same as a quiet one.
            let mut socket = match connect(&self.addr, timeout).await {
                Ok(socket) => socket,
                Err(e) => {
                    trace!("Mailbox read skipped: {}", e);
                    return Ok(None);
                }
            };
            let result = read_one(&mut socket).await;
            let _ = socket.shutdown().await;
            result
        };
        match tokio::time::timeout(timeout, probe).await {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.writer.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("Bridge shutdown failed: {}", e);
            }
        }
    }

    fn name(&self) -> &str {
        "bridge"
    }
}

async fn connect(addr: &str, wait: Duration) -> Result<TcpStream, ChannelError> {
    match tokio::time::timeout(wait, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(ChannelError::Connect {
            addr: addr.to_string(),
            source,
        }),
        Err(_) => Err(ChannelError::ConnectTimeout(addr.to_string())),
    }
}

/// Discard whatever is already readable on the write connection. Returns
/// false once the daemon has closed it.
fn drain_unsolicited(stream: &TcpStream) -> bool {
    let mut buf = [0u8; 512];
    loop {
        match stream.try_read(&mut buf) {
            Ok(0) => return false,
            Ok(n) => trace!("Discarded {} unsolicited bridge bytes", n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return true,
            Err(e) => {
                debug!("Bridge connection failed: {}", e);
                return false;
            }
        }
    }
}

fn encode_raw(text: &str) -> String {
    serde_json::json!({ "command": "raw", "data": text }).to_string()
}

async fn read_one(socket: &mut TcpStream) -> Result<Option<String>, ChannelError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        let n = socket.read(&mut chunk).await.map_err(ChannelError::Read)?;
        if n == 0 {
            if buf.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            return Err(ChannelError::Malformed(format!(
                "truncated message: {}",
                String::from_utf8_lossy(&buf)
            )));
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(message) = decode_message(&buf)? {
            return Ok(Some(message));
        }
    }
}

/// Decode the first JSON object in `buf`. `Ok(None)` means it is incomplete.
fn decode_message(buf: &[u8]) -> Result<Option<String>, ChannelError> {
    let mut values = serde_json::Deserializer::from_slice(buf).into_iter::<Value>();
    match values.next() {
        None => Ok(None),
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(ChannelError::Malformed(e.to_string())),
        Some(Ok(value)) => match value.get("data").and_then(Value::as_str) {
            Some(data) => Ok(Some(data.to_string())),
            None => Err(ChannelError::Malformed(format!("no data field in {}", value))),
        },
    }
}
