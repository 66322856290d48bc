use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::endpoints::redacted;
use super::store::{ByteStream, RemoteStore};
use crate::error::StreamError;

/// Client for the Firebase realtime database REST streaming API.
#[derive(Clone)]
pub struct FirebaseClient {
    /// No overall timeout: subscriptions stay open for minutes.
    stream_http: Client,
    write_http: Client,
    connect_timeout: Duration,
}

impl FirebaseClient {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let stream_http = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to build streaming HTTP client")?;
        let write_http = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(FirebaseClient {
            stream_http,
            write_http,
            connect_timeout,
        })
    }
}

/// Response body of a subscription, chunk by chunk.
pub struct ResponseStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
}

#[async_trait]
impl ByteStream for ResponseStream {
    async fn next_chunk(&mut self) -> Option<Result<Vec<u8>, StreamError>> {
        self.body
            .next()
            .await
            .map(|chunk| chunk.map_err(|e| StreamError::Body(e.without_url())))
    }
}

#[async_trait]
impl RemoteStore for FirebaseClient {
    async fn subscribe(&self, url: &Url) -> Result<Box<dyn ByteStream>, StreamError> {
        debug!("Subscribing to {}", redacted(url));

        // Bound the wait for response headers too, not just the TCP connect.
        let request = self
            .stream_http
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .send();
        let resp = match tokio::time::timeout(self.connect_timeout, request).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                return Err(StreamError::Connect {
                    url: redacted(url),
                    source: e.without_url(),
                })
            }
            Err(_) => return Err(StreamError::Timeout { url: redacted(url) }),
        };

        if !resp.status().is_success() {
            return Err(StreamError::Status {
                url: redacted(url),
                status: resp.status(),
            });
        }

        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(Box::new(ResponseStream { body }))
    }

    async fn record_hit(&self, url: &Url) -> Result<String> {
        let body = serde_json::json!({ ".sv": "timestamp" });
        let resp = self
            .write_http
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| e.without_url())
            .with_context(|| format!("Hit request to {} failed", redacted(url)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| e.without_url())
            .context("Failed to read hit response")?;
        if !status.is_success() {
            anyhow::bail!("Hit rejected {}: {}", status, text);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn client() -> FirebaseClient {
        FirebaseClient::new(Duration::from_millis(300), Duration::from_secs(2)).unwrap()
    }

    /// Read one HTTP request: headers, then `content-length` bytes of body.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_ascii_lowercase();
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .map_or(0, |v| v.trim().parse::<usize>().unwrap());
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Answer a single request with `response`, returning what was received.
    async fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            request
        });
        (base, handle)
    }

    fn url(base: &str, path: &str) -> Url {
        Url::parse(&format!("{}{}", base, path)).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_requests_event_stream_and_yields_body() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ncontent-length: 24\r\n\r\nevent: keep-alive\ndata:\n",
        )
        .await;

        let mut stream = match client().subscribe(&url(&base, "/games/a.json")).await {
            Ok(stream) => stream,
            Err(e) => panic!("subscribe failed: {}", e),
        };
        let mut body = Vec::new();
        while let Some(chunk) = stream.next_chunk().await {
            body.extend(chunk.unwrap());
        }
        assert_eq!(body, b"event: keep-alive\ndata:\n");

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get /games/a.json http/1.1"));
        assert!(request.contains("accept: text/event-stream"));
    }

    #[tokio::test]
    async fn test_subscribe_rejects_non_success_status() {
        let (base, _server) =
            serve_once("HTTP/1.1 401 Unauthorized\r\ncontent-length: 0\r\n\r\n").await;

        match client().subscribe(&url(&base, "/games/a.json?auth=bad")).await {
            Err(StreamError::Status { url, status }) => {
                assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
                assert!(!url.contains("auth=bad"));
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("401 must not open a stream"),
        }
    }

    #[tokio::test]
    async fn test_subscribe_times_out_on_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let started = tokio::time::Instant::now();
        let result = client().subscribe(&url(&base, "/tables/x/current_game.json")).await;
        assert!(matches!(result, Err(StreamError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_record_hit_posts_server_timestamp() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 16\r\n\r\n{\"name\":\"-KHx9\"}",
        )
        .await;

        let body = client()
            .record_hit(&url(&base, "/switches/red-1/hits.json"))
            .await
            .unwrap();
        assert_eq!(body, r#"{"name":"-KHx9"}"#);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /switches/red-1/hits.json HTTP/1.1"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/json"));
        assert!(request.ends_with(r#"{".sv":"timestamp"}"#));
    }

    #[tokio::test]
    async fn test_record_hit_fails_on_rejection() {
        let (base, _server) = serve_once(
            "HTTP/1.1 403 Forbidden\r\ncontent-length: 18\r\n\r\n{\"error\":\"denied\"}",
        )
        .await;

        let err = client()
            .record_hit(&url(&base, "/switches/red-1/hits.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
