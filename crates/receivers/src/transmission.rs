//! Transmission daemon statistics over its JSON-RPC interface

use crate::format::bytonize;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::{StatusCode, Url};
use rg_pipe_core::Receiver;
use rg_pipe_types::ReceiverConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_PATH: &str = "transmission/rpc";
const SESSION_HEADER: &str = "X-Transmission-Session-Id";
const SESSION_STATS: &str = r#"{"method":"session-stats"}"#;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Transfer totals for one period (all time or this session)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmissionStats {
    pub uploaded: String,
    pub downloaded: String,
    pub files_added: u64,
    pub session_count: u64,
    pub seconds_active: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransmissionResponse {
    pub torrent_count: u64,
    pub active_torrent_count: u64,
    pub paused_torrent_count: u64,
    pub download_speed: String,
    pub upload_speed: String,
    pub cumulative: TransmissionStats,
    pub current: TransmissionStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RpcReply {
    arguments: RpcSessionStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RpcSessionStats {
    torrent_count: u64,
    active_torrent_count: u64,
    paused_torrent_count: u64,
    download_speed: u64,
    upload_speed: u64,
    #[serde(rename = "cumulative-stats")]
    cumulative: RpcStats,
    #[serde(rename = "current-stats")]
    current: RpcStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RpcStats {
    uploaded_bytes: u64,
    downloaded_bytes: u64,
    files_added: u64,
    session_count: u64,
    seconds_active: u64,
}

impl RpcStats {
    fn format(&self, shorts: bool) -> TransmissionStats {
        TransmissionStats {
            uploaded: bytonize(self.uploaded_bytes, false, shorts),
            downloaded: bytonize(self.downloaded_bytes, false, shorts),
            files_added: self.files_added,
            session_count: self.session_count,
            seconds_active: self.seconds_active,
        }
    }
}

impl RpcSessionStats {
    fn format(&self, shorts: bool) -> TransmissionResponse {
        TransmissionResponse {
            torrent_count: self.torrent_count,
            active_torrent_count: self.active_torrent_count,
            paused_torrent_count: self.paused_torrent_count,
            download_speed: bytonize(self.download_speed, true, shorts),
            upload_speed: bytonize(self.upload_speed, true, shorts),
            cumulative: self.cumulative.format(shorts),
            current: self.current.format(shorts),
        }
    }
}

/// Session statistics from a Transmission daemon
///
/// Config keys: `address` (required, e.g. `http://localhost:9091`), `path`
/// (default `transmission/rpc`) and `shorts`. The CSRF session id handed
/// out with a 409 reply is kept for later requests.
#[derive(Debug, Clone)]
pub struct TransmissionReceiver {
    client: reqwest::Client,
    url: Option<Url>,
    session_id: String,
    shorts: bool,
}

impl Default for TransmissionReceiver {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            url: None,
            session_id: String::new(),
            shorts: false,
        }
    }
}

impl TransmissionReceiver {
    async fn post(&self, url: &Url) -> Result<reqwest::Response> {
        self.client
            .post(url.clone())
            .header(SESSION_HEADER, &self.session_id)
            .body(SESSION_STATS)
            .send()
            .await
            .map_err(|e| anyhow!("Transmission: cannot send request: {}", e))
    }
}

#[async_trait]
impl Receiver for TransmissionReceiver {
    async fn init(&mut self, config: &ReceiverConfig) -> Result<()> {
        let address = config
            .get_str("address")
            .ok_or_else(|| anyhow!("Transmission: `address` is required"))?;
        let mut url = Url::parse(address)
            .with_context(|| format!("Transmission: cannot parse address `{}`", address))?;
        url.set_path(config.get_str("path").unwrap_or(DEFAULT_PATH));

        self.url = Some(url);
        self.shorts = config.get_bool("shorts").unwrap_or(false);
        self.client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Transmission: cannot build HTTP client")?;
        Ok(())
    }

    async fn get(&mut self) -> Result<Option<Value>> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| anyhow!("Transmission: not initialised"))?;

        let mut resp = self.post(&url).await?;
        if resp.status() == StatusCode::CONFLICT {
            let session_id = resp
                .headers()
                .get(SESSION_HEADER)
                .and_then(|id| id.to_str().ok())
                .ok_or_else(|| anyhow!("Transmission: 409 without a session id"))?;
            debug!("Transmission: new session id {}", session_id);
            self.session_id = session_id.to_string();
            resp = self.post(&url).await?;
        }
        if resp.status() != StatusCode::OK {
            bail!("Transmission: wrong status code: {}", resp.status().as_u16());
        }

        let reply: RpcReply = resp.json().await.context("Transmission: invalid response")?;
        Ok(Some(serde_json::to_value(reply.arguments.format(self.shorts))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_http::{serve, Reply};
    use tokio::net::TcpListener;

    const STATS: &str = r#"{
        "arguments": {
            "activeTorrentCount": 2,
            "pausedTorrentCount": 1,
            "torrentCount": 3,
            "downloadSpeed": 1536,
            "uploadSpeed": 0,
            "cumulative-stats": {
                "uploadedBytes": 25165824, "downloadedBytes": 8589934592,
                "filesAdded": 40, "sessionCount": 12, "secondsActive": 86400
            },
            "current-stats": {
                "uploadedBytes": 512, "downloadedBytes": 2048,
                "filesAdded": 1, "sessionCount": 1, "secondsActive": 60
            }
        },
        "result": "success"
    }"#;

    async fn receiver_for(listener: &TcpListener, shorts: bool) -> TransmissionReceiver {
        let address = format!("http://{}", listener.local_addr().unwrap());
        let mut receiver = TransmissionReceiver::default();
        let config = ReceiverConfig::new()
            .with("address", address)
            .with("shorts", shorts);
        receiver.init(&config).await.unwrap();
        receiver
    }

    #[tokio::test]
    async fn test_init_requires_address() {
        let mut receiver = TransmissionReceiver::default();
        assert!(receiver.init(&ReceiverConfig::new()).await.is_err());

        let bad = ReceiverConfig::new().with("address", "not a url");
        assert!(receiver.init(&bad).await.is_err());
    }

    #[tokio::test]
    async fn test_session_id_is_picked_up_and_reused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut receiver = receiver_for(&listener, false).await;
        let server = tokio::spawn(serve(
            listener,
            vec![
                Reply::status(409).header(SESSION_HEADER, "abc123"),
                Reply::json(STATS),
                Reply::json(STATS),
            ],
        ));

        let value = receiver.get().await.unwrap().unwrap();
        let response: TransmissionResponse = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(response.torrent_count, 3);
        assert_eq!(response.active_torrent_count, 2);
        assert_eq!(response.download_speed, "1.5KB/s");
        assert_eq!(response.upload_speed, "0B/s");
        assert_eq!(response.cumulative.downloaded, "8.0GB");
        assert_eq!(response.cumulative.uploaded, "24MB");
        assert_eq!(response.current.seconds_active, 60);
        assert_eq!(value["cumulative"]["filesAdded"], 40);

        // The id is kept, so the next poll succeeds at once
        receiver.get().await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].line, "POST /transmission/rpc HTTP/1.1");
        assert_eq!(requests[0].body, SESSION_STATS);
        let ids: Vec<&str> = requests
            .iter()
            .map(|r| r.headers["x-transmission-session-id"].as_str())
            .collect();
        assert_eq!(ids, vec!["", "abc123", "abc123"]);
    }

    #[tokio::test]
    async fn test_shorts_and_custom_path() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let mut receiver = TransmissionReceiver::default();
        let config = ReceiverConfig::new()
            .with("address", address)
            .with("path", "/rpc")
            .with("shorts", true);
        receiver.init(&config).await.unwrap();
        let server = tokio::spawn(serve(listener, vec![Reply::json(STATS)]));

        let value = receiver.get().await.unwrap().unwrap();
        assert_eq!(value["downloadSpeed"], "1.5K/s");
        assert_eq!(value["cumulative"]["downloaded"], "8.0G");

        let requests = server.await.unwrap();
        assert_eq!(requests[0].line, "POST /rpc HTTP/1.1");
    }

    #[tokio::test]
    async fn test_other_status_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut receiver = receiver_for(&listener, false).await;
        let server = tokio::spawn(serve(listener, vec![Reply::status(401)]));

        let err = receiver.get().await.unwrap_err();
        assert!(err.to_string().contains("wrong status code: 401"), "{}", err);
        server.await.unwrap();
    }
}
