//! MPD receiver speaking the plain text protocol

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::warn;
use rg_pipe_core::Receiver;
use rg_pipe_types::ReceiverConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_ADDRESS: &str = "localhost:6600";
const GREETING: &str = "OK MPD";

/// `currentsong` and `status` fields as reported by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MpdResponse {
    pub song: BTreeMap<String, String>,
    pub status: BTreeMap<String, String>,
}

type Connection = BufReader<TcpStream>;

fn quote(arg: &str) -> String {
    format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Send one command and collect its `key: value` lines up to `OK`
async fn command(conn: &mut Connection, cmd: &str) -> Result<BTreeMap<String, String>> {
    conn.get_mut()
        .write_all(format!("{}\n", cmd).as_bytes())
        .await?;

    let mut fields = BTreeMap::new();
    loop {
        let mut line = String::new();
        if conn.read_line(&mut line).await? == 0 {
            bail!("connection closed");
        }
        let line = line.trim_end();
        if line == "OK" {
            return Ok(fields);
        }
        if let Some(ack) = line.strip_prefix("ACK ") {
            bail!("{}", ack);
        }
        if let Some((key, value)) = line.split_once(": ") {
            fields.insert(key.to_string(), value.to_string());
        }
    }
}

/// Current song and player status from an MPD server
///
/// Config keys: `address` (default `localhost:6600`) and `password`.
/// A fresh connection is made on every poll.
#[derive(Debug, Clone)]
pub struct MpdReceiver {
    address: String,
    password: Option<String>,
}

impl Default for MpdReceiver {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            password: None,
        }
    }
}

impl MpdReceiver {
    async fn connect(&self) -> Result<Connection> {
        let stream = TcpStream::connect(&self.address)
            .await
            .with_context(|| format!("Mpd: cannot connect to {}", self.address))?;
        let mut conn = BufReader::new(stream);

        let mut greeting = String::new();
        conn.read_line(&mut greeting).await?;
        if !greeting.starts_with(GREETING) {
            bail!("Mpd: unexpected greeting `{}`", greeting.trim_end());
        }

        if let Some(password) = &self.password {
            command(&mut conn, &format!("password {}", quote(password)))
                .await
                .context("Mpd: authentication failed")?;
        }
        Ok(conn)
    }

    async fn query(conn: &mut Connection, cmd: &str) -> BTreeMap<String, String> {
        command(conn, cmd).await.unwrap_or_else(|e| {
            warn!("Mpd: `{}` failed: {:#}", cmd, e);
            BTreeMap::new()
        })
    }
}

#[async_trait]
impl Receiver for MpdReceiver {
    async fn init(&mut self, config: &ReceiverConfig) -> Result<()> {
        if let Some(address) = config.get_str("address") {
            self.address = address.to_string();
        }
        self.password = config
            .get_str("password")
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Ok(())
    }

    async fn get(&mut self) -> Result<Option<Value>> {
        let mut conn = self.connect().await?;
        let response = MpdResponse {
            song: Self::query(&mut conn, "currentsong").await,
            status: Self::query(&mut conn, "status").await,
        };
        // The server drops idle clients anyway
        let _ = conn.get_mut().write_all(b"close\n").await;

        Ok(Some(serde_json::to_value(response)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Answer one client the way MPD does, returning the commands it sent
    async fn fake_mpd(listener: TcpListener) -> Vec<String> {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        write.write_all(b"OK MPD 0.23.5\n").await.unwrap();

        let mut lines = BufReader::new(read).lines();
        let mut seen = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            seen.push(line.clone());
            let reply: &[u8] = match line.as_str() {
                "password \"se\\\"cret\"" => b"OK\n",
                "currentsong" => b"file: a.flac\nArtist: Foo\nTitle: Bar\nOK\n",
                "status" => b"ACK [50@0] {status} no status today\n",
                _ => break,
            };
            write.write_all(reply).await.unwrap();
        }
        seen
    }

    #[tokio::test]
    async fn test_queries_song_and_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(fake_mpd(listener));

        let mut receiver = MpdReceiver::default();
        let config = ReceiverConfig::new()
            .with("address", address)
            .with("password", "se\"cret");
        receiver.init(&config).await.unwrap();

        let value = receiver.get().await.unwrap().unwrap();
        let response: MpdResponse = serde_json::from_value(value).unwrap();
        assert_eq!(response.song["Title"], "Bar");
        assert_eq!(response.song["Artist"], "Foo");
        // The failed status query is left empty
        assert!(response.status.is_empty());

        assert_eq!(
            server.await.unwrap(),
            vec!["password \"se\\\"cret\"", "currentsong", "status", "close"]
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_fetch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut receiver = MpdReceiver::default();
        receiver
            .init(&ReceiverConfig::new().with("address", address))
            .await
            .unwrap();
        assert!(receiver.get().await.is_err());
    }
}
