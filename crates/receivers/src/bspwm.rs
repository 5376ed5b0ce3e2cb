//! bspwm receiver following the window manager's report subscription

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use rg_pipe_core::{EventedReceiver, Receiver};
use rg_pipe_types::ReceiverConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

const SOCKET_ENV: &str = "BSPWM_SOCKET";
const SOCKET_DIR: &str = "/tmp";
const SOCKET_PREFIX: &str = "bspwm";
const SUBSCRIBE: &[u8] = b"subscribe\0report\0";

/// Pause after a failed read or connect before the next attempt
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BspwmDesktop {
    pub name: String,
    /// Report flag: `O`/`o` occupied, `F`/`f` free, `U`/`u` urgent;
    /// upper case when focused
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BspwmMonitor {
    pub name: String,
    /// `M` focused, `m` unfocused
    pub state: String,
    pub index: usize,
    pub desktops: Vec<BspwmDesktop>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BspwmResponse {
    pub monitors: Vec<BspwmMonitor>,
}

/// Parse one `W...` report line
///
/// Layout, monitor flags and anything unknown are ignored.
fn parse_report(line: &str) -> BspwmResponse {
    let line = line.trim_end();
    let body = line.strip_prefix('W').unwrap_or(line);

    let mut monitors: Vec<BspwmMonitor> = Vec::new();
    for piece in body.split(':') {
        let mut chars = piece.chars();
        let Some(state) = chars.next() else {
            continue;
        };
        let value = chars.as_str().to_string();
        match state {
            'M' | 'm' => {
                let index = monitors.len();
                monitors.push(BspwmMonitor {
                    name: value,
                    state: state.to_string(),
                    index,
                    desktops: Vec::new(),
                });
            }
            'O' | 'o' | 'F' | 'f' | 'U' | 'u' => match monitors.last_mut() {
                Some(monitor) => monitor.desktops.push(BspwmDesktop {
                    name: value,
                    state: state.to_string(),
                }),
                None => debug!("bspwm: desktop `{}` reported before any monitor", value),
            },
            _ => {}
        }
    }
    BspwmResponse { monitors }
}

async fn find_socket(config: &ReceiverConfig) -> Result<PathBuf> {
    if let Some(socket) = config.get_str("socket") {
        return Ok(PathBuf::from(socket));
    }
    if let Ok(socket) = std::env::var(SOCKET_ENV) {
        if !socket.is_empty() {
            return Ok(PathBuf::from(socket));
        }
    }

    let mut entries = tokio::fs::read_dir(SOCKET_DIR)
        .await
        .with_context(|| format!("bspwm: cannot list {}", SOCKET_DIR))?;
    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with(SOCKET_PREFIX) {
            candidates.push(entry.path());
        }
    }
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("bspwm: cannot find socket file"))
}

async fn subscribe(socket: &Path) -> Result<BufReader<UnixStream>> {
    let mut stream = UnixStream::connect(socket)
        .await
        .with_context(|| format!("bspwm: cannot connect to {}", socket.display()))?;
    stream
        .write_all(SUBSCRIBE)
        .await
        .context("bspwm: cannot write to socket")?;
    Ok(BufReader::new(stream))
}

/// Desktop and monitor state reported by bspwm
///
/// Config key: `socket` (defaults to `$BSPWM_SOCKET`, then the first
/// `/tmp/bspwm*` file).
#[derive(Debug, Default)]
pub struct BspwmReceiver {
    socket: PathBuf,
    reader: Option<BufReader<UnixStream>>,
}

impl BspwmReceiver {
    /// Read the next report, subscribing again if the previous connection
    /// was lost
    async fn read_report(&mut self) -> Result<BspwmResponse> {
        let mut reader = match self.reader.take() {
            Some(reader) => reader,
            None => {
                debug!("bspwm: reconnecting to {}", self.socket.display());
                subscribe(&self.socket).await?
            }
        };

        let mut line = String::new();
        let read = reader
            .read_line(&mut line)
            .await
            .context("bspwm: cannot read from socket")?;
        if read == 0 {
            bail!("bspwm: socket closed");
        }
        self.reader = Some(reader);
        Ok(parse_report(&line))
    }
}

#[async_trait]
impl Receiver for BspwmReceiver {
    async fn init(&mut self, config: &ReceiverConfig) -> Result<()> {
        self.socket = find_socket(config).await?;
        self.reader = Some(subscribe(&self.socket).await?);
        info!("bspwm: subscribed on {}", self.socket.display());
        Ok(())
    }

    async fn get(&mut self) -> Result<Option<Value>> {
        match self.read_report().await {
            Ok(response) => Ok(Some(serde_json::to_value(response)?)),
            Err(e) => {
                tokio::time::sleep(RECONNECT_DELAY).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EventedReceiver for BspwmReceiver {
    async fn get_evented(&mut self) -> Result<Option<Value>> {
        self.get().await
    }
}
