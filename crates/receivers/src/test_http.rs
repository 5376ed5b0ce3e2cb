//! One-request-per-connection HTTP server for receiver tests

use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// A request as the server saw it; header names are lowercased
#[derive(Debug)]
pub struct Recorded {
    pub line: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

pub struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl Reply {
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type", "application/json".to_string())],
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }
}

/// Answer one connection per reply, in order, and return what was asked
pub async fn serve(listener: TcpListener, replies: Vec<Reply>) -> Vec<Recorded> {
    let mut seen = Vec::new();
    for reply in replies {
        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = BufReader::new(stream);

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let mut headers = HashMap::new();
        loop {
            let mut header = String::new();
            reader.read_line(&mut header).await.unwrap();
            let header = header.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }
        let length = headers
            .get("content-length")
            .and_then(|l| l.parse().ok())
            .unwrap_or(0);
        let mut body = vec![0; length];
        reader.read_exact(&mut body).await.unwrap();

        let reason = match reply.status {
            200 => "OK",
            409 => "Conflict",
            _ => "Error",
        };
        let mut response = format!(
            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            reply.status,
            reason,
            reply.body.len()
        );
        for (name, value) in &reply.headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }
        response.push_str("\r\n");
        response.push_str(&reply.body);

        let stream = reader.get_mut();
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();

        seen.push(Recorded {
            line: line.trim_end().to_string(),
            headers,
            body: String::from_utf8(body).unwrap(),
        });
    }
    seen
}
