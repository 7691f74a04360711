//! Small REST client for the taskdeck server.
//!
//! Talks plain HTTP/1.1 over a blocking socket, one request per
//! connection. Non-2xx responses become errors carrying the server's
//! `error` message when one is present.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8765;

pub struct ApiClient {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn is_available(&self) -> bool {
        self.get_json("/health").is_ok()
    }

    pub fn get_json(&self, path: &str) -> Result<Value> {
        self.exchange("GET", path, None)
    }

    pub fn post_json(&self, path: &str, payload: &Value) -> Result<Value> {
        self.exchange("POST", path, Some(payload.to_string()))
    }

    fn exchange(&self, method: &str, path: &str, body: Option<String>) -> Result<Value> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .with_context(|| format!("cannot reach server at {}:{}", self.host, self.port))?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let payload = body.unwrap_or_default();
        let request = format!(
            "{method} {path} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
            self.host,
            payload.len(),
        );
        stream.write_all(request.as_bytes())?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw)?;
        let (status, body) = parse_response(&raw)?;
        if !(200..300).contains(&status) {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{method} {path} failed: {status}"));
            bail!(message);
        }
        Ok(body)
    }
}

fn parse_response(raw: &[u8]) -> Result<(u16, Value)> {
    let text = String::from_utf8_lossy(raw);
    let status: u16 = text
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| anyhow!("malformed HTTP response"))?;
    let body_text = text.split("\r\n\r\n").nth(1).unwrap_or("").trim();
    let body = if body_text.is_empty() {
        json!({})
    } else {
        serde_json::from_str(body_text).unwrap_or_else(|_| json!({}))
    };
    Ok((status, body))
}

/// Percent-encode a project name for use as a single path segment.
pub fn encode_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            other => {
                out.push('%');
                out.push_str(&format!("{other:02X}"));
            }
        }
    }
    out
}
