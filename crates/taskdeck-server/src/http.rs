//! Minimal HTTP/1.1 plumbing over a blocking `TcpStream`.
//!
//! Only what the route layer needs: a bounded request reader, a response
//! writer that always sends Content-Length, and a percent decoder for
//! project names embedded in path segments.

use std::io::{Read, Write};
use std::net::TcpStream;

const MAX_BODY_BYTES: usize = 256 * 1024;
const MAX_HEADER_BYTES: usize = 8 * 1024;

pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

pub fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<HttpRequest>> {
    let mut buf = [0u8; 4096];
    let mut data = Vec::<u8>::new();
    loop {
        let read = match stream.read(&mut buf) {
            Ok(read) => read,
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                break;
            }
            Err(err) => return Err(err),
        };
        if read == 0 {
            break;
        }
        data.extend_from_slice(&buf[..read]);
        if data.windows(4).any(|w| w == b"\r\n\r\n") || data.len() > MAX_HEADER_BYTES {
            break;
        }
    }
    if data.is_empty() {
        return Ok(None);
    }

    let header_end = data
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
        .unwrap_or(data.len());
    let header_end = header_end.min(data.len());
    let header_bytes = &data[..header_end];
    let mut body = data[header_end..].to_vec();

    let header_text = String::from_utf8_lossy(header_bytes);
    let mut lines = header_text.split("\r\n");
    let Some(request_line) = lines.next() else {
        return Ok(None);
    };
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("/").to_string();

    let mut content_length: usize = 0;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse::<usize>().unwrap_or(0);
        }
    }
    if content_length > MAX_BODY_BYTES {
        content_length = MAX_BODY_BYTES;
    }

    if content_length > body.len() {
        let mut remaining = content_length - body.len();
        while remaining > 0 {
            let read = match stream.read(&mut buf) {
                Ok(read) => read,
                Err(err)
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    break;
                }
                Err(err) => return Err(err),
            };
            if read == 0 {
                break;
            }
            let take = read.min(remaining);
            body.extend_from_slice(&buf[..take]);
            remaining = remaining.saturating_sub(take);
        }
    } else {
        body.truncate(content_length);
    }

    Ok(Some(HttpRequest { method, path, body }))
}

pub fn write_response(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &[u8],
    head_only: bool,
) -> std::io::Result<()> {
    let mut headers = String::new();
    headers.push_str("HTTP/1.1 ");
    headers.push_str(status);
    headers.push_str("\r\n");
    headers.push_str("Content-Type: ");
    headers.push_str(content_type);
    headers.push_str("\r\n");
    headers.push_str("Cache-Control: no-store\r\n");
    headers.push_str("X-Content-Type-Options: nosniff\r\n");
    headers.push_str("Connection: close\r\n");
    headers.push_str("Content-Length: ");
    headers.push_str(&body.len().to_string());
    headers.push_str("\r\n\r\n");

    stream.write_all(headers.as_bytes())?;
    if !head_only {
        stream.write_all(body)?;
    }
    stream.flush()
}

pub fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        400 => "400 Bad Request",
        403 => "403 Forbidden",
        404 => "404 Not Found",
        405 => "405 Method Not Allowed",
        _ => "500 Internal Server Error",
    }
}

/// Decode a percent-encoded path segment. Unlike query decoding, `+` is a
/// literal plus sign here. Invalid escapes or non-UTF-8 yield `None`.
pub fn percent_decode(segment: &str) -> Option<String> {
    let bytes = segment.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut idx = 0usize;
    while idx < bytes.len() {
        match bytes[idx] {
            b'%' if idx + 2 < bytes.len() => {
                let hex = |b: u8| match b {
                    b'0'..=b'9' => Some(b - b'0'),
                    b'a'..=b'f' => Some(b - b'a' + 10),
                    b'A'..=b'F' => Some(b - b'A' + 10),
                    _ => None,
                };
                let hi = hex(bytes[idx + 1])?;
                let lo = hex(bytes[idx + 2])?;
                out.push((hi << 4) | lo);
                idx += 3;
            }
            b'%' => return None,
            byte => {
                out.push(byte);
                idx += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_percent_escapes_in_segments() {
        assert_eq!(percent_decode("My%20Project").as_deref(), Some("My Project"));
        assert_eq!(percent_decode("plain").as_deref(), Some("plain"));
        assert_eq!(percent_decode("a%2Fb").as_deref(), Some("a/b"));
    }

    #[test]
    fn plus_is_literal_in_path_segments() {
        assert_eq!(percent_decode("a+b").as_deref(), Some("a+b"));
    }

    #[test]
    fn rejects_truncated_or_invalid_escapes() {
        assert!(percent_decode("bad%2").is_none());
        assert!(percent_decode("bad%zz").is_none());
        assert!(percent_decode("%ff").is_none());
    }
}
