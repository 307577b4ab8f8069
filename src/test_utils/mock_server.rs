//! Minimal HTTP/1.1 server standing in for the Logtree API.
//!
//! Each accepted connection is read as a single request, forwarded to the
//! test thread and answered with a fixed status. Responses close the
//! connection so every delivery attempt shows up as a fresh request.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde_json::Value;

/// How long test helpers wait for a request or a delivery to complete.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A request received by [`MockServer`].
#[derive(Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    /// Header names are lower-cased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

/// HTTP server answering every request with a fixed status and body.
pub struct MockServer {
    pub addr: SocketAddr,
    requests: mpsc::Receiver<CapturedRequest>,
}

impl MockServer {
    pub fn start(status: u16) -> Self {
        Self::start_with_body(status, "")
    }

    pub fn start_with_body(status: u16, body: &'static str) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("listener has address");
        let (tx, requests) = mpsc::channel();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    break;
                };
                // Forward before answering so the capture is visible once the
                // client sees the response.
                if tx.send(read_http_request(&mut stream)).is_err() {
                    break;
                }
                let response = format!(
                    "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        Self { addr, requests }
    }

    /// API root served by this mock, suitable for `LogtreeConfig::base_url`.
    pub fn base_url(&self) -> String {
        format!("http://{}/api/v1", self.addr)
    }

    /// Next captured request, panicking if none arrives in time.
    pub fn next_request(&self) -> CapturedRequest {
        self.requests
            .recv_timeout(RECV_TIMEOUT)
            .expect("mock server received a request")
    }

    /// Collect exactly `count` requests.
    pub fn requests(&self, count: usize) -> Vec<CapturedRequest> {
        (0..count).map(|_| self.next_request()).collect()
    }

    /// Requests already captured, without waiting.
    pub fn received(&self) -> Vec<CapturedRequest> {
        self.requests.try_iter().collect()
    }

    /// Assert nothing further arrives within `wait`.
    pub fn assert_idle(&self, wait: Duration) {
        assert!(
            self.requests.recv_timeout(wait).is_err(),
            "unexpected extra request"
        );
    }
}

fn read_http_request(stream: &mut TcpStream) -> CapturedRequest {
    let _ = stream.set_read_timeout(Some(RECV_TIMEOUT));
    let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .expect("read request line");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_owned();
    let path = parts.next().unwrap_or_default().to_owned();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("read header");
        let Some((key, value)) = line.trim().split_once(':') else {
            break;
        };
        let (key, value) = (key.trim().to_lowercase(), value.trim().to_owned());
        if key == "content-length" {
            content_length = value.parse().unwrap_or(0);
        }
        headers.push((key, value));
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).expect("read body");
    CapturedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    }
}
