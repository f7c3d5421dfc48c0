// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers shared with the root scenario tests.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A one-shot HTTP/1.1 server on 127.0.0.1 standing in for a workload.
pub struct StubWorkload {
    pub port: u16,
    /// Resolves to the raw request text once a response has been sent.
    pub request: JoinHandle<io::Result<String>>,
}

/// Bind an ephemeral loopback port and answer one request with `status`
/// and `body`.
pub async fn stub_workload(status: u16, body: &'static str) -> io::Result<StubWorkload> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
    let port = listener.local_addr()?.port();
    let request = tokio::spawn(async move { serve_one(listener, status, body).await });
    Ok(StubWorkload { port, request })
}

/// A loopback port with nothing listening on it.
pub fn closed_port() -> io::Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    listener.local_addr().map(|addr| addr.port())
}

async fn serve_one(listener: TcpListener, status: u16, body: &str) -> io::Result<String> {
    let (mut socket, _) = listener.accept().await?;
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = header_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                break;
            }
        }
    }

    let response = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Length: {}\r\nX-Stub: 1\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
