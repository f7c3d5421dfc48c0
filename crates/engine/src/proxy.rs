// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reverse proxy from `/programs/{id}/proxy/...` to a workload's loopback port.
//!
//! A request is only forwarded when the supervisor reports `Ready`; any other
//! lifecycle is answered locally with 503 and no connection is attempted.

use crate::registry::Registry;
use berth_core::{Clock, Lifecycle, WorkloadId};
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const PROXY_PREFIX: &str = "/programs/";

pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Split a proxy path into the workload id and the upstream path.
///
/// `/programs/{id}/proxy` maps to `/`, `/programs/{id}/proxy/a/b` to `/a/b`.
pub fn parse_proxy_path(path: &str) -> Option<(WorkloadId, String)> {
    let rest = path.strip_prefix(PROXY_PREFIX)?;
    let (id, rest) = rest.split_once('/')?;
    if id.is_empty() {
        return None;
    }
    let tail = rest.strip_prefix("proxy")?;
    let upstream = match tail {
        "" => "/",
        t if t.starts_with('/') => t,
        _ => return None,
    };
    Some((WorkloadId::new(id), upstream.to_string()))
}

#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Upstream path, starting with `/`
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: None, headers: HeaderMap::new(), body: Bytes::new() }
    }

    berth_core::setters! {
        set {
            query: Option<String>,
            headers: HeaderMap,
            body: Bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    lifecycle: Option<Lifecycle>,
}

impl ProxyResponse {
    pub fn error(status: StatusCode, kind: &str, message: impl Into<String>, lifecycle: Option<Lifecycle>) -> Self {
        let body = ErrorBody { error: kind, message: message.into(), lifecycle };
        let body = serde_json::to_vec(&body).map(Bytes::from).unwrap_or_default();
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self { status, headers, body }
    }

    /// Body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by Connection are hop-by-hop too
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in &named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

fn upstream_url(port: u16, path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("http://127.0.0.1:{port}{path}?{q}"),
        _ => format!("http://127.0.0.1:{port}{path}"),
    }
}

pub struct ProxyRouter<C: Clock> {
    registry: Arc<Registry<C>>,
    client: reqwest::Client,
    timeout: Duration,
}

impl<C: Clock> ProxyRouter<C> {
    pub fn new(registry: Arc<Registry<C>>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .build()?;
        Ok(Self { registry, client, timeout })
    }

    /// Route a full request path such as `/programs/{id}/proxy/health?x=1`.
    /// A query string in `full_path` replaces the request's own.
    pub async fn route(&self, full_path: &str, request: ProxyRequest) -> ProxyResponse {
        let (path, query) = match full_path.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (full_path, request.query.clone()),
        };
        match parse_proxy_path(path) {
            Some((id, path)) => self.forward(&id, ProxyRequest { path, query, ..request }).await,
            None => ProxyResponse::error(StatusCode::NOT_FOUND, "not_found", "no route", None),
        }
    }

    pub async fn forward(&self, id: &WorkloadId, request: ProxyRequest) -> ProxyResponse {
        let Some(metadata) = self.registry.get(id) else {
            return ProxyResponse::error(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("workload {id} not found"),
                None,
            );
        };
        let Some(supervisor) = self.registry.get_supervisor(id) else {
            return ProxyResponse::error(
                StatusCode::SERVICE_UNAVAILABLE,
                "unavailable",
                format!("workload {id} has no supervisor"),
                None,
            );
        };
        let lifecycle = supervisor.state().lifecycle;
        if lifecycle != Lifecycle::Ready {
            return ProxyResponse::error(
                StatusCode::SERVICE_UNAVAILABLE,
                "not_ready",
                format!("workload {id} is {lifecycle}"),
                Some(lifecycle),
            );
        }

        let url = upstream_url(metadata.publish_port, &request.path, request.query.as_deref());
        let mut headers = request.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        let sent = self
            .client
            .request(request.method.clone(), &url)
            .headers(headers)
            .body(request.body)
            .timeout(self.timeout)
            .send()
            .await;

        let upstream_error = |e: reqwest::Error| {
            let message = if e.is_timeout() { "upstream timed out".to_string() } else { e.to_string() };
            tracing::warn!(workload = %id, method = %request.method, url = %url, error = %message, "proxy upstream failed");
            ProxyResponse::error(StatusCode::BAD_GATEWAY, "bad_gateway", message, Some(lifecycle))
        };

        let response = match sent {
            Ok(response) => response,
            Err(e) => return upstream_error(e),
        };
        let status = response.status();
        let mut headers = response.headers().clone();
        match response.bytes().await {
            Ok(body) => {
                strip_hop_by_hop(&mut headers);
                tracing::debug!(workload = %id, method = %request.method, path = %request.path, status = status.as_u16(), "proxied");
                ProxyResponse { status, headers, body }
            }
            Err(e) => upstream_error(e),
        }
    }
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
