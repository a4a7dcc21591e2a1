// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for driving the gateway router in-process.
//!
//! Provides a channel-backed [`Mailer`] and helpers for issuing requests
//! against the router without binding a socket.

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use chart_mail_gateway::{
    config::{Config, MailConfig, RateLimitConfig},
    handlers::{router, AppState},
    mailer::{MailError, Mailer, OutgoingChart},
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tower::ServiceExt;

/// Mailer that reports every chart on a channel.
///
/// When gated, each send blocks until [`FakeMailer::release`] is notified.
pub struct FakeMailer {
    sent: mpsc::UnboundedSender<OutgoingChart>,
    gate: Option<Arc<Notify>>,
}

impl Mailer for FakeMailer {
    async fn send(&self, chart: OutgoingChart) -> Result<(), MailError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let _ = self.sent.send(chart);
        Ok(())
    }
}

/// Router plus handles for inspecting what it did.
pub struct TestApp {
    pub state: Arc<AppState<FakeMailer>>,
    pub sent: mpsc::UnboundedReceiver<OutgoingChart>,
    pub gate: Option<Arc<Notify>>,
}

impl TestApp {
    pub fn new(config: Config) -> Self {
        Self::build(config, None)
    }

    /// App whose mailer holds every send until released.
    pub fn gated(config: Config) -> Self {
        Self::build(config, Some(Arc::new(Notify::new())))
    }

    fn build(config: Config, gate: Option<Arc<Notify>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mailer = FakeMailer {
            sent: tx,
            gate: gate.clone(),
        };
        Self {
            state: Arc::new(AppState::new(config, mailer)),
            sent: rx,
            gate,
        }
    }

    /// Router without peer address information.
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Router that sees every request as coming from `peer`.
    pub fn router_from(&self, peer: &str) -> Router {
        let addr: SocketAddr = peer.parse().expect("valid socket address");
        router(self.state.clone()).layer(MockConnectInfo(addr))
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    /// Wait briefly for the next delivered chart.
    pub async fn next_sent(&mut self) -> Option<OutgoingChart> {
        tokio::time::timeout(Duration::from_secs(2), self.sent.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Configuration with a complete mail section.
pub fn configured() -> Config {
    Config {
        mail: MailConfig {
            host: Some("smtp.example.test".to_string()),
            from: Some("charts@example.com".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn with_rate_limit(mut config: Config, max_requests: u32, window_ms: u64) -> Config {
    config.rate_limit = RateLimitConfig {
        window_ms,
        max_requests,
    };
    config
}

/// Issue a request and return status, headers and parsed JSON body.
pub async fn call(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

/// `POST /send-chart` and return status and JSON body.
pub async fn send_chart(app: Router, body: &Value) -> (StatusCode, Value) {
    let (status, _, body) = call(app, post_json("/send-chart", body)).await;
    (status, body)
}
