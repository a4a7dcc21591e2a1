// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the chart mail gateway.
//!
//! `POST /send-chart` runs the rate limiter and validator, schedules delivery
//! and answers straight away. Delivery happens after the response is sent.

use crate::config::{Config, CorsConfig};
use crate::error::{AppError, Result};
use crate::limiter::RateLimiter;
use crate::mailer::{dispatch, Mailer, OutgoingChart};
use crate::validator::{validate_and_decode, ChartRequest};
use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info, warn};

/// Largest JSON body accepted; leaves headroom over the 6 MiB payload ceiling.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Identity used when the peer address is unavailable.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Shared application state.
pub struct AppState<M> {
    pub limiter: RateLimiter,
    pub mailer: Arc<M>,
    pub config: Config,
}

impl<M: Mailer> AppState<M> {
    pub fn new(config: Config, mailer: M) -> Self {
        Self {
            limiter: RateLimiter::new(config.rate_limit.clone()),
            mailer: Arc::new(mailer),
            config,
        }
    }
}

/// Successful send acknowledgement.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub ok: bool,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the application router.
pub fn router<M: Mailer>(state: Arc<AppState<M>>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/send-chart", post(send_chart::<M>))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&state.config.cors) {
        app = app.layer(cors);
    }

    app.with_state(state)
}

/// CORS for a single configured origin; `None` leaves cross-origin requests alone.
fn cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    let origin = config.allowed_origin.as_deref()?;
    let origin = match HeaderValue::from_str(origin) {
        Ok(value) => value,
        Err(_) => {
            warn!(origin, "Ignoring unparseable ALLOWED_ORIGIN");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([origin]))
            .allow_methods([Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "chart-mail-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Accept a chart and schedule it for delivery.
pub async fn send_chart<M: Mailer>(
    State(state): State<Arc<AppState<M>>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<ChartRequest>,
) -> Result<Json<SendResponse>> {
    let identity = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string());

    if !state.limiter.admit(&identity).await {
        warn!(%identity, "Request rate limited");
        return Err(AppError::RateLimitExceeded);
    }

    let image = validate_and_decode(&req).map_err(|err| {
        info!(%identity, error = %err, "Validation failed");
        AppError::from(err)
    })?;

    if let Some(missing) = state.config.mail.missing_setting() {
        warn!(setting = missing, "Mail transport not configured");
        return Err(AppError::NotConfigured(missing));
    }

    let filename = req.filename().to_string();
    debug!(%identity, to = %req.to, %filename, bytes = image.len(), "Scheduling chart email");

    dispatch(
        Arc::clone(&state.mailer),
        OutgoingChart {
            to: req.to,
            filename,
            image,
        },
    );

    Ok(Json(SendResponse { ok: true }))
}

/// JSON 404 for any unmatched route.
pub async fn not_found() -> AppError {
    AppError::NotFound
}
