// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Chart Mail Gateway Service
//!
//! Single-endpoint relay: `POST /send-chart` with `{to, filename?, data}`
//! where `data` is a base64 PNG, optionally carrying a `data:` URL prefix.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (and a `.env` file,
//! when present):
//!
//! - `PORT` / `BIND_ADDR`: listen address (default: 0.0.0.0:3000)
//! - `RATE_WINDOW_MS`: rate window in milliseconds (default: 60000)
//! - `RATE_MAX`: max requests per window per IP (default: 30)
//! - `ALLOWED_ORIGIN`: single origin allowed cross-origin (default: none)
//! - `SMTP_HOST`, `SMTP_PORT` (587), `SMTP_SECURE`, `SMTP_USER`, `SMTP_PASS`
//! - `EMAIL_FROM`: sender address

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chart_mail_gateway::{config::Config, handlers::router, AppState, SmtpMailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the real environment still applies.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        rate_max = config.rate_limit.max_requests,
        rate_window_ms = config.rate_limit.window_ms,
        allowed_origin = ?config.cors.allowed_origin,
        smtp_host = ?config.mail.host,
        smtp_port = config.mail.port,
        smtp_secure = config.mail.secure,
        "Starting chart mail gateway"
    );
    if let Some(missing) = config.mail.missing_setting() {
        warn!(setting = missing, "Mail transport incomplete; sends will be refused");
    }

    let mailer = SmtpMailer::new(config.mail.clone());
    let state = Arc::new(AppState::new(config.clone(), mailer));

    // Spawn cleanup task
    let cleanup_state = state.clone();
    let sweep_every = config.rate_limit.window_duration().max(std::time::Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            cleanup_state.limiter.cleanup().await;
        }
    });

    let app = router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
