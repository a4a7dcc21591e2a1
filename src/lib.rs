// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Chart Mail Gateway
//!
//! Accepts a base64-encoded chart image over HTTP and emails it to the
//! requested recipient as a PNG attachment:
//!
//! - Per-IP fixed-window rate limiting (30 requests per minute default)
//! - Recipient address validation
//! - Data-URL prefix stripping
//! - Encoded (6 MiB) and decoded (5 MiB) size ceilings
//! - Strict base64 decoding
//! - Background SMTP delivery with a 30 second bound

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod mailer;
pub mod validator;

pub use config::Config;
pub use error::AppError;
pub use handlers::{router, AppState};
pub use limiter::RateLimiter;
pub use mailer::{Mailer, OutgoingChart, SmtpMailer};
pub use validator::{validate_and_decode, ChartRequest, ValidationError};
