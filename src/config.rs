// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the chart mail gateway.
//!
//! Everything is sourced from the process environment once, in `main`, and
//! handed to each component at construction time.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the chart mail gateway service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:3000)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Cross-origin policy
    #[serde(default)]
    pub cors: CorsConfig,

    /// Outbound SMTP configuration
    #[serde(default)]
    pub mail: MailConfig,
}

/// Fixed-window rate limiting, keyed by client address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in milliseconds (default: 60000)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Maximum admitted requests per window per client (default: 30)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Single origin allowed to POST cross-origin. `None` disables CORS.
    #[serde(default)]
    pub allowed_origin: Option<String>,
}

/// SMTP transport settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub host: Option<String>,

    /// SMTP port (default: 587)
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Encrypt the connection: implicit TLS on port 465, STARTTLS otherwise.
    #[serde(default)]
    pub secure: bool,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Sender address for outgoing mail
    #[serde(default)]
    pub from: Option<String>,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .finish()
    }
}

// Default value functions
fn default_port() -> u16 {
    3000
}

fn default_bind_addr() -> String {
    format!("0.0.0.0:{}", default_port())
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_requests() -> u32 {
    30
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            mail: MailConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            secure: false,
            username: None,
            password: None,
            from: None,
        }
    }
}

impl RateLimitConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl MailConfig {
    /// Name of the first required setting that is missing, if any.
    pub fn missing_setting(&self) -> Option<&'static str> {
        if is_blank(&self.host) {
            Some("SMTP_HOST")
        } else if is_blank(&self.from) {
            Some("EMAIL_FROM")
        } else {
            None
        }
    }

    /// Username and password, only when both are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }

    /// Whether to open the connection with implicit TLS rather than STARTTLS.
    pub fn implicit_tls(&self) -> bool {
        self.secure && self.port == 465
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Numeric values that fail to parse fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = non_empty("BIND_ADDR").unwrap_or_else(|| {
            let port = non_empty("PORT")
                .and_then(|v| v.trim().parse::<u16>().ok())
                .unwrap_or_else(default_port);
            format!("0.0.0.0:{}", port)
        });

        Config {
            bind_addr,
            rate_limit: RateLimitConfig {
                window_ms: non_empty("RATE_WINDOW_MS")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or_else(default_window_ms),
                max_requests: non_empty("RATE_MAX")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or_else(default_max_requests),
            },
            cors: CorsConfig {
                allowed_origin: non_empty("ALLOWED_ORIGIN"),
            },
            mail: MailConfig {
                host: non_empty("SMTP_HOST"),
                port: non_empty("SMTP_PORT")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or_else(default_smtp_port),
                secure: non_empty("SMTP_SECURE")
                    .map(|v| v.trim().eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
                username: non_empty("SMTP_USER"),
                password: non_empty("SMTP_PASS"),
                from: non_empty("EMAIL_FROM"),
            },
        }
    }
}
