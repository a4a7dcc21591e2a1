// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outbound mail delivery.
//!
//! The HTTP response never waits on SMTP: [`dispatch`] hands the chart to a
//! detached task that owns everything it needs. Failures end up in the log
//! and nowhere else.

use crate::config::MailConfig;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Subject line of every chart email.
pub const SUBJECT: &str = "Your Bucks2Bar chart";

/// Plain-text body of every chart email.
pub const BODY: &str = "Attached is your chart image.";

/// Upper bound on a single delivery, connect through quit.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);

const ATTACHMENT_CONTENT_TYPE: &str = "image/png";

/// Mail delivery errors.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required config: {0}")]
    MissingConfig(&'static str),

    #[error("invalid email address: {0}")]
    InvalidAddress(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// A validated chart ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingChart {
    pub to: String,
    pub filename: String,
    pub image: Vec<u8>,
}

/// Something that can deliver a chart email.
pub trait Mailer: Send + Sync + 'static {
    fn send(&self, chart: OutgoingChart) -> impl Future<Output = Result<(), MailError>> + Send;
}

/// Schedule delivery on the runtime without waiting for it.
pub fn dispatch<M: Mailer>(mailer: Arc<M>, chart: OutgoingChart) -> JoinHandle<()> {
    tokio::spawn(async move {
        let to = chart.to.clone();
        let filename = chart.filename.clone();
        let bytes = chart.image.len();

        let result = match tokio::time::timeout(SEND_TIMEOUT, mailer.send(chart)).await {
            Ok(result) => result,
            Err(_) => Err(MailError::Timeout(SEND_TIMEOUT)),
        };

        match result {
            Ok(()) => info!(%to, %filename, bytes, "Chart email sent"),
            Err(err) => error!(%to, %filename, error = %err, "Chart email delivery failed"),
        }
    })
}

/// SMTP-backed mailer built on lettre.
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    /// Build the transport for one delivery. Nothing is pooled.
    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let host = self
            .config
            .host
            .as_deref()
            .ok_or(MailError::MissingConfig("SMTP_HOST"))?;

        let builder = if self.config.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else if self.config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };

        let mut builder = builder.port(self.config.port).timeout(Some(SEND_TIMEOUT));

        if let Some((user, pass)) = self.config.credentials() {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(builder.build())
    }
}

impl Mailer for SmtpMailer {
    async fn send(&self, chart: OutgoingChart) -> Result<(), MailError> {
        let from = self
            .config
            .from
            .as_deref()
            .ok_or(MailError::MissingConfig("EMAIL_FROM"))?;

        let message = build_message(from, chart)?;
        let transport = self.transport()?;

        debug!(
            host = ?self.config.host,
            port = self.config.port,
            secure = self.config.secure,
            "Connecting to SMTP relay"
        );
        transport.send(message).await?;
        Ok(())
    }
}

/// Compose the chart email with the image as its only attachment.
pub fn build_message(from: &str, chart: OutgoingChart) -> Result<Message, MailError> {
    let from: Mailbox = from.parse()?;
    let to: Mailbox = chart.to.parse()?;

    let content_type = ContentType::parse(ATTACHMENT_CONTENT_TYPE)
        .map_err(|err| MailError::Build(err.to_string()))?;
    let attachment = Attachment::new(chart.filename).body(chart.image, content_type);

    Message::builder()
        .from(from)
        .to(to)
        .subject(SUBJECT)
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(BODY.to_string()))
                .singlepart(attachment),
        )
        .map_err(|err| MailError::Build(err.to_string()))
}
