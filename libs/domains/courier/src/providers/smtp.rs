//! SMTP transport implementation using lettre.

use super::{EmailSender, OutgoingEmail, SentEmail};
use crate::error::{CourierError, CourierResult};
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_or_default, env_parse};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, warn};

/// SMTP configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// SMTP username (optional for local relays).
    pub username: Option<String>,
    /// SMTP password (optional for local relays).
    pub password: Option<String>,
    /// Whether to use a TLS relay.
    pub use_tls: bool,
}

impl SmtpConfig {
    /// Plain-text transport to `host:port` without credentials.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            use_tls: false,
        }
    }

    /// Builder method to set TLS.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Builder method to set credentials.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }
}

impl FromEnv for SmtpConfig {
    /// - SMTP_HOST: defaults to localhost
    /// - SMTP_PORT: defaults to 1025
    /// - SMTP_USERNAME / SMTP_PASSWORD: optional
    /// - SMTP_USE_TLS: `true`/`1` to enable
    fn from_env() -> Result<Self, ConfigError> {
        let use_tls = env_or_default("SMTP_USE_TLS", "false");
        Ok(Self {
            host: env_or_default("SMTP_HOST", "localhost"),
            port: env_parse("SMTP_PORT", 1025)?,
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            use_tls: use_tls == "true" || use_tls == "1",
        })
    }
}

/// SMTP mail transport.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpSender {
    pub fn new(config: SmtpConfig) -> CourierResult<Self> {
        let transport = Self::build_transport(&config)?;
        Ok(Self { transport, config })
    }

    fn build_transport(config: &SmtpConfig) -> CourierResult<AsyncSmtpTransport<Tokio1Executor>> {
        let credentials = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                Some(Credentials::new(username.clone(), password.clone()))
            }
            _ => None,
        };

        let transport = if config.use_tls {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| CourierError::Config(format!("Failed to create SMTP relay: {}", e)))?
                .port(config.port);
            if let Some(credentials) = credentials {
                builder = builder.credentials(credentials);
            }
            builder.build()
        } else {
            let mut builder =
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                    .port(config.port);
            if let Some(credentials) = credentials {
                builder = builder.credentials(credentials);
            }
            builder.build()
        };

        Ok(transport)
    }

    /// Build a lettre Message from an outgoing email.
    fn build_message(email: &OutgoingEmail) -> CourierResult<Message> {
        let from: Mailbox = email.from.parse().map_err(|e| {
            CourierError::Transport(format!("Invalid from address '{}': {}", email.from, e))
        })?;
        let to: Mailbox = email.to.parse().map_err(|e| {
            CourierError::Transport(format!("Invalid to address '{}': {}", email.to, e))
        })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject)
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .map_err(|e| CourierError::Transport(format!("Failed to build email message: {}", e)))
    }
}

#[async_trait]
impl EmailSender for SmtpSender {
    async fn send(&self, email: &OutgoingEmail) -> CourierResult<SentEmail> {
        debug!(
            to = %email.to,
            from = %email.from,
            host = %self.config.host,
            port = %self.config.port,
            "Sending email via SMTP"
        );

        let message = Self::build_message(email)?;
        let response = self.transport.send(message).await.map_err(|e| {
            warn!(to = %email.to, error = %e, "SMTP send failed");
            CourierError::Transport(format!("SMTP send failed: {}", e))
        })?;

        Ok(SentEmail {
            message_id: response.message().next().map(str::to_string),
        })
    }

    fn name(&self) -> &'static str {
        "SMTP"
    }

    async fn health_check(&self) -> CourierResult<bool> {
        self.transport
            .test_connection()
            .await
            .map_err(|e| CourierError::Transport(format!("SMTP health check failed: {}", e)))
    }
}
