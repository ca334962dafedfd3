use std::sync::Arc;

use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;

use crate::config::SmtpConfig;

#[derive(thiserror::Error, Debug)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] lettre::address::AddressError),

    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError>;
}

pub type DynMailer = Arc<dyn Mailer>;

/// Picks SMTP delivery when configured, otherwise writes mail to the log.
pub fn create_mailer(smtp: Option<&SmtpConfig>) -> Result<DynMailer, MailError> {
    match smtp {
        Some(smtp) => Ok(Arc::new(SmtpMailer::new(smtp)?)),
        None => {
            tracing::warn!("SMTP is not configured, outgoing mail will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    #[tracing::instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.parse()?)
            .to(message.to.parse()?)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body)?;

        self.transport.send(email).await?;
        tracing::debug!("Email delivered");

        Ok(())
    }
}

/// Development mailer. Nothing leaves the process.
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "Email not sent (no SMTP configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Keeps every message so tests can read the OTP back out.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_accepts_message() {
        let mailer = LogMailer;
        let result = mailer
            .send(EmailMessage {
                to: "student@uni.edu".to_string(),
                subject: "Hello".to_string(),
                body: "Body".to_string(),
            })
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_create_mailer_without_smtp_falls_back_to_log() {
        assert!(create_mailer(None).is_ok());
    }
}
