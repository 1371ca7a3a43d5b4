//! Outbound mail client: fire-and-forget, no delivery confirmation, no
//! retry queue. Used only as the fallback channel when a notification
//! recipient is offline and has opted into email.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::sync::Mutex;

use crate::config::SmtpConfig;

/// Best-effort mail sender. Implementations must not block the caller and
/// must swallow failures (logging them) — a failed send never surfaces to
/// the request that triggered it.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str);
}

/// SMTP-backed mailer. Sends are spawned onto the runtime and forgotten.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build from config. Returns None when outbound email is disabled.
    pub fn from_config(
        cfg: &SmtpConfig,
    ) -> Result<Option<Self>, Box<dyn std::error::Error>> {
        if !cfg.enabled {
            return Ok(None);
        }

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?.port(cfg.port);
        if !cfg.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                cfg.username.clone(),
                cfg.password.clone(),
            ));
        }
        let from: Mailbox = cfg.from.parse()?;

        Ok(Some(Self {
            transport: builder.build(),
            from,
        }))
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, to: &str, subject: &str, body: &str) {
        let to: Mailbox = match to.parse() {
            Ok(mailbox) => mailbox,
            Err(err) => {
                tracing::warn!(to = %to, error = %err, "invalid recipient address, dropping email");
                return;
            }
        };

        let email = match lettre::Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .body(body.to_string())
        {
            Ok(email) => email,
            Err(err) => {
                tracing::warn!(error = %err, "failed to build email, dropping");
                return;
            }
        };

        let transport = self.transport.clone();
        tokio::spawn(async move {
            if let Err(err) = transport.send(email).await {
                tracing::warn!(error = %err, "email send failed");
            }
        });
    }
}

/// A sent-mail record captured by [`RecordingMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// In-memory mailer that records every send. Used by the test suite to
/// assert on the offline-notification email path.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, to: &str, subject: &str, body: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
        }
    }
}
