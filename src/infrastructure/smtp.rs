use crate::config::SmtpConfig;
use crate::domain::notification::EmailJob;
use crate::domain::ports::NotificationSender;
use crate::error::{BookingError, Result};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::info;

/// Delivers guest emails through an SMTP relay (STARTTLS).
pub struct SmtpSender {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpSender {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| BookingError::Notification(format!("invalid from address: {e}")))?;

        let host = config
            .host
            .as_deref()
            .ok_or_else(|| BookingError::Notification("SMTP host is not configured".into()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| BookingError::Notification(format!("failed to create SMTP relay: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.password.clone()))
            .build();

        Ok(Self { from, transport })
    }
}

fn build_message(from: &Mailbox, job: &EmailJob) -> Result<Message> {
    let mut builder = Message::builder().from(from.clone()).subject(&job.subject);
    for recipient in &job.recipients {
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| BookingError::Notification(format!("invalid recipient: {e}")))?;
        builder = builder.to(to);
    }

    builder
        .header(ContentType::TEXT_PLAIN)
        .body(job.data.render(job.template))
        .map_err(|e| BookingError::Notification(format!("failed to build message: {e}")))
}

#[async_trait]
impl NotificationSender for SmtpSender {
    async fn send(&self, job: &EmailJob) -> Result<()> {
        let message = build_message(&self.from, job)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| BookingError::Notification(format!("failed to send email: {e}")))?;

        info!(
            template = job.template.name(),
            booking_id = %job.data.booking_id,
            "email sent"
        );
        Ok(())
    }
}

/// Stand-in used when no SMTP relay is configured: records the email in the log,
/// without its body.
#[derive(Default)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, job: &EmailJob) -> Result<()> {
        info!(
            template = job.template.name(),
            booking_id = %job.data.booking_id,
            recipients = job.recipients.len(),
            "smtp disabled, email not sent"
        );
        Ok(())
    }
}
