use crate::domain::notification::EmailJob;
use crate::domain::ports::SharedNotificationSender;
use crate::error::{BookingError, Result};
use backoff::ExponentialBackoffBuilder;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Retry budget for a single email.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
        }
    }
}

enum Command {
    Deliver(EmailJob),
    Flush(oneshot::Sender<()>),
}

/// Handle to the background worker that delivers guest emails.
///
/// Orchestrators enqueue and return immediately; a slow mail server never delays the
/// response to the party that triggered the email. Jobs are delivered in order, each
/// retried with exponential backoff until `max_attempts` is reached. The last failure
/// is logged at `error`.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Command>,
}

impl NotificationQueue {
    /// Starts the worker. It stops once every handle has been dropped and the queue drained.
    pub fn spawn(sender: SharedNotificationSender, policy: RetryPolicy) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(rx, sender, policy));
        (Self { tx }, handle)
    }

    pub fn enqueue(&self, job: EmailJob) -> Result<()> {
        self.tx
            .send(Command::Deliver(job))
            .map_err(|_| BookingError::Notification("notification worker is not running".into()))
    }

    /// Waits until every job enqueued before this call has been attempted.
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(ack_tx))
            .map_err(|_| BookingError::Notification("notification worker is not running".into()))?;
        ack_rx
            .await
            .map_err(|_| BookingError::Notification("notification worker stopped".into()))
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Command>,
    sender: SharedNotificationSender,
    policy: RetryPolicy,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Deliver(job) => deliver(&sender, &job, policy).await,
            Command::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    info!("notification worker stopped");
}

async fn deliver(sender: &SharedNotificationSender, job: &EmailJob, policy: RetryPolicy) {
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.initial_interval)
        .with_max_interval(policy.max_interval)
        .with_max_elapsed_time(None)
        .build();

    let attempts = AtomicU32::new(0);
    let attempts = &attempts;
    let max_attempts = policy.max_attempts.max(1);

    let result = backoff::future::retry_notify(
        backoff,
        move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            sender.send(job).await.map_err(|e| {
                if attempt >= max_attempts {
                    backoff::Error::permanent(e)
                } else {
                    backoff::Error::transient(e)
                }
            })
        },
        |e: BookingError, wait: Duration| {
            warn!(
                template = job.template.name(),
                booking_id = %job.data.booking_id,
                error = %e,
                retry_in_ms = wait.as_millis() as u64,
                "email delivery failed, retrying"
            );
        },
    )
    .await;

    match result {
        Ok(()) => info!(
            template = job.template.name(),
            booking_id = %job.data.booking_id,
            "email delivered"
        ),
        Err(e) => error!(
            template = job.template.name(),
            booking_id = %job.data.booking_id,
            attempts = attempts.load(Ordering::Relaxed),
            error = %e,
            "email delivery gave up"
        ),
    }
}
