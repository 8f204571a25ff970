//! Command line and environment configuration.
//!
//! Every setting can be given as a flag or through the environment; `main` loads a
//! `.env` file first, so local development only needs that file.

use crate::application::notifications::RetryPolicy;
use crate::application::payment::PaymentSettings;
use crate::error::BookingError;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const MAX_CANCEL_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Parser, Debug)]
#[command(author, version, about = "Court booking and PIX payment service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// Print the price split of a booking window as `total,gas_price,net` in cents.
    Quote(QuoteArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, env = "COURTPAY_ADDR", default_value = "0.0.0.0:8080")]
    pub addr: SocketAddr,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "COURTPAY_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Shared secret for webhook HMAC signatures. Without it payloads are trusted.
    #[arg(long, env = "OPENPIX_WEBHOOK_SECRET")]
    pub webhook_secret: Option<String>,

    /// How long a guest may use the cancel token after payment, in hours (at most a year).
    #[arg(
        long,
        env = "COURTPAY_CANCEL_TOKEN_TTL_HOURS",
        default_value_t = 48,
        value_parser = clap::value_parser!(i64).range(0..=MAX_CANCEL_TOKEN_TTL_HOURS)
    )]
    pub cancel_token_ttl_hours: i64,

    #[command(flatten)]
    pub openpix: OpenPixConfig,

    #[command(flatten)]
    pub smtp: SmtpConfig,

    #[command(flatten)]
    pub notification_retry: NotificationRetryConfig,
}

impl ServeArgs {
    pub fn payment_settings(&self) -> Result<PaymentSettings, BookingError> {
        let cancel_token_ttl = (0..=MAX_CANCEL_TOKEN_TTL_HOURS)
            .contains(&self.cancel_token_ttl_hours)
            .then(|| chrono::Duration::try_hours(self.cancel_token_ttl_hours))
            .flatten()
            .ok_or_else(|| {
                BookingError::Validation(format!(
                    "cancel token TTL must be between 0 and {MAX_CANCEL_TOKEN_TTL_HOURS} hours, got {}",
                    self.cancel_token_ttl_hours
                ))
            })?;
        Ok(PaymentSettings { cancel_token_ttl })
    }
}

#[derive(Args, Debug, Clone)]
pub struct OpenPixConfig {
    #[arg(long = "openpix-base-url", env = "OPENPIX_BASE_URL", default_value = "https://api.openpix.com.br")]
    pub base_url: String,

    #[arg(long = "openpix-app-id", env = "OPENPIX_APP_ID", default_value = "", hide_env_values = true)]
    pub app_id: String,

    #[arg(long = "openpix-timeout-secs", env = "OPENPIX_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Lifetime of a charge at the gateway, in seconds.
    #[arg(long = "openpix-charge-expires-in", env = "OPENPIX_CHARGE_EXPIRES_IN", default_value_t = 1800)]
    pub charge_expires_in: u32,
}

impl OpenPixConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Args, Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP relay host. Emails are only logged when unset.
    #[arg(long = "smtp-host", env = "SMTP_HOST")]
    pub host: Option<String>,

    #[arg(long = "smtp-port", env = "SMTP_PORT", default_value_t = 587)]
    pub port: u16,

    #[arg(long = "smtp-user", env = "SMTP_USER", default_value = "")]
    pub user: String,

    #[arg(long = "smtp-password", env = "SMTP_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    #[arg(long = "smtp-from", env = "SMTP_FROM", default_value = "Reservas <no-reply@localhost>")]
    pub from: String,
}

#[derive(Args, Debug, Clone)]
pub struct NotificationRetryConfig {
    #[arg(long = "email-max-attempts", env = "COURTPAY_EMAIL_MAX_ATTEMPTS", default_value_t = 4)]
    pub max_attempts: u32,

    #[arg(long = "email-initial-backoff-ms", env = "COURTPAY_EMAIL_INITIAL_BACKOFF_MS", default_value_t = 500)]
    pub initial_backoff_ms: u64,

    #[arg(long = "email-max-backoff-ms", env = "COURTPAY_EMAIL_MAX_BACKOFF_MS", default_value_t = 10_000)]
    pub max_backoff_ms: u64,
}

impl NotificationRetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_interval: Duration::from_millis(self.initial_backoff_ms),
            max_interval: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct QuoteArgs {
    /// Court price per hour, e.g. `100` or `87.50`.
    #[arg(long)]
    pub hourly_price: Decimal,

    /// Booking start, RFC 3339.
    #[arg(long)]
    pub start: DateTime<Utc>,

    /// Booking end, RFC 3339.
    #[arg(long)]
    pub end: DateTime<Utc>,
}
