use super::booking::{Booking, BookingFilter, BookingSummary, Company, Court};
use super::cancel_token::{CancelToken, CancelTokenRecord};
use super::correlation::{ChargeCorrelationId, RefundCorrelationId};
use super::money::Cents;
use super::notification::EmailJob;
use super::payment::{
    Charge, ChargeInformation, ChargeRequest, ChargeStatus, Payment, Refund, Subaccount,
    Transition, Withdrawal,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Booking persistence.
///
/// Lookups of unknown bookings fail with `BookingError::NotFound`.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persists a new booking and returns the assigned ID. The incoming `id` is ignored.
    async fn create(&self, booking: Booking) -> Result<String>;
    async fn find_by_id(&self, id: &str) -> Result<Booking>;
    async fn list_by_company(&self, company_id: &str, filter: BookingFilter) -> Result<Vec<Booking>>;
    /// Marks the booking confirmed, only if it belongs to `company_id`.
    async fn confirm_booking(&self, company_id: &str, booking_id: &str) -> Result<()>;
    /// Marks the booking cancelled and its cancel token consumed, in one write.
    async fn cancel_booking(&self, booking_id: &str) -> Result<()>;
    /// Stores the token record unless the booking already has one.
    ///
    /// Returns whether this call stored it. Concurrent issuers race here and exactly one wins.
    async fn set_cancel_token_hash(&self, booking_id: &str, record: CancelTokenRecord) -> Result<bool>;
    async fn get_cancel_token(&self, booking_id: &str) -> Result<Option<CancelTokenRecord>>;
    /// Validates `token` and marks it consumed as one atomic step (see
    /// [`CancelTokenRecord::consume`]). A booking without a record fails with
    /// `Unauthorized(InvalidToken)`.
    async fn claim_cancel_token(
        &self,
        booking_id: &str,
        token: &CancelToken,
        now: DateTime<Utc>,
    ) -> Result<()>;
    /// Reopens a claimed token whose cancellation could not be completed.
    async fn release_cancel_token(&self, booking_id: &str) -> Result<()>;
    async fn get_booking_summary(&self, booking_id: &str) -> Result<BookingSummary>;
}

/// Charge, subaccount, refund and withdrawal persistence.
///
/// Status changes go through [`ChargeStatus::transition`] atomically, so concurrent
/// webhook deliveries for the same correlation ID observe exactly one `Applied`.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn create_subaccount(&self, subaccount: Subaccount) -> Result<()>;
    async fn get_subaccount_pix_key_by_company_id(&self, company_id: &str) -> Result<String>;
    /// Fails with `Conflict(ActiveChargeExists)` if the booking already has a created or paid charge.
    async fn create_charge(&self, payment: Payment) -> Result<()>;
    async fn confirm_payment(
        &self,
        correlation_id: &ChargeCorrelationId,
        paid_at: DateTime<Utc>,
    ) -> Result<Transition>;
    async fn expire_payment(
        &self,
        correlation_id: &ChargeCorrelationId,
        expired_at: DateTime<Utc>,
    ) -> Result<Transition>;
    async fn get_booking_payment_status_by_id(&self, booking_id: &str) -> Result<ChargeStatus>;
    async fn get_booking_charge_information(&self, booking_id: &str) -> Result<ChargeInformation>;
    async fn get_payment_by_booking_id(&self, booking_id: &str) -> Result<Payment>;
    async fn create_withdraw_request(&self, company_id: &str, withdrawal: Withdrawal) -> Result<()>;
    /// Records the refund and moves the booking's charge from paid to refunded.
    async fn save_refund_request(&self, booking_id: &str, refund: Refund) -> Result<Transition>;
}

/// Outbound instant-payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Registers a settlement subaccount and returns the pix key the gateway will split to.
    async fn create_subaccount(&self, name: &str, pix_key: &str) -> std::result::Result<String, GatewayError>;
    async fn create_charge(&self, request: &ChargeRequest) -> std::result::Result<Charge, GatewayError>;
    async fn get_balance(&self, pix_key: &str) -> std::result::Result<Cents, GatewayError>;
    async fn withdraw_subaccount(&self, pix_key: &str) -> std::result::Result<Withdrawal, GatewayError>;
    async fn refund_charge(
        &self,
        charge: &ChargeCorrelationId,
        refund: &RefundCorrelationId,
        value: Cents,
    ) -> std::result::Result<Refund, GatewayError>;
}

/// Delivers guest emails.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, job: &EmailJob) -> Result<()>;
}

/// Court catalogue.
#[async_trait]
pub trait CourtDirectory: Send + Sync {
    async fn find_court(&self, court_id: &str) -> Result<Court>;
    /// Adds a court to an existing company and returns it with its assigned ID.
    async fn register_court(&self, court: Court) -> Result<Court>;
}

/// Company persistence used by onboarding.
#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Persists a new company and returns it with its assigned ID.
    async fn create(&self, company: Company) -> Result<Company>;
    async fn find_by_id(&self, id: &str) -> Result<Company>;
    async fn delete(&self, id: &str) -> Result<()>;
}

pub type SharedBookingStore = Arc<dyn BookingStore>;
pub type SharedPaymentStore = Arc<dyn PaymentStore>;
pub type SharedGateway = Arc<dyn PaymentGateway>;
pub type SharedNotificationSender = Arc<dyn NotificationSender>;
pub type SharedCourtDirectory = Arc<dyn CourtDirectory>;
pub type SharedCompanyStore = Arc<dyn CompanyStore>;
