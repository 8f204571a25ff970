use crate::application::notifications::NotificationQueue;
use crate::domain::booking::{Booking, Company};
use crate::domain::cancel_token::{CancelToken, CancelTokenRecord};
use crate::domain::correlation::{ChargeCorrelationId, RefundCorrelationId};
use crate::domain::money::{Cents, Split};
use crate::domain::notification::{BookingEmail, EmailJob, EmailTemplate};
use crate::domain::payment::{
    ChargeEvent, ChargeInformation, ChargeRequest, ChargeStatus, Payment, Subaccount,
    Transition, Withdrawal,
};
use crate::domain::ports::{SharedBookingStore, SharedGateway, SharedPaymentStore};
use crate::error::{BookingError, ConflictKind, GatewayError, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Tunables for the payment orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct PaymentSettings {
    /// How long a cancel token stays valid after payment. Never past the booking start.
    pub cancel_token_ttl: Duration,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            cancel_token_ttl: Duration::hours(48),
        }
    }
}

/// Owns the charge lifecycle of bookings.
///
/// Subaccount provisioning, split charge creation, webhook-driven confirmation and
/// expiry, company balance and withdrawals, and refunds all go through here. The
/// booking row itself is only touched to issue cancel tokens.
pub struct PaymentService {
    gateway: SharedGateway,
    payments: SharedPaymentStore,
    bookings: SharedBookingStore,
    notifications: NotificationQueue,
    settings: PaymentSettings,
}

impl PaymentService {
    pub fn new(
        gateway: SharedGateway,
        payments: SharedPaymentStore,
        bookings: SharedBookingStore,
        notifications: NotificationQueue,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            gateway,
            payments,
            bookings,
            notifications,
            settings,
        }
    }

    /// Registers the company's settlement subaccount at the gateway and stores it.
    #[instrument(skip(self, company), fields(company_id = %company.id))]
    pub async fn create_subaccount(&self, company: &Company) -> Result<()> {
        if company.pix_key.trim().is_empty() {
            return Err(BookingError::Validation("company pix key is required".into()));
        }

        let name = company.slug();
        let pix_key = self.gateway.create_subaccount(&name, &company.pix_key).await?;

        self.payments
            .create_subaccount(Subaccount {
                company_id: company.id.clone(),
                name,
                pix_key,
                pix_key_type: company.pix_key_type,
                created_at: Utc::now(),
            })
            .await?;

        info!("subaccount created");
        Ok(())
    }

    /// Requests a split charge for a persisted booking.
    ///
    /// The booking stays pending; only webhooks move the charge forward.
    #[instrument(skip(self, booking), fields(booking_id = %booking.id))]
    pub async fn create_charge(&self, company_id: &str, booking: &Booking) -> Result<Payment> {
        match self.payments.get_payment_by_booking_id(&booking.id).await {
            Ok(existing) if existing.status.is_active() => {
                return Err(BookingError::Conflict(ConflictKind::ActiveChargeExists));
            }
            Ok(_) | Err(BookingError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let subaccount_pix_key = self
            .payments
            .get_subaccount_pix_key_by_company_id(company_id)
            .await?;

        let request = ChargeRequest {
            correlation_id: booking.correlation_id(),
            customer: booking.guest.clone(),
            split: Split::for_total(booking.total_price),
            subaccount_pix_key,
        };

        let charge = self.gateway.create_charge(&request).await?;
        if charge.correlation_id != request.correlation_id {
            return Err(GatewayError::Decode(format!(
                "charge echoed correlation id {} instead of {}",
                charge.correlation_id, request.correlation_id
            ))
            .into());
        }

        let payment = Payment::from_charge(
            Uuid::new_v4().to_string(),
            company_id,
            &request,
            charge,
            Utc::now(),
        );
        self.payments.create_charge(payment.clone()).await?;

        info!(
            correlation_id = %payment.correlation_id,
            total = payment.split.total.value(),
            gas_price = payment.split.gas_price.value(),
            "charge created"
        );
        Ok(payment)
    }

    /// Handles a "charge paid" webhook.
    ///
    /// The first delivery marks the charge paid, issues a cancel token and queues the
    /// confirmation email. A redelivery of an already-paid charge only finishes token
    /// issuance when an earlier delivery failed before storing it; otherwise it returns
    /// `Transition::AlreadyApplied` without side effects.
    #[instrument(skip(self, event), fields(correlation_id = %event.charge.correlation_id))]
    pub async fn confirm_payment(&self, event: &ChargeEvent) -> Result<Transition> {
        let correlation_id = parse_correlation(&event.charge.correlation_id)?;
        let paid_at = event.charge.paid_at.unwrap_or_else(Utc::now);

        let transition = self.payments.confirm_payment(&correlation_id, paid_at).await?;
        let booking_id = correlation_id.booking_id();
        if transition == Transition::AlreadyApplied {
            if self.bookings.get_cancel_token(booking_id).await?.is_some() {
                info!("payment already confirmed, ignoring delivery");
                return Ok(transition);
            }
            warn!(booking_id, "paid charge has no cancel token, resuming issuance");
        }

        self.issue_cancel_token(booking_id).await?;
        Ok(transition)
    }

    /// Generates the guest's cancel token, stores its hash and queues the confirmation
    /// email. Only the caller whose hash is stored sends an email.
    async fn issue_cancel_token(&self, booking_id: &str) -> Result<()> {
        let summary = self.bookings.get_booking_summary(booking_id).await?;

        let token = CancelToken::generate();
        let expires_at =
            cancel_token_expiry(Utc::now(), self.settings.cancel_token_ttl, summary.start_time);
        let stored = self
            .bookings
            .set_cancel_token_hash(booking_id, CancelTokenRecord::new(token.hash(), expires_at))
            .await?;
        if !stored {
            info!(booking_id, "cancel token issued by a concurrent delivery");
            return Ok(());
        }

        let email = BookingEmail::from_summary(&summary, Some(token));
        self.notifications
            .enqueue(EmailJob::new(EmailTemplate::BookingConfirmation, email))?;

        info!(booking_id, "payment confirmed");
        Ok(())
    }

    /// Handles a "charge expired" webhook. The booking itself stays pending so it can
    /// be charged again.
    #[instrument(skip(self, event), fields(correlation_id = %event.charge.correlation_id))]
    pub async fn expire_payment(&self, event: &ChargeEvent) -> Result<Transition> {
        let correlation_id = parse_correlation(&event.charge.correlation_id)?;
        let transition = self
            .payments
            .expire_payment(&correlation_id, Utc::now())
            .await?;

        match transition {
            Transition::Applied => info!("charge expired"),
            Transition::AlreadyApplied => info!("expiry ignored, charge already settled"),
        }
        Ok(transition)
    }

    pub async fn get_booking_payment_status_by_id(&self, booking_id: &str) -> Result<ChargeStatus> {
        self.payments.get_booking_payment_status_by_id(booking_id).await
    }

    pub async fn get_booking_charge_information(&self, booking_id: &str) -> Result<ChargeInformation> {
        self.payments.get_booking_charge_information(booking_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_company_balance(&self, company_id: &str) -> Result<Cents> {
        let pix_key = self
            .payments
            .get_subaccount_pix_key_by_company_id(company_id)
            .await?;
        Ok(self.gateway.get_balance(&pix_key).await?)
    }

    /// Withdraws the company's subaccount balance and records the request for audit.
    #[instrument(skip(self))]
    pub async fn create_withdraw_request(&self, company_id: &str) -> Result<Withdrawal> {
        let pix_key = self
            .payments
            .get_subaccount_pix_key_by_company_id(company_id)
            .await?;

        let withdrawal = self.gateway.withdraw_subaccount(&pix_key).await?;
        self.payments
            .create_withdraw_request(company_id, withdrawal.clone())
            .await?;

        info!(value = withdrawal.value.value(), "withdrawal requested");
        Ok(withdrawal)
    }

    /// Refunds the paid charge of a booking.
    ///
    /// Callers must have claimed the guest's cancel token already: a gateway refund
    /// cannot be safely retried once issued. A charge that is already refunded is left
    /// alone and reported as `Transition::AlreadyApplied`.
    #[instrument(skip(self))]
    pub async fn refund_charge(&self, booking_id: &str) -> Result<Transition> {
        let payment = self.payments.get_payment_by_booking_id(booking_id).await?;
        match payment.status {
            ChargeStatus::Paid => {}
            ChargeStatus::Refunded => {
                info!("charge already refunded, skipping gateway");
                return Ok(Transition::AlreadyApplied);
            }
            status => {
                warn!(?status, "refund requested for unpaid charge");
                return Err(BookingError::Conflict(ConflictKind::InvalidChargeTransition));
            }
        }

        let refund_id = RefundCorrelationId::for_payment(&payment.id);
        let refund = self
            .gateway
            .refund_charge(&payment.correlation_id, &refund_id, payment.split.total)
            .await?;

        info!(
            refund_correlation_id = %refund.correlation_id,
            end_to_end_id = %refund.end_to_end_id,
            "refund requested"
        );
        self.payments.save_refund_request(booking_id, refund).await
    }

    /// Queues the refund confirmation email for a cancelled booking.
    pub async fn send_refund_confirmation(&self, booking_id: &str) -> Result<()> {
        let summary = self.bookings.get_booking_summary(booking_id).await?;
        let email = BookingEmail::from_summary(&summary, None);
        self.notifications
            .enqueue(EmailJob::new(EmailTemplate::RefundRequestConfirmation, email))
    }
}

/// `min(now + ttl, start)`. An overflowing TTL falls back to the booking start.
fn cancel_token_expiry(now: DateTime<Utc>, ttl: Duration, start: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_add_signed(ttl).map_or(start, |expiry| expiry.min(start))
}

fn parse_correlation(raw: &str) -> Result<ChargeCorrelationId> {
    ChargeCorrelationId::parse(raw)
        .ok_or_else(|| BookingError::Validation(format!("unknown correlation id: {raw}")))
}
