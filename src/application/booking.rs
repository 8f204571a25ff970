use crate::application::payment::PaymentService;
use crate::domain::booking::{
    Booking, BookingFilter, BookingStatus, NewBooking, generate_verification_code,
};
use crate::domain::cancel_token::CancelToken;
use crate::domain::money::{duration_hours, total_price};
use crate::domain::payment::Payment;
use crate::domain::ports::{SharedBookingStore, SharedCourtDirectory};
use crate::error::{AuthFailure, BookingError, ConflictKind, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Guest and operator entry points for bookings.
pub struct BookingService {
    bookings: SharedBookingStore,
    courts: SharedCourtDirectory,
    payments: Arc<PaymentService>,
}

impl BookingService {
    pub fn new(
        bookings: SharedBookingStore,
        courts: SharedCourtDirectory,
        payments: Arc<PaymentService>,
    ) -> Self {
        Self {
            bookings,
            courts,
            payments,
        }
    }

    /// Prices and persists a pending booking, then requests its charge.
    ///
    /// If the charge cannot be created the booking is kept, pending and without a
    /// charge, and the error is returned. [`BookingService::retry_charge`] recovers it.
    #[instrument(skip(self, request), fields(court_id = %request.court_id))]
    pub async fn create_booking(&self, request: NewBooking) -> Result<String> {
        if request.end_time <= request.start_time {
            return Err(BookingError::Validation(
                "booking end must be after its start".into(),
            ));
        }
        if request.guest.email.trim().is_empty() {
            return Err(BookingError::Validation("guest email is required".into()));
        }

        let court = self.courts.find_court(&request.court_id).await?;
        if court.hourly_price < Decimal::ZERO {
            return Err(BookingError::Validation(format!(
                "court {} has a negative hourly price",
                court.id
            )));
        }

        let hours = duration_hours(Some(request.start_time), Some(request.end_time));
        let mut booking = Booking {
            id: String::new(),
            court_id: court.id,
            company_id: court.company_id,
            start_time: request.start_time,
            end_time: request.end_time,
            guest: request.guest,
            status: BookingStatus::Pending,
            verification_code: generate_verification_code(),
            total_price: total_price(court.hourly_price, hours),
            created_at: Utc::now(),
        };

        booking.id = self.bookings.create(booking.clone()).await?;
        info!(booking_id = %booking.id, total = booking.total_price.value(), "booking created");

        if let Err(e) = self.payments.create_charge(&booking.company_id, &booking).await {
            warn!(
                booking_id = %booking.id,
                error = %e,
                retryable = e.is_retryable(),
                "charge creation failed, booking left pending without charge"
            );
            return Err(e);
        }

        Ok(booking.id)
    }

    /// Operator check-in: confirms a booking once the guest shows the verification code.
    #[instrument(skip(self, verification_code))]
    pub async fn confirm_booking(
        &self,
        company_id: &str,
        booking_id: &str,
        verification_code: &str,
    ) -> Result<()> {
        let booking = self.bookings.find_by_id(booking_id).await?;
        if booking.company_id != company_id {
            return Err(BookingError::not_found(format!("booking {booking_id}")));
        }

        if booking.verification_code != verification_code.trim().to_ascii_uppercase() {
            return Err(BookingError::Unauthorized(AuthFailure::InvalidVerificationCode));
        }
        match booking.status {
            BookingStatus::Confirmed => {
                return Err(BookingError::Conflict(ConflictKind::AlreadyConfirmed));
            }
            BookingStatus::Cancelled => {
                return Err(BookingError::Conflict(ConflictKind::BookingNotPending));
            }
            BookingStatus::Pending => {}
        }

        self.bookings.confirm_booking(company_id, booking_id).await?;
        info!("booking confirmed");
        Ok(())
    }

    /// Guest self-service cancellation.
    ///
    /// The token is claimed atomically (expiry, then hash) before anything reaches the
    /// gateway, so only one request per token ever issues a refund. If the refund or
    /// the booking update fails, the claim is released and the guest may retry with
    /// the same token; a retry after a recorded refund skips the gateway.
    #[instrument(skip(self, token))]
    pub async fn cancel_booking(&self, booking_id: &str, token: &CancelToken) -> Result<()> {
        match self
            .bookings
            .claim_cancel_token(booking_id, token, Utc::now())
            .await
        {
            Ok(()) => {}
            Err(BookingError::NotFound(_)) => {
                return Err(BookingError::Unauthorized(AuthFailure::InvalidToken));
            }
            Err(e) => return Err(e),
        }

        if let Err(e) = self.complete_cancellation(booking_id).await {
            warn!(error = %e, retryable = e.is_retryable(), "cancellation failed, releasing cancel token");
            if let Err(release) = self.bookings.release_cancel_token(booking_id).await {
                error!(error = %release, "failed to release cancel token");
            }
            return Err(e);
        }

        info!("booking cancelled");
        Ok(())
    }

    async fn complete_cancellation(&self, booking_id: &str) -> Result<()> {
        self.payments.refund_charge(booking_id).await?;
        self.bookings.cancel_booking(booking_id).await?;
        self.payments.send_refund_confirmation(booking_id).await
    }

    /// Requests a new charge for a pending booking whose charge failed or expired.
    #[instrument(skip(self))]
    pub async fn retry_charge(&self, company_id: &str, booking_id: &str) -> Result<Payment> {
        let booking = self.bookings.find_by_id(booking_id).await?;
        if booking.company_id != company_id {
            return Err(BookingError::not_found(format!("booking {booking_id}")));
        }
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::Conflict(ConflictKind::BookingNotPending));
        }

        let court = self.courts.find_court(&booking.court_id).await?;
        self.payments.create_charge(&court.company_id, &booking).await
    }

    pub async fn list_by_company(
        &self,
        company_id: &str,
        filter: BookingFilter,
    ) -> Result<Vec<Booking>> {
        self.bookings.list_by_company(company_id, filter).await
    }

    pub async fn find_by_id(&self, booking_id: &str) -> Result<Booking> {
        self.bookings.find_by_id(booking_id).await
    }
}
