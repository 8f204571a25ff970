use crate::domain::booking::{
    Booking, BookingFilter, BookingStatus, BookingSummary, Company, Court,
};
use crate::domain::cancel_token::{CancelToken, CancelTokenRecord};
use crate::domain::correlation::ChargeCorrelationId;
use crate::domain::payment::{
    ChargeInformation, ChargeStatus, Payment, Refund, Subaccount, Transition, Withdrawal,
};
use crate::domain::ports::{BookingStore, CompanyStore, CourtDirectory, PaymentStore};
use crate::error::{AuthFailure, BookingError, ConflictKind, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

fn assign_id(id: String) -> String {
    if id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        id
    }
}

/// Companies and their courts.
///
/// Shared with [`InMemoryBookingStore`], which joins against it for booking summaries.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    companies: Arc<RwLock<HashMap<String, Company>>>,
    courts: Arc<RwLock<HashMap<String, Court>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn company_count(&self) -> usize {
        self.companies.read().await.len()
    }
}

#[async_trait]
impl CourtDirectory for InMemoryDirectory {
    async fn find_court(&self, court_id: &str) -> Result<Court> {
        let courts = self.courts.read().await;
        courts
            .get(court_id)
            .cloned()
            .ok_or_else(|| BookingError::not_found(format!("court {court_id}")))
    }

    async fn register_court(&self, mut court: Court) -> Result<Court> {
        if !self.companies.read().await.contains_key(&court.company_id) {
            return Err(BookingError::not_found(format!("company {}", court.company_id)));
        }
        court.id = assign_id(court.id);
        self.courts
            .write()
            .await
            .insert(court.id.clone(), court.clone());
        Ok(court)
    }
}

#[async_trait]
impl CompanyStore for InMemoryDirectory {
    async fn create(&self, mut company: Company) -> Result<Company> {
        company.id = assign_id(company.id);
        let mut companies = self.companies.write().await;
        if companies.contains_key(&company.id) {
            return Err(BookingError::Validation(format!(
                "company {} already exists",
                company.id
            )));
        }
        companies.insert(company.id.clone(), company.clone());
        Ok(company)
    }

    async fn find_by_id(&self, id: &str) -> Result<Company> {
        let companies = self.companies.read().await;
        companies
            .get(id)
            .cloned()
            .ok_or_else(|| BookingError::not_found(format!("company {id}")))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.companies
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BookingError::not_found(format!("company {id}")))
    }
}

#[derive(Default)]
struct BookingTable {
    bookings: HashMap<String, Booking>,
    cancel_tokens: HashMap<String, CancelTokenRecord>,
}

/// Bookings plus their cancel token records, behind a single lock so that cancelling a
/// booking and consuming its token happen together.
#[derive(Clone)]
pub struct InMemoryBookingStore {
    table: Arc<RwLock<BookingTable>>,
    directory: InMemoryDirectory,
}

impl InMemoryBookingStore {
    pub fn new(directory: InMemoryDirectory) -> Self {
        Self {
            table: Arc::new(RwLock::new(BookingTable::default())),
            directory,
        }
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create(&self, mut booking: Booking) -> Result<String> {
        booking.id = Uuid::new_v4().to_string();
        let id = booking.id.clone();
        self.table.write().await.bookings.insert(id.clone(), booking);
        Ok(id)
    }

    async fn find_by_id(&self, id: &str) -> Result<Booking> {
        let table = self.table.read().await;
        table
            .bookings
            .get(id)
            .cloned()
            .ok_or_else(|| BookingError::not_found(format!("booking {id}")))
    }

    async fn list_by_company(&self, company_id: &str, filter: BookingFilter) -> Result<Vec<Booking>> {
        let table = self.table.read().await;
        let mut bookings: Vec<Booking> = table
            .bookings
            .values()
            .filter(|b| b.company_id == company_id && filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.start_time);
        Ok(bookings)
    }

    async fn confirm_booking(&self, company_id: &str, booking_id: &str) -> Result<()> {
        let mut table = self.table.write().await;
        let booking = table
            .bookings
            .get_mut(booking_id)
            .filter(|b| b.company_id == company_id)
            .ok_or_else(|| BookingError::not_found(format!("booking {booking_id}")))?;

        match booking.status {
            BookingStatus::Pending => {
                booking.status = BookingStatus::Confirmed;
                Ok(())
            }
            BookingStatus::Confirmed => Err(BookingError::Conflict(ConflictKind::AlreadyConfirmed)),
            BookingStatus::Cancelled => Err(BookingError::Conflict(ConflictKind::BookingNotPending)),
        }
    }

    async fn cancel_booking(&self, booking_id: &str) -> Result<()> {
        let mut table = self.table.write().await;
        let booking = table
            .bookings
            .get_mut(booking_id)
            .ok_or_else(|| BookingError::not_found(format!("booking {booking_id}")))?;
        booking.status = BookingStatus::Cancelled;
        if let Some(record) = table.cancel_tokens.get_mut(booking_id) {
            record.consumed_at.get_or_insert_with(Utc::now);
        }
        Ok(())
    }

    async fn set_cancel_token_hash(&self, booking_id: &str, record: CancelTokenRecord) -> Result<bool> {
        let mut table = self.table.write().await;
        if !table.bookings.contains_key(booking_id) {
            return Err(BookingError::not_found(format!("booking {booking_id}")));
        }
        match table.cancel_tokens.entry(booking_id.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(true)
            }
        }
    }

    async fn get_cancel_token(&self, booking_id: &str) -> Result<Option<CancelTokenRecord>> {
        let table = self.table.read().await;
        if !table.bookings.contains_key(booking_id) {
            return Err(BookingError::not_found(format!("booking {booking_id}")));
        }
        Ok(table.cancel_tokens.get(booking_id).cloned())
    }

    async fn claim_cancel_token(
        &self,
        booking_id: &str,
        token: &CancelToken,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut table = self.table.write().await;
        if !table.bookings.contains_key(booking_id) {
            return Err(BookingError::not_found(format!("booking {booking_id}")));
        }
        let record = table
            .cancel_tokens
            .get_mut(booking_id)
            .ok_or(BookingError::Unauthorized(AuthFailure::InvalidToken))?;
        record.consume(token, now).map_err(BookingError::Unauthorized)
    }

    async fn release_cancel_token(&self, booking_id: &str) -> Result<()> {
        let mut table = self.table.write().await;
        if let Some(record) = table.cancel_tokens.get_mut(booking_id) {
            record.consumed_at = None;
        }
        Ok(())
    }

    async fn get_booking_summary(&self, booking_id: &str) -> Result<BookingSummary> {
        let booking = self.find_by_id(booking_id).await?;
        let court = self.directory.find_court(&booking.court_id).await?;
        let company = CompanyStore::find_by_id(&self.directory, &court.company_id).await?;

        Ok(BookingSummary {
            booking_id: booking.id,
            guest: booking.guest,
            court_name: court.name,
            company_address: company.address,
            start_time: booking.start_time,
            end_time: booking.end_time,
            total_price: booking.total_price,
            verification_code: booking.verification_code,
        })
    }
}

#[derive(Default)]
struct PaymentTable {
    subaccounts: HashMap<String, Subaccount>,
    payments: HashMap<String, Payment>,
    withdrawals: HashMap<String, Vec<Withdrawal>>,
    refunds: HashMap<String, Refund>,
}

impl PaymentTable {
    fn payment_mut(&mut self, correlation_id: &ChargeCorrelationId) -> Result<&mut Payment> {
        self.payments
            .get_mut(correlation_id.booking_id())
            .filter(|p| &p.correlation_id == correlation_id)
            .ok_or_else(|| BookingError::not_found(format!("charge {correlation_id}")))
    }

    fn payment(&self, booking_id: &str) -> Result<&Payment> {
        self.payments
            .get(booking_id)
            .ok_or_else(|| BookingError::not_found(format!("charge for booking {booking_id}")))
    }
}

/// Charges keyed by booking ID. Status changes happen under the write lock, so
/// concurrent webhook deliveries see exactly one [`Transition::Applied`].
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    table: Arc<RwLock<PaymentTable>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn withdrawals(&self, company_id: &str) -> Vec<Withdrawal> {
        let table = self.table.read().await;
        table.withdrawals.get(company_id).cloned().unwrap_or_default()
    }

    pub async fn refund(&self, booking_id: &str) -> Option<Refund> {
        self.table.read().await.refunds.get(booking_id).cloned()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn create_subaccount(&self, subaccount: Subaccount) -> Result<()> {
        let mut table = self.table.write().await;
        table
            .subaccounts
            .insert(subaccount.company_id.clone(), subaccount);
        Ok(())
    }

    async fn get_subaccount_pix_key_by_company_id(&self, company_id: &str) -> Result<String> {
        let table = self.table.read().await;
        table
            .subaccounts
            .get(company_id)
            .map(|s| s.pix_key.clone())
            .ok_or_else(|| BookingError::not_found(format!("subaccount for company {company_id}")))
    }

    async fn create_charge(&self, payment: Payment) -> Result<()> {
        let mut table = self.table.write().await;
        if table
            .payments
            .get(&payment.booking_id)
            .is_some_and(|existing| existing.status.is_active())
        {
            return Err(BookingError::Conflict(ConflictKind::ActiveChargeExists));
        }
        table.payments.insert(payment.booking_id.clone(), payment);
        Ok(())
    }

    async fn confirm_payment(
        &self,
        correlation_id: &ChargeCorrelationId,
        paid_at: DateTime<Utc>,
    ) -> Result<Transition> {
        let mut table = self.table.write().await;
        table
            .payment_mut(correlation_id)?
            .apply(ChargeStatus::Paid, paid_at)
    }

    async fn expire_payment(
        &self,
        correlation_id: &ChargeCorrelationId,
        expired_at: DateTime<Utc>,
    ) -> Result<Transition> {
        let mut table = self.table.write().await;
        table
            .payment_mut(correlation_id)?
            .apply(ChargeStatus::Expired, expired_at)
    }

    async fn get_booking_payment_status_by_id(&self, booking_id: &str) -> Result<ChargeStatus> {
        let table = self.table.read().await;
        Ok(table.payment(booking_id)?.status)
    }

    async fn get_booking_charge_information(&self, booking_id: &str) -> Result<ChargeInformation> {
        let table = self.table.read().await;
        Ok(ChargeInformation::from(table.payment(booking_id)?))
    }

    async fn get_payment_by_booking_id(&self, booking_id: &str) -> Result<Payment> {
        let table = self.table.read().await;
        table.payment(booking_id).cloned()
    }

    async fn create_withdraw_request(&self, company_id: &str, withdrawal: Withdrawal) -> Result<()> {
        let mut table = self.table.write().await;
        table
            .withdrawals
            .entry(company_id.to_string())
            .or_default()
            .push(withdrawal);
        Ok(())
    }

    async fn save_refund_request(&self, booking_id: &str, refund: Refund) -> Result<Transition> {
        let mut table = self.table.write().await;
        let payment = table
            .payments
            .get_mut(booking_id)
            .ok_or_else(|| BookingError::not_found(format!("charge for booking {booking_id}")))?;

        let transition = payment.apply(ChargeStatus::Refunded, refund.refunded_at)?;
        if transition == Transition::Applied {
            payment.refund_end_to_end_id = Some(refund.end_to_end_id.clone());
            table.refunds.insert(booking_id.to_string(), refund);
        }
        Ok(transition)
    }
}
