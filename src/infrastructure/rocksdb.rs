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
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const CF_COMPANIES: &str = "companies";
pub const CF_COURTS: &str = "courts";
pub const CF_BOOKINGS: &str = "bookings";
pub const CF_CANCEL_TOKENS: &str = "cancel_tokens";
pub const CF_SUBACCOUNTS: &str = "subaccounts";
/// Charges, keyed by booking ID.
pub const CF_PAYMENTS: &str = "payments";
/// Withdrawals, keyed by `<company ID>/<withdrawal correlation ID>`.
pub const CF_WITHDRAWALS: &str = "withdrawals";
/// Refunds, keyed by booking ID.
pub const CF_REFUNDS: &str = "refunds";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_COMPANIES,
    CF_COURTS,
    CF_BOOKINGS,
    CF_CANCEL_TOKENS,
    CF_SUBACCOUNTS,
    CF_PAYMENTS,
    CF_WITHDRAWALS,
    CF_REFUNDS,
];

/// A persistent store implementation using RocksDB.
///
/// Every entity lives in its own column family as JSON. Read-modify-write operations
/// (status transitions, cancel token consumption) are serialized through `write_lock`
/// so that concurrent webhook deliveries cannot both apply the same transition.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| BookingError::Persistence(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key.as_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn delete_key(&self, cf_name: &str, key: &str) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.delete_cf(cf, key.as_bytes())?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str, prefix: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            if key.starts_with(prefix.as_bytes()) {
                values.push(serde_json::from_slice(&value)?);
            }
        }
        Ok(values)
    }

    fn booking(&self, id: &str) -> Result<Booking> {
        self.get_json(CF_BOOKINGS, id)?
            .ok_or_else(|| BookingError::not_found(format!("booking {id}")))
    }

    fn payment(&self, booking_id: &str) -> Result<Payment> {
        self.get_json(CF_PAYMENTS, booking_id)?
            .ok_or_else(|| BookingError::not_found(format!("charge for booking {booking_id}")))
    }

    /// Applies a charge status change under the write lock and persists it if applied.
    async fn transition(
        &self,
        correlation_id: &ChargeCorrelationId,
        to: ChargeStatus,
        at: DateTime<Utc>,
    ) -> Result<Transition> {
        let _guard = self.write_lock.lock().await;
        let mut payment = self
            .get_json::<Payment>(CF_PAYMENTS, correlation_id.booking_id())?
            .filter(|p| &p.correlation_id == correlation_id)
            .ok_or_else(|| BookingError::not_found(format!("charge {correlation_id}")))?;

        let transition = payment.apply(to, at)?;
        if transition == Transition::Applied {
            self.put_json(CF_PAYMENTS, &payment.booking_id, &payment)?;
        }
        Ok(transition)
    }

    pub fn withdrawals(&self, company_id: &str) -> Result<Vec<Withdrawal>> {
        self.scan(CF_WITHDRAWALS, &format!("{company_id}/"))
    }

    pub fn refund(&self, booking_id: &str) -> Result<Option<Refund>> {
        self.get_json(CF_REFUNDS, booking_id)
    }
}

fn assign_id(id: String) -> String {
    if id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        id
    }
}

#[async_trait]
impl CourtDirectory for RocksDBStore {
    async fn find_court(&self, court_id: &str) -> Result<Court> {
        self.get_json(CF_COURTS, court_id)?
            .ok_or_else(|| BookingError::not_found(format!("court {court_id}")))
    }

    async fn register_court(&self, mut court: Court) -> Result<Court> {
        CompanyStore::find_by_id(self, &court.company_id).await?;
        court.id = assign_id(court.id);
        self.put_json(CF_COURTS, &court.id, &court)?;
        Ok(court)
    }
}

#[async_trait]
impl CompanyStore for RocksDBStore {
    async fn create(&self, mut company: Company) -> Result<Company> {
        company.id = assign_id(company.id);
        let _guard = self.write_lock.lock().await;
        if self.get_json::<Company>(CF_COMPANIES, &company.id)?.is_some() {
            return Err(BookingError::Validation(format!(
                "company {} already exists",
                company.id
            )));
        }
        self.put_json(CF_COMPANIES, &company.id, &company)?;
        Ok(company)
    }

    async fn find_by_id(&self, id: &str) -> Result<Company> {
        self.get_json(CF_COMPANIES, id)?
            .ok_or_else(|| BookingError::not_found(format!("company {id}")))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        CompanyStore::find_by_id(self, id).await?;
        self.delete_key(CF_COMPANIES, id)
    }
}

#[async_trait]
impl BookingStore for RocksDBStore {
    async fn create(&self, mut booking: Booking) -> Result<String> {
        booking.id = Uuid::new_v4().to_string();
        self.put_json(CF_BOOKINGS, &booking.id, &booking)?;
        Ok(booking.id)
    }

    async fn find_by_id(&self, id: &str) -> Result<Booking> {
        self.booking(id)
    }

    async fn list_by_company(&self, company_id: &str, filter: BookingFilter) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .scan::<Booking>(CF_BOOKINGS, "")?
            .into_iter()
            .filter(|b| b.company_id == company_id && filter.matches(b))
            .collect();
        bookings.sort_by_key(|b| b.start_time);
        Ok(bookings)
    }

    async fn confirm_booking(&self, company_id: &str, booking_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut booking = Some(self.booking(booking_id)?)
            .filter(|b| b.company_id == company_id)
            .ok_or_else(|| BookingError::not_found(format!("booking {booking_id}")))?;

        match booking.status {
            BookingStatus::Pending => {
                booking.status = BookingStatus::Confirmed;
                self.put_json(CF_BOOKINGS, booking_id, &booking)
            }
            BookingStatus::Confirmed => Err(BookingError::Conflict(ConflictKind::AlreadyConfirmed)),
            BookingStatus::Cancelled => Err(BookingError::Conflict(ConflictKind::BookingNotPending)),
        }
    }

    async fn cancel_booking(&self, booking_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut booking = self.booking(booking_id)?;
        booking.status = BookingStatus::Cancelled;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_BOOKINGS)?,
            booking_id.as_bytes(),
            serde_json::to_vec(&booking)?,
        );
        if let Some(mut record) = self.get_json::<CancelTokenRecord>(CF_CANCEL_TOKENS, booking_id)? {
            record.consumed_at.get_or_insert_with(Utc::now);
            batch.put_cf(
                self.cf(CF_CANCEL_TOKENS)?,
                booking_id.as_bytes(),
                serde_json::to_vec(&record)?,
            );
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn set_cancel_token_hash(&self, booking_id: &str, record: CancelTokenRecord) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        self.booking(booking_id)?;
        if self
            .get_json::<CancelTokenRecord>(CF_CANCEL_TOKENS, booking_id)?
            .is_some()
        {
            return Ok(false);
        }
        self.put_json(CF_CANCEL_TOKENS, booking_id, &record)?;
        Ok(true)
    }

    async fn get_cancel_token(&self, booking_id: &str) -> Result<Option<CancelTokenRecord>> {
        self.booking(booking_id)?;
        self.get_json(CF_CANCEL_TOKENS, booking_id)
    }

    async fn claim_cancel_token(
        &self,
        booking_id: &str,
        token: &CancelToken,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.booking(booking_id)?;
        let mut record = self
            .get_json::<CancelTokenRecord>(CF_CANCEL_TOKENS, booking_id)?
            .ok_or(BookingError::Unauthorized(AuthFailure::InvalidToken))?;
        record.consume(token, now).map_err(BookingError::Unauthorized)?;
        self.put_json(CF_CANCEL_TOKENS, booking_id, &record)
    }

    async fn release_cancel_token(&self, booking_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(mut record) = self.get_json::<CancelTokenRecord>(CF_CANCEL_TOKENS, booking_id)? {
            record.consumed_at = None;
            self.put_json(CF_CANCEL_TOKENS, booking_id, &record)?;
        }
        Ok(())
    }

    async fn get_booking_summary(&self, booking_id: &str) -> Result<BookingSummary> {
        let booking = self.booking(booking_id)?;
        let court = self.find_court(&booking.court_id).await?;
        let company = CompanyStore::find_by_id(self, &court.company_id).await?;

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

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn create_subaccount(&self, subaccount: Subaccount) -> Result<()> {
        self.put_json(CF_SUBACCOUNTS, &subaccount.company_id, &subaccount)
    }

    async fn get_subaccount_pix_key_by_company_id(&self, company_id: &str) -> Result<String> {
        self.get_json::<Subaccount>(CF_SUBACCOUNTS, company_id)?
            .map(|s| s.pix_key)
            .ok_or_else(|| BookingError::not_found(format!("subaccount for company {company_id}")))
    }

    async fn create_charge(&self, payment: Payment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self
            .get_json::<Payment>(CF_PAYMENTS, &payment.booking_id)?
            .is_some_and(|existing| existing.status.is_active())
        {
            return Err(BookingError::Conflict(ConflictKind::ActiveChargeExists));
        }
        self.put_json(CF_PAYMENTS, &payment.booking_id, &payment)
    }

    async fn confirm_payment(
        &self,
        correlation_id: &ChargeCorrelationId,
        paid_at: DateTime<Utc>,
    ) -> Result<Transition> {
        self.transition(correlation_id, ChargeStatus::Paid, paid_at).await
    }

    async fn expire_payment(
        &self,
        correlation_id: &ChargeCorrelationId,
        expired_at: DateTime<Utc>,
    ) -> Result<Transition> {
        self.transition(correlation_id, ChargeStatus::Expired, expired_at)
            .await
    }

    async fn get_booking_payment_status_by_id(&self, booking_id: &str) -> Result<ChargeStatus> {
        Ok(self.payment(booking_id)?.status)
    }

    async fn get_booking_charge_information(&self, booking_id: &str) -> Result<ChargeInformation> {
        Ok(ChargeInformation::from(&self.payment(booking_id)?))
    }

    async fn get_payment_by_booking_id(&self, booking_id: &str) -> Result<Payment> {
        self.payment(booking_id)
    }

    async fn create_withdraw_request(&self, company_id: &str, withdrawal: Withdrawal) -> Result<()> {
        let key = format!("{company_id}/{}", withdrawal.correlation_id);
        self.put_json(CF_WITHDRAWALS, &key, &withdrawal)
    }

    async fn save_refund_request(&self, booking_id: &str, refund: Refund) -> Result<Transition> {
        let _guard = self.write_lock.lock().await;
        let mut payment = self.payment(booking_id)?;

        let transition = payment.apply(ChargeStatus::Refunded, refund.refunded_at)?;
        if transition == Transition::Applied {
            payment.refund_end_to_end_id = Some(refund.end_to_end_id.clone());
            let mut batch = WriteBatch::default();
            batch.put_cf(
                self.cf(CF_PAYMENTS)?,
                booking_id.as_bytes(),
                serde_json::to_vec(&payment)?,
            );
            batch.put_cf(
                self.cf(CF_REFUNDS)?,
                booking_id.as_bytes(),
                serde_json::to_vec(&refund)?,
            );
            self.db.write(batch)?;
        }
        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{Guest, PixKeyType};
    use crate::domain::money::{Cents, Split};
    use crate::domain::payment::{Charge, ChargeRequest};
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    async fn seeded(store: &RocksDBStore) -> (Company, Court) {
        let company = CompanyStore::create(
            store,
            Company {
                id: String::new(),
                name: "Arena".into(),
                address: "Rua A, 1".into(),
                email: "arena@example.com".into(),
                phone: "83".into(),
                pix_key: "arena@example.com".into(),
                pix_key_type: PixKeyType::Email,
            },
        )
        .await
        .unwrap();
        let court = store
            .register_court(Court {
                id: String::new(),
                company_id: company.id.clone(),
                name: "Quadra 1".into(),
                hourly_price: dec!(100),
            })
            .await
            .unwrap();
        (company, court)
    }

    fn booking(company: &Company, court: &Court) -> Booking {
        let start = Utc::now() + Duration::days(1);
        Booking {
            id: String::new(),
            court_id: court.id.clone(),
            company_id: company.id.clone(),
            start_time: start,
            end_time: start + Duration::hours(2),
            guest: Guest {
                name: "Ana".into(),
                phone: "1".into(),
                email: "ana@example.com".into(),
            },
            status: BookingStatus::Pending,
            verification_code: "ABC234".into(),
            total_price: Cents(20000),
            created_at: Utc::now(),
        }
    }

    fn payment(booking_id: &str) -> Payment {
        let correlation_id = ChargeCorrelationId::for_booking(booking_id);
        let request = ChargeRequest {
            correlation_id: correlation_id.clone(),
            customer: Guest {
                name: "Ana".into(),
                phone: "1".into(),
                email: "ana@example.com".into(),
            },
            split: Split::for_total(Cents(20000)),
            subaccount_pix_key: "arena@example.com".into(),
        };
        let charge = Charge {
            correlation_id,
            gateway_charge_id: "ch_1".into(),
            value: Cents(20000),
            br_code: "000201".into(),
            qr_code_image: "https://qr".into(),
            payment_link_url: "https://pay".into(),
            expires_at: Utc::now() + Duration::minutes(30),
        };
        Payment::from_charge("p1".into(), "co", &request, charge, Utc::now())
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).expect("Failed to open RocksDB");

        for name in COLUMN_FAMILIES {
            assert!(store.db.cf_handle(name).is_some(), "{name} missing");
        }
    }

    #[tokio::test]
    async fn test_rocksdb_booking_lifecycle() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let (company, court) = seeded(&store).await;

        let id = BookingStore::create(&store, booking(&company, &court))
            .await
            .unwrap();
        let summary = store.get_booking_summary(&id).await.unwrap();
        assert_eq!(summary.court_name, "Quadra 1");
        assert_eq!(summary.company_address, "Rua A, 1");

        let token = CancelToken::generate();
        let record = CancelTokenRecord::new(token.hash(), Utc::now() + Duration::hours(1));
        assert!(store.set_cancel_token_hash(&id, record.clone()).await.unwrap());
        assert!(
            !store
                .set_cancel_token_hash(&id, CancelTokenRecord::new(CancelToken::generate().hash(), Utc::now()))
                .await
                .unwrap()
        );

        store.claim_cancel_token(&id, &token, Utc::now()).await.unwrap();
        assert!(matches!(
            store.claim_cancel_token(&id, &token, Utc::now()).await,
            Err(BookingError::Unauthorized(AuthFailure::InvalidToken))
        ));
        store.release_cancel_token(&id).await.unwrap();
        assert_eq!(store.get_cancel_token(&id).await.unwrap(), Some(record));

        store.confirm_booking(&company.id, &id).await.unwrap();
        assert!(matches!(
            store.confirm_booking(&company.id, &id).await,
            Err(BookingError::Conflict(ConflictKind::AlreadyConfirmed))
        ));

        store.cancel_booking(&id).await.unwrap();
        let consumed = store.get_cancel_token(&id).await.unwrap().unwrap();
        assert!(consumed.consumed_at.is_some());

        let listed = store
            .list_by_company(&company.id, BookingFilter::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_rocksdb_payment_transitions_survive_reopen() {
        let dir = tempdir().unwrap();
        let correlation_id = ChargeCorrelationId::for_booking("b1");
        let paid_at = Utc::now();

        {
            let store = RocksDBStore::open(dir.path()).unwrap();
            store.create_charge(payment("b1")).await.unwrap();
            assert_eq!(
                store.confirm_payment(&correlation_id, paid_at).await.unwrap(),
                Transition::Applied
            );
        }

        let store = RocksDBStore::open(dir.path()).unwrap();
        assert_eq!(
            store.confirm_payment(&correlation_id, Utc::now()).await.unwrap(),
            Transition::AlreadyApplied
        );
        assert_eq!(
            store.expire_payment(&correlation_id, Utc::now()).await.unwrap(),
            Transition::AlreadyApplied
        );
        let stored = store.get_payment_by_booking_id("b1").await.unwrap();
        assert_eq!(stored.status, ChargeStatus::Paid);
        assert_eq!(stored.paid_at, Some(paid_at));
    }

    #[tokio::test]
    async fn test_rocksdb_withdrawals_are_scoped_by_company() {
        let dir = tempdir().unwrap();
        let store = RocksDBStore::open(dir.path()).unwrap();
        let withdrawal = |id: &str| Withdrawal {
            correlation_id: id.into(),
            value: Cents(5000),
            requested_at: Utc::now(),
        };

        store.create_withdraw_request("co1", withdrawal("w1")).await.unwrap();
        store.create_withdraw_request("co1", withdrawal("w2")).await.unwrap();
        store.create_withdraw_request("co10", withdrawal("w3")).await.unwrap();

        assert_eq!(store.withdrawals("co1").unwrap().len(), 2);
        assert_eq!(store.withdrawals("co10").unwrap().len(), 1);
    }
}
