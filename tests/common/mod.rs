#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use courtpay::application::booking::BookingService;
use courtpay::application::notifications::{NotificationQueue, RetryPolicy};
use courtpay::application::onboarding::CompanyOnboarding;
use courtpay::application::payment::{PaymentService, PaymentSettings};
use courtpay::domain::booking::{
    Booking, BookingFilter, BookingSummary, Company, Court, Guest, NewBooking, PixKeyType,
};
use courtpay::domain::cancel_token::{CancelToken, CancelTokenRecord};
use courtpay::domain::correlation::{ChargeCorrelationId, RefundCorrelationId};
use courtpay::domain::money::Cents;
use courtpay::domain::notification::{EmailJob, EmailTemplate};
use courtpay::domain::payment::{
    Charge, ChargeEvent, ChargeRequest, Refund, WebhookCharge, Withdrawal,
};
use courtpay::domain::ports::{BookingStore, CourtDirectory, NotificationSender, PaymentGateway};
use courtpay::error::{BookingError, GatewayError, Result};
use courtpay::infrastructure::in_memory::{
    InMemoryBookingStore, InMemoryDirectory, InMemoryPaymentStore,
};
use courtpay::interfaces::http::AppState;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    CreateSubaccount { name: String, pix_key: String },
    CreateCharge(ChargeRequest),
    GetBalance(String),
    Withdraw(String),
    Refund {
        charge: ChargeCorrelationId,
        refund: RefundCorrelationId,
        value: Cents,
    },
}

/// Gateway double that records every call and can be told to fail.
#[derive(Default)]
pub struct SpyGateway {
    calls: Mutex<Vec<GatewayCall>>,
    fail_subaccount: Mutex<Option<GatewayError>>,
    fail_charge: Mutex<Option<GatewayError>>,
    fail_refund: Mutex<Option<GatewayError>>,
    refund_delay: Mutex<Option<std::time::Duration>>,
    balance: Mutex<i64>,
}

impl SpyGateway {
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn refund_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Refund { .. }))
            .count()
    }

    pub fn charge_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::CreateCharge(_)))
            .count()
    }

    pub fn fail_next_subaccount(&self, error: GatewayError) {
        *self.fail_subaccount.lock().unwrap() = Some(error);
    }

    pub fn fail_next_charge(&self, error: GatewayError) {
        *self.fail_charge.lock().unwrap() = Some(error);
    }

    pub fn fail_next_refund(&self, error: GatewayError) {
        *self.fail_refund.lock().unwrap() = Some(error);
    }

    /// Makes every refund call take `delay` before answering.
    pub fn delay_refunds(&self, delay: std::time::Duration) {
        *self.refund_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_balance(&self, cents: i64) {
        *self.balance.lock().unwrap() = cents;
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PaymentGateway for SpyGateway {
    async fn create_subaccount(
        &self,
        name: &str,
        pix_key: &str,
    ) -> std::result::Result<String, GatewayError> {
        self.record(GatewayCall::CreateSubaccount {
            name: name.into(),
            pix_key: pix_key.into(),
        });
        if let Some(e) = self.fail_subaccount.lock().unwrap().take() {
            return Err(e);
        }
        Ok(pix_key.to_string())
    }

    async fn create_charge(
        &self,
        request: &ChargeRequest,
    ) -> std::result::Result<Charge, GatewayError> {
        self.record(GatewayCall::CreateCharge(request.clone()));
        if let Some(e) = self.fail_charge.lock().unwrap().take() {
            return Err(e);
        }
        Ok(Charge {
            correlation_id: request.correlation_id.clone(),
            gateway_charge_id: format!("ch-{}", request.correlation_id),
            value: request.split.total,
            br_code: format!("000201-{}", request.correlation_id),
            qr_code_image: "https://qr.example/charge.png".into(),
            payment_link_url: "https://pay.example/charge".into(),
            expires_at: Utc::now() + Duration::minutes(30),
        })
    }

    async fn get_balance(&self, pix_key: &str) -> std::result::Result<Cents, GatewayError> {
        self.record(GatewayCall::GetBalance(pix_key.into()));
        Ok(Cents(*self.balance.lock().unwrap()))
    }

    async fn withdraw_subaccount(
        &self,
        pix_key: &str,
    ) -> std::result::Result<Withdrawal, GatewayError> {
        self.record(GatewayCall::Withdraw(pix_key.into()));
        Ok(Withdrawal {
            correlation_id: format!("withdraw-{pix_key}"),
            value: Cents(*self.balance.lock().unwrap()),
            requested_at: Utc::now(),
        })
    }

    async fn refund_charge(
        &self,
        charge: &ChargeCorrelationId,
        refund: &RefundCorrelationId,
        value: Cents,
    ) -> std::result::Result<Refund, GatewayError> {
        self.record(GatewayCall::Refund {
            charge: charge.clone(),
            refund: refund.clone(),
            value,
        });
        let delay = *self.refund_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.fail_refund.lock().unwrap().take() {
            return Err(e);
        }
        Ok(Refund {
            correlation_id: refund.clone(),
            end_to_end_id: format!("E2E-{refund}"),
            value,
            status: "IN_PROCESSING".into(),
            refunded_at: Utc::now(),
        })
    }
}

/// Notification double that keeps every delivered job.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<EmailJob>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<EmailJob> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_with(&self, template: EmailTemplate) -> Vec<EmailJob> {
        self.sent()
            .into_iter()
            .filter(|job| job.template == template)
            .collect()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, job: &EmailJob) -> Result<()> {
        self.sent.lock().unwrap().push(job.clone());
        Ok(())
    }
}

/// Booking store that forwards to the in-memory one and can be told to fail a write.
pub struct FlakyBookingStore {
    inner: InMemoryBookingStore,
    fail_token_write: Mutex<bool>,
    fail_cancel: Mutex<bool>,
}

impl FlakyBookingStore {
    pub fn new(inner: InMemoryBookingStore) -> Self {
        Self {
            inner,
            fail_token_write: Mutex::new(false),
            fail_cancel: Mutex::new(false),
        }
    }

    pub fn fail_next_token_write(&self) {
        *self.fail_token_write.lock().unwrap() = true;
    }

    pub fn fail_next_cancel(&self) {
        *self.fail_cancel.lock().unwrap() = true;
    }

    fn take(flag: &Mutex<bool>) -> bool {
        std::mem::take(&mut *flag.lock().unwrap())
    }
}

#[async_trait]
impl BookingStore for FlakyBookingStore {
    async fn create(&self, booking: Booking) -> Result<String> {
        self.inner.create(booking).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Booking> {
        self.inner.find_by_id(id).await
    }

    async fn list_by_company(&self, company_id: &str, filter: BookingFilter) -> Result<Vec<Booking>> {
        self.inner.list_by_company(company_id, filter).await
    }

    async fn confirm_booking(&self, company_id: &str, booking_id: &str) -> Result<()> {
        self.inner.confirm_booking(company_id, booking_id).await
    }

    async fn cancel_booking(&self, booking_id: &str) -> Result<()> {
        if Self::take(&self.fail_cancel) {
            return Err(BookingError::Persistence("disk full".into()));
        }
        self.inner.cancel_booking(booking_id).await
    }

    async fn set_cancel_token_hash(&self, booking_id: &str, record: CancelTokenRecord) -> Result<bool> {
        if Self::take(&self.fail_token_write) {
            return Err(BookingError::Persistence("disk full".into()));
        }
        self.inner.set_cancel_token_hash(booking_id, record).await
    }

    async fn get_cancel_token(&self, booking_id: &str) -> Result<Option<CancelTokenRecord>> {
        self.inner.get_cancel_token(booking_id).await
    }

    async fn claim_cancel_token(
        &self,
        booking_id: &str,
        token: &CancelToken,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.inner.claim_cancel_token(booking_id, token, now).await
    }

    async fn release_cancel_token(&self, booking_id: &str) -> Result<()> {
        self.inner.release_cancel_token(booking_id).await
    }

    async fn get_booking_summary(&self, booking_id: &str) -> Result<BookingSummary> {
        self.inner.get_booking_summary(booking_id).await
    }
}

/// The orchestrators wired to in-memory stores and the two doubles.
pub struct Harness {
    pub gateway: Arc<SpyGateway>,
    pub sender: Arc<RecordingSender>,
    pub directory: InMemoryDirectory,
    pub booking_store: InMemoryBookingStore,
    pub faults: Arc<FlakyBookingStore>,
    pub payment_store: InMemoryPaymentStore,
    pub queue: NotificationQueue,
    pub payments: Arc<PaymentService>,
    pub bookings: Arc<BookingService>,
    pub onboarding: Arc<CompanyOnboarding>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(PaymentSettings::default())
    }

    pub fn with_settings(settings: PaymentSettings) -> Self {
        let gateway = Arc::new(SpyGateway::default());
        let sender = Arc::new(RecordingSender::default());
        let directory = InMemoryDirectory::new();
        let booking_store = InMemoryBookingStore::new(directory.clone());
        let payment_store = InMemoryPaymentStore::new();
        let faults = Arc::new(FlakyBookingStore::new(booking_store.clone()));

        let (queue, _worker) = NotificationQueue::spawn(
            sender.clone(),
            RetryPolicy {
                max_attempts: 2,
                initial_interval: std::time::Duration::from_millis(1),
                max_interval: std::time::Duration::from_millis(5),
            },
        );

        let payments = Arc::new(PaymentService::new(
            gateway.clone(),
            Arc::new(payment_store.clone()),
            faults.clone(),
            queue.clone(),
            settings,
        ));
        let bookings = Arc::new(BookingService::new(
            faults.clone(),
            Arc::new(directory.clone()),
            payments.clone(),
        ));
        let onboarding = Arc::new(CompanyOnboarding::new(
            Arc::new(directory.clone()),
            payments.clone(),
        ));

        Self {
            gateway,
            sender,
            directory,
            booking_store,
            faults,
            payment_store,
            queue,
            payments,
            bookings,
            onboarding,
        }
    }

    /// Registers a company (with subaccount) and one court at `hourly_price`.
    pub async fn seed(&self, hourly_price: Decimal) -> (Company, Court) {
        let company = self.onboarding.register(company()).await.unwrap();
        let court = self
            .directory
            .register_court(Court {
                id: String::new(),
                company_id: company.id.clone(),
                name: "Quadra Central".into(),
                hourly_price,
            })
            .await
            .unwrap();
        (company, court)
    }

    pub async fn flush(&self) {
        self.queue.flush().await.unwrap();
    }

    pub fn app_state(&self, webhook_secret: Option<&str>) -> AppState {
        AppState {
            bookings: self.bookings.clone(),
            payments: self.payments.clone(),
            onboarding: self.onboarding.clone(),
            courts: Arc::new(self.directory.clone()),
            webhook_secret: webhook_secret.map(Arc::from),
        }
    }
}

pub fn company() -> Company {
    Company {
        id: String::new(),
        name: "Arena Beach Club".into(),
        address: "Rua das Palmeiras, 10".into(),
        email: "arena@example.com".into(),
        phone: "+5583988887777".into(),
        pix_key: "arena@example.com".into(),
        pix_key_type: PixKeyType::Email,
    }
}

pub fn guest() -> Guest {
    Guest {
        name: "Ana Souza".into(),
        phone: "+5583999990000".into(),
        email: "ana@example.com".into(),
    }
}

/// A booking starting in three days, lasting `hours`.
pub fn new_booking(court_id: &str, hours: i64) -> NewBooking {
    let start = slot_start();
    NewBooking {
        court_id: court_id.into(),
        start_time: start,
        end_time: start + Duration::hours(hours),
        guest: guest(),
    }
}

pub fn slot_start() -> DateTime<Utc> {
    let start = Utc::now() + Duration::days(3);
    start - Duration::nanoseconds(start.timestamp_subsec_nanos() as i64)
}

pub fn charge_event(booking_id: &str, event: &str) -> ChargeEvent {
    ChargeEvent {
        event: event.into(),
        charge: WebhookCharge {
            correlation_id: ChargeCorrelationId::for_booking(booking_id).to_string(),
            value: 20000,
            status: "COMPLETED".into(),
            paid_at: Some(Utc::now()),
            created_at: None,
            updated_at: None,
        },
    }
}

pub fn paid_event(booking_id: &str) -> ChargeEvent {
    charge_event(booking_id, "OPENPIX:CHARGE_COMPLETED")
}

pub fn expired_event(booking_id: &str) -> ChargeEvent {
    let mut event = charge_event(booking_id, "OPENPIX:CHARGE_EXPIRED");
    event.charge.status = "EXPIRED".into();
    event.charge.paid_at = None;
    event
}
