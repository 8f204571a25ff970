use crate::domain::correlation::ChargeCorrelationId;
use crate::domain::money::{Cents, duration_hours};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const VERIFICATION_CODE_LEN: usize = 6;
const VERIFICATION_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Guest {
    pub name: String,
    pub phone: String,
    pub email: String,
}

/// A guest's booking request, before pricing and persistence.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct NewBooking {
    pub court_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub guest: Guest,
}

/// A persisted booking.
///
/// `total_price` is fixed when the booking is created and is never recomputed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Booking {
    pub id: String,
    pub court_id: String,
    pub company_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub guest: Guest,
    pub status: BookingStatus,
    pub verification_code: String,
    pub total_price: Cents,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn duration_hours(&self) -> Decimal {
        duration_hours(Some(self.start_time), Some(self.end_time))
    }

    pub fn correlation_id(&self) -> ChargeCorrelationId {
        ChargeCorrelationId::for_booking(&self.id)
    }
}

/// Six characters drawn from an alphabet without look-alike glyphs.
pub fn generate_verification_code() -> String {
    let mut rng = rand::thread_rng();
    (0..VERIFICATION_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..VERIFICATION_ALPHABET.len());
            VERIFICATION_ALPHABET[idx] as char
        })
        .collect()
}

/// Optional window on booking start time used by operator listings.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingFilter {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.start_date.is_none_or(|start| booking.start_time >= start)
            && self.end_date.is_none_or(|end| booking.start_time <= end)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Court {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub hourly_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PixKeyType {
    Cpf,
    Cnpj,
    Email,
    Phone,
    Random,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub pix_key: String,
    pub pix_key_type: PixKeyType,
}

impl Company {
    /// Name used for the company's gateway subaccount.
    pub fn slug(&self) -> String {
        self.name.trim().to_lowercase().replace(' ', "-")
    }
}

/// Booking joined with its court and company, as needed by guest emails.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct BookingSummary {
    pub booking_id: String,
    pub guest: Guest,
    pub court_name: String,
    pub company_address: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_price: Cents,
    pub verification_code: String,
}
