//! Correlation identifiers shared with the payment gateway.
//!
//! The gateway only echoes the correlation ID back on webhooks, so these strings are
//! the join key between local rows and gateway-side charges. Building and parsing
//! them lives here and nowhere else.

use serde::{Deserialize, Serialize};
use std::fmt;

const BOOKING_PREFIX: &str = "booking-";
const REFUND_PREFIX: &str = "refund-";

/// Correlation ID of a booking's charge: `booking-<bookingID>`.
///
/// Deserialization goes through [`ChargeCorrelationId::parse`], so a stored value
/// without the prefix is rejected on load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChargeCorrelationId(String);

impl ChargeCorrelationId {
    pub fn for_booking(booking_id: &str) -> Self {
        Self(format!("{BOOKING_PREFIX}{booking_id}"))
    }

    /// Parses a correlation ID received from the gateway.
    ///
    /// Returns `None` when the value does not carry the booking prefix or the
    /// booking part is empty.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.strip_prefix(BOOKING_PREFIX) {
            Some(id) if !id.is_empty() => Some(Self(raw.to_string())),
            _ => None,
        }
    }

    pub fn booking_id(&self) -> &str {
        &self.0[BOOKING_PREFIX.len()..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChargeCorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation ID of a refund request: `refund-<paymentID>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefundCorrelationId(String);

impl RefundCorrelationId {
    pub fn for_payment(payment_id: &str) -> Self {
        Self(format!("{REFUND_PREFIX}{payment_id}"))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.strip_prefix(REFUND_PREFIX) {
            Some(id) if !id.is_empty() => Some(Self(raw.to_string())),
            _ => None,
        }
    }

    pub fn payment_id(&self) -> &str {
        &self.0[REFUND_PREFIX.len()..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefundCorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ChargeCorrelationId {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("invalid charge correlation id: {raw:?}"))
    }
}

impl From<ChargeCorrelationId> for String {
    fn from(id: ChargeCorrelationId) -> Self {
        id.0
    }
}

impl TryFrom<String> for RefundCorrelationId {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("invalid refund correlation id: {raw:?}"))
    }
}

impl From<RefundCorrelationId> for String {
    fn from(id: RefundCorrelationId) -> Self {
        id.0
    }
}
