use crate::domain::booking::{Guest, PixKeyType};
use crate::domain::correlation::{ChargeCorrelationId, RefundCorrelationId};
use crate::domain::money::{Cents, Split};
use crate::error::{BookingError, ConflictKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a booking's charge at the gateway.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Created,
    Paid,
    Expired,
    Refunded,
}

/// Outcome of applying a status change to a charge.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Transition {
    /// The charge moved to the new status.
    Applied,
    /// The charge was already in (or past) the requested status; nothing changed.
    AlreadyApplied,
}

impl ChargeStatus {
    /// Validates a move from `self` to `to`.
    ///
    /// Webhooks may arrive twice and out of order, so repeats are no-ops, a late
    /// `paid` overrides `expired`, and a late `expired` never downgrades `paid`.
    pub fn transition(self, to: ChargeStatus) -> Result<Transition, BookingError> {
        use ChargeStatus::*;
        match (self, to) {
            (Created, Paid) | (Created, Expired) | (Expired, Paid) | (Paid, Refunded) => {
                Ok(Transition::Applied)
            }
            (Paid, Paid)
            | (Expired, Expired)
            | (Refunded, Refunded)
            | (Paid, Expired)
            | (Refunded, Expired) => Ok(Transition::AlreadyApplied),
            _ => Err(BookingError::Conflict(ConflictKind::InvalidChargeTransition)),
        }
    }

    /// Whether the charge still blocks a new charge for the same booking.
    pub fn is_active(self) -> bool {
        matches!(self, ChargeStatus::Created | ChargeStatus::Paid)
    }
}

/// What the orchestrator asks the gateway to charge.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub correlation_id: ChargeCorrelationId,
    pub customer: Guest,
    pub split: Split,
    pub subaccount_pix_key: String,
}

/// A charge as acknowledged by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Charge {
    pub correlation_id: ChargeCorrelationId,
    pub gateway_charge_id: String,
    pub value: Cents,
    pub br_code: String,
    pub qr_code_image: String,
    pub payment_link_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Local record of a booking's charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub company_id: String,
    pub correlation_id: ChargeCorrelationId,
    pub gateway_charge_id: String,
    pub subaccount_pix_key: String,
    pub br_code: String,
    pub qr_code_image: String,
    pub split: Split,
    pub status: ChargeStatus,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_end_to_end_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn from_charge(
        id: String,
        company_id: &str,
        request: &ChargeRequest,
        charge: Charge,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            booking_id: charge.correlation_id.booking_id().to_string(),
            company_id: company_id.to_string(),
            correlation_id: charge.correlation_id,
            gateway_charge_id: charge.gateway_charge_id,
            subaccount_pix_key: request.subaccount_pix_key.clone(),
            br_code: charge.br_code,
            qr_code_image: charge.qr_code_image,
            split: request.split,
            status: ChargeStatus::Created,
            expires_at: charge.expires_at,
            paid_at: None,
            expired_at: None,
            refunded_at: None,
            refund_end_to_end_id: None,
            created_at: now,
        }
    }

    /// Applies a webhook-driven status change in place.
    pub fn apply(&mut self, to: ChargeStatus, at: DateTime<Utc>) -> Result<Transition, BookingError> {
        let transition = self.status.transition(to)?;
        if transition == Transition::Applied {
            self.status = to;
            match to {
                ChargeStatus::Paid => self.paid_at = Some(at),
                ChargeStatus::Expired => self.expired_at = Some(at),
                ChargeStatus::Refunded => self.refunded_at = Some(at),
                ChargeStatus::Created => {}
            }
        }
        Ok(transition)
    }
}

/// Payment details a guest needs to (re)display the PIX QR code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeInformation {
    pub br_code: String,
    pub qr_code_image: String,
    pub expires_at: DateTime<Utc>,
    pub status: ChargeStatus,
}

impl From<&Payment> for ChargeInformation {
    fn from(payment: &Payment) -> Self {
        Self {
            br_code: payment.br_code.clone(),
            qr_code_image: payment.qr_code_image.clone(),
            expires_at: payment.expires_at,
            status: payment.status,
        }
    }
}

/// A company's settlement identity at the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subaccount {
    pub company_id: String,
    pub name: String,
    pub pix_key: String,
    pub pix_key_type: PixKeyType,
    pub created_at: DateTime<Utc>,
}

/// Gateway acknowledgement of a refund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub correlation_id: RefundCorrelationId,
    pub end_to_end_id: String,
    pub value: Cents,
    pub status: String,
    pub refunded_at: DateTime<Utc>,
}

/// Gateway acknowledgement of a subaccount withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub correlation_id: String,
    pub value: Cents,
    pub requested_at: DateTime<Utc>,
}

/// Charge part of a gateway webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCharge {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A charge notification delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeEvent {
    #[serde(default)]
    pub event: String,
    pub charge: WebhookCharge,
}

/// The two charge notifications the service subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeEventKind {
    Completed,
    Expired,
}

impl ChargeEventKind {
    pub fn event_name(self) -> &'static str {
        match self {
            ChargeEventKind::Completed => "OPENPIX:CHARGE_COMPLETED",
            ChargeEventKind::Expired => "OPENPIX:CHARGE_EXPIRED",
        }
    }

    pub fn charge_status(self) -> &'static str {
        match self {
            ChargeEventKind::Completed => "COMPLETED",
            ChargeEventKind::Expired => "EXPIRED",
        }
    }
}

impl ChargeEvent {
    /// Whether the event name and charge status both agree with `kind`.
    ///
    /// Either field may be missing, but not both.
    pub fn is_kind(&self, kind: ChargeEventKind) -> bool {
        let event = self.event.trim();
        let status = self.charge.status.trim();
        if event.is_empty() && status.is_empty() {
            return false;
        }
        (event.is_empty() || event == kind.event_name())
            && (status.is_empty() || status.eq_ignore_ascii_case(kind.charge_status()))
    }
}

#[cfg(test)]
mod tests {
    use super::ChargeStatus::*;
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        assert_eq!(Created.transition(Paid).unwrap(), Transition::Applied);
        assert_eq!(Created.transition(Expired).unwrap(), Transition::Applied);
        assert_eq!(Expired.transition(Paid).unwrap(), Transition::Applied);
        assert_eq!(Paid.transition(Refunded).unwrap(), Transition::Applied);
    }

    #[test]
    fn test_repeated_and_late_transitions_are_no_ops() {
        assert_eq!(Paid.transition(Paid).unwrap(), Transition::AlreadyApplied);
        assert_eq!(Expired.transition(Expired).unwrap(), Transition::AlreadyApplied);
        assert_eq!(Paid.transition(Expired).unwrap(), Transition::AlreadyApplied);
        assert_eq!(Refunded.transition(Refunded).unwrap(), Transition::AlreadyApplied);
    }

    #[test]
    fn test_rejected_transitions() {
        for (from, to) in [
            (Created, Refunded),
            (Expired, Refunded),
            (Refunded, Paid),
            (Paid, Created),
            (Created, Created),
        ] {
            assert!(
                matches!(
                    from.transition(to),
                    Err(BookingError::Conflict(ConflictKind::InvalidChargeTransition))
                ),
                "{from:?} -> {to:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_active_statuses() {
        assert!(Created.is_active());
        assert!(Paid.is_active());
        assert!(!Expired.is_active());
        assert!(!Refunded.is_active());
    }

    #[test]
    fn test_webhook_event_deserialization() {
        let json = r#"{
            "event": "OPENPIX:CHARGE_COMPLETED",
            "charge": {
                "status": "COMPLETED",
                "value": 20000,
                "correlationID": "booking-42",
                "paidAt": "2025-03-14T18:05:00Z",
                "brCode": "000201..."
            }
        }"#;
        let event: ChargeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.charge.correlation_id, "booking-42");
        assert_eq!(event.charge.value, 20000);
        assert!(event.charge.paid_at.is_some());
    }

    fn event(name: &str, status: &str) -> ChargeEvent {
        ChargeEvent {
            event: name.into(),
            charge: WebhookCharge {
                correlation_id: "booking-1".into(),
                value: 100,
                status: status.into(),
                paid_at: None,
                created_at: None,
                updated_at: None,
            },
        }
    }

    #[test]
    fn test_event_kind_matching() {
        let completed = ChargeEventKind::Completed;
        let expired = ChargeEventKind::Expired;

        assert!(event("OPENPIX:CHARGE_COMPLETED", "COMPLETED").is_kind(completed));
        assert!(event("OPENPIX:CHARGE_COMPLETED", "").is_kind(completed));
        assert!(event("", "completed").is_kind(completed));
        assert!(event("OPENPIX:CHARGE_EXPIRED", "EXPIRED").is_kind(expired));

        assert!(!event("OPENPIX:CHARGE_EXPIRED", "EXPIRED").is_kind(completed));
        assert!(!event("OPENPIX:CHARGE_COMPLETED", "EXPIRED").is_kind(completed));
        assert!(!event("OPENPIX:CHARGE_COMPLETED", "COMPLETED").is_kind(expired));
        assert!(!event("", "").is_kind(completed));
    }
}
