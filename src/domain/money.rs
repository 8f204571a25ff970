use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

/// An amount in minor currency units (centavos).
///
/// Every value that crosses the gateway or the stores is kept in this unit so no
/// floating point rounding happens after the price is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Self = Self(0);

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl Sub for Cents {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Platform commission rate, in percent of the charge total.
const COMMISSION_PERCENT: Decimal = dec!(5);
/// Flat offset added to the commission before rounding, in minor units.
const COMMISSION_OFFSET: Decimal = dec!(50);

/// Length of a booking in hours.
///
/// Missing bounds or an end before the start give zero.
pub fn duration_hours(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Decimal {
    match (start, end) {
        (Some(start), Some(end)) if end > start => {
            let seconds = (end - start).num_seconds();
            Decimal::from(seconds) / dec!(3600)
        }
        _ => Decimal::ZERO,
    }
}

fn round_to_cents(value: Decimal) -> Cents {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    Cents(rounded.to_i64().unwrap_or(if rounded.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    }))
}

/// `round(hourly_price × hours × 100)`.
pub fn total_price(hourly_price: Decimal, hours: Decimal) -> Cents {
    match hourly_price
        .checked_mul(hours)
        .and_then(|v| v.checked_mul(dec!(100)))
    {
        Some(value) => round_to_cents(value),
        None => Cents(i64::MAX),
    }
}

/// How a charge total is divided between the platform and the company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub total: Cents,
    /// Platform commission retained by the gateway account.
    pub gas_price: Cents,
    /// Amount routed to the company's subaccount.
    pub net: Cents,
}

impl Split {
    /// Splits a total: `gas_price = round((total × 5 + 50) / 100)`, `net = total − gas_price`.
    pub fn for_total(total: Cents) -> Self {
        let gas_price = (Decimal::from(total.0)
            .checked_mul(COMMISSION_PERCENT)
            .and_then(|v| v.checked_add(COMMISSION_OFFSET)))
        .map(|v| round_to_cents(v / dec!(100)))
        .unwrap_or(Cents::ZERO);

        Self {
            total,
            gas_price,
            net: total - gas_price,
        }
    }

    /// Prices a booking window at the given hourly rate.
    pub fn quote(
        hourly_price: Decimal,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        Self::for_total(total_price(hourly_price, duration_hours(start, end)))
    }
}
