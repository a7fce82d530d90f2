use super::actor::UserId;
use super::booking::BookingId;
use crate::error::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub type PaymentId = u64;

/// Rounds to whole pennies, half away from zero. The result always
/// carries two decimal places so money renders consistently.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// A positive monetary value, rounded to pennies on construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(round_money(value)))
        } else {
            Err(Error::Validation("amount must be positive".to_string()))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = Error;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Platform commission applied to every session amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionPolicy {
    pub rate: Decimal,
}

impl Default for CommissionPolicy {
    fn default() -> Self {
        Self { rate: dec!(0.10) }
    }
}

impl CommissionPolicy {
    /// Returns (platform_fee, mentor_payout). The two always add back up
    /// to the amount rounded to pennies.
    pub fn split(&self, amount: Decimal) -> (Decimal, Decimal) {
        let amount = round_money(amount);
        let platform_fee = round_money(amount * self.rate);
        let mentor_payout = round_money(amount - platform_fee);
        (platform_fee, mentor_payout)
    }
}

/// Refund fractions from the cancellation terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefundPolicy {
    pub full_refund_notice_hours: i64,
    pub late_fraction: Decimal,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            full_refund_notice_hours: 24,
            late_fraction: dec!(0.5),
        }
    }
}

impl RefundPolicy {
    /// Fraction of the paid amount returned for a mentee-initiated
    /// cancellation at `now`: full with enough notice, half inside the
    /// notice window, nothing once the session has started.
    pub fn refund_fraction(&self, now: NaiveDateTime, session_start: NaiveDateTime) -> Decimal {
        if session_start - now >= Duration::hours(self.full_refund_notice_hours) {
            Decimal::ONE
        } else if now < session_start {
            self.late_fraction
        } else {
            Decimal::ZERO
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Pending,
    Succeeded,
    Refunded,
}

/// One settlement attempt for a booking, keyed by the processor's
/// payment-intent id. The intent id doubles as the idempotency key for
/// webhook application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub booking_id: BookingId,
    pub amount: Decimal,
    pub platform_fee: Decimal,
    pub mentor_payout: Decimal,
    pub status: PaymentRecordStatus,
    pub external_intent_id: String,
    pub webhook_event_id: Option<String>,
    pub payout_released: bool,
    pub refund_amount: Option<Decimal>,
    pub created_at: NaiveDateTime,
    pub succeeded_at: Option<NaiveDateTime>,
    pub refunded_at: Option<NaiveDateTime>,
}

impl PaymentRecord {
    /// A fresh pending record. The store assigns the id on insert.
    pub fn pending(
        booking_id: BookingId,
        amount: Decimal,
        platform_fee: Decimal,
        mentor_payout: Decimal,
        external_intent_id: String,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: 0,
            booking_id,
            amount,
            platform_fee,
            mentor_payout,
            status: PaymentRecordStatus::Pending,
            external_intent_id,
            webhook_event_id: None,
            payout_released: false,
            refund_amount: None,
            created_at: now,
            succeeded_at: None,
            refunded_at: None,
        }
    }
}

/// Running earnings for one mentor. Succeeded payments accrue as pending
/// until the mentee approves the session summary; only then does the
/// payout become available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentorBalance {
    pub mentor_id: UserId,
    pub total_earned: Decimal,
    pub available_balance: Decimal,
    pub pending_balance: Decimal,
    pub withdrawn: Decimal,
}

impl MentorBalance {
    pub fn new(mentor_id: UserId) -> Self {
        Self {
            mentor_id,
            total_earned: Decimal::ZERO,
            available_balance: Decimal::ZERO,
            pending_balance: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
        }
    }

    pub fn credit_pending(&mut self, payout: Decimal) {
        self.total_earned += payout;
        self.pending_balance += payout;
    }

    /// Consent-gated release: pending -> available.
    pub fn release(&mut self, payout: Decimal) -> Result<()> {
        if self.pending_balance < payout {
            return Err(Error::Integrity(format!(
                "release of {payout} exceeds pending balance {}",
                self.pending_balance
            )));
        }
        self.pending_balance -= payout;
        self.available_balance += payout;
        Ok(())
    }

    /// Reverses an earlier credit when the payment is refunded.
    pub fn reverse(&mut self, payout: Decimal, released: bool) -> Result<()> {
        let bucket = if released {
            &mut self.available_balance
        } else {
            &mut self.pending_balance
        };
        if *bucket < payout {
            return Err(Error::Integrity(format!(
                "reversal of {payout} exceeds the credited balance {bucket}"
            )));
        }
        *bucket -= payout;
        self.total_earned -= payout;
        Ok(())
    }
}
