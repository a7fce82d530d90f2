use crate::domain::payment::{CommissionPolicy, RefundPolicy};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Platform-wide business settings.
///
/// Every field has a default matching the marketplace terms of service, so
/// a config file only needs to override what differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Fraction of each session amount kept by the platform.
    pub commission_rate: Decimal,
    /// Cancelling at least this many hours before the session refunds in full.
    pub full_refund_notice_hours: i64,
    /// Refund fraction for cancellations inside the notice window.
    pub late_refund_fraction: Decimal,
    /// Shortest bookable session.
    pub min_session_minutes: u32,
    /// Longest bookable session.
    pub max_session_minutes: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            commission_rate: dec!(0.10),
            full_refund_notice_hours: 24,
            late_refund_fraction: dec!(0.5),
            min_session_minutes: 30,
            max_session_minutes: 240,
        }
    }
}

impl PlatformConfig {
    pub fn commission(&self) -> CommissionPolicy {
        CommissionPolicy {
            rate: self.commission_rate,
        }
    }

    pub fn refunds(&self) -> RefundPolicy {
        RefundPolicy {
            full_refund_notice_hours: self.full_refund_notice_hours,
            late_fraction: self.late_refund_fraction,
        }
    }
}
