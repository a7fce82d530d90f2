use super::actor::UserId;
use super::booking::{Booking, BookingId};
use super::payment::{Amount, MentorBalance, PaymentRecord};
use super::schedule::{AvailabilitySlot, BlockId, BlockedDate, SlotId};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::sync::Arc;

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persists a new booking, assigning its id.
    async fn insert(&self, booking: Booking) -> Result<Booking>;
    async fn get(&self, id: BookingId) -> Result<Option<Booking>>;
    async fn update(&self, booking: Booking) -> Result<()>;
    /// Bookings held by a mentor on one date, any status.
    async fn for_mentor_on(&self, mentor_id: UserId, date: NaiveDate) -> Result<Vec<Booking>>;
    /// Bookings held by a mentor between two dates, inclusive.
    async fn for_mentor_between(
        &self,
        mentor_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Booking>>;
    /// Every booking the user participates in, on either side.
    async fn for_user(&self, user_id: UserId) -> Result<Vec<Booking>>;
    async fn all(&self) -> Result<Vec<Booking>>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert_slot(&self, slot: AvailabilitySlot) -> Result<AvailabilitySlot>;
    async fn get_slot(&self, id: SlotId) -> Result<Option<AvailabilitySlot>>;
    async fn update_slot(&self, slot: AvailabilitySlot) -> Result<()>;
    async fn remove_slot(&self, id: SlotId) -> Result<()>;
    async fn slots_for(&self, mentor_id: UserId) -> Result<Vec<AvailabilitySlot>>;
    async fn insert_block(&self, block: BlockedDate) -> Result<BlockedDate>;
    async fn get_block(&self, id: BlockId) -> Result<Option<BlockedDate>>;
    async fn remove_block(&self, id: BlockId) -> Result<()>;
    async fn blocks_for(&self, mentor_id: UserId) -> Result<Vec<BlockedDate>>;
}

/// Outcome of the pending -> succeeded compare-and-set for one intent.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleOutcome {
    /// This call won the race and settled the record.
    Applied(PaymentRecord),
    /// The record had already left pending; replay, nothing to do.
    AlreadySettled(PaymentRecord),
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a new record, assigning its id.
    async fn insert(&self, record: PaymentRecord) -> Result<PaymentRecord>;
    async fn update(&self, record: PaymentRecord) -> Result<()>;
    async fn by_booking(&self, booking_id: BookingId) -> Result<Vec<PaymentRecord>>;
    async fn by_intent(&self, intent_id: &str) -> Result<Option<PaymentRecord>>;
    async fn by_event(&self, event_id: &str) -> Result<Option<PaymentRecord>>;
    /// Atomically moves the record for `intent_id` from pending to
    /// succeeded, stamping the winning event id. Serialized per intent:
    /// of two concurrent writers exactly one observes `Applied`.
    async fn settle(
        &self,
        intent_id: &str,
        event_id: &str,
        now: NaiveDateTime,
    ) -> Result<SettleOutcome>;
    async fn all(&self) -> Result<Vec<PaymentRecord>>;
}

#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn get(&self, mentor_id: UserId) -> Result<Option<MentorBalance>>;
    async fn put(&self, balance: MentorBalance) -> Result<()>;
    async fn all(&self) -> Result<Vec<MentorBalance>>;
}

/// External profile collaborator. Pricing is the only thing this layer
/// needs from a mentor profile.
#[async_trait]
pub trait MentorDirectory: Send + Sync {
    /// The advertised hourly rate, or None for an unknown mentor.
    async fn hourly_rate(&self, mentor_id: UserId) -> Result<Option<Amount>>;
}

/// Status-change message for the external notification collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    BookingRequested { booking: BookingId, mentor: UserId },
    BookingConfirmed { booking: BookingId, mentee: UserId },
    BookingCancelled { booking: BookingId, by: UserId },
    BookingCompleted { booking: BookingId, mentee: UserId },
    SummarySubmitted { booking: BookingId, mentee: UserId },
    ConsentRecorded { booking: BookingId, approved: bool },
    PaymentSucceeded { booking: BookingId, mentor: UserId },
    PaymentRefunded { booking: BookingId, amount: Decimal },
    PayoutReleased {
        booking: BookingId,
        mentor: UserId,
        amount: Decimal,
    },
}

/// Fire-and-forget delivery; failures are the sink's problem, never the
/// caller's.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notice: Notice);
}

/// Injected wall clock. Operations that enforce time (session completion,
/// refund notice windows) read it from here so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub type BookingStoreRef = Arc<dyn BookingStore>;
pub type ScheduleStoreRef = Arc<dyn ScheduleStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type BalanceStoreRef = Arc<dyn BalanceStore>;
pub type MentorDirectoryRef = Arc<dyn MentorDirectory>;
pub type NotificationSinkRef = Arc<dyn NotificationSink>;
pub type ClockRef = Arc<dyn Clock>;
