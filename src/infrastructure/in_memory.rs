use crate::domain::actor::UserId;
use crate::domain::booking::{Booking, BookingId};
use crate::domain::payment::{Amount, MentorBalance, PaymentRecord, PaymentRecordStatus};
use crate::domain::ports::{
    BalanceStore, BookingStore, MentorDirectory, PaymentStore, ScheduleStore, SettleOutcome,
};
use crate::domain::schedule::{AvailabilitySlot, BlockId, BlockedDate, SlotId};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

fn next(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

/// Thread-safe in-memory booking store.
///
/// `Arc<RwLock<HashMap>>` for shared concurrent access, ids from a
/// monotonic counter. The default backend for tests and the replay
/// binary.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, mut booking: Booking) -> Result<Booking> {
        booking.id = next(&self.next_id);
        self.bookings
            .write()
            .await
            .insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn update(&self, booking: Booking) -> Result<()> {
        self.bookings.write().await.insert(booking.id, booking);
        Ok(())
    }

    async fn for_mentor_on(&self, mentor_id: UserId, date: NaiveDate) -> Result<Vec<Booking>> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.mentor_id == mentor_id && b.session_date == date)
            .cloned()
            .collect())
    }

    async fn for_mentor_between(
        &self,
        mentor_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Booking>> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.mentor_id == mentor_id && b.session_date >= from && b.session_date <= to)
            .cloned()
            .collect())
    }

    async fn for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.mentee_id == user_id || b.mentor_id == user_id)
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<Booking>> {
        let mut bookings: Vec<_> = self.bookings.read().await.values().cloned().collect();
        bookings.sort_by_key(|b| b.id);
        Ok(bookings)
    }
}

/// Thread-safe in-memory calendar store for availability and blocked
/// dates.
#[derive(Default, Clone)]
pub struct InMemoryScheduleStore {
    slots: Arc<RwLock<HashMap<SlotId, AvailabilitySlot>>>,
    blocks: Arc<RwLock<HashMap<BlockId, BlockedDate>>>,
    next_slot_id: Arc<AtomicU64>,
    next_block_id: Arc<AtomicU64>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn insert_slot(&self, mut slot: AvailabilitySlot) -> Result<AvailabilitySlot> {
        slot.id = next(&self.next_slot_id);
        self.slots.write().await.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn get_slot(&self, id: SlotId) -> Result<Option<AvailabilitySlot>> {
        Ok(self.slots.read().await.get(&id).cloned())
    }

    async fn update_slot(&self, slot: AvailabilitySlot) -> Result<()> {
        self.slots.write().await.insert(slot.id, slot);
        Ok(())
    }

    async fn remove_slot(&self, id: SlotId) -> Result<()> {
        self.slots.write().await.remove(&id);
        Ok(())
    }

    async fn slots_for(&self, mentor_id: UserId) -> Result<Vec<AvailabilitySlot>> {
        Ok(self
            .slots
            .read()
            .await
            .values()
            .filter(|s| s.mentor_id == mentor_id)
            .cloned()
            .collect())
    }

    async fn insert_block(&self, mut block: BlockedDate) -> Result<BlockedDate> {
        block.id = next(&self.next_block_id);
        self.blocks.write().await.insert(block.id, block.clone());
        Ok(block)
    }

    async fn get_block(&self, id: BlockId) -> Result<Option<BlockedDate>> {
        Ok(self.blocks.read().await.get(&id).cloned())
    }

    async fn remove_block(&self, id: BlockId) -> Result<()> {
        self.blocks.write().await.remove(&id);
        Ok(())
    }

    async fn blocks_for(&self, mentor_id: UserId) -> Result<Vec<BlockedDate>> {
        Ok(self
            .blocks
            .read()
            .await
            .values()
            .filter(|b| b.mentor_id == mentor_id)
            .cloned()
            .collect())
    }
}

/// Thread-safe in-memory payment record store.
///
/// `settle` runs its compare-and-set under the write lock, so two
/// concurrent webhook deliveries for one intent serialize and exactly one
/// observes `Applied`.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    records: Arc<RwLock<HashMap<u64, PaymentRecord>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, mut record: PaymentRecord) -> Result<PaymentRecord> {
        record.id = next(&self.next_id);
        self.records.write().await.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, record: PaymentRecord) -> Result<()> {
        self.records.write().await.insert(record.id, record);
        Ok(())
    }

    async fn by_booking(&self, booking_id: BookingId) -> Result<Vec<PaymentRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn by_intent(&self, intent_id: &str) -> Result<Option<PaymentRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.external_intent_id == intent_id)
            .cloned())
    }

    async fn by_event(&self, event_id: &str) -> Result<Option<PaymentRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.webhook_event_id.as_deref() == Some(event_id))
            .cloned())
    }

    async fn settle(
        &self,
        intent_id: &str,
        event_id: &str,
        now: NaiveDateTime,
    ) -> Result<SettleOutcome> {
        let mut records = self.records.write().await;
        let record = records
            .values_mut()
            .find(|r| r.external_intent_id == intent_id)
            .ok_or(Error::NotFound("payment record"))?;
        if record.status != PaymentRecordStatus::Pending {
            return Ok(SettleOutcome::AlreadySettled(record.clone()));
        }
        record.status = PaymentRecordStatus::Succeeded;
        record.webhook_event_id = Some(event_id.to_string());
        record.succeeded_at = Some(now);
        Ok(SettleOutcome::Applied(record.clone()))
    }

    async fn all(&self) -> Result<Vec<PaymentRecord>> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

/// Thread-safe in-memory mentor balance store.
#[derive(Default, Clone)]
pub struct InMemoryBalanceStore {
    balances: Arc<RwLock<HashMap<UserId, MentorBalance>>>,
}

impl InMemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn get(&self, mentor_id: UserId) -> Result<Option<MentorBalance>> {
        Ok(self.balances.read().await.get(&mentor_id).cloned())
    }

    async fn put(&self, balance: MentorBalance) -> Result<()> {
        self.balances
            .write()
            .await
            .insert(balance.mentor_id, balance);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<MentorBalance>> {
        let mut balances: Vec<_> = self.balances.read().await.values().cloned().collect();
        balances.sort_by_key(|b| b.mentor_id);
        Ok(balances)
    }
}

/// In-memory stand-in for the external profile service: mentor hourly
/// rates keyed by user id.
#[derive(Default, Clone)]
pub struct InMemoryMentorDirectory {
    rates: Arc<RwLock<HashMap<UserId, Amount>>>,
}

impl InMemoryMentorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_rate(&self, mentor_id: UserId, rate: Amount) {
        self.rates.write().await.insert(mentor_id, rate);
    }
}

#[async_trait]
impl MentorDirectory for InMemoryMentorDirectory {
    async fn hourly_rate(&self, mentor_id: UserId) -> Result<Option<Amount>> {
        Ok(self.rates.read().await.get(&mentor_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal_macros::dec;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn booking(date: NaiveDate) -> Booking {
        Booking::request(
            21,
            7,
            date,
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            60,
            dec!(50),
            None,
            now(),
        )
    }

    #[tokio::test]
    async fn test_booking_store_assigns_ids() {
        let store = InMemoryBookingStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let first = store.insert(booking(date)).await.unwrap();
        let second = store.insert(booking(date)).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        let fetched = store.get(1).await.unwrap().unwrap();
        assert_eq!(fetched, first);
        assert!(store.get(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_booking_store_date_queries() {
        let store = InMemoryBookingStore::new();
        let d1 = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();
        store.insert(booking(d1)).await.unwrap();
        store.insert(booking(d2)).await.unwrap();

        assert_eq!(store.for_mentor_on(7, d1).await.unwrap().len(), 1);
        assert_eq!(store.for_mentor_on(8, d1).await.unwrap().len(), 0);
        assert_eq!(store.for_mentor_between(7, d1, d2).await.unwrap().len(), 2);
        assert_eq!(store.for_user(21).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_settle_is_a_one_shot_cas() {
        let store = InMemoryPaymentStore::new();
        let record = PaymentRecord::pending(1, dec!(50), dec!(5), dec!(45), "pi_1".to_string(), now());
        store.insert(record).await.unwrap();

        let first = store.settle("pi_1", "evt_1", now()).await.unwrap();
        let SettleOutcome::Applied(applied) = first else {
            panic!("first settle must apply");
        };
        assert_eq!(applied.status, PaymentRecordStatus::Succeeded);
        assert_eq!(applied.webhook_event_id.as_deref(), Some("evt_1"));

        let second = store.settle("pi_1", "evt_2", now()).await.unwrap();
        let SettleOutcome::AlreadySettled(kept) = second else {
            panic!("second settle must be a no-op");
        };
        // The original event id survives the replay.
        assert_eq!(kept.webhook_event_id.as_deref(), Some("evt_1"));

        assert!(store.by_event("evt_1").await.unwrap().is_some());
        assert!(store.by_event("evt_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_settle_unknown_intent_is_not_found() {
        let store = InMemoryPaymentStore::new();
        assert!(matches!(
            store.settle("pi_missing", "evt_1", now()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_directory_rates() {
        let directory = InMemoryMentorDirectory::new();
        directory.set_rate(7, Amount::new(dec!(50)).unwrap()).await;
        assert!(directory.hourly_rate(7).await.unwrap().is_some());
        assert!(directory.hourly_rate(8).await.unwrap().is_none());
    }
}
