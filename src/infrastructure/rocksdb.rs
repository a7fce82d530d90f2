use crate::domain::actor::UserId;
use crate::domain::booking::{Booking, BookingId};
use crate::domain::payment::{MentorBalance, PaymentRecord, PaymentRecordStatus};
use crate::domain::ports::{
    BalanceStore, BookingStore, PaymentStore, ScheduleStore, SettleOutcome,
};
use crate::domain::schedule::{AvailabilitySlot, BlockId, BlockedDate, SlotId};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for bookings.
pub const CF_BOOKINGS: &str = "bookings";
/// Column Family for payment records.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for availability slots.
pub const CF_SLOTS: &str = "slots";
/// Column Family for blocked dates.
pub const CF_BLOCKS: &str = "blocks";
/// Column Family for mentor balances.
pub const CF_BALANCES: &str = "balances";
/// Column Family for id counters.
pub const CF_META: &str = "meta";

/// A persistent store implementation using RocksDB.
///
/// One database backs every storage port, with a Column Family per
/// entity. Values are JSON. Read-modify-write sequences (id assignment,
/// the settle compare-and-set) serialize on an internal mutex, so the
/// idempotency guarantees match the in-memory store.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksStore {
    db: Arc<DB>,
    write_gate: Arc<Mutex<()>>,
}

impl RocksStore {
    /// Opens or creates a RocksDB instance at the specified path,
    /// ensuring all column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [
            CF_BOOKINGS,
            CF_PAYMENTS,
            CF_SLOTS,
            CF_BLOCKS,
            CF_BALANCES,
            CF_META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
        .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_gate: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("{name} column family not found")))
    }

    fn put<T: Serialize>(&self, cf_name: &'static str, key: u64, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value)
            .map_err(|e| Error::Storage(format!("serialization error: {e}")))?;
        self.db.put_cf(cf, key.to_be_bytes(), bytes)?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(&self, cf_name: &'static str, key: u64) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.to_be_bytes())? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| Error::Storage(format!("deserialization error: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &'static str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, bytes) = item?;
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| Error::Storage(format!("deserialization error: {e}")))?;
            values.push(value);
        }
        Ok(values)
    }

    fn remove(&self, cf_name: &'static str, key: u64) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.delete_cf(cf, key.to_be_bytes())?;
        Ok(())
    }

    /// Next id for `counter`; caller must hold the write gate.
    fn bump(&self, counter: &str) -> Result<u64> {
        let cf = self.cf(CF_META)?;
        let current = match self.db.get_cf(cf, counter.as_bytes())? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage(format!("corrupt {counter} counter")))?;
                u64::from_be_bytes(raw)
            }
            None => 0,
        };
        let id = current + 1;
        self.db.put_cf(cf, counter.as_bytes(), id.to_be_bytes())?;
        Ok(id)
    }
}

#[async_trait]
impl BookingStore for RocksStore {
    async fn insert(&self, mut booking: Booking) -> Result<Booking> {
        let _gate = self.write_gate.lock().await;
        booking.id = self.bump("booking_id")?;
        self.put(CF_BOOKINGS, booking.id, &booking)?;
        Ok(booking)
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        self.fetch(CF_BOOKINGS, id)
    }

    async fn update(&self, booking: Booking) -> Result<()> {
        self.put(CF_BOOKINGS, booking.id, &booking)
    }

    async fn for_mentor_on(&self, mentor_id: UserId, date: NaiveDate) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self.scan(CF_BOOKINGS)?;
        bookings.retain(|b| b.mentor_id == mentor_id && b.session_date == date);
        Ok(bookings)
    }

    async fn for_mentor_between(
        &self,
        mentor_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self.scan(CF_BOOKINGS)?;
        bookings
            .retain(|b| b.mentor_id == mentor_id && b.session_date >= from && b.session_date <= to);
        Ok(bookings)
    }

    async fn for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self.scan(CF_BOOKINGS)?;
        bookings.retain(|b| b.mentee_id == user_id || b.mentor_id == user_id);
        Ok(bookings)
    }

    async fn all(&self) -> Result<Vec<Booking>> {
        self.scan(CF_BOOKINGS)
    }
}

#[async_trait]
impl ScheduleStore for RocksStore {
    async fn insert_slot(&self, mut slot: AvailabilitySlot) -> Result<AvailabilitySlot> {
        let _gate = self.write_gate.lock().await;
        slot.id = self.bump("slot_id")?;
        self.put(CF_SLOTS, slot.id, &slot)?;
        Ok(slot)
    }

    async fn get_slot(&self, id: SlotId) -> Result<Option<AvailabilitySlot>> {
        self.fetch(CF_SLOTS, id)
    }

    async fn update_slot(&self, slot: AvailabilitySlot) -> Result<()> {
        self.put(CF_SLOTS, slot.id, &slot)
    }

    async fn remove_slot(&self, id: SlotId) -> Result<()> {
        self.remove(CF_SLOTS, id)
    }

    async fn slots_for(&self, mentor_id: UserId) -> Result<Vec<AvailabilitySlot>> {
        let mut slots: Vec<AvailabilitySlot> = self.scan(CF_SLOTS)?;
        slots.retain(|s| s.mentor_id == mentor_id);
        Ok(slots)
    }

    async fn insert_block(&self, mut block: BlockedDate) -> Result<BlockedDate> {
        let _gate = self.write_gate.lock().await;
        block.id = self.bump("block_id")?;
        self.put(CF_BLOCKS, block.id, &block)?;
        Ok(block)
    }

    async fn get_block(&self, id: BlockId) -> Result<Option<BlockedDate>> {
        self.fetch(CF_BLOCKS, id)
    }

    async fn remove_block(&self, id: BlockId) -> Result<()> {
        self.remove(CF_BLOCKS, id)
    }

    async fn blocks_for(&self, mentor_id: UserId) -> Result<Vec<BlockedDate>> {
        let mut blocks: Vec<BlockedDate> = self.scan(CF_BLOCKS)?;
        blocks.retain(|b| b.mentor_id == mentor_id);
        Ok(blocks)
    }
}

#[async_trait]
impl PaymentStore for RocksStore {
    async fn insert(&self, mut record: PaymentRecord) -> Result<PaymentRecord> {
        let _gate = self.write_gate.lock().await;
        record.id = self.bump("payment_id")?;
        self.put(CF_PAYMENTS, record.id, &record)?;
        Ok(record)
    }

    async fn update(&self, record: PaymentRecord) -> Result<()> {
        self.put(CF_PAYMENTS, record.id, &record)
    }

    async fn by_booking(&self, booking_id: BookingId) -> Result<Vec<PaymentRecord>> {
        let mut records: Vec<PaymentRecord> = self.scan(CF_PAYMENTS)?;
        records.retain(|r| r.booking_id == booking_id);
        Ok(records)
    }

    async fn by_intent(&self, intent_id: &str) -> Result<Option<PaymentRecord>> {
        let records: Vec<PaymentRecord> = self.scan(CF_PAYMENTS)?;
        Ok(records
            .into_iter()
            .find(|r| r.external_intent_id == intent_id))
    }

    async fn by_event(&self, event_id: &str) -> Result<Option<PaymentRecord>> {
        let records: Vec<PaymentRecord> = self.scan(CF_PAYMENTS)?;
        Ok(records
            .into_iter()
            .find(|r| r.webhook_event_id.as_deref() == Some(event_id)))
    }

    async fn settle(
        &self,
        intent_id: &str,
        event_id: &str,
        now: NaiveDateTime,
    ) -> Result<SettleOutcome> {
        let _gate = self.write_gate.lock().await;
        let records: Vec<PaymentRecord> = self.scan(CF_PAYMENTS)?;
        let mut record = records
            .into_iter()
            .find(|r| r.external_intent_id == intent_id)
            .ok_or(Error::NotFound("payment record"))?;
        if record.status != PaymentRecordStatus::Pending {
            return Ok(SettleOutcome::AlreadySettled(record));
        }
        record.status = PaymentRecordStatus::Succeeded;
        record.webhook_event_id = Some(event_id.to_string());
        record.succeeded_at = Some(now);
        self.put(CF_PAYMENTS, record.id, &record)?;
        Ok(SettleOutcome::Applied(record))
    }

    async fn all(&self) -> Result<Vec<PaymentRecord>> {
        self.scan(CF_PAYMENTS)
    }
}

#[async_trait]
impl BalanceStore for RocksStore {
    async fn get(&self, mentor_id: UserId) -> Result<Option<MentorBalance>> {
        self.fetch(CF_BALANCES, mentor_id)
    }

    async fn put(&self, balance: MentorBalance) -> Result<()> {
        RocksStore::put(self, CF_BALANCES, balance.mentor_id, &balance)
    }

    async fn all(&self) -> Result<Vec<MentorBalance>> {
        self.scan(CF_BALANCES)
    }
}
