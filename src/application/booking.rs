use super::locks::LockRegistry;
use super::settlement::SettlementTracker;
use crate::config::PlatformConfig;
use crate::domain::actor::{Actor, Role, UserId};
use crate::domain::booking::{Booking, BookingId, BookingStatus, PaymentStatus};
use crate::domain::payment;
use crate::domain::ports::{
    BookingStoreRef, ClockRef, MentorDirectoryRef, Notice, NotificationSinkRef, ScheduleStoreRef,
};
use crate::domain::schedule::{
    self, AvailabilitySlot, BlockId, BlockedDate, OpenSlot, SlotId,
};
use crate::error::{Error, Result};
use chrono::{Duration, NaiveDate, NaiveTime, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Boundary schema for a booking request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub mentor_id: UserId,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_minutes: u32,
    #[serde(default)]
    pub mentee_message: Option<String>,
}

/// Owns every booking state transition and the mentor calendar.
///
/// Mutations on one booking run under a per-booking lock shared with the
/// settlement tracker; `create` additionally serializes per mentor so the
/// conflict check and the insert see the same snapshot.
pub struct BookingManager {
    bookings: BookingStoreRef,
    schedule: ScheduleStoreRef,
    mentors: MentorDirectoryRef,
    settlement: Arc<SettlementTracker>,
    notifier: NotificationSinkRef,
    clock: ClockRef,
    config: PlatformConfig,
    booking_locks: LockRegistry<BookingId>,
    mentor_locks: LockRegistry<UserId>,
}

impl BookingManager {
    pub fn new(
        bookings: BookingStoreRef,
        schedule: ScheduleStoreRef,
        mentors: MentorDirectoryRef,
        settlement: Arc<SettlementTracker>,
        notifier: NotificationSinkRef,
        clock: ClockRef,
        config: PlatformConfig,
    ) -> Self {
        let booking_locks = settlement.booking_locks();
        Self {
            bookings,
            schedule,
            mentors,
            settlement,
            notifier,
            clock,
            config,
            booking_locks,
            mentor_locks: LockRegistry::new(),
        }
    }

    async fn load(&self, id: BookingId) -> Result<Booking> {
        self.bookings
            .get(id)
            .await?
            .ok_or(Error::NotFound("booking"))
    }

    /// Books a session with a mentor, entering the requested state.
    ///
    /// The window must lie inside the mentor's active availability, on a
    /// date that is not blocked, and must not overlap a booking that
    /// still holds its slot. Cancelled bookings never block re-booking.
    pub async fn create(&self, actor: &Actor, request: BookingRequest) -> Result<Booking> {
        if !actor.is_mentee() {
            return Err(Error::Forbidden(
                "only mentees can book sessions".to_string(),
            ));
        }
        let minutes = request.duration_minutes;
        if minutes < self.config.min_session_minutes || minutes > self.config.max_session_minutes {
            return Err(Error::Validation(format!(
                "session length must be between {} and {} minutes",
                self.config.min_session_minutes, self.config.max_session_minutes
            )));
        }
        let (end_time, wrapped) = request
            .start_time
            .overflowing_add_signed(Duration::minutes(i64::from(minutes)));
        if wrapped != 0 || end_time <= request.start_time {
            return Err(Error::Validation(
                "session must end on the same day it starts".to_string(),
            ));
        }
        let rate = self
            .mentors
            .hourly_rate(request.mentor_id)
            .await?
            .ok_or(Error::NotFound("mentor"))?;
        let amount =
            payment::round_money(rate.value() * Decimal::from(minutes) / Decimal::from(60u32));
        if amount <= Decimal::ZERO {
            return Err(Error::SlotUnavailable(
                "session amount must be positive".to_string(),
            ));
        }

        // Conflict check and insert under the mentor's lock, so two
        // concurrent requests for the same window cannot both pass.
        let _guard = self.mentor_locks.acquire(request.mentor_id).await;

        let blocks = self.schedule.blocks_for(request.mentor_id).await?;
        if let Some(block) = blocks.iter().find(|b| b.date == request.session_date) {
            return Err(Error::SlotUnavailable(match &block.reason {
                Some(reason) => format!("mentor is unavailable on this date: {reason}"),
                None => "mentor is unavailable on this date".to_string(),
            }));
        }
        let slots = self.schedule.slots_for(request.mentor_id).await?;
        if !slots
            .iter()
            .any(|s| s.covers(request.session_date, request.start_time, end_time))
        {
            return Err(Error::SlotUnavailable(
                "outside the mentor's availability".to_string(),
            ));
        }
        let held = self
            .bookings
            .for_mentor_on(request.mentor_id, request.session_date)
            .await?;
        if held.iter().any(|b| {
            b.blocks_slot()
                && schedule::windows_overlap(
                    b.start_time,
                    b.end_time,
                    request.start_time,
                    end_time,
                )
        }) {
            return Err(Error::SlotUnavailable(
                "this time slot is already booked".to_string(),
            ));
        }

        let booking = Booking::request(
            actor.id,
            request.mentor_id,
            request.session_date,
            request.start_time,
            end_time,
            minutes,
            amount,
            request.mentee_message,
            self.clock.now(),
        );
        let booking = self.bookings.insert(booking).await?;
        debug!(booking_id = booking.id, mentor_id = booking.mentor_id, "booking requested");
        self.notifier
            .notify(Notice::BookingRequested {
                booking: booking.id,
                mentor: booking.mentor_id,
            })
            .await;
        Ok(booking)
    }

    pub async fn confirm(&self, actor: &Actor, id: BookingId) -> Result<Booking> {
        let _guard = self.booking_locks.acquire(id).await;
        let mut booking = self.load(id).await?;
        booking.confirm(actor, self.clock.now())?;
        self.bookings.update(booking.clone()).await?;
        self.notifier
            .notify(Notice::BookingConfirmed {
                booking: id,
                mentee: booking.mentee_id,
            })
            .await;
        Ok(booking)
    }

    /// Cancels a requested or confirmed booking. When the booking is
    /// already paid the refund obligation is discharged here as well,
    /// under the same lock.
    pub async fn cancel(
        &self,
        actor: &Actor,
        id: BookingId,
        reason: Option<String>,
    ) -> Result<Booking> {
        let _guard = self.booking_locks.acquire(id).await;
        let mut booking = self.load(id).await?;
        booking.cancel(actor, reason, self.clock.now())?;
        if booking.payment_status == PaymentStatus::Paid {
            self.settlement.apply_refund(&mut booking, actor).await?;
        }
        self.bookings.update(booking.clone()).await?;
        self.notifier
            .notify(Notice::BookingCancelled {
                booking: id,
                by: actor.id,
            })
            .await;
        Ok(booking)
    }

    pub async fn complete(&self, actor: &Actor, id: BookingId) -> Result<Booking> {
        let _guard = self.booking_locks.acquire(id).await;
        let mut booking = self.load(id).await?;
        booking.complete(actor, self.clock.now())?;
        self.bookings.update(booking.clone()).await?;
        self.notifier
            .notify(Notice::BookingCompleted {
                booking: id,
                mentee: booking.mentee_id,
            })
            .await;
        Ok(booking)
    }

    pub async fn set_meeting_link(
        &self,
        actor: &Actor,
        id: BookingId,
        url: &str,
    ) -> Result<Booking> {
        let _guard = self.booking_locks.acquire(id).await;
        let mut booking = self.load(id).await?;
        booking.set_meeting_link(actor, url)?;
        self.bookings.update(booking.clone()).await?;
        Ok(booking)
    }

    pub async fn submit_summary(
        &self,
        actor: &Actor,
        id: BookingId,
        text: &str,
    ) -> Result<Booking> {
        let _guard = self.booking_locks.acquire(id).await;
        let mut booking = self.load(id).await?;
        booking.submit_summary(actor, text, self.clock.now())?;
        self.bookings.update(booking.clone()).await?;
        self.notifier
            .notify(Notice::SummarySubmitted {
                booking: id,
                mentee: booking.mentee_id,
            })
            .await;
        Ok(booking)
    }

    /// Records the mentee's verdict on the session summary. Approval
    /// signals the settlement tracker to release the mentor payout.
    pub async fn mentee_consent(
        &self,
        actor: &Actor,
        id: BookingId,
        consent: bool,
        note: Option<String>,
    ) -> Result<Booking> {
        let release = {
            let _guard = self.booking_locks.acquire(id).await;
            let mut booking = self.load(id).await?;
            let release = booking.record_consent(actor, consent, note, self.clock.now())?;
            self.bookings.update(booking).await?;
            release
        };
        self.notifier
            .notify(Notice::ConsentRecorded {
                booking: id,
                approved: consent,
            })
            .await;
        if release {
            self.settlement.release_payout(id).await?;
        }
        self.load(id).await
    }

    // ---- mentor calendar -------------------------------------------------

    /// Adds a weekly availability window. Overlapping an existing active
    /// window on the same weekday is rejected.
    pub async fn add_availability(
        &self,
        actor: &Actor,
        day_of_week: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<AvailabilitySlot> {
        if !actor.is_mentor() {
            return Err(Error::Forbidden(
                "only mentors can set availability".to_string(),
            ));
        }
        if end_time <= start_time {
            return Err(Error::Validation(
                "availability must end after it starts".to_string(),
            ));
        }
        let candidate = AvailabilitySlot {
            id: 0,
            mentor_id: actor.id,
            day_of_week,
            start_time,
            end_time,
            is_active: true,
        };
        let _guard = self.mentor_locks.acquire(actor.id).await;
        let existing = self.schedule.slots_for(actor.id).await?;
        if existing
            .iter()
            .any(|s| s.is_active && s.overlaps(&candidate))
        {
            return Err(Error::Validation(
                "overlaps an existing availability slot".to_string(),
            ));
        }
        self.schedule.insert_slot(candidate).await
    }

    pub async fn set_slot_active(
        &self,
        actor: &Actor,
        slot_id: SlotId,
        is_active: bool,
    ) -> Result<AvailabilitySlot> {
        let mut slot = self
            .schedule
            .get_slot(slot_id)
            .await?
            .ok_or(Error::NotFound("availability slot"))?;
        if !actor.is_mentor() || slot.mentor_id != actor.id {
            return Err(Error::Forbidden(
                "not your availability slot".to_string(),
            ));
        }
        slot.is_active = is_active;
        self.schedule.update_slot(slot.clone()).await?;
        Ok(slot)
    }

    pub async fn remove_availability(&self, actor: &Actor, slot_id: SlotId) -> Result<()> {
        let slot = self
            .schedule
            .get_slot(slot_id)
            .await?
            .ok_or(Error::NotFound("availability slot"))?;
        if !actor.is_mentor() || slot.mentor_id != actor.id {
            return Err(Error::Forbidden(
                "not your availability slot".to_string(),
            ));
        }
        self.schedule.remove_slot(slot_id).await
    }

    /// Blocks one date entirely, regardless of weekly availability.
    pub async fn block_date(
        &self,
        actor: &Actor,
        date: NaiveDate,
        reason: Option<String>,
    ) -> Result<BlockedDate> {
        if !actor.is_mentor() {
            return Err(Error::Forbidden(
                "only mentors can block dates".to_string(),
            ));
        }
        let _guard = self.mentor_locks.acquire(actor.id).await;
        let existing = self.schedule.blocks_for(actor.id).await?;
        if existing.iter().any(|b| b.date == date) {
            return Err(Error::Validation(
                "this date is already blocked".to_string(),
            ));
        }
        self.schedule
            .insert_block(BlockedDate {
                id: 0,
                mentor_id: actor.id,
                date,
                reason,
            })
            .await
    }

    pub async fn unblock_date(&self, actor: &Actor, block_id: BlockId) -> Result<()> {
        let block = self
            .schedule
            .get_block(block_id)
            .await?
            .ok_or(Error::NotFound("blocked date"))?;
        if !actor.is_mentor() || block.mentor_id != actor.id {
            return Err(Error::Forbidden("not your blocked date".to_string()));
        }
        self.schedule.remove_block(block_id).await
    }

    // ---- read side -------------------------------------------------------

    /// Concrete open slots for a mentor over a date range.
    pub async fn open_slots(
        &self,
        mentor_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<OpenSlot>> {
        if self.mentors.hourly_rate(mentor_id).await?.is_none() {
            return Err(Error::NotFound("mentor"));
        }
        let slots = self.schedule.slots_for(mentor_id).await?;
        let blocks = self.schedule.blocks_for(mentor_id).await?;
        let bookings = self
            .bookings
            .for_mentor_between(mentor_id, from, to)
            .await?;
        Ok(schedule::open_slots(&slots, &blocks, &bookings, from, to))
    }

    /// The caller's bookings on their side of the marketplace, most
    /// recent session first.
    pub async fn bookings_for(
        &self,
        actor: &Actor,
        status: Option<BookingStatus>,
    ) -> Result<Vec<Booking>> {
        let mut bookings = self.bookings.for_user(actor.id).await?;
        bookings.retain(|b| match actor.role {
            Role::Mentee => b.mentee_id == actor.id,
            Role::Mentor => b.mentor_id == actor.id,
        });
        if let Some(status) = status {
            bookings.retain(|b| b.status == status);
        }
        bookings.sort_by_key(|b| std::cmp::Reverse(b.session_start()));
        Ok(bookings)
    }

    /// One booking, visible only to its two parties.
    pub async fn booking(&self, actor: &Actor, id: BookingId) -> Result<Booking> {
        let booking = self.load(id).await?;
        if !booking.is_party(actor) {
            return Err(Error::Forbidden(
                "not authorized to view this booking".to_string(),
            ));
        }
        Ok(booking)
    }
}
