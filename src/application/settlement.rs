use super::locks::LockRegistry;
use crate::config::PlatformConfig;
use crate::domain::actor::{Actor, Role};
use crate::domain::booking::{Booking, BookingId, BookingStatus, PaymentStatus};
use crate::domain::payment::{
    self, CommissionPolicy, MentorBalance, PaymentRecord, PaymentRecordStatus, RefundPolicy,
};
use crate::domain::ports::{
    BalanceStoreRef, BookingStoreRef, ClockRef, Notice, NotificationSinkRef, PaymentStoreRef,
    SettleOutcome,
};
use crate::domain::webhook::WebhookEvent;
use crate::error::{Error, Result};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

/// How an incoming webhook event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDisposition {
    /// First application; payment and booking were updated.
    Applied,
    /// Replay of an event or intent already settled.
    AlreadyProcessed,
    /// Event type this layer does not handle.
    Ignored,
}

/// Tracks the payment lifecycle for bookings: commission splits, intent
/// creation, idempotent webhook application, refunds and the
/// consent-gated payout release.
pub struct SettlementTracker {
    payments: PaymentStoreRef,
    bookings: BookingStoreRef,
    balances: BalanceStoreRef,
    notifier: NotificationSinkRef,
    clock: ClockRef,
    commission: CommissionPolicy,
    refunds: RefundPolicy,
    booking_locks: LockRegistry<BookingId>,
}

impl SettlementTracker {
    pub fn new(
        payments: PaymentStoreRef,
        bookings: BookingStoreRef,
        balances: BalanceStoreRef,
        notifier: NotificationSinkRef,
        clock: ClockRef,
        config: &PlatformConfig,
    ) -> Self {
        Self {
            payments,
            bookings,
            balances,
            notifier,
            clock,
            commission: config.commission(),
            refunds: config.refunds(),
            booking_locks: LockRegistry::new(),
        }
    }

    /// Shared with the booking manager so both services serialize on the
    /// same per-booking locks.
    pub(crate) fn booking_locks(&self) -> LockRegistry<BookingId> {
        self.booking_locks.clone()
    }

    /// (platform_fee, mentor_payout) for a session amount.
    pub fn split(&self, amount: Decimal) -> (Decimal, Decimal) {
        self.commission.split(amount)
    }

    /// Opens a pending payment record for a confirmed booking. An
    /// existing pending record is returned as-is rather than duplicated.
    pub async fn create_intent(
        &self,
        actor: &Actor,
        booking_id: BookingId,
    ) -> Result<PaymentRecord> {
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or(Error::NotFound("booking"))?;
        if !(actor.is_mentee() && actor.id == booking.mentee_id) {
            return Err(Error::Forbidden(
                "only the booked mentee can pay for this session".to_string(),
            ));
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(Error::InvalidStateTransition {
                action: "pay",
                status: booking.status.as_str(),
            });
        }
        if booking.payment_status == PaymentStatus::Paid {
            return Err(Error::AlreadyPaid);
        }
        let existing = self.payments.by_booking(booking_id).await?;
        if existing
            .iter()
            .any(|r| r.status == PaymentRecordStatus::Succeeded)
        {
            return Err(Error::AlreadyPaid);
        }
        if let Some(pending) = existing
            .into_iter()
            .find(|r| r.status == PaymentRecordStatus::Pending)
        {
            return Ok(pending);
        }
        let (platform_fee, mentor_payout) = self.commission.split(booking.amount);
        let record = PaymentRecord::pending(
            booking_id,
            booking.amount,
            platform_fee,
            mentor_payout,
            format!("pi_{}", Uuid::new_v4().simple()),
            self.clock.now(),
        );
        self.payments.insert(record).await
    }

    /// Applies a provider webhook event. Replays and unknown event types
    /// are no-ops: this path never fails on a duplicate delivery.
    pub async fn apply_webhook(&self, event: &WebhookEvent) -> Result<WebhookDisposition> {
        if !event.is_payment_succeeded() {
            info!(event_id = %event.id, kind = %event.kind, "ignoring unhandled webhook event type");
            return Ok(WebhookDisposition::Ignored);
        }
        if self.payments.by_event(&event.id).await?.is_some() {
            info!(event_id = %event.id, "webhook event already processed");
            return Ok(WebhookDisposition::AlreadyProcessed);
        }
        let intent = &event.data.object;
        let record = match self.payments.by_intent(&intent.id).await? {
            Some(record) => record,
            None => {
                // Payment initiated out-of-band; synthesize the record
                // from the event itself.
                let booking_id = intent.booking_id().ok_or_else(|| {
                    Error::Validation("webhook event carries no booking id".to_string())
                })?;
                if self.bookings.get(booking_id).await?.is_none() {
                    return Err(Error::NotFound("booking"));
                }
                let amount = intent.amount_major();
                let (platform_fee, mentor_payout) = self.commission.split(amount);
                self.payments
                    .insert(PaymentRecord::pending(
                        booking_id,
                        amount,
                        platform_fee,
                        mentor_payout,
                        intent.id.clone(),
                        self.clock.now(),
                    ))
                    .await?
            }
        };
        if record.status != PaymentRecordStatus::Pending {
            info!(intent_id = %intent.id, "payment intent already settled");
            return Ok(WebhookDisposition::AlreadyProcessed);
        }
        match self
            .payments
            .settle(&intent.id, &event.id, self.clock.now())
            .await?
        {
            SettleOutcome::AlreadySettled(_) => Ok(WebhookDisposition::AlreadyProcessed),
            SettleOutcome::Applied(settled) => {
                self.assert_single_settlement(&settled).await?;
                {
                    let _guard = self.booking_locks.acquire(settled.booking_id).await;
                    let mut booking = self
                        .bookings
                        .get(settled.booking_id)
                        .await?
                        .ok_or(Error::NotFound("booking"))?;
                    booking.payment_status = PaymentStatus::Paid;
                    self.bookings.update(booking.clone()).await?;
                    self.notifier
                        .notify(Notice::PaymentSucceeded {
                            booking: booking.id,
                            mentor: booking.mentor_id,
                        })
                        .await;
                    let mut balance = self
                        .balances
                        .get(booking.mentor_id)
                        .await?
                        .unwrap_or_else(|| MentorBalance::new(booking.mentor_id));
                    balance.credit_pending(settled.mentor_payout);
                    self.balances.put(balance).await?;
                }
                Ok(WebhookDisposition::Applied)
            }
        }
    }

    /// Two succeeded records for one booking means the store is corrupt;
    /// logged and surfaced, never auto-corrected.
    async fn assert_single_settlement(&self, settled: &PaymentRecord) -> Result<()> {
        let succeeded = self
            .payments
            .by_booking(settled.booking_id)
            .await?
            .into_iter()
            .filter(|r| r.status == PaymentRecordStatus::Succeeded)
            .count();
        if succeeded > 1 {
            error!(
                booking_id = settled.booking_id,
                succeeded, "multiple succeeded payments for one booking"
            );
            return Err(Error::Integrity(format!(
                "booking {} has {succeeded} succeeded payments",
                settled.booking_id
            )));
        }
        Ok(())
    }

    /// Discharges the refund obligation for a paid booking directly (the
    /// booking manager calls [`apply_refund`](Self::apply_refund) inside
    /// `cancel` instead).
    pub async fn refund(&self, actor: &Actor, booking_id: BookingId) -> Result<Booking> {
        let _guard = self.booking_locks.acquire(booking_id).await;
        let mut booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or(Error::NotFound("booking"))?;
        self.apply_refund(&mut booking, actor).await?;
        self.bookings.update(booking.clone()).await?;
        Ok(booking)
    }

    /// Refund core, run under the caller's booking lock. Mutates the
    /// passed booking; the caller persists it. Returns the refunded
    /// record, or None when the policy yields nothing back (no-show).
    pub(crate) async fn apply_refund(
        &self,
        booking: &mut Booking,
        actor: &Actor,
    ) -> Result<Option<PaymentRecord>> {
        if booking.payment_status != PaymentStatus::Paid {
            return Err(Error::InvalidStateTransition {
                action: "refund",
                status: booking.payment_status.as_str(),
            });
        }
        if !booking.is_party(actor) {
            return Err(Error::Forbidden(
                "only the mentor or mentee on this booking can refund it".to_string(),
            ));
        }
        let now = self.clock.now();
        // Mentor-initiated cancellations refund in full regardless of
        // notice; the notice window applies to the mentee.
        let fraction = if actor.role == Role::Mentor {
            Decimal::ONE
        } else {
            self.refunds.refund_fraction(now, booking.session_start())
        };
        if fraction.is_zero() {
            warn!(booking_id = booking.id, "cancellation after session start, no refund due");
            return Ok(None);
        }
        let mut record = self
            .payments
            .by_booking(booking.id)
            .await?
            .into_iter()
            .find(|r| r.status == PaymentRecordStatus::Succeeded)
            .ok_or_else(|| {
                Error::Integrity(format!(
                    "booking {} is paid but has no succeeded payment",
                    booking.id
                ))
            })?;
        let refund_amount = payment::round_money(record.amount * fraction);
        record.status = PaymentRecordStatus::Refunded;
        record.refund_amount = Some(refund_amount);
        record.refunded_at = Some(now);
        self.payments.update(record.clone()).await?;

        if let Some(mut balance) = self.balances.get(booking.mentor_id).await? {
            balance.reverse(record.mentor_payout, record.payout_released)?;
            self.balances.put(balance).await?;
        }
        booking.payment_status = PaymentStatus::Refunded;
        self.notifier
            .notify(Notice::PaymentRefunded {
                booking: booking.id,
                amount: refund_amount,
            })
            .await;
        Ok(Some(record))
    }

    /// Consent-gated payout release: moves the mentor payout from pending
    /// to available. Idempotent.
    pub async fn release_payout(&self, booking_id: BookingId) -> Result<()> {
        let records = self.payments.by_booking(booking_id).await?;
        let Some(mut record) = records
            .into_iter()
            .find(|r| r.status == PaymentRecordStatus::Succeeded)
        else {
            // Consent can land before the mentee ever paid; there is
            // simply nothing to release yet.
            info!(booking_id, "consent recorded with no settled payment, nothing to release");
            return Ok(());
        };
        if record.payout_released {
            return Ok(());
        }
        record.payout_released = true;
        self.payments.update(record.clone()).await?;
        let booking = self
            .bookings
            .get(booking_id)
            .await?
            .ok_or(Error::NotFound("booking"))?;
        let mut balance = self
            .balances
            .get(booking.mentor_id)
            .await?
            .ok_or_else(|| {
                Error::Integrity(format!(
                    "mentor {} has a settled payment but no balance",
                    booking.mentor_id
                ))
            })?;
        balance.release(record.mentor_payout)?;
        self.balances.put(balance).await?;
        self.notifier
            .notify(Notice::PayoutReleased {
                booking: booking_id,
                mentor: booking.mentor_id,
                amount: record.mentor_payout,
            })
            .await;
        Ok(())
    }

    /// A mentor's running balance; zeroed for a mentor with no earnings.
    pub async fn balance(&self, actor: &Actor) -> Result<MentorBalance> {
        if !actor.is_mentor() {
            return Err(Error::Forbidden(
                "only mentors have a balance".to_string(),
            ));
        }
        Ok(self
            .balances
            .get(actor.id)
            .await?
            .unwrap_or_else(|| MentorBalance::new(actor.id)))
    }

    /// Payment history for the caller's side of their bookings, newest
    /// first.
    pub async fn payments_for(&self, actor: &Actor) -> Result<Vec<PaymentRecord>> {
        let bookings = self.bookings.for_user(actor.id).await?;
        let mut out = Vec::new();
        for booking in bookings {
            let mine = match actor.role {
                Role::Mentee => booking.mentee_id == actor.id,
                Role::Mentor => booking.mentor_id == actor.id,
            };
            if mine {
                out.extend(self.payments.by_booking(booking.id).await?);
            }
        }
        out.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        Ok(out)
    }
}
