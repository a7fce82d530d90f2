use super::actor::{Actor, UserId};
use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type BookingId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Requested,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled bookings never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
        }
    }
}

/// A mentoring session booked by a mentee with a mentor.
///
/// Status and payment status are independent axes. The transition methods
/// below are the only legal way to move between statuses; they validate
/// the acting party and the current state, and stamp the matching
/// timestamp. Bookings are never deleted; terminal states are kept for
/// history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub mentee_id: UserId,
    pub mentor_id: UserId,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: u32,
    pub status: BookingStatus,
    pub amount: Decimal,
    pub payment_status: PaymentStatus,
    pub mentee_message: Option<String>,
    pub meeting_link: Option<String>,
    pub session_summary: Option<String>,
    pub mentee_consent: Option<bool>,
    pub mentee_consent_note: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub confirmed_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub summary_submitted_at: Option<NaiveDateTime>,
    pub consent_recorded_at: Option<NaiveDateTime>,
}

impl Booking {
    /// A freshly requested booking. The store assigns the id on insert.
    #[allow(clippy::too_many_arguments)]
    pub fn request(
        mentee_id: UserId,
        mentor_id: UserId,
        session_date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        duration_minutes: u32,
        amount: Decimal,
        mentee_message: Option<String>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: 0,
            mentee_id,
            mentor_id,
            session_date,
            start_time,
            end_time,
            duration_minutes,
            status: BookingStatus::Requested,
            amount,
            payment_status: PaymentStatus::Pending,
            mentee_message,
            meeting_link: None,
            session_summary: None,
            mentee_consent: None,
            mentee_consent_note: None,
            cancellation_reason: None,
            created_at: now,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            summary_submitted_at: None,
            consent_recorded_at: None,
        }
    }

    pub fn session_start(&self) -> NaiveDateTime {
        self.session_date.and_time(self.start_time)
    }

    pub fn session_end(&self) -> NaiveDateTime {
        self.session_date.and_time(self.end_time)
    }

    /// Requested and confirmed bookings hold their window; cancelled and
    /// completed ones do not block re-booking.
    pub fn blocks_slot(&self) -> bool {
        matches!(
            self.status,
            BookingStatus::Requested | BookingStatus::Confirmed
        )
    }

    pub fn is_party(&self, actor: &Actor) -> bool {
        self.assigned_mentor(actor) || self.assigned_mentee(actor)
    }

    fn assigned_mentor(&self, actor: &Actor) -> bool {
        actor.is_mentor() && actor.id == self.mentor_id
    }

    fn assigned_mentee(&self, actor: &Actor) -> bool {
        actor.is_mentee() && actor.id == self.mentee_id
    }

    fn invalid(&self, action: &'static str) -> Error {
        Error::InvalidStateTransition {
            action,
            status: self.status.as_str(),
        }
    }

    pub fn confirm(&mut self, actor: &Actor, now: NaiveDateTime) -> Result<()> {
        if !self.assigned_mentor(actor) {
            return Err(Error::Forbidden(
                "only the assigned mentor can confirm a booking".to_string(),
            ));
        }
        if self.status != BookingStatus::Requested {
            return Err(self.invalid("confirm"));
        }
        self.status = BookingStatus::Confirmed;
        self.confirmed_at = Some(now);
        Ok(())
    }

    /// Either party may cancel a requested or confirmed booking. The
    /// reason is optional but persisted.
    pub fn cancel(
        &mut self,
        actor: &Actor,
        reason: Option<String>,
        now: NaiveDateTime,
    ) -> Result<()> {
        if !self.is_party(actor) {
            return Err(Error::Forbidden(
                "only the mentor or mentee on this booking can cancel it".to_string(),
            ));
        }
        if self.status.is_terminal() {
            return Err(self.invalid("cancel"));
        }
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancellation_reason = reason;
        Ok(())
    }

    /// Only the mentor completes a session, and only once it has started.
    pub fn complete(&mut self, actor: &Actor, now: NaiveDateTime) -> Result<()> {
        if !self.assigned_mentor(actor) {
            return Err(Error::Forbidden(
                "only the assigned mentor can complete a booking".to_string(),
            ));
        }
        if self.status != BookingStatus::Confirmed {
            return Err(self.invalid("complete"));
        }
        if now < self.session_start() {
            return Err(Error::Validation(
                "the session has not started yet".to_string(),
            ));
        }
        self.status = BookingStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Does not change status; valid once the booking is confirmed.
    pub fn set_meeting_link(&mut self, actor: &Actor, url: &str) -> Result<()> {
        if !self.assigned_mentor(actor) {
            return Err(Error::Forbidden(
                "only the assigned mentor can set the meeting link".to_string(),
            ));
        }
        if !matches!(
            self.status,
            BookingStatus::Confirmed | BookingStatus::Completed
        ) {
            return Err(self.invalid("set a meeting link"));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(Error::Validation(
                "meeting link must be an http(s) URL".to_string(),
            ));
        }
        self.meeting_link = Some(url.to_string());
        Ok(())
    }

    /// Submitting a summary always re-opens the consent cycle: any
    /// previously recorded consent and note are cleared.
    pub fn submit_summary(
        &mut self,
        actor: &Actor,
        text: &str,
        now: NaiveDateTime,
    ) -> Result<()> {
        if !self.assigned_mentor(actor) {
            return Err(Error::Forbidden(
                "only the assigned mentor can submit a session summary".to_string(),
            ));
        }
        if !matches!(
            self.status,
            BookingStatus::Confirmed | BookingStatus::Completed
        ) {
            return Err(self.invalid("submit a summary"));
        }
        if text.trim().is_empty() {
            return Err(Error::Validation(
                "session summary cannot be empty".to_string(),
            ));
        }
        self.session_summary = Some(text.to_string());
        self.summary_submitted_at = Some(now);
        self.mentee_consent = None;
        self.mentee_consent_note = None;
        self.consent_recorded_at = None;
        Ok(())
    }

    /// Records the mentee's verdict on the submitted summary. Returns
    /// true when the approval should release the mentor payout; a decline
    /// leaves the payout pending mentor re-engagement.
    pub fn record_consent(
        &mut self,
        actor: &Actor,
        consent: bool,
        note: Option<String>,
        now: NaiveDateTime,
    ) -> Result<bool> {
        if !self.assigned_mentee(actor) {
            return Err(Error::Forbidden(
                "only the booked mentee can respond to a session summary".to_string(),
            ));
        }
        if self.status != BookingStatus::Completed {
            return Err(self.invalid("record consent"));
        }
        if self.session_summary.is_none() {
            return Err(Error::Validation(
                "no session summary to approve".to_string(),
            ));
        }
        if self.mentee_consent.is_some() {
            return Err(Error::Validation(
                "consent has already been recorded for this summary".to_string(),
            ));
        }
        self.mentee_consent = Some(consent);
        self.mentee_consent_note = note;
        self.consent_recorded_at = Some(now);
        Ok(consent)
    }
}

/// Splits bookings into upcoming and past sessions relative to `now`,
/// soonest first and most recent first respectively. A session still in
/// progress counts as upcoming.
pub fn partition_sessions(
    bookings: &[Booking],
    now: NaiveDateTime,
) -> (Vec<Booking>, Vec<Booking>) {
    let (mut upcoming, mut past): (Vec<_>, Vec<_>) = bookings
        .iter()
        .cloned()
        .partition(|b| b.session_end() > now);
    upcoming.sort_by_key(|b| b.session_start());
    past.sort_by_key(|b| std::cmp::Reverse(b.session_start()));
    (upcoming, past)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 9)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn booking() -> Booking {
        let mut b = Booking::request(
            21,
            7,
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            60,
            dec!(50),
            None,
            at(8),
        );
        b.id = 1;
        b
    }

    #[test]
    fn test_confirm_requires_assigned_mentor() {
        let mut b = booking();
        assert!(matches!(
            b.confirm(&Actor::mentor(99), at(8)),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            b.confirm(&Actor::mentee(21), at(8)),
            Err(Error::Forbidden(_))
        ));
        b.confirm(&Actor::mentor(7), at(8)).unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        assert_eq!(b.confirmed_at, Some(at(8)));
    }

    #[test]
    fn test_confirm_twice_fails() {
        let mut b = booking();
        b.confirm(&Actor::mentor(7), at(8)).unwrap();
        assert!(matches!(
            b.confirm(&Actor::mentor(7), at(8)),
            Err(Error::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_either_party_can_cancel() {
        let mut b = booking();
        b.cancel(&Actor::mentee(21), Some("clash".to_string()), at(8))
            .unwrap();
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert_eq!(b.cancellation_reason.as_deref(), Some("clash"));

        let mut b = booking();
        b.confirm(&Actor::mentor(7), at(8)).unwrap();
        b.cancel(&Actor::mentor(7), None, at(9)).unwrap();
        assert_eq!(b.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_cancel_terminal_fails() {
        let mut b = booking();
        b.cancel(&Actor::mentee(21), None, at(8)).unwrap();
        assert!(matches!(
            b.cancel(&Actor::mentee(21), None, at(9)),
            Err(Error::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_complete_requires_confirmed_and_started() {
        let mut b = booking();
        assert!(matches!(
            b.complete(&Actor::mentor(7), at(12)),
            Err(Error::InvalidStateTransition { .. })
        ));
        b.confirm(&Actor::mentor(7), at(8)).unwrap();
        assert!(matches!(
            b.complete(&Actor::mentor(7), at(9)),
            Err(Error::Validation(_))
        ));
        b.complete(&Actor::mentor(7), at(11)).unwrap();
        assert_eq!(b.status, BookingStatus::Completed);
    }

    #[test]
    fn test_meeting_link_requires_url() {
        let mut b = booking();
        b.confirm(&Actor::mentor(7), at(8)).unwrap();
        assert!(matches!(
            b.set_meeting_link(&Actor::mentor(7), "zoom"),
            Err(Error::Validation(_))
        ));
        b.set_meeting_link(&Actor::mentor(7), "https://meet.example/abc")
            .unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_summary_resets_consent() {
        let mut b = booking();
        b.confirm(&Actor::mentor(7), at(8)).unwrap();
        b.complete(&Actor::mentor(7), at(11)).unwrap();
        b.submit_summary(&Actor::mentor(7), "covered ownership", at(11))
            .unwrap();
        let release = b
            .record_consent(&Actor::mentee(21), false, Some("too thin".to_string()), at(12))
            .unwrap();
        assert!(!release);

        b.submit_summary(&Actor::mentor(7), "covered ownership and borrowing", at(13))
            .unwrap();
        assert_eq!(b.mentee_consent, None);
        assert_eq!(b.mentee_consent_note, None);

        let release = b
            .record_consent(&Actor::mentee(21), true, None, at(14))
            .unwrap();
        assert!(release);
    }

    #[test]
    fn test_consent_needs_completed_and_summary() {
        let mut b = booking();
        b.confirm(&Actor::mentor(7), at(8)).unwrap();
        b.submit_summary(&Actor::mentor(7), "notes", at(9)).unwrap();
        assert!(matches!(
            b.record_consent(&Actor::mentee(21), true, None, at(9)),
            Err(Error::InvalidStateTransition { .. })
        ));

        let mut b = booking();
        b.confirm(&Actor::mentor(7), at(8)).unwrap();
        b.complete(&Actor::mentor(7), at(11)).unwrap();
        assert!(matches!(
            b.record_consent(&Actor::mentee(21), true, None, at(11)),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_partition_sessions() {
        let mut past = booking();
        past.session_date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let upcoming = booking();
        let (up, gone) = partition_sessions(&[past.clone(), upcoming.clone()], at(8));
        assert_eq!(up, vec![upcoming]);
        assert_eq!(gone, vec![past]);
    }
}
