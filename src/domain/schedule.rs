use super::actor::UserId;
use super::booking::Booking;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

pub type SlotId = u64;
pub type BlockId = u64;

/// One recurring weekly window in a mentor's calendar. Not itself
/// bookable: it is resolved against blocked dates and held bookings to
/// produce concrete open slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: SlotId,
    pub mentor_id: UserId,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
}

impl AvailabilitySlot {
    /// Whether this slot admits the whole window on the given date.
    pub fn covers(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        self.is_active
            && date.weekday() == self.day_of_week
            && self.start_time <= start
            && end <= self.end_time
    }

    pub fn overlaps(&self, other: &AvailabilitySlot) -> bool {
        self.day_of_week == other.day_of_week
            && windows_overlap(
                self.start_time,
                self.end_time,
                other.start_time,
                other.end_time,
            )
    }
}

/// A single date removed from a mentor's calendar (holiday, leave).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedDate {
    pub id: BlockId,
    pub mentor_id: UserId,
    pub date: NaiveDate,
    pub reason: Option<String>,
}

/// A concrete bookable window on a specific date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: u32,
}

/// Half-open interval overlap on one day.
pub fn windows_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Resolves weekly availability against blocked dates and held bookings
/// into the concrete open slots between `from` and `to`, inclusive.
/// Cancelled and completed bookings do not occupy their window.
pub fn open_slots(
    slots: &[AvailabilitySlot],
    blocked: &[BlockedDate],
    bookings: &[Booking],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<OpenSlot> {
    let mut open = Vec::new();
    let mut date = from;
    while date <= to {
        if blocked.iter().any(|b| b.date == date) {
            date += Duration::days(1);
            continue;
        }
        for slot in slots
            .iter()
            .filter(|s| s.is_active && s.day_of_week == date.weekday())
        {
            let taken = bookings.iter().any(|b| {
                b.blocks_slot()
                    && b.session_date == date
                    && windows_overlap(
                        b.start_time,
                        b.end_time,
                        slot.start_time,
                        slot.end_time,
                    )
            });
            if !taken {
                let minutes = (slot.end_time - slot.start_time).num_minutes();
                open.push(OpenSlot {
                    date,
                    start_time: slot.start_time,
                    end_time: slot.end_time,
                    duration_minutes: minutes as u32,
                });
            }
        }
        date += Duration::days(1);
    }
    open
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::Actor;
    use rust_decimal_macros::dec;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday() -> NaiveDate {
        // 2026-03-09 is a Monday.
        NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
    }

    fn slot(start: NaiveTime, end: NaiveTime) -> AvailabilitySlot {
        AvailabilitySlot {
            id: 1,
            mentor_id: 7,
            day_of_week: Weekday::Mon,
            start_time: start,
            end_time: end,
            is_active: true,
        }
    }

    fn held_booking(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Booking {
        Booking::request(
            21,
            7,
            date,
            start,
            end,
            60,
            dec!(50),
            None,
            monday().and_hms_opt(0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_windows_overlap() {
        assert!(windows_overlap(t(10, 0), t(11, 0), t(10, 30), t(11, 30)));
        assert!(windows_overlap(t(10, 0), t(12, 0), t(10, 30), t(11, 0)));
        // Touching endpoints do not overlap.
        assert!(!windows_overlap(t(10, 0), t(11, 0), t(11, 0), t(12, 0)));
        assert!(!windows_overlap(t(10, 0), t(11, 0), t(12, 0), t(13, 0)));
    }

    #[test]
    fn test_covers() {
        let s = slot(t(9, 0), t(17, 0));
        assert!(s.covers(monday(), t(10, 0), t(11, 0)));
        assert!(s.covers(monday(), t(9, 0), t(17, 0)));
        assert!(!s.covers(monday(), t(8, 0), t(9, 30)));
        assert!(!s.covers(monday().succ_opt().unwrap(), t(10, 0), t(11, 0)));

        let mut inactive = s.clone();
        inactive.is_active = false;
        assert!(!inactive.covers(monday(), t(10, 0), t(11, 0)));
    }

    #[test]
    fn test_open_slots_skips_blocked_dates() {
        let slots = vec![slot(t(9, 0), t(10, 0))];
        let blocked = vec![BlockedDate {
            id: 1,
            mentor_id: 7,
            date: monday(),
            reason: Some("holiday".to_string()),
        }];
        let open = open_slots(&slots, &blocked, &[], monday(), monday());
        assert!(open.is_empty());

        let next_monday = monday() + Duration::days(7);
        let open = open_slots(&slots, &blocked, &[], monday(), next_monday);
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].date, next_monday);
        assert_eq!(open[0].duration_minutes, 60);
    }

    #[test]
    fn test_open_slots_frees_cancelled_windows() {
        let slots = vec![slot(t(9, 0), t(10, 0))];
        let mut booking = held_booking(monday(), t(9, 0), t(10, 0));

        let open = open_slots(&slots, &[], std::slice::from_ref(&booking), monday(), monday());
        assert!(open.is_empty());

        booking
            .cancel(&Actor::mentee(21), None, monday().and_hms_opt(0, 0, 0).unwrap())
            .unwrap();
        let open = open_slots(&slots, &[], &[booking], monday(), monday());
        assert_eq!(open.len(), 1);
    }
}
