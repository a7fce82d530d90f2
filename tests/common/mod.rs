use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use mentorbook::application::booking::{BookingManager, BookingRequest};
use mentorbook::application::settlement::SettlementTracker;
use mentorbook::config::PlatformConfig;
use mentorbook::domain::actor::Actor;
use mentorbook::domain::payment::Amount;
use mentorbook::domain::ports::{
    BalanceStoreRef, BookingStoreRef, ClockRef, NotificationSinkRef, PaymentStoreRef,
    ScheduleStoreRef,
};
use mentorbook::domain::webhook::{IntentMetadata, PaymentIntent, WebhookData, WebhookEvent};
use mentorbook::infrastructure::clock::FixedClock;
use mentorbook::infrastructure::in_memory::{
    InMemoryBalanceStore, InMemoryBookingStore, InMemoryMentorDirectory, InMemoryPaymentStore,
    InMemoryScheduleStore,
};
use mentorbook::infrastructure::notify::TracingNotifier;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub const MENTOR: u64 = 7;
pub const MENTEE: u64 = 21;
pub const OTHER_MENTEE: u64 = 22;

pub struct Harness {
    pub manager: BookingManager,
    pub settlement: Arc<SettlementTracker>,
    pub directory: Arc<InMemoryMentorDirectory>,
    pub clock: Arc<FixedClock>,
}

pub fn t(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

pub fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

/// Monday, a week before the default session date.
pub fn base_now() -> NaiveDateTime {
    d(2026, 3, 2).and_hms_opt(8, 0, 0).unwrap()
}

/// The Monday the harness mentor is available on, 09:00-17:00.
pub fn session_date() -> NaiveDate {
    d(2026, 3, 9)
}

pub fn request_at(hour: u32, minute: u32) -> BookingRequest {
    BookingRequest {
        mentor_id: MENTOR,
        session_date: session_date(),
        start_time: t(hour, minute),
        duration_minutes: 60,
        mentee_message: None,
    }
}

pub fn succeeded_event(
    event_id: &str,
    intent_id: &str,
    amount_minor: i64,
    booking_id: u64,
) -> WebhookEvent {
    WebhookEvent {
        id: event_id.to_string(),
        kind: "payment_intent.succeeded".to_string(),
        data: WebhookData {
            object: PaymentIntent {
                id: intent_id.to_string(),
                amount: amount_minor,
                currency: Some("gbp".to_string()),
                metadata: IntentMetadata {
                    booking_id: Some(booking_id.to_string()),
                },
            },
        },
    }
}

/// Fresh services over in-memory stores: one mentor at 50/hour,
/// available Mondays 09:00-17:00, clock pinned a week out.
pub async fn harness() -> Harness {
    let bookings: BookingStoreRef = Arc::new(InMemoryBookingStore::new());
    let schedule: ScheduleStoreRef = Arc::new(InMemoryScheduleStore::new());
    let payments: PaymentStoreRef = Arc::new(InMemoryPaymentStore::new());
    let balances: BalanceStoreRef = Arc::new(InMemoryBalanceStore::new());
    let clock = Arc::new(FixedClock::at(base_now()));
    let clock_port: ClockRef = clock.clone();
    let notifier: NotificationSinkRef = Arc::new(TracingNotifier);
    let config = PlatformConfig::default();

    let directory = Arc::new(InMemoryMentorDirectory::new());
    directory
        .set_rate(MENTOR, Amount::new(dec!(50)).unwrap())
        .await;

    let settlement = Arc::new(SettlementTracker::new(
        payments,
        bookings.clone(),
        balances,
        notifier.clone(),
        clock_port.clone(),
        &config,
    ));
    let manager = BookingManager::new(
        bookings,
        schedule,
        directory.clone(),
        settlement.clone(),
        notifier,
        clock_port,
        config,
    );

    let harness = Harness {
        manager,
        settlement,
        directory,
        clock,
    };
    harness
        .manager
        .add_availability(&Actor::mentor(MENTOR), Weekday::Mon, t(9, 0), t(17, 0))
        .await
        .unwrap();
    harness
}
