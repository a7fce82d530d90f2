use clap::Parser;
use mentorbook::application::booking::BookingManager;
use mentorbook::application::settlement::SettlementTracker;
use mentorbook::config::PlatformConfig;
use mentorbook::domain::payment::Amount;
use mentorbook::domain::ports::{
    BalanceStoreRef, BookingStoreRef, ClockRef, NotificationSinkRef, PaymentStoreRef,
    ScheduleStoreRef,
};
use mentorbook::error::Result as OpResult;
use mentorbook::infrastructure::clock::FixedClock;
use mentorbook::infrastructure::in_memory::{
    InMemoryBalanceStore, InMemoryBookingStore, InMemoryMentorDirectory, InMemoryPaymentStore,
    InMemoryScheduleStore,
};
use mentorbook::infrastructure::notify::TracingNotifier;
use mentorbook::interfaces::report::{ReportWriter, StateReport};
use mentorbook::interfaces::script::{ScriptOp, ScriptReader};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Replay script (JSON lines, one op per line)
    script: PathBuf,

    /// Optional platform config (JSON); defaults apply otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

struct Stores {
    bookings: BookingStoreRef,
    schedule: ScheduleStoreRef,
    payments: PaymentStoreRef,
    balances: BalanceStoreRef,
}

fn in_memory_stores() -> Stores {
    Stores {
        bookings: Arc::new(InMemoryBookingStore::new()),
        schedule: Arc::new(InMemoryScheduleStore::new()),
        payments: Arc::new(InMemoryPaymentStore::new()),
        balances: Arc::new(InMemoryBalanceStore::new()),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_stores(cli: &Cli) -> Result<Stores> {
    use mentorbook::infrastructure::rocksdb::RocksStore;

    match &cli.db_path {
        Some(db_path) => {
            let store = RocksStore::open(db_path).into_diagnostic()?;
            Ok(Stores {
                bookings: Arc::new(store.clone()),
                schedule: Arc::new(store.clone()),
                payments: Arc::new(store.clone()),
                balances: Arc::new(store),
            })
        }
        None => Ok(in_memory_stores()),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_stores(_cli: &Cli) -> Result<Stores> {
    Ok(in_memory_stores())
}

async fn apply(
    manager: &BookingManager,
    settlement: &SettlementTracker,
    directory: &InMemoryMentorDirectory,
    clock: &FixedClock,
    op: ScriptOp,
) -> OpResult<()> {
    match op {
        ScriptOp::RegisterMentor {
            mentor_id,
            hourly_rate,
        } => {
            directory.set_rate(mentor_id, Amount::new(hourly_rate)?).await;
        }
        ScriptOp::AdvanceClock { to } => clock.set(to),
        ScriptOp::AddAvailability {
            actor,
            day_of_week,
            start_time,
            end_time,
        } => {
            manager
                .add_availability(&actor, day_of_week, start_time, end_time)
                .await?;
        }
        ScriptOp::BlockDate { actor, date, reason } => {
            manager.block_date(&actor, date, reason).await?;
        }
        ScriptOp::CreateBooking { actor, request } => {
            manager.create(&actor, request).await?;
        }
        ScriptOp::Confirm { actor, booking_id } => {
            manager.confirm(&actor, booking_id).await?;
        }
        ScriptOp::Cancel {
            actor,
            booking_id,
            reason,
        } => {
            manager.cancel(&actor, booking_id, reason).await?;
        }
        ScriptOp::Complete { actor, booking_id } => {
            manager.complete(&actor, booking_id).await?;
        }
        ScriptOp::SetMeetingLink {
            actor,
            booking_id,
            url,
        } => {
            manager.set_meeting_link(&actor, booking_id, &url).await?;
        }
        ScriptOp::SubmitSummary {
            actor,
            booking_id,
            summary,
        } => {
            manager.submit_summary(&actor, booking_id, &summary).await?;
        }
        ScriptOp::Consent {
            actor,
            booking_id,
            consent,
            note,
        } => {
            manager
                .mentee_consent(&actor, booking_id, consent, note)
                .await?;
        }
        ScriptOp::CreateIntent { actor, booking_id } => {
            settlement.create_intent(&actor, booking_id).await?;
        }
        ScriptOp::Webhook { event } => {
            settlement.apply_webhook(&event).await?;
        }
        ScriptOp::Refund { actor, booking_id } => {
            settlement.refund(&actor, booking_id).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config: PlatformConfig = match &cli.config {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            serde_json::from_reader(file).into_diagnostic()?
        }
        None => PlatformConfig::default(),
    };

    let stores = open_stores(&cli)?;
    let clock = Arc::new(FixedClock::at(
        chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
            .expect("valid epoch date")
            .and_hms_opt(0, 0, 0)
            .expect("valid epoch time"),
    ));
    let clock_port: ClockRef = clock.clone();
    let notifier: NotificationSinkRef = Arc::new(TracingNotifier);
    let directory = Arc::new(InMemoryMentorDirectory::new());

    let settlement = Arc::new(SettlementTracker::new(
        stores.payments.clone(),
        stores.bookings.clone(),
        stores.balances.clone(),
        notifier.clone(),
        clock_port.clone(),
        &config,
    ));
    let manager = BookingManager::new(
        stores.bookings.clone(),
        stores.schedule.clone(),
        directory.clone(),
        settlement.clone(),
        notifier,
        clock_port,
        config,
    );

    let file = File::open(&cli.script).into_diagnostic()?;
    let reader = ScriptReader::new(file);
    for op in reader.ops() {
        match op {
            Ok(op) => {
                if let Err(e) = apply(&manager, &settlement, &directory, &clock, op).await {
                    eprintln!("Error applying op: {e}");
                }
            }
            Err(e) => {
                eprintln!("Error reading op: {e}");
            }
        }
    }

    let report = StateReport {
        bookings: stores.bookings.all().await.into_diagnostic()?,
        payments: stores.payments.all().await.into_diagnostic()?,
        balances: stores.balances.all().await.into_diagnostic()?,
    };
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_report(&report).into_diagnostic()?;

    Ok(())
}
