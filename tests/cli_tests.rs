use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn script(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

#[test]
fn test_replay_books_and_confirms() {
    let file = script(&[
        r#"{"op": "register_mentor", "mentor_id": 7, "hourly_rate": "50"}"#,
        r#"{"op": "add_availability", "actor": {"id": 7, "role": "mentor"}, "day_of_week": "Mon", "start_time": "09:00:00", "end_time": "17:00:00"}"#,
        r#"{"op": "advance_clock", "to": "2026-03-02T08:00:00"}"#,
        r#"{"op": "create_booking", "actor": {"id": 21, "role": "mentee"}, "mentor_id": 7, "session_date": "2026-03-09", "start_time": "10:00:00", "duration_minutes": 60}"#,
        r#"{"op": "confirm", "actor": {"id": 7, "role": "mentor"}, "booking_id": 1}"#,
    ]);

    let mut cmd = Command::new(cargo_bin!("mentorbook"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"confirmed\""))
        .stdout(predicate::str::contains("\"amount\": \"50.00\""));
}

#[test]
fn test_replay_settles_payment_through_webhook() {
    let file = script(&[
        r#"{"op": "register_mentor", "mentor_id": 7, "hourly_rate": "50"}"#,
        r#"{"op": "add_availability", "actor": {"id": 7, "role": "mentor"}, "day_of_week": "Mon", "start_time": "09:00:00", "end_time": "17:00:00"}"#,
        r#"{"op": "advance_clock", "to": "2026-03-02T08:00:00"}"#,
        r#"{"op": "create_booking", "actor": {"id": 21, "role": "mentee"}, "mentor_id": 7, "session_date": "2026-03-09", "start_time": "10:00:00", "duration_minutes": 60}"#,
        r#"{"op": "confirm", "actor": {"id": 7, "role": "mentor"}, "booking_id": 1}"#,
        r#"{"op": "webhook", "event": {"id": "evt_1", "type": "payment_intent.succeeded", "data": {"object": {"id": "pi_1", "amount": 5000, "currency": "gbp", "metadata": {"booking_id": "1"}}}}}"#,
        r#"{"op": "webhook", "event": {"id": "evt_1", "type": "payment_intent.succeeded", "data": {"object": {"id": "pi_1", "amount": 5000, "currency": "gbp", "metadata": {"booking_id": "1"}}}}}"#,
    ]);

    let mut cmd = Command::new(cargo_bin!("mentorbook"));
    cmd.arg(file.path());

    // Replayed webhook must not double-credit: one payment record, one
    // pending payout of 45.00.
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"payment_status\": \"paid\""))
        .stdout(predicate::str::contains("\"pending_balance\": \"45.00\""))
        .stdout(predicate::str::contains("\"total_earned\": \"45.00\""));
}

#[test]
fn test_replay_reports_bad_lines_and_keeps_going() {
    let file = script(&[
        r#"{"op": "register_mentor", "mentor_id": 7, "hourly_rate": "50"}"#,
        r#"not json at all"#,
        r#"{"op": "confirm", "actor": {"id": 7, "role": "mentor"}, "booking_id": 99}"#,
        r#"{"op": "add_availability", "actor": {"id": 7, "role": "mentor"}, "day_of_week": "Mon", "start_time": "09:00:00", "end_time": "17:00:00"}"#,
        r#"{"op": "advance_clock", "to": "2026-03-02T08:00:00"}"#,
        r#"{"op": "create_booking", "actor": {"id": 21, "role": "mentee"}, "mentor_id": 7, "session_date": "2026-03-09", "start_time": "10:00:00", "duration_minutes": 60}"#,
    ]);

    let mut cmd = Command::new(cargo_bin!("mentorbook"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading op"))
        .stderr(predicate::str::contains("Error applying op"))
        .stdout(predicate::str::contains("\"status\": \"requested\""));
}
