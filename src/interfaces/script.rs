use crate::application::booking::BookingRequest;
use crate::domain::actor::Actor;
use crate::domain::booking::BookingId;
use crate::domain::webhook::WebhookEvent;
use crate::error::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};

/// One line of a replay script.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    /// Seeds the mentor directory stand-in with an hourly rate.
    RegisterMentor {
        mentor_id: u64,
        hourly_rate: rust_decimal::Decimal,
    },
    /// Moves the replay clock.
    AdvanceClock { to: NaiveDateTime },
    AddAvailability {
        actor: Actor,
        day_of_week: Weekday,
        start_time: NaiveTime,
        end_time: NaiveTime,
    },
    BlockDate {
        actor: Actor,
        date: NaiveDate,
        reason: Option<String>,
    },
    CreateBooking {
        actor: Actor,
        #[serde(flatten)]
        request: BookingRequest,
    },
    Confirm {
        actor: Actor,
        booking_id: BookingId,
    },
    Cancel {
        actor: Actor,
        booking_id: BookingId,
        reason: Option<String>,
    },
    Complete {
        actor: Actor,
        booking_id: BookingId,
    },
    SetMeetingLink {
        actor: Actor,
        booking_id: BookingId,
        url: String,
    },
    SubmitSummary {
        actor: Actor,
        booking_id: BookingId,
        summary: String,
    },
    Consent {
        actor: Actor,
        booking_id: BookingId,
        consent: bool,
        note: Option<String>,
    },
    CreateIntent {
        actor: Actor,
        booking_id: BookingId,
    },
    Webhook { event: WebhookEvent },
    Refund {
        actor: Actor,
        booking_id: BookingId,
    },
}

/// Streams ops from a JSON-lines script.
///
/// Wraps any `Read` source and yields one `Result<ScriptOp>` per line,
/// so large scripts replay without loading everything up front.
pub struct ScriptReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> ScriptReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: BufReader::new(source),
        }
    }

    /// Lazily parses ops line by line. Blank lines and `#` comments are
    /// skipped; a malformed line yields an error without stopping the
    /// stream.
    pub fn ops(self) -> impl Iterator<Item = Result<ScriptOp>> {
        self.reader.lines().filter_map(|line| match line {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    None
                } else {
                    Some(
                        serde_json::from_str(line)
                            .map_err(|e| Error::Validation(format!("bad script line: {e}"))),
                    )
                }
            }
            Err(e) => Some(Err(Error::Io(e))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::Role;

    #[test]
    fn test_reader_valid_stream() {
        let data = concat!(
            "{\"op\": \"register_mentor\", \"mentor_id\": 7, \"hourly_rate\": \"50\"}\n",
            "# seed done\n",
            "\n",
            "{\"op\": \"confirm\", \"actor\": {\"id\": 7, \"role\": \"mentor\"}, \"booking_id\": 1}\n",
        );
        let ops: Vec<Result<ScriptOp>> = ScriptReader::new(data.as_bytes()).ops().collect();

        assert_eq!(ops.len(), 2);
        assert!(matches!(
            ops[0].as_ref().unwrap(),
            ScriptOp::RegisterMentor { mentor_id: 7, .. }
        ));
        let ScriptOp::Confirm { actor, booking_id } = ops[1].as_ref().unwrap() else {
            panic!("expected confirm op");
        };
        assert_eq!(actor.role, Role::Mentor);
        assert_eq!(*booking_id, 1);
    }

    #[test]
    fn test_reader_flattened_booking_request() {
        let line = "{\"op\": \"create_booking\", \
            \"actor\": {\"id\": 21, \"role\": \"mentee\"}, \
            \"mentor_id\": 7, \"session_date\": \"2026-03-09\", \
            \"start_time\": \"10:00:00\", \"duration_minutes\": 60}";
        let op: ScriptOp = serde_json::from_str(line).unwrap();
        let ScriptOp::CreateBooking { request, .. } = op else {
            panic!("expected create_booking op");
        };
        assert_eq!(request.mentor_id, 7);
        assert_eq!(request.duration_minutes, 60);
        assert_eq!(request.mentee_message, None);
    }

    #[test]
    fn test_reader_malformed_line() {
        let data = "{\"op\": \"confirm\", \"actor\": 12}\n";
        let ops: Vec<Result<ScriptOp>> = ScriptReader::new(data.as_bytes()).ops().collect();
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], Err(Error::Validation(_))));
    }
}
