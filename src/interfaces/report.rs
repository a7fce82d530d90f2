use crate::domain::booking::Booking;
use crate::domain::payment::{MentorBalance, PaymentRecord};
use crate::error::{Error, Result};
use serde::Serialize;
use std::io::Write;

/// Final state emitted at the end of a replay.
#[derive(Debug, Serialize)]
pub struct StateReport {
    pub bookings: Vec<Booking>,
    pub payments: Vec<PaymentRecord>,
    pub balances: Vec<MentorBalance>,
}

/// Writes the report as pretty-printed JSON.
pub struct ReportWriter<W: Write> {
    out: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_report(&mut self, report: &StateReport) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, report)
            .map_err(|e| Error::Storage(format!("report serialization error: {e}")))?;
        writeln!(self.out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_report_shape() {
        let report = StateReport {
            bookings: Vec::new(),
            payments: Vec::new(),
            balances: Vec::new(),
        };
        let mut buffer = Vec::new();
        ReportWriter::new(&mut buffer).write_report(&report).unwrap();

        let rendered = String::from_utf8(buffer).unwrap();
        assert!(rendered.contains("\"bookings\""));
        assert!(rendered.contains("\"balances\""));
    }
}
