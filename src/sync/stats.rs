use chrono::{DateTime, Local};
use std::fmt;

/// Timestamp layout used in run summaries and status replies.
pub const TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Counters for one ingest run.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub added_or_updated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub start: DateTime<Local>,
    pub end: Option<DateTime<Local>>,
    pub cancelled_by_operator: bool,
}

impl RunStatistics {
    pub fn start_now() -> Self {
        RunStatistics {
            added_or_updated: 0,
            skipped: 0,
            errors: 0,
            start: Local::now(),
            end: None,
            cancelled_by_operator: false,
        }
    }

    /// Accounts for one successful upsert. `rows_affected` is 0 when the
    /// stored row already matched.
    pub fn record_upsert(&mut self, rows_affected: u64) {
        let changed = rows_affected.min(1);
        self.added_or_updated += changed;
        self.skipped += 1 - changed;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn finish(&mut self) {
        self.end = Some(Local::now());
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.end.unwrap_or_else(Local::now) - self.start
    }

    /// Text served to status queries while the run is going.
    pub fn in_progress_report(&self) -> String {
        format!(
            "{}\nIn progress\n{}",
            Local::now().format(TIME_FORMAT),
            self
        )
    }

    /// Text served once every record has been read and only maintenance
    /// is left. The counts no longer change.
    pub fn finishing_report(&self) -> String {
        format!(
            "{}\nFinishing (maintenance)\n{}",
            Local::now().format(TIME_FORMAT),
            self
        )
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = match &self.end {
            Some(end) => end.format(TIME_FORMAT).to_string(),
            None => "-".to_string(),
        };
        writeln!(f, "\tStart:     {}", self.start.format(TIME_FORMAT))?;
        writeln!(f, "\tEnd:       {}", end)?;
        writeln!(f, "\tCancelled: {}", self.cancelled_by_operator)?;
        writeln!(f, "\tAdded:     {}", self.added_or_updated)?;
        writeln!(f, "\tSkipped:   {}", self.skipped)?;
        write!(f, "\tErrors:    {}", self.errors)
    }
}
