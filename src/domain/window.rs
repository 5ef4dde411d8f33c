// Query window domain model
use chrono::{Duration, NaiveDateTime};
use std::fmt;

/// Wire format used by the readings endpoint for `start` / `end`.
pub const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A `[start, end]` pair bounding one readings query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// The `days` long window ending at `now`, or `None` when the start
    /// falls outside the representable date range.
    pub fn trailing_days(days: u32, now: NaiveDateTime) -> Option<Self> {
        let span = Duration::try_days(i64::from(days))?;
        let start = now.checked_sub_signed(span)?;
        Some(Self::new(start, now))
    }

    pub fn start_param(&self) -> String {
        self.start.format(WINDOW_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(WINDOW_FORMAT).to_string()
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ {}", self.start_param(), self.end_param())
    }
}
