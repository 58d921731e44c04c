//! Time provider abstraction
//!
//! Separates clock access from change recording so tests can pin timestamps.

use chrono::{DateTime, Local, TimeZone};

/// Timestamp format used in change log rows
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Source of local wall-clock time
pub trait TimeProvider: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;

    /// Current time rendered as `YYYY-MM-DD HH:MM:SS`
    fn timestamp(&self) -> String {
        self.now().format(TIMESTAMP_FORMAT).to_string()
    }
}

/// System clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Fixed time provider for deterministic tests
#[derive(Clone, Copy, Debug)]
pub struct FixedTimeProvider {
    at: DateTime<Local>,
}

impl FixedTimeProvider {
    pub fn new(at: DateTime<Local>) -> Self {
        Self { at }
    }

    /// Build from calendar fields; `None` if the local time does not exist
    pub fn at(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Option<Self> {
        Local
            .with_ymd_and_hms(year, month, day, hour, min, sec)
            .earliest()
            .map(Self::new)
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> DateTime<Local> {
        self.at
    }
}
