//! Output transition log
//!
//! Appends one CSV row per observed change of the outputs mirror:
//!
//! ```text
//! timestamp,Q0,Q1,...,Q15
//! 2024-03-07 09:05:01,1,0,...,0
//! ```
//!
//! The header is written only when the file is empty. A row whose append
//! fails does not advance the last recorded value, so the same change is
//! retried on the next cycle.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use errors::{BridgeError, BridgeResult};
use shm_rtdb::bitcodec::bits_as_ints;
use shm_rtdb::{BitVector, SystemTimeProvider, TimeProvider};
use tracing::debug;

/// Append-only CSV record of outputs-mirror transitions
pub struct ChangeLog {
    path: PathBuf,
    clock: Box<dyn TimeProvider>,
    last_recorded: Option<BitVector>,
}

impl ChangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, SystemTimeProvider)
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: impl TimeProvider) -> Self {
        Self {
            path: path.into(),
            clock: Box::new(clock),
            last_recorded: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_recorded(&self) -> Option<&[bool]> {
        self.last_recorded.as_deref()
    }

    /// Append `current` if it differs from the last recorded vector.
    ///
    /// Returns whether a row was written.
    pub fn record_if_changed(&mut self, current: &[bool]) -> BridgeResult<bool> {
        if self.last_recorded.as_deref() == Some(current) {
            return Ok(false);
        }

        self.append(current)?;
        self.last_recorded = Some(current.to_vec());
        debug!("Output change recorded: {:?}", bits_as_ints(current));
        Ok(true)
    }

    fn append(&self, current: &[bool]) -> BridgeResult<()> {
        let log_err = |e: &dyn std::fmt::Display| {
            BridgeError::LogWrite(format!("{}: {}", self.path.display(), e))
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| log_err(&e))?;
        let is_empty = file.metadata().map_err(|e| log_err(&e))?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_empty {
            let mut header = Vec::with_capacity(current.len() + 1);
            header.push("timestamp".to_string());
            header.extend((0..current.len()).map(|i| format!("Q{}", i)));
            writer.write_record(&header).map_err(|e| log_err(&e))?;
        }

        let mut row = Vec::with_capacity(current.len() + 1);
        row.push(self.clock.timestamp());
        row.extend(bits_as_ints(current).iter().map(u8::to_string));
        writer.write_record(&row).map_err(|e| log_err(&e))?;
        writer.flush().map_err(|e| log_err(&e))?;

        Ok(())
    }
}
