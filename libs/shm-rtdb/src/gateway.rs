//! Shared region gateway with local fallback
//!
//! Every operation acquires the region for the duration of one call. When
//! acquisition fails the gateway switches to a process-local buffer of the
//! same size, so readers keep seeing a consistent image built from the
//! bridge's own writes instead of stale live data.

use crate::error::{RegionError, Result};
use crate::layout::RegionLayout;
use crate::traits::{Access, RegionHandle, RegionProvider};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Region access with an in-process fallback image when the region is unreachable
pub struct SharedRegionGateway<P: RegionProvider> {
    provider: P,
    layout: RegionLayout,
    fallback_buffer: Mutex<Vec<u8>>,
    fallback: AtomicBool,
}

impl<P: RegionProvider> SharedRegionGateway<P> {
    /// Create a gateway; the fallback buffer starts all zero
    pub fn new(provider: P, layout: RegionLayout) -> Self {
        let fallback_buffer = Mutex::new(vec![0u8; layout.size]);
        Self {
            provider,
            layout,
            fallback_buffer,
            fallback: AtomicBool::new(false),
        }
    }

    pub fn layout(&self) -> &RegionLayout {
        &self.layout
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// True while operating on the local buffer instead of the live region
    pub fn is_fallback(&self) -> bool {
        self.fallback.load(Ordering::Acquire)
    }

    /// Read the whole region, or the fallback buffer if the region is unreachable.
    ///
    /// Never fails; always returns `layout.size` bytes.
    pub fn read_region(&self) -> Vec<u8> {
        match self.live_read() {
            Ok(data) => {
                self.leave_fallback();
                data
            },
            Err(e) => {
                self.enter_fallback(&e);
                self.fallback_buffer.lock().clone()
            },
        }
    }

    /// Write `data` at `offset`.
    ///
    /// Returns `Ok(true)` when the live region took the write and `Ok(false)`
    /// when it was applied to the fallback buffer only. A span past the end
    /// of the region is rejected before anything is touched.
    pub fn write_region(&self, offset: usize, data: &[u8]) -> Result<bool> {
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= self.layout.size)
            .ok_or(RegionError::OutOfRange {
                offset,
                end: offset.saturating_add(data.len()),
                size: self.layout.size,
            })?;

        match self.live_write(offset, data) {
            Ok(()) => {
                self.leave_fallback();
                Ok(true)
            },
            Err(e) => {
                self.enter_fallback(&e);
                self.fallback_buffer.lock()[offset..end].copy_from_slice(data);
                Ok(false)
            },
        }
    }

    fn live_read(&self) -> Result<Vec<u8>> {
        let handle = self
            .provider
            .acquire(&self.layout.name, self.layout.size, Access::Read)?;
        Ok(handle.read())
    }

    fn live_write(&self, offset: usize, data: &[u8]) -> Result<()> {
        let mut handle =
            self.provider
                .acquire(&self.layout.name, self.layout.size, Access::ReadWrite)?;
        handle.write_at(offset, data)
    }

    fn enter_fallback(&self, cause: &RegionError) {
        if !self.fallback.swap(true, Ordering::AcqRel) {
            warn!(
                "Region '{}' unreachable, using local buffer: {}",
                self.layout.name, cause
            );
        }
    }

    fn leave_fallback(&self) {
        if self.fallback.swap(false, Ordering::AcqRel) {
            info!("Region '{}' reachable again", self.layout.name);
        }
    }
}
