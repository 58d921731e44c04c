//! In-process region provider
//!
//! Simulates an external region inside the bridge process. Regions can be
//! attached and detached at runtime, which makes fallback behaviour easy to
//! drive from tests. Also used as the `memory` backend for running the
//! bridge without a simulator.

use crate::error::{RegionError, Result};
use crate::traits::{Access, RegionHandle, RegionProvider};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type Cell = Arc<Mutex<Vec<u8>>>;

/// In-memory region provider; clones share the same regions
#[derive(Clone, Default)]
pub struct MemoryRegionProvider {
    regions: Arc<Mutex<HashMap<String, Cell>>>,
}

impl MemoryRegionProvider {
    /// Create a provider with no regions attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with one zero-filled region already attached
    pub fn with_region(name: &str, size: usize) -> Self {
        let provider = Self::new();
        provider.attach(name, vec![0u8; size]);
        provider
    }

    /// Publish a region (replaces any previous content)
    pub fn attach(&self, name: &str, content: Vec<u8>) {
        self.regions
            .lock()
            .insert(name.to_string(), Arc::new(Mutex::new(content)));
    }

    /// Remove a region; later acquisitions fail as unavailable
    pub fn detach(&self, name: &str) -> Option<Vec<u8>> {
        self.regions
            .lock()
            .remove(name)
            .map(|cell| cell.lock().clone())
    }

    /// Current content of a region, as the external side would see it
    pub fn peek(&self, name: &str) -> Option<Vec<u8>> {
        self.regions.lock().get(name).map(|cell| cell.lock().clone())
    }

    /// Write into a region from the external side
    pub fn poke(&self, name: &str, offset: usize, data: &[u8]) -> bool {
        match self.regions.lock().get(name) {
            Some(cell) => {
                let mut buf = cell.lock();
                match offset.checked_add(data.len()) {
                    Some(end) if end <= buf.len() => {
                        buf[offset..end].copy_from_slice(data);
                        true
                    },
                    _ => false,
                }
            },
            None => false,
        }
    }
}

/// Handle onto an attached in-memory region
pub struct MemoryHandle {
    cell: Cell,
    size: usize,
    access: Access,
}

impl RegionHandle for MemoryHandle {
    fn read(&self) -> Vec<u8> {
        self.cell.lock()[..self.size].to_vec()
    }

    fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if self.access != Access::ReadWrite {
            return Err(RegionError::Other(anyhow::anyhow!(
                "region acquired read-only"
            )));
        }
        let end = offset.saturating_add(data.len());
        if end > self.size {
            return Err(RegionError::OutOfRange {
                offset,
                end,
                size: self.size,
            });
        }
        self.cell.lock()[offset..end].copy_from_slice(data);
        Ok(())
    }
}

impl RegionProvider for MemoryRegionProvider {
    type Handle = MemoryHandle;

    fn acquire(&self, name: &str, size: usize, access: Access) -> Result<Self::Handle> {
        let cell = self
            .regions
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| RegionError::Unavailable {
                name: name.to_string(),
                reason: "not attached".to_string(),
            })?;

        let len = cell.lock().len();
        if len < size {
            return Err(RegionError::Unavailable {
                name: name.to_string(),
                reason: format!("truncated: {} bytes, expected {}", len, size),
            });
        }

        Ok(MemoryHandle { cell, size, access })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_detached_region_is_unavailable() {
        let provider = MemoryRegionProvider::new();
        assert!(provider.acquire("io", 4, Access::Read).is_err());

        provider.attach("io", vec![0; 4]);
        assert!(provider.acquire("io", 4, Access::Read).is_ok());

        assert_eq!(provider.detach("io"), Some(vec![0; 4]));
        assert!(provider.acquire("io", 4, Access::Read).is_err());
    }

    #[test]
    fn test_clones_share_regions() {
        let provider = MemoryRegionProvider::with_region("io", 4);
        let external = provider.clone();
        assert!(external.poke("io", 0, &[0x01]));

        let handle = provider.acquire("io", 4, Access::Read).unwrap();
        assert_eq!(handle.read(), vec![0x01, 0, 0, 0]);
    }

    #[test]
    fn test_write_through_handle() {
        let provider = MemoryRegionProvider::with_region("io", 4);
        let mut handle = provider.acquire("io", 4, Access::ReadWrite).unwrap();
        handle.write_at(2, &[0x03, 0x00]).unwrap();
        assert_eq!(provider.peek("io").unwrap(), vec![0, 0, 0x03, 0]);
        assert!(handle.write_at(3, &[1, 1]).is_err());
        assert!(matches!(
            handle.write_at(usize::MAX, &[1]),
            Err(RegionError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_truncated_region() {
        let provider = MemoryRegionProvider::new();
        provider.attach("io", vec![0; 2]);
        assert!(provider.acquire("io", 4, Access::Read).is_err());
    }
}
