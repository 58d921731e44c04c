//! Trait definitions for region and coil access

use crate::bitcodec::BitVector;
use crate::error::{CoilError, Result};

/// Requested mapping access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    ReadWrite,
}

/// Scoped access to an acquired region.
///
/// Dropping the handle releases the underlying mapping, so every exit path
/// (including early returns on error) gives the region back.
pub trait RegionHandle {
    /// Copy out the full region content
    fn read(&self) -> Vec<u8>;

    /// Write `data` at `offset`
    fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()>;
}

/// Source of external region handles
///
/// Implementations:
/// - `MmapRegionProvider`: tmpfs-backed file mapped with memmap2
/// - `MemoryRegionProvider`: in-process region for tests and simulation
pub trait RegionProvider: Send + Sync + 'static {
    type Handle: RegionHandle;

    /// Open and map `size` bytes of the region called `name`
    fn acquire(&self, name: &str, size: usize, access: Access) -> Result<Self::Handle>;

    /// Short description for startup logs
    fn describe(&self) -> String;
}

/// Bit-addressable coil datastore
///
/// Each call is serialized against every other call on the same store;
/// sequences of calls are not.
pub trait CoilDatastore: Send + Sync + 'static {
    /// Total number of coils
    fn size(&self) -> usize;

    /// Read `count` coils starting at `start`
    fn get_range(&self, start: usize, count: usize) -> std::result::Result<BitVector, CoilError>;

    /// Write `values` starting at `start`
    fn set_range(&self, start: usize, values: &[bool]) -> std::result::Result<(), CoilError>;
}
