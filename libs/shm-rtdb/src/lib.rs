//! Shared I/O Region Access and Coil Datastore
//!
//! Bridges a process-external byte region (a PLC or simulator I/O image)
//! with a bit-addressable coil space.
//!
//! # Key Components
//!
//! - **bitcodec**: LSB-first conversion between bytes and coil vectors
//! - **SharedRegionGateway**: whole-region read and offset write with local fallback
//! - **CoilStore**: coil address space with per-call range atomicity
//! - **RegionProvider**: mmap-backed or in-process region acquisition

pub mod bitcodec;

pub mod coil_store;

pub mod error;

pub mod gateway;

pub mod layout;

pub mod memory_impl;

pub mod mmap_impl;

pub mod time;

pub mod traits;

// Re-exports
pub use bitcodec::{bits_to_bytes, bytes_to_bits, BitVector};
pub use coil_store::CoilStore;
pub use error::{CoilError, RegionError};
pub use gateway::SharedRegionGateway;
pub use layout::{CoilMap, CoilZone, RegionLayout, Zone};
pub use memory_impl::MemoryRegionProvider;
pub use mmap_impl::{default_shm_dir, MmapRegionProvider};
pub use time::{FixedTimeProvider, SystemTimeProvider, TimeProvider};
pub use traits::{Access, CoilDatastore, RegionHandle, RegionProvider};
