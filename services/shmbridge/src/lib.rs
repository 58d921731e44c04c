//! Shared-memory I/O to Modbus coil bridge
//!
//! Mirrors a PLC process image into a coil datastore and pushes manual
//! control coils back into the image, while a Modbus TCP server exposes the
//! coils to supervisory clients.

pub mod bootstrap;
pub mod change_log;
pub mod config;
pub mod modbus;
pub mod sync;

pub use change_log::ChangeLog;
pub use config::{Config, RegionBackend};
pub use modbus::CoilServer;
pub use sync::{SyncEngine, SyncStatus, SyncTasks};
