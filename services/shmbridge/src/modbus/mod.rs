//! Coil-only Modbus TCP server
//!
//! Supports Read Coils (0x01), Write Single Coil (0x05) and Write Multiple
//! Coils (0x0F). Everything else is answered with an illegal function
//! exception.

pub mod pdu;
pub mod server;

pub use pdu::{CoilRequest, ExceptionCode, MbapHeader};
pub use server::CoilServer;
