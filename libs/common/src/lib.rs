//! Shared service plumbing
//!
//! Provides the pieces every bridge binary needs at startup:
//! - logging initialization (console and daily rolling file)
//! - startup banner and service metadata
//! - graceful shutdown signal handling

pub mod bootstrap_args;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

pub use bootstrap_args::ServiceArgs;
pub use service_bootstrap::ServiceInfo;
pub use shutdown::{shutdown_token, wait_for_shutdown};

// Re-export common dependencies
pub use anyhow;
pub use tokio;
