//! Startup arguments shared by bridge binaries
//!
//! Each binary defines its own clap `Args` and converts into this structure.

use tracing::Level;

/// Common service startup arguments
#[derive(Debug, Clone)]
pub struct ServiceArgs {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Optional bind address override (e.g., 127.0.0.1:5020)
    pub bind_address: Option<String>,
    /// Disable colored output
    pub no_color: bool,
    /// Only validate configuration without starting service
    pub validate: bool,
}

impl Default for ServiceArgs {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bind_address: None,
            no_color: false,
            validate: false,
        }
    }
}

impl ServiceArgs {
    /// Parse log level string to tracing::Level
    pub fn parse_log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}
