//! Unified error handling for the shared-memory coil bridge
//!
//! Library crates keep their own narrow error enums (`RegionError`, `CoilError`);
//! the service layer folds them into [`BridgeError`], which carries the
//! fault taxonomy used for logging and cycle-level recovery decisions.

use thiserror::Error;

// ============================================================================
// BridgeError - Main error type
// ============================================================================

/// Main error type for the bridge service
#[derive(Debug, Error)]
pub enum BridgeError {
    // ======================================
    // Region & Datastore Errors
    // ======================================
    /// The external region could not be opened or mapped
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// An offset/length fell outside a region or coil space
    #[error("Out of range: {what}: [{start}, {end}) exceeds {limit}")]
    Range {
        what: String,
        start: usize,
        end: usize,
        limit: usize,
    },

    /// A coil range operation failed for a reason other than bounds
    #[error("Store access error: {0}")]
    StoreAccess(String),

    /// Appending to the change log failed
    #[error("Log write error: {0}")]
    LogWrite(String),

    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // Protocol & I/O Errors
    // ======================================
    #[error("Protocol error: {protocol}: {message}")]
    Protocol { protocol: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using BridgeError
pub type BridgeResult<T> = Result<T, BridgeError>;

impl BridgeError {
    /// Build a range error from a `[start, end)` span and its limit
    pub fn range(what: impl Into<String>, start: usize, end: usize, limit: usize) -> Self {
        Self::Range {
            what: what.into(),
            start,
            end,
            limit,
        }
    }

    /// Fatal errors abort the call that raised them and point at a
    /// programming or configuration fault; everything else degrades.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Range
        )
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::BridgeError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::BridgeError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! protocol_error {
    ($protocol:expr, $msg:expr) => {
        $crate::BridgeError::Protocol {
            protocol: $protocol.to_string(),
            message: $msg.to_string(),
        }
    };
}

// ============================================================================
// Error classification
// ============================================================================

/// Error category enum - used for classification and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Range,
    /// Degraded operation (fallback buffer, unreachable datastore)
    Degraded,
    Storage,
    Protocol,
    Io,
    Unknown,
}

/// Error capability trait shared by the bridge error types
pub trait BridgeErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs and health output)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Whether the next cycle may succeed where this one failed
    fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Degraded | ErrorCategory::Storage | ErrorCategory::Io
        )
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Range => Level::ERROR,
            ErrorCategory::Degraded => Level::DEBUG,
            _ => Level::WARN,
        }
    }
}

impl BridgeErrorTrait for BridgeError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ResourceUnavailable(_) => "RESOURCE_UNAVAILABLE",
            Self::Range { .. } => "RANGE_ERROR",
            Self::StoreAccess(_) => "STORE_ACCESS_ERROR",
            Self::LogWrite(_) => "LOG_WRITE_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Protocol { .. } => "PROTOCOL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Other(_) => "OTHER_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } => ErrorCategory::Configuration,
            Self::Range { .. } => ErrorCategory::Range,
            Self::ResourceUnavailable(_) => ErrorCategory::Degraded,
            Self::StoreAccess(_) | Self::LogWrite(_) => ErrorCategory::Storage,
            Self::Protocol { .. } => ErrorCategory::Protocol,
            Self::Io(_) => ErrorCategory::Io,
            Self::Other(_) => ErrorCategory::Unknown,
        }
    }
}
