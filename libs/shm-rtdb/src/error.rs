//! Error types for shm-rtdb

use errors::BridgeError;
use thiserror::Error;

/// Errors raised by the shared region layer
#[derive(Error, Debug)]
pub enum RegionError {
    /// Region absent, access denied, or shorter than the configured size
    #[error("Region '{name}' unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    /// Write span outside the region
    #[error("Region write [{offset}, {end}) exceeds region size {size}")]
    OutOfRange {
        offset: usize,
        end: usize,
        size: usize,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors raised by coil datastore range operations
#[derive(Error, Debug)]
pub enum CoilError {
    /// Range outside the coil address space
    #[error("Coil range [{start}, {end}) exceeds address space of {size}")]
    OutOfRange {
        start: usize,
        end: usize,
        size: usize,
    },

    /// Datastore cannot serve the request right now
    #[error("Coil store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, RegionError>;

impl From<RegionError> for BridgeError {
    fn from(err: RegionError) -> Self {
        match err {
            RegionError::Unavailable { .. } => BridgeError::ResourceUnavailable(err.to_string()),
            RegionError::OutOfRange { offset, end, size } => {
                BridgeError::range("region", offset, end, size)
            },
            RegionError::Other(e) => BridgeError::Other(e),
        }
    }
}

impl From<CoilError> for BridgeError {
    fn from(err: CoilError) -> Self {
        match err {
            CoilError::OutOfRange { start, end, size } => {
                BridgeError::range("coils", start, end, size)
            },
            CoilError::Unavailable(msg) => BridgeError::StoreAccess(msg),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display() {
        let err = RegionError::Unavailable {
            name: "CADE_IO_MAP".to_string(),
            reason: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "Region 'CADE_IO_MAP' unavailable: not found");
    }

    #[test]
    fn test_region_error_folds_into_bridge_error() {
        let err: BridgeError = RegionError::OutOfRange {
            offset: 255,
            end: 257,
            size: 256,
        }
        .into();
        assert!(err.is_fatal());

        let err: BridgeError = RegionError::Unavailable {
            name: "x".to_string(),
            reason: "gone".to_string(),
        }
        .into();
        assert!(matches!(err, BridgeError::ResourceUnavailable(_)));
    }

    #[test]
    fn test_coil_error_folds_into_bridge_error() {
        let err: BridgeError = CoilError::Unavailable("server not ready".to_string()).into();
        assert!(matches!(err, BridgeError::StoreAccess(_)));
        assert!(!err.is_fatal());

        let err: BridgeError = CoilError::OutOfRange {
            start: 190,
            end: 206,
            size: 200,
        }
        .into();
        assert!(err.is_fatal());
    }
}
