//! Command-line arguments and startup helpers

use std::path::PathBuf;

use clap::Parser;
use common::service_bootstrap::{self, ServiceInfo};
use common::ServiceArgs;
use errors::{BridgeError, BridgeResult};
use shm_rtdb::CoilMap;
use tracing::info;

use crate::config::{Config, DEFAULT_PORT};

/// Command-line arguments for shmbridge
#[derive(Parser, Debug, Clone)]
#[command(
    name = "shmbridge",
    version = env!("CARGO_PKG_VERSION"),
    about = "Shared-memory I/O to Modbus coil bridge",
    long_about = None
)]
pub struct Args {
    /// Configuration file (YAML)
    #[arg(short = 'c', long, env = "SHMBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Bind address for the Modbus TCP server
    #[arg(short = 'b', long)]
    pub bind_address: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Validation mode - only validate configuration without starting service
    #[arg(long)]
    pub validate: bool,
}

impl Args {
    /// Merge with the config file's logging section; command line wins
    pub fn service_args(&self, config: &Config) -> ServiceArgs {
        ServiceArgs {
            log_level: self
                .log_level
                .clone()
                .or_else(|| config.logging.level.clone())
                .unwrap_or_else(|| "info".to_string()),
            bind_address: self.bind_address.clone(),
            no_color: self.no_color,
            validate: self.validate,
        }
    }
}

pub fn service_info() -> ServiceInfo {
    ServiceInfo::new(
        "shmbridge",
        env!("CARGO_PKG_VERSION"),
        "Shared-memory I/O to Modbus coil bridge",
        DEFAULT_PORT,
    )
}

/// Initialize logging from the merged arguments
pub fn initialize_logging(
    args: &ServiceArgs,
    service: &ServiceInfo,
    config: &Config,
) -> BridgeResult<()> {
    service_bootstrap::init_logging(args, service, config.logging.dir.as_deref())
        .map_err(|e| BridgeError::Configuration(format!("Failed to init logging: {}", e)))
}

/// Log the effective region layout and coil map
pub fn log_layout(config: &Config) {
    let layout = config.region_layout();
    let coils: CoilMap = config.coil_map();

    info!(
        "Region '{}' ({:?} backend, {} bytes) in {}",
        layout.name,
        config.region.backend,
        layout.size,
        config.region.dir.display()
    );
    info!(
        "  input zone [{}, {})  output zone [{}, {})",
        layout.input_zone.offset,
        layout.input_zone.end(),
        layout.output_zone.offset,
        layout.output_zone.end()
    );
    info!(
        "Coil space: {} coils; inputs [{}, {})  outputs [{}, {})  manual [{}, {})",
        coils.size,
        coils.inputs_mirror.start,
        coils.inputs_mirror.end(),
        coils.outputs_mirror.start,
        coils.outputs_mirror.end(),
        coils.manual_control.start,
        coils.manual_control.end()
    );
    info!(
        "Poll interval {:?}; change log {}",
        config.poll_interval(),
        if config.change_log.enabled {
            config.change_log.path.display().to_string()
        } else {
            "disabled".to_string()
        }
    );
}
