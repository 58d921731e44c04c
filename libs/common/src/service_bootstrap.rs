//! Service bootstrap utilities
//!
//! Startup banner and logging initialization shared by bridge binaries.

use crate::bootstrap_args::ServiceArgs;
use crate::logging::{self, LogConfig};
use tracing::info;

/// Service metadata for startup
pub struct ServiceInfo {
    /// Service name (e.g., "shmbridge")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
    /// Default protocol port
    pub default_port: u16,
}

impl ServiceInfo {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        default_port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            default_port,
        }
    }
}

/// Print startup banner
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = r#"
 ███████╗██╗  ██╗███╗   ███╗██████╗ ██████╗ ██╗██████╗  ██████╗ ███████╗
 ██╔════╝██║  ██║████╗ ████║██╔══██╗██╔══██╗██║██╔══██╗██╔════╝ ██╔════╝
 ███████╗███████║██╔████╔██║██████╔╝██████╔╝██║██║  ██║██║  ███╗█████╗
 ╚════██║██╔══██║██║╚██╔╝██║██╔══██╗██╔══██╗██║██║  ██║██║   ██║██╔══╝
 ███████║██║  ██║██║ ╚═╝ ██║██████╔╝██║  ██║██║██████╔╝╚██████╔╝███████╗
 ╚══════╝╚═╝  ╚═╝╚═╝     ╚═╝╚═════╝ ╚═╝  ╚═╝╚═╝╚═════╝  ╚═════╝ ╚══════╝
    "#;

    info!("{}", banner);
    info!("");
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!(" Default Port: {}", service.default_port);
    info!("");
}

/// Initialize logging for a service
///
/// Log root directory priority:
/// 1. `SHMBRIDGE_LOG_DIR` environment variable
/// 2. `config_dir` from the service configuration
/// 3. Default "logs"
///
/// Files land in `<root>/<service name>/`.
pub fn init_logging(
    args: &ServiceArgs,
    service: &ServiceInfo,
    config_dir: Option<&str>,
) -> anyhow::Result<()> {
    logging::init_log_root(config_dir);

    let log_config = LogConfig {
        service_name: service.name.clone(),
        log_dir: logging::get_log_root().join(&service.name),
        console_level: args.parse_log_level(),
        enable_json: false,
        ansi: !args.no_color,
    };

    logging::init_with_config(log_config)
}
