//! Service configuration
//!
//! Layered with figment: built-in defaults, then an optional YAML file, then
//! `SHMBRIDGE_` environment variables (nested keys separated by `__`, e.g.
//! `SHMBRIDGE_SYNC__POLL_INTERVAL_SECS=0.5`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use errors::{config_error, BridgeError, BridgeResult};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use shm_rtdb::layout::{DEFAULT_REGION_NAME, DEFAULT_REGION_SIZE, MIN_COIL_COUNT};
use shm_rtdb::{default_shm_dir, CoilMap, RegionLayout, Zone};

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_PATH: &str = "config/shmbridge.yaml";
/// Environment variable prefix
pub const ENV_PREFIX: &str = "SHMBRIDGE_";
/// Default Modbus TCP port
pub const DEFAULT_PORT: u16 = 5020;

/// Where the region bytes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionBackend {
    /// tmpfs file published by the external simulator
    Mmap,
    /// In-process region, for running without a simulator
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub name: String,
    pub dir: PathBuf,
    pub size: usize,
    pub input_zone: Zone,
    pub output_zone: Zone,
    pub backend: RegionBackend,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_REGION_NAME.to_string(),
            dir: default_shm_dir(),
            size: DEFAULT_REGION_SIZE,
            input_zone: Zone::new(0, 2),
            output_zone: Zone::new(2, 2),
            backend: RegionBackend::Mmap,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoilConfig {
    pub size: usize,
    pub inputs_start: usize,
    pub outputs_start: usize,
    pub manual_start: usize,
}

impl Default for CoilConfig {
    fn default() -> Self {
        Self {
            size: MIN_COIL_COUNT,
            inputs_start: 0,
            outputs_start: 16,
            manual_start: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Delay between cycles of each sync task, in seconds
    pub poll_interval_secs: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeLogConfig {
    pub enabled: bool,
    pub path: PathBuf,
}

impl Default for ChangeLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("registro_datos.csv"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    pub enabled: bool,
    pub bind_address: String,
    /// Only answer this unit id; any unit id when unset
    pub unit_id: Option<u8>,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: format!("0.0.0.0:{}", DEFAULT_PORT),
            unit_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log root directory (overridden by `SHMBRIDGE_LOG_DIR`)
    pub dir: Option<String>,
    /// Log level used when none is given on the command line
    pub level: Option<String>,
}

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub region: RegionConfig,
    pub coils: CoilConfig,
    pub sync: SyncConfig,
    pub change_log: ChangeLogConfig,
    pub modbus: ModbusConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> BridgeResult<Self> {
        let file = match path {
            Some(path) if !path.exists() => {
                return Err(config_error!(
                    "config file not found: {}",
                    path.display()
                ));
            },
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        };

        Self::figment(&file)
            .extract()
            .map_err(|e| config_error!("Failed to load configuration: {}", e))
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn region_layout(&self) -> RegionLayout {
        RegionLayout {
            name: self.region.name.clone(),
            size: self.region.size,
            input_zone: self.region.input_zone,
            output_zone: self.region.output_zone,
        }
    }

    pub fn coil_map(&self) -> CoilMap {
        CoilMap::for_layout(
            &self.region_layout(),
            self.coils.size,
            self.coils.inputs_start,
            self.coils.outputs_start,
            self.coils.manual_start,
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.sync.poll_interval_secs)
            .unwrap_or_else(|_| Duration::from_millis(100))
    }

    /// Check layouts, interval and addresses; any failure aborts startup
    pub fn validate(&self) -> BridgeResult<()> {
        self.region_layout().validate()?;
        self.coil_map().validate()?;

        let interval = self.sync.poll_interval_secs;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(BridgeError::InvalidConfig {
                field: "sync.poll_interval_secs".to_string(),
                reason: format!("must be a positive number of seconds, got {}", interval),
            });
        }

        if self.modbus.enabled && self.modbus.bind_address.parse::<std::net::SocketAddr>().is_err()
        {
            return Err(BridgeError::InvalidConfig {
                field: "modbus.bind_address".to_string(),
                reason: format!("'{}' is not a socket address", self.modbus.bind_address),
            });
        }

        if self.change_log.enabled && self.change_log.path.as_os_str().is_empty() {
            return Err(config_error!("change_log.path cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.region.name, "CADE_IO_MAP");
        assert_eq!(config.region.size, 256);
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.modbus.bind_address, "0.0.0.0:5020");
        assert_eq!(config.coil_map().manual_control.start, 32);
        assert_eq!(config.coil_map().manual_control.count, 16);
    }

    #[test]
    fn test_yaml_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "bridge.yaml",
                r#"
region:
  name: TEST_IO
  backend: memory
  output_zone: { offset: 4, length: 2 }
sync:
  poll_interval_secs: 0.25
modbus:
  unit_id: 1
"#,
            )?;
            jail.set_env("SHMBRIDGE_SYNC__POLL_INTERVAL_SECS", "0.5");
            jail.set_env("SHMBRIDGE_COILS__MANUAL_START", "64");

            let config = Config::load(Some(Path::new("bridge.yaml"))).unwrap();
            assert_eq!(config.region.name, "TEST_IO");
            assert_eq!(config.region.backend, RegionBackend::Memory);
            assert_eq!(config.region.output_zone, Zone::new(4, 2));
            assert_eq!(config.region.input_zone, Zone::new(0, 2));
            assert_eq!(config.poll_interval(), Duration::from_millis(500));
            assert_eq!(config.coils.manual_start, 64);
            assert_eq!(config.modbus.unit_id, Some(1));
            config.validate().unwrap();
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/shmbridge.yaml"))).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_default_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();
            assert_eq!(config.coils.size, 200);
            Ok(())
        });
    }

    #[test]
    fn test_rejects_bad_interval() {
        let mut config = Config::default();
        config.sync.poll_interval_secs = 0.0;
        assert!(config.validate().is_err());
        config.sync.poll_interval_secs = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_manual_overlapping_mirror() {
        let mut config = Config::default();
        config.coils.manual_start = 20;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_rejects_bad_bind_address() {
        let mut config = Config::default();
        config.modbus.bind_address = "not-an-address".to_string();
        assert!(config.validate().is_err());

        config.modbus.enabled = false;
        config.validate().unwrap();
    }
}
