//! Shared-memory I/O bridge (`shmbridge`)
//!
//! Mirrors a PLC process image into Modbus coils and pushes manual control
//! coils back into the image.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use errors::BridgeResult;
use shm_rtdb::{
    CoilDatastore, CoilStore, MemoryRegionProvider, MmapRegionProvider, RegionProvider,
    SharedRegionGateway,
};
use shmbridge::{
    bootstrap::{self, Args},
    ChangeLog, CoilServer, Config, RegionBackend, SyncEngine,
};

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> BridgeResult<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind_address) = &args.bind_address {
        config.modbus.bind_address = bind_address.clone();
    }

    let service_args = args.service_args(&config);
    let service_info = bootstrap::service_info();
    bootstrap::initialize_logging(&service_args, &service_info, &config)?;
    if !args.no_color {
        common::service_bootstrap::print_startup_banner(&service_info);
    }

    config.validate()?;
    bootstrap::log_layout(&config);

    // Validation mode: validate and exit
    if args.validate {
        info!("Validation completed successfully");
        return Ok(());
    }

    match config.region.backend {
        RegionBackend::Mmap => {
            let provider = MmapRegionProvider::new(&config.region.dir);
            run(config, provider).await
        },
        RegionBackend::Memory => {
            let provider = MemoryRegionProvider::with_region(&config.region.name, config.region.size);
            run(config, provider).await
        },
    }
}

async fn run<P: RegionProvider>(config: Config, provider: P) -> BridgeResult<()> {
    info!("Region provider: {}", provider.describe());

    let gateway = Arc::new(SharedRegionGateway::new(provider, config.region_layout()));
    let store = Arc::new(CoilStore::new(config.coils.size));
    let change_log = config
        .change_log
        .enabled
        .then(|| ChangeLog::new(&config.change_log.path));

    let engine = Arc::new(SyncEngine::new(
        gateway,
        Arc::clone(&store),
        config.coil_map(),
        change_log,
        config.poll_interval(),
    ));

    let token = common::shutdown_token();

    let server = if config.modbus.enabled {
        let (_, handle) = CoilServer::new(Arc::clone(&store))
            .with_unit_id(config.modbus.unit_id)
            .start(&config.modbus.bind_address, token.clone())
            .await?;
        Some(handle)
    } else {
        info!("Modbus server disabled");
        None
    };

    let tasks = engine.spawn(token.clone());
    let status_task = start_status_task(Arc::clone(&engine), token.clone());
    info!("Bridge running");

    token.cancelled().await;
    info!("Stopping bridge");

    tasks.join().await;
    for handle in server.into_iter().chain(Some(status_task)) {
        if let Err(e) = handle.await {
            error!("Task ended abnormally: {}", e);
        }
    }

    let status = engine.status();
    info!(
        "Bridge stopped: fallback={}, region→store cycles={}, store→region cycles={}, failed={}",
        status.fallback, status.cycles_a, status.cycles_b, status.failed_cycles
    );
    Ok(())
}

/// Periodically log engine health until cancelled
fn start_status_task<P: RegionProvider, S: CoilDatastore>(
    engine: Arc<SyncEngine<P, S>>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATUS_INTERVAL);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let status = engine.status();
                    info!(
                        "Sync status: fallback={}, cycles A={}, B={}, failed={}",
                        status.fallback, status.cycles_a, status.cycles_b, status.failed_cycles
                    );
                }
                () = token.cancelled() => break,
            }
        }

        debug!("Status task terminated");
    })
}
