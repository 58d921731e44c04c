//! Bidirectional region ↔ coil synchronization
//!
//! Two periodic tasks share one gateway and one coil store:
//!
//! - **region→store**: decode the input and output zones into the inputs and
//!   outputs mirrors, then record output transitions in the change log
//! - **store→region**: encode the manual control coils into the output zone
//!
//! Each task runs one full cycle, then sleeps for the poll interval. A failed
//! cycle is logged and the task carries on; cancellation is only observed
//! while sleeping, never in the middle of a cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use errors::{BridgeError, BridgeErrorTrait, BridgeResult};
use parking_lot::Mutex;
use serde::Serialize;
use shm_rtdb::{
    bits_to_bytes, bytes_to_bits, CoilDatastore, CoilError, CoilMap, RegionProvider,
    SharedRegionGateway, Zone,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};

use crate::change_log::ChangeLog;

/// Point-in-time health snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Gateway is serving the local buffer
    pub fallback: bool,
    /// Completed region→store cycles
    pub cycles_a: u64,
    /// Completed store→region cycles
    pub cycles_b: u64,
    /// Cycles that ended in an error, both tasks
    pub failed_cycles: u64,
}

#[derive(Default)]
struct SyncCounters {
    cycles_a: AtomicU64,
    cycles_b: AtomicU64,
    failed: AtomicU64,
}

/// Moves data between the shared region and the coil store on two periodic tasks
pub struct SyncEngine<P: RegionProvider, S: CoilDatastore> {
    gateway: Arc<SharedRegionGateway<P>>,
    store: Arc<S>,
    coil_map: CoilMap,
    change_log: Option<Mutex<ChangeLog>>,
    poll_interval: Duration,
    counters: SyncCounters,
}

impl<P: RegionProvider, S: CoilDatastore> SyncEngine<P, S> {
    pub fn new(
        gateway: Arc<SharedRegionGateway<P>>,
        store: Arc<S>,
        coil_map: CoilMap,
        change_log: Option<ChangeLog>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            gateway,
            store,
            coil_map,
            change_log: change_log.map(Mutex::new),
            poll_interval,
            counters: SyncCounters::default(),
        }
    }

    pub fn gateway(&self) -> &Arc<SharedRegionGateway<P>> {
        &self.gateway
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            fallback: self.gateway.is_fallback(),
            cycles_a: self.counters.cycles_a.load(Ordering::Relaxed),
            cycles_b: self.counters.cycles_b.load(Ordering::Relaxed),
            failed_cycles: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// One region→store cycle.
    ///
    /// Inputs mirror is written before outputs mirror, and both before the
    /// change log is consulted.
    pub fn region_to_store_cycle(&self) -> BridgeResult<()> {
        let data = self.gateway.read_region();
        let layout = self.gateway.layout();

        let inputs = bytes_to_bits(zone_bytes(&data, &layout.input_zone)?);
        let outputs = bytes_to_bits(zone_bytes(&data, &layout.output_zone)?);

        self.store
            .set_range(self.coil_map.inputs_mirror.start, &inputs)?;
        self.store
            .set_range(self.coil_map.outputs_mirror.start, &outputs)?;

        if let Some(change_log) = &self.change_log {
            change_log.lock().record_if_changed(&outputs)?;
        }
        Ok(())
    }

    /// One store→region cycle.
    ///
    /// Returns whether the live region took the write. An unavailable store
    /// reads as all coils off.
    pub fn store_to_region_cycle(&self) -> BridgeResult<bool> {
        let manual = self.coil_map.manual_control;
        let bits = match self.store.get_range(manual.start, manual.count) {
            Ok(bits) => bits,
            Err(CoilError::Unavailable(reason)) => {
                debug!("Coil store unavailable, treating manual coils as off: {}", reason);
                vec![false; manual.count]
            },
            Err(e) => return Err(e.into()),
        };

        let zone = self.gateway.layout().output_zone;
        let bytes = bits_to_bytes(&bits, zone.length);
        Ok(self.gateway.write_region(zone.offset, &bytes)?)
    }

    /// Spawn both tasks; they stop once `token` is cancelled
    pub fn spawn(self: &Arc<Self>, token: CancellationToken) -> SyncTasks {
        info!(
            "Sync engine starting: interval {:?}, region '{}'",
            self.poll_interval,
            self.gateway.layout().name
        );

        let engine = Arc::clone(self);
        let region_to_store = tokio::spawn(run_periodic(
            "region→store",
            self.poll_interval,
            token.clone(),
            move || {
                let result = engine.region_to_store_cycle();
                engine.count(&engine.counters.cycles_a, &result);
                result
            },
        ));

        let engine = Arc::clone(self);
        let store_to_region = tokio::spawn(run_periodic(
            "store→region",
            self.poll_interval,
            token,
            move || {
                let result = engine.store_to_region_cycle().map(|_| ());
                engine.count(&engine.counters.cycles_b, &result);
                result
            },
        ));

        SyncTasks {
            region_to_store,
            store_to_region,
        }
    }

    fn count(&self, completed: &AtomicU64, result: &BridgeResult<()>) {
        if result.is_ok() {
            completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn zone_bytes<'a>(data: &'a [u8], zone: &Zone) -> BridgeResult<&'a [u8]> {
    data.get(zone.range())
        .ok_or_else(|| BridgeError::range("region zone", zone.offset, zone.end(), data.len()))
}

/// Handles of the two sync tasks
pub struct SyncTasks {
    pub region_to_store: JoinHandle<()>,
    pub store_to_region: JoinHandle<()>,
}

impl SyncTasks {
    /// Wait for both tasks to finish
    pub async fn join(self) {
        for (name, handle) in [
            ("region→store", self.region_to_store),
            ("store→region", self.store_to_region),
        ] {
            if let Err(e) = handle.await {
                error!("Sync task {} ended abnormally: {}", name, e);
            }
        }
    }
}

async fn run_periodic<F>(name: &'static str, interval: Duration, token: CancellationToken, mut cycle: F)
where
    F: FnMut() -> BridgeResult<()> + Send + 'static,
{
    debug!("Sync task {} started", name);

    loop {
        if let Err(e) = cycle() {
            log_cycle_error(name, &e);
        }

        tokio::select! {
            biased;
            () = token.cancelled() => break,
            () = tokio::time::sleep(interval) => {},
        }
    }

    info!("Sync task {} stopped", name);
}

fn log_cycle_error(task: &str, err: &BridgeError) {
    let outlook = if err.is_retryable() {
        "will retry next cycle"
    } else {
        "will not recover without a config change"
    };
    let code = err.error_code();
    match err.log_level() {
        Level::ERROR => error!("Sync task {} cycle failed [{}]: {} ({})", task, code, err, outlook),
        Level::WARN => warn!("Sync task {} cycle failed [{}]: {} ({})", task, code, err, outlook),
        _ => debug!("Sync task {} cycle failed [{}]: {} ({})", task, code, err, outlook),
    }
}
