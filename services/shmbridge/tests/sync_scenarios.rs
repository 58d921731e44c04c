//! End-to-end sync engine scenarios
//!
//! Region → coils → change log, and coils → region, over an in-process
//! region and a real coil store.

// Allow unwrap() in tests for cleaner test code
#![allow(clippy::disallowed_methods)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use shm_rtdb::{
    CoilDatastore, CoilMap, CoilStore, FixedTimeProvider, MemoryRegionProvider,
    MmapRegionProvider, RegionLayout, RegionProvider, SharedRegionGateway, Zone,
};
use shmbridge::{ChangeLog, SyncEngine};
use tokio_util::sync::CancellationToken;

const REGION: &str = "CADE_IO_MAP";

fn layout() -> RegionLayout {
    RegionLayout {
        name: REGION.to_string(),
        size: 4,
        input_zone: Zone::new(0, 2),
        output_zone: Zone::new(2, 2),
    }
}

fn change_log(path: &Path) -> ChangeLog {
    ChangeLog::with_clock(path, FixedTimeProvider::at(2024, 3, 7, 9, 5, 1).unwrap())
}

fn engine<P: RegionProvider>(
    provider: P,
    change_log: Option<ChangeLog>,
) -> (Arc<SyncEngine<P, CoilStore>>, Arc<CoilStore>) {
    let layout = layout();
    let store = Arc::new(CoilStore::new(200));
    let engine = SyncEngine::new(
        Arc::new(SharedRegionGateway::new(provider, layout.clone())),
        Arc::clone(&store),
        CoilMap::for_layout(&layout, 200, 0, 16, 32),
        change_log,
        Duration::from_millis(10),
    );
    (Arc::new(engine), store)
}

fn data_rows(path: &Path) -> usize {
    std::fs::read_to_string(path)
        .map(|content| content.lines().skip(1).count())
        .unwrap_or(0)
}

// ============================================================================
// Region → store
// ============================================================================

#[test]
fn test_inputs_decoded_into_mirror() {
    let provider = MemoryRegionProvider::new();
    provider.attach(REGION, vec![0x01, 0x00, 0x00, 0x00]);
    let (engine, store) = engine(provider, None);

    engine.region_to_store_cycle().unwrap();

    let inputs = store.get_range(0, 16).unwrap();
    assert!(inputs[0]);
    assert!(inputs[1..].iter().all(|c| !c));
    assert!(store.get_range(16, 16).unwrap().iter().all(|c| !c));
    assert!(!engine.status().fallback);
}

#[test]
fn test_unchanged_outputs_logged_once() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("registro_datos.csv");

    let provider = MemoryRegionProvider::new();
    provider.attach(REGION, vec![0x00, 0x00, 0x01, 0x00]);
    let (engine, store) = engine(provider, Some(change_log(&log_path)));

    engine.region_to_store_cycle().unwrap();
    engine.region_to_store_cycle().unwrap();

    let outputs = store.get_range(16, 16).unwrap();
    assert!(outputs[0]);
    assert!(outputs[1..].iter().all(|c| !c));
    assert_eq!(data_rows(&log_path), 1);
}

#[test]
fn test_output_transition_appends_row() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("log.csv");

    let provider = MemoryRegionProvider::new();
    provider.attach(REGION, vec![0x00; 4]);
    let (engine, _) = engine(provider.clone(), Some(change_log(&log_path)));

    engine.region_to_store_cycle().unwrap();
    provider.poke(REGION, 3, &[0x80]);
    engine.region_to_store_cycle().unwrap();
    engine.region_to_store_cycle().unwrap();

    let content = std::fs::read_to_string(&log_path).unwrap();
    let rows: Vec<_> = content.lines().collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2], "2024-03-07 09:05:01,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,1");
}

#[test]
fn test_region_to_store_leaves_manual_zone_alone() {
    let provider = MemoryRegionProvider::new();
    provider.attach(REGION, vec![0xFF; 4]);
    let (engine, store) = engine(provider, None);

    store.set_range(32, &[true, false, true]).unwrap();
    engine.region_to_store_cycle().unwrap();

    assert_eq!(store.get_range(32, 3).unwrap(), vec![true, false, true]);
    assert!(store.get_range(35, 13).unwrap().iter().all(|c| !c));
}

// ============================================================================
// Store → region
// ============================================================================

#[test]
fn test_manual_coils_encoded_into_output_zone() {
    let provider = MemoryRegionProvider::with_region(REGION, 4);
    let (engine, store) = engine(provider.clone(), None);

    let mut manual = vec![false; 16];
    manual[0] = true;
    manual[1] = true;
    store.set_range(32, &manual).unwrap();

    assert!(engine.store_to_region_cycle().unwrap());
    assert_eq!(provider.peek(REGION).unwrap(), vec![0x00, 0x00, 0x03, 0x00]);
}

#[test]
fn test_manual_coils_through_mmap_region() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(REGION), [0x01, 0x00, 0x00, 0x00]).unwrap();
    let (engine, store) = engine(MmapRegionProvider::new(dir.path()), None);

    store.set_range(32, &[true, true]).unwrap();
    engine.store_to_region_cycle().unwrap();
    engine.region_to_store_cycle().unwrap();

    assert_eq!(
        std::fs::read(dir.path().join(REGION)).unwrap(),
        vec![0x01, 0x00, 0x03, 0x00]
    );
    // The written output zone comes back through the outputs mirror
    assert_eq!(store.get_range(16, 2).unwrap(), vec![true, true]);
}

// ============================================================================
// Fallback
// ============================================================================

#[test]
fn test_unreachable_region_runs_on_fallback() {
    let (engine, store) = engine(MemoryRegionProvider::new(), None);

    engine.region_to_store_cycle().unwrap();
    let status = engine.status();
    assert!(status.fallback);
    assert_eq!(engine.gateway().read_region(), vec![0u8; 4]);

    store.set_range(32, &[true, true]).unwrap();
    assert!(!engine.store_to_region_cycle().unwrap());
    assert_eq!(engine.gateway().read_region(), vec![0x00, 0x00, 0x03, 0x00]);

    // The fallback image feeds the outputs mirror on the next cycle
    engine.region_to_store_cycle().unwrap();
    assert_eq!(store.get_range(16, 2).unwrap(), vec![true, true]);
}

// ============================================================================
// Periodic tasks
// ============================================================================

#[tokio::test]
async fn test_tasks_run_until_cancelled() {
    let provider = MemoryRegionProvider::new();
    provider.attach(REGION, vec![0x05, 0x00, 0x00, 0x00]);
    let (engine, store) = engine(provider.clone(), None);
    let token = CancellationToken::new();

    store.set_range(32, &[false, true]).unwrap();
    let tasks = engine.spawn(token.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;
    token.cancel();
    tasks.join().await;

    let status = engine.status();
    assert!(status.cycles_a >= 2);
    assert!(status.cycles_b >= 2);
    assert_eq!(status.failed_cycles, 0);
    assert!(!status.fallback);

    assert_eq!(store.get_range(0, 3).unwrap(), vec![true, false, true]);
    assert_eq!(provider.peek(REGION).unwrap()[2], 0x02);

    // No cycles after cancellation
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.status(), status);
}

#[tokio::test]
async fn test_region_appearing_later_is_picked_up() {
    let provider = MemoryRegionProvider::new();
    let (engine, store) = engine(provider.clone(), None);
    let token = CancellationToken::new();

    let tasks = engine.spawn(token.clone());
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(engine.status().fallback);

    provider.attach(REGION, vec![0x80, 0x00, 0x00, 0x00]);
    tokio::time::sleep(Duration::from_millis(60)).await;
    token.cancel();
    tasks.join().await;

    assert!(!engine.status().fallback);
    assert!(store.get_range(7, 1).unwrap()[0]);
}
