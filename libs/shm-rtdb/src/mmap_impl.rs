//! Memory-mapped region provider
//!
//! The external simulator publishes its I/O image as a file on a RAM-backed
//! tmpfs (`/dev/shm/<name>` on Linux). Each acquisition opens the file, maps
//! exactly the configured size and drops both when the handle goes out of
//! scope. The provider never creates or resizes the region.

use crate::error::{RegionError, Result};
use crate::traits::{Access, RegionHandle, RegionProvider};
use anyhow::anyhow;
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Default directory holding shared regions
///
/// Priority:
/// 1. `SHMBRIDGE_SHM_DIR` environment variable (if set)
/// 2. Linux RAM-backed tmpfs `/dev/shm`
/// 3. System temp directory (macOS or other platforms)
pub fn default_shm_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SHMBRIDGE_SHM_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(target_os = "linux")]
    {
        let dev_shm = Path::new("/dev/shm");
        if dev_shm.exists() {
            return dev_shm.to_path_buf();
        }
    }

    std::env::temp_dir()
}

/// Region provider backed by memmap2
#[derive(Debug, Clone)]
pub struct MmapRegionProvider {
    dir: PathBuf,
}

impl MmapRegionProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full path of the file backing region `name`
    pub fn region_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl Default for MmapRegionProvider {
    fn default() -> Self {
        Self::new(default_shm_dir())
    }
}

/// Live mapping of a region; unmapped on drop
pub enum MmapHandle {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl RegionHandle for MmapHandle {
    fn read(&self) -> Vec<u8> {
        match self {
            Self::ReadOnly(map) => map.to_vec(),
            Self::ReadWrite(map) => map.to_vec(),
        }
    }

    fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        match self {
            Self::ReadOnly(_) => Err(RegionError::Other(anyhow!("region mapped read-only"))),
            Self::ReadWrite(map) => {
                let end = offset.saturating_add(data.len());
                if end > map.len() {
                    return Err(RegionError::OutOfRange {
                        offset,
                        end,
                        size: map.len(),
                    });
                }
                map[offset..end].copy_from_slice(data);
                Ok(())
            },
        }
    }
}

impl RegionProvider for MmapRegionProvider {
    type Handle = MmapHandle;

    fn acquire(&self, name: &str, size: usize, access: Access) -> Result<Self::Handle> {
        let path = self.region_path(name);
        let unavailable = |reason: String| RegionError::Unavailable {
            name: name.to_string(),
            reason,
        };

        let file = OpenOptions::new()
            .read(true)
            .write(access == Access::ReadWrite)
            .open(&path)
            .map_err(|e| unavailable(format!("{}: {}", path.display(), e)))?;

        let len = file
            .metadata()
            .map_err(|e| unavailable(format!("metadata: {}", e)))?
            .len() as usize;
        if len < size {
            return Err(unavailable(format!(
                "truncated: {} bytes, expected {}",
                len, size
            )));
        }

        // SAFETY: the mapping is private to this handle and only ever copied
        // in or out; concurrent external writers can change bytes but not
        // the mapping length, which was checked against the file above.
        let handle = match access {
            Access::Read => unsafe {
                MmapOptions::new()
                    .len(size)
                    .map(&file)
                    .map(MmapHandle::ReadOnly)
            },
            Access::ReadWrite => unsafe {
                MmapOptions::new()
                    .len(size)
                    .map_mut(&file)
                    .map(MmapHandle::ReadWrite)
            },
        }
        .map_err(|e| unavailable(format!("mmap failed: {}", e)))?;

        Ok(handle)
    }

    fn describe(&self) -> String {
        format!("mmap:{}", self.dir.display())
    }
}
