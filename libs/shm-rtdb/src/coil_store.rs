//! In-memory coil datastore
//!
//! A single linear coil space guarded by one lock. The sync tasks and every
//! protocol-server connection share it through an `Arc<CoilStore>`.

use crate::bitcodec::BitVector;
use crate::error::CoilError;
use crate::traits::CoilDatastore;
use parking_lot::RwLock;

/// Coil address space with per-call range atomicity
pub struct CoilStore {
    coils: RwLock<Vec<bool>>,
}

impl CoilStore {
    /// Create a store of `size` coils, all off
    pub fn new(size: usize) -> Self {
        Self {
            coils: RwLock::new(vec![false; size]),
        }
    }

    /// Copy of the whole coil space
    pub fn snapshot(&self) -> BitVector {
        self.coils.read().clone()
    }

    fn check_range(start: usize, count: usize, size: usize) -> Result<usize, CoilError> {
        let end = start.checked_add(count).ok_or(CoilError::OutOfRange {
            start,
            end: usize::MAX,
            size,
        })?;
        if end > size {
            return Err(CoilError::OutOfRange { start, end, size });
        }
        Ok(end)
    }
}

impl CoilDatastore for CoilStore {
    fn size(&self) -> usize {
        self.coils.read().len()
    }

    fn get_range(&self, start: usize, count: usize) -> Result<BitVector, CoilError> {
        let coils = self.coils.read();
        let end = Self::check_range(start, count, coils.len())?;
        Ok(coils[start..end].to_vec())
    }

    fn set_range(&self, start: usize, values: &[bool]) -> Result<(), CoilError> {
        let mut coils = self.coils.write();
        let end = Self::check_range(start, values.len(), coils.len())?;
        coils[start..end].copy_from_slice(values);
        Ok(())
    }
}
