//! Region and coil-space layout
//!
//! # Default Layout
//!
//! ```text
//! Region (256 bytes)              Coil space (200 coils)
//! ┌────────────────────┐          ┌──────────────────────────┐
//! │ [0,2)  InputZone   │──bits──► │ [0,16)   InputsMirror    │
//! │ [2,4)  OutputZone  │──bits──► │ [16,32)  OutputsMirror   │
//! │        ▲           │          │ [32,48)  ManualControl   │
//! │        └───bytes───┼──────────│                          │
//! │ [4,256) unused     │          │ [48,200) unassigned      │
//! └────────────────────┘          └──────────────────────────┘
//! ```
//!
//! Both layouts are fixed at startup; [`RegionLayout::validate`] and
//! [`CoilMap::validate`] reject overlapping or out-of-bounds zones.

use errors::{config_error, BridgeResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Default region identifier
pub const DEFAULT_REGION_NAME: &str = "CADE_IO_MAP";
/// Default region size in bytes
pub const DEFAULT_REGION_SIZE: usize = 256;
/// Minimum coil address space exposed to protocol clients
pub const MIN_COIL_COUNT: usize = 200;

// ========== Region zones ==========

/// Byte span inside the region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub offset: usize,
    pub length: usize,
}

impl Zone {
    pub const fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    /// End offset, saturating; call [`Zone::checked_end`] where overflow matters
    #[inline]
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.length)
    }

    /// End offset, `None` when `offset + length` overflows
    #[inline]
    pub fn checked_end(&self) -> Option<usize> {
        self.offset.checked_add(self.length)
    }

    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }

    /// Number of coils this zone decodes to
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.length.saturating_mul(8)
    }

    pub fn overlaps(&self, other: &Zone) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Region identity and zone partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionLayout {
    pub name: String,
    pub size: usize,
    pub input_zone: Zone,
    pub output_zone: Zone,
}

impl Default for RegionLayout {
    fn default() -> Self {
        Self {
            name: DEFAULT_REGION_NAME.to_string(),
            size: DEFAULT_REGION_SIZE,
            input_zone: Zone::new(0, 2),
            output_zone: Zone::new(2, 2),
        }
    }
}

impl RegionLayout {
    /// Check zone bounds and disjointness
    pub fn validate(&self) -> BridgeResult<()> {
        if self.name.is_empty() {
            return Err(config_error!("region name cannot be empty"));
        }
        if self.size == 0 {
            return Err(config_error!("region size must be greater than 0"));
        }
        for (label, zone) in [("input", &self.input_zone), ("output", &self.output_zone)] {
            if zone.length == 0 {
                return Err(config_error!("{} zone length must be greater than 0", label));
            }
            let Some(end) = zone.checked_end() else {
                return Err(config_error!(
                    "{} zone offset {} + length {} overflows",
                    label,
                    zone.offset,
                    zone.length
                ));
            };
            if end > self.size {
                return Err(config_error!(
                    "{} zone [{}, {}) exceeds region size {}",
                    label,
                    zone.offset,
                    end,
                    self.size
                ));
            }
        }
        if self.input_zone.overlaps(&self.output_zone) {
            return Err(config_error!(
                "input zone [{}, {}) overlaps output zone [{}, {})",
                self.input_zone.offset,
                self.input_zone.end(),
                self.output_zone.offset,
                self.output_zone.end()
            ));
        }
        Ok(())
    }
}

// ========== Coil zones ==========

/// Coil span inside the coil address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoilZone {
    pub start: usize,
    pub count: usize,
}

impl CoilZone {
    pub const fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    /// End address, saturating; call [`CoilZone::checked_end`] where overflow matters
    #[inline]
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.count)
    }

    #[inline]
    pub fn checked_end(&self) -> Option<usize> {
        self.start.checked_add(self.count)
    }

    pub fn overlaps(&self, other: &CoilZone) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    pub fn contains(&self, address: usize) -> bool {
        address >= self.start && address < self.end()
    }
}

/// Static segmentation of the coil address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoilMap {
    /// Total coil count
    pub size: usize,
    /// Decoded input zone (written by the region→store task)
    pub inputs_mirror: CoilZone,
    /// Decoded output zone (written by the region→store task)
    pub outputs_mirror: CoilZone,
    /// Client-writable coils pushed into the output zone
    pub manual_control: CoilZone,
}

impl CoilMap {
    /// Derive zone lengths from the region layout
    pub fn for_layout(
        layout: &RegionLayout,
        size: usize,
        inputs_start: usize,
        outputs_start: usize,
        manual_start: usize,
    ) -> Self {
        Self {
            size,
            inputs_mirror: CoilZone::new(inputs_start, layout.input_zone.bit_count()),
            outputs_mirror: CoilZone::new(outputs_start, layout.output_zone.bit_count()),
            manual_control: CoilZone::new(manual_start, layout.output_zone.bit_count()),
        }
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.size < MIN_COIL_COUNT {
            return Err(config_error!(
                "coil address space {} is smaller than the minimum {}",
                self.size,
                MIN_COIL_COUNT
            ));
        }
        let zones = [
            ("inputs mirror", self.inputs_mirror),
            ("outputs mirror", self.outputs_mirror),
            ("manual control", self.manual_control),
        ];
        for (label, zone) in &zones {
            let Some(end) = zone.checked_end() else {
                return Err(config_error!(
                    "{} coils start {} + count {} overflows",
                    label,
                    zone.start,
                    zone.count
                ));
            };
            if end > self.size {
                return Err(config_error!(
                    "{} coils [{}, {}) exceed coil space {}",
                    label,
                    zone.start,
                    end,
                    self.size
                ));
            }
        }
        for (i, (a_label, a)) in zones.iter().enumerate() {
            for (b_label, b) in zones.iter().skip(i + 1) {
                if a.overlaps(b) {
                    return Err(config_error!("{} coils overlap {} coils", a_label, b_label));
                }
            }
        }
        Ok(())
    }
}

impl Default for CoilMap {
    fn default() -> Self {
        Self::for_layout(&RegionLayout::default(), MIN_COIL_COUNT, 0, 16, 32)
    }
}
