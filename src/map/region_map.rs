//! Fixed-extent value maps backed by paged regions.

use std::sync::Arc;

use crate::access::{AccessFormat, AccessManager, AccessMode};
use crate::coord::{self, Coord, Extent, RegionKey, RegionSize};
use crate::error::{MapError, MapResult};
use crate::format::{ColorValueFormat, Value};
use crate::reorder::ReversibleReorder;

/// Random-access view over a coordinate domain of optional values.
pub trait ValueMap: Send + Sync {
    fn extent(&self) -> Extent;

    /// `Ok(None)` means the coordinate holds no value.
    fn get(&self, coord: Coord) -> MapResult<Option<Value>>;

    fn set(&self, coord: Coord, value: Value) -> MapResult<()>;

    /// Writes the empty marker back, returning the coordinate to "no
    /// value" without touching its neighbors.
    fn clear(&self, coord: Coord) -> MapResult<()>;
}

/// Value map with a fixed extent and partition, paging regions in and out
/// through an [`AccessManager`]. Only touched regions ever occupy memory.
pub struct RegionValueMap {
    extent: Extent,
    region_size: RegionSize,
    format: Arc<dyn ColorValueFormat>,
    reorder: Option<ReversibleReorder>,
    access: AccessManager,
}

impl RegionValueMap {
    pub fn new(
        extent: Extent,
        region_size: RegionSize,
        format: Arc<dyn ColorValueFormat>,
        store: Arc<dyn AccessFormat>,
    ) -> MapResult<Self> {
        if extent.is_empty() || region_size.cells() == 0 {
            return Err(MapError::PartitionMismatch(format!(
                "extent {}x{} and region size {}x{} must both be non-zero",
                extent.width, extent.height, region_size.width, region_size.height
            )));
        }
        format.verify_medium(format.channel_count())?;
        let access = AccessManager::new(store, region_size, format.empty_tuple());
        Ok(Self {
            extent,
            region_size,
            format,
            reorder: None,
            access,
        })
    }

    /// Routes every access through an index permutation: the stored
    /// position of a coordinate is its reordered linear index. The
    /// reorder's domain must cover the extent exactly.
    pub fn with_reorder(mut self, reorder: ReversibleReorder) -> MapResult<Self> {
        if reorder.domain_len() != self.extent.len() {
            return Err(MapError::IncompleteMapping(format!(
                "reorder covers {} of {} coordinates",
                reorder.domain_len(),
                self.extent.len()
            )));
        }
        let row = self.region_size.width as usize;
        if row > 1 {
            if let Some(&p) = reorder.pivots().iter().find(|&&p| (p + 1) % row != 0) {
                log::warn!(
                    "reorder stride changes at index {p}, inside a region row of {row}; \
                     neighboring accesses will straddle regions"
                );
            }
        }
        self.reorder = Some(reorder);
        Ok(self)
    }

    pub fn region_size(&self) -> RegionSize {
        self.region_size
    }

    pub fn format(&self) -> &Arc<dyn ColorValueFormat> {
        &self.format
    }

    pub fn reorder(&self) -> Option<&ReversibleReorder> {
        self.reorder.as_ref()
    }

    pub(crate) fn access(&self) -> &AccessManager {
        &self.access
    }

    /// Keys of every region in the partition grid, row-major.
    pub fn region_keys(&self) -> Vec<RegionKey> {
        coord::region_keys(self.extent, self.region_size)
    }

    pub fn is_resident(&self, key: RegionKey) -> bool {
        self.access.is_resident(key)
    }

    pub fn resident_count(&self) -> usize {
        self.access.resident_count()
    }

    /// Writes a dirty region back to the store.
    pub fn flush(&self, key: RegionKey) -> MapResult<bool> {
        self.access.flush(key)
    }

    pub fn flush_all(&self) -> MapResult<usize> {
        self.access.flush_all()
    }

    /// Drops every idle region's buffer, flushing dirty ones first.
    pub fn evict_idle(&self) -> MapResult<usize> {
        self.access.evict_idle()
    }

    /// Fraction of the extent holding a value.
    pub fn coverage(&self) -> MapResult<f64> {
        super::assembly::map_value_coverage(self)
    }

    fn check_bounds(&self, coord: Coord) -> MapResult<()> {
        if self.extent.contains(coord) {
            Ok(())
        } else {
            Err(MapError::OutOfBounds {
                x: coord.x,
                y: coord.y,
                width: self.extent.width,
                height: self.extent.height,
            })
        }
    }

    fn physical(&self, coord: Coord) -> Coord {
        match &self.reorder {
            Some(reorder) => self
                .extent
                .coord_at(reorder.forward(self.extent.linear_index(coord))),
            None => coord,
        }
    }

    fn write_tuple(&self, coord: Coord, tuple: &[u64]) -> MapResult<()> {
        let physical = self.physical(coord);
        let key = physical.region(self.region_size);
        let handle = self.access.acquire(key, AccessMode::Write)?;
        handle
            .region_mut()
            .set_tuple(physical.local(self.region_size), tuple);
        Ok(())
    }
}

impl ValueMap for RegionValueMap {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn get(&self, coord: Coord) -> MapResult<Option<Value>> {
        self.check_bounds(coord)?;
        let physical = self.physical(coord);
        let key = physical.region(self.region_size);
        let handle = self.access.acquire(key, AccessMode::Read)?;
        let region = handle.region();
        self.format.decode(region.tuple(physical.local(self.region_size)))
    }

    fn set(&self, coord: Coord, value: Value) -> MapResult<()> {
        self.check_bounds(coord)?;
        // Encode before touching residency, so a bad value never pins or
        // dirties a region.
        let tuple = self.format.encode(value)?;
        self.write_tuple(coord, &tuple)
    }

    fn clear(&self, coord: Coord) -> MapResult<()> {
        self.check_bounds(coord)?;
        self.write_tuple(coord, &self.format.empty_tuple())
    }
}
