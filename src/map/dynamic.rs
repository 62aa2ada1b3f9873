//! Value maps whose extent can grow after construction.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::access::{AccessFormat, AccessManager, AccessMode};
use crate::coord::{self, Coord, Extent, RegionKey, RegionSize};
use crate::error::{MapError, MapResult};
use crate::format::{ColorValueFormat, Value};

use super::region_map::ValueMap;

/// Like [`RegionValueMap`](super::RegionValueMap) but the extent may grow.
/// All growth funnels through [`extend`](DynamicRegionValueMap::extend);
/// region size stays fixed, so existing region keys and their contents are
/// untouched by growth. Shrinking is refused, and no reorder is supported:
/// a fixed-domain bijection cannot survive a growing domain.
pub struct DynamicRegionValueMap {
    extent: RwLock<Extent>,
    region_size: RegionSize,
    format: Arc<dyn ColorValueFormat>,
    access: AccessManager,
}

impl DynamicRegionValueMap {
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
            extent: RwLock::new(extent),
            region_size,
            format,
            access,
        })
    }

    /// Grows the extent. New coordinates become addressable immediately;
    /// outstanding handles on existing regions stay valid. Fails with
    /// `ShrinkNotSupported` when the request is smaller in any dimension.
    pub fn extend(&self, requested: Extent) -> MapResult<()> {
        let mut extent = self.extent.write();
        if requested.width < extent.width || requested.height < extent.height {
            return Err(MapError::ShrinkNotSupported {
                current: *extent,
                requested,
            });
        }
        if requested != *extent {
            log::debug!(
                "extent grown from {}x{} to {}x{}",
                extent.width,
                extent.height,
                requested.width,
                requested.height
            );
            *extent = requested;
        }
        Ok(())
    }

    pub fn region_size(&self) -> RegionSize {
        self.region_size
    }

    pub fn format(&self) -> &Arc<dyn ColorValueFormat> {
        &self.format
    }

    pub(crate) fn access(&self) -> &AccessManager {
        &self.access
    }

    /// Keys of every region under the current extent, row-major.
    pub fn region_keys(&self) -> Vec<RegionKey> {
        coord::region_keys(*self.extent.read(), self.region_size)
    }

    pub fn flush_all(&self) -> MapResult<usize> {
        self.access.flush_all()
    }

    pub fn evict_idle(&self) -> MapResult<usize> {
        self.access.evict_idle()
    }

    pub fn resident_count(&self) -> usize {
        self.access.resident_count()
    }

    /// Fraction of the current extent holding a value.
    pub fn coverage(&self) -> MapResult<f64> {
        super::assembly::coverage_scan(
            &self.access,
            self.region_keys(),
            self.format.as_ref(),
            self.extent().len(),
        )
    }

    /// Walks the current extent's regions as `(key, buffer)` snapshots.
    pub fn unwrap_regions(&self) -> super::assembly::RegionUnwrap<'_> {
        super::assembly::RegionUnwrap::new(&self.access, self.region_keys())
    }

    fn check_bounds(&self, coord: Coord) -> MapResult<()> {
        let extent = *self.extent.read();
        if extent.contains(coord) {
            Ok(())
        } else {
            Err(MapError::OutOfBounds {
                x: coord.x,
                y: coord.y,
                width: extent.width,
                height: extent.height,
            })
        }
    }

    fn write_tuple(&self, coord: Coord, tuple: &[u64]) -> MapResult<()> {
        let key = coord.region(self.region_size);
        let handle = self.access.acquire(key, AccessMode::Write)?;
        handle
            .region_mut()
            .set_tuple(coord.local(self.region_size), tuple);
        Ok(())
    }
}

impl ValueMap for DynamicRegionValueMap {
    fn extent(&self) -> Extent {
        *self.extent.read()
    }

    fn get(&self, coord: Coord) -> MapResult<Option<Value>> {
        self.check_bounds(coord)?;
        let key = coord.region(self.region_size);
        let handle = self.access.acquire(key, AccessMode::Read)?;
        let region = handle.region();
        self.format.decode(region.tuple(coord.local(self.region_size)))
    }

    fn set(&self, coord: Coord, value: Value) -> MapResult<()> {
        self.check_bounds(coord)?;
        let tuple = self.format.encode(value)?;
        self.write_tuple(coord, &tuple)
    }

    fn clear(&self, coord: Coord) -> MapResult<()> {
        self.check_bounds(coord)?;
        self.write_tuple(coord, &self.format.empty_tuple())
    }
}
