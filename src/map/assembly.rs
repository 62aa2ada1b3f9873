//! Assembly and survey utilities: stitching maps side by side, unwrapping
//! a map into region buffers, rebuilding a map from them, and measuring
//! value coverage.

use std::sync::Arc;

use crate::access::{AccessFormat, AccessManager, AccessMode, RegionBuffer};
use crate::coord::{Coord, Extent, RegionKey, RegionSize};
use crate::error::{MapError, MapResult};
use crate::format::{ColorValueFormat, Value};

use super::region_map::{RegionValueMap, ValueMap};

/// Composite map that presents disjoint component maps, each placed at an
/// origin, as one coordinate space. Gaps between components read as empty.
pub struct StitchedMap {
    parts: Vec<(Coord, Extent, Box<dyn ValueMap>)>,
    extent: Extent,
}

/// Places component maps into one composite. Placements must be disjoint;
/// any intersection fails with `OverlapDetected` at call time.
pub fn map_stitch(parts: Vec<(Coord, Box<dyn ValueMap>)>) -> MapResult<StitchedMap> {
    let mut placed: Vec<(Coord, Extent, Box<dyn ValueMap>)> = Vec::new();
    for (origin, map) in parts {
        let extent = map.extent();
        for (other_origin, other_extent, _) in &placed {
            if rects_intersect(origin, extent, *other_origin, *other_extent) {
                return Err(MapError::OverlapDetected(format!(
                    "component at ({}, {}) sized {}x{} intersects component at ({}, {}) sized {}x{}",
                    origin.x,
                    origin.y,
                    extent.width,
                    extent.height,
                    other_origin.x,
                    other_origin.y,
                    other_extent.width,
                    other_extent.height
                )));
            }
        }
        placed.push((origin, extent, map));
    }
    let extent = Extent::new(
        placed
            .iter()
            .map(|(o, e, _)| o.x + e.width)
            .max()
            .unwrap_or(0),
        placed
            .iter()
            .map(|(o, e, _)| o.y + e.height)
            .max()
            .unwrap_or(0),
    );
    Ok(StitchedMap {
        parts: placed,
        extent,
    })
}

fn rects_intersect(a_origin: Coord, a: Extent, b_origin: Coord, b: Extent) -> bool {
    !a.is_empty()
        && !b.is_empty()
        && a_origin.x < b_origin.x + b.width
        && b_origin.x < a_origin.x + a.width
        && a_origin.y < b_origin.y + b.height
        && b_origin.y < a_origin.y + a.height
}

impl StitchedMap {
    fn part_at(&self, coord: Coord) -> Option<(&dyn ValueMap, Coord)> {
        self.parts.iter().find_map(|(origin, extent, map)| {
            let translated = Coord::new(coord.x.wrapping_sub(origin.x), coord.y.wrapping_sub(origin.y));
            if coord.x >= origin.x && coord.y >= origin.y && extent.contains(translated) {
                Some((map.as_ref(), translated))
            } else {
                None
            }
        })
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
}

impl ValueMap for StitchedMap {
    fn extent(&self) -> Extent {
        self.extent
    }

    fn get(&self, coord: Coord) -> MapResult<Option<Value>> {
        self.check_bounds(coord)?;
        match self.part_at(coord) {
            Some((map, translated)) => map.get(translated),
            None => Ok(None),
        }
    }

    fn set(&self, coord: Coord, value: Value) -> MapResult<()> {
        self.check_bounds(coord)?;
        match self.part_at(coord) {
            Some((map, translated)) => map.set(translated, value),
            // A gap has no backing map to hold the value.
            None => Err(MapError::OutOfBounds {
                x: coord.x,
                y: coord.y,
                width: self.extent.width,
                height: self.extent.height,
            }),
        }
    }

    fn clear(&self, coord: Coord) -> MapResult<()> {
        self.check_bounds(coord)?;
        match self.part_at(coord) {
            Some((map, translated)) => map.clear(translated),
            None => Ok(()),
        }
    }
}

/// Lazy, restartable walk over a map's region buffers in grid order. Each
/// step pins one region, snapshots its buffer and releases it, so the walk
/// never holds more than one region resident on its own.
pub struct RegionUnwrap<'m> {
    access: &'m AccessManager,
    keys: Vec<RegionKey>,
    next: usize,
}

impl<'m> RegionUnwrap<'m> {
    pub(crate) fn new(access: &'m AccessManager, keys: Vec<RegionKey>) -> Self {
        Self {
            access,
            keys,
            next: 0,
        }
    }

    /// Rewinds to the first region.
    pub fn restart(&mut self) {
        self.next = 0;
    }

    pub fn remaining(&self) -> usize {
        self.keys.len() - self.next
    }
}

impl Iterator for RegionUnwrap<'_> {
    type Item = MapResult<(RegionKey, RegionBuffer)>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = *self.keys.get(self.next)?;
        self.next += 1;
        Some(
            self.access
                .acquire(key, AccessMode::Read)
                .map(|handle| (key, handle.region().buffer().clone())),
        )
    }
}

/// Splits a map into `(key, buffer)` snapshots, one per region.
pub fn map_unwrap(map: &RegionValueMap) -> RegionUnwrap<'_> {
    RegionUnwrap::new(map.access(), map.region_keys())
}

/// Rebuilds a map from split region buffers. All buffers must match the
/// stated region size and the format's channel count; the extent is taken
/// from the furthest key, so the result covers every part.
pub fn map_unsplit(
    parts: Vec<(RegionKey, RegionBuffer)>,
    region_size: RegionSize,
    format: Arc<dyn ColorValueFormat>,
    store: Arc<dyn AccessFormat>,
) -> MapResult<RegionValueMap> {
    if parts.is_empty() {
        return Err(MapError::PartitionMismatch(
            "cannot unsplit zero parts".into(),
        ));
    }
    let channels = format.channel_count();
    for (key, buffer) in &parts {
        if !buffer.matches_shape(region_size, channels) {
            return Err(MapError::PartitionMismatch(format!(
                "part ({}, {}) is {}x{}x{}, expected {}x{}x{}",
                key.x,
                key.y,
                buffer.width(),
                buffer.height(),
                buffer.channels(),
                region_size.width,
                region_size.height,
                channels
            )));
        }
    }
    let grid_w = parts.iter().map(|(k, _)| k.x).max().unwrap_or(0) + 1;
    let grid_h = parts.iter().map(|(k, _)| k.y).max().unwrap_or(0) + 1;
    let extent = Extent::new(grid_w * region_size.width, grid_h * region_size.height);
    let map = RegionValueMap::new(extent, region_size, format, store)?;
    for (key, buffer) in parts {
        let handle = map.access().acquire(key, AccessMode::Write)?;
        handle.region_mut().overwrite(buffer);
    }
    Ok(map)
}

/// Fraction of the map's coordinates holding a value, in `[0, 1]`.
///
/// Regions not already resident are loaded for the scan and evicted right
/// after, so surveying a huge map does not pull it wholly into memory.
pub fn map_value_coverage(map: &RegionValueMap) -> MapResult<f64> {
    coverage_scan(
        map.access(),
        map.region_keys(),
        map.format().as_ref(),
        map.extent().len(),
    )
}

pub(crate) fn coverage_scan(
    access: &AccessManager,
    keys: Vec<RegionKey>,
    format: &dyn ColorValueFormat,
    domain: usize,
) -> MapResult<f64> {
    if domain == 0 {
        return Ok(0.0);
    }
    let mut populated = 0usize;
    for key in keys {
        let was_resident = access.is_resident(key);
        {
            let handle = access.acquire(key, AccessMode::Read)?;
            let region = handle.region();
            populated += region
                .buffer()
                .tuples()
                .filter(|tuple| !format.is_empty_marker(tuple))
                .count();
        }
        if !was_resident {
            access.evict_if_idle(key)?;
        }
    }
    Ok(populated as f64 / domain as f64)
}
