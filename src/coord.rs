//! Coordinate and extent arithmetic for the partition grid.

use serde::{Deserialize, Serialize};

/// Logical address of one value slot in a map's declared extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

impl Coord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Key of the region owning this coordinate under the given partition.
    pub fn region(&self, size: RegionSize) -> RegionKey {
        RegionKey::new(self.x / size.width, self.y / size.height)
    }

    /// Region-local position of this coordinate.
    pub fn local(&self, size: RegionSize) -> Coord {
        Coord::new(self.x % size.width, self.y % size.height)
    }
}

/// Declared coordinate domain of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    /// Number of addressable coordinates.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Row-major linear index of a coordinate.
    pub fn linear_index(&self, coord: Coord) -> usize {
        debug_assert!(self.contains(coord));
        coord.y as usize * self.width as usize + coord.x as usize
    }

    /// Coordinate at a row-major linear index.
    pub fn coord_at(&self, index: usize) -> Coord {
        debug_assert!(index < self.len());
        Coord::new(
            (index % self.width as usize) as u32,
            (index / self.width as usize) as u32,
        )
    }

    /// Partition grid dimensions covering this extent (ceil division, so
    /// boundary regions may be partially populated).
    pub fn grid(&self, size: RegionSize) -> (u32, u32) {
        (
            (self.width + size.width - 1) / size.width,
            (self.height + size.height - 1) / size.height,
        )
    }
}

/// Fixed dimensions of one region, set at map construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSize {
    pub width: u32,
    pub height: u32,
}

impl RegionSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of cells in one region's footprint.
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Position of a region in the partition grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionKey {
    pub x: u32,
    pub y: u32,
}

impl RegionKey {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Physical coordinate of this region's top-left cell.
    pub fn origin(&self, size: RegionSize) -> Coord {
        Coord::new(self.x * size.width, self.y * size.height)
    }
}

/// All region keys covering the extent, in row-major grid order.
pub fn region_keys(extent: Extent, size: RegionSize) -> Vec<RegionKey> {
    let (grid_w, grid_h) = extent.grid(size);
    let mut keys = Vec::with_capacity(grid_w as usize * grid_h as usize);
    for y in 0..grid_h {
        for x in 0..grid_w {
            keys.push(RegionKey::new(x, y));
        }
    }
    keys
}
