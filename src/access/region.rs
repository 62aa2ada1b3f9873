//! Region buffers and lifecycle.

use serde::{Deserialize, Serialize};

use crate::coord::{Coord, RegionKey, RegionSize};

/// Residency state of one region slot. Transitions run one way around the
/// cycle: Unloaded -> Loading -> Resident -> Evicting -> Unloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Unloaded,
    Loading,
    Resident,
    Evicting,
}

/// Flat 2-D grid of channel tuples, row-major, channels interleaved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionBuffer {
    width: u32,
    height: u32,
    channels: u32,
    data: Vec<u64>,
}

impl RegionBuffer {
    /// Buffer with every cell set to `empty_tuple`, so cells that are
    /// never written decode to the empty marker.
    pub fn filled(size: RegionSize, empty_tuple: &[u64]) -> Self {
        debug_assert!(!empty_tuple.is_empty());
        let mut data = Vec::with_capacity(size.cells() * empty_tuple.len());
        for _ in 0..size.cells() {
            data.extend_from_slice(empty_tuple);
        }
        Self {
            width: size.width,
            height: size.height,
            channels: empty_tuple.len() as u32,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn size(&self) -> RegionSize {
        RegionSize::new(self.width, self.height)
    }

    pub fn matches_shape(&self, size: RegionSize, channels: u32) -> bool {
        self.width == size.width
            && self.height == size.height
            && self.channels == channels
            && self.data.len() == size.cells() * channels as usize
    }

    fn offset(&self, local: Coord) -> usize {
        debug_assert!(local.x < self.width && local.y < self.height);
        (local.y as usize * self.width as usize + local.x as usize) * self.channels as usize
    }

    pub fn tuple(&self, local: Coord) -> &[u64] {
        let offset = self.offset(local);
        &self.data[offset..offset + self.channels as usize]
    }

    pub fn set_tuple(&mut self, local: Coord, tuple: &[u64]) {
        debug_assert_eq!(tuple.len(), self.channels as usize);
        let offset = self.offset(local);
        self.data[offset..offset + self.channels as usize].copy_from_slice(tuple);
    }

    /// All tuples in row-major order.
    pub fn tuples(&self) -> impl Iterator<Item = &[u64]> {
        self.data.chunks(self.channels as usize)
    }
}

/// One resident region: its grid position, its buffer, and whether the
/// buffer has diverged from the backing store.
#[derive(Debug, Clone)]
pub struct Region {
    key: RegionKey,
    buffer: RegionBuffer,
    dirty: bool,
}

impl Region {
    pub fn new(key: RegionKey, buffer: RegionBuffer) -> Self {
        Self {
            key,
            buffer,
            dirty: false,
        }
    }

    pub fn key(&self) -> RegionKey {
        self.key
    }

    pub fn buffer(&self) -> &RegionBuffer {
        &self.buffer
    }

    /// Physical coordinate span covered by this region, origin inclusive,
    /// end exclusive.
    pub fn bounds(&self) -> (Coord, Coord) {
        let origin = self.key.origin(self.buffer.size());
        (
            origin,
            Coord::new(origin.x + self.buffer.width, origin.y + self.buffer.height),
        )
    }

    pub fn tuple(&self, local: Coord) -> &[u64] {
        self.buffer.tuple(local)
    }

    pub fn set_tuple(&mut self, local: Coord, tuple: &[u64]) {
        self.buffer.set_tuple(local, tuple);
        self.dirty = true;
    }

    /// Replaces the whole buffer, marking the region dirty.
    pub fn overwrite(&mut self, buffer: RegionBuffer) {
        self.buffer = buffer;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
