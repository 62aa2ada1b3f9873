//! datamap: region-based paging for value maps larger than memory.
//!
//! A map's coordinate space is partitioned into fixed-size regions. Only
//! the regions an access touches are resident; the [`AccessManager`]
//! loads them on demand, reference-counts outstanding handles, flushes
//! dirty buffers and evicts idle regions least-recently-released first.
//! Cell contents go through a [`ColorValueFormat`] codec that reserves an
//! empty marker, so "no value here" survives a round trip through any
//! backing store.
//!
//! ```no_run
//! use std::sync::Arc;
//! use datamap::{Coord, Extent, MemoryStore, Monochrome, RegionSize, RegionValueMap, ValueMap};
//!
//! # fn main() -> datamap::MapResult<()> {
//! let format = Arc::new(Monochrome::new(8, 0)?);
//! let map = RegionValueMap::new(
//!     Extent::new(1024, 1024),
//!     RegionSize::new(64, 64),
//!     format,
//!     Arc::new(MemoryStore::new()),
//! )?;
//! map.set(Coord::new(3, 5), 42)?;
//! assert_eq!(map.get(Coord::new(3, 5))?, Some(42));
//! assert_eq!(map.get(Coord::new(3, 6))?, None);
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod coord;
pub mod error;
pub mod format;
pub mod map;
pub mod reorder;

pub use access::{
    AccessFormat, AccessManager, AccessMode, DirectoryStore, Lifecycle, MemoryStore,
    PersistenceError, PersistenceResult, Region, RegionBuffer, RegionHandle,
};
pub use coord::{Coord, Extent, RegionKey, RegionSize};
pub use error::{MapError, MapResult};
pub use format::{
    ChannelTuple, ColorValueFormat, Monochrome, Polychrome, Value, MAX_PALETTE_WIDTH,
};
pub use map::{
    map_stitch, map_unsplit, map_unwrap, map_value_coverage, DynamicRegionValueMap, RegionUnwrap,
    RegionValueMap, StitchedMap, ValueMap,
};
pub use reorder::{all_loops, pivots, Reorder, ReversibleReorder};
