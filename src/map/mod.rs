//! Value maps over paged regions, and the assembly utilities that compose
//! and survey them.

pub mod assembly;
pub mod dynamic;
pub mod region_map;

pub use assembly::{map_stitch, map_unsplit, map_unwrap, map_value_coverage, RegionUnwrap, StitchedMap};
pub use dynamic::DynamicRegionValueMap;
pub use region_map::{RegionValueMap, ValueMap};
