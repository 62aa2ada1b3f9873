//! Region residency: buffers, lifecycle, the access manager and its
//! pluggable backing stores.

pub mod manager;
pub mod region;
pub mod store;

pub use manager::{AccessManager, AccessMode, RegionHandle};
pub use region::{Lifecycle, Region, RegionBuffer};
pub use store::{AccessFormat, DirectoryStore, MemoryStore, PersistenceError, PersistenceResult};
