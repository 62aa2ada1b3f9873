//! Region residency broker: on-demand loading, reference counting,
//! writer exclusivity, flushing and least-recently-released eviction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{
    Condvar, MappedRwLockReadGuard, MappedRwLockWriteGuard, Mutex, RwLock, RwLockReadGuard,
    RwLockWriteGuard,
};

use crate::coord::{RegionKey, RegionSize};
use crate::error::MapResult;
use crate::format::ChannelTuple;

use super::region::{Lifecycle, Region, RegionBuffer};
use super::store::{AccessFormat, PersistenceError};

/// How a handle intends to use the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

#[derive(Debug)]
struct SlotState {
    lifecycle: Lifecycle,
    refs: u32,
    writer: bool,
    last_released: u64,
}

/// One entry in the slot table. The state mutex guards lifecycle and
/// counters; the buffer sits behind its own RwLock so readers never
/// observe a partial write.
struct Slot {
    state: Mutex<SlotState>,
    changed: Condvar,
    region: RwLock<Option<Region>>,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                lifecycle: Lifecycle::Unloaded,
                refs: 0,
                writer: false,
                last_released: 0,
            }),
            changed: Condvar::new(),
            region: RwLock::new(None),
        }
    }
}

/// Brokers region residency against a backing store.
///
/// All waiting happens inside [`acquire`](AccessManager::acquire): on an
/// in-flight load, on an eviction in progress, or on write-mode
/// exclusivity. A region with outstanding handles is never evicted.
pub struct AccessManager {
    store: Arc<dyn AccessFormat>,
    region_size: RegionSize,
    empty_tuple: ChannelTuple,
    slots: DashMap<RegionKey, Arc<Slot>>,
    release_clock: AtomicU64,
}

impl AccessManager {
    pub fn new(
        store: Arc<dyn AccessFormat>,
        region_size: RegionSize,
        empty_tuple: ChannelTuple,
    ) -> Self {
        debug_assert!(region_size.cells() > 0);
        debug_assert!(!empty_tuple.is_empty());
        Self {
            store,
            region_size,
            empty_tuple,
            slots: DashMap::new(),
            release_clock: AtomicU64::new(1),
        }
    }

    pub fn region_size(&self) -> RegionSize {
        self.region_size
    }

    pub fn channel_count(&self) -> u32 {
        self.empty_tuple.len() as u32
    }

    fn slot(&self, key: RegionKey) -> Arc<Slot> {
        self.slots
            .entry(key)
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone()
    }

    /// Pins the region resident and returns a scoped handle. Loads from
    /// the store on demand; a region the store has never seen starts as
    /// an all-empty buffer. Concurrent acquires of a loading region share
    /// the single in-flight load.
    pub fn acquire(&self, key: RegionKey, mode: AccessMode) -> MapResult<RegionHandle<'_>> {
        let slot = self.slot(key);
        let mut state = slot.state.lock();
        loop {
            match state.lifecycle {
                Lifecycle::Resident => {
                    if mode == AccessMode::Write && state.writer {
                        slot.changed.wait(&mut state);
                        continue;
                    }
                    state.refs += 1;
                    if mode == AccessMode::Write {
                        state.writer = true;
                    }
                    drop(state);
                    return Ok(RegionHandle {
                        manager: self,
                        slot,
                        key,
                        mode,
                    });
                }
                Lifecycle::Unloaded => {
                    state.lifecycle = Lifecycle::Loading;
                    drop(state);
                    let loaded = self.load(key);
                    state = slot.state.lock();
                    match loaded {
                        Ok(region) => {
                            *slot.region.write() = Some(region);
                            state.lifecycle = Lifecycle::Resident;
                            slot.changed.notify_all();
                        }
                        Err(err) => {
                            state.lifecycle = Lifecycle::Unloaded;
                            slot.changed.notify_all();
                            return Err(err.into());
                        }
                    }
                }
                Lifecycle::Loading | Lifecycle::Evicting => {
                    slot.changed.wait(&mut state);
                }
            }
        }
    }

    fn load(&self, key: RegionKey) -> Result<Region, PersistenceError> {
        match self.store.read(key)? {
            Some(buffer) => {
                if !buffer.matches_shape(self.region_size, self.channel_count()) {
                    return Err(PersistenceError::Corrupted(format!(
                        "region ({}, {}) is {}x{}x{}, manager expects {}x{}x{}",
                        key.x,
                        key.y,
                        buffer.width(),
                        buffer.height(),
                        buffer.channels(),
                        self.region_size.width,
                        self.region_size.height,
                        self.channel_count()
                    )));
                }
                log::debug!("loaded region ({}, {}) from store", key.x, key.y);
                Ok(Region::new(key, buffer))
            }
            None => {
                log::trace!("region ({}, {}) not in store, starting empty", key.x, key.y);
                Ok(Region::new(
                    key,
                    RegionBuffer::filled(self.region_size, &self.empty_tuple),
                ))
            }
        }
    }

    fn release(&self, slot: &Slot, mode: AccessMode) {
        let mut state = slot.state.lock();
        debug_assert!(state.refs > 0);
        state.refs = state.refs.saturating_sub(1);
        if mode == AccessMode::Write {
            state.writer = false;
        }
        state.last_released = self.release_clock.fetch_add(1, Ordering::Relaxed);
        slot.changed.notify_all();
    }

    /// Writes the region back if resident and dirty. On failure the region
    /// stays resident and dirty, so a later flush can retry.
    pub fn flush(&self, key: RegionKey) -> MapResult<bool> {
        match self.slots.get(&key).map(|entry| entry.value().clone()) {
            Some(slot) => self.flush_slot(key, &slot),
            None => Ok(false),
        }
    }

    fn flush_slot(&self, key: RegionKey, slot: &Slot) -> MapResult<bool> {
        let mut guard = slot.region.write();
        let region = match guard.as_mut() {
            Some(region) if region.is_dirty() => region,
            _ => return Ok(false),
        };
        self.store.write(key, region.buffer())?;
        region.mark_clean();
        log::debug!("flushed region ({}, {})", key.x, key.y);
        Ok(true)
    }

    /// Flushes every dirty resident region, returning how many were
    /// written. Stops at the first store failure.
    pub fn flush_all(&self) -> MapResult<usize> {
        let entries: Vec<(RegionKey, Arc<Slot>)> = self
            .slots
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        let mut flushed = 0;
        for (key, slot) in entries {
            if self.flush_slot(key, &slot)? {
                flushed += 1;
            }
        }
        Ok(flushed)
    }

    /// Evicts every resident region with no outstanding handles, least
    /// recently released first. Dirty regions are flushed before their
    /// buffers are dropped; a flush failure leaves the region resident
    /// and dirty and aborts the sweep.
    pub fn evict_idle(&self) -> MapResult<usize> {
        let mut candidates: Vec<(u64, RegionKey, Arc<Slot>)> = Vec::new();
        for entry in self.slots.iter() {
            let slot = entry.value().clone();
            let state = slot.state.lock();
            if state.lifecycle == Lifecycle::Resident && state.refs == 0 {
                let stamp = state.last_released;
                drop(state);
                candidates.push((stamp, *entry.key(), slot));
            }
        }
        candidates.sort_by_key(|(stamp, _, _)| *stamp);

        let mut evicted = 0;
        for (_, key, slot) in candidates {
            if self.evict_slot(key, &slot)? {
                evicted += 1;
            }
        }
        Ok(evicted)
    }

    /// Evicts one region if it is resident with no outstanding handles.
    pub fn evict_if_idle(&self, key: RegionKey) -> MapResult<bool> {
        match self.slots.get(&key).map(|entry| entry.value().clone()) {
            Some(slot) => self.evict_slot(key, &slot),
            None => Ok(false),
        }
    }

    fn evict_slot(&self, key: RegionKey, slot: &Slot) -> MapResult<bool> {
        {
            let mut state = slot.state.lock();
            if state.lifecycle != Lifecycle::Resident || state.refs != 0 {
                return Ok(false);
            }
            state.lifecycle = Lifecycle::Evicting;
        }
        if let Err(err) = self.flush_slot(key, slot) {
            let mut state = slot.state.lock();
            state.lifecycle = Lifecycle::Resident;
            slot.changed.notify_all();
            return Err(err);
        }
        *slot.region.write() = None;
        let mut state = slot.state.lock();
        state.lifecycle = Lifecycle::Unloaded;
        slot.changed.notify_all();
        drop(state);
        log::debug!("evicted region ({}, {})", key.x, key.y);
        Ok(true)
    }

    pub fn is_resident(&self, key: RegionKey) -> bool {
        match self.slots.get(&key) {
            Some(entry) => entry.value().state.lock().lifecycle == Lifecycle::Resident,
            None => false,
        }
    }

    pub fn resident_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().state.lock().lifecycle == Lifecycle::Resident)
            .count()
    }
}

/// Scoped pin on a resident region. Dropping the handle releases the
/// reference (and the writer claim for write-mode handles), so release
/// happens on every exit path.
///
/// Do not hold a guard from [`region`](RegionHandle::region) or
/// [`region_mut`](RegionHandle::region_mut) across calls back into the
/// manager for the same region.
pub struct RegionHandle<'m> {
    manager: &'m AccessManager,
    slot: Arc<Slot>,
    key: RegionKey,
    mode: AccessMode,
}

impl RegionHandle<'_> {
    pub fn key(&self) -> RegionKey {
        self.key
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn region(&self) -> MappedRwLockReadGuard<'_, Region> {
        RwLockReadGuard::map(self.slot.region.read(), |region| {
            region
                .as_ref()
                .expect("region resident while a handle is outstanding")
        })
    }

    pub fn region_mut(&self) -> MappedRwLockWriteGuard<'_, Region> {
        debug_assert_eq!(
            self.mode,
            AccessMode::Write,
            "region_mut requires a write-mode handle"
        );
        RwLockWriteGuard::map(self.slot.region.write(), |region| {
            region
                .as_mut()
                .expect("region resident while a handle is outstanding")
        })
    }
}

impl Drop for RegionHandle<'_> {
    fn drop(&mut self) {
        self.manager.release(&self.slot, self.mode);
    }
}
