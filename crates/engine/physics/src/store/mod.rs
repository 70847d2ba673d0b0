//! Persistent region store for section collision geometry
//!
//! Sections are grouped into 32×32 column regions, one file per region. A
//! record is only trusted when its content hash matches the caller's fresh
//! snapshot hash. Corrupt data reads as a miss; I/O failures turn a region
//! memory-only. Nothing here ever surfaces an error to the lookup API.

mod region_file;

pub use region_file::{decode, encode, file_name, RegionRecord};

use crate::error::StoreError;
use crate::terrain::{CollisionBox, ContentHash};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use voxel::{RegionPos, SectionPos};

#[derive(Debug, Default)]
struct RegionState {
    loaded: bool,
    records: HashMap<SectionPos, RegionRecord>,
    dirty: bool,
    /// I/O failed once; the region stays memory-only from then on
    failed: bool,
}

#[derive(Debug)]
struct RegionSlot {
    region: RegionPos,
    in_flight: AtomicUsize,
    state: Mutex<RegionState>,
}

/// Keeps a region resident while a request is using it
struct SlotGuard(Arc<RegionSlot>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Region-file archive mapping (section, content hash) to box geometry
#[derive(Debug)]
pub struct RegionStore {
    dir: Option<PathBuf>,
    max_resident: usize,
    regions: Mutex<HashMap<RegionPos, Arc<RegionSlot>>>,
}

impl RegionStore {
    /// Store backed by region files under `dir`
    pub fn open(dir: impl Into<PathBuf>, max_resident: usize) -> Self {
        Self {
            dir: Some(dir.into()),
            max_resident,
            regions: Mutex::new(HashMap::new()),
        }
    }

    /// Store that never touches the filesystem
    pub fn in_memory(max_resident: usize) -> Self {
        Self {
            dir: None,
            max_resident,
            regions: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Number of regions currently held in memory
    pub fn resident_regions(&self) -> usize {
        self.regions.lock().len()
    }

    fn acquire(&self, region: RegionPos) -> SlotGuard {
        let mut regions = self.regions.lock();
        let slot = regions
            .entry(region)
            .or_insert_with(|| {
                Arc::new(RegionSlot {
                    region,
                    in_flight: AtomicUsize::new(0),
                    state: Mutex::new(RegionState::default()),
                })
            })
            .clone();
        // Incremented under the map lock so eviction never sees a stale zero
        slot.in_flight.fetch_add(1, Ordering::AcqRel);
        SlotGuard(slot)
    }

    /// Run `f` with the region of `section` loaded and locked
    fn with_region<R>(&self, section: SectionPos, f: impl FnOnce(&mut RegionState) -> R) -> R {
        let guard = self.acquire(section.region());
        let slot = &guard.0;
        let mut state = slot.state.lock();
        if !state.loaded {
            self.read_region(slot.region, &mut state);
        }
        f(&mut state)
    }

    fn region_path(&self, region: RegionPos) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(region_file::file_name(region)))
    }

    fn read_region(&self, region: RegionPos, state: &mut RegionState) {
        state.loaded = true;
        let Some(path) = self.region_path(region) else {
            return;
        };

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return,
            Err(err) => {
                warn!(?region, path = %path.display(), error = %err, "region unreadable, keeping it in memory only");
                state.failed = true;
                return;
            }
        };

        match region_file::decode(&bytes) {
            Ok(records) => {
                debug!(?region, records = records.len(), "region loaded");
                state.records = records.into_iter().collect();
            }
            Err(err) => {
                warn!(?region, error = %err, "discarding corrupt region file");
                // Rewrite from scratch on the next flush
                state.dirty = true;
            }
        }
    }

    fn write_region(&self, region: RegionPos, state: &RegionState) -> Result<(), StoreError> {
        let (Some(dir), Some(path)) = (self.dir.as_ref(), self.region_path(region)) else {
            return Ok(());
        };
        fs::create_dir_all(dir)?;

        let mut records: Vec<_> = state.records.iter().collect();
        records.sort_unstable_by_key(|(section, _)| section.pack());
        let data = region_file::encode(records.into_iter().map(|(section, record)| (*section, record)));

        let tmp = path.with_extension("colr.tmp");
        fs::write(&tmp, data)?;
        fs::rename(tmp, &path)?;
        Ok(())
    }

    /// Stored boxes of `section`, if a record matching the short hash exists
    pub fn load(&self, section: SectionPos, hash: ContentHash) -> Option<Vec<CollisionBox>> {
        self.with_region(section, |state| {
            state
                .records
                .get(&section)
                .filter(|record| record.hash == hash.short())
                .map(|record| record.boxes.clone())
        })
    }

    /// Record the geometry of `section` for content `hash`
    pub fn save(&self, section: SectionPos, hash: ContentHash, boxes: Vec<CollisionBox>) {
        self.with_region(section, |state| {
            let record = RegionRecord {
                hash: hash.short(),
                boxes,
            };
            if state.records.get(&section) != Some(&record) {
                state.records.insert(section, record);
                state.dirty = true;
            }
        })
    }

    /// Drop the record of `section`
    pub fn forget(&self, section: SectionPos) {
        self.with_region(section, |state| {
            if state.records.remove(&section).is_some() {
                state.dirty = true;
            }
        })
    }

    /// Write every dirty region to disk, returning how many were written
    pub fn flush(&self) -> usize {
        if self.dir.is_none() {
            return 0;
        }

        let slots: Vec<Arc<RegionSlot>> = self.regions.lock().values().cloned().collect();
        let mut written = 0;
        for slot in slots {
            let mut state = slot.state.lock();
            if !state.dirty || state.failed {
                continue;
            }
            match self.write_region(slot.region, &state) {
                Ok(()) => {
                    state.dirty = false;
                    written += 1;
                }
                Err(err) => {
                    warn!(region = ?slot.region, error = %err, "region write failed, keeping it in memory only");
                    state.failed = true;
                }
            }
        }

        if written > 0 {
            info!(regions = written, "flushed collision regions");
        }
        written
    }

    /// Evict idle regions beyond the resident limit, returning how many were dropped
    ///
    /// Regions with requests in flight and regions holding unflushed data are kept.
    /// Failed regions are memory-only and stay resident for the store's lifetime.
    pub fn evict_idle(&self) -> usize {
        let persistent = self.dir.is_some();
        let mut regions = self.regions.lock();
        let excess = regions.len().saturating_sub(self.max_resident);
        if excess == 0 {
            return 0;
        }

        let evictable: Vec<RegionPos> = regions
            .values()
            .filter(|slot| slot.in_flight.load(Ordering::Acquire) == 0)
            .filter(|slot| match slot.state.try_lock() {
                Some(state) => !state.failed && (!state.dirty || !persistent),
                None => false,
            })
            .map(|slot| slot.region)
            .take(excess)
            .collect();

        for region in &evictable {
            regions.remove(region);
        }
        if !evictable.is_empty() {
            debug!(count = evictable.len(), "evicted idle collision regions");
        }
        evictable.len()
    }
}

impl Drop for RegionStore {
    fn drop(&mut self) {
        self.flush();
    }
}
