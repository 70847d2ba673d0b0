use super::hash::ContentHash;
use super::mesh::MeshRef;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct CacheEntry {
    mesh: MeshRef,
    last_used: AtomicU64,
}

/// Concurrent content-hash → mesh cache shared by all workers
///
/// Entries whose mesh is still referenced outside the cache are never
/// evicted. Unreferenced entries beyond `capacity` go oldest first.
#[derive(Debug)]
pub struct ShapeCache {
    capacity: usize,
    entries: DashMap<ContentHash, CacheEntry>,
    clock: AtomicU64,
}

impl ShapeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: DashMap::new(),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn get(&self, hash: ContentHash) -> Option<MeshRef> {
        let entry = self.entries.get(&hash)?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(entry.mesh.clone())
    }

    /// Insert a mesh, returning the canonical instance
    ///
    /// When another worker already cached the same hash, its mesh wins and the
    /// argument is dropped.
    pub fn put(&self, hash: ContentHash, mesh: MeshRef) -> MeshRef {
        let now = self.tick();
        let canonical = match self.entries.entry(hash) {
            Entry::Occupied(existing) => {
                existing.get().last_used.store(now, Ordering::Relaxed);
                existing.get().mesh.clone()
            }
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry {
                    mesh: mesh.clone(),
                    last_used: AtomicU64::new(now),
                });
                mesh
            }
        };

        if self.entries.len() > self.capacity {
            self.evict();
        }
        canonical
    }

    /// Drop unreferenced entries, oldest first, until within capacity
    pub fn evict(&self) -> usize {
        let excess = self.entries.len().saturating_sub(self.capacity);
        if excess == 0 {
            return 0;
        }

        let mut candidates: Vec<(u64, ContentHash)> = self
            .entries
            .iter()
            .filter(|entry| Arc::strong_count(&entry.mesh) == 1)
            .map(|entry| (entry.last_used.load(Ordering::Relaxed), *entry.key()))
            .collect();
        candidates.sort_unstable();

        let mut evicted = 0;
        for (_, hash) in candidates {
            if evicted == excess {
                break;
            }
            if self
                .entries
                .remove_if(&hash, |_, entry| Arc::strong_count(&entry.mesh) == 1)
                .is_some()
            {
                evicted += 1;
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
