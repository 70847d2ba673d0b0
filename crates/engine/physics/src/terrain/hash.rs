//! Order-independent content hashing of section snapshots

use super::snapshot::SectionSnapshot;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use voxel::{ShapeId, ShapeTable};

/// 64-bit digest of a snapshot's collision content
///
/// Independent of the section position, so identical content anywhere in the
/// world shares one cached mesh. Region records keep only [`ContentHash::short`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(u64);

impl ContentHash {
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Low 32 bits, as written to region files
    #[inline]
    pub fn short(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:016x})", self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Digest of one shape's geometry, stable across registries
fn shape_fingerprint(shapes: &ShapeTable, id: ShapeId) -> [u8; 8] {
    let mut hasher = Sha256::new();
    for word in shapes.get(id).geometry_words() {
        hasher.update(word.to_le_bytes());
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

/// Hash a snapshot
///
/// Each cell contributes its shape's geometry fingerprint and local index, so
/// two registries that intern the same shapes in a different order agree.
/// Keys are sorted before hashing so capture order never matters. The halo
/// rows follow the cells.
pub fn content_hash(snapshot: &SectionSnapshot, shapes: &ShapeTable) -> ContentHash {
    let mut fingerprints: HashMap<ShapeId, [u8; 8]> = HashMap::new();
    let mut keys: Vec<([u8; 8], u16)> = snapshot
        .iter()
        .map(|(local, shape)| {
            let fingerprint = *fingerprints
                .entry(shape)
                .or_insert_with(|| shape_fingerprint(shapes, shape));
            (fingerprint, local.raw())
        })
        .collect();
    keys.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update((keys.len() as u32).to_le_bytes());
    for (fingerprint, local) in keys {
        hasher.update(fingerprint);
        hasher.update(local.to_le_bytes());
    }
    for row in snapshot.halo().rows() {
        hasher.update(row.to_le_bytes());
    }

    let digest = hasher.finalize();
    let mut wide = [0u8; 8];
    wide.copy_from_slice(&digest[..8]);
    ContentHash(u64::from_le_bytes(wide))
}
