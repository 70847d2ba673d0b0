//! Region file encoding
//!
//! Little-endian, no header. A file is a sequence of records:
//!
//! ```text
//! key:i64  hash:i32  count:i32  count × { position: 3×f32, half_extent: 3×f32 }
//! ```

use crate::error::StoreError;
use crate::terrain::CollisionBox;
use glam::Vec3;
use voxel::{RegionPos, SectionPos};

const RECORD_HEADER_BYTES: usize = 16;
const BOX_BYTES: usize = 24;

/// Stored geometry of one section
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRecord {
    /// [`crate::terrain::ContentHash::short`] of the content
    pub hash: u32,
    pub boxes: Vec<CollisionBox>,
}

/// File name of a region: `r.<rx>.<rz>.colr`
pub fn file_name(region: RegionPos) -> String {
    format!("r.{}.{}.colr", region.x, region.z)
}

/// Serialize records; callers pass them in the order they should be written
pub fn encode<'a>(records: impl IntoIterator<Item = (SectionPos, &'a RegionRecord)>) -> Vec<u8> {
    let mut out = Vec::new();
    for (section, record) in records {
        out.extend_from_slice(&(section.pack() as i64).to_le_bytes());
        out.extend_from_slice(&(record.hash as i32).to_le_bytes());
        out.extend_from_slice(&(record.boxes.len() as i32).to_le_bytes());
        for b in &record.boxes {
            for value in b.center.to_array().into_iter().chain(b.half_extent.to_array()) {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
    }
    out
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.bytes[self.offset..self.offset + N]);
        self.offset += N;
        buf
    }

    fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.take())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    fn vec3(&mut self) -> Vec3 {
        let x = f32::from_le_bytes(self.take());
        let y = f32::from_le_bytes(self.take());
        let z = f32::from_le_bytes(self.take());
        Vec3::new(x, y, z)
    }
}

/// Parse a region file
///
/// Fails on the first truncated or malformed record.
pub fn decode(bytes: &[u8]) -> Result<Vec<(SectionPos, RegionRecord)>, StoreError> {
    let mut reader = Reader { bytes, offset: 0 };
    let mut records = Vec::new();

    while reader.remaining() > 0 {
        let start = reader.offset;
        if reader.remaining() < RECORD_HEADER_BYTES {
            return Err(StoreError::Corrupt {
                offset: start,
                reason: "truncated record header",
            });
        }

        let key = reader.i64();
        let hash = reader.i32();
        let count = reader.i32();
        if key < 0 || key >= 1 << 60 {
            return Err(StoreError::Corrupt {
                offset: start,
                reason: "section key out of range",
            });
        }
        if count < 0 {
            return Err(StoreError::Corrupt {
                offset: start,
                reason: "negative box count",
            });
        }
        let count = count as usize;
        if reader.remaining() / BOX_BYTES < count {
            return Err(StoreError::Corrupt {
                offset: start,
                reason: "truncated box list",
            });
        }

        let boxes = (0..count)
            .map(|_| {
                let center = reader.vec3();
                let half_extent = reader.vec3();
                CollisionBox::new(center, half_extent)
            })
            .collect();

        records.push((
            SectionPos::unpack(key as u64),
            RegionRecord {
                hash: hash as u32,
                boxes,
            },
        ));
    }

    Ok(records)
}
