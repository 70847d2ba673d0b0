//! Section, local cell, and region addressing
//!
//! This module provides compact encodings for sections (16³ cell cubes), cells
//! within a section, and storage regions (32×32 columns of sections).

use crate::face::Face;
use glam::{IVec3, Vec3};

/// Edge length of a section in cells
pub const SECTION_SIZE: i32 = 16;
/// log2 of [`SECTION_SIZE`]
pub const SECTION_SHIFT: u32 = 4;
/// Number of cells in a section
pub const SECTION_VOLUME: usize = 4096;
/// Edge length of a storage region in sections (horizontal plane only)
pub const REGION_SIZE: i32 = 32;
/// log2 of [`REGION_SIZE`]
pub const REGION_SHIFT: u32 = 5;

/// Identifies a section of the world
///
/// # Bit Layout
/// Packed keys use 20 bits per axis: [x:20][y:20][z:20] in the low 60 bits,
/// each axis sign-extended on unpack.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SectionPos {
    /// Section coordinate (cell coordinate >> 4)
    pub pos: IVec3,
}

impl SectionPos {
    const AXIS_BITS: u32 = 20;
    const AXIS_MASK: u64 = (1 << Self::AXIS_BITS) - 1;
    const X_SHIFT: u32 = 40;
    const Y_SHIFT: u32 = 20;

    /// Smallest coordinate representable on any axis
    pub const MIN_COORD: i32 = -(1 << 19);
    /// Largest coordinate representable on any axis
    pub const MAX_COORD: i32 = (1 << 19) - 1;

    /// Create a new section position
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self {
            pos: IVec3::new(x, y, z),
        }
    }

    /// Section containing the given world cell
    pub fn from_cell(cell: IVec3) -> Self {
        Self {
            pos: cell >> SECTION_SHIFT as i32,
        }
    }

    /// Section containing the given world-space point
    pub fn from_world(point: Vec3) -> Self {
        Self::from_cell(point.floor().as_ivec3())
    }

    /// Whether every axis fits in the packed key
    pub fn is_packable(&self) -> bool {
        let in_range = |v: i32| (Self::MIN_COORD..=Self::MAX_COORD).contains(&v);
        in_range(self.pos.x) && in_range(self.pos.y) && in_range(self.pos.z)
    }

    /// Pack into a single 64-bit key
    ///
    /// # Panics
    /// Debug-panics if any axis falls outside [`Self::MIN_COORD`, `Self::MAX_COORD`]
    pub fn pack(&self) -> u64 {
        debug_assert!(self.is_packable(), "section {:?} out of packable range", self);

        ((self.pos.x as u64 & Self::AXIS_MASK) << Self::X_SHIFT)
            | ((self.pos.y as u64 & Self::AXIS_MASK) << Self::Y_SHIFT)
            | (self.pos.z as u64 & Self::AXIS_MASK)
    }

    /// Unpack a key produced by [`SectionPos::pack`]
    pub fn unpack(key: u64) -> Self {
        let axis = |shift: u32| {
            let raw = ((key >> shift) & Self::AXIS_MASK) as u32;
            // sign-extend from 20 bits
            ((raw << 12) as i32) >> 12
        };
        Self::new(axis(Self::X_SHIFT), axis(Self::Y_SHIFT), axis(0))
    }

    /// World cell coordinate of the minimum corner
    pub fn min_cell(&self) -> IVec3 {
        self.pos * SECTION_SIZE
    }

    /// World-space position of the minimum corner
    pub fn world_origin(&self) -> Vec3 {
        self.min_cell().as_vec3()
    }

    /// World-space center of the section
    pub fn world_center(&self) -> Vec3 {
        self.world_origin() + Vec3::splat(SECTION_SIZE as f32 / 2.0)
    }

    /// Adjacent section across a face
    pub fn neighbor(&self, face: Face) -> Self {
        Self {
            pos: self.pos + face.normal(),
        }
    }

    /// The six face-adjacent sections
    pub fn neighbors(&self) -> [SectionPos; 6] {
        Face::ALL.map(|face| self.neighbor(face))
    }

    /// Storage region this section belongs to
    pub fn region(&self) -> RegionPos {
        RegionPos {
            x: self.pos.x >> REGION_SHIFT,
            z: self.pos.z >> REGION_SHIFT,
        }
    }
}

/// Cell position inside a section, packed as [z:4][y:4][x:4]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LocalPos(u16);

impl LocalPos {
    /// Create a local position
    ///
    /// # Panics
    /// Debug-panics if any axis is outside 0..16
    #[inline]
    pub fn new(x: u8, y: u8, z: u8) -> Self {
        debug_assert!(x < 16 && y < 16 && z < 16, "local position out of range");
        Self(x as u16 | (y as u16) << 4 | (z as u16) << 8)
    }

    /// Local position of a world cell within its section
    #[inline]
    pub fn from_cell(cell: IVec3) -> Self {
        let local = cell & IVec3::splat(SECTION_SIZE - 1);
        Self::new(local.x as u8, local.y as u8, local.z as u8)
    }

    /// Create from a vector already known to be in 0..16 on every axis
    #[inline]
    pub fn from_ivec3(v: IVec3) -> Option<Self> {
        let in_range = |c: i32| (0..SECTION_SIZE).contains(&c);
        (in_range(v.x) && in_range(v.y) && in_range(v.z))
            .then(|| Self::new(v.x as u8, v.y as u8, v.z as u8))
    }

    /// Rebuild from a dense array index
    #[inline]
    pub fn from_index(index: usize) -> Self {
        debug_assert!(index < SECTION_VOLUME);
        Self(index as u16)
    }

    /// Dense array index in 0..4096
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw 12-bit packed value
    #[inline]
    pub fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn x(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    #[inline]
    pub fn y(self) -> u8 {
        ((self.0 >> 4) & 0xF) as u8
    }

    #[inline]
    pub fn z(self) -> u8 {
        ((self.0 >> 8) & 0xF) as u8
    }

    #[inline]
    pub fn as_ivec3(self) -> IVec3 {
        IVec3::new(self.x() as i32, self.y() as i32, self.z() as i32)
    }

    /// Faces of the section this cell touches
    pub fn boundary_faces(self) -> impl Iterator<Item = Face> {
        let p = self.as_ivec3();
        Face::iter().filter(move |face| {
            let coord = p[face.axis()];
            if face.normal()[face.axis()] > 0 {
                coord == SECTION_SIZE - 1
            } else {
                coord == 0
            }
        })
    }

    /// Iterate every local position in index order
    pub fn all() -> impl Iterator<Item = LocalPos> {
        (0..SECTION_VOLUME).map(LocalPos::from_index)
    }
}

impl From<LocalPos> for u16 {
    fn from(value: LocalPos) -> Self {
        value.0
    }
}

/// Identifies a storage region: a 32×32 column of sections spanning all heights
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Whether the section is stored in this region
    pub fn contains(&self, section: SectionPos) -> bool {
        section.region() == *self
    }
}
