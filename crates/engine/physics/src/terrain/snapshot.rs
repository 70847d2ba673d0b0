//! Point-in-time capture of a section's collision-relevant content
//!
//! Captured on the world-owner thread; everything downstream (hashing, cache
//! and store lookups, meshing) works from the snapshot alone.

use glam::IVec3;
use voxel::{Face, LocalPos, SectionPos, ShapeId, WorldView, SECTION_SIZE};

/// Full-cube occupancy of the six neighbouring boundary layers
///
/// `layers[face.index()][v]` has bit `u` set when the neighbour cell at plane
/// coordinates `(u, v)` (see [`Face::project`]) is a full cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Halo {
    layers: [[u16; 16]; 6],
}

impl Halo {
    /// Every neighbour layer empty
    pub fn open() -> Self {
        Self::default()
    }

    /// Every neighbour layer fully solid
    pub fn solid() -> Self {
        Self {
            layers: [[u16::MAX; 16]; 6],
        }
    }

    #[inline]
    pub fn is_full(&self, face: Face, u: i32, v: i32) -> bool {
        self.layers[face.index()][v as usize] & (1 << u) != 0
    }

    #[inline]
    pub fn set(&mut self, face: Face, u: i32, v: i32, full: bool) {
        let row = &mut self.layers[face.index()][v as usize];
        if full {
            *row |= 1 << u;
        } else {
            *row &= !(1 << u);
        }
    }

    /// Clear one face's layer
    pub fn clear_face(&mut self, face: Face) {
        self.layers[face.index()] = [0; 16];
    }

    /// Raw rows in face order, used for hashing
    pub fn rows(&self) -> impl Iterator<Item = u16> + '_ {
        self.layers.iter().flatten().copied()
    }
}

/// Immutable capture of the collidable cells of one section
///
/// `coords` and `descriptors` are parallel arrays of equal length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSnapshot {
    section: SectionPos,
    coords: Box<[LocalPos]>,
    descriptors: Box<[ShapeId]>,
    halo: Halo,
}

impl SectionSnapshot {
    /// Capture a loaded section; `None` when the section is not loaded
    ///
    /// Two passes: the first counts collidable cells so both arrays are
    /// allocated exactly once.
    pub fn capture(world: &dyn WorldView, section: SectionPos) -> Option<Self> {
        let cells = world.section(section)?;
        let registry = world.registry();
        let shapes = registry.shapes();

        let count = cells
            .iter()
            .filter(|&(_, block)| shapes.is_collidable(registry.shape_of(block)))
            .count();

        let mut coords = Vec::with_capacity(count);
        let mut descriptors = Vec::with_capacity(count);
        for (local, block) in cells.iter() {
            let shape = registry.shape_of(block);
            if shapes.is_collidable(shape) {
                coords.push(local);
                descriptors.push(shape);
            }
        }

        Some(Self {
            section,
            coords: coords.into_boxed_slice(),
            descriptors: descriptors.into_boxed_slice(),
            halo: capture_halo(world, section),
        })
    }

    /// Assemble a snapshot from explicit cells
    pub fn from_cells(
        section: SectionPos,
        cells: impl IntoIterator<Item = (LocalPos, ShapeId)>,
        halo: Halo,
    ) -> Self {
        let (coords, descriptors): (Vec<_>, Vec<_>) = cells
            .into_iter()
            .filter(|&(_, shape)| shape != ShapeId::EMPTY)
            .unzip();
        Self {
            section,
            coords: coords.into_boxed_slice(),
            descriptors: descriptors.into_boxed_slice(),
            halo,
        }
    }

    pub fn section(&self) -> SectionPos {
        self.section
    }

    /// Number of collidable cells
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn coords(&self) -> &[LocalPos] {
        &self.coords
    }

    pub fn descriptors(&self) -> &[ShapeId] {
        &self.descriptors
    }

    pub fn halo(&self) -> &Halo {
        &self.halo
    }

    /// Iterate `(position, descriptor)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (LocalPos, ShapeId)> + '_ {
        self.coords
            .iter()
            .copied()
            .zip(self.descriptors.iter().copied())
    }
}

fn capture_halo(world: &dyn WorldView, section: SectionPos) -> Halo {
    let mut halo = Halo::open();
    let registry = world.registry();
    let shapes = registry.shapes();

    for face in Face::iter() {
        let neighbor = section.neighbor(face);
        if !world.is_within_vertical_bounds(neighbor) {
            continue;
        }
        // Unloaded neighbours contribute an open layer
        let Some(cells) = world.section(neighbor) else {
            continue;
        };

        // Layer of the neighbour touching our boundary
        let depth = if face.normal()[face.axis()] > 0 {
            0
        } else {
            SECTION_SIZE - 1
        };
        for v in 0..SECTION_SIZE {
            for u in 0..SECTION_SIZE {
                let p: IVec3 = face.unproject(u, v, depth);
                let local = LocalPos::new(p.x as u8, p.y as u8, p.z as u8);
                if shapes.is_full(registry.shape_of(cells.get(local))) {
                    halo.set(face, u, v, true);
                }
            }
        }
    }
    halo
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::sync::Arc;
    use voxel::{BlockId, BlockRegistry, CellBox, CollisionShape, SectionCells, VoxelWorld};

    struct Blocks {
        stone: BlockId,
        flower: BlockId,
        slab: BlockId,
    }

    fn world() -> (VoxelWorld, Blocks) {
        let mut registry = BlockRegistry::new();
        let blocks = Blocks {
            stone: registry.register("stone", CollisionShape::Full).unwrap(),
            flower: registry.register("flower", CollisionShape::Empty).unwrap(),
            slab: registry
                .register(
                    "slab",
                    CollisionShape::Boxes(vec![CellBox::new(Vec3::ZERO, Vec3::new(1.0, 0.5, 1.0))]),
                )
                .unwrap(),
        };
        (VoxelWorld::new(Arc::new(registry), -4, 4), blocks)
    }

    #[test]
    fn test_unloaded_section_has_no_snapshot() {
        let (world, _) = world();
        assert!(SectionSnapshot::capture(&world, SectionPos::new(0, 0, 0)).is_none());
    }

    #[test]
    fn test_capture_skips_air_and_decorations() {
        let (mut world, blocks) = world();
        let pos = SectionPos::new(0, 0, 0);
        world.insert_section(pos, SectionCells::empty());
        world.set_block(IVec3::new(1, 1, 1), blocks.stone);
        world.set_block(IVec3::new(2, 1, 1), blocks.flower);
        world.set_block(IVec3::new(3, 1, 1), blocks.slab);

        let snapshot = SectionSnapshot::capture(&world, pos).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.coords().len(), snapshot.descriptors().len());
        assert_eq!(snapshot.coords()[0], LocalPos::new(1, 1, 1));
        assert_eq!(snapshot.descriptors()[0], ShapeId::FULL);
        assert_ne!(snapshot.descriptors()[1], ShapeId::FULL);
    }

    #[test]
    fn test_empty_section_snapshot() {
        let (mut world, blocks) = world();
        let pos = SectionPos::new(0, 0, 0);
        world.insert_section(pos, SectionCells::filled(blocks.flower));
        let snapshot = SectionSnapshot::capture(&world, pos).unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_halo_reads_adjacent_layer() {
        let (mut world, blocks) = world();
        let pos = SectionPos::new(0, 0, 0);
        world.insert_section(pos, SectionCells::empty());
        world.insert_section(pos.neighbor(Face::Right), SectionCells::empty());
        world.insert_section(pos.neighbor(Face::Bottom), SectionCells::empty());

        // Adjacent layer of the +X neighbour is its x = 0 plane
        world.set_block(IVec3::new(16, 4, 9), blocks.stone);
        // Not adjacent: x = 1
        world.set_block(IVec3::new(17, 5, 9), blocks.stone);
        // Slabs are not full cubes
        world.set_block(IVec3::new(16, 6, 9), blocks.slab);
        // Adjacent layer of the -Y neighbour is its y = 15 plane
        world.set_block(IVec3::new(2, -1, 3), blocks.stone);

        let snapshot = SectionSnapshot::capture(&world, pos).unwrap();
        let halo = snapshot.halo();
        assert!(halo.is_full(Face::Right, 4, 9));
        assert!(!halo.is_full(Face::Right, 5, 9));
        assert!(!halo.is_full(Face::Right, 6, 9));
        assert!(halo.is_full(Face::Bottom, 2, 3));
        assert_eq!(halo.rows().filter(|&row| row != 0).count(), 2);
    }

    #[test]
    fn test_halo_set_and_clear() {
        let mut halo = Halo::solid();
        halo.clear_face(Face::Top);
        assert!(!halo.is_full(Face::Top, 0, 0));
        assert!(halo.is_full(Face::Bottom, 15, 15));

        halo.set(Face::Bottom, 3, 4, false);
        assert!(!halo.is_full(Face::Bottom, 3, 4));
    }

    #[test]
    fn test_from_cells_drops_empty_descriptors() {
        let snapshot = SectionSnapshot::from_cells(
            SectionPos::new(0, 0, 0),
            [
                (LocalPos::new(0, 0, 0), ShapeId::FULL),
                (LocalPos::new(1, 0, 0), ShapeId::EMPTY),
            ],
            Halo::open(),
        );
        assert_eq!(snapshot.len(), 1);
    }
}
