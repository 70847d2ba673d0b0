//! Boundary-face extraction from section snapshots
//!
//! Only faces between a solid cell and a non-solid neighbour are emitted, so
//! the interior of solid terrain contributes no triangles. Neighbours outside
//! the section are looked up in the snapshot's halo. Coordinates are local to
//! the section origin.

use super::snapshot::{Halo, SectionSnapshot};
use glam::{IVec3, Vec3};
use std::collections::HashMap;
use voxel::{CellBox, CollisionShape, Face, ShapeTable, SECTION_SIZE};

/// Triangle mesh of one section in section-local coordinates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionMesh {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
}

impl SectionMesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Axis-aligned box in section-local coordinates
///
/// The persisted geometry form: one record per box in region files.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionBox {
    pub center: Vec3,
    pub half_extent: Vec3,
}

impl CollisionBox {
    pub fn new(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            center,
            half_extent,
        }
    }

    /// Unit box of the cell at `cell`
    pub fn cell(cell: IVec3) -> Self {
        Self::new(cell.as_vec3() + Vec3::splat(0.5), Vec3::splat(0.5))
    }

    /// A box of a partial cell shape placed at `cell`
    pub fn from_cell_box(cell: IVec3, cell_box: &CellBox) -> Self {
        Self::new(cell.as_vec3() + cell_box.center(), cell_box.half_extents())
    }
}

/// Full-cube occupancy of a section: bit `x` of `rows[z * 16 + y]`
struct OccupancyGrid<'a> {
    rows: [u16; 256],
    halo: &'a Halo,
}

impl<'a> OccupancyGrid<'a> {
    fn build(snapshot: &'a SectionSnapshot, shapes: &ShapeTable) -> Self {
        let mut rows = [0u16; 256];
        for (local, shape) in snapshot.iter() {
            if shapes.is_full(shape) {
                rows[local.z() as usize * 16 + local.y() as usize] |= 1 << local.x();
            }
        }
        Self {
            rows,
            halo: snapshot.halo(),
        }
    }

    /// Whether the cell at `p` is a full cube; `p` may be one step outside the section
    fn is_full(&self, p: IVec3) -> bool {
        let inside = |c: i32| (0..SECTION_SIZE).contains(&c);
        if inside(p.x) && inside(p.y) && inside(p.z) {
            return self.rows[(p.z * 16 + p.y) as usize] & (1 << p.x) != 0;
        }

        // Outside on exactly one axis: ask the halo of that face
        for face in Face::iter() {
            let axis = face.axis();
            let outward = face.normal()[axis] > 0;
            if (outward && p[axis] == SECTION_SIZE) || (!outward && p[axis] == -1) {
                let (u, v) = face.project(p);
                if inside(u) && inside(v) {
                    return self.halo.is_full(face, u, v);
                }
            }
        }
        false
    }

    fn is_exposed(&self, cell: IVec3, face: Face) -> bool {
        !self.is_full(cell + face.normal())
    }
}

/// Accumulates quads, sharing vertices by exact position
#[derive(Default)]
struct MeshBuilder {
    vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
    lookup: HashMap<[u32; 3], u32>,
}

impl MeshBuilder {
    fn vertex(&mut self, v: Vec3) -> u32 {
        let key = [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()];
        let vertices = &mut self.vertices;
        *self.lookup.entry(key).or_insert_with(|| {
            vertices.push(v);
            (vertices.len() - 1) as u32
        })
    }

    /// Split a counter-clockwise quad into (0,1,2) and (0,2,3)
    fn quad(&mut self, corners: [Vec3; 4]) {
        let [a, b, c, d] = corners.map(|v| self.vertex(v));
        self.indices.push([a, b, c]);
        self.indices.push([a, c, d]);
    }

    fn finish(self) -> Option<SectionMesh> {
        if self.indices.is_empty() {
            return None;
        }
        Some(SectionMesh {
            vertices: self.vertices,
            indices: self.indices,
        })
    }
}

/// Build the collision mesh of a snapshot
///
/// Full cubes emit one quad per exposed face. Cells with a box-list shape emit
/// all six faces of each box. Returns `None` when nothing is exposed.
pub fn generate(snapshot: &SectionSnapshot, shapes: &ShapeTable) -> Option<SectionMesh> {
    let grid = OccupancyGrid::build(snapshot, shapes);
    let mut builder = MeshBuilder::default();

    for (local, shape) in snapshot.iter() {
        let cell = local.as_ivec3();
        match shapes.get(shape) {
            CollisionShape::Empty => {}
            CollisionShape::Full => {
                let min = cell.as_vec3();
                let max = min + Vec3::ONE;
                for face in Face::iter() {
                    if grid.is_exposed(cell, face) {
                        builder.quad(face.box_vertices(min, max));
                    }
                }
            }
            CollisionShape::Boxes(boxes) => {
                let origin = cell.as_vec3();
                for cell_box in boxes {
                    let min = origin + cell_box.min;
                    let max = origin + cell_box.max;
                    for face in Face::iter() {
                        builder.quad(face.box_vertices(min, max));
                    }
                }
            }
        }
    }

    builder.finish()
}

/// Derive the compound-box form of a snapshot
///
/// One unit box per full cube with at least one exposed face, plus every box
/// of box-list cells.
pub fn collision_boxes(snapshot: &SectionSnapshot, shapes: &ShapeTable) -> Vec<CollisionBox> {
    let grid = OccupancyGrid::build(snapshot, shapes);
    let mut boxes = Vec::new();

    for (local, shape) in snapshot.iter() {
        let cell = local.as_ivec3();
        match shapes.get(shape) {
            CollisionShape::Empty => {}
            CollisionShape::Full => {
                if Face::iter().any(|face| grid.is_exposed(cell, face)) {
                    boxes.push(CollisionBox::cell(cell));
                }
            }
            CollisionShape::Boxes(cell_boxes) => {
                boxes.extend(
                    cell_boxes
                        .iter()
                        .map(|cell_box| CollisionBox::from_cell_box(cell, cell_box)),
                );
            }
        }
    }

    boxes
}
