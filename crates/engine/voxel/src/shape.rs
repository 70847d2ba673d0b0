//! Collision shapes of individual cells
//!
//! Blocks that look different but collide identically (stone, dirt, planks)
//! share one interned [`ShapeId`]. Ids depend on registration order; anything
//! persisted keys on [`CollisionShape::geometry_words`] instead.

use glam::Vec3;
use std::collections::HashMap;

/// Axis-aligned box inside a unit cell, in [0,1]³ cell space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl CellBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// The full unit cube
    pub fn unit() -> Self {
        Self::new(Vec3::ZERO, Vec3::ONE)
    }

    /// Whether the box encloses a non-zero volume
    pub fn has_volume(&self) -> bool {
        let extent = self.max - self.min;
        extent.x > 0.0 && extent.y > 0.0 && extent.z > 0.0
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Bit pattern used for interning; boxes compare by exact float bits
    fn key(&self) -> [u32; 6] {
        [
            self.min.x.to_bits(),
            self.min.y.to_bits(),
            self.min.z.to_bits(),
            self.max.x.to_bits(),
            self.max.y.to_bits(),
            self.max.z.to_bits(),
        ]
    }
}

/// Effective collision geometry of a cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CollisionShape {
    /// No collision (air, flowers, torches)
    #[default]
    Empty,
    /// The whole unit cube
    Full,
    /// One or more boxes inside the cell (slabs, fences, stairs)
    Boxes(Vec<CellBox>),
}

impl CollisionShape {
    /// Normalize degenerate box lists: no boxes is `Empty`, a single unit box is `Full`
    pub fn normalized(self) -> Self {
        match self {
            CollisionShape::Boxes(boxes) => {
                let boxes: Vec<CellBox> = boxes.into_iter().filter(CellBox::has_volume).collect();
                if boxes.is_empty() {
                    CollisionShape::Empty
                } else if boxes.len() == 1 && boxes[0] == CellBox::unit() {
                    CollisionShape::Full
                } else {
                    CollisionShape::Boxes(boxes)
                }
            }
            other => other,
        }
    }

    /// Stable encoding of the geometry, independent of any table's ids
    ///
    /// `Empty` is `[0]`, `Full` is `[1]`, a box list is `[2, count]` followed
    /// by the six float bit patterns of each box.
    pub fn geometry_words(&self) -> Vec<u32> {
        match self {
            CollisionShape::Empty => vec![0],
            CollisionShape::Full => vec![1],
            CollisionShape::Boxes(boxes) => {
                let mut words = Vec::with_capacity(2 + boxes.len() * 6);
                words.push(2);
                words.push(boxes.len() as u32);
                for b in boxes {
                    words.extend_from_slice(&b.key());
                }
                words
            }
        }
    }

    fn key(&self) -> ShapeKey {
        match self {
            CollisionShape::Empty => ShapeKey::Empty,
            CollisionShape::Full => ShapeKey::Full,
            CollisionShape::Boxes(boxes) => ShapeKey::Boxes(boxes.iter().map(CellBox::key).collect()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ShapeKey {
    Empty,
    Full,
    Boxes(Vec<[u32; 6]>),
}

/// Interned collision shape descriptor
///
/// Opaque outside this crate apart from the two well-known ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeId(u16);

impl ShapeId {
    /// No collision geometry
    pub const EMPTY: ShapeId = ShapeId(0);
    /// Full unit cube
    pub const FULL: ShapeId = ShapeId(1);

    /// Raw descriptor value
    #[inline]
    pub fn raw(self) -> u16 {
        self.0
    }

    /// Rebuild from a raw descriptor value
    #[inline]
    pub fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}

static EMPTY_SHAPE: CollisionShape = CollisionShape::Empty;

/// Table of interned collision shapes
#[derive(Debug, Clone)]
pub struct ShapeTable {
    shapes: Vec<CollisionShape>,
    lookup: HashMap<ShapeKey, ShapeId>,
}

impl ShapeTable {
    /// Create a table holding the two built-in shapes
    pub fn new() -> Self {
        let mut table = Self {
            shapes: Vec::new(),
            lookup: HashMap::new(),
        };
        table.push(CollisionShape::Empty);
        table.push(CollisionShape::Full);
        table
    }

    fn push(&mut self, shape: CollisionShape) -> ShapeId {
        let id = ShapeId(self.shapes.len() as u16);
        self.lookup.insert(shape.key(), id);
        self.shapes.push(shape);
        id
    }

    /// Intern a shape, returning the id of an identical existing shape if any
    ///
    /// Returns `None` once the table holds `u16::MAX` shapes.
    pub fn intern(&mut self, shape: CollisionShape) -> Option<ShapeId> {
        let shape = shape.normalized();
        if let Some(&id) = self.lookup.get(&shape.key()) {
            return Some(id);
        }
        if self.shapes.len() >= u16::MAX as usize {
            return None;
        }
        Some(self.push(shape))
    }

    /// Look up a shape; unknown ids resolve to `Empty`
    pub fn get(&self, id: ShapeId) -> &CollisionShape {
        self.shapes
            .get(id.0 as usize)
            .unwrap_or(&EMPTY_SHAPE)
    }

    /// Whether cells of this shape take part in collision
    #[inline]
    pub fn is_collidable(&self, id: ShapeId) -> bool {
        !matches!(self.get(id), CollisionShape::Empty)
    }

    /// Whether cells of this shape fill their whole cell
    #[inline]
    pub fn is_full(&self, id: ShapeId) -> bool {
        matches!(self.get(id), CollisionShape::Full)
    }

    /// Number of interned shapes, built-ins included
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl Default for ShapeTable {
    fn default() -> Self {
        Self::new()
    }
}
