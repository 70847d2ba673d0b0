//! Voxel world model
//!
//! Sections of 16³ cells, a block registry with interned collision shapes, and
//! the listener seam through which collision consumers follow world changes.

mod block;
mod face;
mod section;
mod shape;
mod world;

pub use block::{BlockId, BlockInfo, BlockRegistry, RegistryError};
pub use face::Face;
pub use section::{
    LocalPos, RegionPos, SectionPos, REGION_SHIFT, REGION_SIZE, SECTION_SHIFT, SECTION_SIZE,
    SECTION_VOLUME,
};
pub use shape::{CellBox, CollisionShape, ShapeId, ShapeTable};
pub use world::{CellChange, SectionCells, VoxelWorld, WorldListener, WorldView};

// Re-export for convenience
pub use glam;
