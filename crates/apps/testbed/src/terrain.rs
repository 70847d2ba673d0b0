//! Procedural terrain for the testbed

use crate::config::WorldConfig;
use anyhow::Context;
use glam::{IVec3, Vec3};
use noise::{Fbm, NoiseFn, Perlin};
use voxel::{BlockId, BlockRegistry, CellBox, CollisionShape, SectionCells, SectionPos};

/// Blocks used by the generator
#[derive(Debug, Clone, Copy)]
pub struct Blocks {
    pub stone: BlockId,
    pub dirt: BlockId,
    pub grass: BlockId,
    pub slab: BlockId,
    pub flower: BlockId,
}

impl Blocks {
    pub fn register(registry: &mut BlockRegistry) -> anyhow::Result<Self> {
        let half = CollisionShape::Boxes(vec![CellBox::new(Vec3::ZERO, Vec3::new(1.0, 0.5, 1.0))]);
        let mut register = |name: &str, shape: CollisionShape| {
            registry
                .register(name, shape)
                .with_context(|| format!("registering block {name}"))
        };
        Ok(Self {
            stone: register("stone", CollisionShape::Full)?,
            dirt: register("dirt", CollisionShape::Full)?,
            grass: register("grass", CollisionShape::Full)?,
            slab: register("slab", half)?,
            flower: register("flower", CollisionShape::Empty)?,
        })
    }
}

/// Heightmap terrain: stone below, dirt and grass on top, scattered slabs and flowers
pub struct TerrainGenerator {
    height: Fbm<Perlin>,
    detail: Perlin,
    base_height: f64,
    height_scale: f64,
    blocks: Blocks,
}

impl TerrainGenerator {
    pub fn new(config: &WorldConfig, blocks: Blocks) -> Self {
        Self {
            height: Fbm::new(config.seed),
            detail: Perlin::new(config.seed.wrapping_add(1)),
            base_height: config.base_height,
            height_scale: config.height_scale,
            blocks,
        }
    }

    pub fn blocks(&self) -> Blocks {
        self.blocks
    }

    /// Surface height of a column; cells below it are solid
    pub fn surface_height(&self, x: i32, z: i32) -> i32 {
        let value = self.height.get([x as f64 * 0.02, z as f64 * 0.02]);
        (self.base_height + value * self.height_scale).floor() as i32
    }

    pub fn block_at(&self, cell: IVec3) -> BlockId {
        let surface = self.surface_height(cell.x, cell.z);
        let depth = surface - cell.y;
        match depth {
            d if d > 3 => self.blocks.stone,
            d if d > 0 => self.blocks.dirt,
            0 => self.blocks.grass,
            -1 => {
                let scatter = self.detail.get([cell.x as f64 * 0.7, cell.z as f64 * 0.7]);
                if scatter > 0.45 {
                    self.blocks.slab
                } else if scatter < -0.5 {
                    self.blocks.flower
                } else {
                    BlockId::AIR
                }
            }
            _ => BlockId::AIR,
        }
    }

    pub fn section(&self, section: SectionPos) -> SectionCells {
        let origin = section.min_cell();
        SectionCells::from_fn(|local| self.block_at(origin + local.as_ivec3()))
    }
}
