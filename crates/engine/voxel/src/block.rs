//! Block registry
//!
//! Maps block ids to names and interned collision shapes.

use crate::shape::{CollisionShape, ShapeId, ShapeTable};
use std::collections::HashMap;
use thiserror::Error;

/// Block type stored in a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockId(pub u16);

impl BlockId {
    /// Void / air; never collidable
    pub const AIR: BlockId = BlockId(0);

    #[inline]
    pub fn is_air(self) -> bool {
        self == Self::AIR
    }
}

/// Errors that can occur while registering blocks
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Block name already registered
    #[error("Duplicate block name: {0}")]
    DuplicateName(String),

    /// All block ids are taken
    #[error("Block id space exhausted")]
    BlocksExhausted,

    /// All shape ids are taken
    #[error("Collision shape table full")]
    ShapesExhausted,
}

/// Static information about a registered block
#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub name: String,
    pub shape: ShapeId,
}

/// Registry of block types and their collision shapes
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    blocks: Vec<BlockInfo>,
    by_name: HashMap<String, BlockId>,
    shapes: ShapeTable,
}

impl BlockRegistry {
    /// Create a registry containing only air
    pub fn new() -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("air".to_string(), BlockId::AIR);
        Self {
            blocks: vec![BlockInfo {
                name: "air".to_string(),
                shape: ShapeId::EMPTY,
            }],
            by_name,
            shapes: ShapeTable::new(),
        }
    }

    /// Register a block with the given collision shape
    pub fn register(
        &mut self,
        name: impl Into<String>,
        shape: CollisionShape,
    ) -> Result<BlockId, RegistryError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        if self.blocks.len() >= u16::MAX as usize {
            return Err(RegistryError::BlocksExhausted);
        }

        let shape = self
            .shapes
            .intern(shape)
            .ok_or(RegistryError::ShapesExhausted)?;
        let id = BlockId(self.blocks.len() as u16);
        self.blocks.push(BlockInfo {
            name: name.clone(),
            shape,
        });
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Look up a block by name
    pub fn id(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    pub fn info(&self, block: BlockId) -> Option<&BlockInfo> {
        self.blocks.get(block.0 as usize)
    }

    /// Collision shape of a block; air and unknown ids have none
    #[inline]
    pub fn shape_of(&self, block: BlockId) -> ShapeId {
        if block.is_air() {
            return ShapeId::EMPTY;
        }
        self.blocks
            .get(block.0 as usize)
            .map(|info| info.shape)
            .unwrap_or(ShapeId::EMPTY)
    }

    /// Whether a cell holding this block takes part in collision
    #[inline]
    pub fn is_collidable(&self, block: BlockId) -> bool {
        self.shapes.is_collidable(self.shape_of(block))
    }

    pub fn shapes(&self) -> &ShapeTable {
        &self.shapes
    }

    /// Number of registered blocks, air included
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
