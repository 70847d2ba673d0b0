//! In-memory voxel world and the notification seam used by collision consumers
//!
//! [`VoxelWorld`] owns the loaded sections. Consumers read it through
//! [`WorldView`] and are told about changes through [`WorldListener`].

use crate::block::{BlockId, BlockRegistry};
use crate::section::{LocalPos, SectionPos, SECTION_VOLUME};
use glam::IVec3;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Dense block storage of one section, indexed by [`LocalPos::index`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionCells {
    blocks: Box<[BlockId]>,
}

impl SectionCells {
    /// Section with every cell set to `block`
    pub fn filled(block: BlockId) -> Self {
        Self {
            blocks: vec![block; SECTION_VOLUME].into_boxed_slice(),
        }
    }

    /// Section of air
    pub fn empty() -> Self {
        Self::filled(BlockId::AIR)
    }

    /// Build a section by evaluating `f` for every local position
    pub fn from_fn(mut f: impl FnMut(LocalPos) -> BlockId) -> Self {
        Self {
            blocks: LocalPos::all().map(&mut f).collect(),
        }
    }

    #[inline]
    pub fn get(&self, local: LocalPos) -> BlockId {
        self.blocks[local.index()]
    }

    /// Set a cell, returning the previous block
    #[inline]
    pub fn set(&mut self, local: LocalPos, block: BlockId) -> BlockId {
        std::mem::replace(&mut self.blocks[local.index()], block)
    }

    /// Whether every cell is air
    pub fn is_air(&self) -> bool {
        self.blocks.iter().all(|b| b.is_air())
    }

    /// Iterate `(position, block)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (LocalPos, BlockId)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, &b)| (LocalPos::from_index(i), b))
    }
}

impl Default for SectionCells {
    fn default() -> Self {
        Self::empty()
    }
}

/// A single cell edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellChange {
    /// World cell coordinate
    pub cell: IVec3,
    pub old: BlockId,
    pub new: BlockId,
}

impl CellChange {
    pub fn section(&self) -> SectionPos {
        SectionPos::from_cell(self.cell)
    }

    pub fn local(&self) -> LocalPos {
        LocalPos::from_cell(self.cell)
    }
}

/// Read access to the loaded world
pub trait WorldView {
    /// Cells of a loaded section, `None` when not loaded
    fn section(&self, pos: SectionPos) -> Option<&SectionCells>;

    fn registry(&self) -> &BlockRegistry;

    /// Whether the section lies within the world's vertical extent
    fn is_within_vertical_bounds(&self, pos: SectionPos) -> bool;
}

/// Receives world change notifications on the world-owner thread
pub trait WorldListener {
    fn on_section_loaded(&mut self, world: &dyn WorldView, section: SectionPos);

    fn on_section_unloaded(&mut self, world: &dyn WorldView, section: SectionPos);

    fn on_cell_changed(&mut self, world: &dyn WorldView, change: &CellChange);
}

/// Loaded sections of a world with a fixed vertical extent
#[derive(Debug, Clone)]
pub struct VoxelWorld {
    sections: HashMap<SectionPos, SectionCells>,
    registry: Arc<BlockRegistry>,
    min_section_y: i32,
    max_section_y: i32,
}

impl VoxelWorld {
    /// Create an empty world spanning section heights `min_section_y..=max_section_y`
    pub fn new(registry: Arc<BlockRegistry>, min_section_y: i32, max_section_y: i32) -> Self {
        Self {
            sections: HashMap::new(),
            registry,
            min_section_y,
            max_section_y,
        }
    }

    pub fn registry_handle(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub fn is_loaded(&self, pos: SectionPos) -> bool {
        self.sections.contains_key(&pos)
    }

    /// Number of loaded sections
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Positions of every loaded section
    pub fn loaded_sections(&self) -> impl Iterator<Item = SectionPos> + '_ {
        self.sections.keys().copied()
    }

    /// Store a section without notifying anyone, returning the replaced one
    pub fn insert_section(&mut self, pos: SectionPos, cells: SectionCells) -> Option<SectionCells> {
        self.sections.insert(pos, cells)
    }

    /// Drop a section without notifying anyone
    pub fn remove_section(&mut self, pos: SectionPos) -> Option<SectionCells> {
        self.sections.remove(&pos)
    }

    /// Block at a world cell; unloaded cells read as air
    pub fn block(&self, cell: IVec3) -> BlockId {
        self.sections
            .get(&SectionPos::from_cell(cell))
            .map(|cells| cells.get(LocalPos::from_cell(cell)))
            .unwrap_or(BlockId::AIR)
    }

    /// Set a block without notifying anyone
    ///
    /// Returns `None` when the section is not loaded or the block is unchanged.
    pub fn set_block(&mut self, cell: IVec3, block: BlockId) -> Option<CellChange> {
        let cells = self.sections.get_mut(&SectionPos::from_cell(cell))?;
        let old = cells.set(LocalPos::from_cell(cell), block);
        if old == block {
            return None;
        }
        Some(CellChange {
            cell,
            old,
            new: block,
        })
    }

    /// Insert a section and notify the listener
    pub fn load_section(
        &mut self,
        pos: SectionPos,
        cells: SectionCells,
        listener: &mut dyn WorldListener,
    ) {
        trace!(?pos, "section loaded");
        self.sections.insert(pos, cells);
        listener.on_section_loaded(&*self, pos);
    }

    /// Remove a section and notify the listener
    ///
    /// The listener runs after removal, so the view no longer contains the section.
    pub fn unload_section(
        &mut self,
        pos: SectionPos,
        listener: &mut dyn WorldListener,
    ) -> Option<SectionCells> {
        let cells = self.sections.remove(&pos)?;
        trace!(?pos, "section unloaded");
        listener.on_section_unloaded(&*self, pos);
        Some(cells)
    }

    /// Set a block and notify the listener if anything changed
    pub fn edit_block(
        &mut self,
        cell: IVec3,
        block: BlockId,
        listener: &mut dyn WorldListener,
    ) -> Option<CellChange> {
        let change = self.set_block(cell, block)?;
        listener.on_cell_changed(&*self, &change);
        Some(change)
    }
}

impl WorldView for VoxelWorld {
    fn section(&self, pos: SectionPos) -> Option<&SectionCells> {
        self.sections.get(&pos)
    }

    fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    fn is_within_vertical_bounds(&self, pos: SectionPos) -> bool {
        (self.min_section_y..=self.max_section_y).contains(&pos.pos.y)
    }
}
