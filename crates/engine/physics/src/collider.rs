use crate::command::BodyHandle;
use crate::terrain::{ContentHash, MeshRef};
use voxel::SectionPos;

/// Lifecycle state of a section collider
///
/// ```text
/// Unloaded → Placeholder → Generating → ReadyActive ⇄ ReadyInactive
///                              ↑              │
///                              └──── edit ────┘
/// ```
/// Unloading returns any state to `Unloaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderState {
    Unloaded,
    /// Body exists with the oversized placeholder cuboid
    Placeholder,
    /// Work in flight; the placeholder or previous shape stays installed
    Generating,
    /// Final geometry installed, dynamic bodies nearby
    ReadyActive,
    /// Final geometry installed (or none needed), nothing nearby
    ReadyInactive,
}

impl ColliderState {
    pub fn is_ready(self) -> bool {
        matches!(self, ColliderState::ReadyActive | ColliderState::ReadyInactive)
    }

    /// Ready state for the given activity
    pub fn ready(active: bool) -> Self {
        if active {
            ColliderState::ReadyActive
        } else {
            ColliderState::ReadyInactive
        }
    }
}

/// Per-section collision record owned by the lifecycle manager
#[derive(Debug, Clone)]
pub struct SectionCollider {
    pub(crate) section: SectionPos,
    pub(crate) body: Option<BodyHandle>,
    pub(crate) mesh: Option<MeshRef>,
    pub(crate) installed_hash: Option<ContentHash>,
    pub(crate) state: ColliderState,
    pub(crate) generation: u64,
}

impl SectionCollider {
    pub(crate) fn new(section: SectionPos) -> Self {
        Self {
            section,
            body: None,
            mesh: None,
            installed_hash: None,
            state: ColliderState::Unloaded,
            generation: 0,
        }
    }

    pub fn section(&self) -> SectionPos {
        self.section
    }

    /// Simulation body, absent for sections without exposed geometry
    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    /// Currently installed mesh; `None` while on the placeholder or when empty
    pub fn mesh(&self) -> Option<&MeshRef> {
        self.mesh.as_ref()
    }

    /// Content hash of the geometry last made current
    pub fn installed_hash(&self) -> Option<ContentHash> {
        self.installed_hash
    }

    pub fn state(&self) -> ColliderState {
        self.state
    }

    /// Tag of the most recent dispatch
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
