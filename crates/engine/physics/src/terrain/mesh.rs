//! Engine-native collision shapes built from section geometry

use super::hash::ContentHash;
use super::mesher::{CollisionBox, SectionMesh};
use crate::error::MeshError;
use rapier3d::prelude::*;
use std::fmt;
use std::sync::Arc;

/// Shared reference to an installed or cached mesh
pub type MeshRef = Arc<CollisionMesh>;

/// How a [`CollisionMesh`] was assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    /// Freshly generated boundary triangles
    TriMesh { triangles: usize },
    /// Compound of cuboids restored from the region store
    Boxes { count: usize },
}

/// Collision shape of one section, in section-local coordinates
pub struct CollisionMesh {
    shape: SharedShape,
    kind: MeshKind,
    content_hash: ContentHash,
}

impl CollisionMesh {
    /// Build a triangle mesh shape
    ///
    /// Fails when rapier rejects the mesh as degenerate.
    pub fn from_mesh(mesh: &SectionMesh, content_hash: ContentHash) -> Result<Self, MeshError> {
        if mesh.is_empty() {
            return Err(MeshError::Empty);
        }

        let vertices: Vec<Point<Real>> = mesh
            .vertices
            .iter()
            .map(|v| point![v.x, v.y, v.z])
            .collect();
        let shape = SharedShape::trimesh(vertices, mesh.indices.clone())
            .map_err(|err| MeshError::Degenerate(format!("{err:?}")))?;

        Ok(Self {
            shape,
            kind: MeshKind::TriMesh {
                triangles: mesh.triangle_count(),
            },
            content_hash,
        })
    }

    /// Build a compound shape of cuboids
    pub fn from_boxes(boxes: &[CollisionBox], content_hash: ContentHash) -> Result<Self, MeshError> {
        if boxes.is_empty() {
            return Err(MeshError::Empty);
        }

        let parts: Vec<(Isometry<Real>, SharedShape)> = boxes
            .iter()
            .map(|b| {
                (
                    Isometry::translation(b.center.x, b.center.y, b.center.z),
                    SharedShape::cuboid(b.half_extent.x, b.half_extent.y, b.half_extent.z),
                )
            })
            .collect();

        Ok(Self {
            shape: SharedShape::compound(parts),
            kind: MeshKind::Boxes { count: boxes.len() },
            content_hash,
        })
    }

    pub fn shape(&self) -> &SharedShape {
        &self.shape
    }

    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    pub fn content_hash(&self) -> ContentHash {
        self.content_hash
    }
}

impl fmt::Debug for CollisionMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollisionMesh")
            .field("kind", &self.kind)
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}
