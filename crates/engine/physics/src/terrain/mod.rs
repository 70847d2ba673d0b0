//! Section-level terrain collision
//!
//! Everything needed to turn a captured section into a shareable collision
//! shape, independent of how the work is scheduled.
//!
//! # Architecture
//!
//! - [`SectionSnapshot`]: immutable capture of a section's collidable cells plus its halo
//! - [`content_hash`]: order-independent [`ContentHash`] of a snapshot
//! - [`generate`] / [`collision_boxes`]: boundary-face extraction
//! - [`CollisionMesh`]: rapier shape shared through [`MeshRef`]
//! - [`ShapeCache`]: concurrent content-hash → mesh map
//! - [`ActivityTracker`]: which sections are near dynamic bodies

mod activity;
mod cache;
mod hash;
mod mesh;
mod mesher;
mod snapshot;

pub use activity::{section_aabb, ActivityTracker};
pub use cache::ShapeCache;
pub use hash::{content_hash, ContentHash};
pub use mesh::{CollisionMesh, MeshKind, MeshRef};
pub use mesher::{collision_boxes, generate, CollisionBox, SectionMesh};
pub use snapshot::{Halo, SectionSnapshot};
