//! Terrain collision streaming
//!
//! Turns voxel sections into rapier colliders off the simulation thread,
//! caches and persists the results, and keeps bodies consistent with world
//! edits and streaming.

mod collider;
mod command;
mod config;
mod error;
mod lifecycle;
mod pipeline;
mod simulation;
pub mod store;
pub mod terrain;
mod worker;
mod world;

pub use collider::{ColliderState, SectionCollider};
pub use command::{
    command_queue, BodyAllocator, BodyHandle, BodyMutator, CommandExecutor, CommandReceiver,
    CommandSender, PhysicsCommand,
};
pub use config::PipelineConfig;
pub use error::{MeshError, PipelineError, Result, StoreError};
pub use lifecycle::{ColliderLifecycleManager, PipelineStats};
pub use pipeline::TerrainPipeline;
pub use simulation::TerrainSimulation;
pub use store::RegionStore;
pub use worker::{process, JobOutcome, JobResult, MeshJob, MeshSource, WorkerContext, WorkerPool};
pub use world::PhysicsWorld;

// Re-export for convenience
pub use glam;
pub use rapier3d;
pub use voxel;
