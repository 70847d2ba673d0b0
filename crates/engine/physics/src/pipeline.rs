//! Top-level wiring of the terrain collider pipeline
//!
//! One [`TerrainPipeline`] per physics world. It owns the shared services,
//! listens to the host world, and hands simulation commands to whoever drains
//! [`TerrainPipeline::commands`].

use crate::collider::{ColliderState, SectionCollider};
use crate::command::{command_queue, CommandReceiver};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::lifecycle::{ColliderLifecycleManager, PipelineStats};
use crate::store::RegionStore;
use crate::terrain::{ActivityTracker, ShapeCache};
use crate::worker::{JobResult, MeshJob, WorkerContext, WorkerPool};
use crossbeam_channel::RecvTimeoutError;
use rapier3d::parry::bounding_volume::Aabb;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use voxel::{BlockRegistry, CellChange, SectionPos, WorldListener, WorldView};

pub struct TerrainPipeline {
    config: PipelineConfig,
    cache: Arc<ShapeCache>,
    store: Arc<RegionStore>,
    workers: WorkerPool,
    manager: ColliderLifecycleManager,
    commands: CommandReceiver,
    activity: ActivityTracker,
    pending: usize,
    last_flush: Instant,
}

impl TerrainPipeline {
    /// Build the services and start the worker pool
    pub fn new(config: PipelineConfig, registry: Arc<BlockRegistry>) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(ShapeCache::new(config.cache_capacity));
        let store = Arc::new(match &config.store_dir {
            Some(dir) => RegionStore::open(dir, config.max_resident_regions),
            None => RegionStore::in_memory(config.max_resident_regions),
        });

        let workers = WorkerPool::new(
            config.resolved_worker_threads(),
            WorkerContext {
                cache: cache.clone(),
                store: store.clone(),
                registry,
            },
        )?;

        let (sender, commands) = command_queue();
        let manager = ColliderLifecycleManager::new(sender, config.placeholder_half_extent());
        let activity = ActivityTracker::new(config.activity_margin);

        info!(
            workers = workers.threads(),
            cache_capacity = config.cache_capacity,
            store_dir = ?config.store_dir,
            "terrain pipeline started"
        );

        Ok(Self {
            config,
            cache,
            store,
            workers,
            manager,
            commands,
            activity,
            pending: 0,
            last_flush: Instant::now(),
        })
    }

    fn dispatch(&mut self, jobs: impl IntoIterator<Item = MeshJob>) {
        for job in jobs {
            let section = job.section;
            if self.workers.dispatch(job) {
                self.pending += 1;
            } else {
                warn!(?section, "worker pool closed, job dropped");
            }
        }
    }

    /// Drop the stored entry of a section whose cells all became air
    fn forget_if_emptied(&self, section: SectionPos) {
        let emptied = self.manager.collider(section).is_some_and(|collider| {
            collider.state() == ColliderState::ReadyInactive
                && collider.body().is_none()
                && collider.installed_hash().is_none()
        });
        if emptied {
            self.store.forget(section);
        }
    }

    /// Apply every worker result that has arrived; returns how many
    pub fn process_results(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(result) = self.workers.results().try_recv() {
            self.apply(result);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, result: JobResult) {
        self.pending = self.pending.saturating_sub(1);
        let activity = &self.activity;
        self.manager.on_result(result, |section| activity.is_active(section));
    }

    /// Block until every dispatched job has been applied or `timeout` passes
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.workers.results().recv_timeout(remaining) {
                Ok(result) => self.apply(result),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(pending = self.pending, "worker results disconnected");
                    self.pending = 0;
                    return false;
                }
            }
        }
        true
    }

    /// Recompute the active regions from dynamic-body bounds
    ///
    /// Returns the number of colliders whose activity changed.
    pub fn update_activity(&mut self, dynamic_aabbs: &[Aabb]) -> usize {
        if !self.activity.update(dynamic_aabbs) {
            return 0;
        }
        let activity = &self.activity;
        let changed = self
            .manager
            .update_activity(|section| activity.is_active(section));
        if changed > 0 {
            debug!(changed, "section activity updated");
        }
        changed
    }

    /// Periodic upkeep: flush dirty regions and trim resident ones on the
    /// configured interval, and shed unreferenced cache entries
    pub fn maintain(&mut self) {
        if self.last_flush.elapsed().as_secs_f32() < self.config.flush_interval_secs {
            return;
        }
        self.last_flush = Instant::now();
        self.flush_store();
        let evicted_regions = self.store.evict_idle();
        let evicted_meshes = self.cache.evict();
        if evicted_regions > 0 || evicted_meshes > 0 {
            debug!(evicted_regions, evicted_meshes, "pipeline maintenance");
        }
    }

    /// Write every dirty region now
    pub fn flush_store(&self) -> usize {
        let written = self.store.flush();
        if written > 0 {
            info!(regions = written, "collision regions flushed");
        }
        written
    }

    /// Receiving end of the simulation command queue
    pub fn commands(&self) -> CommandReceiver {
        self.commands.clone()
    }

    pub fn stats(&self) -> PipelineStats {
        self.manager.stats()
    }

    /// Jobs dispatched but not yet applied
    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn collider(&self, section: SectionPos) -> Option<&SectionCollider> {
        self.manager.collider(section)
    }

    pub fn colliders(&self) -> impl Iterator<Item = &SectionCollider> {
        self.manager.colliders()
    }

    pub fn cache(&self) -> &Arc<ShapeCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<RegionStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Destroy every body, stop the workers and persist what is dirty
    pub fn shutdown(&mut self) {
        self.manager.clear();
        self.workers.shutdown();
        self.pending = 0;
        let written = self.store.flush();
        info!(regions = written, "terrain pipeline stopped");
    }
}

impl WorldListener for TerrainPipeline {
    fn on_section_loaded(&mut self, world: &dyn WorldView, section: SectionPos) {
        let job = self.manager.on_section_loaded(world, section);
        self.dispatch(job);
        let jobs = self.manager.refresh_neighbors(world, section);
        self.dispatch(jobs);
    }

    fn on_section_unloaded(&mut self, world: &dyn WorldView, section: SectionPos) {
        self.manager.on_section_unloaded(section);
        let jobs = self.manager.refresh_neighbors(world, section);
        self.dispatch(jobs);
    }

    fn on_cell_changed(&mut self, world: &dyn WorldView, change: &CellChange) {
        let jobs = self.manager.on_cell_changed(world, change);
        self.dispatch(jobs);
        self.forget_if_emptied(change.section());
    }
}

impl Drop for TerrainPipeline {
    fn drop(&mut self) {
        self.workers.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::PhysicsCommand;
    use glam::IVec3;
    use voxel::{CollisionShape, SectionCells, VoxelWorld};

    fn setup() -> (VoxelWorld, TerrainPipeline, voxel::BlockId) {
        let mut registry = BlockRegistry::new();
        let stone = registry.register("stone", CollisionShape::Full).unwrap();
        let registry = Arc::new(registry);
        let config = PipelineConfig {
            worker_threads: 2,
            ..PipelineConfig::default()
        };
        let pipeline = TerrainPipeline::new(config, registry.clone()).unwrap();
        (VoxelWorld::new(registry, -4, 4), pipeline, stone)
    }

    #[test]
    fn test_load_generates_and_installs() {
        let (mut world, mut pipeline, stone) = setup();
        let section = SectionPos::new(0, 0, 0);
        let cells = SectionCells::from_fn(|local| {
            if local.y() == 0 {
                stone
            } else {
                voxel::BlockId::AIR
            }
        });
        world.load_section(section, cells, &mut pipeline);

        assert_eq!(pipeline.collider(section).unwrap().state(), ColliderState::Generating);
        assert!(pipeline.wait_idle(Duration::from_secs(10)));

        let collider = pipeline.collider(section).unwrap();
        assert_eq!(collider.state(), ColliderState::ReadyInactive);
        assert!(collider.mesh().is_some());

        let commands: Vec<PhysicsCommand> = pipeline.commands().try_iter().collect();
        assert!(matches!(commands[0], PhysicsCommand::CreatePlaceholderBody { .. }));
        assert!(matches!(commands[1], PhysicsCommand::InstallShape { .. }));
        assert_eq!(pipeline.stats().generated, 1);
    }

    #[test]
    fn test_activity_follows_dynamic_bounds() {
        let (mut world, mut pipeline, stone) = setup();
        let section = SectionPos::new(0, 0, 0);
        world.load_section(section, SectionCells::filled(stone), &mut pipeline);
        assert!(pipeline.wait_idle(Duration::from_secs(10)));

        let near = Aabb::new([8.0, 17.0, 8.0].into(), [9.0, 18.0, 9.0].into());
        assert_eq!(pipeline.update_activity(&[near]), 1);
        assert_eq!(pipeline.collider(section).unwrap().state(), ColliderState::ReadyActive);

        assert_eq!(pipeline.update_activity(&[]), 1);
        assert_eq!(pipeline.collider(section).unwrap().state(), ColliderState::ReadyInactive);
    }

    #[test]
    fn test_terrain_between_distant_bodies_stays_inactive() {
        let (mut world, mut pipeline, stone) = setup();
        for x in 0..5 {
            world.load_section(SectionPos::new(x, 0, 0), SectionCells::filled(stone), &mut pipeline);
        }
        assert!(pipeline.wait_idle(Duration::from_secs(10)));

        let west = Aabb::new([4.0, 17.0, 8.0].into(), [5.0, 18.0, 9.0].into());
        let east = Aabb::new([68.0, 17.0, 8.0].into(), [69.0, 18.0, 9.0].into());
        assert_eq!(pipeline.update_activity(&[west, east]), 3);

        let state = |x| pipeline.collider(SectionPos::new(x, 0, 0)).unwrap().state();
        assert_eq!(state(0), ColliderState::ReadyActive);
        assert_eq!(state(1), ColliderState::ReadyInactive);
        assert_eq!(state(2), ColliderState::ReadyInactive);
        assert_eq!(state(3), ColliderState::ReadyActive);
        assert_eq!(state(4), ColliderState::ReadyActive);
    }

    #[test]
    fn test_digging_out_section_forgets_store_entry() {
        let (mut world, mut pipeline, stone) = setup();
        let section = SectionPos::new(0, 0, 0);
        let mut cells = SectionCells::empty();
        cells.set(voxel::LocalPos::new(3, 3, 3), stone);
        world.load_section(section, cells, &mut pipeline);
        assert!(pipeline.wait_idle(Duration::from_secs(10)));
        let hash = pipeline.collider(section).unwrap().installed_hash().unwrap();
        assert!(pipeline.store().load(section, hash).is_some());

        world.edit_block(IVec3::new(3, 3, 3), voxel::BlockId::AIR, &mut pipeline);
        let collider = pipeline.collider(section).unwrap();
        assert!(collider.body().is_none());
        assert_eq!(collider.state(), ColliderState::ReadyInactive);
        assert_eq!(pipeline.pending(), 0);
        assert!(pipeline.store().load(section, hash).is_none());
    }

    #[test]
    fn test_shutdown_destroys_bodies() {
        let (mut world, mut pipeline, stone) = setup();
        world.load_section(SectionPos::new(0, 0, 0), SectionCells::filled(stone), &mut pipeline);
        assert!(pipeline.wait_idle(Duration::from_secs(10)));
        pipeline.shutdown();

        let commands: Vec<PhysicsCommand> = pipeline.commands().try_iter().collect();
        assert!(matches!(commands.last(), Some(PhysicsCommand::DestroyBody { .. })));
    }
}
