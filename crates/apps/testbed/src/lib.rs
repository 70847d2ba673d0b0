//! Headless terrain collider testbed
//!
//! Streams a procedural world around a moving focus point, drops dynamic
//! balls onto it, digs holes under the focus, and steps the simulation while
//! the collider pipeline keeps up in the background.

pub mod config;
pub mod terrain;

use config::TestbedConfig;
use glam::{IVec3, Vec3};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use terrain::{Blocks, TerrainGenerator};
use terrain_physics::rapier3d::prelude::RigidBodyHandle;
use terrain_physics::{PipelineStats, TerrainPipeline, TerrainSimulation};
use tracing::{debug, info};
use voxel::{BlockId, BlockRegistry, SectionPos, VoxelWorld, SECTION_SIZE};

/// Summary of a finished run
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub frames: u64,
    pub loaded_sections: usize,
    pub balls: usize,
    pub balls_above_ground: usize,
    pub stats: PipelineStats,
}

pub struct Testbed {
    config: TestbedConfig,
    world: VoxelWorld,
    pipeline: TerrainPipeline,
    simulation: TerrainSimulation,
    generator: TerrainGenerator,
    focus: Vec3,
    frame: u64,
    balls: Vec<RigidBodyHandle>,
}

impl Testbed {
    pub fn new(config: TestbedConfig) -> anyhow::Result<Self> {
        let mut registry = BlockRegistry::new();
        let blocks = Blocks::register(&mut registry)?;
        let registry = Arc::new(registry);

        let generator = TerrainGenerator::new(&config.world, blocks);
        let world = VoxelWorld::new(
            registry.clone(),
            config.world.min_section_y,
            config.world.max_section_y,
        );
        let pipeline = TerrainPipeline::new(config.pipeline.clone(), registry)?;
        let simulation = TerrainSimulation::new(
            Vec3::new(0.0, config.simulation.gravity, 0.0),
            pipeline.commands(),
        );
        let focus = Vec3::new(0.0, generator.surface_height(0, 0) as f32 + 1.0, 0.0);

        Ok(Self {
            config,
            world,
            pipeline,
            simulation,
            generator,
            focus,
            frame: 0,
            balls: Vec::new(),
        })
    }

    pub fn focus(&self) -> Vec3 {
        self.focus
    }

    pub fn world(&self) -> &VoxelWorld {
        &self.world
    }

    pub fn pipeline(&self) -> &TerrainPipeline {
        &self.pipeline
    }

    pub fn simulation(&self) -> &TerrainSimulation {
        &self.simulation
    }

    /// Load every section within the radius of the focus, unload the rest
    pub fn stream(&mut self) {
        let center = SectionPos::from_world(self.focus);
        let radius = self.config.world.radius;

        let mut wanted = HashSet::new();
        for x in -radius..=radius {
            for z in -radius..=radius {
                for y in self.config.world.min_section_y..=self.config.world.max_section_y {
                    wanted.insert(SectionPos::new(center.pos.x + x, y, center.pos.z + z));
                }
            }
        }

        let stale: Vec<SectionPos> = self
            .world
            .loaded_sections()
            .filter(|section| !wanted.contains(section))
            .collect();
        for section in &stale {
            self.world.unload_section(*section, &mut self.pipeline);
        }

        let mut loaded = 0;
        for section in wanted {
            if !self.world.is_loaded(section) {
                let cells = self.generator.section(section);
                self.world.load_section(section, cells, &mut self.pipeline);
                loaded += 1;
            }
        }
        if loaded > 0 || !stale.is_empty() {
            debug!(loaded, unloaded = stale.len(), ?center, "streamed sections");
        }
    }

    /// Remove the top solid cell of the column under the focus
    fn dig(&mut self) {
        let x = self.focus.x.floor() as i32;
        let z = self.focus.z.floor() as i32;
        let top = self.config.world.max_section_y * SECTION_SIZE + SECTION_SIZE - 1;
        let bottom = self.config.world.min_section_y * SECTION_SIZE;

        let Some(cell) = (bottom..=top)
            .rev()
            .map(|y| IVec3::new(x, y, z))
            .find(|&cell| !self.world.block(cell).is_air())
        else {
            return;
        };
        if let Some(change) = self.world.edit_block(cell, BlockId::AIR, &mut self.pipeline) {
            debug!(cell = ?change.cell, "dug cell");
        }
    }

    fn drop_ball(&mut self) {
        let n = self.balls.len() as f32;
        let offset = Vec3::new((n * 1.7).sin() * 6.0, 0.0, (n * 1.7).cos() * 6.0);
        let x = (self.focus.x + offset.x).floor() as i32;
        let z = (self.focus.z + offset.z).floor() as i32;
        let height = self.generator.surface_height(x, z) as f32 + 6.0;
        let position = Vec3::new(self.focus.x + offset.x, height, self.focus.z + offset.z);

        let handle = self
            .simulation
            .world_mut()
            .add_dynamic_ball(position, self.config.simulation.ball_radius);
        self.balls.push(handle);
    }

    /// Advance one frame
    pub fn step(&mut self) {
        let sim = self.config.simulation.clone();
        let dt = sim.timestep;
        self.focus.x += sim.focus_speed * dt;

        self.stream();
        if sim.dig_interval > 0 && self.frame % sim.dig_interval == 0 {
            self.dig();
        }
        if self.balls.len() < sim.ball_count && self.frame % sim.drop_interval.max(1) == 0 {
            self.drop_ball();
        }

        self.pipeline.process_results();
        let aabbs = self.simulation.world().dynamic_aabbs();
        self.pipeline.update_activity(&aabbs);
        self.simulation.step(dt);
        self.pipeline.maintain();
        self.frame += 1;
    }

    /// Run `frames` frames, logging statistics every second of simulated time
    pub fn run(&mut self, frames: u64) -> RunReport {
        let per_second = (1.0 / self.config.simulation.timestep).round().max(1.0) as u64;
        for _ in 0..frames {
            self.step();
            if self.frame % per_second == 0 {
                let stats = self.pipeline.stats();
                info!(
                    frame = self.frame,
                    sections = self.world.len(),
                    pending = self.pipeline.pending(),
                    generated = stats.generated,
                    cache_hits = stats.cache_hits,
                    store_hits = stats.store_hits,
                    stale = stats.stale,
                    "pipeline progress"
                );
            }
        }
        self.report()
    }

    /// Let outstanding work land and apply it
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let idle = self.pipeline.wait_idle(timeout);
        self.simulation.apply_commands();
        idle
    }

    pub fn report(&self) -> RunReport {
        let floor = self.config.world.min_section_y as f32 * SECTION_SIZE as f32;
        let balls_above_ground = self
            .balls
            .iter()
            .filter_map(|&ball| self.simulation.world().body_translation(ball))
            .filter(|position| position.y > floor)
            .count();

        RunReport {
            frames: self.frame,
            loaded_sections: self.world.len(),
            balls: self.balls.len(),
            balls_above_ground,
            stats: self.pipeline.stats(),
        }
    }

    pub fn shutdown(&mut self) {
        self.pipeline.shutdown();
        self.simulation.apply_commands();
    }
}
