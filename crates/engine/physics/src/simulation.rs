use crate::command::{CommandExecutor, CommandReceiver};
use crate::world::PhysicsWorld;
use glam::Vec3;

/// Physics world plus the executor feeding it terrain commands
///
/// Lives on the simulation thread. Each step first applies every queued
/// command in submission order, then advances the simulation.
pub struct TerrainSimulation {
    world: PhysicsWorld,
    executor: CommandExecutor<PhysicsWorld>,
}

impl TerrainSimulation {
    pub fn new(gravity: Vec3, commands: CommandReceiver) -> Self {
        Self {
            world: PhysicsWorld::new(gravity),
            executor: CommandExecutor::new(commands),
        }
    }

    /// Apply pending commands without stepping
    pub fn apply_commands(&mut self) -> usize {
        self.executor.drain(&mut self.world)
    }

    /// Apply pending commands, then step by `dt` seconds
    pub fn step(&mut self, dt: f32) -> usize {
        let applied = self.apply_commands();
        self.world.step(dt);
        applied
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }

    pub fn executor(&self) -> &CommandExecutor<PhysicsWorld> {
        &self.executor
    }
}
