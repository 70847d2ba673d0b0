//! Per-section collider state machine
//!
//! Runs on the world-owner thread. Turns world notifications into snapshots
//! and worker jobs, and worker results into simulation commands. Every
//! dispatch carries a fresh generation; results for anything else are stale.

use crate::collider::{ColliderState, SectionCollider};
use crate::command::{BodyAllocator, BodyHandle, CommandSender, PhysicsCommand};
use crate::terrain::SectionSnapshot;
use crate::worker::{JobOutcome, JobResult, MeshJob, MeshSource};
use std::collections::HashMap;
use tracing::{debug, trace, warn};
use voxel::{CellChange, SectionPos, WorldView};

/// Counters describing pipeline activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub dispatched: u64,
    pub cache_hits: u64,
    pub store_hits: u64,
    pub generated: u64,
    pub unchanged: u64,
    pub empty: u64,
    pub failures: u64,
    /// Results whose generation was superseded
    pub stale: u64,
    /// Results for sections unloaded meanwhile
    pub dropped: u64,
    pub commands: u64,
}

/// Owns every [`SectionCollider`] and drives their transitions
pub struct ColliderLifecycleManager {
    colliders: HashMap<SectionPos, SectionCollider>,
    next_generation: u64,
    bodies: BodyAllocator,
    commands: CommandSender,
    placeholder_half_extent: f32,
    stats: PipelineStats,
}

impl ColliderLifecycleManager {
    pub fn new(commands: CommandSender, placeholder_half_extent: f32) -> Self {
        Self {
            colliders: HashMap::new(),
            next_generation: 0,
            bodies: BodyAllocator::new(),
            commands,
            placeholder_half_extent,
            stats: PipelineStats::default(),
        }
    }

    pub fn collider(&self, section: SectionPos) -> Option<&SectionCollider> {
        self.colliders.get(&section)
    }

    pub fn colliders(&self) -> impl Iterator<Item = &SectionCollider> {
        self.colliders.values()
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    fn send(&mut self, command: PhysicsCommand) {
        trace!(?command, "queue physics command");
        self.stats.commands += 1;
        // The receiver lives as long as the simulation; a closed queue means
        // bodies are already gone with it.
        let _ = self.commands.send(command);
    }

    fn create_body(&mut self, section: SectionPos) -> BodyHandle {
        let handle = self.bodies.allocate();
        self.send(PhysicsCommand::CreatePlaceholderBody {
            handle,
            section,
            half_extent: self.placeholder_half_extent,
        });
        handle
    }

    fn destroy_body(&mut self, handle: BodyHandle) {
        self.send(PhysicsCommand::DestroyBody { handle });
        self.bodies.release(handle);
    }

    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// A section entered the world
    ///
    /// Sections with collidable cells get a placeholder body immediately and a
    /// job; empty sections are ready straight away with no body.
    pub fn on_section_loaded(&mut self, world: &dyn WorldView, section: SectionPos) -> Option<MeshJob> {
        if self.colliders.contains_key(&section) {
            return self.refresh(world, section);
        }
        let snapshot = SectionSnapshot::capture(world, section)?;

        let mut collider = SectionCollider::new(section);
        if snapshot.is_empty() {
            collider.state = ColliderState::ReadyInactive;
            debug!(?section, "section loaded without collidable cells");
            self.colliders.insert(section, collider);
            return None;
        }

        collider.body = Some(self.create_body(section));
        collider.state = ColliderState::Placeholder;
        debug!(?section, cells = snapshot.len(), "section loaded, placeholder created");

        collider.generation = self.next_generation();
        collider.state = ColliderState::Generating;
        let job = MeshJob {
            section,
            generation: collider.generation,
            snapshot,
            installed_hash: None,
        };
        self.colliders.insert(section, collider);
        self.stats.dispatched += 1;
        Some(job)
    }

    /// A section left the world; its body goes with it
    ///
    /// In-flight work is not cancelled; its result is dropped on arrival.
    pub fn on_section_unloaded(&mut self, section: SectionPos) {
        let Some(collider) = self.colliders.remove(&section) else {
            return;
        };
        if let Some(handle) = collider.body {
            self.destroy_body(handle);
        }
        debug!(?section, "section unloaded");
    }

    /// Re-capture a tracked section and dispatch it if it has content
    ///
    /// The installed shape (or placeholder) stays until the result arrives.
    pub fn refresh(&mut self, world: &dyn WorldView, section: SectionPos) -> Option<MeshJob> {
        let snapshot = SectionSnapshot::capture(world, section)?;
        let generation = self.next_generation();
        let collider = self.colliders.get_mut(&section)?;
        collider.generation = generation;

        if snapshot.is_empty() {
            let body = collider.body.take();
            collider.mesh = None;
            collider.installed_hash = None;
            collider.state = ColliderState::ReadyInactive;
            if let Some(handle) = body {
                self.destroy_body(handle);
            }
            debug!(?section, "section emptied");
            return None;
        }

        collider.state = ColliderState::Generating;
        let job = MeshJob {
            section,
            generation,
            snapshot,
            installed_hash: collider.installed_hash,
        };
        self.stats.dispatched += 1;
        Some(job)
    }

    /// A cell changed; refresh its section and, for boundary cells, the
    /// neighbours whose halo it belongs to
    pub fn on_cell_changed(&mut self, world: &dyn WorldView, change: &CellChange) -> Vec<MeshJob> {
        let section = change.section();
        let mut jobs = Vec::new();
        if let Some(job) = self.refresh(world, section) {
            jobs.push(job);
        }

        let shapes = world.registry().shapes();
        let was_full = shapes.is_full(world.registry().shape_of(change.old));
        let is_full = shapes.is_full(world.registry().shape_of(change.new));
        if was_full != is_full {
            for face in change.local().boundary_faces() {
                let neighbor = section.neighbor(face);
                if self.colliders.contains_key(&neighbor) {
                    jobs.extend(self.refresh(world, neighbor));
                }
            }
        }
        jobs
    }

    /// Refresh the tracked neighbours of a section whose presence changed
    pub fn refresh_neighbors(&mut self, world: &dyn WorldView, section: SectionPos) -> Vec<MeshJob> {
        let mut jobs = Vec::new();
        for neighbor in section.neighbors() {
            if self.colliders.contains_key(&neighbor) {
                jobs.extend(self.refresh(world, neighbor));
            }
        }
        jobs
    }

    /// Apply a worker result
    ///
    /// `is_active` reports whether dynamic bodies are near a section.
    pub fn on_result(&mut self, result: JobResult, is_active: impl Fn(SectionPos) -> bool) {
        let JobResult {
            section,
            generation,
            outcome,
        } = result;

        let Some(current) = self.colliders.get(&section).map(|c| c.generation) else {
            trace!(?section, "result for unloaded section dropped");
            self.stats.dropped += 1;
            return;
        };
        if current != generation {
            trace!(?section, generation, current, "stale result discarded");
            self.stats.stale += 1;
            return;
        }

        let active = is_active(section);
        match outcome {
            JobOutcome::Unchanged { .. } => {
                self.stats.unchanged += 1;
                if let Some(collider) = self.colliders.get_mut(&section) {
                    collider.state = ColliderState::ready(active && collider.body.is_some());
                }
            }
            JobOutcome::Empty { hash } => {
                self.stats.empty += 1;
                let body = self.colliders.get_mut(&section).and_then(|collider| {
                    collider.mesh = None;
                    collider.installed_hash = Some(hash);
                    collider.state = ColliderState::ReadyInactive;
                    collider.body.take()
                });
                if let Some(handle) = body {
                    self.destroy_body(handle);
                }
                debug!(?section, "section has no exposed geometry");
            }
            JobOutcome::Ready { mesh, source } => {
                match source {
                    MeshSource::Cache => self.stats.cache_hits += 1,
                    MeshSource::Store => self.stats.store_hits += 1,
                    MeshSource::Generated => self.stats.generated += 1,
                }

                let existing = self.colliders.get(&section).and_then(|c| c.body);
                let handle = match existing {
                    Some(handle) => handle,
                    None => self.create_body(section),
                };
                self.send(PhysicsCommand::InstallShape {
                    handle,
                    mesh: mesh.clone(),
                });

                if let Some(collider) = self.colliders.get_mut(&section) {
                    collider.body = Some(handle);
                    collider.installed_hash = Some(mesh.content_hash());
                    collider.mesh = Some(mesh);
                    collider.state = ColliderState::ready(active);
                    debug!(?section, ?source, state = ?collider.state, "collision shape installed");
                }
            }
            JobOutcome::Failed { error, .. } => {
                self.stats.failures += 1;
                warn!(?section, %error, "collision generation failed, keeping previous shape");
                if let Some(collider) = self.colliders.get_mut(&section) {
                    // Without a body there is no placeholder to fall back on
                    let has_body = collider.body.is_some();
                    collider.state = match (has_body, collider.installed_hash.is_some()) {
                        (true, true) => ColliderState::ready(active),
                        (true, false) => ColliderState::Placeholder,
                        (false, _) => ColliderState::ReadyInactive,
                    };
                }
            }
        }
    }

    /// Move ready colliders between the active and inactive states
    pub fn update_activity(&mut self, is_active: impl Fn(SectionPos) -> bool) -> usize {
        let mut changed = 0;
        for collider in self.colliders.values_mut() {
            if !collider.state.is_ready() {
                continue;
            }
            let state = ColliderState::ready(collider.body.is_some() && is_active(collider.section));
            if state != collider.state {
                trace!(section = ?collider.section, ?state, "activity changed");
                collider.state = state;
                changed += 1;
            }
        }
        changed
    }

    /// Destroy every body and forget all colliders
    pub fn clear(&mut self) {
        let sections: Vec<SectionPos> = self.colliders.keys().copied().collect();
        for section in sections {
            self.on_section_unloaded(section);
        }
    }
}
