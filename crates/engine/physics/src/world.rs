use crate::command::BodyMutator;
use crate::terrain::CollisionMesh;
use glam::Vec3;
use rapier3d::parry::bounding_volume::Aabb;
use rapier3d::prelude::*;
use tracing::trace;
use voxel::{SectionPos, SECTION_SIZE};

/// Physics simulation world
///
/// Manages all rigid bodies, colliders, and physics simulation state.
/// This is a wrapper around Rapier's physics pipeline.
pub struct PhysicsWorld {
    pub(crate) rigid_body_set: RigidBodySet,
    pub(crate) collider_set: ColliderSet,
    pub(crate) impulse_joint_set: ImpulseJointSet,
    pub(crate) multibody_joint_set: MultibodyJointSet,
    pub(crate) integration_parameters: IntegrationParameters,
    pub(crate) physics_pipeline: PhysicsPipeline,
    pub(crate) island_manager: IslandManager,
    pub(crate) broad_phase: DefaultBroadPhase,
    pub(crate) narrow_phase: NarrowPhase,
    pub(crate) ccd_solver: CCDSolver,
    gravity: Vector<Real>,
}

impl PhysicsWorld {
    /// Create a new physics world with specified gravity
    ///
    /// # Arguments
    /// * `gravity` - Gravity vector (e.g., Vec3::new(0.0, -9.81, 0.0))
    pub fn new(gravity: Vec3) -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            gravity: vector![gravity.x, gravity.y, gravity.z],
        }
    }

    /// Step the physics simulation forward by dt seconds
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &(),
        );
    }

    /// Add a rigid body to the world
    pub fn add_rigid_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(body)
    }

    /// Remove a rigid body from the world
    ///
    /// Also removes all associated colliders automatically.
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    /// Add a collider to the world, attached to a rigid body
    pub fn add_collider(&mut self, collider: Collider, parent: RigidBodyHandle) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    /// Drop a dynamic ball at `position`
    pub fn add_dynamic_ball(&mut self, position: Vec3, radius: f32) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y, position.z])
            .build();
        let handle = self.add_rigid_body(body);
        self.add_collider(ColliderBuilder::ball(radius).build(), handle);
        handle
    }

    /// World-space translation of a body
    pub fn body_translation(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.rigid_body_set
            .get(handle)
            .map(|body| Vec3::new(body.translation().x, body.translation().y, body.translation().z))
    }

    /// Shape of the first collider attached to a body
    pub fn body_shape(&self, handle: RigidBodyHandle) -> Option<&SharedShape> {
        let collider = *self.rigid_body_set.get(handle)?.colliders().first()?;
        self.collider_set.get(collider).map(|c| c.shared_shape())
    }

    /// AABBs of every collider attached to a dynamic body
    pub fn dynamic_aabbs(&self) -> Vec<Aabb> {
        self.collider_set
            .iter()
            .filter(|(_, collider)| {
                collider
                    .parent()
                    .and_then(|parent| self.rigid_body_set.get(parent))
                    .is_some_and(|body| body.is_dynamic())
            })
            .map(|(_, collider)| collider.compute_aabb())
            .collect()
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Get the current gravity vector
    pub fn gravity(&self) -> Vec3 {
        Vec3::new(self.gravity.x, self.gravity.y, self.gravity.z)
    }
}

impl BodyMutator for PhysicsWorld {
    type Body = RigidBodyHandle;

    /// Fixed body at the section origin with a cuboid centered on the section
    fn create_placeholder_body(&mut self, section: SectionPos, half_extent: f32) -> RigidBodyHandle {
        let origin = section.world_origin();
        let body = RigidBodyBuilder::fixed()
            .translation(vector![origin.x, origin.y, origin.z])
            .build();
        let handle = self.add_rigid_body(body);

        let center = SECTION_SIZE as f32 / 2.0;
        let placeholder = ColliderBuilder::cuboid(half_extent, half_extent, half_extent)
            .translation(vector![center, center, center])
            .build();
        self.add_collider(placeholder, handle);
        handle
    }

    fn install_shape(&mut self, body: RigidBodyHandle, mesh: &CollisionMesh) {
        let Some(collider) = self
            .rigid_body_set
            .get(body)
            .and_then(|b| b.colliders().first().copied())
        else {
            trace!(?body, "install on missing body ignored");
            return;
        };

        if let Some(collider) = self.collider_set.get_mut(collider) {
            // Meshes are in section-local coordinates, same as the body frame
            collider.set_position_wrt_parent(Isometry::identity());
            collider.set_shape(mesh.shape().clone());
        }
    }

    fn destroy_body(&mut self, body: RigidBodyHandle) {
        self.remove_rigid_body(body);
    }
}
