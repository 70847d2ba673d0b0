//! Commands from the world-owner thread to the simulation thread
//!
//! Only the simulation thread creates, mutates, or destroys bodies. The
//! lifecycle manager refers to bodies through generation-checked
//! [`BodyHandle`]s and queues [`PhysicsCommand`]s; the [`CommandExecutor`]
//! drains them in submission order before each step.

use crate::terrain::{CollisionMesh, MeshRef};
use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use tracing::trace;
use voxel::SectionPos;

/// Generation-checked arena handle of a section body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    index: u32,
    generation: u32,
}

impl BodyHandle {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

/// Hands out body handles, reusing released indices with a bumped generation
#[derive(Debug, Default)]
pub struct BodyAllocator {
    generations: Vec<u32>,
    free: Vec<u32>,
}

impl BodyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> BodyHandle {
        match self.free.pop() {
            Some(index) => BodyHandle {
                index,
                generation: self.generations[index as usize],
            },
            None => {
                self.generations.push(0);
                BodyHandle {
                    index: (self.generations.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    /// Return a handle; stale handles are ignored
    pub fn release(&mut self, handle: BodyHandle) {
        let Some(generation) = self.generations.get_mut(handle.index as usize) else {
            return;
        };
        if *generation != handle.generation {
            return;
        }
        *generation = generation.wrapping_add(1);
        self.free.push(handle.index);
    }

    /// Handles currently allocated
    pub fn live(&self) -> usize {
        self.generations.len() - self.free.len()
    }
}

/// Body mutation queued for the simulation thread
pub enum PhysicsCommand {
    /// Create a static body holding an oversized cuboid around the section
    CreatePlaceholderBody {
        handle: BodyHandle,
        section: SectionPos,
        half_extent: f32,
    },
    /// Swap the body's shape for `mesh`
    InstallShape { handle: BodyHandle, mesh: MeshRef },
    /// Remove the body and its collider
    DestroyBody { handle: BodyHandle },
}

impl PhysicsCommand {
    pub fn handle(&self) -> BodyHandle {
        match self {
            PhysicsCommand::CreatePlaceholderBody { handle, .. }
            | PhysicsCommand::InstallShape { handle, .. }
            | PhysicsCommand::DestroyBody { handle } => *handle,
        }
    }
}

impl fmt::Debug for PhysicsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsCommand::CreatePlaceholderBody {
                handle,
                section,
                half_extent,
            } => f
                .debug_struct("CreatePlaceholderBody")
                .field("handle", handle)
                .field("section", section)
                .field("half_extent", half_extent)
                .finish(),
            PhysicsCommand::InstallShape { handle, mesh } => f
                .debug_struct("InstallShape")
                .field("handle", handle)
                .field("hash", &mesh.content_hash())
                .finish(),
            PhysicsCommand::DestroyBody { handle } => {
                f.debug_struct("DestroyBody").field("handle", handle).finish()
            }
        }
    }
}

/// Sending half of the command queue
pub type CommandSender = Sender<PhysicsCommand>;
/// Receiving half of the command queue
pub type CommandReceiver = Receiver<PhysicsCommand>;

/// Create an unbounded FIFO command queue
pub fn command_queue() -> (CommandSender, CommandReceiver) {
    crossbeam_channel::unbounded()
}

/// Narrow body-mutation interface of the physics engine
///
/// Invoked only by [`CommandExecutor`] on the simulation thread.
pub trait BodyMutator {
    /// Engine-side body identifier
    type Body: Copy + fmt::Debug;

    /// Create a static body at the section origin with a cuboid placeholder shape
    fn create_placeholder_body(&mut self, section: SectionPos, half_extent: f32) -> Self::Body;

    /// Replace the body's collision shape
    fn install_shape(&mut self, body: Self::Body, mesh: &CollisionMesh);

    fn destroy_body(&mut self, body: Self::Body);
}

struct BodySlot<B> {
    generation: u32,
    body: B,
    /// Keeps the installed mesh alive while the engine uses it
    mesh: Option<MeshRef>,
}

/// Applies queued commands to a [`BodyMutator`]
pub struct CommandExecutor<M: BodyMutator> {
    receiver: CommandReceiver,
    slots: Vec<Option<BodySlot<M::Body>>>,
    executed: u64,
    skipped: u64,
}

impl<M: BodyMutator> CommandExecutor<M> {
    pub fn new(receiver: CommandReceiver) -> Self {
        Self {
            receiver,
            slots: Vec::new(),
            executed: 0,
            skipped: 0,
        }
    }

    /// Apply every queued command in submission order, returning how many ran
    pub fn drain(&mut self, mutator: &mut M) -> usize {
        let mut count = 0;
        while let Ok(command) = self.receiver.try_recv() {
            self.apply(mutator, command);
            count += 1;
        }
        count
    }

    /// Apply a single command
    pub fn apply(&mut self, mutator: &mut M, command: PhysicsCommand) {
        trace!(?command, "applying physics command");
        match command {
            PhysicsCommand::CreatePlaceholderBody {
                handle,
                section,
                half_extent,
            } => {
                let index = handle.index as usize;
                if self.slots.len() <= index {
                    self.slots.resize_with(index + 1, || None);
                }
                // A slot still occupied by an older generation missed its destroy
                if let Some(old) = self.slots[index].take() {
                    mutator.destroy_body(old.body);
                }
                let body = mutator.create_placeholder_body(section, half_extent);
                self.slots[index] = Some(BodySlot {
                    generation: handle.generation,
                    body,
                    mesh: None,
                });
                self.executed += 1;
            }
            PhysicsCommand::InstallShape { handle, mesh } => match self.slot_mut(handle) {
                Some(slot) => {
                    let previous = slot.mesh.take();
                    mutator.install_shape(slot.body, &mesh);
                    slot.mesh = Some(mesh);
                    drop(previous);
                    self.executed += 1;
                }
                None => self.skip(handle),
            },
            PhysicsCommand::DestroyBody { handle } => {
                let index = handle.index as usize;
                let live = self.slot_mut(handle).is_some();
                if live {
                    if let Some(slot) = self.slots[index].take() {
                        mutator.destroy_body(slot.body);
                    }
                    self.executed += 1;
                } else {
                    self.skip(handle);
                }
            }
        }
    }

    fn slot_mut(&mut self, handle: BodyHandle) -> Option<&mut BodySlot<M::Body>> {
        self.slots
            .get_mut(handle.index as usize)?
            .as_mut()
            .filter(|slot| slot.generation == handle.generation)
    }

    fn skip(&mut self, handle: BodyHandle) {
        trace!(?handle, "command for vanished body ignored");
        self.skipped += 1;
    }

    /// Engine body behind a handle, if it is still live
    pub fn body(&self, handle: BodyHandle) -> Option<M::Body> {
        self.slots
            .get(handle.index as usize)?
            .as_ref()
            .filter(|slot| slot.generation == handle.generation)
            .map(|slot| slot.body)
    }

    /// Mesh installed on a body, if any
    pub fn installed_mesh(&self, handle: BodyHandle) -> Option<&MeshRef> {
        self.slots
            .get(handle.index as usize)?
            .as_ref()
            .filter(|slot| slot.generation == handle.generation)?
            .mesh
            .as_ref()
    }

    /// Number of live bodies
    pub fn live_bodies(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Commands ignored because their body no longer existed
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{CollisionBox, ContentHash};
    use glam::IVec3;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        next: u32,
        calls: Vec<String>,
    }

    impl BodyMutator for Recorder {
        type Body = u32;

        fn create_placeholder_body(&mut self, section: SectionPos, _half_extent: f32) -> u32 {
            self.next += 1;
            self.calls.push(format!("create {} {:?}", self.next, section.pos));
            self.next
        }

        fn install_shape(&mut self, body: u32, mesh: &CollisionMesh) {
            self.calls.push(format!("install {} {}", body, mesh.content_hash()));
        }

        fn destroy_body(&mut self, body: u32) {
            self.calls.push(format!("destroy {}", body));
        }
    }

    fn mesh(hash: u64) -> MeshRef {
        let boxes = [CollisionBox::cell(IVec3::ZERO)];
        Arc::new(CollisionMesh::from_boxes(&boxes, ContentHash::from_raw(hash)).unwrap())
    }

    #[test]
    fn test_allocator_reuses_with_new_generation() {
        let mut allocator = BodyAllocator::new();
        let a = allocator.allocate();
        let b = allocator.allocate();
        assert_ne!(a.index(), b.index());

        allocator.release(a);
        allocator.release(a);
        let c = allocator.allocate();
        assert_eq!(c.index(), a.index());
        assert_ne!(c.generation(), a.generation());
        assert_eq!(allocator.live(), 2);
    }

    #[test]
    fn test_commands_apply_in_order() {
        let (tx, rx) = command_queue();
        let mut executor = CommandExecutor::<Recorder>::new(rx);
        let mut recorder = Recorder::default();
        let mut allocator = BodyAllocator::new();
        let handle = allocator.allocate();

        tx.send(PhysicsCommand::CreatePlaceholderBody {
            handle,
            section: SectionPos::new(1, 2, 3),
            half_extent: 8.5,
        })
        .unwrap();
        tx.send(PhysicsCommand::InstallShape {
            handle,
            mesh: mesh(0xab),
        })
        .unwrap();
        tx.send(PhysicsCommand::DestroyBody { handle }).unwrap();

        assert_eq!(executor.drain(&mut recorder), 3);
        assert_eq!(
            recorder.calls,
            vec!["create 1 IVec3(1, 2, 3)", "install 1 00000000000000ab", "destroy 1"]
        );
        assert_eq!(executor.live_bodies(), 0);
    }

    #[test]
    fn test_stale_handles_are_noops() {
        let (tx, rx) = command_queue();
        let mut executor = CommandExecutor::<Recorder>::new(rx);
        let mut recorder = Recorder::default();
        let mut allocator = BodyAllocator::new();

        let old = allocator.allocate();
        tx.send(PhysicsCommand::CreatePlaceholderBody {
            handle: old,
            section: SectionPos::new(0, 0, 0),
            half_extent: 8.5,
        })
        .unwrap();
        tx.send(PhysicsCommand::DestroyBody { handle: old }).unwrap();
        allocator.release(old);

        let new = allocator.allocate();
        tx.send(PhysicsCommand::CreatePlaceholderBody {
            handle: new,
            section: SectionPos::new(0, 0, 0),
            half_extent: 8.5,
        })
        .unwrap();
        // Late commands against the old generation
        tx.send(PhysicsCommand::InstallShape {
            handle: old,
            mesh: mesh(1),
        })
        .unwrap();
        tx.send(PhysicsCommand::DestroyBody { handle: old }).unwrap();

        executor.drain(&mut recorder);
        assert_eq!(executor.skipped(), 2);
        assert_eq!(executor.live_bodies(), 1);
        assert_eq!(executor.body(new), Some(2));
        assert!(executor.body(old).is_none());
    }

    #[test]
    fn test_install_releases_previous_mesh() {
        let (tx, rx) = command_queue();
        let mut executor = CommandExecutor::<Recorder>::new(rx);
        let mut recorder = Recorder::default();
        let handle = BodyAllocator::new().allocate();

        let first = mesh(1);
        let second = mesh(2);
        tx.send(PhysicsCommand::CreatePlaceholderBody {
            handle,
            section: SectionPos::new(0, 0, 0),
            half_extent: 8.5,
        })
        .unwrap();
        tx.send(PhysicsCommand::InstallShape {
            handle,
            mesh: first.clone(),
        })
        .unwrap();
        executor.drain(&mut recorder);
        assert_eq!(Arc::strong_count(&first), 2);

        tx.send(PhysicsCommand::InstallShape {
            handle,
            mesh: second.clone(),
        })
        .unwrap();
        executor.drain(&mut recorder);
        assert_eq!(Arc::strong_count(&first), 1);
        assert!(Arc::ptr_eq(executor.installed_mesh(handle).unwrap(), &second));
    }
}
