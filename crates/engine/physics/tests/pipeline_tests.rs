//! End-to-end behaviour of the terrain collider pipeline

use glam::{IVec3, Vec3};
use std::sync::Arc;
use std::time::Duration;
use terrain_physics::store::{decode, file_name};
use terrain_physics::terrain::{
    content_hash, generate, CollisionMesh, Halo, MeshKind, SectionSnapshot,
};
use terrain_physics::{
    BodyMutator, ColliderState, CommandExecutor, PipelineConfig, RegionStore, TerrainPipeline,
};
use voxel::{
    BlockId, BlockRegistry, CellBox, CollisionShape, Face, LocalPos, SectionCells, SectionPos, ShapeId,
    VoxelWorld,
};

const TIMEOUT: Duration = Duration::from_secs(10);

struct Blocks {
    stone: BlockId,
    granite: BlockId,
}

fn registry() -> (Arc<BlockRegistry>, Blocks) {
    let mut registry = BlockRegistry::new();
    let stone = registry.register("stone", CollisionShape::Full).unwrap();
    let granite = registry.register("granite", CollisionShape::Full).unwrap();
    (Arc::new(registry), Blocks { stone, granite })
}

/// Registry with a slab and a post, interned in the requested order
fn shaped_registry(post_first: bool) -> (Arc<BlockRegistry>, BlockId, BlockId) {
    let slab = CollisionShape::Boxes(vec![CellBox::new(Vec3::ZERO, Vec3::new(1.0, 0.5, 1.0))]);
    let post = CollisionShape::Boxes(vec![CellBox::new(
        Vec3::new(0.25, 0.0, 0.25),
        Vec3::new(0.75, 1.0, 0.75),
    )]);
    let mut registry = BlockRegistry::new();
    let (slab, post) = if post_first {
        let post = registry.register("post", post).unwrap();
        (registry.register("slab", slab).unwrap(), post)
    } else {
        let slab = registry.register("slab", slab).unwrap();
        (slab, registry.register("post", post).unwrap())
    };
    (Arc::new(registry), slab, post)
}

fn config() -> PipelineConfig {
    PipelineConfig {
        worker_threads: 2,
        ..PipelineConfig::default()
    }
}

/// Floor two cells thick with a pillar in one corner
fn terrain(stone: BlockId) -> SectionCells {
    SectionCells::from_fn(|local| {
        if local.y() < 2 || (local.x() < 2 && local.z() < 2 && local.y() < 6) {
            stone
        } else {
            BlockId::AIR
        }
    })
}

/// Records every body mutation as text
#[derive(Default)]
struct Recorder {
    next: u32,
    calls: Vec<String>,
}

impl BodyMutator for Recorder {
    type Body = u32;

    fn create_placeholder_body(&mut self, _section: SectionPos, half_extent: f32) -> u32 {
        self.next += 1;
        self.calls.push(format!("create {} {}", self.next, half_extent));
        self.next
    }

    fn install_shape(&mut self, body: u32, mesh: &CollisionMesh) {
        self.calls.push(format!("install {} {}", body, mesh.content_hash()));
    }

    fn destroy_body(&mut self, body: u32) {
        self.calls.push(format!("destroy {}", body));
    }
}

impl Recorder {
    fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|call| call.starts_with(prefix)).count()
    }
}

#[test]
fn test_determinism() {
    let (registry, blocks) = registry();
    let section = SectionPos::new(2, 0, -3);

    let mut hashes = Vec::new();
    for _ in 0..2 {
        let mut world = VoxelWorld::new(registry.clone(), -4, 4);
        let mut pipeline = TerrainPipeline::new(config(), registry.clone()).unwrap();
        world.load_section(section, terrain(blocks.stone), &mut pipeline);
        assert!(pipeline.wait_idle(TIMEOUT));

        let snapshot = SectionSnapshot::capture(&world, section).unwrap();
        let first = generate(&snapshot, registry.shapes()).unwrap();
        let second = generate(&snapshot, registry.shapes()).unwrap();
        assert_eq!(first.vertices, second.vertices);
        assert_eq!(first.indices, second.indices);

        let collider = pipeline.collider(section).unwrap();
        assert_eq!(
            collider.installed_hash(),
            Some(content_hash(&snapshot, registry.shapes()))
        );
        hashes.push(collider.installed_hash());
    }
    assert_eq!(hashes[0], hashes[1]);
}

#[test]
fn test_identical_sections_share_cached_mesh() {
    let (registry, blocks) = registry();
    let mut world = VoxelWorld::new(registry.clone(), -4, 4);
    let mut pipeline = TerrainPipeline::new(config(), registry).unwrap();

    let a = SectionPos::new(0, 0, 0);
    let b = SectionPos::new(5, 0, 5);
    world.load_section(a, terrain(blocks.stone), &mut pipeline);
    assert!(pipeline.wait_idle(TIMEOUT));
    world.load_section(b, terrain(blocks.stone), &mut pipeline);
    assert!(pipeline.wait_idle(TIMEOUT));

    let stats = pipeline.stats();
    assert_eq!(stats.generated, 1);
    assert_eq!(stats.cache_hits, 1);

    let mesh_a = pipeline.collider(a).unwrap().mesh().unwrap().clone();
    let mesh_b = pipeline.collider(b).unwrap().mesh().unwrap().clone();
    assert!(Arc::ptr_eq(&mesh_a, &mesh_b));
    assert_eq!(pipeline.cache().len(), 1);
}

#[test]
fn test_persistence_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, blocks) = registry();
    let section = SectionPos::new(1, 0, 1);
    let config = PipelineConfig {
        store_dir: Some(dir.path().to_path_buf()),
        ..config()
    };

    let hash = {
        let mut world = VoxelWorld::new(registry.clone(), -4, 4);
        let mut pipeline = TerrainPipeline::new(config.clone(), registry.clone()).unwrap();
        world.load_section(section, terrain(blocks.stone), &mut pipeline);
        assert!(pipeline.wait_idle(TIMEOUT));
        let hash = pipeline.collider(section).unwrap().installed_hash().unwrap();
        pipeline.shutdown();
        hash
    };

    let bytes = std::fs::read(dir.path().join(file_name(section.region()))).unwrap();
    let records = decode(&bytes).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, section);
    assert_eq!(records[0].1.hash, hash.short());

    // Fresh pipeline: empty cache, same store directory
    let mut world = VoxelWorld::new(registry.clone(), -4, 4);
    let mut pipeline = TerrainPipeline::new(config, registry).unwrap();
    world.load_section(section, terrain(blocks.stone), &mut pipeline);
    assert!(pipeline.wait_idle(TIMEOUT));

    let stats = pipeline.stats();
    assert_eq!(stats.store_hits, 1);
    assert_eq!(stats.generated, 0);
    let collider = pipeline.collider(section).unwrap();
    assert!(matches!(collider.mesh().unwrap().kind(), MeshKind::Boxes { .. }));

    // A stored record only answers for its own content hash
    let store = RegionStore::open(dir.path(), 4);
    let other = terrain_physics::terrain::ContentHash::from_raw(hash.raw().wrapping_add(1));
    assert!(store.load(section, other).is_none());
    assert!(store.load(section, hash).is_some());
}

#[test]
fn test_no_op_edit_installs_nothing() {
    let (registry, blocks) = registry();
    let mut world = VoxelWorld::new(registry.clone(), -4, 4);
    let mut pipeline = TerrainPipeline::new(config(), registry).unwrap();
    let mut executor = CommandExecutor::new(pipeline.commands());
    let mut recorder = Recorder::default();

    let section = SectionPos::new(0, 0, 0);
    world.load_section(section, terrain(blocks.stone), &mut pipeline);
    assert!(pipeline.wait_idle(TIMEOUT));
    executor.drain(&mut recorder);
    assert_eq!(recorder.count("install"), 1);

    // Same collision shape, different block
    world.edit_block(IVec3::new(4, 0, 4), blocks.granite, &mut pipeline);
    assert!(pipeline.wait_idle(TIMEOUT));
    assert_eq!(executor.drain(&mut recorder), 0);
    assert_eq!(recorder.count("install"), 1);
    assert_eq!(pipeline.stats().unchanged, 1);
    assert!(pipeline.collider(section).unwrap().state().is_ready());
}

#[test]
fn test_boundary_only_surfacing() {
    let registry = registry().0;
    let section = SectionPos::new(0, 0, 0);
    let full = || LocalPos::all().map(|local| (local, ShapeId::FULL));

    let enclosed = SectionSnapshot::from_cells(section, full(), Halo::solid());
    assert!(generate(&enclosed, registry.shapes()).is_none());

    let mut halo = Halo::solid();
    halo.clear_face(Face::Top);
    let exposed = SectionSnapshot::from_cells(section, full(), halo);
    let mesh = generate(&exposed, registry.shapes()).unwrap();
    assert_eq!(mesh.triangle_count(), 512);
}

#[test]
fn test_placeholder_continuity() {
    let (registry, blocks) = registry();
    let mut world = VoxelWorld::new(registry.clone(), -4, 4);
    let mut pipeline = TerrainPipeline::new(config(), registry).unwrap();
    let mut executor = CommandExecutor::new(pipeline.commands());
    let mut recorder = Recorder::default();

    let section = SectionPos::new(0, 0, 0);
    world.load_section(section, terrain(blocks.stone), &mut pipeline);

    // The body exists before any mesh is ready
    executor.drain(&mut recorder);
    assert_eq!(recorder.calls, vec!["create 1 8.5".to_string()]);

    assert!(pipeline.wait_idle(TIMEOUT));
    executor.drain(&mut recorder);

    // Dig into the floor; the old shape stays until the new one lands
    world.edit_block(IVec3::new(8, 1, 8), BlockId::AIR, &mut pipeline);
    assert_eq!(
        pipeline.collider(section).unwrap().state(),
        ColliderState::Generating
    );
    assert!(pipeline.collider(section).unwrap().mesh().is_some());
    assert!(pipeline.wait_idle(TIMEOUT));
    executor.drain(&mut recorder);

    assert_eq!(recorder.count("create"), 1);
    assert_eq!(recorder.count("install 1"), 2);
    assert_eq!(recorder.count("destroy"), 0);
}

#[test]
fn test_stale_results_are_discarded() {
    let (registry, blocks) = registry();
    let mut world = VoxelWorld::new(registry.clone(), -4, 4);
    let mut pipeline = TerrainPipeline::new(config(), registry.clone()).unwrap();

    let section = SectionPos::new(0, 0, 0);
    world.load_section(section, terrain(blocks.stone), &mut pipeline);
    world.edit_block(IVec3::new(8, 1, 8), BlockId::AIR, &mut pipeline);
    assert!(pipeline.wait_idle(TIMEOUT));

    assert_eq!(pipeline.stats().stale, 1);
    let snapshot = SectionSnapshot::capture(&world, section).unwrap();
    assert_eq!(
        pipeline.collider(section).unwrap().installed_hash(),
        Some(content_hash(&snapshot, registry.shapes()))
    );
}

#[test]
fn test_unloaded_section_results_are_dropped() {
    let (registry, blocks) = registry();
    let mut world = VoxelWorld::new(registry.clone(), -4, 4);
    let mut pipeline = TerrainPipeline::new(config(), registry).unwrap();
    let mut executor = CommandExecutor::new(pipeline.commands());
    let mut recorder = Recorder::default();

    let section = SectionPos::new(0, 0, 0);
    world.load_section(section, terrain(blocks.stone), &mut pipeline);
    world.unload_section(section, &mut pipeline);
    assert!(pipeline.wait_idle(TIMEOUT));
    executor.drain(&mut recorder);

    assert_eq!(pipeline.stats().dropped, 1);
    assert!(pipeline.collider(section).is_none());
    assert_eq!(recorder.calls, vec!["create 1 8.5".to_string(), "destroy 1".to_string()]);
}

#[test]
fn test_neighbor_load_hides_shared_face() {
    let (registry, blocks) = registry();
    let mut world = VoxelWorld::new(registry.clone(), -4, 4);
    let mut pipeline = TerrainPipeline::new(config(), registry).unwrap();

    let a = SectionPos::new(0, 0, 0);
    world.load_section(a, SectionCells::filled(blocks.stone), &mut pipeline);
    assert!(pipeline.wait_idle(TIMEOUT));
    let alone = pipeline.collider(a).unwrap().installed_hash();

    world.load_section(a.neighbor(Face::Right), SectionCells::filled(blocks.stone), &mut pipeline);
    assert!(pipeline.wait_idle(TIMEOUT));
    let collider = pipeline.collider(a).unwrap();
    assert_ne!(collider.installed_hash(), alone);
    assert_eq!(
        collider.mesh().unwrap().kind(),
        MeshKind::TriMesh { triangles: 5 * 512 }
    );
}

#[test]
fn test_stored_geometry_survives_reordered_registration() {
    let dir = tempfile::tempdir().unwrap();
    let section = SectionPos::new(0, 0, 0);
    let config = PipelineConfig {
        store_dir: Some(dir.path().to_path_buf()),
        ..config()
    };

    // Load one cell of slab or post, returning (store hits, generated, hash)
    let run = |post_first: bool, place_post: bool| {
        let (registry, slab, post) = shaped_registry(post_first);
        let mut cells = SectionCells::empty();
        cells.set(LocalPos::new(3, 3, 3), if place_post { post } else { slab });

        let mut world = VoxelWorld::new(registry.clone(), -4, 4);
        let mut pipeline = TerrainPipeline::new(config.clone(), registry).unwrap();
        world.load_section(section, cells, &mut pipeline);
        assert!(pipeline.wait_idle(TIMEOUT));
        let stats = pipeline.stats();
        let hash = pipeline.collider(section).unwrap().installed_hash().unwrap();
        pipeline.shutdown();
        (stats.store_hits, stats.generated, hash)
    };

    let (_, generated, slab_hash) = run(false, false);
    assert_eq!(generated, 1);

    // Same geometry under a different registration order reuses the record
    let (store_hits, generated, hash) = run(true, false);
    assert_eq!((store_hits, generated), (1, 0));
    assert_eq!(hash, slab_hash);

    // The post now holds the slab's old shape id but must not load its boxes
    let (store_hits, generated, post_hash) = run(true, true);
    assert_eq!((store_hits, generated), (0, 1));
    assert_ne!(post_hash, slab_hash);

    let bytes = std::fs::read(dir.path().join(file_name(section.region()))).unwrap();
    let records = decode(&bytes).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].1.hash, post_hash.short());
}
