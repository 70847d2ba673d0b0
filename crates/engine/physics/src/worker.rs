//! Background workers: hashing, cache/store lookup, and mesh generation
//!
//! Workers never touch the live world or the simulation. They receive a
//! snapshot, resolve it to a mesh (or to "nothing to do"), and report back
//! tagged with the dispatch generation.

use crate::error::{MeshError, PipelineError};
use crate::store::RegionStore;
use crate::terrain::{
    collision_boxes, content_hash, generate, CollisionMesh, ContentHash, MeshRef, SectionSnapshot,
    ShapeCache,
};
use crossbeam_channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};
use voxel::{BlockRegistry, SectionPos};

/// Work item for one section
#[derive(Debug)]
pub struct MeshJob {
    pub section: SectionPos,
    pub generation: u64,
    pub snapshot: SectionSnapshot,
    /// Hash of the geometry the collider currently holds
    pub installed_hash: Option<ContentHash>,
}

/// Where a ready mesh came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshSource {
    Cache,
    Store,
    Generated,
}

/// Resolution of a [`MeshJob`]
#[derive(Debug)]
pub enum JobOutcome {
    /// Content matches what is installed
    Unchanged { hash: ContentHash },
    /// No exposed geometry; the section needs no body
    Empty { hash: ContentHash },
    Ready { mesh: MeshRef, source: MeshSource },
    Failed {
        hash: Option<ContentHash>,
        error: MeshError,
    },
}

#[derive(Debug)]
pub struct JobResult {
    pub section: SectionPos,
    pub generation: u64,
    pub outcome: JobOutcome,
}

/// Services shared by every worker
pub struct WorkerContext {
    pub cache: Arc<ShapeCache>,
    pub store: Arc<RegionStore>,
    pub registry: Arc<BlockRegistry>,
}

/// Resolve a job to an outcome
///
/// Lookup order: installed hash, shape cache, region store, fresh generation.
pub fn process(ctx: &WorkerContext, job: &MeshJob) -> JobOutcome {
    let shapes = ctx.registry.shapes();
    let hash = content_hash(&job.snapshot, shapes);
    if job.installed_hash == Some(hash) {
        return JobOutcome::Unchanged { hash };
    }

    if let Some(mesh) = ctx.cache.get(hash) {
        return JobOutcome::Ready {
            mesh,
            source: MeshSource::Cache,
        };
    }

    if let Some(boxes) = ctx.store.load(job.section, hash) {
        if boxes.is_empty() {
            return JobOutcome::Empty { hash };
        }
        match CollisionMesh::from_boxes(&boxes, hash) {
            Ok(mesh) => {
                return JobOutcome::Ready {
                    mesh: ctx.cache.put(hash, Arc::new(mesh)),
                    source: MeshSource::Store,
                };
            }
            Err(err) => {
                warn!(section = ?job.section, error = %err, "stored geometry unusable, regenerating");
            }
        }
    }

    let Some(section_mesh) = generate(&job.snapshot, shapes) else {
        ctx.store.save(job.section, hash, Vec::new());
        return JobOutcome::Empty { hash };
    };

    match CollisionMesh::from_mesh(&section_mesh, hash) {
        Ok(mesh) => {
            ctx.store
                .save(job.section, hash, collision_boxes(&job.snapshot, shapes));
            JobOutcome::Ready {
                mesh: ctx.cache.put(hash, Arc::new(mesh)),
                source: MeshSource::Generated,
            }
        }
        Err(error) => JobOutcome::Failed {
            hash: Some(hash),
            error,
        },
    }
}

/// Fixed pool of named worker threads fed through a FIFO job channel
pub struct WorkerPool {
    jobs: Option<Sender<MeshJob>>,
    results: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers (at least one)
    pub fn new(threads: usize, ctx: WorkerContext) -> Result<Self, PipelineError> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<MeshJob>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<JobResult>();
        let ctx = Arc::new(ctx);

        let threads = threads.max(1);
        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let ctx = ctx.clone();
            let handle = thread::Builder::new()
                .name(format!("collider-worker-{index}"))
                .spawn(move || worker_loop(&ctx, job_rx, result_tx))
                .map_err(PipelineError::WorkerSpawn)?;
            workers.push(handle);
        }
        debug!(threads, "collider workers started");

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            workers,
        })
    }

    /// Queue a job; returns false once the pool is shut down
    pub fn dispatch(&self, job: MeshJob) -> bool {
        match &self.jobs {
            Some(jobs) => jobs.send(job).is_ok(),
            None => false,
        }
    }

    pub fn results(&self) -> &Receiver<JobResult> {
        &self.results
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting jobs, let queued ones finish, and join every worker
    pub fn shutdown(&mut self) {
        self.jobs = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("collider worker exited by panic");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(ctx: &WorkerContext, jobs: Receiver<MeshJob>, results: Sender<JobResult>) {
    for job in jobs.iter() {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| process(ctx, &job))) {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(section = ?job.section, "collider worker panicked while meshing");
                JobOutcome::Failed {
                    hash: None,
                    error: MeshError::Degenerate("worker panicked".to_string()),
                }
            }
        };

        let result = JobResult {
            section: job.section,
            generation: job.generation,
            outcome,
        };
        if results.send(result).is_err() {
            // Pipeline is gone
            return;
        }
    }
}
