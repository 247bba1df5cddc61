//! Pipeline coordinator: residency, scheduling, and mesh application.
//!
//! One `World` owns the chunk store, a pool of mesher threads, and a single
//! lighting thread. The embedding host calls [`World::update`] every frame
//! from its main thread; everything the host must act on (upload a rebuilt
//! mesh, free an evicted chunk's buffers) is delivered through
//! [`WorldEvent`] callbacks on that same thread, so GPU work never leaves
//! the main thread.
//!
//! Data flow: the residency sweep generates missing chunks synchronously
//! and queues an initial-light job per new chunk. The lighting worker
//! drains those (and block-edit jobs) and marks stale chunks dirty. Each
//! tick the dirty set is folded into the meshing queue, deduplicated
//! against jobs already in flight, and finished meshes are applied
//! non-blockingly.
//!
//! Lock order, where two are ever held: store, then dirty set, then
//! meshing-job set. Queues are independent of all three.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::JoinHandle;

use glam::{IVec2, IVec3, Mat4, Vec3};
use math_util::{Aabb, Frustum};
use tracing::{debug, info, warn};

use crate::atlas::TextureAtlas;
use crate::block::{BlockId, BlockRegistry};
use crate::chunk::{CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH};
use crate::config::EngineOptions;
use crate::generator::{TerrainConfig, TerrainGenerator};
use crate::lighting::{LightEngine, LightJob};
use crate::meshing::{build_chunk_mesh, MeshBuffer, MeshData, MeshSettings, MeshView};
use crate::queue::JobQueue;
use crate::store::{chunk_coord_at, local_coords, ChunkStore};

/// Sentinel forcing the first `update` to run a full residency sweep.
const NO_CHUNK: IVec2 = IVec2::new(i32::MAX, i32::MAX);

/// Chunk coordinate under a world-space viewer position.
pub fn viewer_chunk(position: Vec3) -> IVec2 {
    chunk_coord_at(position.x.floor() as i32, position.z.floor() as i32)
}

/// World-space bounds of the chunk at `coord`.
pub fn chunk_aabb(coord: IVec2) -> Aabb {
    let min = Vec3::new(
        (coord.x * CHUNK_WIDTH as i32) as f32,
        0.0,
        (coord.y * CHUNK_DEPTH as i32) as f32,
    );
    let max = min + Vec3::new(CHUNK_WIDTH as f32, CHUNK_HEIGHT as f32, CHUNK_DEPTH as f32);
    Aabb::new(min, max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshPass {
    Opaque,
    Transparent,
}

/// Host-facing pipeline notifications, delivered on the calling thread.
pub enum WorldEvent<'a> {
    /// A rebuilt mesh is ready to upload; published atomically per chunk.
    MeshReady {
        coord: IVec2,
        opaque: &'a MeshBuffer,
        transparent: &'a MeshBuffer,
    },
    /// The chunk left residency; the host can free its buffers.
    ChunkUnloaded { coord: IVec2 },
}

/// Counter snapshot for debug HUDs and quiescence checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    pub chunks_generated: u64,
    pub light_jobs_done: u64,
    pub meshes_built: u64,
    pub meshes_applied: u64,
    pub pending_light_jobs: usize,
    pub pending_mesh_jobs: usize,
    pub resident_chunks: usize,
}

#[derive(Default)]
struct Counters {
    chunks_generated: AtomicU64,
    light_jobs_done: AtomicU64,
    meshes_built: AtomicU64,
    meshes_applied: AtomicU64,
    pending_light: AtomicUsize,
}

/// Finished mesh tagged with the reload generation it was built under, so
/// results outliving a `force_reload` are discarded instead of applied.
struct MeshResult {
    generation: u64,
    data: MeshData,
}

/// State shared between the coordinator and its workers.
struct Pipeline {
    store: Arc<ChunkStore>,
    options: RwLock<EngineOptions>,
    dirty: Mutex<HashSet<IVec2>>,
    meshing_jobs: Mutex<HashSet<IVec2>>,
    mesh_queue: JobQueue<IVec2>,
    finished_meshes: JobQueue<MeshResult>,
    light_queue: JobQueue<LightJob>,
    counters: Counters,
    generation: AtomicU64,
    running: AtomicBool,
}

impl Pipeline {
    fn mesh_settings(&self) -> MeshSettings {
        let options = *self.options.read().unwrap_or_else(PoisonError::into_inner);
        MeshSettings {
            use_greedy: options.use_greedy_mesher,
            smooth_lighting: options.smooth_lighting,
            leaf_quality: options.leaf_quality,
        }
    }

    fn options(&self) -> EngineOptions {
        *self.options.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct World {
    pipeline: Arc<Pipeline>,
    generator: TerrainGenerator,
    /// Applied meshes, main-thread only; swapped wholesale on apply.
    meshes: HashMap<IVec2, MeshData>,
    last_viewer_chunk: IVec2,
    workers: Vec<JoinHandle<()>>,
}

impl World {
    pub fn new(seed: u32, options: EngineOptions) -> Self {
        let pipeline = Arc::new(Pipeline {
            store: Arc::new(ChunkStore::new()),
            options: RwLock::new(options.clamped()),
            dirty: Mutex::new(HashSet::new()),
            meshing_jobs: Mutex::new(HashSet::new()),
            mesh_queue: JobQueue::new(),
            finished_meshes: JobQueue::new(),
            light_queue: JobQueue::new(),
            counters: Counters::default(),
            generation: AtomicU64::new(0),
            running: AtomicBool::new(true),
        });

        let mesher_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .max(1);
        let mut workers = Vec::with_capacity(mesher_count + 1);
        for index in 0..mesher_count {
            let pipeline = Arc::clone(&pipeline);
            let handle = std::thread::Builder::new()
                .name(format!("mesher-{index}"))
                .spawn(move || mesher_loop(&pipeline))
                .expect("failed to spawn mesher thread");
            workers.push(handle);
        }
        {
            let pipeline = Arc::clone(&pipeline);
            let handle = std::thread::Builder::new()
                .name("lighting".to_string())
                .spawn(move || lighting_loop(&pipeline))
                .expect("failed to spawn lighting thread");
            workers.push(handle);
        }
        info!(mesher_count, seed, "world pipeline started");

        Self {
            pipeline,
            generator: TerrainGenerator::new(TerrainConfig { seed, ..Default::default() }),
            meshes: HashMap::new(),
            last_viewer_chunk: NO_CHUNK,
            workers,
        }
    }

    /// Per-frame tick: residency sweep when the viewer crossed a chunk
    /// border, then schedule dirty chunks and apply finished meshes. Never
    /// blocks.
    pub fn update<F>(&mut self, viewer_position: Vec3, mut on_event: F)
    where
        F: FnMut(WorldEvent<'_>),
    {
        if !self.pipeline.running.load(Ordering::Acquire) {
            return;
        }
        let center = viewer_chunk(viewer_position);
        if center != self.last_viewer_chunk {
            self.residency_sweep(center, &mut on_event);
            self.last_viewer_chunk = center;
        }
        self.drain_dirty_into_mesh_queue();
        self.apply_finished_meshes(&mut on_event);
    }

    /// Schedule and apply without a residency sweep. `update` does this
    /// internally; hosts (and tests) can call it to drain the pipeline
    /// while the viewer is stationary.
    pub fn pump<F>(&mut self, mut on_event: F)
    where
        F: FnMut(WorldEvent<'_>),
    {
        self.drain_dirty_into_mesh_queue();
        self.apply_finished_meshes(&mut on_event);
    }

    /// Frustum-culled draw iteration: all opaque meshes front of the list,
    /// transparent meshes after, so the host can draw them in order.
    pub fn render<F>(&self, projection_view: Mat4, mut draw: F)
    where
        F: FnMut(IVec2, MeshPass),
    {
        let frustum = Frustum::from_view_projection(projection_view);
        let visible: Vec<(IVec2, &MeshData)> = self
            .meshes
            .iter()
            .filter(|(_, mesh)| !mesh.is_empty())
            .filter(|(coord, _)| frustum.intersects_aabb(&chunk_aabb(**coord)))
            .map(|(coord, mesh)| (*coord, mesh))
            .collect();

        for (coord, mesh) in &visible {
            if !mesh.opaque.is_empty() {
                draw(*coord, MeshPass::Opaque);
            }
        }
        for (coord, mesh) in &visible {
            if !mesh.transparent.is_empty() {
                draw(*coord, MeshPass::Transparent);
            }
        }
    }

    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.pipeline.store.get_block(x, y, z)
    }

    pub fn get_sunlight(&self, x: i32, y: i32, z: i32) -> u8 {
        self.pipeline.store.get_sunlight(x, y, z)
    }

    pub fn get_blocklight(&self, x: i32, y: i32, z: i32) -> u8 {
        self.pipeline.store.get_blocklight(x, y, z)
    }

    /// Interactive edit from the main thread. The target chunk is marked
    /// dirty immediately; the lighting worker extends the dirty set to
    /// every chunk the light change reaches.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
        if !self.pipeline.running.load(Ordering::Acquire) {
            return;
        }
        let old = self.pipeline.store.get_block(x, y, z);
        if old == id {
            return;
        }
        if !self.pipeline.store.set_block(x, y, z, id) {
            // Out of range or not resident: dropped.
            return;
        }

        self.pipeline
            .counters
            .pending_light
            .fetch_add(1, Ordering::AcqRel);
        self.pipeline.light_queue.push(LightJob::BlockChanged {
            pos: IVec3::new(x, y, z),
            old_id: old,
            new_id: id,
        });

        let coord = chunk_coord_at(x, z);
        let (lx, _, lz) = local_coords(x, y, z);
        let mut dirty = lock(&self.pipeline.dirty);
        dirty.insert(coord);
        // Border cells change faces of the adjacent chunk too.
        if lx == 0 {
            dirty.insert(coord + IVec2::new(-1, 0));
        }
        if lx == CHUNK_WIDTH - 1 {
            dirty.insert(coord + IVec2::new(1, 0));
        }
        if lz == 0 {
            dirty.insert(coord + IVec2::new(0, -1));
        }
        if lz == CHUNK_DEPTH - 1 {
            dirty.insert(coord + IVec2::new(0, 1));
        }
    }

    pub fn options(&self) -> EngineOptions {
        self.pipeline.options()
    }

    /// Replace the options; any actual change forces a full reload.
    pub fn set_options<F>(&mut self, options: EngineOptions, on_event: F)
    where
        F: FnMut(WorldEvent<'_>),
    {
        let options = options.clamped();
        let changed = {
            let mut guard = self
                .pipeline
                .options
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let changed = *guard != options;
            *guard = options;
            changed
        };
        if changed {
            info!(?options, "engine options changed");
            self.force_reload(on_event);
        }
    }

    /// Drop all residency and meshes; the next `update` rebuilds the world
    /// around the viewer from scratch.
    pub fn force_reload<F>(&mut self, mut on_event: F)
    where
        F: FnMut(WorldEvent<'_>),
    {
        info!("force reload");
        self.pipeline.generation.fetch_add(1, Ordering::AcqRel);

        // Stale light work is meaningless against a cleared store; wait out
        // the one possibly in-flight job so it cannot write into chunks
        // regenerated below.
        let discarded = self.pipeline.light_queue.clear();
        self.pipeline
            .counters
            .pending_light
            .fetch_sub(discarded, Ordering::AcqRel);
        while self.pipeline.counters.pending_light.load(Ordering::Acquire) > 0 {
            std::thread::yield_now();
        }

        // Queued mesh jobs are left alone: their results fail the
        // generation check in `apply_finished_meshes` and unblock the
        // in-flight set there.
        self.pipeline.store.clear();
        lock(&self.pipeline.dirty).clear();

        for coord in self.meshes.keys().copied().collect::<Vec<_>>() {
            on_event(WorldEvent::ChunkUnloaded { coord });
        }
        self.meshes.clear();
        self.last_viewer_chunk = NO_CHUNK;
    }

    /// Stop accepting work, poison the queues, and join every worker.
    /// Dropping the world calls this implicitly.
    pub fn stop(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        info!("stopping world pipeline");
        self.pipeline.running.store(false, Ordering::Release);
        self.pipeline.mesh_queue.stop();
        self.pipeline.light_queue.stop();
        self.pipeline.finished_meshes.stop();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread panicked before join");
            }
        }
    }

    /// True when no lighting or meshing work is queued, in flight, or
    /// waiting to be applied.
    pub fn is_idle(&self) -> bool {
        self.pipeline.counters.pending_light.load(Ordering::Acquire) == 0
            && lock(&self.pipeline.dirty).is_empty()
            && lock(&self.pipeline.meshing_jobs).is_empty()
            && self.pipeline.finished_meshes.is_empty()
    }

    pub fn stats(&self) -> PipelineStats {
        let counters = &self.pipeline.counters;
        PipelineStats {
            chunks_generated: counters.chunks_generated.load(Ordering::Relaxed),
            light_jobs_done: counters.light_jobs_done.load(Ordering::Relaxed),
            meshes_built: counters.meshes_built.load(Ordering::Relaxed),
            meshes_applied: counters.meshes_applied.load(Ordering::Relaxed),
            pending_light_jobs: counters.pending_light.load(Ordering::Acquire),
            pending_mesh_jobs: lock(&self.pipeline.meshing_jobs).len(),
            resident_chunks: self.pipeline.store.len(),
        }
    }

    pub fn resident_coords(&self) -> Vec<IVec2> {
        self.pipeline.store.coords()
    }

    fn residency_sweep(&mut self, center: IVec2, on_event: &mut dyn FnMut(WorldEvent<'_>)) {
        let radius = i32::from(self.pipeline.options().render_distance);

        let mut evicted = 0usize;
        for coord in self.pipeline.store.coords() {
            let delta = coord - center;
            if delta.x.abs().max(delta.y.abs()) > radius {
                self.pipeline.store.remove(coord);
                self.meshes.remove(&coord);
                on_event(WorldEvent::ChunkUnloaded { coord });
                evicted += 1;
            }
        }

        let mut missing = Vec::new();
        for cx in center.x - radius..=center.x + radius {
            for cz in center.y - radius..=center.y + radius {
                let coord = IVec2::new(cx, cz);
                if !self.pipeline.store.contains(coord) {
                    missing.push(coord);
                }
            }
        }
        // Nearest chunks first, so their light (and then meshes) arrive
        // before the horizon's.
        missing.sort_by_key(|coord| {
            let delta = *coord - center;
            delta.x.abs().max(delta.y.abs())
        });

        let loaded = missing.len();
        for (coord, chunk) in self.generator.generate_chunks_parallel(&missing) {
            self.pipeline.store.insert(chunk);
            self.pipeline
                .counters
                .chunks_generated
                .fetch_add(1, Ordering::Relaxed);
            self.pipeline
                .counters
                .pending_light
                .fetch_add(1, Ordering::AcqRel);
            self.pipeline
                .light_queue
                .push(LightJob::InitialLight { coord });
        }

        if loaded > 0 || evicted > 0 {
            debug!(?center, loaded, evicted, "residency sweep");
        }
    }

    fn drain_dirty_into_mesh_queue(&mut self) {
        let drained: Vec<IVec2> = {
            let mut dirty = lock(&self.pipeline.dirty);
            if dirty.is_empty() {
                return;
            }
            dirty.drain().collect()
        };

        // Resolve residency before taking the job-set lock; lock order is
        // store before meshing_jobs.
        let resident: Vec<IVec2> = drained
            .into_iter()
            .filter(|&coord| self.pipeline.store.contains(coord))
            .collect();

        let mut jobs = lock(&self.pipeline.meshing_jobs);
        for coord in resident {
            if jobs.insert(coord) {
                self.pipeline.mesh_queue.push(coord);
            }
        }
    }

    fn apply_finished_meshes(&mut self, on_event: &mut dyn FnMut(WorldEvent<'_>)) {
        while let Some(MeshResult { generation, data }) = self.pipeline.finished_meshes.try_pop()
        {
            let coord = data.coord;
            lock(&self.pipeline.meshing_jobs).remove(&coord);

            if generation != self.pipeline.generation.load(Ordering::Acquire) {
                debug!(?coord, "dropping mesh from a previous generation");
                continue;
            }
            if !self.pipeline.store.contains(coord) {
                debug!(?coord, "dropping mesh for evicted chunk");
                continue;
            }

            self.pipeline
                .counters
                .meshes_applied
                .fetch_add(1, Ordering::Relaxed);
            self.meshes.insert(coord, data);
            if let Some(mesh) = self.meshes.get(&coord) {
                on_event(WorldEvent::MeshReady {
                    coord,
                    opaque: &mesh.opaque,
                    transparent: &mesh.transparent,
                });
            }
        }
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.stop();
    }
}

fn mesher_loop(pipeline: &Pipeline) {
    let registry = BlockRegistry::global();
    let atlas = TextureAtlas::new_16x16();

    while pipeline.running.load(Ordering::Acquire) {
        let Some(coord) = pipeline.mesh_queue.wait_and_pop() else {
            break;
        };
        let generation = pipeline.generation.load(Ordering::Acquire);
        let settings = pipeline.mesh_settings();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let view = MeshView::capture(&pipeline.store, coord);
            build_chunk_mesh(&view, registry, &atlas, settings)
        }));
        match result {
            Ok(data) => {
                pipeline
                    .counters
                    .meshes_built
                    .fetch_add(1, Ordering::Relaxed);
                pipeline
                    .finished_meshes
                    .push(MeshResult { generation, data });
            }
            Err(_) => {
                // Keep the pool alive; just release the in-flight slot.
                warn!(?coord, "mesh job panicked");
                lock(&pipeline.meshing_jobs).remove(&coord);
            }
        }
    }
}

fn lighting_loop(pipeline: &Pipeline) {
    let engine = LightEngine::new(Arc::clone(&pipeline.store));

    while pipeline.running.load(Ordering::Acquire) {
        let Some(job) = pipeline.light_queue.wait_and_pop() else {
            break;
        };
        let result = catch_unwind(AssertUnwindSafe(|| engine.run(&job)));
        match result {
            Ok(dirty) => {
                lock(&pipeline.dirty).extend(dirty);
                pipeline
                    .counters
                    .light_jobs_done
                    .fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => warn!("light job panicked"),
        }
        // After the dirty set is extended, so idleness is never observed
        // between the two.
        pipeline
            .counters
            .pending_light
            .fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_chunk_floors_into_the_grid() {
        assert_eq!(viewer_chunk(Vec3::new(0.5, 40.0, 0.5)), IVec2::new(0, 0));
        assert_eq!(viewer_chunk(Vec3::new(15.9, 0.0, 15.9)), IVec2::new(0, 0));
        assert_eq!(viewer_chunk(Vec3::new(16.1, 0.0, 0.0)), IVec2::new(1, 0));
        assert_eq!(viewer_chunk(Vec3::new(-0.1, 0.0, -16.5)), IVec2::new(-1, -2));
        assert_eq!(viewer_chunk(Vec3::new(80.5, 64.0, 0.5)), IVec2::new(5, 0));
    }

    #[test]
    fn chunk_aabb_spans_the_world_box() {
        let aabb = chunk_aabb(IVec2::new(-1, 2));
        assert_eq!(aabb.min, Vec3::new(-16.0, 0.0, 32.0));
        assert_eq!(aabb.max, Vec3::new(0.0, 64.0, 48.0));
    }
}
