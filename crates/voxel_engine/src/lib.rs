#![forbid(unsafe_code)]

//! Concurrent chunk pipeline for a voxel world.
//!
//! A viewer moves through an infinite procedurally generated world; this
//! crate streams chunks in and out of residency, floods a two-channel
//! (sunlight + block emission) light field across them, rebuilds render
//! geometry for every chunk whose blocks or light changed, and answers
//! random-access block queries from an interactive editor thread. The
//! embedding host supplies a viewer position each frame and consumes mesh
//! buffers through upload callbacks; windowing and GPU work stay on the
//! host side of that boundary.

pub mod atlas;
pub mod block;
pub mod chunk;
pub mod config;
pub mod generator;
pub mod lighting;
pub mod meshing;
pub mod queue;
pub mod store;
pub mod world;

pub use atlas::{AtlasRect, TextureAtlas, ATLAS_TILES};
pub use block::{
    should_render_face, BlockData, BlockId, BlockRegistry, LeafQuality, FACE_COUNT, FACE_NORMALS,
};
pub use chunk::{
    blocklight_of, pack_light, sunlight_of, Chunk, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_VOLUME,
    CHUNK_WIDTH, MAX_LIGHT,
};
pub use config::{EngineOptions, Settings, SettingsError, MAX_RENDER_DISTANCE, MIN_RENDER_DISTANCE};
pub use generator::{Biome, TerrainConfig, TerrainGenerator};
pub use lighting::{LightEngine, LightJob};
pub use meshing::{
    build_chunk_mesh, greedy_mesh, simple_mesh, MeshBuffer, MeshData, MeshSettings, MeshView,
    VERTEX_STRIDE,
};
pub use queue::JobQueue;
pub use store::{chunk_coord_at, local_coords, ChunkHandle, ChunkStore};
pub use world::{chunk_aabb, viewer_chunk, MeshPass, PipelineStats, World, WorldEvent};
