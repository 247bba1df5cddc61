//! Residency map of chunks with world-coordinate access.
//!
//! The map itself lives under a reader-writer lock; each resident chunk is
//! shared through a reference-counted handle so a worker can keep a chunk
//! alive past eviction. The map lock is only ever held long enough to look a
//! handle up or to insert/remove an entry, never across cell operations, and
//! every per-cell read or write locks just the one chunk for the duration of
//! that single operation.
//!
//! Reads outside the vertical range, or of a non-resident chunk, return
//! air, full sunlight, and zero blocklight; writes there are dropped.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use glam::{IVec2, IVec3};

use crate::block::BlockId;
use crate::chunk::{Chunk, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, MAX_LIGHT};

pub type ChunkHandle = Arc<RwLock<Chunk>>;

/// Chunk coordinate containing world position `(x, z)`.
#[inline]
pub fn chunk_coord_at(x: i32, z: i32) -> IVec2 {
    IVec2::new(
        x.div_euclid(CHUNK_WIDTH as i32),
        z.div_euclid(CHUNK_DEPTH as i32),
    )
}

/// Local cell coordinates of world position `(x, y, z)` within its chunk.
#[inline]
pub fn local_coords(x: i32, y: i32, z: i32) -> (usize, usize, usize) {
    (
        x.rem_euclid(CHUNK_WIDTH as i32) as usize,
        y as usize,
        z.rem_euclid(CHUNK_DEPTH as i32) as usize,
    )
}

#[inline]
fn in_vertical_range(y: i32) -> bool {
    (0..CHUNK_HEIGHT as i32).contains(&y)
}

#[derive(Default)]
pub struct ChunkStore {
    chunks: RwLock<HashMap<IVec2, ChunkHandle>>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self { chunks: RwLock::new(HashMap::new()) }
    }

    pub fn insert(&self, chunk: Chunk) -> ChunkHandle {
        let coord = chunk.position();
        let handle = Arc::new(RwLock::new(chunk));
        self.map_write().insert(coord, Arc::clone(&handle));
        handle
    }

    pub fn remove(&self, coord: IVec2) -> Option<ChunkHandle> {
        self.map_write().remove(&coord)
    }

    pub fn contains(&self, coord: IVec2) -> bool {
        self.map_read().contains_key(&coord)
    }

    pub fn handle(&self, coord: IVec2) -> Option<ChunkHandle> {
        self.map_read().get(&coord).cloned()
    }

    pub fn len(&self) -> usize {
        self.map_read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map_read().is_empty()
    }

    pub fn clear(&self) {
        self.map_write().clear();
    }

    /// Snapshot of the resident coordinates.
    pub fn coords(&self) -> Vec<IVec2> {
        self.map_read().keys().copied().collect()
    }

    /// Snapshot of `(coord, handle)` pairs for iteration.
    pub fn chunks_snapshot(&self) -> Vec<(IVec2, ChunkHandle)> {
        self.map_read()
            .iter()
            .map(|(coord, handle)| (*coord, Arc::clone(handle)))
            .collect()
    }

    /// Handles of the 3x3 neighborhood around `center`, row-major in `z`
    /// then `x` (index `(dx + 1) + (dz + 1) * 3`).
    pub fn neighborhood(&self, center: IVec2) -> [Option<ChunkHandle>; 9] {
        let map = self.map_read();
        let mut handles: [Option<ChunkHandle>; 9] = Default::default();
        for dz in -1..=1 {
            for dx in -1..=1 {
                let slot = ((dx + 1) + (dz + 1) * 3) as usize;
                handles[slot] = map.get(&(center + IVec2::new(dx, dz))).cloned();
            }
        }
        handles
    }

    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        if !in_vertical_range(y) {
            return BlockId::Air;
        }
        match self.handle(chunk_coord_at(x, z)) {
            Some(handle) => {
                let (lx, ly, lz) = local_coords(x, y, z);
                read(&handle).block(lx, ly, lz)
            }
            None => BlockId::Air,
        }
    }

    /// Writes the block and reports whether the write landed.
    pub fn set_block(&self, x: i32, y: i32, z: i32, id: BlockId) -> bool {
        if !in_vertical_range(y) {
            return false;
        }
        match self.handle(chunk_coord_at(x, z)) {
            Some(handle) => {
                let (lx, ly, lz) = local_coords(x, y, z);
                write(&handle).set_block(lx, ly, lz, id);
                true
            }
            None => false,
        }
    }

    pub fn get_sunlight(&self, x: i32, y: i32, z: i32) -> u8 {
        if !in_vertical_range(y) {
            return MAX_LIGHT;
        }
        match self.handle(chunk_coord_at(x, z)) {
            Some(handle) => {
                let (lx, ly, lz) = local_coords(x, y, z);
                read(&handle).sunlight(lx, ly, lz)
            }
            None => MAX_LIGHT,
        }
    }

    pub fn get_blocklight(&self, x: i32, y: i32, z: i32) -> u8 {
        if !in_vertical_range(y) {
            return 0;
        }
        match self.handle(chunk_coord_at(x, z)) {
            Some(handle) => {
                let (lx, ly, lz) = local_coords(x, y, z);
                read(&handle).blocklight(lx, ly, lz)
            }
            None => 0,
        }
    }

    pub fn set_sunlight(&self, x: i32, y: i32, z: i32, level: u8) -> bool {
        if !in_vertical_range(y) {
            return false;
        }
        match self.handle(chunk_coord_at(x, z)) {
            Some(handle) => {
                let (lx, ly, lz) = local_coords(x, y, z);
                write(&handle).set_sunlight(lx, ly, lz, level);
                true
            }
            None => false,
        }
    }

    pub fn set_blocklight(&self, x: i32, y: i32, z: i32, level: u8) -> bool {
        if !in_vertical_range(y) {
            return false;
        }
        match self.handle(chunk_coord_at(x, z)) {
            Some(handle) => {
                let (lx, ly, lz) = local_coords(x, y, z);
                write(&handle).set_blocklight(lx, ly, lz, level);
                true
            }
            None => false,
        }
    }

    pub fn get_block_at(&self, pos: IVec3) -> BlockId {
        self.get_block(pos.x, pos.y, pos.z)
    }

    fn map_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<IVec2, ChunkHandle>> {
        self.chunks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn map_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<IVec2, ChunkHandle>> {
        self.chunks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn read(handle: &ChunkHandle) -> std::sync::RwLockReadGuard<'_, Chunk> {
    handle.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write(handle: &ChunkHandle) -> std::sync::RwLockWriteGuard<'_, Chunk> {
    handle.write().unwrap_or_else(PoisonError::into_inner)
}
