//! Two-channel cellular light field: sunlight and block emission.
//!
//! Both channels are 4-bit and propagate by breadth-first flood fill
//! through cells that are transparent for lighting, losing one level per
//! step. Sunlight has one extra rule: a full-strength (15) level falling
//! straight down keeps its strength, so open sky columns stay uniformly
//! lit. Removal uses the same downward stencil, otherwise a shadow could
//! not be undone by the inverse edit.
//!
//! Edits run as a lazy incremental pass: a removal flood first zeroes every
//! cell whose light depended on the removed level (re-seeding propagation
//! from any brighter frontier it meets), then a propagation flood fills the
//! field back in.
//!
//! Every cell access goes through the chunk store and takes its per-call
//! lock; a single lighting worker keeps the field serially consistent
//! without any long-held locks.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use glam::{IVec2, IVec3};

use crate::block::{BlockId, BlockRegistry, FACE_NORMALS};
use crate::chunk::{CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, MAX_LIGHT};
use crate::store::{chunk_coord_at, write, ChunkStore};

/// Work item for the lighting worker.
#[derive(Debug, Clone)]
pub enum LightJob {
    /// Seed and propagate both channels of a freshly generated chunk.
    InitialLight { coord: IVec2 },
    /// Incrementally update the field after one block edit.
    BlockChanged { pos: IVec3, old_id: BlockId, new_id: BlockId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Sun,
    Block,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    pos: IVec3,
    level: u8,
}

pub struct LightEngine {
    store: Arc<ChunkStore>,
    registry: &'static BlockRegistry,
}

impl LightEngine {
    pub fn new(store: Arc<ChunkStore>) -> Self {
        Self { store, registry: BlockRegistry::global() }
    }

    /// Run one job to completion. Returns the set of chunks whose meshes are
    /// now stale: every chunk with a touched cell plus its four horizontal
    /// neighbors.
    pub fn run(&self, job: &LightJob) -> HashSet<IVec2> {
        let mut touched = HashSet::new();
        match *job {
            LightJob::InitialLight { coord } => self.initial_light(coord, &mut touched),
            LightJob::BlockChanged { pos, old_id, new_id } => {
                self.block_changed(pos, old_id, new_id, &mut touched)
            }
        }
        expand_dirty(&touched)
    }

    fn initial_light(&self, coord: IVec2, touched: &mut HashSet<IVec2>) {
        // The new chunk and its neighbors always need fresh meshes, even if
        // no cell ends up lit: boundary faces changed when it appeared.
        touched.insert(coord);

        let Some(handle) = self.store.handle(coord) else {
            return; // Evicted before the job ran.
        };

        let mut sun_frontier = VecDeque::new();
        let mut block_frontier = VecDeque::new();
        let origin = {
            let mut chunk = write(&handle);
            let origin = chunk.world_origin();

            for x in 0..CHUNK_WIDTH {
                for z in 0..CHUNK_DEPTH {
                    // Full-strength sunlight from the sky down to the first
                    // opaque cell; everything beneath stays dark until
                    // horizontal propagation reaches it.
                    for y in (0..CHUNK_HEIGHT).rev() {
                        if !chunk.block(x, y, z).transparent_for_lighting() {
                            break;
                        }
                        chunk.set_sunlight(x, y, z, MAX_LIGHT);
                        sun_frontier.push_back(Node {
                            pos: origin + IVec3::new(x as i32, y as i32, z as i32),
                            level: MAX_LIGHT,
                        });
                    }

                    for y in 0..CHUNK_HEIGHT {
                        let emission = self.registry.emission(chunk.block(x, y, z));
                        if emission > 0 {
                            chunk.set_blocklight(x, y, z, emission);
                            block_frontier.push_back(Node {
                                pos: origin + IVec3::new(x as i32, y as i32, z as i32),
                                level: emission,
                            });
                        }
                    }
                }
            }
            origin
        };

        // Pull already-computed light in from resident neighbors, so a chunk
        // appearing next to a lit cave mouth or a torch is flowed into.
        self.seed_from_borders(origin, &mut sun_frontier, &mut block_frontier);

        self.propagate(Channel::Sun, sun_frontier, touched);
        self.propagate(Channel::Block, block_frontier, touched);
    }

    /// Enqueue lit cells in the one-cell shell around the chunk at `origin`.
    fn seed_from_borders(
        &self,
        origin: IVec3,
        sun_frontier: &mut VecDeque<Node>,
        block_frontier: &mut VecDeque<Node>,
    ) {
        let width = CHUNK_WIDTH as i32;
        let depth = CHUNK_DEPTH as i32;
        let mut visit = |pos: IVec3| {
            let sun = self.store.get_sunlight(pos.x, pos.y, pos.z);
            if sun > 1 {
                sun_frontier.push_back(Node { pos, level: sun });
            }
            let block = self.store.get_blocklight(pos.x, pos.y, pos.z);
            if block > 1 {
                block_frontier.push_back(Node { pos, level: block });
            }
        };

        for y in 0..CHUNK_HEIGHT as i32 {
            for z in 0..depth {
                visit(origin + IVec3::new(-1, y, z));
                visit(origin + IVec3::new(width, y, z));
            }
            for x in 0..width {
                visit(origin + IVec3::new(x, y, -1));
                visit(origin + IVec3::new(x, y, depth));
            }
        }
    }

    fn block_changed(
        &self,
        pos: IVec3,
        old_id: BlockId,
        new_id: BlockId,
        touched: &mut HashSet<IVec2>,
    ) {
        touched.insert(chunk_coord_at(pos.x, pos.z));

        let old_emission = self.registry.emission(old_id);
        let new_emission = self.registry.emission(new_id);
        let now_opaque = !new_id.transparent_for_lighting();
        let opened = new_id.transparent_for_lighting() && !old_id.transparent_for_lighting();

        // Block channel.
        let mut removal = VecDeque::new();
        let mut frontier = VecDeque::new();

        if old_emission > 0 {
            self.set(Channel::Block, pos, 0, touched);
            removal.push_back(Node { pos, level: old_emission });
        }
        if now_opaque {
            let prior = self.get(Channel::Block, pos);
            if prior > 0 {
                self.set(Channel::Block, pos, 0, touched);
                removal.push_back(Node { pos, level: prior });
            }
        }
        if new_emission > 0 {
            self.set(Channel::Block, pos, new_emission, touched);
            frontier.push_back(Node { pos, level: new_emission });
        }
        if opened {
            for offset in FACE_NORMALS {
                let neighbor = pos + offset;
                let level = self.get(Channel::Block, neighbor);
                if level > 1 {
                    frontier.push_back(Node { pos: neighbor, level });
                }
            }
        }
        self.remove(Channel::Block, removal, &mut frontier, touched);
        self.propagate(Channel::Block, frontier, touched);

        // Sun channel.
        let mut removal = VecDeque::new();
        let mut frontier = VecDeque::new();

        if now_opaque {
            let prior = self.get(Channel::Sun, pos);
            if prior > 0 {
                self.set(Channel::Sun, pos, 0, touched);
                removal.push_back(Node { pos, level: prior });
            }
        }
        if opened {
            for offset in FACE_NORMALS {
                let neighbor = pos + offset;
                let level = self.get(Channel::Sun, neighbor);
                if level > 0 {
                    frontier.push_back(Node { pos: neighbor, level });
                }
            }
        }
        self.remove(Channel::Sun, removal, &mut frontier, touched);
        self.propagate(Channel::Sun, frontier, touched);
    }

    fn propagate(
        &self,
        channel: Channel,
        mut frontier: VecDeque<Node>,
        touched: &mut HashSet<IVec2>,
    ) {
        while let Some(node) = frontier.pop_front() {
            for offset in FACE_NORMALS {
                let neighbor = node.pos + offset;
                if neighbor.y < 0 || neighbor.y >= CHUNK_HEIGHT as i32 {
                    continue;
                }
                if !self.store.get_block_at(neighbor).transparent_for_lighting() {
                    continue;
                }

                // Full sunlight falls without attenuation.
                let next = if channel == Channel::Sun && offset.y == -1 && node.level == MAX_LIGHT
                {
                    MAX_LIGHT
                } else {
                    node.level - 1
                };
                if next == 0 || self.get(channel, neighbor) >= next {
                    continue;
                }
                if self.set(channel, neighbor, next, touched) {
                    frontier.push_back(Node { pos: neighbor, level: next });
                }
            }
        }
    }

    /// Zero out every cell lit (directly or transitively) from the removed
    /// levels. Cells at least as bright as the removal front were lit from
    /// elsewhere; they become seeds for the follow-up propagation.
    fn remove(
        &self,
        channel: Channel,
        mut removal: VecDeque<Node>,
        frontier: &mut VecDeque<Node>,
        touched: &mut HashSet<IVec2>,
    ) {
        while let Some(node) = removal.pop_front() {
            for offset in FACE_NORMALS {
                let neighbor = node.pos + offset;
                if neighbor.y < 0 || neighbor.y >= CHUNK_HEIGHT as i32 {
                    continue;
                }
                let level = self.get(channel, neighbor);
                if level == 0 {
                    continue;
                }

                // The downward stencil must mirror propagation, or a
                // full-strength beam could never be torn down.
                let undiminished_beam =
                    channel == Channel::Sun && offset.y == -1 && node.level == MAX_LIGHT;
                if level < node.level || undiminished_beam {
                    if self.set(channel, neighbor, 0, touched) {
                        removal.push_back(Node { pos: neighbor, level });
                    }
                } else {
                    frontier.push_back(Node { pos: neighbor, level });
                }
            }
        }
    }

    fn get(&self, channel: Channel, pos: IVec3) -> u8 {
        match channel {
            Channel::Sun => self.store.get_sunlight(pos.x, pos.y, pos.z),
            Channel::Block => self.store.get_blocklight(pos.x, pos.y, pos.z),
        }
    }

    fn set(&self, channel: Channel, pos: IVec3, level: u8, touched: &mut HashSet<IVec2>) -> bool {
        let landed = match channel {
            Channel::Sun => self.store.set_sunlight(pos.x, pos.y, pos.z, level),
            Channel::Block => self.store.set_blocklight(pos.x, pos.y, pos.z, level),
        };
        if landed {
            touched.insert(chunk_coord_at(pos.x, pos.z));
        }
        landed
    }
}

/// A touched chunk dirties itself and its four horizontal neighbors, since
/// border faces sample light across the seam.
fn expand_dirty(touched: &HashSet<IVec2>) -> HashSet<IVec2> {
    let mut dirty = HashSet::with_capacity(touched.len() * 5);
    for &coord in touched {
        dirty.insert(coord);
        dirty.insert(coord + IVec2::new(1, 0));
        dirty.insert(coord + IVec2::new(-1, 0));
        dirty.insert(coord + IVec2::new(0, 1));
        dirty.insert(coord + IVec2::new(0, -1));
    }
    dirty
}
