//! Procedural terrain generation.
//!
//! A pure function of `(chunk coordinate, seed)`: five noise fields
//! (continentalness, domain-warped fractal base terrain, ridged mountains,
//! warp offsets, biome selector) produce a per-column surface height; biome
//! heights blend linearly across thresholds so coastlines and biome borders
//! have no seams. Tree placement and bedrock scatter are driven by integer
//! hashes of the world coordinates, so two runs over the same coordinate are
//! byte-identical.

use glam::IVec2;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin, RidgedMulti, Simplex};
use rayon::prelude::*;

use crate::block::BlockId;
use crate::chunk::{Chunk, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH};

#[derive(Debug, Clone)]
pub struct TerrainConfig {
    pub seed: u32,
    /// Water surface height; doubles as the base land height.
    pub sea_level: i32,
    /// Deep ocean floor height.
    pub deep_sea_level: i32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self { seed: 1337, sea_level: 32, deep_sea_level: 20 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Biome {
    Ocean,
    Plains,
    Forest,
}

pub struct TerrainGenerator {
    config: TerrainConfig,
    continentalness: Simplex,
    terrain: Fbm<Perlin>,
    mountains: RidgedMulti<Perlin>,
    warp_x: Perlin,
    warp_z: Perlin,
    biome: Simplex,
}

const CONTINENT_FREQ: f64 = 0.0008;
const BIOME_FREQ: f64 = 0.0015;
const WARP_FREQ: f64 = 0.005;
const WARP_AMPLITUDE: f64 = 35.0;

const CONTINENT_THRESHOLD: f64 = 0.45;
const PLAINS_THRESHOLD: f64 = 0.4;
const FOREST_THRESHOLD: f64 = 0.6;

impl TerrainGenerator {
    pub fn new(config: TerrainConfig) -> Self {
        let seed = config.seed;
        Self {
            continentalness: Simplex::new(seed),
            terrain: Fbm::new(seed.wrapping_add(1))
                .set_octaves(5)
                .set_frequency(0.004),
            mountains: RidgedMulti::new(seed.wrapping_add(2))
                .set_octaves(6)
                .set_frequency(0.003),
            warp_x: Perlin::new(seed.wrapping_add(3)),
            warp_z: Perlin::new(seed.wrapping_add(4)),
            biome: Simplex::new(seed.wrapping_add(5)),
            config,
        }
    }

    pub fn seed(&self) -> u32 {
        self.config.seed
    }

    /// Generate the chunk at `coord`. Deterministic per `(coord, seed)`.
    pub fn generate_chunk(&self, coord: IVec2) -> Chunk {
        let mut chunk = Chunk::new(coord);
        let mut biome_map = [[Biome::Ocean; CHUNK_DEPTH]; CHUNK_WIDTH];

        let sea = self.config.sea_level;
        let deep = self.config.deep_sea_level;
        let height_limit = CHUNK_HEIGHT as i32;

        for x in 0..CHUNK_WIDTH {
            for z in 0..CHUNK_DEPTH {
                let wx = f64::from(coord.x * CHUNK_WIDTH as i32 + x as i32);
                let wz = f64::from(coord.y * CHUNK_DEPTH as i32 + z as i32);

                let continentalness = unit(self
                    .continentalness
                    .get([wx * CONTINENT_FREQ, wz * CONTINENT_FREQ]));
                let biome_value = unit(self.biome.get([wx * BIOME_FREQ, wz * BIOME_FREQ]));

                // Domain warp before sampling the terrain fields.
                let warped_x =
                    wx + self.warp_x.get([wx * WARP_FREQ, wz * WARP_FREQ]) * WARP_AMPLITUDE;
                let warped_z =
                    wz + self.warp_z.get([wx * WARP_FREQ, wz * WARP_FREQ]) * WARP_AMPLITUDE;

                let base_terrain = unit(self.terrain.get([warped_x, warped_z]));
                let mountains = unit(self.mountains.get([warped_x, warped_z]));

                let plains_height = base_terrain.powf(1.5) * 0.9;
                let forest_mountain_blend = base_terrain.max(mountains * 1.2);
                let forest_height = lerp(
                    base_terrain.powf(1.5),
                    forest_mountain_blend,
                    ((mountains - 0.1).max(0.0)) * 1.2,
                );

                let (current_biome, land_height_noise) = if continentalness < CONTINENT_THRESHOLD
                {
                    (Biome::Ocean, 0.0)
                } else if biome_value < PLAINS_THRESHOLD {
                    (Biome::Plains, plains_height)
                } else if biome_value > FOREST_THRESHOLD {
                    (Biome::Forest, forest_height)
                } else {
                    // Blend band between the biome thresholds.
                    let blend =
                        (biome_value - PLAINS_THRESHOLD) / (FOREST_THRESHOLD - PLAINS_THRESHOLD);
                    let biome = if biome_value < 0.5 { Biome::Plains } else { Biome::Forest };
                    (biome, lerp(plains_height, forest_height, blend))
                };
                biome_map[x][z] = current_biome;

                let land_height =
                    sea + (land_height_noise * f64::from(height_limit - sea - 5)) as i32;
                let sea_floor = deep + (base_terrain * f64::from(sea - deep)) as i32;

                let surface = if current_biome == Biome::Ocean {
                    sea_floor
                } else {
                    // Fade the coastline from sea floor to land height.
                    let blend = ((continentalness - CONTINENT_THRESHOLD) / 0.1).min(1.0);
                    lerp(f64::from(sea_floor), f64::from(land_height), blend) as i32
                };
                let surface = surface.clamp(1, height_limit - 1);

                for y in 0..CHUNK_HEIGHT {
                    let wy = y as i32;
                    let block = if wy > surface {
                        if wy <= sea {
                            // Water stand-in.
                            BlockId::Stone
                        } else {
                            BlockId::Air
                        }
                    } else if wy == surface {
                        if wy >= sea && wy < sea + 2 {
                            // Beach band.
                            BlockId::Dirt
                        } else {
                            BlockId::Grass
                        }
                    } else if wy > surface - 4 {
                        BlockId::Dirt
                    } else {
                        BlockId::Stone
                    };
                    chunk.set_block(x, y, z, block);
                }
            }
        }

        self.place_trees(&mut chunk, &biome_map);
        self.place_bedrock(&mut chunk);
        chunk
    }

    /// Generate a batch of chunks across the thread pool, nearest jobs first
    /// being the caller's responsibility.
    pub fn generate_chunks_parallel(&self, coords: &[IVec2]) -> Vec<(IVec2, Chunk)> {
        coords
            .par_iter()
            .map(|&coord| (coord, self.generate_chunk(coord)))
            .collect()
    }

    fn place_trees(&self, chunk: &mut Chunk, biome_map: &[[Biome; CHUNK_DEPTH]; CHUNK_WIDTH]) {
        // Trunks stay two cells inside the chunk so crowns never cross the
        // border.
        for x in 2..CHUNK_WIDTH - 2 {
            for z in 2..CHUNK_DEPTH - 2 {
                let mut top = CHUNK_HEIGHT as i32 - 1;
                while top >= 0 && chunk.block(x, top as usize, z).is_air() {
                    top -= 1;
                }
                if top < 0 || chunk.block(x, top as usize, z) != BlockId::Grass {
                    continue;
                }

                let coord = chunk.position();
                let wx = coord.x * CHUNK_WIDTH as i32 + x as i32;
                let wz = coord.y * CHUNK_DEPTH as i32 + z as i32;
                let hash = (wx.wrapping_mul(18397) ^ wz.wrapping_mul(38183)) as u32
                    ^ self.config.seed;

                let place = match biome_map[x][z] {
                    Biome::Forest => hash % 100 < 6,
                    Biome::Plains => hash % 500 < 1,
                    Biome::Ocean => false,
                };
                if place {
                    self.place_tree(chunk, x, (top + 1) as usize, z, hash);
                }
            }
        }
    }

    fn place_tree(&self, chunk: &mut Chunk, x: usize, y: usize, z: usize, hash: u32) {
        let height = 4 + (hash >> 8) as usize % 3;
        if y + height + 2 >= CHUNK_HEIGHT {
            return;
        }
        for dy in 1..height + 2 {
            if !chunk.block(x, y + dy, z).is_air() {
                return;
            }
        }

        chunk.set_block(x, y - 1, z, BlockId::Dirt);
        for dy in 0..height {
            chunk.set_block(x, y + dy, z, BlockId::OakLog);
        }

        let mut leaf = |lx: i32, ly: i32, lz: i32, chunk: &mut Chunk| {
            if lx < 0
                || lx >= CHUNK_WIDTH as i32
                || lz < 0
                || lz >= CHUNK_DEPTH as i32
                || ly < 0
                || ly >= CHUNK_HEIGHT as i32
            {
                return;
            }
            if chunk.block(lx as usize, ly as usize, lz as usize).is_air() {
                chunk.set_block(lx as usize, ly as usize, lz as usize, BlockId::OakLeaves);
            }
        };

        let (x, y, z) = (x as i32, y as i32, z as i32);
        let height = height as i32;

        // Wide crown layers two below the top.
        for ly in y + height - 2..=y + height - 1 {
            for dx in -2..=2 {
                for dz in -2..=2 {
                    if (dx == 0 && dz == 0) || (i32::abs(dx) == 2 && i32::abs(dz) == 2) {
                        continue;
                    }
                    leaf(x + dx, ly, z + dz, chunk);
                }
            }
        }

        // Narrow cap on top of the trunk.
        for dx in -1..=1 {
            for dz in -1..=1 {
                leaf(x + dx, y + height, z + dz, chunk);
            }
        }

        // Plus-shaped tip.
        let tip = y + height + 1;
        leaf(x, tip, z, chunk);
        leaf(x + 1, tip, z, chunk);
        leaf(x - 1, tip, z, chunk);
        leaf(x, tip, z + 1, chunk);
        leaf(x, tip, z - 1, chunk);
    }

    fn place_bedrock(&self, chunk: &mut Chunk) {
        let coord = chunk.position();
        for x in 0..CHUNK_WIDTH {
            for z in 0..CHUNK_DEPTH {
                chunk.set_block(x, 0, z, BlockId::Bedrock);

                let wx = coord.x * CHUNK_WIDTH as i32 + x as i32;
                let wz = coord.y * CHUNK_DEPTH as i32 + z as i32;
                // Thinning scatter above the floor layer.
                for (y, chance) in [(1usize, 35u32), (2, 20), (3, 10)] {
                    if scatter_hash(wx, y as i32, wz, self.config.seed) % 100 < chance {
                        chunk.set_block(x, y, z, BlockId::Bedrock);
                    }
                }
            }
        }
    }
}

impl Default for TerrainGenerator {
    fn default() -> Self {
        Self::new(TerrainConfig::default())
    }
}

/// Map a noise sample from `[-1, 1]` to `[0, 1]`.
#[inline]
fn unit(sample: f64) -> f64 {
    (sample + 1.0) * 0.5
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Integer mix for per-cell deterministic scatter.
fn scatter_hash(x: i32, y: i32, z: i32, seed: u32) -> u32 {
    let mut n = x
        .wrapping_mul(374_761_393)
        .wrapping_add(y.wrapping_mul(668_265_263))
        .wrapping_add(z.wrapping_mul(974_637_121))
        .wrapping_add(seed as i32);
    n = (n ^ (n >> 13)).wrapping_mul(1_274_126_177);
    (n ^ (n >> 16)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let generator = TerrainGenerator::default();
        let a = generator.generate_chunk(IVec2::new(3, -7));
        let b = generator.generate_chunk(IVec2::new(3, -7));
        assert_eq!(a.blocks().as_slice(), b.blocks().as_slice());

        // A second generator with the same seed agrees too.
        let other = TerrainGenerator::new(TerrainConfig::default());
        let c = other.generate_chunk(IVec2::new(3, -7));
        assert_eq!(a.blocks().as_slice(), c.blocks().as_slice());
    }

    #[test]
    fn different_seeds_differ() {
        let a = TerrainGenerator::new(TerrainConfig { seed: 1, ..Default::default() })
            .generate_chunk(IVec2::ZERO);
        let b = TerrainGenerator::new(TerrainConfig { seed: 2, ..Default::default() })
            .generate_chunk(IVec2::ZERO);
        assert_ne!(a.blocks().as_slice(), b.blocks().as_slice());
    }

    #[test]
    fn bottom_layer_is_bedrock() {
        let generator = TerrainGenerator::default();
        for coord in [IVec2::ZERO, IVec2::new(-4, 9)] {
            let chunk = generator.generate_chunk(coord);
            for x in 0..CHUNK_WIDTH {
                for z in 0..CHUNK_DEPTH {
                    assert_eq!(chunk.block(x, 0, z), BlockId::Bedrock);
                }
            }
        }
    }

    #[test]
    fn columns_are_solid_below_surface() {
        let generator = TerrainGenerator::default();
        let chunk = generator.generate_chunk(IVec2::ZERO);
        for x in 0..CHUNK_WIDTH {
            for z in 0..CHUNK_DEPTH {
                // Scan down from the sky; once a non-air, non-leaf, non-log
                // cell is found, everything below must stay solid.
                let mut in_ground = false;
                for y in (0..CHUNK_HEIGHT).rev() {
                    let block = chunk.block(x, y, z);
                    let solid = !matches!(
                        block,
                        BlockId::Air | BlockId::OakLeaves | BlockId::OakLog
                    );
                    if in_ground {
                        assert!(solid, "hole below surface at ({x}, {y}, {z})");
                    } else if solid {
                        in_ground = true;
                    }
                }
                assert!(in_ground);
            }
        }
    }

    #[test]
    fn parallel_batch_matches_serial() {
        let generator = TerrainGenerator::default();
        let coords = [IVec2::new(0, 0), IVec2::new(1, 0), IVec2::new(-2, 5)];
        let batch = generator.generate_chunks_parallel(&coords);
        assert_eq!(batch.len(), coords.len());
        for (coord, chunk) in batch {
            let serial = generator.generate_chunk(coord);
            assert_eq!(chunk.blocks().as_slice(), serial.blocks().as_slice());
        }
    }

    #[test]
    fn grass_sits_on_dirt() {
        let generator = TerrainGenerator::default();
        let chunk = generator.generate_chunk(IVec2::new(5, 5));
        for x in 0..CHUNK_WIDTH {
            for z in 0..CHUNK_DEPTH {
                for y in 1..CHUNK_HEIGHT {
                    if chunk.block(x, y, z) == BlockId::Grass {
                        assert_eq!(chunk.block(x, y - 1, z), BlockId::Dirt);
                    }
                }
            }
        }
    }
}
