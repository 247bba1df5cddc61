//! Block kinds and the static per-block registry.
//!
//! The registry is immutable after initialization: texture tile coordinates
//! for the six faces, light emission strength, and the two predicates the
//! rest of the engine keys on (`transparent_for_lighting` and
//! `should_render_face`).

use std::sync::OnceLock;

use glam::IVec2;
use serde::{Deserialize, Serialize};

/// Face order used everywhere: -X, +X, -Y, +Y, -Z, +Z.
pub const FACE_COUNT: usize = 6;

/// Outward normal per face, in face order. Doubles as the neighbor offsets
/// for light propagation.
pub const FACE_NORMALS: [glam::IVec3; FACE_COUNT] = [
    glam::IVec3::new(-1, 0, 0),
    glam::IVec3::new(1, 0, 0),
    glam::IVec3::new(0, -1, 0),
    glam::IVec3::new(0, 1, 0),
    glam::IVec3::new(0, 0, -1),
    glam::IVec3::new(0, 0, 1),
];

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockId {
    #[default]
    Air = 0,
    Stone = 1,
    Dirt = 2,
    Grass = 3,
    Glowstone = 4,
    Bedrock = 5,
    OakLog = 6,
    OakLeaves = 7,
}

impl BlockId {
    /// Decode a raw byte; unknown values fall back to `Air`.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => BlockId::Stone,
            2 => BlockId::Dirt,
            3 => BlockId::Grass,
            4 => BlockId::Glowstone,
            5 => BlockId::Bedrock,
            6 => BlockId::OakLog,
            7 => BlockId::OakLeaves,
            _ => BlockId::Air,
        }
    }

    pub fn is_air(self) -> bool {
        self == BlockId::Air
    }

    /// Light (both channels) propagates through these.
    pub fn transparent_for_lighting(self) -> bool {
        matches!(self, BlockId::Air | BlockId::OakLeaves)
    }
}

/// Leaf rendering mode: `Fast` draws only the outer hull, `Fancy` also
/// draws faces between touching leaf blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeafQuality {
    Fast,
    Fancy,
}

/// Face-culling rule shared by both meshers.
pub fn should_render_face(current: BlockId, neighbor: BlockId, quality: LeafQuality) -> bool {
    if neighbor == BlockId::Air {
        return true;
    }

    let current_is_leaves = current == BlockId::OakLeaves;
    let neighbor_is_leaves = neighbor == BlockId::OakLeaves;

    if current_is_leaves {
        if neighbor_is_leaves {
            return quality == LeafQuality::Fancy;
        }
        return quality == LeafQuality::Fast;
    }

    if neighbor_is_leaves {
        return quality != LeafQuality::Fast;
    }

    false
}

/// Static metadata for one block kind.
#[derive(Debug, Clone)]
pub struct BlockData {
    pub id: BlockId,
    /// Atlas tile coordinate per face, in face order.
    pub faces: [IVec2; FACE_COUNT],
    /// Light output in `[0, 15]`.
    pub emission: u8,
}

impl BlockData {
    fn uniform(id: BlockId, tile: IVec2) -> Self {
        Self { id, faces: [tile; FACE_COUNT], emission: 0 }
    }
}

/// Lookup table from `BlockId` to its [`BlockData`]. Unknown ids (notably
/// `Air`) resolve to a zero-emission entry with zeroed tiles.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    entries: Vec<BlockData>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        let tile = |x: i32, y: i32| IVec2::new(x, y);

        // Atlas row 15: grass top (0), grass side (1), dirt (2), stone (3),
        // bedrock (4), glowstone (9), leaves (10), log side (11), log top (12).
        let mut entries = vec![BlockData::uniform(BlockId::Air, tile(0, 0)); 8];

        entries[BlockId::Stone as usize] = BlockData::uniform(BlockId::Stone, tile(3, 15));
        entries[BlockId::Dirt as usize] = BlockData::uniform(BlockId::Dirt, tile(2, 15));
        entries[BlockId::Grass as usize] = BlockData {
            id: BlockId::Grass,
            faces: [
                tile(1, 15), // -X side
                tile(1, 15), // +X side
                tile(2, 15), // -Y dirt
                tile(0, 15), // +Y grass top
                tile(1, 15), // -Z side
                tile(1, 15), // +Z side
            ],
            emission: 0,
        };
        entries[BlockId::Glowstone as usize] = BlockData {
            emission: 15,
            ..BlockData::uniform(BlockId::Glowstone, tile(9, 15))
        };
        entries[BlockId::Bedrock as usize] = BlockData::uniform(BlockId::Bedrock, tile(4, 15));
        entries[BlockId::OakLog as usize] = BlockData {
            id: BlockId::OakLog,
            faces: [
                tile(11, 15), // -X side
                tile(11, 15), // +X side
                tile(12, 15), // -Y end grain
                tile(12, 15), // +Y end grain
                tile(11, 15), // -Z side
                tile(11, 15), // +Z side
            ],
            emission: 0,
        };
        entries[BlockId::OakLeaves as usize] =
            BlockData::uniform(BlockId::OakLeaves, tile(10, 15));

        Self { entries }
    }

    /// Process-wide registry, initialized on first use and never mutated.
    pub fn global() -> &'static BlockRegistry {
        static REGISTRY: OnceLock<BlockRegistry> = OnceLock::new();
        REGISTRY.get_or_init(BlockRegistry::new)
    }

    pub fn get(&self, id: BlockId) -> &BlockData {
        &self.entries[id as usize]
    }

    pub fn emission(&self, id: BlockId) -> u8 {
        self.entries[id as usize].emission
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_roundtrip_and_fallback() {
        for id in [
            BlockId::Air,
            BlockId::Stone,
            BlockId::Dirt,
            BlockId::Grass,
            BlockId::Glowstone,
            BlockId::Bedrock,
            BlockId::OakLog,
            BlockId::OakLeaves,
        ] {
            assert_eq!(BlockId::from_raw(id as u8), id);
        }
        assert_eq!(BlockId::from_raw(200), BlockId::Air);
    }

    #[test]
    fn lighting_transparency() {
        assert!(BlockId::Air.transparent_for_lighting());
        assert!(BlockId::OakLeaves.transparent_for_lighting());
        assert!(!BlockId::Stone.transparent_for_lighting());
        assert!(!BlockId::Glowstone.transparent_for_lighting());
    }

    #[test]
    fn face_rule_air_neighbor_always_renders() {
        for quality in [LeafQuality::Fast, LeafQuality::Fancy] {
            assert!(should_render_face(BlockId::Stone, BlockId::Air, quality));
            assert!(should_render_face(BlockId::OakLeaves, BlockId::Air, quality));
        }
    }

    #[test]
    fn face_rule_leaf_cases() {
        // Leaf against leaf: inner faces only in fancy mode.
        assert!(should_render_face(BlockId::OakLeaves, BlockId::OakLeaves, LeafQuality::Fancy));
        assert!(!should_render_face(BlockId::OakLeaves, BlockId::OakLeaves, LeafQuality::Fast));

        // Leaf against opaque: fast mode treats leaves as opaque hull.
        assert!(should_render_face(BlockId::OakLeaves, BlockId::Stone, LeafQuality::Fast));
        assert!(!should_render_face(BlockId::OakLeaves, BlockId::Stone, LeafQuality::Fancy));

        // Opaque against leaf: hidden only in fast mode.
        assert!(should_render_face(BlockId::Stone, BlockId::OakLeaves, LeafQuality::Fancy));
        assert!(!should_render_face(BlockId::Stone, BlockId::OakLeaves, LeafQuality::Fast));
    }

    #[test]
    fn face_rule_opaque_pair_never_renders() {
        assert!(!should_render_face(BlockId::Stone, BlockId::Dirt, LeafQuality::Fancy));
        assert!(!should_render_face(BlockId::Grass, BlockId::Stone, LeafQuality::Fast));
    }

    #[test]
    fn registry_emission_and_tiles() {
        let registry = BlockRegistry::new();
        assert_eq!(registry.emission(BlockId::Glowstone), 15);
        assert_eq!(registry.emission(BlockId::Air), 0);
        assert_eq!(registry.emission(BlockId::Stone), 0);

        let grass = registry.get(BlockId::Grass);
        assert_eq!(grass.faces[3], IVec2::new(0, 15)); // +Y top
        assert_eq!(grass.faces[2], IVec2::new(2, 15)); // -Y dirt
    }
}
