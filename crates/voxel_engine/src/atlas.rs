//! Texture atlas lookup: maps a block face to its UV rectangle in the
//! 16x16 tile grid.

use crate::block::{BlockId, BlockRegistry};

/// Tiles per atlas row/column.
pub const ATLAS_TILES: u32 = 16;

/// Rectangle in normalized atlas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasRect {
    pub u: f32,
    pub v: f32,
    pub w: f32,
    pub h: f32,
}

impl AtlasRect {
    /// UV corners in quad order: `(u0,v0), (u1,v0), (u1,v1), (u0,v1)`.
    pub fn corners(&self) -> [[f32; 2]; 4] {
        let u1 = self.u + self.w;
        let v1 = self.v + self.h;
        [[self.u, self.v], [u1, self.v], [u1, v1], [self.u, v1]]
    }
}

/// Resolves `(block, face index)` to an [`AtlasRect`] through the registry's
/// per-face tile coordinates.
#[derive(Debug, Clone, Copy)]
pub struct TextureAtlas {
    tile_size: f32,
}

impl TextureAtlas {
    pub fn new_16x16() -> Self {
        Self { tile_size: 1.0 / ATLAS_TILES as f32 }
    }

    pub fn rect(&self, registry: &BlockRegistry, block: BlockId, face: usize) -> AtlasRect {
        let tile = registry.get(block).faces[face];
        AtlasRect {
            u: tile.x as f32 * self.tile_size,
            v: tile.y as f32 * self.tile_size,
            w: self.tile_size,
            h: self.tile_size,
        }
    }
}

impl Default for TextureAtlas {
    fn default() -> Self {
        Self::new_16x16()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stone_tile_rect() {
        let registry = BlockRegistry::new();
        let atlas = TextureAtlas::new_16x16();
        let rect = atlas.rect(&registry, BlockId::Stone, 0);
        assert_eq!(rect.u, 3.0 / 16.0);
        assert_eq!(rect.v, 15.0 / 16.0);
        assert_eq!(rect.w, 1.0 / 16.0);
    }

    #[test]
    fn grass_faces_differ() {
        let registry = BlockRegistry::new();
        let atlas = TextureAtlas::new_16x16();
        let top = atlas.rect(&registry, BlockId::Grass, 3);
        let bottom = atlas.rect(&registry, BlockId::Grass, 2);
        let side = atlas.rect(&registry, BlockId::Grass, 0);
        assert_ne!(top, bottom);
        assert_ne!(top, side);
    }

    #[test]
    fn corners_span_the_rect() {
        let rect = AtlasRect { u: 0.25, v: 0.5, w: 1.0 / 16.0, h: 1.0 / 16.0 };
        let corners = rect.corners();
        assert_eq!(corners[0], [0.25, 0.5]);
        assert_eq!(corners[2], [0.25 + 1.0 / 16.0, 0.5 + 1.0 / 16.0]);
    }
}
