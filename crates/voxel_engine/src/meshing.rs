//! Mesh construction: neighborhood snapshots, the simple per-face mesher,
//! and the greedy rectangle-merging mesher.
//!
//! A mesh job first copies the 3x3 chunk neighborhood into a padded local
//! buffer ([`MeshView`]), so the mesh itself runs without touching any lock
//! and sees one consistent state. Vertices are interleaved
//! `[x, y, z, u, v, ao, light, face]` in world space with 32-bit indices;
//! leaf faces land in the transparent buffer, everything else in the opaque
//! buffer.
//!
//! The greedy mesher merges coplanar faces whose `(block, light, ao)` key
//! matches into maximal rectangles. It is only used with smooth lighting
//! off; per-vertex averaged light would vary across a merged rectangle and
//! distort shading, so that combination falls back to the simple mesher.

use glam::{IVec2, IVec3};

use crate::atlas::TextureAtlas;
use crate::block::{should_render_face, BlockId, BlockRegistry, LeafQuality, FACE_NORMALS};
use crate::chunk::{
    blocklight_of, pack_light, sunlight_of, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_WIDTH, MAX_LIGHT,
};
use crate::store::ChunkStore;

/// Floats per vertex: position, atlas UV, ambient occlusion, light, face.
pub const VERTEX_STRIDE: usize = 8;

/// Cube corners per face, in face order, wound counter-clockwise seen from
/// outside the block.
const FACE_CORNERS: [[[i32; 3]; 4]; 6] = [
    // -X
    [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]],
    // +X
    [[1, 0, 1], [1, 0, 0], [1, 1, 0], [1, 1, 1]],
    // -Y
    [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 1]],
    // +Y
    [[0, 1, 1], [1, 1, 1], [1, 1, 0], [0, 1, 0]],
    // -Z
    [[1, 0, 0], [0, 0, 0], [0, 1, 0], [1, 1, 0]],
    // +Z
    [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]],
];

const PAD_WIDTH: usize = CHUNK_WIDTH + 2;
const PAD_DEPTH: usize = CHUNK_DEPTH + 2;
const PAD_VOLUME: usize = PAD_WIDTH * CHUNK_HEIGHT * PAD_DEPTH;

#[inline]
fn pad_idx(x: i32, y: i32, z: i32) -> usize {
    debug_assert!((-1..=CHUNK_WIDTH as i32).contains(&x));
    debug_assert!((0..CHUNK_HEIGHT as i32).contains(&y));
    debug_assert!((-1..=CHUNK_DEPTH as i32).contains(&z));
    (x + 1) as usize + y as usize * PAD_WIDTH + (z + 1) as usize * PAD_WIDTH * CHUNK_HEIGHT
}

/// Immutable snapshot of a chunk and the one-cell shell around it, captured
/// under shared locks and then read lock-free by the meshers.
///
/// Cells of non-resident neighbors read as air under full sunlight with no
/// blocklight, as do cells above the world; below the world is air with no
/// light at all so bottom faces of the lowest layer stay dark.
pub struct MeshView {
    coord: IVec2,
    blocks: Vec<BlockId>,
    light: Vec<u8>,
}

impl MeshView {
    pub fn capture(store: &ChunkStore, coord: IVec2) -> Self {
        let handles = store.neighborhood(coord);
        // Hold all nine read guards while copying so one edit cannot tear
        // the snapshot across a chunk seam.
        let guards: Vec<_> = handles
            .iter()
            .map(|handle| handle.as_ref().map(crate::store::read))
            .collect();

        let mut blocks = vec![BlockId::Air; PAD_VOLUME];
        let mut light = vec![pack_light(MAX_LIGHT, 0); PAD_VOLUME];

        for pz in -1..=CHUNK_DEPTH as i32 {
            for px in -1..=CHUNK_WIDTH as i32 {
                let gx = if px < 0 {
                    0
                } else if px >= CHUNK_WIDTH as i32 {
                    2
                } else {
                    1
                };
                let gz = if pz < 0 {
                    0
                } else if pz >= CHUNK_DEPTH as i32 {
                    2
                } else {
                    1
                };
                let Some(chunk) = &guards[gx + gz * 3] else {
                    continue;
                };
                let lx = px.rem_euclid(CHUNK_WIDTH as i32) as usize;
                let lz = pz.rem_euclid(CHUNK_DEPTH as i32) as usize;
                for y in 0..CHUNK_HEIGHT {
                    let i = pad_idx(px, y as i32, pz);
                    blocks[i] = chunk.block(lx, y, lz);
                    light[i] = chunk.light(lx, y, lz);
                }
            }
        }

        Self { coord, blocks, light }
    }

    pub fn coord(&self) -> IVec2 {
        self.coord
    }

    /// World-space position of the chunk's minimum corner.
    pub fn world_origin(&self) -> IVec3 {
        IVec3::new(
            self.coord.x * CHUNK_WIDTH as i32,
            0,
            self.coord.y * CHUNK_DEPTH as i32,
        )
    }

    #[inline]
    pub fn block(&self, pos: IVec3) -> BlockId {
        if pos.y < 0 || pos.y >= CHUNK_HEIGHT as i32 {
            return BlockId::Air;
        }
        self.blocks[pad_idx(pos.x, pos.y, pos.z)]
    }

    #[inline]
    pub fn sunlight(&self, pos: IVec3) -> u8 {
        if pos.y >= CHUNK_HEIGHT as i32 {
            return MAX_LIGHT;
        }
        if pos.y < 0 {
            return 0;
        }
        sunlight_of(self.light[pad_idx(pos.x, pos.y, pos.z)])
    }

    #[inline]
    pub fn blocklight(&self, pos: IVec3) -> u8 {
        if pos.y < 0 || pos.y >= CHUNK_HEIGHT as i32 {
            return 0;
        }
        blocklight_of(self.light[pad_idx(pos.x, pos.y, pos.z)])
    }

    /// Combined flat light value of a cell: brighter of the two channels.
    #[inline]
    fn combined_light(&self, pos: IVec3) -> u8 {
        self.sunlight(pos).max(self.blocklight(pos))
    }
}

/// One vertex/index buffer pair.
#[derive(Debug, Default, Clone)]
pub struct MeshBuffer {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl MeshBuffer {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn byte_size(&self) -> usize {
        self.vertices.len() * std::mem::size_of::<f32>()
            + self.indices.len() * std::mem::size_of::<u32>()
    }

    /// Append a quad. `flip` selects the 1-3 diagonal, used when the AO
    /// gradient would otherwise interpolate across the wrong diagonal.
    fn push_quad(&mut self, verts: &[[f32; VERTEX_STRIDE]; 4], flip: bool) {
        let base = self.vertex_count() as u32;
        for vert in verts {
            self.vertices.extend_from_slice(vert);
        }
        if flip {
            self.indices.extend_from_slice(&[
                base + 1,
                base + 2,
                base + 3,
                base + 3,
                base,
                base + 1,
            ]);
        } else {
            self.indices.extend_from_slice(&[
                base,
                base + 1,
                base + 2,
                base + 2,
                base + 3,
                base,
            ]);
        }
    }
}

/// Finished mesh for one chunk; empty buffers are a valid result.
#[derive(Debug, Default, Clone)]
pub struct MeshData {
    pub coord: IVec2,
    pub opaque: MeshBuffer,
    pub transparent: MeshBuffer,
}

impl MeshData {
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }
}

/// Per-job meshing parameters, resolved from the engine options.
#[derive(Debug, Clone, Copy)]
pub struct MeshSettings {
    pub use_greedy: bool,
    pub smooth_lighting: bool,
    pub leaf_quality: LeafQuality,
}

/// Build both meshes for the chunk under `view`. Greedy meshing only runs
/// with smooth lighting off.
pub fn build_chunk_mesh(
    view: &MeshView,
    registry: &BlockRegistry,
    atlas: &TextureAtlas,
    settings: MeshSettings,
) -> MeshData {
    let mut mesh = MeshData { coord: view.coord(), ..Default::default() };
    if settings.use_greedy && !settings.smooth_lighting {
        greedy_mesh(view, registry, atlas, settings.leaf_quality, &mut mesh);
    } else {
        simple_mesh(view, registry, atlas, settings, &mut mesh);
    }
    mesh
}

#[inline]
fn occludes(block: BlockId) -> bool {
    !block.transparent_for_lighting()
}

/// AO term for one vertex: 3 when both side cells occlude, else the count
/// of occluding cells in the standard side/side/corner stencil.
fn corner_ao(view: &MeshView, cell: IVec3, face: usize, corner: [i32; 3]) -> u8 {
    let normal = FACE_NORMALS[face];
    let mut tangents = [IVec3::ZERO; 2];
    let mut t = 0;
    for axis in 0..3 {
        if normal[axis] == 0 {
            tangents[t][axis] = if corner[axis] == 1 { 1 } else { -1 };
            t += 1;
        }
    }

    let side1 = occludes(view.block(cell + normal + tangents[0]));
    let side2 = occludes(view.block(cell + normal + tangents[1]));
    let corner_cell = occludes(view.block(cell + normal + tangents[0] + tangents[1]));

    if side1 && side2 {
        3
    } else {
        side1 as u8 + side2 as u8 + corner_cell as u8
    }
}

/// Smooth per-vertex light: each channel averaged over the face neighbor
/// and the three stencil cells, then the brighter channel wins.
fn corner_smooth_light(view: &MeshView, cell: IVec3, face: usize, corner: [i32; 3]) -> f32 {
    let normal = FACE_NORMALS[face];
    let mut tangents = [IVec3::ZERO; 2];
    let mut t = 0;
    for axis in 0..3 {
        if normal[axis] == 0 {
            tangents[t][axis] = if corner[axis] == 1 { 1 } else { -1 };
            t += 1;
        }
    }

    let cells = [
        cell + normal,
        cell + normal + tangents[0],
        cell + normal + tangents[1],
        cell + normal + tangents[0] + tangents[1],
    ];
    let mut sun = 0.0f32;
    let mut block = 0.0f32;
    for sample in cells {
        sun += f32::from(view.sunlight(sample));
        block += f32::from(view.blocklight(sample));
    }
    (sun * 0.25).max(block * 0.25)
}

/// Emit every visible face of every cell as its own quad.
pub fn simple_mesh(
    view: &MeshView,
    registry: &BlockRegistry,
    atlas: &TextureAtlas,
    settings: MeshSettings,
    out: &mut MeshData,
) {
    let origin = view.world_origin();

    for y in 0..CHUNK_HEIGHT as i32 {
        for x in 0..CHUNK_WIDTH as i32 {
            for z in 0..CHUNK_DEPTH as i32 {
                let cell = IVec3::new(x, y, z);
                let block = view.block(cell);
                if block.is_air() {
                    continue;
                }
                let emission = registry.emission(block);

                for face in 0..6 {
                    let neighbor = cell + FACE_NORMALS[face];
                    if !should_render_face(block, view.block(neighbor), settings.leaf_quality) {
                        continue;
                    }

                    let uvs = atlas.rect(registry, block, face).corners();
                    let flat_light = f32::from(view.combined_light(neighbor));
                    let world = origin + cell;

                    let mut verts = [[0.0f32; VERTEX_STRIDE]; 4];
                    let mut ao = [0u8; 4];
                    for (i, corner) in FACE_CORNERS[face].iter().enumerate() {
                        ao[i] = corner_ao(view, cell, face, *corner);
                        let light = if emission > 0 {
                            f32::from(emission)
                        } else if settings.smooth_lighting {
                            corner_smooth_light(view, cell, face, *corner)
                        } else {
                            flat_light
                        };
                        verts[i] = [
                            (world.x + corner[0]) as f32,
                            (world.y + corner[1]) as f32,
                            (world.z + corner[2]) as f32,
                            uvs[i][0],
                            uvs[i][1],
                            f32::from(ao[i]),
                            light,
                            face as f32,
                        ];
                    }

                    let target = if block == BlockId::OakLeaves {
                        &mut out.transparent
                    } else {
                        &mut out.opaque
                    };
                    let flip = ao[0] + ao[2] > ao[1] + ao[3];
                    target.push_quad(&verts, flip);
                }
            }
        }
    }
}

/// Mask entry for one visible face in a greedy slice. Two faces merge only
/// when every field matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FaceKey {
    block: BlockId,
    light: u8,
    ao: [u8; 4],
}

/// Sweep each axis in both directions, building a visibility mask per slice
/// and merging equal entries into maximal rectangles: extend along `u`
/// first, then grow in `v` while every column still matches.
pub fn greedy_mesh(
    view: &MeshView,
    registry: &BlockRegistry,
    atlas: &TextureAtlas,
    quality: LeafQuality,
    out: &mut MeshData,
) {
    let dims = [
        CHUNK_WIDTH as i32,
        CHUNK_HEIGHT as i32,
        CHUNK_DEPTH as i32,
    ];
    let origin = view.world_origin();

    for axis in 0..3usize {
        for dir in 0..2usize {
            let positive = dir == 1;
            let face = axis * 2 + dir;
            let u_axis = (axis + 1) % 3;
            let v_axis = (axis + 2) % 3;
            let size_u = dims[u_axis];
            let size_v = dims[v_axis];

            let mut mask: Vec<Option<FaceKey>> = vec![None; (size_u * size_v) as usize];

            for d in 0..dims[axis] {
                mask.fill(None);

                // Pass 1: visibility, light, and AO for the whole slice.
                for u in 0..size_u {
                    for v in 0..size_v {
                        let mut cell = IVec3::ZERO;
                        cell[axis] = d;
                        cell[u_axis] = u;
                        cell[v_axis] = v;

                        let block = view.block(cell);
                        if block.is_air() {
                            continue;
                        }
                        let neighbor = cell + FACE_NORMALS[face];
                        if !should_render_face(block, view.block(neighbor), quality) {
                            continue;
                        }

                        let emission = registry.emission(block);
                        let light = if emission > 0 {
                            emission
                        } else {
                            view.combined_light(neighbor)
                        };

                        let mut ao = [0u8; 4];
                        for (k, &(du, dv)) in QUAD_STEPS.iter().enumerate() {
                            let mut corner = [0i32; 3];
                            corner[axis] = positive as i32;
                            corner[u_axis] = du;
                            corner[v_axis] = dv;
                            ao[k] = corner_ao(view, cell, face, corner);
                        }

                        mask[(u + v * size_u) as usize] = Some(FaceKey { block, light, ao });
                    }
                }

                // Pass 2: merge and emit.
                for v in 0..size_v {
                    for u in 0..size_u {
                        let Some(key) = mask[(u + v * size_u) as usize] else {
                            continue;
                        };

                        let mut width = 1;
                        while u + width < size_u
                            && mask[(u + width + v * size_u) as usize] == Some(key)
                        {
                            width += 1;
                        }

                        let mut height = 1;
                        'grow: while v + height < size_v {
                            for step in 0..width {
                                if mask[(u + step + (v + height) * size_u) as usize] != Some(key)
                                {
                                    break 'grow;
                                }
                            }
                            height += 1;
                        }

                        for dv in 0..height {
                            for du in 0..width {
                                mask[(u + du + (v + dv) * size_u) as usize] = None;
                            }
                        }

                        emit_greedy_quad(
                            out,
                            registry,
                            atlas,
                            origin,
                            &key,
                            face,
                            axis,
                            u_axis,
                            v_axis,
                            positive,
                            d,
                            u,
                            v,
                            width,
                            height,
                        );
                    }
                }
            }
        }
    }
}

/// Quad corner steps in `(u, v)` space, matching the AO key order.
const QUAD_STEPS: [(i32, i32); 4] = [(0, 0), (1, 0), (1, 1), (0, 1)];

#[allow(clippy::too_many_arguments)]
fn emit_greedy_quad(
    out: &mut MeshData,
    registry: &BlockRegistry,
    atlas: &TextureAtlas,
    origin: IVec3,
    key: &FaceKey,
    face: usize,
    axis: usize,
    u_axis: usize,
    v_axis: usize,
    positive: bool,
    d: i32,
    u: i32,
    v: i32,
    width: i32,
    height: i32,
) {
    let rect = atlas.rect(registry, key.block, face);

    let mut verts = [[0.0f32; VERTEX_STRIDE]; 4];
    for (k, &(du, dv)) in QUAD_STEPS.iter().enumerate() {
        let mut pos = IVec3::ZERO;
        pos[axis] = d + positive as i32;
        pos[u_axis] = u + du * width;
        pos[v_axis] = v + dv * height;
        let world = origin + pos;

        // Texture repeats across the merged rectangle.
        verts[k] = [
            world.x as f32,
            world.y as f32,
            world.z as f32,
            rect.u + (du * width) as f32 * rect.w,
            rect.v + (dv * height) as f32 * rect.h,
            f32::from(key.ao[k]),
            f32::from(key.light),
            face as f32,
        ];
    }

    // Reverse winding for the negative-facing quads.
    let order: [usize; 4] = if positive { [0, 1, 2, 3] } else { [0, 3, 2, 1] };
    let ordered = [
        verts[order[0]],
        verts[order[1]],
        verts[order[2]],
        verts[order[3]],
    ];
    let ao = [
        key.ao[order[0]],
        key.ao[order[1]],
        key.ao[order[2]],
        key.ao[order[3]],
    ];

    let target = if key.block == BlockId::OakLeaves {
        &mut out.transparent
    } else {
        &mut out.opaque
    };
    let flip = ao[0] + ao[2] > ao[1] + ao[3];
    target.push_quad(&ordered, flip);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::lighting::{LightEngine, LightJob};
    use std::sync::Arc;

    fn store_with<F>(fill: F) -> Arc<ChunkStore>
    where
        F: Fn(usize, usize, usize) -> BlockId,
    {
        // 3x3 chunks so the center chunk has resident neighbors, all filled
        // from the same local pattern.
        let store = Arc::new(ChunkStore::new());
        for cx in -1..=1 {
            for cz in -1..=1 {
                let mut chunk = Chunk::new(IVec2::new(cx, cz));
                for x in 0..CHUNK_WIDTH {
                    for z in 0..CHUNK_DEPTH {
                        for y in 0..CHUNK_HEIGHT {
                            chunk.set_block(x, y, z, fill(x, y, z));
                        }
                    }
                }
                store.insert(chunk);
            }
        }
        store
    }

    fn light_all(store: &Arc<ChunkStore>) {
        let engine = LightEngine::new(Arc::clone(store));
        for cx in -1..=1 {
            for cz in -1..=1 {
                engine.run(&LightJob::InitialLight { coord: IVec2::new(cx, cz) });
            }
        }
    }

    fn settings(use_greedy: bool, smooth: bool) -> MeshSettings {
        MeshSettings {
            use_greedy,
            smooth_lighting: smooth,
            leaf_quality: LeafQuality::Fancy,
        }
    }

    fn mesh_center(store: &ChunkStore, settings: MeshSettings) -> MeshData {
        let view = MeshView::capture(store, IVec2::ZERO);
        build_chunk_mesh(&view, &BlockRegistry::new(), &TextureAtlas::new_16x16(), settings)
    }

    /// Sum of quad areas in a buffer; vertices 0,1,3 span each quad.
    fn surface_area(buffer: &MeshBuffer) -> f32 {
        let mut area = 0.0;
        for quad in buffer.vertices.chunks_exact(VERTEX_STRIDE * 4) {
            let p = |i: usize| {
                glam::Vec3::new(
                    quad[i * VERTEX_STRIDE],
                    quad[i * VERTEX_STRIDE + 1],
                    quad[i * VERTEX_STRIDE + 2],
                )
            };
            area += (p(1) - p(0)).cross(p(3) - p(0)).length();
        }
        area
    }

    #[test]
    fn empty_chunk_produces_empty_buffers() {
        let store = store_with(|_, _, _| BlockId::Air);
        let mesh = mesh_center(&store, settings(false, false));
        assert!(mesh.is_empty());
        let mesh = mesh_center(&store, settings(true, false));
        assert!(mesh.is_empty());
    }

    #[test]
    fn stone_slab_simple_vs_greedy() {
        // An infinite one-block slab at y = 0: side faces are culled by the
        // neighboring chunks, leaving 256 top + 256 bottom faces.
        let store = store_with(|_, y, _| if y == 0 { BlockId::Stone } else { BlockId::Air });
        light_all(&store);

        let simple = mesh_center(&store, settings(false, false));
        assert_eq!(simple.opaque.vertex_count(), 512 * 4);
        assert_eq!(simple.opaque.triangle_count(), 512 * 2);
        assert!(simple.transparent.is_empty());

        let greedy = mesh_center(&store, settings(true, false));
        assert_eq!(greedy.opaque.vertex_count(), 8, "one top and one bottom quad");
        assert_eq!(greedy.opaque.triangle_count(), 4);

        let simple_area = surface_area(&simple.opaque);
        let greedy_area = surface_area(&greedy.opaque);
        assert!((simple_area - 512.0).abs() < 1e-3);
        assert!((greedy_area - simple_area).abs() < 1e-3);
    }

    #[test]
    fn simple_and_greedy_cover_equal_area_on_terrain() {
        let generator = crate::generator::TerrainGenerator::default();
        let store = Arc::new(ChunkStore::new());
        for cx in -1..=1 {
            for cz in -1..=1 {
                store.insert(generator.generate_chunk(IVec2::new(cx, cz)));
            }
        }
        light_all(&store);

        let simple = mesh_center(&store, settings(false, false));
        let greedy = mesh_center(&store, settings(true, false));

        let simple_area = surface_area(&simple.opaque) + surface_area(&simple.transparent);
        let greedy_area = surface_area(&greedy.opaque) + surface_area(&greedy.transparent);
        assert!(
            (simple_area - greedy_area).abs() < 1e-2,
            "simple {simple_area} vs greedy {greedy_area}"
        );
        // Merging can only reduce geometry.
        assert!(greedy.opaque.triangle_count() <= simple.opaque.triangle_count());
    }

    #[test]
    fn greedy_rectangles_are_maximal_on_the_slab() {
        let store = store_with(|_, y, _| if y == 0 { BlockId::Stone } else { BlockId::Air });
        light_all(&store);
        let greedy = mesh_center(&store, settings(true, false));
        // 2 quads means no further merge is possible on either slab side.
        assert_eq!(greedy.opaque.vertex_count() / 4, 2);
    }

    #[test]
    fn vertex_stream_shape() {
        let store = store_with(|_, y, _| if y < 3 { BlockId::Stone } else { BlockId::Air });
        light_all(&store);
        let mesh = mesh_center(&store, settings(false, true));

        assert_eq!(mesh.opaque.vertices.len() % VERTEX_STRIDE, 0);
        for vertex in mesh.opaque.vertices.chunks_exact(VERTEX_STRIDE) {
            let ao = vertex[5];
            let light = vertex[6];
            let face = vertex[7];
            assert!((0.0..=3.0).contains(&ao));
            assert!((0.0..=15.0).contains(&light));
            assert!((0.0..=5.0).contains(&face));
        }
        assert_eq!(mesh.opaque.byte_size() % 4, 0);
    }

    #[test]
    fn glowstone_faces_use_emission_light() {
        let store = store_with(|x, y, z| {
            if (x, y, z) == (8, 30, 8) {
                BlockId::Glowstone
            } else {
                BlockId::Air
            }
        });
        light_all(&store);
        for settings in [settings(false, false), settings(false, true), settings(true, false)] {
            let mesh = mesh_center(&store, settings);
            assert_eq!(mesh.opaque.vertex_count(), 24, "six faces");
            for vertex in mesh.opaque.vertices.chunks_exact(VERTEX_STRIDE) {
                assert_eq!(vertex[6], 15.0, "emission overrides neighbor light");
            }
        }
    }

    #[test]
    fn leaf_faces_route_to_the_transparent_buffer() {
        let store = store_with(|x, y, z| {
            if y == 10 && (8..10).contains(&x) && z == 8 {
                BlockId::OakLeaves
            } else {
                BlockId::Air
            }
        });
        light_all(&store);

        // Fancy renders the shared face between the two leaf blocks.
        let fancy = mesh_center(&store, settings(false, false));
        assert!(fancy.opaque.is_empty());
        assert_eq!(fancy.transparent.vertex_count(), 12 * 4);

        let fast = build_chunk_mesh(
            &MeshView::capture(&store, IVec2::ZERO),
            &BlockRegistry::new(),
            &TextureAtlas::new_16x16(),
            MeshSettings {
                use_greedy: false,
                smooth_lighting: false,
                leaf_quality: LeafQuality::Fast,
            },
        );
        assert_eq!(fast.transparent.vertex_count(), 10 * 4, "hull faces only");
    }

    #[test]
    fn corner_ao_counts_occluders() {
        let store = store_with(|x, y, z| {
            match (x, y, z) {
                (8, 8, 8) => BlockId::Stone,  // the meshed block
                (9, 9, 8) => BlockId::Stone,  // occluder above its +X edge
                _ => BlockId::Air,
            }
        });
        let view = MeshView::capture(&store, IVec2::ZERO);
        let cell = IVec3::new(8, 8, 8);

        // Top face (+Y, face 3): corners with x = 1 see the occluder as a
        // side cell, corners with x = 0 see nothing.
        assert_eq!(corner_ao(&view, cell, 3, [1, 1, 1]), 1);
        assert_eq!(corner_ao(&view, cell, 3, [1, 1, 0]), 1);
        assert_eq!(corner_ao(&view, cell, 3, [0, 1, 1]), 0);
        assert_eq!(corner_ao(&view, cell, 3, [0, 1, 0]), 0);
    }

    #[test]
    fn smooth_lighting_averages_open_sky() {
        let store = store_with(|_, y, _| if y < 10 { BlockId::Stone } else { BlockId::Air });
        light_all(&store);
        let mesh = mesh_center(&store, settings(false, true));

        // Every top face vertex on the flat surface averages four cells of
        // full sunlight.
        let mut saw_top_face = false;
        for vertex in mesh.opaque.vertices.chunks_exact(VERTEX_STRIDE) {
            if vertex[7] == 3.0 {
                saw_top_face = true;
                assert_eq!(vertex[6], 15.0);
            }
        }
        assert!(saw_top_face);
    }

    #[test]
    fn snapshot_defaults_outside_residency() {
        let store = ChunkStore::new();
        store.insert(Chunk::new(IVec2::ZERO));
        let view = MeshView::capture(&store, IVec2::ZERO);

        // Non-resident neighbor: air, full sun, no blocklight.
        assert_eq!(view.block(IVec3::new(-1, 10, 0)), BlockId::Air);
        assert_eq!(view.sunlight(IVec3::new(-1, 10, 0)), MAX_LIGHT);
        assert_eq!(view.blocklight(IVec3::new(-1, 10, 0)), 0);

        // Above the world is lit air; below is dark air.
        assert_eq!(view.sunlight(IVec3::new(0, CHUNK_HEIGHT as i32, 0)), MAX_LIGHT);
        assert_eq!(view.sunlight(IVec3::new(0, -1, 0)), 0);
        assert_eq!(view.block(IVec3::new(0, -1, 0)), BlockId::Air);
    }
}
