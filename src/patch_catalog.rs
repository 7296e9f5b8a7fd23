// ----------------------------------------------------------------------------
// Patch Mesh Catalog: nine canonical triangle-strip patches built once at
// startup and packed into one shared vertex buffer and one shared index
// buffer, addressed by {baseVertex, startIndex, indexCount}.
// ----------------------------------------------------------------------------
use crate::error::{Result, TerrainError};
use bytemuck::{Pod, Zeroable};
// ----------------------------------------------------------------------------
/// Sentinel breaking a triangle strip into a new one.
pub const RESET_INDEX: u16 = 0xFFFF;
// ----------------------------------------------------------------------------
/// A patch-local lattice vertex; world position is `(x, y) * gridScale +
/// vertexTranslate` at draw time.
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq, Eq)]
#[repr(C)]
pub struct PatchVertex {
    pub x: i16,
    pub y: i16,
}
// ----------------------------------------------------------------------------
impl PatchVertex {
    fn new(x: i32, y: i32) -> Self {
        Self {
            x: x as i16,
            y: y as i16,
        }
    }
}
// ----------------------------------------------------------------------------
/// A draw range into the catalog's shared vertex/index buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchRange {
    pub base_vertex: i32,
    pub start_index: i32,
    pub index_count: i32,
}
// ----------------------------------------------------------------------------
/// The nine patch kinds, in the catalog's authoritative build order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PatchKind {
    Block,
    HorizontalGap,
    VerticalGap,
    InteriorTopLeft,
    InteriorTopRight,
    InteriorBottomLeft,
    InteriorBottomRight,
    InteriorFinest,
    Crack,
}
// ----------------------------------------------------------------------------
impl PatchKind {
    pub const ALL: [PatchKind; 9] = [
        PatchKind::Block,
        PatchKind::HorizontalGap,
        PatchKind::VerticalGap,
        PatchKind::InteriorTopLeft,
        PatchKind::InteriorTopRight,
        PatchKind::InteriorBottomLeft,
        PatchKind::InteriorBottomRight,
        PatchKind::InteriorFinest,
        PatchKind::Crack,
    ];
}
// ----------------------------------------------------------------------------
/// Built, immutable catalog of the nine patches, plus the shared buffers
/// they're packed into.
pub struct PatchCatalog {
    texture_size: u32,
    block_width: i32,
    gap_width: i32,
    vertex_buffer: Vec<PatchVertex>,
    index_buffer: Vec<u16>,
    patches: [PatchRange; 9],
}
// ----------------------------------------------------------------------------
impl PatchCatalog {
    /// `texture_size` must be a power of two, at least 16.
    pub fn build(texture_size: u32) -> Result<Self> {
        if texture_size < 16 || !texture_size.is_power_of_two() {
            return Err(TerrainError::BadTextureSize { texture_size });
        }

        let block_width = (texture_size / 4) as i32 - 1;
        let gap_width = 2;
        let crack_triangles = (block_width * 4 + gap_width) / 2;

        let (block_verts, block_indices) = create_triangle_strip_patch(block_width, block_width);
        let (hor_gap_verts, hor_gap_indices) = create_triangle_strip_patch(block_width, gap_width);
        let (vert_gap_verts, vert_gap_indices) = create_triangle_strip_patch(gap_width, block_width);

        let (
            (tl_verts, tl_indices),
            (tr_verts, tr_indices),
            (bl_verts, bl_indices),
            (br_verts, br_indices),
        ) = build_interior_quadrants(block_width, gap_width);

        let (finest_verts, finest_indices) = build_interior_finest(block_width);
        let (crack_verts, crack_indices) = build_crack(crack_triangles);

        let mut vertex_buffer = Vec::new();
        let mut index_buffer = Vec::new();
        let mut push = |verts: Vec<PatchVertex>, indices: Vec<u16>| -> PatchRange {
            let base_vertex = vertex_buffer.len() as i32;
            let start_index = index_buffer.len() as i32;
            let index_count = indices.len() as i32;
            vertex_buffer.extend(verts);
            index_buffer.extend(indices);
            PatchRange {
                base_vertex,
                start_index,
                index_count,
            }
        };

        let patches = [
            push(block_verts, block_indices),
            push(hor_gap_verts, hor_gap_indices),
            push(vert_gap_verts, vert_gap_indices),
            push(tl_verts, tl_indices),
            push(tr_verts, tr_indices),
            push(bl_verts, bl_indices),
            push(br_verts, br_indices),
            push(finest_verts, finest_indices),
            push(crack_verts, crack_indices),
        ];

        assert!(vertex_buffer.len() < u16::MAX as usize, "patch catalog vertex count exceeds 16-bit indices");

        Ok(Self {
            texture_size,
            block_width,
            gap_width,
            vertex_buffer,
            index_buffer,
            patches,
        })
    }
    // ------------------------------------------------------------------------
    pub fn texture_size(&self) -> u32 {
        self.texture_size
    }
    // ------------------------------------------------------------------------
    pub fn block_width(&self) -> i32 {
        self.block_width
    }
    // ------------------------------------------------------------------------
    pub fn gap_width(&self) -> i32 {
        self.gap_width
    }
    // ------------------------------------------------------------------------
    pub fn vertex_buffer(&self) -> &[PatchVertex] {
        &self.vertex_buffer
    }
    // ------------------------------------------------------------------------
    pub fn index_buffer(&self) -> &[u16] {
        &self.index_buffer
    }
    // ------------------------------------------------------------------------
    pub fn patch(&self, kind: PatchKind) -> PatchRange {
        self.patches[kind as usize]
    }
}
// ----------------------------------------------------------------------------
/// A `num_quads_x x num_quads_y` grid of quads written as `num_quads_y`
/// horizontal triangle strips, each terminated by the reset index.
fn create_triangle_strip_patch(num_quads_x: i32, num_quads_y: i32) -> (Vec<PatchVertex>, Vec<u16>) {
    let verts_x = num_quads_x + 1;
    let verts_y = num_quads_y + 1;

    let mut vertices = vec![PatchVertex::new(0, 0); (verts_x * verts_y) as usize];
    let mut indices = Vec::new();

    for y in 0..num_quads_y {
        for x in 0..=num_quads_x {
            indices.push((x + y * verts_x) as u16);
            indices.push((x + (y + 1) * verts_x) as u16);
        }
        indices.push(RESET_INDEX);
    }

    for i in 0..verts_y {
        for j in 0..verts_x {
            vertices[(i * verts_x + j) as usize] = PatchVertex::new(j, i);
        }
    }

    (vertices, indices)
}
// ----------------------------------------------------------------------------
type Strip = (Vec<PatchVertex>, Vec<u16>);
// ----------------------------------------------------------------------------
/// The four interior L-shapes, one per open quadrant of the finer-lod
/// square. Built as a shared perimeter strip (two passes: a strip along the
/// open edge, then the perpendicular one, stitched with explicit index
/// references), then offset so all four sit centered over the same square.
fn build_interior_quadrants(block_width: i32, gap_width: i32) -> (Strip, Strip, Strip, Strip) {
    let span = block_width * 2 + gap_width;

    let mut tl_v = Vec::new();
    let mut tr_v = Vec::new();
    let mut bl_v = Vec::new();
    let mut br_v = Vec::new();
    let mut tl_i = Vec::new();
    let mut tr_i = Vec::new();
    let mut bl_i = Vec::new();
    let mut br_i = Vec::new();

    let mut i: i32 = 0;
    for q in 0..=span {
        tl_v.push(PatchVertex::new(q, 0));
        tl_v.push(PatchVertex::new(q, 1));

        tr_v.push(PatchVertex::new(q, 0));
        tr_v.push(PatchVertex::new(q, 1));

        bl_v.push(PatchVertex::new(q, span - 1));
        bl_v.push(PatchVertex::new(q, span));

        br_v.push(PatchVertex::new(q, span - 1));
        br_v.push(PatchVertex::new(q, span));

        tl_i.push(i as u16);
        tl_i.push((i + 1) as u16);
        tr_i.push(i as u16);
        tr_i.push((i + 1) as u16);
        bl_i.push(i as u16);
        bl_i.push((i + 1) as u16);
        br_i.push(i as u16);
        br_i.push((i + 1) as u16);

        i += 2;
    }

    tl_i.push(RESET_INDEX);
    tr_i.push(RESET_INDEX);
    bl_i.push(RESET_INDEX);
    br_i.push(RESET_INDEX);

    let mut prev_a_tl = 1i32;
    let mut prev_b_tl = prev_a_tl + 2;

    let mut prev_a_tr = (span + 1) * 2 - 3;
    let mut prev_b_tr = prev_a_tr + 2;

    for q in 0..span - 1 {
        tl_i.push(prev_a_tl as u16);
        tl_i.push(i as u16);
        tl_i.push(prev_b_tl as u16);
        tl_i.push((i + 1) as u16);
        prev_a_tl = i;
        prev_b_tl = i + 1;

        tr_i.push(prev_a_tr as u16);
        tr_i.push(i as u16);
        tr_i.push(prev_b_tr as u16);
        tr_i.push((i + 1) as u16);
        prev_a_tr = i;
        prev_b_tr = i + 1;

        if q < span - 2 {
            tl_i.push(RESET_INDEX);
            tr_i.push(RESET_INDEX);

            bl_i.push(i as u16);
            bl_i.push((i + 2) as u16);
            bl_i.push((i + 1) as u16);
            bl_i.push((i + 3) as u16);
            bl_i.push(RESET_INDEX);

            br_i.push(i as u16);
            br_i.push((i + 2) as u16);
            br_i.push((i + 1) as u16);
            br_i.push((i + 3) as u16);
            br_i.push(RESET_INDEX);

            i += 2;
        }

        tl_v.push(PatchVertex::new(0, q + 2));
        tl_v.push(PatchVertex::new(1, q + 2));

        tr_v.push(PatchVertex::new(span - 1, q + 2));
        tr_v.push(PatchVertex::new(span, q + 2));

        bl_v.push(PatchVertex::new(0, q));
        bl_v.push(PatchVertex::new(1, q));

        br_v.push(PatchVertex::new(span - 1, q));
        br_v.push(PatchVertex::new(span, q));
    }

    bl_i.push(i as u16);
    bl_i.push(0);
    bl_i.push((i + 1) as u16);
    bl_i.push(2);

    br_i.push(i as u16);
    br_i.push(((span + 1) * 2 - 4) as u16);
    br_i.push((i + 1) as u16);
    br_i.push(((span + 1) * 2 - 2) as u16);

    for v in tl_v.iter_mut().chain(tr_v.iter_mut()).chain(bl_v.iter_mut()).chain(br_v.iter_mut()) {
        v.x += block_width as i16;
        v.y += block_width as i16;
    }

    ((tl_v, tl_i), (tr_v, tr_i), (bl_v, bl_i), (br_v, br_i))
}
// ----------------------------------------------------------------------------
/// The larger L used only at the finest lod: one long horizontal strip, then
/// one long vertical strip, stitched with shared vertices at the elbow.
fn build_interior_finest(block_width: i32) -> Strip {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let mut i: i32 = 0;

    let y = block_width * 2;
    for x in 0..block_width * 2 + 2 {
        indices.push(i as u16);
        i += 1;
        indices.push(i as u16);
        i += 1;

        vertices.push(PatchVertex::new(x, y));
        vertices.push(PatchVertex::new(x, y + 1));
    }
    indices.push(RESET_INDEX);

    let x = block_width * 2;
    let mut y = 0;
    for yy in 0..block_width * 2 {
        y = yy;
        indices.push(i as u16);
        indices.push((i + 2) as u16);
        indices.push((i + 1) as u16);
        indices.push((i + 3) as u16);
        indices.push(RESET_INDEX);

        vertices.push(PatchVertex::new(x, y));
        vertices.push(PatchVertex::new(x + 1, y));

        i += 2;
    }
    y = block_width * 2;
    vertices.push(PatchVertex::new(x, y));
    vertices.push(PatchVertex::new(x + 1, y));

    (vertices, indices)
}
// ----------------------------------------------------------------------------
/// A strip of `crack_triangles` triangles per side, repeated for all four
/// sides of a ring, then reversed so winding faces outward.
fn build_crack(crack_triangles: i32) -> Strip {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // top line
    let j = 0;
    for i in 0..crack_triangles {
        indices.push((i * 2) as u16);
        indices.push((i * 2) as u16);
        indices.push((i * 2 + 1) as u16);
        indices.push((i * 2 + 2) as u16);

        vertices.push(PatchVertex::new(i * 2, j));
        vertices.push(PatchVertex::new(i * 2 + 1, j));
    }

    // right line
    let j = crack_triangles * 2;
    let vert_ofs = vertices.len() as i32;
    for i in 0..crack_triangles {
        indices.push((vert_ofs + i * 2) as u16);
        indices.push((vert_ofs + i * 2) as u16);
        indices.push((vert_ofs + i * 2 + 1) as u16);
        indices.push((vert_ofs + i * 2 + 2) as u16);

        vertices.push(PatchVertex::new(j, i * 2));
        vertices.push(PatchVertex::new(j, i * 2 + 1));
    }

    // bottom line
    let j = crack_triangles * 2;
    let vert_ofs = vertices.len() as i32;
    for i in 0..crack_triangles {
        indices.push((vert_ofs + i * 2) as u16);
        indices.push((vert_ofs + i * 2) as u16);
        indices.push((vert_ofs + i * 2 + 1) as u16);
        indices.push((vert_ofs + i * 2 + 2) as u16);

        vertices.push(PatchVertex::new(j - i * 2, j));
        vertices.push(PatchVertex::new(j - i * 2 - 1, j));
    }

    // left line
    let j = crack_triangles * 2;
    let vert_ofs = vertices.len() as i32;
    for i in 0..crack_triangles {
        indices.push((vert_ofs + i * 2) as u16);
        indices.push((vert_ofs + i * 2) as u16);
        indices.push((vert_ofs + i * 2 + 1) as u16);
        indices.push((vert_ofs + i * 2 + 2) as u16);

        vertices.push(PatchVertex::new(0, j - i * 2));
        vertices.push(PatchVertex::new(0, j - i * 2 - 1));
    }
    vertices.push(PatchVertex::new(0, 0));

    // reverse face culling
    vertices.reverse();
    indices.reverse();

    (vertices, indices)
}
// ----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    // ------------------------------------------------------------------------
    #[test]
    fn rejects_non_power_of_two_texture_size() {
        assert!(PatchCatalog::build(100).is_err());
        assert!(PatchCatalog::build(8).is_err());
    }
    // ------------------------------------------------------------------------
    #[test]
    fn builds_all_nine_patches_within_u16_indices() {
        let catalog = PatchCatalog::build(256).unwrap();
        assert!(catalog.vertex_buffer().len() < u16::MAX as usize);
        for kind in PatchKind::ALL {
            let patch = catalog.patch(kind);
            assert!(patch.index_count > 0);
        }
    }
    // ------------------------------------------------------------------------
    #[test]
    fn block_patch_vertex_count_matches_spec() {
        let catalog = PatchCatalog::build(256).unwrap();
        let block_width = catalog.block_width();
        let block = catalog.patch(PatchKind::Block);
        let next = catalog.patch(PatchKind::HorizontalGap);
        let block_vertex_count = next.base_vertex - block.base_vertex;
        assert_eq!(block_vertex_count, (block_width + 1) * (block_width + 1));
    }
    // ------------------------------------------------------------------------
    #[test]
    fn crack_patch_indices_stay_within_its_own_vertex_range() {
        let catalog = PatchCatalog::build(256).unwrap();
        let crack = catalog.patch(PatchKind::Crack);
        let next_base = catalog.vertex_buffer().len() as i32;
        let local_vertex_count = next_base - crack.base_vertex;

        let start = crack.start_index as usize;
        let count = crack.index_count as usize;
        for &idx in &catalog.index_buffer()[start..start + count] {
            assert!(idx == RESET_INDEX || (idx as i32) < local_vertex_count);
        }
    }
}
