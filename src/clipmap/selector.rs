// ----------------------------------------------------------------------------
// Patch Selector & Culler: walks the active lod stack, composing each
// level's instances from the patch catalog's vocabulary and emitting the
// ordered instance stream plus one indirect-draw record per patch kind, with
// AABB/frustum rejection per candidate. The interior-finest L and the crack
// strips are never culled; every other kind is tested against both the
// heightfield bounds and the view frustum before being kept.
// ----------------------------------------------------------------------------
use super::{InteriorTrim, LodLevel};
use crate::frame::{IndirectDraw, PatchInstance};
use crate::geom::{Aabb, Frustum};
use crate::patch_catalog::{PatchCatalog, PatchKind};
use bevy_math::{vec3, IVec2};
use std::collections::HashMap;
// ----------------------------------------------------------------------------
/// Output batching order: all instances of one kind are grouped together,
/// one indirect-draw record per non-empty group.
const SELECTOR_ORDER: [PatchKind; 9] = [
    PatchKind::InteriorFinest,
    PatchKind::Block,
    PatchKind::InteriorTopLeft,
    PatchKind::InteriorTopRight,
    PatchKind::InteriorBottomLeft,
    PatchKind::InteriorBottomRight,
    PatchKind::VerticalGap,
    PatchKind::HorizontalGap,
    PatchKind::Crack,
];
// ----------------------------------------------------------------------------
struct Candidate {
    kind: PatchKind,
    lod: u8,
    /// Patch-local lattice offset (pre-`gridScale`) the instance is placed
    /// at. Equal to `cull_offset` for every kind except the interior trims,
    /// whose mesh data already bakes in a `(blockWidth, blockWidth)` shift.
    local_offset: IVec2,
    /// `Some((offset, (width, height)))` in lattice units to test against
    /// the heightfield bounds and frustum before keeping this candidate;
    /// `None` if the kind is never culled.
    cull: Option<(IVec2, (i32, i32))>,
}
// ----------------------------------------------------------------------------
/// Emits the visible patch instance stream and one indirect-draw record per
/// non-empty patch kind, in `SELECTOR_ORDER`.
pub fn select_patches(
    lods: &[LodLevel],
    min_lod: u8,
    max_lod: u8,
    catalog: &PatchCatalog,
    frustum: &Frustum,
    heightfield_bounds: &Aabb,
) -> (Vec<PatchInstance>, Vec<IndirectDraw>) {
    let block_width = catalog.block_width();
    let gap_width = catalog.gap_width();
    let span = block_width * 2 + gap_width;

    let mut candidates = Vec::new();

    // Finest-lod closer: the interior L plus the four blocks it leaves a
    // gap for, all anchored at the corner the snap offset points into.
    let finest = &lods[min_lod as usize];
    let finest_base = finest_closer_offset(finest.interior_trim, block_width);
    candidates.push(Candidate {
        kind: PatchKind::InteriorFinest,
        lod: min_lod,
        local_offset: finest_base,
        cull: None,
    });
    for (dx, dz) in [(0, 0), (block_width, 0), (0, block_width), (block_width, block_width)] {
        let local_offset = finest_base + IVec2::new(dx, dz);
        candidates.push(Candidate {
            kind: PatchKind::Block,
            lod: min_lod,
            local_offset,
            cull: Some((local_offset, (block_width, block_width))),
        });
    }

    for lod in min_lod..=max_lod {
        push_ring(&mut candidates, lod, block_width, gap_width, span, lods[lod as usize].interior_trim);
    }

    for lod in min_lod..max_lod {
        candidates.push(Candidate {
            kind: PatchKind::Crack,
            lod,
            local_offset: IVec2::ZERO,
            cull: None,
        });
    }

    let mut grouped: HashMap<PatchKind, Vec<PatchInstance>> = HashMap::new();
    for kind in PatchKind::ALL {
        grouped.insert(kind, Vec::new());
    }

    for candidate in candidates {
        let level = &lods[candidate.lod as usize];

        if let Some((cull_offset, (width, height))) = candidate.cull {
            let cull_x0 = level.offset.x + cull_offset.x * level.grid_scale;
            let cull_z0 = level.offset.y + cull_offset.y * level.grid_scale;
            let aabb = Aabb::new(
                vec3(cull_x0 as f32, level.min_h, cull_z0 as f32),
                vec3(
                    (cull_x0 + width * level.grid_scale) as f32,
                    level.max_h,
                    (cull_z0 + height * level.grid_scale) as f32,
                ),
            );
            if !aabb.intersects(heightfield_bounds) || !frustum.intersects_aabb(&aabb) {
                continue;
            }
        }

        let world_x0 = level.offset.x + candidate.local_offset.x * level.grid_scale;
        let world_z0 = level.offset.y + candidate.local_offset.y * level.grid_scale;
        let instance = PatchInstance {
            vertex_scale: [level.grid_scale as i16, candidate.lod as i16],
            vertex_translate: [world_x0, world_z0],
            texcoord_offset: [
                level.texture_offset.x * level.grid_scale - level.offset.x,
                level.texture_offset.y * level.grid_scale - level.offset.y,
            ],
            quad_color: debug_color(candidate.kind),
        };
        grouped.get_mut(&candidate.kind).unwrap().push(instance);
    }

    let mut instances = Vec::new();
    let mut draws = Vec::new();
    for kind in SELECTOR_ORDER {
        let group = grouped.remove(&kind).unwrap_or_default();
        if group.is_empty() {
            continue;
        }
        let range = catalog.patch(kind);
        draws.push(IndirectDraw {
            index_count_per_instance: range.index_count as u32,
            instance_count: group.len() as u32,
            start_index: range.start_index as u32,
            base_vertex: range.base_vertex,
            start_instance_location: instances.len() as u32,
        });
        instances.extend(group);
    }

    (instances, draws)
}
// ----------------------------------------------------------------------------
/// Where the finest-lod interior L and its four attendant blocks anchor,
/// picked from the corner the snap offset points into.
fn finest_closer_offset(trim: InteriorTrim, block_width: i32) -> IVec2 {
    match trim {
        InteriorTrim::TopLeft => IVec2::new(block_width + 1, block_width + 1),
        InteriorTrim::TopRight => IVec2::new(block_width, block_width + 1),
        InteriorTrim::BottomLeft => IVec2::new(block_width + 1, block_width),
        InteriorTrim::BottomRight => IVec2::new(block_width, block_width),
    }
}
// ----------------------------------------------------------------------------
/// One ring: the twelve blocks of a 4x4 lattice of block-sized cells minus
/// the center 2x2 (left open for the next finer level), the one interior
/// trim L that closes that opening, and the four gap patches straddling the
/// cross between them. Everything but the trim placement itself is relative
/// to `level.offset`; the trim's vertex data already bakes in the
/// `(blockWidth, blockWidth)` centering shift, so it's placed at zero local
/// offset but culled against a box that starts at `(blockWidth, blockWidth)`.
fn push_ring(candidates: &mut Vec<Candidate>, lod: u8, block_width: i32, gap_width: i32, span: i32, trim: InteriorTrim) {
    let slots = [0, block_width, 2 * block_width + gap_width, 3 * block_width + gap_width];

    for (ri, &rz) in slots.iter().enumerate() {
        for (ci, &cx) in slots.iter().enumerate() {
            if (1..=2).contains(&ri) && (1..=2).contains(&ci) {
                continue;
            }
            let local_offset = IVec2::new(cx, rz);
            candidates.push(Candidate {
                kind: PatchKind::Block,
                lod,
                local_offset,
                cull: Some((local_offset, (block_width, block_width))),
            });
        }
    }

    let trim_kind = match trim {
        InteriorTrim::TopLeft => PatchKind::InteriorTopLeft,
        InteriorTrim::TopRight => PatchKind::InteriorTopRight,
        InteriorTrim::BottomLeft => PatchKind::InteriorBottomLeft,
        InteriorTrim::BottomRight => PatchKind::InteriorBottomRight,
    };
    candidates.push(Candidate {
        kind: trim_kind,
        lod,
        local_offset: IVec2::ZERO,
        cull: Some((IVec2::new(block_width, block_width), (span, span))),
    });

    let vgap_x = 2 * block_width;
    let vgap_a = IVec2::new(vgap_x, 0);
    let vgap_b = IVec2::new(vgap_x, 3 * block_width + gap_width);
    candidates.push(Candidate { kind: PatchKind::VerticalGap, lod, local_offset: vgap_a, cull: Some((vgap_a, (gap_width, block_width))) });
    candidates.push(Candidate { kind: PatchKind::VerticalGap, lod, local_offset: vgap_b, cull: Some((vgap_b, (gap_width, block_width))) });

    let hgap_y = 2 * block_width;
    let hgap_a = IVec2::new(0, hgap_y);
    let hgap_b = IVec2::new(3 * block_width + gap_width, hgap_y);
    candidates.push(Candidate { kind: PatchKind::HorizontalGap, lod, local_offset: hgap_a, cull: Some((hgap_a, (block_width, gap_width))) });
    candidates.push(Candidate { kind: PatchKind::HorizontalGap, lod, local_offset: hgap_b, cull: Some((hgap_b, (block_width, gap_width))) });
}
// ----------------------------------------------------------------------------
fn debug_color(kind: PatchKind) -> [f32; 4] {
    match kind {
        PatchKind::Block => [0.2, 0.6, 0.2, 1.0],
        PatchKind::HorizontalGap => [0.6, 0.6, 0.2, 1.0],
        PatchKind::VerticalGap => [0.2, 0.6, 0.6, 1.0],
        PatchKind::InteriorTopLeft => [0.8, 0.2, 0.2, 1.0],
        PatchKind::InteriorTopRight => [0.2, 0.2, 0.8, 1.0],
        PatchKind::InteriorBottomLeft => [0.8, 0.8, 0.2, 1.0],
        PatchKind::InteriorBottomRight => [0.2, 0.8, 0.8, 1.0],
        PatchKind::InteriorFinest => [0.9, 0.5, 0.1, 1.0],
        PatchKind::Crack => [0.9, 0.1, 0.9, 1.0],
    }
}
// ----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_LODS;
    // ------------------------------------------------------------------------
    fn flat_active_lods(texture_size: u32) -> Vec<LodLevel> {
        (0..MAX_LODS)
            .map(|lod| {
                let mut level = LodLevel::new(texture_size);
                level.grid_scale = 1 << lod;
                level.min_h = -1.0;
                level.max_h = 1.0;
                level
            })
            .collect()
    }
    // ------------------------------------------------------------------------
    #[test]
    fn six_active_lods_emit_the_expected_instance_count() {
        let catalog = PatchCatalog::build(256).unwrap();
        let lods = flat_active_lods(256);
        let bounds = Aabb::new(vec3(-1e6, -1e6, -1e6), vec3(1e6, 1e6, 1e6));
        let frustum = Frustum::everything();

        let (instances, draws) = select_patches(&lods, 0, 5, &catalog, &frustum, &bounds);

        // lods 0..=5 inclusive: one ring per active lod, plus the finest-lod
        // closer (1 interior-finest L + 4 central blocks), plus one crack
        // strip per lod but the coarsest.
        let active_lods = 6;
        let rings = active_lods;
        let cracks = active_lods - 1;
        let expected = 1 + 4 + rings * (12 + 1 + 2 + 2) + cracks;
        assert_eq!(instances.len(), expected);
        assert_eq!(draws.iter().map(|d| d.instance_count as usize).sum::<usize>(), expected);
    }
    // ------------------------------------------------------------------------
    #[test]
    fn frustum_that_excludes_everything_keeps_only_the_uncullable_kinds() {
        use bevy_math::Vec4;
        let catalog = PatchCatalog::build(256).unwrap();
        let lods = flat_active_lods(256);
        let bounds = Aabb::new(vec3(-1e6, -1e6, -1e6), vec3(1e6, 1e6, 1e6));
        // a single plane with normal +X and a huge positive distance excludes every AABB
        let excluding = Frustum::from_planes([Vec4::new(1.0, 0.0, 0.0, -1e9); 6]);

        let (instances, draws) = select_patches(&lods, 0, 5, &catalog, &excluding, &bounds);

        // the interior-finest L (1) and crack strips (5, one per lod but the
        // coarsest) are never culled; every other kind is rejected.
        assert_eq!(instances.len(), 1 + 5);
        for draw in &draws {
            assert_ne!(draw.instance_count, 0);
        }
    }
    // ------------------------------------------------------------------------
    #[test]
    fn draws_are_grouped_in_selector_order_with_monotonic_start_instance() {
        let catalog = PatchCatalog::build(256).unwrap();
        let lods = flat_active_lods(256);
        let bounds = Aabb::new(vec3(-1e6, -1e6, -1e6), vec3(1e6, 1e6, 1e6));
        let frustum = Frustum::everything();

        let (_, draws) = select_patches(&lods, 0, 5, &catalog, &frustum, &bounds);
        let mut running = 0u32;
        for draw in &draws {
            assert_eq!(draw.start_instance_location, running);
            running += draw.instance_count;
        }
    }
}
