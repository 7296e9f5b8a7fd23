// ----------------------------------------------------------------------------
// Texture Streamer: reconciles each active level's toroidal elevation/normal
// textures with its current `textureOffset`. A small shift rewrites only the
// newly-uncovered delta band; a jump of a full texture width, or a forced
// refresh, falls back to a full rewrite. Finer levels fill their "coarser"
// channel by bilinearly sampling whichever coarser level was already
// refreshed earlier this same frame.
// ----------------------------------------------------------------------------
use super::LodLevel;
use crate::heightfield::Heightfield;
use bevy_math::Vec3;
// ----------------------------------------------------------------------------
const MARGIN: f32 = 2.0;
const HEIGHT_SCAN_STRIDE: i32 = 3;
// ----------------------------------------------------------------------------
/// Streams every active level, coarsest first so that each finer level's
/// coarser-lookup reads texels already refreshed this frame.
pub fn update_textures(heightfield: &Heightfield, lods: &mut [LodLevel], min_lod: u8, max_lod: u8, texture_size: u32) {
    for lod in (min_lod..=max_lod).rev() {
        let (_below, rest) = lods.split_at_mut(lod as usize);
        let (level, above) = rest.split_first_mut().unwrap();
        let coarser = (lod < max_lod).then(|| &above[0]);

        update_level(heightfield, level, coarser, lod, texture_size);
    }
}
// ----------------------------------------------------------------------------
fn update_level(heightfield: &Heightfield, level: &mut LodLevel, coarser: Option<&LodLevel>, lod: u8, texture_size: u32) {
    let t = texture_size as i32;
    let delta = level.texture_offset - level.prev_texture_offset;

    let full_rewrite = level.force_update || delta.x.abs() >= t || delta.y.abs() >= t;

    if full_rewrite {
        level.min_h = f32::INFINITY;
        level.max_h = f32::NEG_INFINITY;
        for ty in 0..t {
            for tx in 0..t {
                write_texel(heightfield, level, coarser, lod, texture_size, tx, ty);
            }
        }
        level.force_update = false;
    } else {
        if delta.y != 0 {
            let (start, end) = if delta.y > 0 {
                (level.texture_offset.y + t - delta.y, level.texture_offset.y + t)
            } else {
                (level.texture_offset.y, level.texture_offset.y - delta.y)
            };
            for ty in start..end {
                for tx in 0..t {
                    write_texel(heightfield, level, coarser, lod, texture_size, tx, ty);
                }
            }
        }
        if delta.x != 0 {
            let (start, end) = if delta.x > 0 {
                (level.texture_offset.x + t - delta.x, level.texture_offset.x + t)
            } else {
                (level.texture_offset.x, level.texture_offset.x - delta.x)
            };
            for tx in start..end {
                for ty in 0..t {
                    write_texel(heightfield, level, coarser, lod, texture_size, tx, ty);
                }
            }
        }
    }

    level.prev_texture_offset = level.texture_offset;
}
// ----------------------------------------------------------------------------
/// Writes one texel (wrapping `(tx, ty)` into `[0, T)`), updating the
/// level's min/max height on the scan stride.
fn write_texel(heightfield: &Heightfield, level: &mut LodLevel, coarser: Option<&LodLevel>, lod: u8, texture_size: u32, tx: i32, ty: i32) {
    let t = texture_size as i32;
    let grid_x = (tx - level.texture_offset.x).rem_euclid(t);
    let grid_z = (ty - level.texture_offset.y).rem_euclid(t);

    let wx = (level.offset.x + grid_x * level.grid_scale) as f32;
    let wz = (level.offset.y + grid_z * level.grid_scale) as f32;
    let gs = level.grid_scale as f32;

    let elevation = heightfield.sample_lod(wx, wz, lod);

    let hl = heightfield.sample_lod(wx - gs, wz, lod);
    let hr = heightfield.sample_lod(wx + gs, wz, lod);
    let hd = heightfield.sample_lod(wx, wz - gs, lod);
    let hu = heightfield.sample_lod(wx, wz + gs, lod);
    let normal = Vec3::new(hl - hr, 2.0 * gs, hd - hu).normalize_or_zero();
    let nx = to_unorm8(normal.x);
    let nz = to_unorm8(normal.z);

    let (coarser_elevation, coarser_nx, coarser_nz) = match coarser {
        Some(coarser_level) => sample_coarser(coarser_level, texture_size, wx, wz),
        None => (elevation, nx, nz),
    };

    let texel_tx = tx.rem_euclid(t) as usize;
    let texel_ty = ty.rem_euclid(t) as usize;
    let index = texel_ty * texture_size as usize + texel_tx;

    level.elevation[index] = [elevation, coarser_elevation];
    level.normal[index] = [nx, nz, coarser_nx, coarser_nz];

    let tx_on_stride = tx.rem_euclid(HEIGHT_SCAN_STRIDE) == 0;
    let ty_on_stride = ty.rem_euclid(HEIGHT_SCAN_STRIDE) == 0;
    if tx_on_stride && ty_on_stride {
        level.min_h = level.min_h.min(elevation - MARGIN);
        level.max_h = level.max_h.max(elevation + MARGIN);
    }
}
// ----------------------------------------------------------------------------
fn to_unorm8(v: f32) -> u8 {
    (v.clamp(-1.0, 1.0) * 127.5 + 127.5).round() as u8
}
// ----------------------------------------------------------------------------
/// Bilinearly samples the coarser level's elevation/normal textures at world
/// `(wx, wz)`, for filling this level's "coarser" channels.
fn sample_coarser(coarser: &LodLevel, texture_size: u32, wx: f32, wz: f32) -> (f32, u8, u8) {
    let t = texture_size as i32;
    let gs = coarser.grid_scale as f32;

    let gx_f = (wx - coarser.offset.x as f32) / gs;
    let gz_f = (wz - coarser.offset.y as f32) / gs;
    let gx0 = gx_f.floor();
    let gz0 = gz_f.floor();
    let fx = gx_f - gx0;
    let fz = gz_f - gz0;
    let gx0 = gx0 as i32;
    let gz0 = gz0 as i32;

    let texel_index = |gx: i32, gz: i32| -> usize {
        let tx = (gx + coarser.texture_offset.x).rem_euclid(t);
        let tz = (gz + coarser.texture_offset.y).rem_euclid(t);
        (tz * t + tx) as usize
    };

    let i00 = texel_index(gx0, gz0);
    let i10 = texel_index(gx0 + 1, gz0);
    let i01 = texel_index(gx0, gz0 + 1);
    let i11 = texel_index(gx0 + 1, gz0 + 1);

    let w00 = (1.0 - fx) * (1.0 - fz);
    let w10 = fx * (1.0 - fz);
    let w01 = (1.0 - fx) * fz;
    let w11 = fx * fz;

    let elevation = coarser.elevation[i00][0] * w00
        + coarser.elevation[i10][0] * w10
        + coarser.elevation[i01][0] * w01
        + coarser.elevation[i11][0] * w11;

    let blend_channel = |channel: usize| -> u8 {
        let v = coarser.normal[i00][channel] as f32 * w00
            + coarser.normal[i10][channel] as f32 * w10
            + coarser.normal[i01][channel] as f32 * w01
            + coarser.normal[i11][channel] as f32 * w11;
        v.clamp(0.0, 255.0).round() as u8
    };

    (elevation, blend_channel(0), blend_channel(1))
}
// ----------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightfield::tests::flat_heightfield;
    // ------------------------------------------------------------------------
    fn fresh_level(texture_size: u32) -> LodLevel {
        LodLevel::new(texture_size)
    }
    // ------------------------------------------------------------------------
    #[test]
    fn flat_terrain_yields_up_normal_everywhere() {
        let h = flat_heightfield(257, 0.0);
        let mut level = fresh_level(32);
        level.grid_scale = 1;
        level.texture_offset = bevy_math::IVec2::splat(16);
        level.offset = bevy_math::IVec2::splat(-16);

        update_level(&h, &mut level, None, 0, 32);

        for texel in &level.normal {
            assert_eq!(texel[0], 128);
            assert_eq!(texel[1], 128);
        }
    }
    // ------------------------------------------------------------------------
    #[test]
    fn force_update_rewrites_the_whole_window_and_clears_the_flag() {
        let h = flat_heightfield(257, 0.0);
        let mut level = fresh_level(16);
        level.grid_scale = 1;
        level.texture_offset = bevy_math::IVec2::splat(8);
        level.offset = bevy_math::IVec2::splat(-8);
        level.force_update = true;

        update_level(&h, &mut level, None, 0, 16);

        assert!(!level.force_update);
        assert_eq!(level.prev_texture_offset, level.texture_offset);
        assert!(level.min_h.is_finite());
    }
    // ------------------------------------------------------------------------
    #[test]
    fn small_shift_only_rewrites_the_delta_band() {
        let h = flat_heightfield(257, 0.0);
        let mut level = fresh_level(16);
        level.grid_scale = 1;
        level.texture_offset = bevy_math::IVec2::splat(8);
        level.offset = bevy_math::IVec2::splat(-8);
        update_level(&h, &mut level, None, 0, 16);

        let before = level.elevation.clone();
        level.texture_offset.x += 1;
        level.offset.x += 1;
        update_level(&h, &mut level, None, 0, 16);

        let mut changed = 0;
        for (a, b) in before.iter().zip(level.elevation.iter()) {
            if a != b {
                changed += 1;
            }
        }
        assert!(changed > 0 && changed < before.len(), "expected a partial rewrite, changed {changed}");
    }
}
