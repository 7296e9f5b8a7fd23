// ----------------------------------------------------------------------------
// Clipmap View: per-camera toroidal texture state and the frame update that
// drives the streamer and selector. Nothing below touches a GPU API directly;
// it only produces byte spans through the Frame Allocator Interface.
//
// A synchronous, backend-neutral update: snap every active level, stream in
// newly-uncovered texels, then select and cull this frame's patch instances.
// ----------------------------------------------------------------------------
pub mod selector;
pub mod streamer;

use crate::config::{TerrainConfig, MAX_LODS};
use crate::error::Result;
use crate::frame::{FrameAllocator, IndirectDraw, PatchInstance};
use crate::geom::Frustum;
use crate::heightfield::{Heightfield, HeightfieldListener};
use crate::patch_catalog::PatchCatalog;
use bevy_math::{IVec2, Vec3};
use std::sync::{Arc, Mutex};
// ----------------------------------------------------------------------------
/// Which corner of a ring's open quadrant the interior trim patch closes,
/// chosen each frame from the sign of the viewer's sub-snap offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteriorTrim {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}
// ----------------------------------------------------------------------------
impl InteriorTrim {
    fn from_snap_offset(dx: f32, dz: f32) -> Self {
        if dx > 0.0 {
            if dz > 0.0 {
                InteriorTrim::TopLeft
            } else {
                InteriorTrim::BottomLeft
            }
        } else if dz > 0.0 {
            InteriorTrim::TopRight
        } else {
            InteriorTrim::BottomRight
        }
    }
}
// ----------------------------------------------------------------------------
/// Per-level toroidal texture state. `elevation[i]` is `(heightAtThisLod,
/// heightAtCoarserLodBilinear)`; `normal[i]` is `(nx, ny, coarserNx,
/// coarserNy)` mapped from `[-1, 1]` to `[0, 255]`.
pub struct LodLevel {
    pub elevation: Vec<[f32; 2]>,
    pub normal: Vec<[u8; 4]>,
    pub offset: IVec2,
    pub texture_offset: IVec2,
    pub prev_texture_offset: IVec2,
    pub grid_scale: i32,
    pub interior_trim: InteriorTrim,
    pub min_h: f32,
    pub max_h: f32,
    pub force_update: bool,
}
// ----------------------------------------------------------------------------
impl LodLevel {
    fn new(texture_size: u32) -> Self {
        let count = (texture_size * texture_size) as usize;
        Self {
            elevation: vec![[0.0, 0.0]; count],
            normal: vec![[127, 127, 127, 127]; count],
            offset: IVec2::ZERO,
            texture_offset: IVec2::ZERO,
            prev_texture_offset: IVec2::ZERO,
            grid_scale: 1,
            interior_trim: InteriorTrim::TopLeft,
            min_h: f32::INFINITY,
            max_h: f32::NEG_INFINITY,
            force_update: true,
        }
    }
}
// ----------------------------------------------------------------------------
struct ViewState {
    heightfield: Option<Arc<Heightfield>>,
    lods: Vec<LodLevel>,
    active_min_lod: u8,
    active_max_lod: u8,
    patch_instances: Vec<PatchInstance>,
    indirect_draws: Vec<IndirectDraw>,
}
// ----------------------------------------------------------------------------
/// Per-camera clipmap state: `MAX_LODS` toroidal texture levels plus the
/// transient instance/indirect-draw streams produced by the last `update`.
pub struct ClipmapView {
    config: TerrainConfig,
    texture_size: u32,
    catalog: Arc<PatchCatalog>,
    state: Mutex<ViewState>,
}
// ----------------------------------------------------------------------------
impl ClipmapView {
    /// `catalog.texture_size()` must match `texture_size`.
    pub fn new(texture_size: u32, catalog: Arc<PatchCatalog>, config: TerrainConfig) -> Arc<Self> {
        let lods = (0..MAX_LODS).map(|_| LodLevel::new(texture_size)).collect();
        Arc::new(Self {
            config,
            texture_size,
            catalog,
            state: Mutex::new(ViewState {
                heightfield: None,
                lods,
                active_min_lod: 0,
                active_max_lod: 0,
                patch_instances: Vec::new(),
                indirect_draws: Vec::new(),
            }),
        })
    }
    // ------------------------------------------------------------------------
    pub fn texture_size(&self) -> u32 {
        self.texture_size
    }
    // ------------------------------------------------------------------------
    /// Binds to a new heightfield, subscribing to its modification
    /// notifications and forcing a full rewrite of every level. A no-op if
    /// `heightfield` is already the attached instance.
    pub fn set_heightfield(self: &Arc<Self>, heightfield: Arc<Heightfield>) {
        let mut state = self.state.lock().unwrap();
        if let Some(current) = &state.heightfield {
            if Arc::ptr_eq(current, &heightfield) {
                return;
            }
        }
        state.heightfield = Some(heightfield.clone());
        for level in &mut state.lods {
            level.force_update = true;
        }
        drop(state);

        let listener: Arc<dyn HeightfieldListener> = self.clone();
        heightfield.add_listener(&listener);
        log::info!("clipmap view attached to a new heightfield, forcing a full rewrite");
    }
    // ------------------------------------------------------------------------
    pub fn patch_instances(&self) -> Vec<PatchInstance> {
        self.state.lock().unwrap().patch_instances.clone()
    }
    // ------------------------------------------------------------------------
    pub fn indirect_draws(&self) -> Vec<IndirectDraw> {
        self.state.lock().unwrap().indirect_draws.clone()
    }
    // ------------------------------------------------------------------------
    pub fn active_lod_range(&self) -> (u8, u8) {
        let state = self.state.lock().unwrap();
        (state.active_min_lod, state.active_max_lod)
    }
    // ------------------------------------------------------------------------
    /// Drives one frame: snaps every active level's origin to the viewer
    /// position, streams newly-uncovered texels into the toroidal textures,
    /// then selects and culls the visible patch instances.
    pub fn update(&self, viewer_pos: Vec3, frustum: &Frustum, alloc: &mut dyn FrameAllocator) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let heightfield = match state.heightfield.clone() {
            Some(h) => h,
            None => return Ok(()),
        };

        let viewer_height = (viewer_pos.y - heightfield.sample_height_bilinear(viewer_pos.x, viewer_pos.z)).max(0.0);

        let half_grid_size = (self.texture_size as i32 - 2) / 2;
        let lod_grid_size = self.texture_size as i32 - 2;

        let mut min_view_lod = self.config.min_lod();
        let mut max_view_lod = self.config.max_lod().min(MAX_LODS - 1);

        loop {
            for lod in min_view_lod..=max_view_lod {
                snap_level(&mut state.lods[lod as usize], lod, viewer_pos, half_grid_size);
            }

            if min_view_lod >= max_view_lod {
                break;
            }
            let finest_extent = (1i32 << min_view_lod) as f32 * lod_grid_size as f32;
            if finest_extent < viewer_height * 2.5 {
                min_view_lod += 1;
                log::debug!("eliding finest ring, viewer height {viewer_height} pushed min lod to {min_view_lod}");
                continue;
            }
            break;
        }

        if max_view_lod - min_view_lod > 5 {
            max_view_lod = min_view_lod + 5;
        }

        state.active_min_lod = min_view_lod;
        state.active_max_lod = max_view_lod;

        streamer::update_textures(&heightfield, &mut state.lods, min_view_lod, max_view_lod, self.texture_size);

        let (instances, draws) = selector::select_patches(
            &state.lods,
            min_view_lod,
            max_view_lod,
            &self.catalog,
            frustum,
            &heightfield.bounding_box(),
        );

        if self.config.show_memory_usage() {
            log::info!(
                "terrain frame stream: {} instances ({} bytes), {} indirect draws ({} bytes)",
                instances.len(),
                instances.len() * std::mem::size_of::<PatchInstance>(),
                draws.len(),
                draws.len() * std::mem::size_of::<IndirectDraw>(),
            );
        }

        upload_frame_stream(&instances, &draws, alloc)?;

        state.patch_instances = instances;
        state.indirect_draws = draws;
        Ok(())
    }
}
// ----------------------------------------------------------------------------
impl HeightfieldListener for ClipmapView {
    fn on_modified(&self) {
        let mut state = self.state.lock().unwrap();
        for level in &mut state.lods {
            level.force_update = true;
        }
    }
}
// ----------------------------------------------------------------------------
fn snap_level(level: &mut LodLevel, lod: u8, viewer_pos: Vec3, half_grid_size: i32) {
    let grid_scale = 1i32 << lod;
    let snap_size = 2 * grid_scale;

    let snap_pos = IVec2::new(
        (((viewer_pos.x / snap_size as f32).floor() + 0.5) * snap_size as f32) as i32,
        (((viewer_pos.z / snap_size as f32).floor() + 0.5) * snap_size as f32) as i32,
    );
    let snap_offset_x = viewer_pos.x - snap_pos.x as f32;
    let snap_offset_z = viewer_pos.z - snap_pos.y as f32;

    level.grid_scale = grid_scale;
    level.offset = snap_pos - IVec2::splat(half_grid_size * grid_scale);
    level.texture_offset = snap_pos / grid_scale;
    level.interior_trim = InteriorTrim::from_snap_offset(snap_offset_x, snap_offset_z);
}
// ----------------------------------------------------------------------------
fn upload_frame_stream(instances: &[PatchInstance], draws: &[IndirectDraw], alloc: &mut dyn FrameAllocator) -> Result<()> {
    use crate::frame::allocate_or_fail;

    let instance_bytes = bytemuck::cast_slice(instances);
    let handle = alloc.allocate_vertex(instance_bytes.len(), Some(instance_bytes));
    allocate_or_fail(handle, "patch instance stream")?;

    let draw_bytes = bytemuck::cast_slice(draws);
    let handle = alloc.allocate_indirect(draw_bytes.len(), Some(draw_bytes));
    allocate_or_fail(handle, "indirect draw stream")?;

    Ok(())
}
