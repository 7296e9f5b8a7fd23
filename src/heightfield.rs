// ----------------------------------------------------------------------------
// Heightfield Pyramid: authoritative terrain elevation source. Owns a mip
// pyramid of elevation samples, answers height/triangle/normal queries, and
// performs ray casts against a simple grid-walk acceleration structure.
//
// Box-filter mip generation, nearest-neighbor lod sampling, diagonal-split
// bilinear interpolation, and a box-then-triangle ray walk that keeps the
// closest hit rather than the first.
// ----------------------------------------------------------------------------
use crate::error::{Result, TerrainError};
use crate::geom::Aabb;
use bevy_math::{vec2, vec3, IVec2, Vec2, Vec3};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;
use std::sync::{Arc, Mutex, Weak};
// ----------------------------------------------------------------------------
/// Receives notification when a [`Heightfield`] is (re)loaded in place.
///
/// The heightfield holds listeners only weakly: it exists purely to fan out a
/// notification, never to keep a view alive. See the crate's design notes on
/// cyclic references.
pub trait HeightfieldListener: Send + Sync {
    fn on_modified(&self);
}
// ----------------------------------------------------------------------------
/// A single ray/triangle intersection.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub position: Vec3,
    pub normal: Vec3,
    pub barycentric: Vec2,
    pub distance: f32,
}
// ----------------------------------------------------------------------------
fn log2_exact(mut v: u32) -> Option<u32> {
    if v == 0 || (v & (v - 1)) != 0 {
        return None;
    }
    let mut k = 0;
    while v > 1 {
        v >>= 1;
        k += 1;
    }
    Some(k)
}
// ----------------------------------------------------------------------------
/// `resolution == 2^k + 1`, returning `k`.
fn resolution_exponent(resolution: u32) -> Option<u32> {
    resolution.checked_sub(1).and_then(log2_exact)
}
// ----------------------------------------------------------------------------
fn edge_at(k: u32, lod: u8) -> u32 {
    let lod = (lod as u32).min(k);
    (1u32 << (k - lod)) + 1
}
// ----------------------------------------------------------------------------
/// Box-filters `fine` (edge `fine_edge`) down one pyramid level, handling the
/// trailing row/column/corner degenerate cases that `2^k+1` sizing leaves.
fn downsample(fine: &[f32], fine_edge: u32) -> Vec<f32> {
    let coarse_edge = (fine_edge - 1) / 2 + 1;
    let mut coarse = vec![0.0f32; (coarse_edge * coarse_edge) as usize];
    for cy in 0..coarse_edge {
        for cx in 0..coarse_edge {
            let fx = cx * 2;
            let fy = cy * 2;
            let has_right = fx + 1 < fine_edge;
            let has_down = fy + 1 < fine_edge;
            let h00 = fine[(fy * fine_edge + fx) as usize];
            let value = match (has_right, has_down) {
                (true, true) => {
                    let h10 = fine[(fy * fine_edge + fx + 1) as usize];
                    let h01 = fine[((fy + 1) * fine_edge + fx) as usize];
                    let h11 = fine[((fy + 1) * fine_edge + fx + 1) as usize];
                    (h00 + h10 + h01 + h11) / 4.0
                }
                (true, false) => {
                    let h10 = fine[(fy * fine_edge + fx + 1) as usize];
                    (h00 + h10) / 2.0
                }
                (false, true) => {
                    let h01 = fine[((fy + 1) * fine_edge + fx) as usize];
                    (h00 + h01) / 2.0
                }
                (false, false) => h00,
            };
            coarse[(cy * coarse_edge + cx) as usize] = value;
        }
    }
    coarse
}
// ----------------------------------------------------------------------------
struct Levels {
    k: u32,
    /// `samples[i]` is level `i`'s row-major elevation grid, edge `edge_at(i)`.
    samples: Vec<Vec<f32>>,
    min_height: f32,
    max_height: f32,
    clip_min: IVec2,
    clip_max: IVec2,
    bounding_box: Aabb,
}
// ----------------------------------------------------------------------------
impl Levels {
    fn build(resolution: u32, level0: Vec<f32>) -> Result<Self> {
        let k = resolution_exponent(resolution).ok_or(TerrainError::BadResolution { resolution })?;

        let mut min_height = f32::INFINITY;
        let mut max_height = f32::NEG_INFINITY;
        for &h in &level0 {
            min_height = min_height.min(h);
            max_height = max_height.max(h);
        }

        let mut samples = Vec::with_capacity((k + 1) as usize);
        samples.push(level0);
        for lod in 1..=k {
            let fine_edge = edge_at(k, (lod - 1) as u8);
            let coarser = downsample(&samples[(lod - 1) as usize], fine_edge);
            samples.push(coarser);
        }

        let clip_min = IVec2::splat((resolution / 2) as i32);
        let clip_max = IVec2::splat((resolution - 1 - resolution / 2) as i32);
        let bounding_box = Aabb::new(
            vec3(-clip_min.x as f32, min_height, -clip_min.y as f32),
            vec3(clip_max.x as f32, max_height, clip_max.y as f32),
        );

        Ok(Self {
            k,
            samples,
            min_height,
            max_height,
            clip_min,
            clip_max,
            bounding_box,
        })
    }
    // ------------------------------------------------------------------------
    fn edge(&self, lod: u8) -> u32 {
        edge_at(self.k, lod)
    }
    // ------------------------------------------------------------------------
    fn resolution(&self) -> u32 {
        edge_at(self.k, 0)
    }
    // ------------------------------------------------------------------------
    fn sample(&self, lod: u8, ix: i32, iz: i32) -> f32 {
        let edge = self.edge(lod) as i32;
        let ix = ix.clamp(0, edge - 1) as usize;
        let iz = iz.clamp(0, edge - 1) as usize;
        self.samples[lod as usize][iz * edge as usize + ix]
    }
}
// ----------------------------------------------------------------------------
/// An owned mip pyramid of terrain elevation samples.
///
/// Level 0 is the finest (`resolution x resolution`); each coarser level
/// halves the edge (rounded up to the next `2^k+1`). Queries never fail:
/// out-of-range world coordinates return `0.0`/`None` rather than an error.
pub struct Heightfield {
    levels: Mutex<Levels>,
    listeners: Mutex<Vec<Weak<dyn HeightfieldListener>>>,
}
// ----------------------------------------------------------------------------
impl Heightfield {
    /// Builds a pyramid from a row-major level-0 sample array.
    ///
    /// Fails with [`TerrainError::BadResolution`] unless `resolution = 2^k +
    /// 1` and `samples.len() == resolution * resolution`.
    pub fn new(samples: Vec<f32>, resolution: u32) -> Result<Arc<Self>> {
        if samples.len() != (resolution * resolution) as usize {
            return Err(TerrainError::BadResolution { resolution });
        }
        let levels = Levels::build(resolution, samples)?;
        Ok(Arc::new(Self {
            levels: Mutex::new(levels),
            listeners: Mutex::new(Vec::new()),
        }))
    }
    // ------------------------------------------------------------------------
    /// Loads the little-endian asset layout described in the crate's external
    /// interfaces section: a `u32` resolution followed by `resolution^2`
    /// row-major `f32` samples.
    pub fn load_asset(mut reader: impl Read) -> Result<Arc<Self>> {
        let (samples, resolution) = load_from_reader(&mut reader)?;
        Self::new(samples, resolution)
    }
    // ------------------------------------------------------------------------
    /// Rebuilds every derived level and the bounding box from a new level-0
    /// sample array, then notifies every registered listener.
    pub fn reload(&self, samples: Vec<f32>) -> Result<()> {
        let resolution = {
            let levels = self.levels.lock().unwrap();
            levels.resolution()
        };
        if samples.len() != (resolution * resolution) as usize {
            return Err(TerrainError::BadResolution { resolution });
        }
        let rebuilt = Levels::build(resolution, samples)?;
        *self.levels.lock().unwrap() = rebuilt;
        self.notify_modified();
        Ok(())
    }
    // ------------------------------------------------------------------------
    /// Registers a weak listener; the heightfield does not keep it alive.
    pub fn add_listener(&self, listener: &Arc<dyn HeightfieldListener>) {
        self.listeners.lock().unwrap().push(Arc::downgrade(listener));
    }
    // ------------------------------------------------------------------------
    fn notify_modified(&self) {
        let mut listeners = self.listeners.lock().unwrap();
        listeners.retain(|weak| {
            if let Some(listener) = weak.upgrade() {
                listener.on_modified();
                true
            } else {
                false
            }
        });
    }
    // ------------------------------------------------------------------------
    pub fn min_height(&self) -> f32 {
        self.levels.lock().unwrap().min_height
    }
    // ------------------------------------------------------------------------
    pub fn max_height(&self) -> f32 {
        self.levels.lock().unwrap().max_height
    }
    // ------------------------------------------------------------------------
    pub fn clip_min(&self) -> IVec2 {
        self.levels.lock().unwrap().clip_min
    }
    // ------------------------------------------------------------------------
    pub fn clip_max(&self) -> IVec2 {
        self.levels.lock().unwrap().clip_max
    }
    // ------------------------------------------------------------------------
    pub fn bounding_box(&self) -> Aabb {
        self.levels.lock().unwrap().bounding_box
    }
    // ------------------------------------------------------------------------
    pub fn resolution(&self) -> u32 {
        self.levels.lock().unwrap().resolution()
    }
    // ------------------------------------------------------------------------
    pub fn lod_count(&self) -> u8 {
        (self.levels.lock().unwrap().k + 1) as u8
    }
    // ------------------------------------------------------------------------
    /// Nearest-neighbor elevation at world `(x, z)` for `lod`; always
    /// succeeds by clamping to the grid's extent.
    pub fn sample_lod(&self, x: f32, z: f32, lod: u8) -> f32 {
        let levels = self.levels.lock().unwrap();
        let edge = levels.edge(lod) as i32;
        let half = edge / 2;
        let grid_scale = (1u32 << lod.min(levels.k as u8)) as f32;
        let ix = (x / grid_scale).round() as i32 + half;
        let iz = (z / grid_scale).round() as i32 + half;
        levels.sample(lod, ix, iz)
    }
    // ------------------------------------------------------------------------
    /// Diagonal-split bilinear height at world `(x, z)`; `0.0` outside the box.
    pub fn sample_height_bilinear(&self, x: f32, z: f32) -> f32 {
        let levels = self.levels.lock().unwrap();
        match quad_at(&levels, x, z) {
            Some(quad) => bilinear(quad.fx, quad.fz, quad.h00, quad.h10, quad.h01, quad.h11),
            None => 0.0,
        }
    }
    // ------------------------------------------------------------------------
    /// The diagonal-split triangle containing world `(x, z)`, its surface
    /// normal, and its clamped `(u, v)` texture coordinate.
    pub fn triangle_at(&self, x: f32, z: f32) -> Option<(Vec3, Vec3, Vec3, Vec3, Vec2)> {
        let levels = self.levels.lock().unwrap();
        let quad = quad_at(&levels, x, z)?;
        let (v0, v1, v2) = quad.triangle();
        let normal = (v1 - v0).cross(v2 - v0).normalize();
        let resolution = levels.resolution() as f32;
        let uv = ((vec2(x, z) / (resolution - 1.0)) + vec2(0.5, 0.5)).clamp(Vec2::ZERO, Vec2::ONE);
        Some((v0, v1, v2, normal, uv))
    }
    // ------------------------------------------------------------------------
    pub fn normal_at(&self, x: f32, z: f32) -> Option<Vec3> {
        self.triangle_at(x, z).map(|(_, _, _, n, _)| n)
    }
    // ------------------------------------------------------------------------
    /// All ray/triangle hits, unordered, within `max_dist`.
    pub fn ray_cast(&self, start: Vec3, dir: Vec3, max_dist: f32, cull_back_face: bool) -> Vec<RayHit> {
        let levels = self.levels.lock().unwrap();
        let dir = dir.normalize();

        let entry = match levels.bounding_box.ray_intersect(start, dir) {
            Some(t) if t <= max_dist => t,
            _ => return Vec::new(),
        };
        let _ = entry;

        let mut hits = Vec::new();
        let edge = levels.edge(0);
        for iz in 0..edge - 1 {
            for ix in 0..edge - 1 {
                let quad = Quad::from_grid(&levels, ix as i32, iz as i32);
                let (v0, v1, v2) = quad.triangle_lower();
                push_hit(&mut hits, start, dir, max_dist, cull_back_face, v0, v1, v2);
                let (v0, v1, v2) = quad.triangle_upper();
                push_hit(&mut hits, start, dir, max_dist, cull_back_face, v0, v1, v2);
            }
        }
        hits
    }
    // ------------------------------------------------------------------------
    /// The closest ray/triangle hit within `max_dist`, or `None`.
    ///
    /// The grid walk below visits triangles in no guaranteed front-to-back
    /// order, so the minimum distance is tracked explicitly rather than
    /// returning the first hit (see the crate's design notes on the
    /// ray-cast-closest ambiguity).
    pub fn ray_cast_closest(&self, start: Vec3, dir: Vec3, max_dist: f32, cull_back_face: bool) -> Option<RayHit> {
        self.ray_cast(start, dir, max_dist, cull_back_face)
            .into_iter()
            .min_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap())
    }
}
// ----------------------------------------------------------------------------
fn push_hit(
    hits: &mut Vec<RayHit>,
    start: Vec3,
    dir: Vec3,
    max_dist: f32,
    cull_back_face: bool,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) {
    if let Some(hit) = moller_trumbore(start, dir, v0, v1, v2, cull_back_face) {
        if hit.distance <= max_dist {
            hits.push(hit);
        }
    }
}
// ----------------------------------------------------------------------------
/// Möller-Trumbore ray/triangle intersection. `v0, v1, v2` must be wound so
/// `(v1-v0).cross(v2-v0)` is the outward-facing normal.
fn moller_trumbore(orig: Vec3, dir: Vec3, v0: Vec3, v1: Vec3, v2: Vec3, cull_back_face: bool) -> Option<RayHit> {
    const EPS: f32 = 1e-7;
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let pvec = dir.cross(edge2);
    let det = edge1.dot(pvec);

    if cull_back_face {
        if det < EPS {
            return None;
        }
    } else if det.abs() < EPS {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = orig - v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let v = dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    if t < 0.0 {
        return None;
    }

    let normal = edge1.cross(edge2).normalize();
    Some(RayHit {
        position: orig + dir * t,
        normal,
        barycentric: vec2(u, v),
        distance: t,
    })
}
// ----------------------------------------------------------------------------
struct Quad {
    fx: f32,
    fz: f32,
    x0: f32,
    z0: f32,
    h00: f32,
    h10: f32,
    h01: f32,
    h11: f32,
}
// ----------------------------------------------------------------------------
impl Quad {
    fn from_grid(levels: &Levels, ix: i32, iz: i32) -> Self {
        let h00 = levels.sample(0, ix, iz);
        let h10 = levels.sample(0, ix + 1, iz);
        let h01 = levels.sample(0, ix, iz + 1);
        let h11 = levels.sample(0, ix + 1, iz + 1);
        Self {
            fx: 0.0,
            fz: 0.0,
            x0: (ix - levels.clip_min.x) as f32,
            z0: (iz - levels.clip_min.y) as f32,
            h00,
            h10,
            h01,
            h11,
        }
    }
    // ------------------------------------------------------------------------
    /// Vertices of the quad's two triangles, wound for an upward normal.
    fn triangle_lower(&self) -> (Vec3, Vec3, Vec3) {
        (
            vec3(self.x0, self.h00, self.z0),
            vec3(self.x0, self.h01, self.z0 + 1.0),
            vec3(self.x0 + 1.0, self.h10, self.z0),
        )
    }
    // ------------------------------------------------------------------------
    fn triangle_upper(&self) -> (Vec3, Vec3, Vec3) {
        (
            vec3(self.x0 + 1.0, self.h10, self.z0),
            vec3(self.x0, self.h01, self.z0 + 1.0),
            vec3(self.x0 + 1.0, self.h11, self.z0 + 1.0),
        )
    }
    // ------------------------------------------------------------------------
    /// Picks the diagonal-split triangle containing `(fx, fz)`.
    fn triangle(&self) -> (Vec3, Vec3, Vec3) {
        if self.fx + self.fz < 1.0 {
            self.triangle_lower()
        } else {
            self.triangle_upper()
        }
    }
}
// ----------------------------------------------------------------------------
fn quad_at(levels: &Levels, x: f32, z: f32) -> Option<Quad> {
    if !levels.bounding_box.contains_xz(x, z) {
        return None;
    }
    let gx = x + levels.clip_min.x as f32;
    let gz = z + levels.clip_min.y as f32;
    let edge = levels.edge(0) as i32;

    let ix = (gx.floor() as i32).clamp(0, edge - 2);
    let iz = (gz.floor() as i32).clamp(0, edge - 2);

    let mut quad = Quad::from_grid(levels, ix, iz);
    quad.fx = gx - ix as f32;
    quad.fz = gz - iz as f32;
    Some(quad)
}
// ----------------------------------------------------------------------------
/// Continuous piecewise-linear interpolation over the diagonal-split quad.
fn bilinear(fx: f32, fz: f32, h00: f32, h10: f32, h01: f32, h11: f32) -> f32 {
    if fx + fz < 1.0 {
        h00 + fx * (h10 - h00) + fz * (h01 - h00)
    } else {
        let u = 1.0 - fx;
        let v = 1.0 - fz;
        h11 + u * (h01 - h11) + v * (h10 - h11)
    }
}
// ----------------------------------------------------------------------------
/// Reads the little-endian heightfield asset layout: a `u32` resolution
/// followed by `resolution^2` row-major `f32` samples.
pub fn load_from_reader(reader: &mut impl Read) -> Result<(Vec<f32>, u32)> {
    let resolution = reader
        .read_u32::<LittleEndian>()
        .map_err(|_| TerrainError::IoTruncated { expected: 4, got: 0 })?;

    let count = (resolution as usize) * (resolution as usize);
    let mut samples = Vec::with_capacity(count);
    for i in 0..count {
        match reader.read_f32::<LittleEndian>() {
            Ok(v) => samples.push(v),
            Err(_) => {
                return Err(TerrainError::IoTruncated {
                    expected: count * 4,
                    got: i * 4,
                })
            }
        }
    }
    Ok((samples, resolution))
}
// ----------------------------------------------------------------------------
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    // ------------------------------------------------------------------------
    pub(crate) fn flat_heightfield(resolution: u32, height: f32) -> Arc<Heightfield> {
        let samples = vec![height; (resolution * resolution) as usize];
        Heightfield::new(samples, resolution).unwrap()
    }
    // ------------------------------------------------------------------------
    pub(crate) fn single_peak_heightfield(resolution: u32, peak_height: f32) -> Arc<Heightfield> {
        let half = (resolution / 2) as i32;
        let mut samples = vec![0.0f32; (resolution * resolution) as usize];
        for iz in 0..resolution as i32 {
            for ix in 0..resolution as i32 {
                if ix - half == 0 && iz - half == 0 {
                    samples[(iz as u32 * resolution + ix as u32) as usize] = peak_height;
                }
            }
        }
        Heightfield::new(samples, resolution).unwrap()
    }
    // ------------------------------------------------------------------------
    #[test]
    fn rejects_non_power_of_two_plus_one_resolution() {
        let samples = vec![0.0f32; 100];
        assert!(matches!(
            Heightfield::new(samples, 10),
            Err(TerrainError::BadResolution { resolution: 10 })
        ));
    }
    // ------------------------------------------------------------------------
    #[test]
    fn accepts_minimal_resolution() {
        assert_eq!(flat_heightfield(2, 0.0).lod_count(), 1);
        assert_eq!(flat_heightfield(5, 0.0).lod_count(), 3);
        assert_eq!(flat_heightfield(257, 0.0).lod_count(), 9);
    }
    // ------------------------------------------------------------------------
    #[test]
    fn round_trip_level0_is_bitwise_identical() {
        let resolution = 9u32;
        let samples: Vec<f32> = (0..resolution * resolution).map(|i| i as f32 * 0.5).collect();
        let h = Heightfield::new(samples.clone(), resolution).unwrap();
        let levels = h.levels.lock().unwrap();
        assert_eq!(levels.samples[0], samples);
    }
    // ------------------------------------------------------------------------
    #[test]
    fn bilinear_on_flat_terrain_is_constant() {
        let h = flat_heightfield(17, 3.0);
        assert_eq!(h.sample_height_bilinear(0.0, 0.0), 3.0);
        assert_eq!(h.sample_height_bilinear(2.5, -1.5), 3.0);
    }
    // ------------------------------------------------------------------------
    #[test]
    fn bilinear_outside_box_is_zero() {
        let h = flat_heightfield(17, 3.0);
        assert_eq!(h.sample_height_bilinear(1e6, 1e6), 0.0);
    }
    // ------------------------------------------------------------------------
    #[test]
    fn downward_ray_cast_matches_bilinear_height() {
        let h = single_peak_heightfield(17, 5.0);
        for &(x, z) in &[(0.0, 0.0), (1.0, 0.0), (-2.0, 3.0)] {
            let hits = h.ray_cast(vec3(x, 1e6, z), vec3(0.0, -1.0, 0.0), 2e6, true);
            assert!(!hits.is_empty(), "expected at least one hit at ({x}, {z})");
            let closest = hits
                .iter()
                .min_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap())
                .unwrap();
            let expected = h.sample_height_bilinear(x, z);
            let tolerance = 1e-3 * (h.max_height() - h.min_height() + 1.0);
            assert!(
                (closest.position.y - expected).abs() <= tolerance,
                "got {} expected {}",
                closest.position.y,
                expected
            );
        }
    }
    // ------------------------------------------------------------------------
    #[test]
    fn ray_cast_outside_box_is_empty() {
        let h = flat_heightfield(17, 0.0);
        let hits = h.ray_cast(vec3(1e6, 1e6, 1e6), Vec3::X, 10.0, true);
        assert!(hits.is_empty());
    }
    // ------------------------------------------------------------------------
    #[test]
    fn slanted_ray_cast_closest_finds_the_peak() {
        let h = single_peak_heightfield(17, 5.0);
        let hit = h
            .ray_cast_closest(vec3(-10.0, 10.0, 0.0), vec3(1.0, -1.0, 0.0).normalize(), 30.0, true)
            .expect("expected a hit near the peak");
        assert!(hit.position.x.abs() < 1.0);
        assert!((hit.position.y - 5.0).abs() < 1.5);
    }
    // ------------------------------------------------------------------------
    #[test]
    fn reload_notifies_listeners() {
        use std::sync::atomic::{AtomicBool, Ordering};

        struct Flag(AtomicBool);
        impl HeightfieldListener for Flag {
            fn on_modified(&self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let h = flat_heightfield(9, 0.0);
        let flag = Arc::new(Flag(AtomicBool::new(false)));
        let as_listener: Arc<dyn HeightfieldListener> = flag.clone();
        h.add_listener(&as_listener);

        h.reload(vec![1.0; 81]).unwrap();

        assert!(flag.0.load(Ordering::SeqCst));
    }
}
