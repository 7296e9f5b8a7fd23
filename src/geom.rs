// ----------------------------------------------------------------------------
// Minimal world-space bounding volumes: an AABB and a six-plane frustum built
// from a view-projection matrix, each with just the construction and
// intersection tests this crate needs rather than a full geometry crate.
// ----------------------------------------------------------------------------
use bevy_math::{Vec3, Vec4};
// ----------------------------------------------------------------------------
/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}
// ----------------------------------------------------------------------------
impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }
    // ------------------------------------------------------------------------
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
    // ------------------------------------------------------------------------
    pub fn contains_xz(&self, x: f32, z: f32) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.z && z <= self.max.z
    }
    // ------------------------------------------------------------------------
    /// Ray/box slab test. Returns the entry distance along `dir` if the ray
    /// (assumed normalized) hits the box, `None` otherwise.
    pub fn ray_intersect(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let inv = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);

        let t1 = (self.min - origin) * inv;
        let t2 = (self.max - origin) * inv;

        let tmin = t1.min(t2);
        let tmax = t1.max(t2);

        let t_near = tmin.x.max(tmin.y).max(tmin.z);
        let t_far = tmax.x.min(tmax.y).min(tmax.z);

        if t_far < 0.0 || t_near > t_far {
            None
        } else {
            Some(t_near.max(0.0))
        }
    }
}
// ----------------------------------------------------------------------------
/// A view frustum expressed as six inward-facing planes `(nx, ny, nz, d)`
/// satisfying `dot(n, p) + d >= 0` for points inside the volume.
#[derive(Debug, Clone)]
pub struct Frustum {
    planes: [Vec4; 6],
}
// ----------------------------------------------------------------------------
impl Frustum {
    pub fn from_planes(planes: [Vec4; 6]) -> Self {
        Self { planes }
    }
    // ------------------------------------------------------------------------
    /// A frustum that never culls anything; useful for headless/test callers
    /// and for hosts that want the core to skip frustum rejection entirely.
    pub fn everything() -> Self {
        Self {
            planes: [Vec4::new(0.0, 0.0, 0.0, 1.0); 6],
        }
    }
    // ------------------------------------------------------------------------
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let normal = Vec3::new(plane.x, plane.y, plane.z);
            // positive vertex: the AABB corner furthest along the plane normal
            let p = Vec3::new(
                if normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if normal.dot(p) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}
